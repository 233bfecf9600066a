pub mod blob;
pub mod chat;
pub mod config;
pub mod errors;
pub mod events;
pub mod gate;
pub mod history;
pub mod models;
pub mod presets;
pub mod prompts;
pub mod sources;
pub mod stage;
pub mod store;
