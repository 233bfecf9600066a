pub mod ingest;
pub mod providers;
pub mod settings;
pub mod studio;

pub use providers::{DryrunProvider, GeminiProvider, ImageService, TextService};
pub use settings::EngineSettings;
pub use studio::{
    GenerationOutcome, NotStartedReason, RefineOutcome, Studio, StudioError, StudioView,
};
