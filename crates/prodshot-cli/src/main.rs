mod chat;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use prodshot_contracts::events::{new_session_id, EventWriter};
use prodshot_contracts::gate::ConcurrencyGate;
use prodshot_contracts::presets::PresetStore;
use prodshot_contracts::store::JsonFileStore;
use prodshot_engine::ingest::ingest_file;
use prodshot_engine::{
    DryrunProvider, EngineSettings, GeminiProvider, GenerationOutcome, ImageService, Studio,
    TextService,
};
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "prodshot", version, about = "AI product photo studio")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive session driven by slash commands.
    Chat(ChatArgs),
    /// Generate once from the given photos and write the results.
    Generate(GenerateArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    Gemini,
    Dryrun,
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[arg(long, value_enum, default_value_t = ProviderKind::Gemini)]
    provider: ProviderKind,
    #[arg(long, default_value = "prodshot-out")]
    out: PathBuf,
    #[arg(long)]
    presets: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    image_model: Option<String>,
    #[arg(long)]
    text_model: Option<String>,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[command(flatten)]
    session: SessionArgs,
    #[arg(long = "image", required = true)]
    images: Vec<PathBuf>,
    /// Apply a saved preset before generating.
    #[arg(long)]
    preset: Option<String>,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("prodshot error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    match cli.command {
        Command::Chat(args) => {
            let settings = resolve_settings(&args.session);
            let studio = build_studio(&args.session, &settings)?;
            chat::run_chat(&runtime, studio, &settings, &args.session.out)?;
            Ok(0)
        }
        Command::Generate(args) => run_generate(&runtime, args),
    }
}

fn resolve_settings(args: &SessionArgs) -> EngineSettings {
    let mut settings = EngineSettings::from_env();
    if let Some(model) = args.image_model.as_deref() {
        settings = settings.with_image_model(model);
    }
    if let Some(model) = args.text_model.as_deref() {
        settings = settings.with_text_model(model);
    }
    for reason in &settings.fallback_reasons {
        tracing::warn!(reason = %reason, "model fallback");
    }
    settings
}

fn build_studio(args: &SessionArgs, settings: &EngineSettings) -> Result<Studio> {
    let (image_service, text_service): (Arc<dyn ImageService>, Arc<dyn TextService>) =
        match args.provider {
            ProviderKind::Gemini => {
                let gemini = Arc::new(GeminiProvider::new(settings)?);
                let image: Arc<dyn ImageService> = gemini.clone();
                let text: Arc<dyn TextService> = gemini;
                (image, text)
            }
            ProviderKind::Dryrun => {
                let image: Arc<dyn ImageService> = Arc::new(DryrunProvider);
                let text: Arc<dyn TextService> = Arc::new(DryrunProvider);
                (image, text)
            }
        };

    let presets_path = args
        .presets
        .clone()
        .unwrap_or_else(|| args.out.join("presets.json"));
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let presets = PresetStore::open(Box::new(JsonFileStore::new(presets_path)));
    let gate = ConcurrencyGate::new(settings.max_in_flight);

    Ok(Studio::new(image_service, text_service, presets, gate)
        .with_events(EventWriter::new(events_path, new_session_id())))
}

fn run_generate(runtime: &Runtime, args: GenerateArgs) -> Result<i32> {
    let settings = resolve_settings(&args.session);
    let mut studio = build_studio(&args.session, &settings)?;
    if let Some(name) = args.preset.as_deref() {
        studio.load_preset(name)?;
    }

    let mut sources = Vec::new();
    for path in &args.images {
        sources.push(ingest_file(path)?);
    }
    studio.add_sources(sources);

    match runtime.block_on(studio.generate()) {
        Ok(GenerationOutcome::Discarded) => Ok(1),
        Ok(outcome) => {
            for path in chat::write_visible(&studio, &args.session.out)? {
                println!("{}", path.display());
            }
            if let GenerationOutcome::Candidates(count) = outcome {
                eprintln!("{count} candidates written");
            }
            Ok(0)
        }
        Err(err) => {
            eprintln!("Generation failed: {err}");
            Ok(1)
        }
    }
}

pub(crate) fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).with_context(|| format!("failed to create {}", path.display()))
}
