use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use prodshot_contracts::blob::ImageBlob;
use prodshot_contracts::chat::{help_lines, parse_intent, Intent};
use prodshot_contracts::config::{
    AspectRatio, BackgroundMode, ConfigUpdate, FidelityMode, LightingStyle, OutputSize,
};
use prodshot_contracts::errors::PresetError;
use prodshot_contracts::prompts::{payload_diff, QuickRefinement};
use prodshot_contracts::stage::Stage;
use prodshot_engine::ingest::{ingest_file, ingest_skus, HttpCatalogClient};
use prodshot_engine::{EngineSettings, GenerationOutcome, RefineOutcome, Studio, StudioError};
use tokio::runtime::Runtime;

use crate::ensure_dir;

pub(crate) fn run_chat(
    runtime: &Runtime,
    mut studio: Studio,
    settings: &EngineSettings,
    out_dir: &Path,
) -> Result<()> {
    let catalog = HttpCatalogClient::new(settings)?;
    println!("prodshot chat. Type /help for commands.");
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
        let intent = parse_intent(line.trim());
        match intent.action.as_str() {
            "noop" => continue,
            "quit" => break,
            "help" => {
                for line in help_lines() {
                    println!("  {line}");
                }
                println!("Anything else is sent as a refinement of the current image.");
                for quick in QuickRefinement::ALL {
                    println!("  quick {:<9} {}", quick.label(), quick.description());
                }
            }
            "status" => {
                println!("{}", serde_json::to_string_pretty(&studio.snapshot())?);
            }
            "add_sources" => {
                let mut loaded = Vec::new();
                for raw in intent.arg_paths() {
                    match ingest_file(Path::new(&raw)) {
                        Ok(source) => loaded.push(source),
                        Err(err) => println!("Skipped {raw}: {err:#}"),
                    }
                }
                let count = loaded.len();
                studio.add_sources(loaded);
                println!("{count} image(s) added; {} loaded.", studio.sources().len());
            }
            "add_skus" => {
                let raw = intent.arg_str("arg").unwrap_or_default();
                let existing = studio.sources().keys();
                let lookup = ingest_skus(&catalog, &settings.sku_hosts, raw, &existing);
                match runtime.block_on(lookup) {
                    Ok(batch) => {
                        for message in &batch.errors {
                            println!("{message}");
                        }
                        let count = batch.images.len();
                        studio.add_sources(batch.images);
                        println!("{count} SKU image(s) added; {} loaded.", studio.sources().len());
                    }
                    Err(err) => println!("{err}"),
                }
            }
            "remove_source" => match intent.arg_index(0) {
                Some(index) => match studio.remove_source(index) {
                    Ok(removed) => println!("Removed {}.", removed.name),
                    Err(err) => report(&err),
                },
                None => println!("Usage: /remove <index>"),
            },
            "move_source" => match (intent.arg_index(0), intent.arg_index(1)) {
                (Some(from), Some(to)) => match studio.move_source(from, to) {
                    Ok(()) => print_sources(&studio),
                    Err(err) => report(&err),
                },
                _ => println!("Usage: /move <from> <to>"),
            },
            "clear_sources" => {
                studio.clear_sources();
                println!("Sources cleared.");
            }
            "set_background" | "set_lighting" | "set_aspect_ratio" | "set_output_size"
            | "set_fidelity" | "set_reflection" | "set_separation" | "set_blur" => {
                match config_updates(&intent) {
                    Ok(updates) => {
                        for update in updates {
                            studio.update_config(update);
                        }
                        print_config_notes(&studio);
                    }
                    Err(usage) => println!("{usage}"),
                }
            }
            "enhance_background" => match runtime.block_on(studio.enhance_background()) {
                Ok(text) if text.trim().is_empty() => {
                    println!("Set a themed description first (/bg themed <text>).")
                }
                Ok(text) => println!("Background: {text}"),
                Err(err) => report(&err),
            },
            "generate" => {
                println!("Generating...");
                match runtime.block_on(studio.generate()) {
                    Ok(GenerationOutcome::Candidates(count)) => {
                        println!("{count} candidates ready; pick one with /select <index>.");
                        print_written(&studio, out_dir);
                    }
                    Ok(GenerationOutcome::Accepted) => {
                        println!("Image ready.");
                        print_written(&studio, out_dir);
                    }
                    Ok(GenerationOutcome::Discarded) => println!("Result discarded."),
                    Err(err) => report(&err),
                }
            }
            "select_candidate" => match intent.arg_index(0) {
                Some(index) => match studio.select_candidate(index) {
                    Ok(()) => print_written(&studio, out_dir),
                    Err(err) => report(&err),
                },
                None => println!("Usage: /select <index>"),
            },
            "return_to_candidates" => match studio.return_to_candidates() {
                Ok(()) => print_written(&studio, out_dir),
                Err(err) => report(&err),
            },
            "cancel_selection" => match studio.cancel_selection() {
                Ok(()) => println!("Selection cleared."),
                Err(err) => report(&err),
            },
            "navigate_history" => match intent.arg_index(0) {
                Some(index) => match studio.navigate_history(index) {
                    Ok(()) => print_written(&studio, out_dir),
                    Err(err) => report(&err),
                },
                None => println!("Usage: /history <index>"),
            },
            "quick_refine" => {
                let label = intent.arg_str("arg").unwrap_or_default();
                match QuickRefinement::from_label(label) {
                    Some(quick) => {
                        println!("{}...", quick.description());
                        let outcome = runtime.block_on(studio.quick_refine(quick));
                        print_refine(&studio, out_dir, outcome);
                    }
                    None => println!("Usage: /quick brighten|contrast|shadow|sharpen"),
                }
            }
            "refine" => {
                let prompt = intent.prompt.clone().unwrap_or_default();
                println!("Refining...");
                let outcome = runtime.block_on(studio.refine(&prompt));
                print_refine(&studio, out_dir, outcome);
            }
            "enhance_command" => {
                let command = intent.arg_str("arg").unwrap_or_default();
                match runtime.block_on(studio.enhance_command(command)) {
                    Ok(text) => println!("Suggested: {text}"),
                    Err(err) => report(&err),
                }
            }
            "save_current" => {
                let target = match intent.arg_str("path").filter(|raw| !raw.is_empty()) {
                    Some(raw) => PathBuf::from(raw),
                    None => match studio.current_image() {
                        Some(image) => out_dir.join(image_file_name("final", image)),
                        None => {
                            println!("There is no active image to save.");
                            continue;
                        }
                    },
                };
                match studio.save_current(&target) {
                    Ok(()) => println!("Saved {}", target.display()),
                    Err(err) => println!("Save failed: {err:#}"),
                }
            }
            "compare" => {
                let payloads = studio.variant_payloads();
                if let [base, alternate, ..] = payloads.as_slice() {
                    let lines = payload_diff(base, alternate);
                    if lines.is_empty() {
                        println!("The variants share identical instructions.");
                    }
                    for line in lines {
                        println!("{line}");
                    }
                }
            }
            "preset_list" => {
                if studio.presets().is_empty() {
                    println!("No presets saved.");
                }
                for preset in studio.presets() {
                    println!(
                        "{}  ({}, {}, {})",
                        preset.name,
                        preset.config.background.as_str(),
                        preset.config.lighting.as_str(),
                        preset.config.aspect_ratio.as_str()
                    );
                }
            }
            "preset_save" => {
                let name = intent.arg_str("name").unwrap_or_default();
                let exists = studio.preset_exists(name);
                if exists && !confirm(&format!("Preset '{}' exists. Overwrite?", name.trim()))? {
                    println!("Preset not saved.");
                    continue;
                }
                match studio.save_preset(name, exists) {
                    Ok(true) => println!("Preset '{}' overwritten.", name.trim()),
                    Ok(false) => println!("Preset '{}' saved.", name.trim()),
                    Err(err) => report(&err),
                }
            }
            "preset_load" => {
                let name = intent.arg_str("name").unwrap_or_default();
                match studio.load_preset(name) {
                    Ok(()) => println!("Preset '{}' loaded.", name.trim()),
                    Err(err) => report(&err),
                }
            }
            "preset_delete" => {
                let name = intent.arg_str("name").unwrap_or_default();
                if !studio.preset_exists(name) {
                    report(&StudioError::Preset(PresetError::NotFound(
                        name.trim().to_string(),
                    )));
                    continue;
                }
                let confirmed = confirm(&format!("Delete preset '{}'?", name.trim()))?;
                if !confirmed {
                    println!("Preset kept.");
                    continue;
                }
                match studio.delete_preset(name, confirmed) {
                    Ok(()) => println!("Preset '{}' deleted.", name.trim()),
                    Err(err) => report(&err),
                }
            }
            "invalid" => {
                let command = intent.arg_str("command").unwrap_or_default();
                let reason = intent.arg_str("reason").unwrap_or_default();
                println!("/{command}: {reason}");
            }
            "unknown" => {
                let command = intent.arg_str("command").unwrap_or_default();
                println!("Unknown command /{command}. Type /help.");
            }
            other => println!("Unhandled action {other}."),
        }
    }
    Ok(())
}

fn report(err: &StudioError) {
    match err {
        StudioError::NotStarted(reason) => println!("Not started: {reason}."),
        other => println!("Error: {other}"),
    }
}

fn print_refine(studio: &Studio, out_dir: &Path, outcome: Result<RefineOutcome, StudioError>) {
    match outcome {
        Ok(RefineOutcome::Applied { position }) => {
            println!("Refinement applied (step {position}).");
            print_written(studio, out_dir);
        }
        Ok(RefineOutcome::Discarded) => println!("Result discarded."),
        Err(err) => report(&err),
    }
}

fn print_sources(studio: &Studio) {
    for (index, name) in studio.sources().names().iter().enumerate() {
        println!("  [{index}] {name}");
    }
}

fn print_written(studio: &Studio, out_dir: &Path) {
    match write_visible(studio, out_dir) {
        Ok(paths) => {
            for path in paths {
                println!("  {}", path.display());
            }
        }
        Err(err) => println!("Could not write images: {err:#}"),
    }
}

fn print_config_notes(studio: &Studio) {
    let config = studio.config();
    let image_count = studio.sources().len();
    if config.reflection && !config.reflection_enabled() {
        println!("Reflection only applies to solid backgrounds.");
    }
    if config.separate_products && !config.separation_enabled(image_count) {
        println!("Separation only applies to several images on a solid background.");
    }
    if config.background_blur > 0 && !config.blur_enabled() {
        println!("Blur only applies to themed backgrounds.");
    }
    println!(
        "Config: {} / {} / {} / {}",
        config.background.as_str(),
        config.lighting.as_str(),
        config.aspect_ratio.as_str(),
        config.output_size.as_hint()
    );
}

/// Writes the images on display: every candidate while choosing, otherwise
/// the current history entry.
pub(crate) fn write_visible(studio: &Studio, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let images: Vec<(String, &ImageBlob)> = match studio.stage() {
        Stage::Empty => Vec::new(),
        Stage::Selecting { candidates } => candidates
            .images()
            .iter()
            .enumerate()
            .map(|(index, image)| (format!("candidate-{index}"), image))
            .collect(),
        Stage::Editing { history, .. } => {
            vec![(format!("step-{}", history.position()), &history.current().image)]
        }
    };
    if images.is_empty() {
        return Ok(Vec::new());
    }
    ensure_dir(out_dir)?;
    let mut written = Vec::new();
    for (label, image) in images {
        let path = out_dir.join(image_file_name(&label, image));
        std::fs::write(&path, &image.bytes)?;
        written.push(path);
    }
    Ok(written)
}

fn image_file_name(label: &str, image: &ImageBlob) -> String {
    format!("{label}-{}.{}", image.short_id(), image.extension())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

/// Translates a settings command into config updates, or returns its usage line.
fn config_updates(intent: &Intent) -> Result<Vec<ConfigUpdate>, String> {
    let arg = intent.arg_str("arg").unwrap_or_default().trim();
    let mut words = arg.split_whitespace();
    let head = words.next().unwrap_or_default().to_ascii_lowercase();
    match intent.action.as_str() {
        "set_background" => {
            let rest = arg.get(head.len()..).unwrap_or_default().trim().to_string();
            match head.as_str() {
                "white" => Ok(vec![ConfigUpdate::Background(BackgroundMode::SolidWhite)]),
                "gray" | "grey" => Ok(vec![ConfigUpdate::Background(BackgroundMode::SolidGray)]),
                "auto" => Ok(vec![ConfigUpdate::Background(BackgroundMode::AutoThemed)]),
                "themed" => Ok(vec![
                    ConfigUpdate::Background(BackgroundMode::CustomThemed),
                    ConfigUpdate::BackgroundDescription(rest),
                ]),
                _ => Err("Usage: /bg white|gray|auto|themed <description>".to_string()),
            }
        }
        "set_lighting" => match head.as_str() {
            "hard" => Ok(vec![ConfigUpdate::Lighting(LightingStyle::Hard)]),
            "soft" => Ok(vec![ConfigUpdate::Lighting(LightingStyle::Soft)]),
            _ => Err("Usage: /light hard|soft".to_string()),
        },
        "set_aspect_ratio" => AspectRatio::parse(&head)
            .map(|ratio| vec![ConfigUpdate::AspectRatio(ratio)])
            .ok_or_else(|| "Usage: /ratio 1:1|4:5|16:9".to_string()),
        "set_output_size" => match head.as_str() {
            "2k" => Ok(vec![ConfigUpdate::OutputSize(OutputSize::TwoK)]),
            "4k" => Ok(vec![ConfigUpdate::OutputSize(OutputSize::FourK)]),
            _ => Err("Usage: /size 2k|4k".to_string()),
        },
        "set_fidelity" => match head.as_str() {
            "exact" => Ok(vec![ConfigUpdate::Fidelity(FidelityMode::PreserveExact)]),
            "enhance" => Ok(vec![ConfigUpdate::Fidelity(FidelityMode::Enhance)]),
            _ => Err("Usage: /fidelity exact|enhance".to_string()),
        },
        "set_reflection" => parse_switch(&head)
            .map(|flag| vec![ConfigUpdate::Reflection(flag)])
            .ok_or_else(|| "Usage: /reflection on|off".to_string()),
        "set_separation" => {
            let usage = || "Usage: /separate on|off [intensity]".to_string();
            let flag = parse_switch(&head).ok_or_else(usage)?;
            let mut updates = vec![ConfigUpdate::SeparateProducts(flag)];
            if let Some(raw) = words.next() {
                let level = raw.parse::<u64>().map_err(|_| usage())?;
                updates.push(ConfigUpdate::Separation(clamp_level(level)));
            }
            Ok(updates)
        }
        "set_blur" => intent
            .arg_index(0)
            .map(|level| vec![ConfigUpdate::BackgroundBlur(clamp_level(level as u64))])
            .ok_or_else(|| "Usage: /blur <intensity>".to_string()),
        other => Err(format!("{other} is not a settings command")),
    }
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn clamp_level(level: u64) -> u8 {
    level.min(u64::from(u8::MAX)) as u8
}
