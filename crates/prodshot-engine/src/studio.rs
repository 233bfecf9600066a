use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use futures::future::join_all;
use prodshot_contracts::blob::ImageBlob;
use prodshot_contracts::config::{ConfigUpdate, Configuration};
use prodshot_contracts::errors::{PresetError, ValidationError};
use prodshot_contracts::events::EventWriter;
use prodshot_contracts::gate::{ConcurrencyGate, GatePermit};
use prodshot_contracts::presets::{Preset, PresetStore};
use prodshot_contracts::prompts::{
    build, build_refinement, EnhanceKind, QuickRefinement, RequestPayload,
};
use prodshot_contracts::sources::{SourceImage, SourceList};
use prodshot_contracts::stage::{CandidateSet, Stage};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::providers::{error_chain_text, ImageService, TextService};

/// Requests issued per generation: the base take and one alternate.
pub const VARIANT_COUNT: usize = 2;
const ERROR_TEXT_MAX: usize = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NotStartedReason {
    #[error("a generation or refinement is already in progress")]
    Busy,
    #[error("too many requests are in flight; try again when one finishes")]
    Saturated,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StudioError {
    /// Admission refused. Nothing changed.
    #[error("cannot start now: {0}")]
    NotStarted(NotStartedReason),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The image service failed; the reason is passed through verbatim.
    #[error("{0}")]
    Remote(String),
    #[error(transparent)]
    Preset(#[from] PresetError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Several variants succeeded and wait for a choice.
    Candidates(usize),
    /// Exactly one variant succeeded and became history entry 0.
    Accepted,
    /// The session moved on while the requests were out.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefineOutcome {
    Applied { position: usize },
    Discarded,
}

/// Admitted generation whose remote calls have not run yet. Holds the gate
/// slot until the calls settle or the job is dropped.
pub struct PendingGeneration {
    ticket: u64,
    permit: GatePermit,
    service: Arc<dyn ImageService>,
    payloads: Vec<RequestPayload>,
    images: Vec<ImageBlob>,
}

impl PendingGeneration {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn payloads(&self) -> &[RequestPayload] {
        &self.payloads
    }

    /// Issues every variant at once and waits for all of them.
    pub async fn run(self) -> SettledGeneration {
        let Self {
            ticket,
            permit,
            service,
            payloads,
            images,
        } = self;
        let calls = payloads
            .iter()
            .map(|payload| service.generate_image(payload, &images));
        let outcomes = join_all(calls)
            .await
            .into_iter()
            .map(|outcome| outcome.map_err(|err| error_chain_text(&err, ERROR_TEXT_MAX)))
            .collect();
        drop(permit);
        SettledGeneration { ticket, outcomes }
    }
}

pub struct SettledGeneration {
    ticket: u64,
    outcomes: Vec<Result<ImageBlob, String>>,
}

impl SettledGeneration {
    pub fn outcomes(&self) -> &[Result<ImageBlob, String>] {
        &self.outcomes
    }
}

pub struct PendingRefinement {
    ticket: u64,
    permit: GatePermit,
    service: Arc<dyn ImageService>,
    payload: RequestPayload,
    base: ImageBlob,
    command: String,
}

impl PendingRefinement {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn payload(&self) -> &RequestPayload {
        &self.payload
    }

    pub async fn run(self) -> SettledRefinement {
        let Self {
            ticket,
            permit,
            service,
            payload,
            base,
            command,
        } = self;
        let outcome = service
            .generate_image(&payload, std::slice::from_ref(&base))
            .await
            .map_err(|err| error_chain_text(&err, ERROR_TEXT_MAX));
        drop(permit);
        SettledRefinement {
            ticket,
            command,
            outcome,
        }
    }
}

pub struct SettledRefinement {
    ticket: u64,
    command: String,
    outcome: Result<ImageBlob, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryView {
    pub id: String,
    pub command: Option<String>,
}

/// Serializable projection of a session for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudioView {
    pub config: Configuration,
    pub sources: Vec<String>,
    pub stage: &'static str,
    pub candidates: Vec<String>,
    pub history: Vec<HistoryView>,
    pub position: Option<usize>,
    pub loading: bool,
    pub error: Option<String>,
    pub quick_in_flight: Option<&'static str>,
    pub in_flight: usize,
    pub max_in_flight: usize,
}

/// One editing session: configuration, source photos, the candidate/history
/// stage and the loading/error state, changed only through the methods below.
pub struct Studio {
    image_service: Arc<dyn ImageService>,
    text_service: Arc<dyn TextService>,
    gate: ConcurrencyGate,
    presets: PresetStore,
    events: Option<EventWriter>,
    config: Configuration,
    sources: SourceList,
    stage: Stage,
    loading: bool,
    error: Option<String>,
    quick_in_flight: Option<QuickRefinement>,
    next_ticket: u64,
    active_ticket: Option<u64>,
}

impl Studio {
    pub fn new(
        image_service: Arc<dyn ImageService>,
        text_service: Arc<dyn TextService>,
        presets: PresetStore,
        gate: ConcurrencyGate,
    ) -> Self {
        Self {
            image_service,
            text_service,
            gate,
            presets,
            events: None,
            config: Configuration::default(),
            sources: SourceList::new(),
            stage: Stage::Empty,
            loading: false,
            error: None,
            quick_in_flight: None,
            next_ticket: 0,
            active_ticket: None,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self.emit(
            "session_started",
            json!({
                "image_service": self.image_service.name(),
                "max_in_flight": self.gate.max(),
            }),
        );
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn sources(&self) -> &SourceList {
        &self.sources
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn candidates(&self) -> Option<&CandidateSet> {
        self.stage.candidates()
    }

    pub fn current_image(&self) -> Option<&ImageBlob> {
        self.stage.current_image()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn quick_in_flight(&self) -> Option<QuickRefinement> {
        self.quick_in_flight
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    pub fn snapshot(&self) -> StudioView {
        let history = self.stage.history();
        StudioView {
            config: self.config.clone(),
            sources: self.sources.names(),
            stage: self.stage.tag(),
            candidates: self
                .stage
                .candidates()
                .map(|set| set.images().iter().map(ImageBlob::short_id).collect())
                .unwrap_or_default(),
            history: history
                .map(|history| {
                    history
                        .entries()
                        .iter()
                        .map(|entry| HistoryView {
                            id: entry.image.short_id(),
                            command: entry.command.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            position: history.map(|history| history.position()),
            loading: self.loading,
            error: self.error.clone(),
            quick_in_flight: self.quick_in_flight.map(QuickRefinement::label),
            in_flight: self.gate.in_flight(),
            max_in_flight: self.gate.max(),
        }
    }

    // Guards

    fn ensure_idle(&self) -> Result<(), StudioError> {
        if self.loading {
            return Err(StudioError::NotStarted(NotStartedReason::Busy));
        }
        Ok(())
    }

    fn ensure_admissible(&self) -> Result<(), StudioError> {
        if self.gate.is_saturated() {
            return Err(StudioError::NotStarted(NotStartedReason::Saturated));
        }
        Ok(())
    }

    /// Whether `generate` would start right now.
    pub fn can_generate(&self) -> Result<(), StudioError> {
        self.ensure_idle()?;
        if self.sources.is_empty() {
            return Err(ValidationError::NoSourceImages.into());
        }
        self.ensure_admissible()
    }

    /// Whether `refine(command)` would start right now.
    pub fn can_refine(&self, command: &str) -> Result<(), StudioError> {
        self.ensure_idle()?;
        if self.stage.current_image().is_none() {
            return Err(ValidationError::NoActiveImage.into());
        }
        if command.trim().is_empty() {
            return Err(ValidationError::EmptyCommand.into());
        }
        self.ensure_admissible()
    }

    /// Every failure except refused admission becomes the visible error.
    /// A refused admission leaves the state untouched.
    fn reject(&mut self, err: StudioError) -> StudioError {
        if !matches!(err, StudioError::NotStarted(_)) {
            self.error = Some(err.to_string());
        }
        tracing::debug!(error = %err, "operation refused");
        err
    }

    fn start(&mut self, quick: Option<QuickRefinement>) -> u64 {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.active_ticket = Some(ticket);
        self.loading = true;
        self.error = None;
        self.quick_in_flight = quick;
        ticket
    }

    /// Ends the loading state for `ticket`. False when the ticket is no
    /// longer the active one.
    fn settle(&mut self, ticket: u64) -> bool {
        if self.active_ticket != Some(ticket) {
            return false;
        }
        self.active_ticket = None;
        self.loading = false;
        self.quick_in_flight = None;
        true
    }

    fn invalidate_pending(&mut self) {
        if let Some(ticket) = self.active_ticket.take() {
            tracing::debug!(ticket, "pending request invalidated");
        }
        self.loading = false;
        self.quick_in_flight = None;
    }

    // Generation

    pub fn variant_payloads(&self) -> Vec<RequestPayload> {
        let count = self.sources.len().max(1);
        (0..VARIANT_COUNT)
            .map(|index| build(&self.config, count, index > 0))
            .collect()
    }

    pub fn begin_generate(&mut self) -> Result<PendingGeneration, StudioError> {
        if let Err(err) = self.can_generate() {
            return Err(self.reject(err));
        }
        let Some(permit) = self.gate.try_permit() else {
            return Err(StudioError::NotStarted(NotStartedReason::Saturated));
        };
        let payloads = self.variant_payloads();
        let images = self.sources.images();
        let ticket = self.start(None);
        self.stage = Stage::Empty;

        tracing::debug!(ticket, variants = payloads.len(), "generation started");
        self.emit(
            "generation_started",
            json!({
                "ticket": ticket,
                "variants": payloads.len(),
                "sources": self.sources.names(),
                "config": self.config,
            }),
        );
        Ok(PendingGeneration {
            ticket,
            permit,
            service: Arc::clone(&self.image_service),
            payloads,
            images,
        })
    }

    pub fn finish_generate(
        &mut self,
        settled: SettledGeneration,
    ) -> Result<GenerationOutcome, StudioError> {
        if !self.settle(settled.ticket) {
            tracing::warn!(ticket = settled.ticket, "discarding stale generation result");
            return Ok(GenerationOutcome::Discarded);
        }

        let mut images = Vec::new();
        let mut first_error = None;
        for (index, outcome) in settled.outcomes.into_iter().enumerate() {
            match outcome {
                Ok(image) => {
                    self.emit(
                        "variant_settled",
                        json!({ "index": index, "ok": true, "image": image.short_id() }),
                    );
                    images.push(image);
                }
                Err(reason) => {
                    self.emit(
                        "variant_settled",
                        json!({ "index": index, "ok": false, "error": reason }),
                    );
                    first_error.get_or_insert(reason);
                }
            }
        }

        let Some(stage) = Stage::from_generation(images) else {
            let reason =
                first_error.unwrap_or_else(|| "the image service returned nothing".to_string());
            tracing::warn!(error = %reason, "generation failed");
            self.error = Some(reason.clone());
            self.emit("generation_failed", json!({ "error": reason }));
            return Err(StudioError::Remote(reason));
        };

        self.stage = stage;
        if let Some(candidates) = self.stage.candidates() {
            let ids: Vec<String> = candidates.images().iter().map(ImageBlob::short_id).collect();
            self.emit("candidates_ready", json!({ "candidates": ids }));
            return Ok(GenerationOutcome::Candidates(ids.len()));
        }
        let id = self.current_image().map(ImageBlob::short_id);
        self.emit("history_started", json!({ "image": id }));
        Ok(GenerationOutcome::Accepted)
    }

    pub async fn generate(&mut self) -> Result<GenerationOutcome, StudioError> {
        let pending = self.begin_generate()?;
        let settled = pending.run().await;
        self.finish_generate(settled)
    }

    // Refinement

    pub fn begin_refine(&mut self, command: &str) -> Result<PendingRefinement, StudioError> {
        self.begin_refinement(command, None)
    }

    pub fn begin_quick_refine(
        &mut self,
        quick: QuickRefinement,
    ) -> Result<PendingRefinement, StudioError> {
        self.begin_refinement(quick.command(), Some(quick))
    }

    fn begin_refinement(
        &mut self,
        command: &str,
        quick: Option<QuickRefinement>,
    ) -> Result<PendingRefinement, StudioError> {
        if let Err(err) = self.can_refine(command) {
            return Err(self.reject(err));
        }
        let Some(base) = self.current_image().cloned() else {
            return Err(self.reject(ValidationError::NoActiveImage.into()));
        };
        let Some(permit) = self.gate.try_permit() else {
            return Err(StudioError::NotStarted(NotStartedReason::Saturated));
        };
        let command = command.trim().to_string();
        let payload = build_refinement(&command, &self.config);
        let ticket = self.start(quick);

        tracing::debug!(ticket, command = %command, "refinement started");
        self.emit(
            "refinement_started",
            json!({
                "ticket": ticket,
                "command": command,
                "quick": quick.map(QuickRefinement::label),
                "base": base.short_id(),
            }),
        );
        Ok(PendingRefinement {
            ticket,
            permit,
            service: Arc::clone(&self.image_service),
            payload,
            base,
            command,
        })
    }

    pub fn finish_refine(
        &mut self,
        settled: SettledRefinement,
    ) -> Result<RefineOutcome, StudioError> {
        if !self.settle(settled.ticket) {
            tracing::warn!(ticket = settled.ticket, "discarding stale refinement result");
            return Ok(RefineOutcome::Discarded);
        }
        match settled.outcome {
            Ok(image) => {
                let id = image.short_id();
                let Some(history) = self.stage.history_mut() else {
                    tracing::warn!("refinement settled without a lineage; discarding");
                    return Ok(RefineOutcome::Discarded);
                };
                history.apply_refinement(image, settled.command.clone());
                let position = history.position();
                self.emit(
                    "refinement_applied",
                    json!({ "command": settled.command, "image": id, "position": position }),
                );
                Ok(RefineOutcome::Applied { position })
            }
            Err(reason) => {
                tracing::warn!(error = %reason, "refinement failed");
                self.error = Some(reason.clone());
                self.emit(
                    "refinement_failed",
                    json!({ "command": settled.command, "error": reason }),
                );
                Err(StudioError::Remote(reason))
            }
        }
    }

    pub async fn refine(&mut self, command: &str) -> Result<RefineOutcome, StudioError> {
        let pending = self.begin_refine(command)?;
        let settled = pending.run().await;
        self.finish_refine(settled)
    }

    pub async fn quick_refine(
        &mut self,
        quick: QuickRefinement,
    ) -> Result<RefineOutcome, StudioError> {
        let pending = self.begin_quick_refine(quick)?;
        let settled = pending.run().await;
        self.finish_refine(settled)
    }

    // Candidates and history

    pub fn select_candidate(&mut self, index: usize) -> Result<(), StudioError> {
        self.ensure_idle()?;
        if let Err(err) = self.stage.select_candidate(index) {
            return Err(self.reject(err.into()));
        }
        self.error = None;
        let id = self.current_image().map(ImageBlob::short_id);
        self.emit("candidate_selected", json!({ "index": index, "image": id }));
        Ok(())
    }

    pub fn return_to_candidates(&mut self) -> Result<(), StudioError> {
        self.ensure_idle()?;
        if let Err(err) = self.stage.return_to_candidates() {
            return Err(self.reject(err.into()));
        }
        self.error = None;
        self.emit("returned_to_candidates", json!({}));
        Ok(())
    }

    pub fn cancel_selection(&mut self) -> Result<(), StudioError> {
        self.ensure_idle()?;
        if let Err(err) = self.stage.cancel_selection() {
            return Err(self.reject(err.into()));
        }
        self.error = None;
        Ok(())
    }

    pub fn navigate_history(&mut self, index: usize) -> Result<(), StudioError> {
        self.ensure_idle()?;
        if let Err(err) = self.stage.navigate(index) {
            return Err(self.reject(err.into()));
        }
        self.error = None;
        self.emit("history_navigated", json!({ "position": index }));
        Ok(())
    }

    // Configuration and presets

    pub fn update_config(&mut self, update: ConfigUpdate) {
        self.config = self.config.update_field(update);
        self.error = None;
    }

    pub fn presets(&self) -> &[Preset] {
        self.presets.list()
    }

    pub fn preset_exists(&self, name: &str) -> bool {
        self.presets.exists(name)
    }

    /// Returns true when an existing preset was overwritten.
    pub fn save_preset(&mut self, name: &str, overwrite_confirmed: bool) -> Result<bool, StudioError> {
        let replaced = match self.presets.save(name, &self.config, overwrite_confirmed) {
            Ok(replaced) => replaced,
            Err(err) => return Err(self.reject(err.into())),
        };
        self.error = None;
        self.emit(
            "preset_saved",
            json!({ "name": name.trim(), "replaced": replaced }),
        );
        Ok(replaced)
    }

    pub fn load_preset(&mut self, name: &str) -> Result<(), StudioError> {
        match self.presets.load(name) {
            Ok(config) => self.config = config,
            Err(err) => return Err(self.reject(err.into())),
        }
        self.error = None;
        self.emit("preset_loaded", json!({ "name": name.trim() }));
        Ok(())
    }

    pub fn delete_preset(&mut self, name: &str, confirmed: bool) -> Result<(), StudioError> {
        if let Err(err) = self.presets.delete(name, confirmed) {
            return Err(self.reject(err.into()));
        }
        self.error = None;
        self.emit("preset_deleted", json!({ "name": name.trim() }));
        Ok(())
    }

    // Prompt enhancement

    /// Rewrites the background description through the text service. Keeps
    /// the original text when the service fails.
    pub async fn enhance_background(&mut self) -> Result<String, StudioError> {
        self.ensure_idle()?;
        let original = self.config.background_description.clone();
        if original.trim().is_empty() {
            return Ok(original);
        }
        let enhanced = self.enhance(&original, EnhanceKind::Background).await;
        self.update_config(ConfigUpdate::BackgroundDescription(enhanced.clone()));
        Ok(enhanced)
    }

    /// Improved wording for a refinement command, or the command unchanged.
    pub async fn enhance_command(&self, command: &str) -> Result<String, StudioError> {
        self.ensure_idle()?;
        if command.trim().is_empty() {
            return Ok(command.to_string());
        }
        Ok(self.enhance(command, EnhanceKind::Refinement).await)
    }

    async fn enhance(&self, text: &str, kind: EnhanceKind) -> String {
        match self.text_service.enhance_text(text, kind).await {
            Ok(enhanced) if !enhanced.trim().is_empty() => enhanced.trim().to_string(),
            Ok(_) => {
                tracing::warn!(kind = kind.as_str(), "enhancement came back empty; keeping original");
                text.to_string()
            }
            Err(err) => {
                tracing::warn!(
                    kind = kind.as_str(),
                    error = %error_chain_text(&err, ERROR_TEXT_MAX),
                    "enhancement failed; keeping original"
                );
                text.to_string()
            }
        }
    }

    // Sources

    pub fn add_sources(&mut self, items: Vec<SourceImage>) {
        if items.is_empty() {
            return;
        }
        self.sources.extend(items);
        self.sources_changed();
    }

    pub fn remove_source(&mut self, index: usize) -> Result<SourceImage, StudioError> {
        let removed = match self.sources.remove(index) {
            Ok(removed) => removed,
            Err(err) => return Err(self.reject(err.into())),
        };
        self.sources_changed();
        Ok(removed)
    }

    pub fn move_source(&mut self, from: usize, to: usize) -> Result<(), StudioError> {
        if let Err(err) = self.sources.move_item(from, to) {
            return Err(self.reject(err.into()));
        }
        self.sources_changed();
        Ok(())
    }

    pub fn clear_sources(&mut self) {
        self.sources.clear();
        self.sources_changed();
    }

    /// Results belong to the source list they were made from.
    fn sources_changed(&mut self) {
        self.invalidate_pending();
        self.stage = Stage::Empty;
        self.error = None;
        self.emit("sources_changed", json!({ "sources": self.sources.names() }));
    }

    /// Back to an empty session. Configuration and presets are kept.
    pub fn reset(&mut self) {
        self.sources.clear();
        self.invalidate_pending();
        self.stage = Stage::Empty;
        self.error = None;
    }

    pub fn save_current(&self, path: &Path) -> anyhow::Result<()> {
        let image = self
            .current_image()
            .ok_or(ValidationError::NoActiveImage)?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, &image.bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    fn emit(&self, event_type: &str, payload: Value) {
        let Some(events) = &self.events else {
            return;
        };
        if let Err(err) = events.emit(event_type, payload) {
            tracing::warn!(event_type, error = %err, "failed to append event");
        }
    }
}
