mod enhance;
mod generation;
mod refinement;

use serde::{Deserialize, Serialize};
use similar::TextDiff;

use crate::config::{AspectRatio, OutputSize};

pub use enhance::{build_enhancement, EnhanceKind};
pub use generation::{blur_description, build, separation_description};
pub use refinement::{build_refinement, QuickRefinement};

/// Fully resolved request for the remote image service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPayload {
    pub instructions: String,
    pub variant: bool,
    pub image_count: usize,
    pub aspect_ratio: AspectRatio,
    pub output_size: OutputSize,
}

/// Unified line diff between the instructions of two payloads.
pub fn payload_diff(prev: &RequestPayload, curr: &RequestPayload) -> Vec<String> {
    let diff = TextDiff::from_lines(prev.instructions.as_str(), curr.instructions.as_str());
    diff.unified_diff()
        .header("prev", "curr")
        .to_string()
        .lines()
        .map(str::to_string)
        .collect()
}
