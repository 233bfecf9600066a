use thiserror::Error;

/// Input rejected before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upload at least one image to start")]
    NoSourceImages,
    #[error("the refinement command is empty")]
    EmptyCommand,
    #[error("there is no active image to refine; generate one first")]
    NoActiveImage,
    #[error("{}", duplicate_sku_message(repeated, already_loaded))]
    DuplicateSkus {
        repeated: Vec<String>,
        already_loaded: Vec<String>,
    },
    #[error("index {index} is out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("no candidate set is awaiting selection")]
    NotSelecting,
    #[error("there are no candidates to return to")]
    NoCandidates,
}

fn duplicate_sku_message(repeated: &[String], already_loaded: &[String]) -> String {
    let mut parts = Vec::new();
    if !repeated.is_empty() {
        parts.push(format!("SKUs repeated in the input: {}.", repeated.join(", ")));
    }
    if !already_loaded.is_empty() {
        parts.push(format!(
            "SKUs already loaded: {}.",
            already_loaded.join(", ")
        ));
    }
    parts.push("Remove the duplicates to continue.".to_string());
    parts.join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresetError {
    #[error("preset name is empty")]
    EmptyName,
    #[error("preset '{0}' already exists; confirm to overwrite it")]
    OverwriteNotConfirmed(String),
    #[error("deleting preset '{0}' needs confirmation")]
    DeleteNotConfirmed(String),
    #[error("preset '{0}' not found")]
    NotFound(String),
    #[error("preset store failed: {0}")]
    Store(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_sku_message_enumerates_both_lists() {
        let err = ValidationError::DuplicateSkus {
            repeated: vec!["881".to_string()],
            already_loaded: vec!["123".to_string(), "456".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "SKUs repeated in the input: 881. SKUs already loaded: 123, 456. Remove the duplicates to continue."
        );
    }

    #[test]
    fn duplicate_sku_message_skips_empty_list() {
        let err = ValidationError::DuplicateSkus {
            repeated: Vec::new(),
            already_loaded: vec!["123".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "SKUs already loaded: 123. Remove the duplicates to continue."
        );
    }
}
