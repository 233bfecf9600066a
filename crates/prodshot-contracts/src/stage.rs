use crate::blob::ImageBlob;
use crate::errors::ValidationError;
use crate::history::History;

/// Alternatives from one generation, awaiting a choice. Always holds at least
/// two images; a lone result goes straight into a [`History`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSet {
    images: Vec<ImageBlob>,
}

impl CandidateSet {
    pub fn new(images: Vec<ImageBlob>) -> Option<Self> {
        (images.len() >= 2).then_some(Self { images })
    }

    pub fn images(&self) -> &[ImageBlob] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// What the session is showing: nothing yet, a candidate choice, or an
/// accepted lineage. The candidates picked from stay attached to the lineage
/// so the user can go back to them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Empty,
    Selecting {
        candidates: CandidateSet,
    },
    Editing {
        history: History,
        candidates: Option<CandidateSet>,
    },
}

impl Stage {
    /// Resolves the successful images of one generation. `None` when nothing
    /// succeeded.
    pub fn from_generation(mut images: Vec<ImageBlob>) -> Option<Stage> {
        match images.len() {
            0 => None,
            1 => Some(Stage::Editing {
                history: History::start(images.remove(0)),
                candidates: None,
            }),
            _ => CandidateSet::new(images).map(|candidates| Stage::Selecting { candidates }),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Stage::Empty => "empty",
            Stage::Selecting { .. } => "selecting",
            Stage::Editing { .. } => "editing",
        }
    }

    pub fn history(&self) -> Option<&History> {
        match self {
            Stage::Editing { history, .. } => Some(history),
            _ => None,
        }
    }

    pub fn history_mut(&mut self) -> Option<&mut History> {
        match self {
            Stage::Editing { history, .. } => Some(history),
            _ => None,
        }
    }

    pub fn candidates(&self) -> Option<&CandidateSet> {
        match self {
            Stage::Selecting { candidates } => Some(candidates),
            Stage::Editing { candidates, .. } => candidates.as_ref(),
            Stage::Empty => None,
        }
    }

    pub fn current_image(&self) -> Option<&ImageBlob> {
        self.history().map(|history| &history.current().image)
    }

    /// Starts a fresh single-entry lineage from one candidate.
    pub fn select_candidate(&mut self, index: usize) -> Result<(), ValidationError> {
        let Stage::Selecting { candidates } = &*self else {
            return Err(ValidationError::NotSelecting);
        };
        let Some(image) = candidates.images.get(index).cloned() else {
            return Err(ValidationError::IndexOutOfRange {
                index,
                len: candidates.len(),
            });
        };
        let candidates = candidates.clone();
        *self = Stage::Editing {
            history: History::start(image),
            candidates: Some(candidates),
        };
        Ok(())
    }

    /// Drops the lineage and shows the retained candidates again.
    pub fn return_to_candidates(&mut self) -> Result<(), ValidationError> {
        match std::mem::take(self) {
            Stage::Editing {
                candidates: Some(candidates),
                ..
            } => {
                *self = Stage::Selecting { candidates };
                Ok(())
            }
            other => {
                *self = other;
                Err(ValidationError::NoCandidates)
            }
        }
    }

    /// Discards the candidate set while leaving any lineage in place.
    pub fn cancel_selection(&mut self) -> Result<(), ValidationError> {
        if matches!(self, Stage::Selecting { .. }) {
            *self = Stage::Empty;
            return Ok(());
        }
        match self {
            Stage::Editing { candidates, .. } if candidates.is_some() => {
                *candidates = None;
                Ok(())
            }
            _ => Err(ValidationError::NoCandidates),
        }
    }

    pub fn navigate(&mut self, index: usize) -> Result<(), ValidationError> {
        self.history_mut()
            .ok_or(ValidationError::NoActiveImage)?
            .navigate(index)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    fn img(tag: u8) -> ImageBlob {
        ImageBlob::new(vec![tag], "image/png")
    }

    fn generated(images: Vec<ImageBlob>) -> anyhow::Result<Stage> {
        Stage::from_generation(images).context("generation produced no stage")
    }

    #[test]
    fn generation_resolution_policy() {
        assert_eq!(Stage::from_generation(Vec::new()), None);

        let single = Stage::from_generation(vec![img(1)]);
        let Some(Stage::Editing {
            history,
            candidates,
        }) = single
        else {
            panic!("single result should start a lineage");
        };
        assert_eq!(history.len(), 1);
        assert_eq!(history.current().image, img(1));
        assert!(candidates.is_none());

        let pair = Stage::from_generation(vec![img(1), img(2)]);
        assert!(matches!(pair, Some(Stage::Selecting { ref candidates }) if candidates.len() == 2));
        assert!(pair.as_ref().and_then(Stage::history).is_none());
    }

    #[test]
    fn select_then_return_restores_candidates() -> anyhow::Result<()> {
        let mut stage = generated(vec![img(1), img(2)])?;
        stage.select_candidate(1)?;
        assert_eq!(stage.tag(), "editing");
        assert_eq!(stage.current_image(), Some(&img(2)));
        assert_eq!(stage.candidates().map(CandidateSet::len), Some(2));

        stage.return_to_candidates()?;
        assert_eq!(stage.tag(), "selecting");
        assert!(stage.history().is_none());
        assert_eq!(stage.candidates().map(CandidateSet::len), Some(2));
        Ok(())
    }

    #[test]
    fn select_rejects_bad_index_and_wrong_stage() -> anyhow::Result<()> {
        let mut stage = generated(vec![img(1), img(2)])?;
        assert_eq!(
            stage.select_candidate(5),
            Err(ValidationError::IndexOutOfRange { index: 5, len: 2 })
        );
        assert_eq!(stage.tag(), "selecting");

        let mut empty = Stage::Empty;
        assert_eq!(empty.select_candidate(0), Err(ValidationError::NotSelecting));
        Ok(())
    }

    #[test]
    fn return_without_candidates_leaves_lineage_alone() -> anyhow::Result<()> {
        let mut stage = generated(vec![img(1)])?;
        assert_eq!(stage.return_to_candidates(), Err(ValidationError::NoCandidates));
        assert_eq!(stage.current_image(), Some(&img(1)));
        Ok(())
    }

    #[test]
    fn cancel_selection_clears_candidates_independently() -> anyhow::Result<()> {
        let mut selecting = generated(vec![img(1), img(2)])?;
        selecting.cancel_selection()?;
        assert_eq!(selecting, Stage::Empty);

        let mut editing = generated(vec![img(1), img(2)])?;
        editing.select_candidate(0)?;
        editing.cancel_selection()?;
        assert_eq!(editing.current_image(), Some(&img(1)));
        assert!(editing.candidates().is_none());
        assert_eq!(editing.return_to_candidates(), Err(ValidationError::NoCandidates));
        Ok(())
    }

    #[test]
    fn navigate_needs_a_lineage() {
        let mut stage = Stage::Empty;
        assert_eq!(stage.navigate(0), Err(ValidationError::NoActiveImage));
    }
}
