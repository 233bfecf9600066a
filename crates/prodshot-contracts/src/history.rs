use crate::blob::ImageBlob;
use crate::errors::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub image: ImageBlob,
    /// Command that produced this entry from its predecessor; `None` at index 0.
    pub command: Option<String>,
}

/// One edit lineage: a stack with a movable cursor. Refining from an earlier
/// position drops everything after it before appending, so there is never
/// more than one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: Vec<HistoryEntry>,
    position: usize,
}

impl History {
    pub fn start(image: ImageBlob) -> Self {
        Self {
            entries: vec![HistoryEntry {
                image,
                command: None,
            }],
            position: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn current(&self) -> &HistoryEntry {
        &self.entries[self.position]
    }

    pub fn navigate(&mut self, index: usize) -> Result<(), ValidationError> {
        if index >= self.entries.len() {
            return Err(ValidationError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        self.position = index;
        Ok(())
    }

    /// Truncates after the cursor, appends `image` and moves the cursor onto it.
    pub fn apply_refinement(&mut self, image: ImageBlob, command: impl Into<String>) {
        self.entries.truncate(self.position + 1);
        self.entries.push(HistoryEntry {
            image,
            command: Some(command.into()),
        });
        self.position = self.entries.len() - 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img(tag: u8) -> ImageBlob {
        ImageBlob::new(vec![tag], "image/png")
    }

    #[test]
    fn refine_appends_and_advances() {
        let mut history = History::start(img(0));
        history.apply_refinement(img(1), "add shadow");
        assert_eq!(history.len(), 2);
        assert_eq!(history.position(), 1);
        assert_eq!(history.current().image, img(1));
        assert_eq!(history.current().command.as_deref(), Some("add shadow"));
    }

    #[test]
    fn refining_from_earlier_position_overwrites_branch() -> anyhow::Result<()> {
        let mut history = History::start(img(0));
        history.apply_refinement(img(1), "add shadow");
        history.navigate(0)?;
        history.apply_refinement(img(2), "brighten");

        let images: Vec<ImageBlob> = history
            .entries()
            .iter()
            .map(|entry| entry.image.clone())
            .collect();
        assert_eq!(images, vec![img(0), img(2)]);
        assert_eq!(history.position(), 1);
        Ok(())
    }

    #[test]
    fn truncate_then_append_law() -> anyhow::Result<()> {
        for n in 2..6usize {
            for k in 0..n.saturating_sub(1) {
                let mut history = History::start(img(0));
                for step in 1..=n {
                    history.apply_refinement(img(step as u8), format!("step {step}"));
                }
                let before: Vec<HistoryEntry> = history.entries()[..=k].to_vec();
                history.navigate(k)?;
                history.apply_refinement(img(200), "again");

                assert_eq!(history.len(), k + 2);
                assert_eq!(&history.entries()[..=k], before.as_slice());
                assert_eq!(history.position(), k + 1);
            }
        }
        Ok(())
    }

    #[test]
    fn navigate_is_idempotent() -> anyhow::Result<()> {
        let mut history = History::start(img(0));
        history.apply_refinement(img(1), "a");
        history.apply_refinement(img(2), "b");
        let snapshot = history.entries().to_vec();

        history.navigate(1)?;
        history.navigate(1)?;
        assert_eq!(history.position(), 1);
        assert_eq!(history.entries(), snapshot.as_slice());
        Ok(())
    }

    #[test]
    fn navigate_rejects_out_of_range() {
        let mut history = History::start(img(0));
        assert_eq!(
            history.navigate(3),
            Err(ValidationError::IndexOutOfRange { index: 3, len: 1 })
        );
        assert_eq!(history.position(), 0);
    }
}
