use indexmap::IndexSet;

use crate::blob::ImageBlob;
use crate::errors::ValidationError;

/// A user-provided product photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub name: String,
    pub image: ImageBlob,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, image: ImageBlob) -> Self {
        Self {
            name: name.into(),
            image,
        }
    }

    /// Deduplication key: the name up to its first dot.
    pub fn key(&self) -> &str {
        name_key(&self.name)
    }
}

pub fn name_key(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Ordered, user-reorderable list of source photos.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceList {
    items: Vec<SourceImage>,
}

impl SourceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[SourceImage] {
        &self.items
    }

    pub fn images(&self) -> Vec<ImageBlob> {
        self.items.iter().map(|item| item.image.clone()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.items.iter().map(|item| item.name.clone()).collect()
    }

    pub fn keys(&self) -> IndexSet<String> {
        self.items.iter().map(|item| item.key().to_string()).collect()
    }

    pub fn push(&mut self, item: SourceImage) {
        self.items.push(item);
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = SourceImage>) {
        self.items.extend(items);
    }

    pub fn remove(&mut self, index: usize) -> Result<SourceImage, ValidationError> {
        if index >= self.items.len() {
            return Err(ValidationError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        Ok(self.items.remove(index))
    }

    /// Moves the item at `from` so it ends up at `to`.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), ValidationError> {
        let len = self.items.len();
        for index in [from, to] {
            if index >= len {
                return Err(ValidationError::IndexOutOfRange { index, len });
            }
        }
        let item = self.items.remove(from);
        self.items.insert(to, item);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Splits a comma-separated SKU field, trimming and dropping blanks.
pub fn parse_sku_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|sku| !sku.is_empty())
        .map(str::to_string)
        .collect()
}

/// Rejects a SKU batch that repeats itself or names something already
/// uploaded. Runs before any lookup is attempted.
pub fn check_duplicate_skus(
    skus: &[String],
    existing: &IndexSet<String>,
) -> Result<(), ValidationError> {
    let mut seen = IndexSet::new();
    let mut repeated = IndexSet::new();
    for sku in skus {
        let key = name_key(sku).to_string();
        if !seen.insert(key.clone()) {
            repeated.insert(key);
        }
    }
    let already_loaded: Vec<String> = seen
        .iter()
        .filter(|key| existing.contains(*key))
        .cloned()
        .collect();

    if repeated.is_empty() && already_loaded.is_empty() {
        return Ok(());
    }
    Err(ValidationError::DuplicateSkus {
        repeated: repeated.into_iter().collect(),
        already_loaded,
    })
}
