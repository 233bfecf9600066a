use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Configuration;
use crate::errors::PresetError;
use crate::store::BlobStore;

pub const PRESETS_STORAGE_KEY: &str = "prodshot.presets";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub config: Configuration,
}

/// Named configuration snapshots. The list is read from the blob store once
/// and rewritten in full on every mutation. Names compare case-insensitively.
pub struct PresetStore {
    store: Box<dyn BlobStore>,
    presets: Vec<Preset>,
}

impl PresetStore {
    pub fn open(mut store: Box<dyn BlobStore>) -> Self {
        let presets = match store.read(PRESETS_STORAGE_KEY) {
            Ok(Some(value)) => match serde_json::from_value::<Vec<Preset>>(value) {
                Ok(presets) => presets,
                Err(err) => {
                    tracing::warn!(?err, "stored presets are malformed; starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!(?err, "failed to read presets; starting empty");
                Vec::new()
            }
        };
        let mut out = Self { store, presets };
        sort_presets(&mut out.presets);
        out
    }

    /// Alphabetical by name.
    pub fn list(&self) -> &[Preset] {
        &self.presets
    }

    pub fn exists(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Saves `config` under `name`. Replacing an existing preset requires
    /// `overwrite_confirmed`. Returns true when an existing preset was replaced.
    pub fn save(
        &mut self,
        name: &str,
        config: &Configuration,
        overwrite_confirmed: bool,
    ) -> Result<bool, PresetError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PresetError::EmptyName);
        }
        let mut next = self.presets.clone();
        let replaced = match self.position(name) {
            Some(_) if !overwrite_confirmed => {
                return Err(PresetError::OverwriteNotConfirmed(name.to_string()));
            }
            Some(index) => {
                next[index] = Preset {
                    name: name.to_string(),
                    config: config.clone(),
                };
                true
            }
            None => {
                next.push(Preset {
                    name: name.to_string(),
                    config: config.clone(),
                });
                false
            }
        };
        sort_presets(&mut next);
        self.commit(next)?;
        Ok(replaced)
    }

    pub fn load(&self, name: &str) -> Result<Configuration, PresetError> {
        self.position(name)
            .map(|index| self.presets[index].config.clone())
            .ok_or_else(|| PresetError::NotFound(name.trim().to_string()))
    }

    pub fn delete(&mut self, name: &str, confirmed: bool) -> Result<(), PresetError> {
        let index = self
            .position(name)
            .ok_or_else(|| PresetError::NotFound(name.trim().to_string()))?;
        if !confirmed {
            return Err(PresetError::DeleteNotConfirmed(
                self.presets[index].name.clone(),
            ));
        }
        let mut next = self.presets.clone();
        next.remove(index);
        self.commit(next)
    }

    fn position(&self, name: &str) -> Option<usize> {
        let wanted = name.trim().to_lowercase();
        self.presets
            .iter()
            .position(|preset| preset.name.to_lowercase() == wanted)
    }

    fn commit(&mut self, next: Vec<Preset>) -> Result<(), PresetError> {
        let value = serde_json::to_value(&next).map_err(|err| PresetError::Store(err.to_string()))?;
        self.write(value)?;
        self.presets = next;
        Ok(())
    }

    fn write(&mut self, value: Value) -> Result<(), PresetError> {
        self.store
            .write(PRESETS_STORAGE_KEY, value)
            .map_err(|err| PresetError::Store(format!("{err:#}")))
    }
}

fn sort_presets(presets: &mut [Preset]) {
    presets.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::config::{BackgroundMode, ConfigUpdate, LightingStyle};
    use crate::store::{JsonFileStore, MemoryStore};

    use super::*;

    struct FailingStore;

    impl BlobStore for FailingStore {
        fn read(&mut self, _key: &str) -> anyhow::Result<Option<Value>> {
            Ok(None)
        }

        fn write(&mut self, _key: &str, _value: Value) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    fn memory() -> PresetStore {
        PresetStore::open(Box::new(MemoryStore::new()))
    }

    #[test]
    fn load_returns_saved_snapshot_not_later_mutation() -> anyhow::Result<()> {
        let mut presets = memory();
        let c1 = Configuration::default().update_field(ConfigUpdate::Lighting(LightingStyle::Soft));
        presets.save("P1", &c1, false)?;

        let mut active = c1.clone();
        active = active.update_field(ConfigUpdate::Background(BackgroundMode::SolidGray));
        assert_ne!(active, c1);

        active = presets.load("P1")?;
        assert_eq!(active, c1);
        Ok(())
    }

    #[test]
    fn names_are_case_insensitive() -> anyhow::Result<()> {
        let mut presets = memory();
        presets.save("Catalog", &Configuration::default(), false)?;
        assert!(presets.exists("catalog"));
        assert_eq!(presets.load("CATALOG")?, Configuration::default());
        assert_eq!(
            presets.save("catalog", &Configuration::default(), false),
            Err(PresetError::OverwriteNotConfirmed("catalog".to_string()))
        );
        Ok(())
    }

    #[test]
    fn confirmed_overwrite_replaces_in_place() -> anyhow::Result<()> {
        let mut presets = memory();
        presets.save("Catalog", &Configuration::default(), false)?;
        let soft = Configuration::default().update_field(ConfigUpdate::Lighting(LightingStyle::Soft));
        assert!(presets.save("CATALOG", &soft, true)?);
        assert_eq!(presets.list().len(), 1);
        assert_eq!(presets.list()[0].name, "CATALOG");
        assert_eq!(presets.load("catalog")?, soft);
        Ok(())
    }

    #[test]
    fn list_is_alphabetical() -> anyhow::Result<()> {
        let mut presets = memory();
        for name in ["zeta", "Alpha", "mid"] {
            presets.save(name, &Configuration::default(), false)?;
        }
        let names: Vec<&str> = presets.list().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "mid", "zeta"]);
        Ok(())
    }

    #[test]
    fn delete_requires_confirmation() -> anyhow::Result<()> {
        let mut presets = memory();
        presets.save("Temp", &Configuration::default(), false)?;
        assert_eq!(
            presets.delete("temp", false),
            Err(PresetError::DeleteNotConfirmed("Temp".to_string()))
        );
        assert!(presets.exists("Temp"));
        presets.delete("temp", true)?;
        assert!(!presets.exists("Temp"));
        assert_eq!(
            presets.delete("temp", true),
            Err(PresetError::NotFound("temp".to_string()))
        );
        Ok(())
    }

    #[test]
    fn empty_name_rejected() {
        let mut presets = memory();
        assert_eq!(
            presets.save("   ", &Configuration::default(), false),
            Err(PresetError::EmptyName)
        );
    }

    #[test]
    fn persisted_list_survives_reopen() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("presets.json");
        let soft = Configuration::default().update_field(ConfigUpdate::Lighting(LightingStyle::Soft));
        {
            let mut presets = PresetStore::open(Box::new(JsonFileStore::new(&path)));
            presets.save("soft", &soft, false)?;
        }
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(raw[PRESETS_STORAGE_KEY][0]["name"], json!("soft"));

        let reopened = PresetStore::open(Box::new(JsonFileStore::new(&path)));
        assert_eq!(reopened.load("soft")?, soft);
        Ok(())
    }

    #[test]
    fn malformed_blob_starts_empty() -> anyhow::Result<()> {
        let mut store = MemoryStore::new();
        store.write(PRESETS_STORAGE_KEY, json!({"not": "a list"}))?;
        let presets = PresetStore::open(Box::new(store));
        assert!(presets.list().is_empty());
        Ok(())
    }

    #[test]
    fn failed_write_leaves_list_unchanged() {
        let mut presets = PresetStore::open(Box::new(FailingStore));
        let err = presets.save("x", &Configuration::default(), false);
        assert!(matches!(err, Err(PresetError::Store(ref message)) if message.contains("disk full")));
        assert!(presets.list().is_empty());
    }
}
