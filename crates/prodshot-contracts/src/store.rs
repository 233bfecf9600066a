use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

/// Key-value blob persistence. Values are whole JSON documents.
pub trait BlobStore: Send {
    fn read(&mut self, key: &str) -> anyhow::Result<Option<Value>>;
    fn write(&mut self, key: &str, value: Value) -> anyhow::Result<()>;
}

/// JSON object file, one top-level entry per key. Writes merge into whatever
/// is on disk so two stores sharing a file keep each other's keys.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlobStore for JsonFileStore {
    fn read(&mut self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(read_json_object(&self.path)?.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: Value) -> anyhow::Result<()> {
        let mut on_disk = read_json_object(&self.path).unwrap_or_default();
        on_disk.insert(key.to_string(), value);
        write_json_object(&self.path, &on_disk)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    fn read(&mut self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: Value) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Missing file reads as an empty object; unreadable JSON is an error.
fn read_json_object(path: &Path) -> anyhow::Result<Map<String, Value>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(err) => return Err(err.into()),
    };
    let parsed: Value = serde_json::from_str(&raw)?;
    match parsed {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("{} does not hold a JSON object", path.display()),
    }
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(
        path,
        serde_json::to_string_pretty(&Value::Object(payload.clone()))?,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_file_reads_as_empty() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut store = JsonFileStore::new(temp.path().join("store.json"));
        assert_eq!(store.read("key")?, None);
        Ok(())
    }

    #[test]
    fn write_then_read_across_instances() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("store.json");
        let mut store = JsonFileStore::new(&path);
        store.write("key", json!([{"value": 1}]))?;

        let mut reloaded = JsonFileStore::new(&path);
        assert_eq!(reloaded.read("key")?, Some(json!([{"value": 1}])));
        Ok(())
    }

    #[test]
    fn writers_sharing_a_file_keep_each_others_keys() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("store.json");
        let mut store_a = JsonFileStore::new(&path);
        let mut store_b = JsonFileStore::new(&path);

        store_a.write("a", json!(1))?;
        store_b.write("b", json!(2))?;
        store_a.write("a", json!(3))?;

        let mut reloaded = JsonFileStore::new(path);
        assert_eq!(reloaded.read("a")?, Some(json!(3)));
        assert_eq!(reloaded.read("b")?, Some(json!(2)));
        Ok(())
    }

    #[test]
    fn corrupt_file_is_an_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("store.json");
        std::fs::write(&path, "not json")?;
        let mut store = JsonFileStore::new(path);
        assert!(store.read("key").is_err());
        Ok(())
    }
}
