use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Session log written as `events.jsonl`, one compact object per line.
///
/// Every record opens with `type`, `session_id` and `ts`. Object payloads are
/// merged on top of those keys; any other payload is stored under `data`.
/// Clones append to the same file.
#[derive(Debug, Clone)]
pub struct EventWriter {
    shared: Arc<SharedLog>,
}

#[derive(Debug)]
struct SharedLog {
    path: PathBuf,
    session_id: String,
    file: Mutex<Option<File>>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(SharedLog {
                path: path.into(),
                session_id: session_id.into(),
                file: Mutex::new(None),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    /// Appends one record and returns it as written.
    pub fn emit(&self, event_type: &str, payload: Value) -> anyhow::Result<Value> {
        let record = Value::Object(self.record(event_type, payload));
        let line = serde_json::to_string(&record)?;

        let mut slot = self
            .shared
            .file
            .lock()
            .map_err(|_| anyhow!("event log lock poisoned"))?;
        if slot.is_none() {
            *slot = Some(open_append(&self.shared.path)?);
        }
        if let Some(file) = slot.as_mut() {
            writeln!(file, "{line}")
                .with_context(|| format!("failed appending to {}", self.shared.path.display()))?;
        }
        Ok(record)
    }

    fn record(&self, event_type: &str, payload: Value) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("type".into(), Value::from(event_type));
        record.insert("session_id".into(), Value::from(self.session_id()));
        record.insert(
            "ts".into(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)),
        );
        match payload {
            Value::Object(fields) => record.extend(fields),
            Value::Null => {}
            other => {
                record.insert("data".into(), other);
            }
        }
        record
    }
}

fn open_append(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))
}

/// Reads a session log back. Lines that are not JSON objects are skipped.
pub fn read_events(path: &Path) -> anyhow::Result<Vec<Value>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))?;
    Ok(content
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(Value::is_object)
        .collect())
}

pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use serde_json::json;

    use super::*;

    #[test]
    fn record_carries_session_fields() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-1");

        let written = writer.emit("generation_started", json!({ "variants": 2 }))?;
        let events = read_events(&path)?;

        assert_eq!(events, vec![written]);
        assert_eq!(events[0]["type"], json!("generation_started"));
        assert_eq!(events[0]["session_id"], json!("session-1"));
        assert_eq!(events[0]["variants"], json!(2));
        DateTime::parse_from_rfc3339(events[0]["ts"].as_str().unwrap_or_default())?;
        Ok(())
    }

    #[test]
    fn object_payload_wins_and_scalars_nest() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::new(temp.path().join("events.jsonl"), "session-1");

        let overridden = writer.emit("preset_saved", json!({ "session_id": "other" }))?;
        assert_eq!(overridden["session_id"], json!("other"));

        let nested = writer.emit("note", json!(["a", "b"]))?;
        assert_eq!(nested["data"], json!(["a", "b"]));
        assert_eq!(nested["session_id"], json!("session-1"));
        Ok(())
    }

    #[test]
    fn clones_share_one_log_under_a_new_directory() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("session").join("events.jsonl");
        let writer = EventWriter::new(&path, new_session_id());
        let other = writer.clone();

        writer.emit("one", Value::Null)?;
        other.emit("two", Value::Null)?;

        let types: Vec<Value> = read_events(&path)?
            .into_iter()
            .map(|event| event["type"].clone())
            .collect();
        assert_eq!(types, vec![json!("one"), json!("two")]);
        Ok(())
    }
}
