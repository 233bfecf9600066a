use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{lookup, ArgShape, PRESET_SUBCOMMANDS};

/// One line of chat input resolved to an action name plus its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    /// Free text for `refine`.
    pub prompt: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            command_args: BTreeMap::new(),
        }
    }

    fn with_arg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.command_args.insert(key.to_string(), value.into());
        self
    }

    fn invalid(raw: &str, command: &str, reason: String) -> Self {
        Self::new("invalid", raw)
            .with_arg("command", command)
            .with_arg("reason", reason)
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.command_args.get(key).and_then(Value::as_str)
    }

    pub fn arg_index(&self, position: usize) -> Option<usize> {
        let value = self.command_args.get("indices")?.get(position)?.as_u64()?;
        usize::try_from(value).ok()
    }

    pub fn arg_paths(&self) -> Vec<String> {
        let Some(Value::Array(items)) = self.command_args.get("paths") else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    }
}

/// Resolves a chat line. Lines without a leading `/command` are refinement
/// prompts; malformed arguments produce `invalid` with a reason.
pub fn parse_intent(text: &str) -> Intent {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Intent::new("noop", text);
    }
    let Some((command, arg)) = split_command(trimmed) else {
        let mut intent = Intent::new("refine", text);
        intent.prompt = Some(trimmed.to_string());
        return intent;
    };
    let Some(spec) = lookup(&command) else {
        return Intent::new("unknown", text)
            .with_arg("command", command)
            .with_arg("arg", arg);
    };

    match spec.shape {
        ArgShape::Bare => Intent::new(spec.action, text),
        ArgShape::Text => Intent::new(spec.action, text).with_arg("arg", arg),
        ArgShape::Path => {
            Intent::new(spec.action, text).with_arg("path", split_paths(arg).join(" "))
        }
        ArgShape::Paths => Intent::new(spec.action, text).with_arg("paths", split_paths(arg)),
        ArgShape::Indices(expected) => match parse_indices(arg, expected) {
            Ok(indices) => Intent::new(spec.action, text).with_arg("indices", indices),
            Err(reason) => Intent::invalid(text, spec.command, reason),
        },
        ArgShape::Preset => parse_preset(text, spec.command, arg),
    }
}

/// `/name rest` into the lowercased name and the trimmed rest.
fn split_command(line: &str) -> Option<(String, &str)> {
    let tail = line.strip_prefix('/')?;
    let end = tail
        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
        .unwrap_or(tail.len());
    if end == 0 {
        return None;
    }
    Some((tail[..end].to_ascii_lowercase(), tail[end..].trim()))
}

/// Shell-style splitting; unbalanced quotes fall back to whitespace.
fn split_paths(arg: &str) -> Vec<String> {
    let parts = shell_words::split(arg)
        .unwrap_or_else(|_| arg.split_whitespace().map(str::to_string).collect());
    parts.into_iter().filter(|part| !part.is_empty()).collect()
}

fn parse_indices(arg: &str, expected: usize) -> Result<Vec<u64>, String> {
    let parts: Vec<&str> = arg.split_whitespace().collect();
    if parts.len() != expected {
        return Err(format!(
            "expected {expected} number(s), got {}",
            parts.len()
        ));
    }
    parts
        .iter()
        .map(|part| {
            part.parse::<u64>()
                .map_err(|_| format!("'{part}' is not a non-negative number"))
        })
        .collect()
}

fn parse_preset(raw: &str, command: &str, arg: &str) -> Intent {
    let (sub, name) = arg
        .split_once(char::is_whitespace)
        .map(|(sub, rest)| (sub, rest.trim()))
        .unwrap_or((arg, ""));
    let sub = sub.to_ascii_lowercase();
    if !PRESET_SUBCOMMANDS.contains(&sub.as_str()) {
        return Intent::invalid(
            raw,
            command,
            format!("expected one of {}", PRESET_SUBCOMMANDS.join("|")),
        );
    }
    if sub != "list" && name.is_empty() {
        return Intent::invalid(raw, command, format!("/{command} {sub} needs a name"));
    }
    let intent = Intent::new(&format!("{command}_{sub}"), raw);
    if name.is_empty() {
        intent
    } else {
        intent.with_arg("name", name)
    }
}
