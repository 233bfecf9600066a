use std::fmt;

use indexmap::IndexMap;

/// What a model can be asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Image,
    Text,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<Capability>,
}

impl ModelSpec {
    pub fn new(name: &str, provider: &str, capabilities: &[Capability]) -> Self {
        Self {
            name: name.to_string(),
            provider: provider.to_string(),
            capabilities: capabilities.to_vec(),
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

// Preference order: the first entry with a capability is its default.
const BUILTIN_MODELS: &[(&str, &str, Capability)] = &[
    ("gemini-2.5-flash-image", "gemini", Capability::Image),
    ("gemini-3-pro-image-preview", "gemini", Capability::Image),
    ("gemini-2.5-flash", "gemini", Capability::Text),
    ("gemini-2.5-pro", "gemini", Capability::Text),
    ("dryrun-image-1", "dryrun", Capability::Image),
    ("dryrun-text-1", "dryrun", Capability::Text),
];

/// Known models keyed by name, in preference order.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::from_specs(
            BUILTIN_MODELS
                .iter()
                .map(|(name, provider, capability)| ModelSpec::new(name, provider, &[*capability])),
        )
    }
}

impl ModelRegistry {
    pub fn from_specs(specs: impl IntoIterator<Item = ModelSpec>) -> Self {
        Self {
            models: specs
                .into_iter()
                .map(|spec| (spec.name.clone(), spec))
                .collect(),
        }
    }

    /// Looks a model up by name; the API's `models/` prefix is accepted.
    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        let name = name.trim();
        self.models
            .get(name.strip_prefix("models/").unwrap_or(name))
    }

    pub fn supporting(&self, capability: Capability) -> impl Iterator<Item = &ModelSpec> {
        self.models
            .values()
            .filter(move |model| model.supports(capability))
    }

    pub fn default_for(&self, capability: Capability) -> Option<&ModelSpec> {
        self.supporting(capability).next()
    }
}
