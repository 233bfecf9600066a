use std::env;
use std::time::Duration;

use prodshot_contracts::gate::DEFAULT_MAX_IN_FLIGHT;
use prodshot_contracts::models::{Capability, ModelSelector};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_SKU_HOSTS: &[&str] = &[
    "https://media.falabella.com/falabellaCL",
    "https://media.falabella.com/sodimacCL",
];
const DEFAULT_TIMEOUT_SECS: u64 = 90;
const MIN_TIMEOUT_SECS: u64 = 15;
const MAX_TIMEOUT_SECS: u64 = 300;

/// Runtime settings for the remote collaborators, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub api_key: Option<String>,
    pub api_base: String,
    pub image_model: String,
    pub text_model: String,
    pub max_in_flight: usize,
    pub sku_hosts: Vec<String>,
    pub request_timeout: Duration,
    /// Reasons recorded when a requested model had to be replaced.
    pub fallback_reasons: Vec<String>,
}

impl EngineSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(non_empty_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let selector = ModelSelector::default();
        let mut fallback_reasons = Vec::new();

        let image_model = resolve_model(
            &selector,
            lookup("PRODSHOT_IMAGE_MODEL"),
            Capability::Image,
            "gemini-2.5-flash-image",
            &mut fallback_reasons,
        );
        let text_model = resolve_model(
            &selector,
            lookup("PRODSHOT_TEXT_MODEL"),
            Capability::Text,
            "gemini-2.5-flash",
            &mut fallback_reasons,
        );

        let max_in_flight = lookup("PRODSHOT_MAX_IN_FLIGHT")
            .and_then(|raw| raw.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_IN_FLIGHT)
            .max(1);

        let sku_hosts = lookup("PRODSHOT_SKU_HOSTS")
            .map(|raw| {
                raw.split(',')
                    .map(|host| host.trim().trim_end_matches('/').to_string())
                    .filter(|host| !host.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|hosts| !hosts.is_empty())
            .unwrap_or_else(|| DEFAULT_SKU_HOSTS.iter().map(|host| host.to_string()).collect());

        let timeout_secs = lookup("PRODSHOT_REQUEST_TIMEOUT")
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);

        Self {
            api_key: lookup("GEMINI_API_KEY").or_else(|| lookup("GOOGLE_API_KEY")),
            api_base: lookup("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            image_model,
            text_model,
            max_in_flight,
            sku_hosts,
            request_timeout: Duration::from_secs(timeout_secs),
            fallback_reasons,
        }
    }

    pub fn with_image_model(mut self, requested: &str) -> Self {
        let selector = ModelSelector::default();
        self.image_model = resolve_model(
            &selector,
            Some(requested.to_string()),
            Capability::Image,
            &self.image_model,
            &mut self.fallback_reasons,
        );
        self
    }

    pub fn with_text_model(mut self, requested: &str) -> Self {
        let selector = ModelSelector::default();
        self.text_model = resolve_model(
            &selector,
            Some(requested.to_string()),
            Capability::Text,
            &self.text_model,
            &mut self.fallback_reasons,
        );
        self
    }
}

fn resolve_model(
    selector: &ModelSelector,
    requested: Option<String>,
    capability: Capability,
    default: &str,
    reasons: &mut Vec<String>,
) -> String {
    let Some(requested) = requested else {
        return default.to_string();
    };
    match selector.select(Some(&requested), capability) {
        Ok(selection) => {
            if let Some(reason) = selection.fallback_reason {
                reasons.push(reason);
            }
            selection.model.name
        }
        Err(reason) => {
            reasons.push(reason);
            default.to_string()
        }
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let settings = EngineSettings::from_lookup(|_| None);
        assert_eq!(settings.api_key, None);
        assert_eq!(settings.api_base, DEFAULT_API_BASE);
        assert_eq!(settings.image_model, "gemini-2.5-flash-image");
        assert_eq!(settings.text_model, "gemini-2.5-flash");
        assert_eq!(settings.max_in_flight, 3);
        assert_eq!(settings.sku_hosts.len(), 2);
        assert_eq!(settings.request_timeout, Duration::from_secs(90));
        assert!(settings.fallback_reasons.is_empty());
    }

    #[test]
    fn google_key_is_a_fallback_and_values_are_clamped() {
        let settings = EngineSettings::from_lookup(lookup_from(&[
            ("GOOGLE_API_KEY", "g-key"),
            ("GEMINI_API_BASE", "https://proxy.test/v1/"),
            ("PRODSHOT_MAX_IN_FLIGHT", "0"),
            ("PRODSHOT_REQUEST_TIMEOUT", "2"),
            ("PRODSHOT_SKU_HOSTS", " https://a.test/ , ,https://b.test"),
        ]));
        assert_eq!(settings.api_key.as_deref(), Some("g-key"));
        assert_eq!(settings.api_base, "https://proxy.test/v1");
        assert_eq!(settings.max_in_flight, 1);
        assert_eq!(settings.request_timeout, Duration::from_secs(15));
        assert_eq!(settings.sku_hosts, vec!["https://a.test", "https://b.test"]);
    }

    #[test]
    fn unknown_model_falls_back_with_reason() {
        let settings = EngineSettings::from_lookup(lookup_from(&[(
            "PRODSHOT_IMAGE_MODEL",
            "gemini-2.5-flash",
        )]));
        assert_eq!(settings.image_model, "gemini-2.5-flash-image");
        assert_eq!(settings.fallback_reasons.len(), 1);

        let overridden = settings.with_text_model("gemini-2.5-pro");
        assert_eq!(overridden.text_model, "gemini-2.5-pro");
    }
}
