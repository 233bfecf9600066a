use super::registry::{Capability, ModelRegistry, ModelSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    /// Set whenever the chosen model is not the one asked for.
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Keeps `requested` when it can serve `capability`; otherwise falls
    /// back to the registry default for it. Errors only when no model at
    /// all has the capability.
    pub fn select(
        &self,
        requested: Option<&str>,
        capability: Capability,
    ) -> Result<ModelSelection, String> {
        let requested = requested.map(str::trim).filter(|name| !name.is_empty());
        if let Some(model) = requested
            .and_then(|name| self.registry.get(name))
            .filter(|model| model.supports(capability))
        {
            return Ok(ModelSelection {
                model: model.clone(),
                requested: requested.map(str::to_string),
                fallback_reason: None,
            });
        }

        let model = self
            .registry
            .default_for(capability)
            .ok_or_else(|| format!("No models available for capability '{capability}'."))?;
        let fallback_reason = match requested {
            Some(name) => {
                format!("Requested model '{name}' unavailable for capability '{capability}'.")
            }
            None => "No model specified; using default.".to_string(),
        };
        Ok(ModelSelection {
            model: model.clone(),
            requested: requested.map(str::to_string),
            fallback_reason: Some(fallback_reason),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_only(name: &str) -> ModelRegistry {
        ModelRegistry::from_specs([ModelSpec::new(name, "gemini", &[Capability::Image])])
    }

    #[test]
    fn unknown_request_falls_back_with_reason() {
        let selection = ModelSelector::new(image_only("image-fallback"))
            .select(Some("missing"), Capability::Image)
            .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(selection.model.name, "image-fallback");
        assert_eq!(selection.requested.as_deref(), Some("missing"));
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Requested model 'missing' unavailable for capability 'image'.")
        );
    }

    #[test]
    fn blank_request_uses_default_with_explanation() {
        let selection = ModelSelector::default()
            .select(Some("  "), Capability::Image)
            .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(selection.model.name, "gemini-2.5-flash-image");
        assert_eq!(selection.requested, None);
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("No model specified; using default.")
        );
    }

    #[test]
    fn text_model_is_not_accepted_for_images() {
        let selector = ModelSelector::default();
        let selection = selector
            .select(Some("gemini-2.5-flash"), Capability::Image)
            .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(selection.model.name, "gemini-2.5-flash-image");
        assert!(selection.fallback_reason.is_some());

        let kept = selector
            .select(Some("gemini-3-pro-image-preview"), Capability::Image)
            .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(kept.model.name, "gemini-3-pro-image-preview");
        assert_eq!(kept.fallback_reason, None);
    }

    #[test]
    fn missing_capability_is_an_error() {
        let err = ModelSelector::new(image_only("image-only"))
            .select(Some("x"), Capability::Text)
            .err()
            .unwrap_or_default();
        assert_eq!(err, "No models available for capability 'text'.");
    }
}
