use crate::config::Configuration;

use super::generation::lighting_description;
use super::RequestPayload;

/// Fixed one-click adjustments offered next to the free-text command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuickRefinement {
    Brighten,
    Contrast,
    ContactShadow,
    Sharpen,
}

impl QuickRefinement {
    pub const ALL: [QuickRefinement; 4] = [
        Self::Brighten,
        Self::Contrast,
        Self::ContactShadow,
        Self::Sharpen,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Brighten => "brighten",
            Self::Contrast => "contrast",
            Self::ContactShadow => "shadow",
            Self::Sharpen => "sharpen",
        }
    }

    pub fn command(self) -> &'static str {
        match self {
            Self::Brighten => "increase brightness slightly",
            Self::Contrast => "increase contrast subtly",
            Self::ContactShadow => "add a soft, realistic shadow under the product",
            Self::Sharpen => "increase sharpness slightly",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Brighten => "Raises global exposure for a lighter image.",
            Self::Contrast => "Widens the gap between highlights and shadows.",
            Self::ContactShadow => "Adds a realistic contact shadow under the product.",
            Self::Sharpen => "Improves focus and edge detail.",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|item| item.label() == normalized)
    }
}

/// Single-request payload applying `command` to the current image. Refinement
/// carries no structured config change, so lighting and format are restated
/// as context.
pub fn build_refinement(command: &str, config: &Configuration) -> RequestPayload {
    let command = command.trim();
    let instructions = format!(
        "\
You are a senior retouch editor. Refine the attached image strictly within the golden rules.

GOAL
Apply the user's command exactly: \"{command}\"

CONSTRAINTS
1. INTEGRITY: the product and any person are untouchable. Never change their colors, shapes or textures. Edit only light, atmosphere or background.
2. CLEAN SET: the image stays clean. Never add tripods, lamps, softboxes or reflectors, even when editing the light. The light source is invisible.
3. QUALITY: keep the visual resolution and texture realism.

TECHNICAL CONTEXT
Current lighting: {}
Format: {}.

Proceed while keeping the essence of the original image.
",
        lighting_description(config.lighting),
        config.aspect_ratio.as_str(),
    );
    RequestPayload {
        instructions,
        variant: false,
        image_count: 1,
        aspect_ratio: config.aspect_ratio,
        output_size: config.output_size,
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{AspectRatio, ConfigUpdate, LightingStyle};

    use super::*;

    #[test]
    fn refinement_restates_command_and_context() {
        let config = Configuration::default()
            .update_field(ConfigUpdate::Lighting(LightingStyle::Soft))
            .update_field(ConfigUpdate::AspectRatio(AspectRatio::Landscape));
        let payload = build_refinement("  add shadow ", &config);
        assert!(payload.instructions.contains("\"add shadow\""));
        assert!(payload.instructions.contains("soft wrapping light"));
        assert!(payload.instructions.contains("Format: 16:9."));
        assert!(!payload.variant);
        assert_eq!(payload.image_count, 1);
    }

    #[test]
    fn quick_refinements_round_trip_labels() {
        for item in QuickRefinement::ALL {
            assert_eq!(QuickRefinement::from_label(item.label()), Some(item));
            assert!(!item.command().is_empty());
        }
        assert_eq!(QuickRefinement::from_label("SHADOW"), Some(QuickRefinement::ContactShadow));
        assert_eq!(QuickRefinement::from_label("blur"), None);
    }
}
