use crate::config::{AspectRatio, BackgroundMode, Configuration, FidelityMode, LightingStyle};

use super::RequestPayload;

const VARIANT_BLOCK: &str = "\
ALTERNATE TAKE REQUESTED
A sibling request is producing the primary composition from the same inputs.
Produce a different creative take: change the composition or the camera and light angle.
Every golden rule below still applies unchanged, product integrity and set cleanliness first.
---
";

const EXCLUSIONS: &str = "\
---
EXCLUSIONS (the final image must never contain):
- visible lighting gear: softboxes, umbrellas, reflectors, ring lights
- studio structure: tripods, C-stands, clamps, cables
- cameras, lenses or a photographer in any reflection
- table edges or the end of a paper backdrop roll
All light comes from invisible sources.
";

/// Builds the generation request. Identical inputs always produce identical
/// payloads; the variant payload only adds the alternate-take block in front.
pub fn build(config: &Configuration, image_count: usize, variant: bool) -> RequestPayload {
    let base = base_instructions(config, image_count);
    let instructions = if variant {
        format!("{VARIANT_BLOCK}{base}")
    } else {
        base
    };
    RequestPayload {
        instructions,
        variant,
        image_count,
        aspect_ratio: config.aspect_ratio,
        output_size: config.output_size,
    }
}

fn base_instructions(config: &Configuration, image_count: usize) -> String {
    let mut out = golden_rules(config.lighting);
    out.push_str("---\nEXECUTION (priority: commercial quality). Follow these steps in order:\n");
    for step in steps(config, image_count) {
        out.push_str(&step);
        out.push('\n');
    }
    out.push_str(EXCLUSIONS);
    out
}

fn golden_rules(lighting: LightingStyle) -> String {
    let physics = match lighting {
        LightingStyle::Hard => "hard",
        LightingStyle::Soft => "soft",
    };
    format!(
        "\
GOLDEN RULES (inviolable)
1. PRODUCT INTEGRITY: the product is reproduced faithfully. Never alter logos, typography, seams, patterns, textures, colors or geometric proportions. You document the product, you do not redesign it.
2. HUMAN SUBJECTS: if a person appears, only cut them out and integrate them. Never change facial features, skin tone, pose, expression or clothing.
3. CLEAN SET: this is a marketing asset, not a behind-the-scenes shot. The light source is never visible.
4. TEXTURE REALISM: avoid a plastic or over-smoothed look. Keep crisp textures and realistic micro-contrast. Shadows and reflections obey the requested {physics} light.
5. FRAMING: the subject is never cropped by the canvas edges. Leave breathing room around it.
6. COLOR FIDELITY: product colors match the input. Correct any color cast from the background locally.
LIGHTING: {}
",
        lighting_description(lighting)
    )
}

/// Concrete light description; the source itself is always out of frame.
pub(crate) fn lighting_description(lighting: LightingStyle) -> &'static str {
    match lighting {
        LightingStyle::Hard => "hard directional light from an INVISIBLE source OUTSIDE the frame, striking the product directly: defined shadows, high micro-contrast, emphasized texture.",
        LightingStyle::Soft => "soft wrapping light from large INVISIBLE diffusion panels OUTSIDE the frame: very soft shadows, gradual tonal transitions, premium look.",
    }
}

fn steps(config: &Configuration, image_count: usize) -> Vec<String> {
    let mut steps = vec![
        "STEP 1 (ANALYSIS): identify the main subject, product or model.".to_string(),
        "STEP 2 (EXTRACTION): cut the subject out precisely, taking extreme care with hair and translucent edges.".to_string(),
    ];

    steps.push(match config.fidelity {
        FidelityMode::PreserveExact => "STEP 3 (INTEGRITY): keep the subject 100% identical to the original. Do not modify colors, weaves or logos.".to_string(),
        FidelityMode::Enhance => "STEP 3 (ENHANCEMENT): keep geometry, identity and logos intact; local contrast and material vividness may be subtly improved for an advertising look.".to_string(),
    });

    if image_count > 1 {
        let mut layout =
            "STEP 4 (MULTI-SUBJECT LAYOUT): arrange every subject on the canvas.".to_string();
        if config.separate_products && config.separation_enabled(image_count) {
            layout.push_str(&format!(
                " GRID MODE: place the products {}. They must never overlap.",
                separation_description(config.separation)
            ));
        } else {
            layout.push_str(" Build a natural, cohesive group composition.");
        }
        steps.push(layout);
    }

    steps.push(format!(
        "STEP 5 (BACKGROUND): place the result on {}.",
        background_description(config)
    ));

    if config.blur_enabled() && config.background_blur > 0 {
        steps.push(format!(
            "STEP 6 (OPTICS): {}",
            blur_description(config.background_blur)
        ));
    }

    if config.reflection && config.reflection_enabled() {
        steps.push(
            "EXTRA STEP: add a subtle, elegant floor reflection (polished mirror effect)."
                .to_string(),
        );
    }

    steps.push(format!(
        "CRITICAL STEP (FRAMING): set the camera for the {} format. Reserve {} margin around the product. Never cut the product at the edges.",
        aspect_label(config.aspect_ratio),
        margin_hint(config.aspect_ratio)
    ));
    steps
}

fn background_description(config: &Configuration) -> String {
    match config.background {
        BackgroundMode::SolidWhite => "a PURE WHITE (#FFFFFF) infinity backdrop, with no vignetting and no stray corner shadows; clean commercial studio".to_string(),
        BackgroundMode::SolidGray => "a NEUTRAL GRAY (#F7F7F7) infinity backdrop; professional and restrained".to_string(),
        BackgroundMode::CustomThemed => match config.custom_description() {
            Some(text) => format!(
                "a high-end photorealistic setting: \"{text}\". Integrate physically (contact shadows) and in lighting"
            ),
            None => auto_theme_description(),
        },
        BackgroundMode::AutoThemed => auto_theme_description(),
    }
}

fn auto_theme_description() -> String {
    "a setting you choose to maximize the commercial value of the detected product. Analyze its materials and colors and propose the best contrast and premium context".to_string()
}

fn aspect_label(ratio: AspectRatio) -> &'static str {
    match ratio {
        AspectRatio::Square => "square (1:1)",
        AspectRatio::Portrait => "vertical (4:5)",
        AspectRatio::Landscape => "horizontal (16:9)",
    }
}

fn margin_hint(ratio: AspectRatio) -> &'static str {
    match ratio {
        AspectRatio::Square => "even",
        AspectRatio::Portrait => "extra top and bottom",
        AspectRatio::Landscape => "extra left and right",
    }
}

pub fn separation_description(level: u8) -> &'static str {
    match level {
        0..=19 => "with minimal space between them, almost touching",
        20..=39 => "with a slight gap between them",
        40..=59 => "with a moderate, balanced separation",
        60..=79 => "with a wide separation, leaving plenty of space between them",
        _ => "as far apart as possible within the canvas",
    }
}

pub fn blur_description(level: u8) -> &'static str {
    match level {
        0 => "keep the background completely sharp (f/16).",
        1..=19 => "apply a very subtle background blur (f/8).",
        20..=39 => "apply a soft background blur (f/5.6).",
        40..=59 => "apply a moderate background blur that separates subject and background (f/4).",
        60..=79 => "apply a strong, creamy background blur (f/2.8).",
        _ => "apply maximum background blur (artistic bokeh f/1.4), abstracting the surroundings.",
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{ConfigUpdate, OutputSize};
    use crate::prompts::payload_diff;

    use super::*;

    fn themed(text: &str) -> Configuration {
        Configuration::default()
            .update_field(ConfigUpdate::Background(BackgroundMode::CustomThemed))
            .update_field(ConfigUpdate::BackgroundDescription(text.to_string()))
    }

    #[test]
    fn build_is_deterministic() {
        let config = themed("oak table with plants");
        assert_eq!(build(&config, 2, false), build(&config, 2, false));
        assert_eq!(build(&config, 2, true), build(&config, 2, true));
    }

    #[test]
    fn variant_differs_only_by_alternate_take_block() {
        let configs = [
            Configuration::default(),
            themed("marble counter").update_field(ConfigUpdate::BackgroundBlur(70)),
            Configuration::default()
                .update_field(ConfigUpdate::SeparateProducts(true))
                .update_field(ConfigUpdate::Reflection(true)),
        ];
        for config in configs {
            for count in [1, 3] {
                let primary = build(&config, count, false);
                let variant = build(&config, count, true);
                assert!(!primary.instructions.contains("ALTERNATE TAKE"));
                assert_eq!(
                    variant.instructions.strip_prefix(VARIANT_BLOCK),
                    Some(primary.instructions.as_str())
                );

                let changed: Vec<String> = payload_diff(&primary, &variant)
                    .into_iter()
                    .filter(|line| line.starts_with('-') && !line.starts_with("---"))
                    .collect();
                assert!(changed.is_empty(), "variant removed lines: {changed:?}");
                assert_eq!(primary.aspect_ratio, variant.aspect_ratio);
                assert_eq!(primary.image_count, variant.image_count);
            }
        }
    }

    #[test]
    fn solid_backgrounds_never_mention_blur() {
        for mode in [BackgroundMode::SolidWhite, BackgroundMode::SolidGray] {
            for blur in [0, 1, 50, 100] {
                let config = Configuration::default()
                    .update_field(ConfigUpdate::Background(mode))
                    .update_field(ConfigUpdate::BackgroundBlur(blur));
                let payload = build(&config, 1, false);
                assert!(!payload.instructions.contains("OPTICS"));
                assert!(!payload.instructions.contains("blur"));
            }
        }
    }

    #[test]
    fn themed_background_translates_blur_when_positive() {
        let sharp = build(&themed("beach"), 1, false);
        assert!(!sharp.instructions.contains("OPTICS"));

        let blurred = build(
            &themed("beach").update_field(ConfigUpdate::BackgroundBlur(85)),
            1,
            false,
        );
        assert!(blurred.instructions.contains("f/1.4"));

        let auto = Configuration::default()
            .update_field(ConfigUpdate::Background(BackgroundMode::AutoThemed))
            .update_field(ConfigUpdate::BackgroundBlur(30));
        assert!(build(&auto, 1, false).instructions.contains("f/5.6"));
    }

    #[test]
    fn separation_requires_flag_multiple_images_and_solid_background() {
        let separated = Configuration::default()
            .update_field(ConfigUpdate::SeparateProducts(true))
            .update_field(ConfigUpdate::Separation(90));

        let grid = build(&separated, 2, false);
        assert!(grid.instructions.contains("GRID MODE"));
        assert!(grid.instructions.contains("as far apart as possible"));
        assert!(grid.instructions.contains("never overlap"));

        let single = build(&separated, 1, false);
        assert!(!single.instructions.contains("MULTI-SUBJECT"));
        assert!(!single.instructions.contains("GRID MODE"));

        let on_theme = separated.update_field(ConfigUpdate::Background(BackgroundMode::AutoThemed));
        let cohesive = build(&on_theme, 2, false);
        assert!(!cohesive.instructions.contains("GRID MODE"));
        assert!(cohesive.instructions.contains("cohesive group"));

        let unflagged = build(&Configuration::default(), 2, false);
        assert!(unflagged.instructions.contains("cohesive group"));
    }

    #[test]
    fn background_modes_resolve_to_concrete_descriptions() {
        let white = build(&Configuration::default(), 1, false);
        assert!(white.instructions.contains("#FFFFFF"));

        let gray = build(
            &Configuration::default().update_field(ConfigUpdate::Background(BackgroundMode::SolidGray)),
            1,
            false,
        );
        assert!(gray.instructions.contains("#F7F7F7"));

        let custom = build(&themed("rustic kitchen"), 1, false);
        assert!(custom.instructions.contains("\"rustic kitchen\""));

        let blank = build(&themed("   "), 1, false);
        assert!(blank.instructions.contains("you choose to maximize"));
    }

    #[test]
    fn fidelity_and_lighting_are_explicit() {
        let exact = build(&Configuration::default(), 1, false);
        assert!(exact.instructions.contains("100% identical"));
        assert!(exact.instructions.contains("hard directional light"));
        assert!(exact.instructions.contains("OUTSIDE the frame"));

        let enhanced = Configuration::default()
            .update_field(ConfigUpdate::Fidelity(FidelityMode::Enhance))
            .update_field(ConfigUpdate::Lighting(LightingStyle::Soft));
        let payload = build(&enhanced, 1, false);
        assert!(payload.instructions.contains("geometry, identity and logos intact"));
        assert!(payload.instructions.contains("soft wrapping light"));
    }

    #[test]
    fn framing_and_sizing_follow_configuration() {
        let config = Configuration::default()
            .update_field(ConfigUpdate::AspectRatio(AspectRatio::Portrait))
            .update_field(ConfigUpdate::OutputSize(OutputSize::FourK));
        let payload = build(&config, 1, false);
        assert!(payload.instructions.contains("vertical (4:5)"));
        assert!(payload.instructions.contains("extra top and bottom"));
        assert_eq!(payload.aspect_ratio, AspectRatio::Portrait);
        assert_eq!(payload.output_size, OutputSize::FourK);
    }

    #[test]
    fn reflection_only_on_solid_backgrounds() {
        let reflective = Configuration::default().update_field(ConfigUpdate::Reflection(true));
        assert!(build(&reflective, 1, false).instructions.contains("floor reflection"));

        let themed = reflective.update_field(ConfigUpdate::Background(BackgroundMode::AutoThemed));
        assert!(!build(&themed, 1, false).instructions.contains("floor reflection"));
    }

    #[test]
    fn intensity_bands_match_thresholds() {
        assert_eq!(separation_description(19), "with minimal space between them, almost touching");
        assert_eq!(separation_description(20), "with a slight gap between them");
        assert_eq!(blur_description(59), "apply a moderate background blur that separates subject and background (f/4).");
        assert_eq!(blur_description(60), "apply a strong, creamy background blur (f/2.8).");
    }
}
