#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnhanceKind {
    Background,
    Refinement,
}

impl EnhanceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Refinement => "refinement",
        }
    }
}

/// Instruction asking a text model to rewrite a short user idea.
pub fn build_enhancement(text: &str, kind: EnhanceKind) -> String {
    let text = text.trim();
    match kind {
        EnhanceKind::Background => format!(
            "\
Act as an e-commerce art director.
Turn the short background concept below into a detailed, premium scene prompt.
INPUT: \"{text}\"
RULES:
- Describe materials, lighting and atmosphere.
- Keep it photorealistic.
- Do NOT describe the product, only the surroundings.
- Reply with the improved prompt only."
        ),
        EnhanceKind::Refinement => format!(
            "\
Act as a digital imaging technician.
Translate the user's request into precise photographic language.
INPUT: \"{text}\"
EXAMPLES:
\"more light\" -> \"Raise global exposure +0.5 stops and open the shadows.\"
\"blurrier background\" -> \"Reduce depth of field to f/2.8 for stronger bokeh.\"
Reply with the technical instruction only."
        ),
    }
}
