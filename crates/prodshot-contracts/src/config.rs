use serde::{Deserialize, Serialize};

pub const INTENSITY_MAX: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMode {
    #[default]
    SolidWhite,
    SolidGray,
    CustomThemed,
    AutoThemed,
}

impl BackgroundMode {
    pub fn is_solid(self) -> bool {
        matches!(self, Self::SolidWhite | Self::SolidGray)
    }

    pub fn is_themed(self) -> bool {
        matches!(self, Self::CustomThemed | Self::AutoThemed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SolidWhite => "solid_white",
            Self::SolidGray => "solid_gray",
            Self::CustomThemed => "custom_themed",
            Self::AutoThemed => "auto_themed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LightingStyle {
    #[default]
    Hard,
    Soft,
}

impl LightingStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hard => "hard",
            Self::Soft => "soft",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:5")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 3] = [Self::Square, Self::Portrait, Self::Landscape];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Portrait => "4:5",
            Self::Landscape => "16:9",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "1:1" | "square" => Some(Self::Square),
            "4:5" | "portrait" | "vertical" => Some(Self::Portrait),
            "16:9" | "landscape" | "wide" => Some(Self::Landscape),
            _ => None,
        }
    }

    /// Width over height.
    pub fn ratio(self) -> f64 {
        match self {
            Self::Square => 1.0,
            Self::Portrait => 4.0 / 5.0,
            Self::Landscape => 16.0 / 9.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputSize {
    #[default]
    #[serde(rename = "2k")]
    TwoK,
    #[serde(rename = "4k")]
    FourK,
}

impl OutputSize {
    /// Image size hint understood by the remote model.
    pub fn as_hint(self) -> &'static str {
        match self {
            Self::TwoK => "2K",
            Self::FourK => "4K",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FidelityMode {
    #[default]
    PreserveExact,
    Enhance,
}

/// Generation settings applied to one request. Values are copied into every
/// payload, so a later update never reaches a request already built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub background: BackgroundMode,
    pub background_description: String,
    pub lighting: LightingStyle,
    pub aspect_ratio: AspectRatio,
    pub output_size: OutputSize,
    pub fidelity: FidelityMode,
    pub reflection: bool,
    pub separate_products: bool,
    pub separation: u8,
    pub background_blur: u8,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            background: BackgroundMode::SolidWhite,
            background_description: String::new(),
            lighting: LightingStyle::Hard,
            aspect_ratio: AspectRatio::Square,
            output_size: OutputSize::TwoK,
            fidelity: FidelityMode::PreserveExact,
            reflection: false,
            separate_products: false,
            separation: 50,
            background_blur: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigUpdate {
    Background(BackgroundMode),
    BackgroundDescription(String),
    Lighting(LightingStyle),
    AspectRatio(AspectRatio),
    OutputSize(OutputSize),
    Fidelity(FidelityMode),
    Reflection(bool),
    SeparateProducts(bool),
    Separation(u8),
    BackgroundBlur(u8),
}

impl Configuration {
    /// Returns the configuration with one field replaced. Intensities are
    /// clamped into `0..=100`.
    pub fn update_field(&self, update: ConfigUpdate) -> Configuration {
        let mut next = self.clone();
        match update {
            ConfigUpdate::Background(mode) => next.background = mode,
            ConfigUpdate::BackgroundDescription(text) => next.background_description = text,
            ConfigUpdate::Lighting(style) => next.lighting = style,
            ConfigUpdate::AspectRatio(ratio) => next.aspect_ratio = ratio,
            ConfigUpdate::OutputSize(size) => next.output_size = size,
            ConfigUpdate::Fidelity(mode) => next.fidelity = mode,
            ConfigUpdate::Reflection(flag) => next.reflection = flag,
            ConfigUpdate::SeparateProducts(flag) => next.separate_products = flag,
            ConfigUpdate::Separation(level) => next.separation = level.min(INTENSITY_MAX),
            ConfigUpdate::BackgroundBlur(level) => {
                next.background_blur = level.min(INTENSITY_MAX)
            }
        }
        next
    }

    /// Separation controls only apply to multi-image input on a solid backdrop.
    pub fn separation_enabled(&self, image_count: usize) -> bool {
        image_count > 1 && self.background.is_solid()
    }

    pub fn blur_enabled(&self) -> bool {
        self.background.is_themed()
    }

    pub fn reflection_enabled(&self) -> bool {
        self.background.is_solid()
    }

    /// Custom description with surrounding whitespace removed, `None` when blank.
    pub fn custom_description(&self) -> Option<&str> {
        Some(self.background_description.trim()).filter(|text| !text.is_empty())
    }
}
