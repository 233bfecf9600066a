use std::io::Cursor;
use std::path::Path;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};
use prodshot_contracts::blob::ImageBlob;
use prodshot_contracts::prompts::{build_enhancement, EnhanceKind, RequestPayload};
use reqwest::Client as HttpClient;
use reqwest::Response as HttpResponse;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::settings::EngineSettings;

/// Remote image-generation collaborator: instructions plus input images in,
/// one image out. Must tolerate concurrent calls.
#[async_trait]
pub trait ImageService: Send + Sync {
    fn name(&self) -> &str;
    async fn generate_image(&self, payload: &RequestPayload, images: &[ImageBlob])
        -> Result<ImageBlob>;
}

/// Remote instruction-enhancement collaborator.
#[async_trait]
pub trait TextService: Send + Sync {
    async fn enhance_text(&self, text: &str, kind: EnhanceKind) -> Result<String>;
}

pub struct DryrunProvider;

impl DryrunProvider {
    const SIDE: u32 = 64;
}

#[async_trait]
impl ImageService for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    async fn generate_image(
        &self,
        payload: &RequestPayload,
        images: &[ImageBlob],
    ) -> Result<ImageBlob> {
        if images.is_empty() {
            bail!("dryrun provider needs at least one input image");
        }
        let width = Self::SIDE;
        let height = ((f64::from(width) / payload.aspect_ratio.ratio()).round() as u32).max(1);
        let (r, g, b) = color_from_inputs(&payload.instructions, images);
        let bytes = encode_solid_png(width, height, [r, g, b])?;
        Ok(ImageBlob::new(bytes, "image/png"))
    }
}

#[async_trait]
impl TextService for DryrunProvider {
    async fn enhance_text(&self, text: &str, _kind: EnhanceKind) -> Result<String> {
        Ok(text.trim().to_string())
    }
}

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiProvider {
    api_base: String,
    api_key: Option<String>,
    image_model: String,
    text_model: String,
    http: HttpClient,
}

impl GeminiProvider {
    pub fn new(settings: &EngineSettings) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self {
            api_base: settings.api_base.clone(),
            api_key: settings.api_key.clone(),
            image_model: settings.image_model.clone(),
            text_model: settings.text_model.clone(),
            http,
        })
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn supports_image_size(model: &str) -> bool {
        !model.trim().trim_start_matches("models/").starts_with("gemini-2.5")
    }

    fn build_image_request(&self, payload: &RequestPayload, images: &[ImageBlob]) -> Value {
        let mut parts: Vec<Value> = images.iter().map(inline_image_part).collect();
        parts.push(json!({ "text": payload.instructions }));

        let mut image_config = Map::new();
        image_config.insert(
            "aspectRatio".to_string(),
            Value::String(payload.aspect_ratio.as_str().to_string()),
        );
        if Self::supports_image_size(&self.image_model) {
            image_config.insert(
                "imageSize".to_string(),
                Value::String(payload.output_size.as_hint().to_string()),
            );
        }

        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": Value::Object(image_config),
            },
        })
    }

    async fn post(&self, model: &str, payload: &Value) -> Result<Value> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        let endpoint = self.endpoint_for_model(model);
        let response = self
            .http
            .post(&endpoint)
            .header(API_KEY_HEADER, api_key)
            .json(payload)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        response_json_or_error("Gemini", response).await
    }

    fn extract_image(response_payload: &Value) -> Result<ImageBlob> {
        let mut notes = Vec::new();
        for part in response_parts(response_payload) {
            let inline = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object);
            if let Some(inline) = inline {
                let data = inline
                    .get("data")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if data.is_empty() {
                    continue;
                }
                let bytes = BASE64
                    .decode(data.as_bytes())
                    .context("Gemini image base64 decode failed")?;
                let mime_type = inline
                    .get("mimeType")
                    .or_else(|| inline.get("mime_type"))
                    .and_then(Value::as_str)
                    .unwrap_or("image/png");
                return Ok(ImageBlob::new(bytes, mime_type));
            }
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                if !text.trim().is_empty() {
                    notes.push(text.trim().to_string());
                }
            }
        }

        let finish_reason = response_payload
            .pointer("/candidates/0/finishReason")
            .and_then(Value::as_str)
            .or_else(|| {
                response_payload
                    .pointer("/promptFeedback/blockReason")
                    .and_then(Value::as_str)
            });
        match (finish_reason, notes.is_empty()) {
            (Some(reason), true) => bail!("Gemini returned no image (reason: {reason})"),
            (Some(reason), false) => bail!(
                "Gemini returned no image (reason: {reason}): {}",
                truncate_text(&notes.join(" "), 300)
            ),
            (None, false) => bail!(
                "Gemini returned no image: {}",
                truncate_text(&notes.join(" "), 300)
            ),
            (None, true) => bail!("Gemini returned no image"),
        }
    }
}

#[async_trait]
impl ImageService for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_image(
        &self,
        payload: &RequestPayload,
        images: &[ImageBlob],
    ) -> Result<ImageBlob> {
        let request = self.build_image_request(payload, images);
        let response_payload = self.post(&self.image_model, &request).await?;
        Self::extract_image(&response_payload)
    }
}

#[async_trait]
impl TextService for GeminiProvider {
    async fn enhance_text(&self, text: &str, kind: EnhanceKind) -> Result<String> {
        let request = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": build_enhancement(text, kind) }],
            }],
        });
        let response_payload = self.post(&self.text_model, &request).await?;
        let enhanced: String = response_parts(&response_payload)
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("");
        let enhanced = enhanced.trim();
        if enhanced.is_empty() {
            bail!("Gemini returned no text");
        }
        Ok(enhanced.to_string())
    }
}

fn response_parts(response_payload: &Value) -> Vec<Value> {
    response_payload
        .get("candidates")
        .and_then(Value::as_array)
        .map(|candidates| {
            candidates
                .iter()
                .filter_map(|candidate| candidate.pointer("/content/parts"))
                .filter_map(Value::as_array)
                .flatten()
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

fn inline_image_part(image: &ImageBlob) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": BASE64.encode(&image.bytes),
        }
    })
}

async fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .await
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

/// Flattens an error and its causes into one readable line.
pub fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

pub(crate) fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn color_from_inputs(instructions: &str, images: &[ImageBlob]) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(instructions.as_bytes());
    for image in images {
        hasher.update(&image.bytes);
    }
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

pub(crate) fn encode_solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Result<Vec<u8>> {
    let mut image = RgbImage::new(width, height);
    for pixel in image.pixels_mut() {
        *pixel = Rgb(rgb);
    }
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use prodshot_contracts::config::{AspectRatio, Configuration, ConfigUpdate, OutputSize};
    use prodshot_contracts::prompts::build;

    use super::*;

    fn settings_for_test(image_model: &str) -> EngineSettings {
        let mut settings = EngineSettings::from_lookup(|_| None);
        settings.api_key = Some("test-key".to_string());
        settings.image_model = image_model.to_string();
        settings
    }

    fn source() -> anyhow::Result<ImageBlob> {
        Ok(ImageBlob::new(encode_solid_png(4, 4, [10, 20, 30])?, "image/png"))
    }

    #[tokio::test]
    async fn dryrun_variants_render_distinct_images() -> anyhow::Result<()> {
        let config = Configuration::default();
        let images = vec![source()?];
        let base = DryrunProvider
            .generate_image(&build(&config, 1, false), &images)
            .await?;
        let variant = DryrunProvider
            .generate_image(&build(&config, 1, true), &images)
            .await?;
        assert_ne!(base.bytes, variant.bytes);
        assert_eq!(base.mime_type, "image/png");
        assert_eq!(image::guess_format(&base.bytes)?, ImageFormat::Png);
        Ok(())
    }

    #[tokio::test]
    async fn dryrun_respects_aspect_ratio() -> anyhow::Result<()> {
        let config =
            Configuration::default().update_field(ConfigUpdate::AspectRatio(AspectRatio::Landscape));
        let blob = DryrunProvider
            .generate_image(&build(&config, 1, false), &[source()?])
            .await?;
        let decoded = image::load_from_memory(&blob.bytes)?;
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 36);
        Ok(())
    }

    #[test]
    fn image_request_carries_inputs_then_instructions() -> anyhow::Result<()> {
        let provider = GeminiProvider::new(&settings_for_test("gemini-3-pro-image-preview"))?;
        let config =
            Configuration::default().update_field(ConfigUpdate::OutputSize(OutputSize::FourK));
        let payload = build(&config, 1, false);
        let request = provider.build_image_request(&payload, &[source()?]);

        let parts = request["contents"][0]["parts"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], json!("image/png"));
        assert_eq!(parts[1]["text"], json!(payload.instructions));
        assert_eq!(
            request["generationConfig"]["imageConfig"],
            json!({ "aspectRatio": "1:1", "imageSize": "4K" })
        );
        Ok(())
    }

    #[test]
    fn flash_image_model_omits_size_hint() -> anyhow::Result<()> {
        let provider = GeminiProvider::new(&settings_for_test("gemini-2.5-flash-image"))?;
        let payload = build(&Configuration::default(), 1, false);
        let request = provider.build_image_request(&payload, &[source()?]);
        assert!(request["generationConfig"]["imageConfig"]
            .get("imageSize")
            .is_none());
        assert_eq!(
            provider.endpoint_for_model("gemini-2.5-flash-image"),
            format!("{}/models/gemini-2.5-flash-image:generateContent", DEFAULT_BASE)
        );
        Ok(())
    }

    const DEFAULT_BASE: &str = crate::settings::DEFAULT_API_BASE;

    #[test]
    fn extracts_inline_image() -> anyhow::Result<()> {
        let response = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "here you go" },
                    { "inlineData": { "mimeType": "image/jpeg", "data": BASE64.encode([1u8, 2, 3]) } }
                ]}
            }]
        });
        let blob = GeminiProvider::extract_image(&response)?;
        assert_eq!(blob.bytes, vec![1, 2, 3]);
        assert_eq!(blob.mime_type, "image/jpeg");
        Ok(())
    }

    #[test]
    fn missing_image_reports_reason_and_text() {
        let response = json!({
            "candidates": [{
                "finishReason": "IMAGE_SAFETY",
                "content": { "parts": [{ "text": "I can't edit that photo." }] }
            }]
        });
        let err = GeminiProvider::extract_image(&response)
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert_eq!(
            err,
            "Gemini returned no image (reason: IMAGE_SAFETY): I can't edit that photo."
        );
    }

    #[tokio::test]
    async fn missing_key_fails_before_network() -> anyhow::Result<()> {
        let mut settings = settings_for_test("gemini-2.5-flash-image");
        settings.api_key = None;
        let provider = GeminiProvider::new(&settings)?;
        let err = provider
            .enhance_text("marble", EnhanceKind::Background)
            .await
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert_eq!(err, "GEMINI_API_KEY or GOOGLE_API_KEY not set");
        Ok(())
    }

    #[tokio::test]
    async fn transport_failure_keeps_key_out_of_error() -> anyhow::Result<()> {
        let mut settings = settings_for_test("gemini-2.5-flash-image");
        settings.api_key = Some("SECRET-KEY-123".to_string());
        settings.api_base = "http://127.0.0.1:1/v1beta".to_string();
        let provider = GeminiProvider::new(&settings)?;
        let payload = build(&Configuration::default(), 1, false);

        let err = provider
            .generate_image(&payload, &[source()?])
            .await
            .err()
            .map(|err| error_chain_text(&err, 2_000))
            .unwrap_or_default();
        assert!(err.starts_with("Gemini request failed"), "{err}");
        assert!(!err.contains("SECRET-KEY-123"), "{err}");
        Ok(())
    }

    #[test]
    fn error_chain_text_preserves_nested_contexts() {
        let err = anyhow::anyhow!("socket closed")
            .context("Gemini request failed (https://example.test)")
            .context("variant generation failed");
        let rendered = error_chain_text(&err, 400);
        assert_eq!(
            rendered,
            "variant generation failed | caused by: Gemini request failed (https://example.test) | caused by: socket closed"
        );
        assert_eq!(error_chain_text(&err, 9), "variant g…");
    }

    #[test]
    fn mime_lookup_by_extension() {
        assert_eq!(mime_for_path(Path::new("a/B.JPG")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("shot.webp")), Some("image/webp"));
        assert_eq!(mime_for_path(Path::new("notes.txt")), None);
    }
}
