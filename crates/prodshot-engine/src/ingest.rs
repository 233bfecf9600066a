use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use image::ImageFormat;
use indexmap::IndexSet;
use prodshot_contracts::blob::{extension_for_mime, ImageBlob};
use prodshot_contracts::errors::ValidationError;
use prodshot_contracts::sources::{check_duplicate_skus, parse_sku_list, SourceImage};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client as HttpClient, StatusCode};

use crate::providers::{error_chain_text, mime_for_path};
use crate::settings::EngineSettings;

/// Reads a local photo, checking the bytes really are an image.
pub fn ingest_file(path: &Path) -> Result<SourceImage> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    let detected = detect_mime(&bytes)
        .with_context(|| format!("{} is not a supported image", path.display()))?;
    let mime = mime_for_path(path).unwrap_or(detected);
    let name = path
        .file_name()
        .and_then(|value| value.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("image.{}", extension_for_mime(mime)));
    Ok(SourceImage::new(name, ImageBlob::new(bytes, mime)))
}

/// Wraps clipboard bytes; a missing or non-image mime type is replaced by
/// the detected one.
pub fn ingest_paste(bytes: Vec<u8>, mime: Option<&str>) -> Result<SourceImage> {
    let detected = detect_mime(&bytes).context("pasted data is not a supported image")?;
    let mime = mime
        .map(str::trim)
        .filter(|value| value.starts_with("image/"))
        .unwrap_or(detected)
        .to_string();
    let name = format!(
        "pasted-image-{}.{}",
        Utc::now().timestamp_millis(),
        extension_for_mime(&mime)
    );
    Ok(SourceImage::new(name, ImageBlob::new(bytes, mime)))
}

fn detect_mime(bytes: &[u8]) -> Result<&'static str> {
    let format = image::guess_format(bytes).context("unrecognized image data")?;
    Ok(match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Gif => "image/gif",
        other => bail!("unsupported image format {other:?}"),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Catalog host access. `Ok(None)` means the host has no such image.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Option<FetchedImage>>;
}

pub struct HttpCatalogClient {
    http: HttpClient,
}

impl HttpCatalogClient {
    pub fn new(settings: &EngineSettings) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("failed to build catalog HTTP client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn fetch(&self, url: &str) -> Result<Option<FetchedImage>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("catalog request failed ({url})"))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND || !status.is_success() {
            return Ok(None);
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("catalog body read failed ({url})"))?;
        Ok(Some(FetchedImage {
            bytes: bytes.to_vec(),
            content_type,
        }))
    }
}

/// Outcome of a SKU lookup batch: found images plus one message per miss.
#[derive(Debug, Default)]
pub struct SkuBatch {
    pub images: Vec<SourceImage>,
    pub errors: Vec<String>,
}

/// Looks up every SKU in `raw` against `hosts` in order. Duplicate SKUs are
/// rejected before any request is made.
pub async fn ingest_skus(
    client: &dyn CatalogClient,
    hosts: &[String],
    raw: &str,
    existing: &IndexSet<String>,
) -> Result<SkuBatch, ValidationError> {
    let skus = parse_sku_list(raw);
    check_duplicate_skus(&skus, existing)?;

    let lookups = skus.iter().map(|sku| fetch_sku(client, hosts, sku));
    let mut batch = SkuBatch::default();
    for outcome in join_all(lookups).await {
        match outcome {
            Ok(image) => batch.images.push(image),
            Err(message) => batch.errors.push(message),
        }
    }
    tracing::debug!(
        found = batch.images.len(),
        missed = batch.errors.len(),
        "sku batch settled"
    );
    Ok(batch)
}

async fn fetch_sku(
    client: &dyn CatalogClient,
    hosts: &[String],
    sku: &str,
) -> Result<SourceImage, String> {
    let path = sku.trim_start_matches('/');
    for host in hosts {
        let url = format!("{}/{}", host.trim_end_matches('/'), path);
        let fetched = match client.fetch(&url).await {
            Ok(Some(fetched)) => fetched,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(
                    url = %url,
                    error = %error_chain_text(&err, 300),
                    "catalog host failed; trying next"
                );
                continue;
            }
        };

        let declared = fetched
            .content_type
            .as_deref()
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string());
        let mime = match declared {
            Some(value) if value.starts_with("image/") => value,
            Some(_) => return Err(format!("The URL for '{sku}' is not an image.")),
            None => match detect_mime(&fetched.bytes) {
                Ok(value) => value.to_string(),
                Err(_) => return Err(format!("The URL for '{sku}' is not an image.")),
            },
        };
        let name = url
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("image-{sku}.jpg"));
        return Ok(SourceImage::new(name, ImageBlob::new(fetched.bytes, mime)));
    }
    Err(format!("SKU '{sku}' not found."))
}
