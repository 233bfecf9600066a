use std::fmt;

use sha2::{Digest, Sha256};

/// Opaque image bytes plus their declared media type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageBlob {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// First twelve hex chars of the SHA-256 of the bytes.
    pub fn short_id(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        hex::encode(digest)[..12].to_string()
    }

    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

impl fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBlob")
            .field("id", &self.short_id())
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    let lowered = mime.trim().to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    "png"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_is_stable_and_content_based() {
        let a = ImageBlob::new(vec![1, 2, 3], "image/png");
        let b = ImageBlob::new(vec![1, 2, 3], "image/jpeg");
        let c = ImageBlob::new(vec![3, 2, 1], "image/png");
        assert_eq!(a.short_id(), b.short_id());
        assert_ne!(a.short_id(), c.short_id());
        assert_eq!(a.short_id().len(), 12);
    }

    #[test]
    fn extension_follows_mime() {
        assert_eq!(ImageBlob::new(Vec::new(), "image/jpeg").extension(), "jpg");
        assert_eq!(ImageBlob::new(Vec::new(), "image/webp").extension(), "webp");
        assert_eq!(ImageBlob::new(Vec::new(), "application/x").extension(), "png");
    }
}
