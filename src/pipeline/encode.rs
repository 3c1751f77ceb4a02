//! Image encoding: extracted image file → base64 text for a JSON request body.
//!
//! The bytes are sent exactly as they were extracted. No decoding, resizing or
//! re-compression happens here, so the model sees the same pixels the PDF
//! holds. The MIME type is derived from the file extension the materializer
//! chose, which in turn came from the image's filter chain.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// Text-safe payload for one detection call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Standard base64 (with padding) of the file's bytes.
    pub data: String,
    /// MIME type matching the actual image format, e.g. `image/png`.
    pub mime_type: &'static str,
}

impl EncodedImage {
    /// `data:<mime>;base64,<payload>` form used by chat-completion APIs.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Read `path` and return the base64 encoding of its full content.
pub fn image_to_base64(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(STANDARD.encode(bytes))
}

/// Read `path` into an [`EncodedImage`], tagging it with the MIME type
/// implied by its extension.
pub async fn encode_image(path: &Path) -> std::io::Result<EncodedImage> {
    let bytes = tokio::fs::read(path).await?;
    let data = STANDARD.encode(&bytes);
    debug!(
        "Encoded {} → {} bytes base64",
        path.display(),
        data.len()
    );
    Ok(EncodedImage {
        data,
        mime_type: mime_for_path(path),
    })
}

/// MIME type for an extracted image path.
///
/// Covers every extension the materializer writes; anything else is sent as
/// `application/octet-stream`.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpeg") | Some("jpg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("jpx") | Some("jp2") => "image/jp2",
        Some("jb2") => "image/jbig2",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_for_path(Path::new("page_1_img_1.png")), "image/png");
        assert_eq!(mime_for_path(Path::new("page_1_img_2.jpeg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_for_path(Path::new("a.jpx")), "image/jp2");
        assert_eq!(mime_for_path(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn data_uri_layout() {
        let img = EncodedImage {
            data: "AAEC".into(),
            mime_type: "image/png",
        };
        assert_eq!(img.data_uri(), "data:image/png;base64,AAEC");
    }

    #[test]
    fn base64_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("page_1_img_1.jpeg");
        let bytes: Vec<u8> = (0u8..=255).chain([0xFF, 0xD8, 0x00]).collect();
        std::fs::write(&path, &bytes).unwrap();

        let text = image_to_base64(&path).unwrap();
        assert_eq!(STANDARD.decode(text).unwrap(), bytes);
    }

    #[tokio::test]
    async fn encode_image_tags_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_3_img_1.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\n").unwrap();

        let img = encode_image(&path).await.unwrap();
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&img.data).unwrap(), b"\x89PNG\r\n\x1a\n");
    }

    #[tokio::test]
    async fn encode_missing_file_errors() {
        let err = encode_image(Path::new("/definitely/not/here.png")).await;
        assert!(err.is_err());
    }
}
