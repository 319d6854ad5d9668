use base64::{engine::general_purpose, Engine};
use sha2::{Digest, Sha256};

use crate::error::AnalysisError;
use crate::models::{EncodedImage, ImagePreview, UploadedImage};

/// Largest label photo accepted for analysis (10 MB).
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Checks media type and size, returning a preview of the accepted image.
pub fn validate(image: &UploadedImage) -> Result<ImagePreview, AnalysisError> {
    let media_type = normalize_media_type(&image.media_type);

    if !media_type.starts_with("image/") {
        log::warn!("🚫 Rejected upload with media type '{}'", image.media_type);
        return Err(AnalysisError::Validation(
            "Please upload an image file (JPG, PNG)".to_string(),
        ));
    }

    if image.bytes.is_empty() {
        return Err(AnalysisError::Validation("Image file is empty".to_string()));
    }

    if image.bytes.len() > MAX_IMAGE_BYTES {
        log::warn!(
            "🚫 Rejected upload of {} bytes (limit {} bytes)",
            image.bytes.len(),
            MAX_IMAGE_BYTES
        );
        return Err(AnalysisError::Validation(
            "Image size should be less than 10MB".to_string(),
        ));
    }

    Ok(ImagePreview {
        media_type,
        byte_len: image.bytes.len(),
        fingerprint: fingerprint(&image.bytes),
    })
}

/// Base64-encodes an image that already passed [`validate`].
pub fn encode(image: &UploadedImage, preview: &ImagePreview) -> EncodedImage {
    let data = general_purpose::STANDARD.encode(&image.bytes);

    log::debug!("📊 Image file size: {} bytes", image.bytes.len());
    log::debug!("🔄 Base64 encoded size: {} bytes", data.len());

    EncodedImage {
        media_type: preview.media_type.clone(),
        data,
        fingerprint: preview.fingerprint.clone(),
    }
}

/// Runs [`encode`] on the blocking pool so large images don't stall the runtime.
pub async fn encode_in_background(
    image: UploadedImage,
    preview: ImagePreview,
) -> Result<EncodedImage, AnalysisError> {
    tokio::task::spawn_blocking(move || encode(&image, &preview))
        .await
        .map_err(|e| AnalysisError::NotReady(format!("image encoding did not finish: {}", e)))
}

/// "image/JPEG; charset=binary" -> "image/jpeg"
fn normalize_media_type(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_rejects_non_image_media_type() {
        let upload = UploadedImage::new(b"%PDF-1.7".to_vec(), "application/pdf");
        let err = validate(&upload).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_rejects_oversized_image() {
        let upload = UploadedImage::new(vec![0u8; MAX_IMAGE_BYTES + 1], "image/jpeg");
        let err = validate(&upload).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("10MB"));
    }

    #[test]
    fn test_accepts_image_at_the_limit() {
        let upload = UploadedImage::new(vec![7u8; MAX_IMAGE_BYTES], "Image/PNG; q=1");
        let preview = validate(&upload).unwrap();
        assert_eq!(preview.media_type, "image/png");
        assert_eq!(preview.byte_len, MAX_IMAGE_BYTES);
        assert_eq!(preview.fingerprint.len(), 64);
    }

    #[test]
    fn test_rejects_empty_image() {
        let upload = UploadedImage::new(Vec::new(), "image/jpeg");
        assert_eq!(validate(&upload).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_encode_in_background_produces_base64() {
        let upload = UploadedImage::new(b"cocoa".to_vec(), "image/jpeg");
        let preview = validate(&upload).unwrap();

        let encoded = encode_in_background(upload, preview.clone()).await.unwrap();

        assert_eq!(encoded.data, "Y29jb2E=");
        assert_eq!(encoded.media_type, "image/jpeg");
        assert_eq!(encoded.fingerprint, preview.fingerprint);
    }
}
