use crate::error::PipelineError;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use std::io::Cursor;

/// Longest edge of the preview shown next to the result.
const PREVIEW_MAX_EDGE: u32 = 768;
const PREVIEW_QUALITY: u8 = 85;

/// Encode the decoded upload as JPEG, shrunk to fit the preview box.
///
/// Images already smaller than the box keep their size.
pub fn generate_preview_bytes(rgb: &RgbImage) -> Result<Vec<u8>, PipelineError> {
    let mut img = DynamicImage::ImageRgb8(rgb.clone());
    if img.width() > PREVIEW_MAX_EDGE || img.height() > PREVIEW_MAX_EDGE {
        img = img.resize(PREVIEW_MAX_EDGE, PREVIEW_MAX_EDGE, FilterType::Triangle);
    }

    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, PREVIEW_QUALITY);
    img.write_with_encoder(encoder)
        .map_err(|e| PipelineError::Decode(format!("Failed to encode preview: {}", e)))?;
    Ok(buffer.into_inner())
}

/// Preview as a base64 data URI the page can put straight into `<img src>`.
pub fn generate_preview(rgb: &RgbImage) -> Result<String, PipelineError> {
    let bytes = generate_preview_bytes(rgb)?;
    let b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(format!("data:image/jpeg;base64,{}", b64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_large_preview_is_bounded() {
        let rgb = RgbImage::from_pixel(2000, 1000, Rgb([10, 20, 30]));
        let bytes = generate_preview_bytes(&rgb).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (768, 384));
    }

    #[test]
    fn test_small_preview_keeps_size() {
        let rgb = RgbImage::from_pixel(150, 150, Rgb([0, 0, 0]));
        let bytes = generate_preview_bytes(&rgb).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (150, 150));
    }

    #[test]
    fn test_preview_is_jpeg_data_uri() {
        let rgb = RgbImage::from_pixel(4, 4, Rgb([200, 0, 0]));
        let uri = generate_preview(&rgb).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,/9j/"));
    }
}
