use crate::error::{EngineError, Result};
use base64::Engine as _;

/// Longest edge allowed into a vision request. Uncompressed slide captures
/// can exceed the engine's memory ceiling and crash the whole session.
pub const MAX_DIMENSION: u32 = 1024;

/// Lossy recompression quality for submitted images.
pub const JPEG_QUALITY: u8 = 80;

/// Downscale and recompress raw image bytes into a JPEG data URI suitable
/// for a vision-model content part.
pub fn prepare_image(bytes: &[u8]) -> Result<String> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| EngineError::Image(e.to_string()))?;

    let bounded = if decoded.width() > MAX_DIMENSION || decoded.height() > MAX_DIMENSION {
        decoded.thumbnail(MAX_DIMENSION, MAX_DIMENSION)
    } else {
        decoded
    };

    let rgb = bounded.to_rgb8();
    let mut jpeg = Vec::new();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)
        .map_err(|e| EngineError::Image(e.to_string()))?;

    Ok(format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&jpeg)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 100, 50]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .unwrap();
        bytes
    }

    fn decode_data_uri(uri: &str) -> image::DynamicImage {
        let payload = uri.strip_prefix("data:image/jpeg;base64,").unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .unwrap();
        image::load_from_memory(&bytes).unwrap()
    }

    #[test]
    fn small_image_keeps_dimensions() {
        let uri = prepare_image(&png_bytes(64, 48)).unwrap();
        let out = decode_data_uri(&uri);
        assert_eq!(out.width(), 64);
        assert_eq!(out.height(), 48);
    }

    #[test]
    fn oversized_image_is_bounded() {
        let uri = prepare_image(&png_bytes(2048, 512)).unwrap();
        let out = decode_data_uri(&uri);
        assert!(out.width() <= MAX_DIMENSION);
        assert!(out.height() <= MAX_DIMENSION);
        // Aspect ratio preserved: 4:1.
        assert_eq!(out.width(), 1024);
        assert_eq!(out.height(), 256);
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let err = prepare_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, EngineError::Image(_)));
    }
}
