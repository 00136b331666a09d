//! Image decoding and encoding at the HTTP and camera boundaries.

use std::io::Cursor;

use base64::{prelude::BASE64_STANDARD, Engine};
use image::{
    codecs::jpeg::JpegEncoder, metadata::Orientation, DynamicImage, ImageDecoder, ImageReader,
    RgbImage,
};

use crate::domain::{
    errors::{DomainError, DomainResult},
    orientation::Rotation,
};

/// Decodes an uploaded image and turns it upright according to its EXIF
/// orientation tag.
pub fn decode_upload(bytes: &[u8]) -> DomainResult<RgbImage> {
    let invalid = |e: image::ImageError| DomainError::InvalidInput(format!("could not decode image: {e}"));

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DomainError::InvalidInput(format!("could not read image: {e}")))?;
    let mut decoder = reader.into_decoder().map_err(invalid)?;
    let tag = decoder.orientation().map(orientation_tag).unwrap_or(1);
    let img = DynamicImage::from_decoder(decoder).map_err(invalid)?;

    Ok(rotate(img, Rotation::from_orientation_tag(tag)).to_rgb8())
}

/// EXIF tag value for a decoded orientation.
fn orientation_tag(o: Orientation) -> u16 {
    match o {
        Orientation::NoTransforms => 1,
        Orientation::FlipHorizontal => 2,
        Orientation::Rotate180 => 3,
        Orientation::FlipVertical => 4,
        Orientation::Rotate90FlipH => 5,
        Orientation::Rotate90 => 6,
        Orientation::Rotate270FlipH => 7,
        Orientation::Rotate270 => 8,
    }
}

pub fn rotate(img: DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::None => img,
        Rotation::Rotate180 => img.rotate180(),
        Rotation::Cw90 => img.rotate90(),
        Rotation::Ccw90 => img.rotate270(),
    }
}

/// Accepts plain base64 or a data URL (`data:image/jpeg;base64,...`).
pub fn decode_base64_image(payload: &str) -> DomainResult<Vec<u8>> {
    let data = match payload.find("base64,") {
        Some(idx) => &payload[idx + "base64,".len()..],
        None => payload,
    };
    let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(DomainError::InvalidInput("empty image payload".into()));
    }
    BASE64_STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| DomainError::InvalidInput(format!("invalid base64 image: {e}")))
}

pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> DomainResult<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(frame)
        .map_err(|e| DomainError::OperationFailed(format!("jpeg encode failed: {e}")))?;
    Ok(buf)
}

pub fn encode_base64_jpeg(frame: &RgbImage, quality: u8) -> DomainResult<String> {
    Ok(BASE64_STANDARD.encode(encode_jpeg(frame, quality)?))
}
