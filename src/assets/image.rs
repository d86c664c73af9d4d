use image::GenericImageView;

use crate::errors::{PuppetError, Result};

/// Tightly packed RGBA8 pixels ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub premultiplied: bool,
    pub pixels: Vec<u8>,
}

/// Decodes PNG/JPEG/WebP bytes into RGBA8, optionally premultiplying alpha.
pub fn decode_image(bytes: &[u8], premultiply: bool, label: &str) -> Result<DecodedImage> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| PuppetError::ImageDecodeError(format!("Failed to decode image {label}: {e}")))?;

    let (width, height) = img.dimensions();
    let mut pixels = img.to_rgba8().into_vec();
    if premultiply {
        premultiply_alpha(&mut pixels);
    }

    Ok(DecodedImage {
        label: label.to_string(),
        width,
        height,
        premultiplied: premultiply,
        pixels,
    })
}

/// Scales RGB by alpha in place, rounding to nearest.
pub fn premultiply_alpha(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * a + 127) / 255) as u8;
        }
    }
}
