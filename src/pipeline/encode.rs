//! Image encoding: [`RenderedFrame`] → base64 PNG data URL.
//!
//! Chat-completion APIs accept images as `data:` URLs inside the JSON body.
//! PNG is lossless, which keeps small print legible to the model.

use crate::error::ExtractError;
use crate::pipeline::render::RenderedFrame;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use std::io::Cursor;
use tracing::debug;

/// MIME type of every encoded page.
pub const PNG_MIME: &str = "image/png";

/// A page image ready to embed in a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Base64 of the PNG bytes, without any prefix.
    pub base64: String,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    /// `data:image/png;base64,…`
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", PNG_MIME, self.base64)
    }

    /// Decoded PNG bytes, e.g. for saving the page image to disk.
    pub fn png_bytes(&self) -> Result<Vec<u8>, ExtractError> {
        STANDARD.decode(&self.base64).map_err(|e| ExtractError::Internal(format!("base64: {e}")))
    }
}

/// PNG-encode and base64-wrap a rendered frame.
pub fn encode_frame(frame: &RenderedFrame) -> Result<EncodedImage, ExtractError> {
    let mut buf = Vec::new();
    frame
        .image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| ExtractError::Render {
            detail: format!("PNG encoding failed: {e}"),
        })?;

    let base64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes PNG, {} bytes base64", buf.len(), base64.len());

    Ok(EncodedImage {
        base64,
        width: frame.width(),
        height: frame.height(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_frame() {
        let frame = RenderedFrame {
            image: RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])),
        };
        let img = encode_frame(&frame).expect("encode should succeed");
        assert_eq!((img.width, img.height), (10, 10));
        assert!(!img.base64.is_empty());
        assert!(img.data_url().starts_with("data:image/png;base64,"));

        let png = img.png_bytes().expect("valid base64");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
