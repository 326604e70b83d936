//! PDF rasterisation: render page 1 to an RGBA frame via pdfium.
//!
//! The policy is fixed: first page only, scale factor 1.0 (one pixel per PDF
//! point, so a US Letter page becomes 612 × 792 px), whatever the page size
//! or orientation.
//!
//! pdfium is CPU-bound and not async-safe, so parsing and rendering run inside
//! `tokio::task::spawn_blocking`.

use crate::error::ExtractError;
use crate::pipeline::encode::{encode_frame, EncodedImage};
use crate::pipeline::engine;
use crate::pipeline::input::{self, DocumentRef};
use crate::progress::{SessionObserverHandle, Stage};
use async_trait::async_trait;
use image::RgbaImage;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Scale factor applied to page 1.
pub const RENDER_SCALE: f32 = 1.0;

/// A rendered page, alive only until it is encoded.
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    pub image: RgbaImage,
}

impl RenderedFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Turns a document reference into an encoded page image.
///
/// [`PdfiumRasterizer`] is the real implementation; a pre-built one can be
/// injected via [`crate::config::ExtractionConfig::rasterizer`].
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    async fn rasterize(
        &self,
        doc: &DocumentRef,
        download_timeout_secs: u64,
    ) -> Result<EncodedImage, ExtractError>;
}

/// Fetches the PDF, renders page 1 with pdfium and PNG-encodes it.
#[derive(Default, Clone)]
pub struct PdfiumRasterizer {
    observer: Option<SessionObserverHandle>,
}

impl PdfiumRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report stage changes to `observer`.
    pub fn with_observer(mut self, observer: Option<SessionObserverHandle>) -> Self {
        self.observer = observer;
        self
    }

    fn stage(&self, stage: Stage) {
        if let Some(ref obs) = self.observer {
            obs.on_stage(stage);
        }
    }
}

#[async_trait]
impl PageRasterizer for PdfiumRasterizer {
    async fn rasterize(
        &self,
        doc: &DocumentRef,
        download_timeout_secs: u64,
    ) -> Result<EncodedImage, ExtractError> {
        self.stage(Stage::Fetching);
        let bytes = input::fetch(doc, download_timeout_secs).await?;

        self.stage(Stage::Rendering);
        let frame = render_first_page(bytes)
            .await
            .map_err(|e| with_reference(e, doc))?;

        self.stage(Stage::Encoding);
        encode_frame(&frame)
    }
}

/// Parse `bytes` and rasterise page 1 at [`RENDER_SCALE`].
pub async fn render_first_page(bytes: Vec<u8>) -> Result<RenderedFrame, ExtractError> {
    tokio::task::spawn_blocking(move || render_first_page_blocking(bytes))
        .await
        .map_err(|e| ExtractError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of page rendering.
fn render_first_page_blocking(bytes: Vec<u8>) -> Result<RenderedFrame, ExtractError> {
    let pdfium = engine::pdfium()?;

    let document = pdfium.load_pdf_from_byte_vec(bytes, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        let reason = if err_str.contains("Password") || err_str.contains("password") {
            "document is password protected".to_string()
        } else {
            format!("cannot parse PDF: {err_str}")
        };
        ExtractError::Load {
            reference: String::new(),
            reason,
        }
    })?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());
    if pages.len() == 0 {
        return Err(ExtractError::Load {
            reference: String::new(),
            reason: "document has no pages".into(),
        });
    }

    let page = pages.get(0).map_err(|e| ExtractError::Render {
        detail: format!("{:?}", e),
    })?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(RENDER_SCALE);
    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| ExtractError::Render {
            detail: format!("{:?}", e),
        })?;

    let image = bitmap.as_image().into_rgba8();
    debug!("Rendered page 1 → {}x{} px", image.width(), image.height());

    if image.width() == 0 || image.height() == 0 {
        return Err(ExtractError::Render {
            detail: "page rendered to an empty bitmap".into(),
        });
    }

    Ok(RenderedFrame { image })
}

/// pdfium only sees bytes; attach the user's reference to load errors.
fn with_reference(err: ExtractError, doc: &DocumentRef) -> ExtractError {
    match err {
        ExtractError::Load { reference, reason } if reference.is_empty() => ExtractError::Load {
            reference: doc.to_string(),
            reason,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn frame_dimensions() {
        let frame = RenderedFrame {
            image: RgbaImage::new(612, 792),
        };
        assert_eq!((frame.width(), frame.height()), (612, 792));
    }

    #[test]
    fn load_errors_gain_reference() {
        let doc = DocumentRef::Local(PathBuf::from("scan.pdf"));
        let err = with_reference(
            ExtractError::Load {
                reference: String::new(),
                reason: "document has no pages".into(),
            },
            &doc,
        );
        assert_eq!(
            err.to_string(),
            "Failed to load PDF 'scan.pdf': document has no pages"
        );
    }

    #[test]
    fn render_errors_pass_through() {
        let doc = DocumentRef::Local(PathBuf::from("scan.pdf"));
        let err = with_reference(
            ExtractError::Render {
                detail: "boom".into(),
            },
            &doc,
        );
        assert_eq!(err.kind(), "render");
    }
}
