//! pdfium library resolution.
//!
//! Finding the pdfium shared library is done once, on first use, and the
//! outcome is cached for the process lifetime either way: a failed lookup is
//! reported again verbatim instead of re-probing the file system on every
//! extraction. Each render then binds its own [`Pdfium`] from the cached
//! source, since the bindings cannot be shared between threads.
//!
//! Lookup order (first match wins):
//!
//! 1. `PDFIUM_LIB_PATH` — explicit path to the library file
//! 2. the platform library in the working directory (`./libpdfium.so`, …)
//! 3. the system library search path

use crate::error::ExtractError;
use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Environment variable naming an explicit pdfium library file.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Where the pdfium library was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibrarySource {
    Path(PathBuf),
    System,
}

static SOURCE: OnceCell<Result<LibrarySource, String>> = OnceCell::new();

/// The resolved library source, looked up on first call.
pub fn library_source() -> Result<&'static LibrarySource, ExtractError> {
    SOURCE
        .get_or_init(resolve)
        .as_ref()
        .map_err(|e| ExtractError::PdfiumBindingFailed(e.clone()))
}

/// Whether a lookup has already been attempted in this process.
pub fn is_initialised() -> bool {
    SOURCE.get().is_some()
}

/// Bind a fresh [`Pdfium`] from the cached source.
pub fn pdfium() -> Result<Pdfium, ExtractError> {
    let bindings = match library_source()? {
        LibrarySource::Path(path) => Pdfium::bind_to_library(path),
        LibrarySource::System => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ExtractError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

fn resolve() -> Result<LibrarySource, String> {
    let mut attempts: Vec<String> = Vec::new();

    let mut candidates = Vec::new();
    if let Ok(path) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        candidates.push(PathBuf::from(path));
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path("./"));

    for path in candidates {
        match Pdfium::bind_to_library(&path) {
            Ok(_) => {
                info!("Found pdfium at {}", path.display());
                return Ok(LibrarySource::Path(path));
            }
            Err(e) => attempts.push(format!("{}: {:?}", path.display(), e)),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(_) => {
            info!("Using system pdfium library");
            Ok(LibrarySource::System)
        }
        Err(e) => {
            attempts.push(format!("system library: {:?}", e));
            debug!("pdfium lookup attempts: {:?}", attempts);
            Err(attempts.join("; "))
        }
    }
}
