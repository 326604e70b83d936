//! Observer trait for extraction and session events.
//!
//! Inject an [`Arc<dyn SessionObserver>`] via
//! [`crate::config::ExtractionConfigBuilder::observer`] to follow an
//! extraction: the CLI drives its spinner from these events, and tests count
//! them.
//!
//! # Example
//!
//! ```rust
//! use pdf2json::{ExtractionConfig, SessionObserver, SessionState};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl SessionObserver for Printer {
//!     fn on_state_change(&self, state: SessionState) {
//!         eprintln!("state: {state:?}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .observer(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::session::SessionState;
use std::fmt;
use std::sync::Arc;

/// Pipeline stage currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Fetching,
    Rendering,
    Encoding,
    Requesting,
    Parsing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fetching => "fetching PDF",
            Stage::Rendering => "rendering page 1",
            Stage::Encoding => "encoding image",
            Stage::Requesting => "waiting for the model",
            Stage::Parsing => "reading reply",
        })
    }
}

/// Receives extraction events. All methods default to no-ops.
///
/// Implementations must be `Send + Sync`: rendering runs on the blocking
/// pool and events can arrive from any runtime thread.
pub trait SessionObserver: Send + Sync {
    /// Called when a session goes Busy, and again when it returns to Idle.
    fn on_state_change(&self, state: SessionState) {
        let _ = state;
    }

    /// Called as each pipeline stage starts.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called with the pretty-printed result of a successful extraction.
    fn on_result(&self, display: &str) {
        let _ = display;
    }

    /// Called with the user-visible message of a failed extraction.
    fn on_error(&self, message: &str) {
        let _ = message;
    }
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Shared handle stored in [`crate::config::ExtractionConfig`].
pub type SessionObserverHandle = Arc<dyn SessionObserver>;
