//! Interactive session: one URL field, one trigger, one visible outcome.
//!
//! A [`Session`] owns the four pieces of interface state (URL, busy flag,
//! last error, last result) and enforces single flight with an explicit
//! [`SessionState`]. A trigger while Busy is rejected with
//! [`ExtractError::Busy`] and leaves the state untouched.
//!
//! The return to Idle is tied to a drop guard, so observers see exactly one
//! `Idle` per accepted trigger even if the caller drops the future mid-way.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::extract::extract;
use crate::output::Extraction;
use crate::progress::SessionObserver;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{error, info};

/// Whether an extraction is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Busy,
}

/// Point-in-time copy of the interface state.
///
/// At most one of `error` and `result` is `Some`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiSnapshot {
    pub url: String,
    pub state: SessionState,
    /// User-visible message of the last failed attempt.
    pub error: Option<String>,
    /// Pretty-printed JSON of the last successful attempt.
    pub result: Option<String>,
}

impl UiSnapshot {
    pub fn is_loading(&self) -> bool {
        self.state == SessionState::Busy
    }
}

pub struct Session {
    config: ExtractionConfig,
    inner: Mutex<UiSnapshot>,
}

impl Session {
    pub fn new(config: ExtractionConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(UiSnapshot::default()),
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Replace the URL field. Allowed while Busy; the running attempt keeps
    /// the URL it started with.
    pub fn set_url(&self, url: impl Into<String>) {
        self.lock().url = url.into();
    }

    pub fn snapshot(&self) -> UiSnapshot {
        self.lock().clone()
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Run one extraction on the current URL.
    ///
    /// On completion exactly one of `result` / `error` is populated and the
    /// session is Idle again. The same outcome is returned to the caller.
    pub async fn trigger(&self) -> Result<Extraction, ExtractError> {
        let url = {
            let mut inner = self.lock();
            if inner.state == SessionState::Busy {
                return Err(ExtractError::Busy);
            }
            inner.state = SessionState::Busy;
            inner.error = None;
            inner.url.clone()
        };
        let _guard = IdleGuard { session: self };
        self.notify(|obs| obs.on_state_change(SessionState::Busy));

        let outcome = extract(&url, &self.config).await;

        match outcome {
            Ok(ref extraction) => {
                info!("Extraction finished: {:?}", extraction.outcome);
                {
                    let mut inner = self.lock();
                    inner.result = Some(extraction.display.clone());
                    inner.error = None;
                }
                self.notify(|obs| obs.on_result(&extraction.display));
            }
            Err(ref e) => {
                error!("Extraction failed ({}): {}", e.kind(), e);
                let message = e.to_string();
                {
                    let mut inner = self.lock();
                    inner.error = Some(message.clone());
                    inner.result = None;
                }
                self.notify(|obs| obs.on_error(&message));
            }
        }

        outcome
    }

    fn lock(&self) -> MutexGuard<'_, UiSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, f: impl FnOnce(&dyn SessionObserver)) {
        if let Some(ref obs) = self.config.observer {
            f(obs.as_ref());
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("state", &*self.lock())
            .finish()
    }
}

struct IdleGuard<'a> {
    session: &'a Session,
}

impl Drop for IdleGuard<'_> {
    fn drop(&mut self) {
        self.session.lock().state = SessionState::Idle;
        self.session
            .notify(|obs| obs.on_state_change(SessionState::Idle));
    }
}
