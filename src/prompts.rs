//! Fixed instructions sent with every extraction request.
//!
//! Callers can override either text via
//! [`crate::config::ExtractionConfig::system_prompt`] and
//! [`crate::config::ExtractionConfig::instruction`]; the constants here are
//! used only when no override is provided.

/// Default system message.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant that can interpret images and text.";

/// Default user instruction sent after the page image.
///
/// The model is asked to answer with the JSON alone; replies that wrap it in
/// prose or code fences are still handled by [`crate::pipeline::reply`].
pub const DEFAULT_USER_INSTRUCTION: &str = "When I present you with this image and my request is \
'interpret this image and extract the data', you must return the data in JSON format. \
Respond only with the JSON.";
