pub mod auth;
pub mod event;
pub mod registration;
pub mod user;

use thiserror::Error;

/// Raised when a stored enum column holds a value this build does not know.
#[derive(Error, Debug)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
