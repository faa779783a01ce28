// src/error.rs
use thiserror::Error;

use crate::models::game::Side;

/// Per-frame failures. None of these tear the connection down; the frame is
/// dropped and the session keeps reading.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("binary frame is not valid UTF-8")]
    NotUtf8,

    #[error("invalid paddle Y position: {y} (allowed 0..={max})")]
    OutOfBounds { y: f64, max: f64 },

    #[error("connection assigned to {assigned} paddle cannot move {requested} paddle")]
    SideNotPermitted { assigned: Side, requested: Side },

    #[error("clients may not send {0} messages")]
    UnexpectedType(&'static str),
}
