// src/models/message.rs
use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::models::game::{GameState, PaddleUpdate, TeamAssignment};

/// Envelope for every frame on the socket:
/// `{"type": "<initial_state|paddle_update|team_assign>", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    deny_unknown_fields
)]
pub enum Message {
    InitialState(GameState),
    PaddleUpdate(PaddleUpdate),
    TeamAssign(TeamAssignment),
}

impl Message {
    /// Decodes a text frame. A payload that does not match its `type`, or any
    /// key besides `type` and `payload`, is an error; nothing is partially
    /// applied.
    pub fn decode(text: &str) -> Result<Self, RelayError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::InitialState(_) => "initial_state",
            Message::PaddleUpdate(_) => "paddle_update",
            Message::TeamAssign(_) => "team_assign",
        }
    }
}
