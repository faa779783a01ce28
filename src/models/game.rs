// src/models/game.rs
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RelayError;

/// Canvas height of the reference client. Paddle Y coordinates outside
/// `[0, DEFAULT_CANVAS_HEIGHT]` are rejected.
pub const DEFAULT_CANVAS_HEIGHT: f64 = 600.0;

/// Both paddles start vertically centred.
pub const DEFAULT_PADDLE_Y: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// Authoritative paddle positions, sent to every client on connect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GameState {
    #[serde(rename = "leftPaddle")]
    pub left_paddle: f64,
    #[serde(rename = "rightPaddle")]
    pub right_paddle: f64,
}

impl GameState {
    pub fn new(initial_y: f64) -> Self {
        Self {
            left_paddle: initial_y,
            right_paddle: initial_y,
        }
    }

    pub fn paddle(&self, side: Side) -> f64 {
        match side {
            Side::Left => self.left_paddle,
            Side::Right => self.right_paddle,
        }
    }

    /// Overwrites one paddle. Callers validate `y` first.
    pub(crate) fn set_paddle(&mut self, side: Side, y: f64) {
        match side {
            Side::Left => self.left_paddle = y,
            Side::Right => self.right_paddle = y,
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(DEFAULT_PADDLE_Y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaddleUpdate {
    pub side: Side,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TeamAssignment {
    pub team: Side,
}

/// Checks a proposed paddle coordinate against the canvas bounds.
///
/// NaN never satisfies the range check, so it is rejected too.
pub fn validate_paddle_y(y: f64, canvas_height: f64) -> Result<(), RelayError> {
    if (0.0..=canvas_height).contains(&y) {
        Ok(())
    } else {
        Err(RelayError::OutOfBounds {
            y,
            max: canvas_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_inclusive_bounds() {
        assert!(validate_paddle_y(0.0, DEFAULT_CANVAS_HEIGHT).is_ok());
        assert!(validate_paddle_y(250.0, DEFAULT_CANVAS_HEIGHT).is_ok());
        assert!(validate_paddle_y(600.0, DEFAULT_CANVAS_HEIGHT).is_ok());
    }

    #[test]
    fn rejects_out_of_bounds() {
        for y in [-5.0, -0.001, 600.5, 10_000.0, f64::NAN, f64::INFINITY] {
            let err = validate_paddle_y(y, DEFAULT_CANVAS_HEIGHT).unwrap_err();
            assert!(matches!(err, RelayError::OutOfBounds { .. }), "{y} accepted");
        }
    }

    #[test]
    fn set_paddle_touches_one_side_only() {
        let mut state = GameState::default();
        state.set_paddle(Side::Right, 42.0);
        assert_eq!(state.paddle(Side::Right), 42.0);
        assert_eq!(state.paddle(Side::Left), DEFAULT_PADDLE_Y);
    }

    #[test]
    fn game_state_uses_wire_field_names() {
        let json = serde_json::to_value(GameState::new(300.0)).unwrap();
        assert_eq!(json, serde_json::json!({"leftPaddle": 300.0, "rightPaddle": 300.0}));
    }
}
