//! Payload checks applied before an event reaches the session
//!
//! Rules:
//! - Coordinates, radii, forces and chain parameters: finite
//! - Pin radius: > 0
//! - Chain stiffness, damping, length: >= 0
//! - Ids, tool names: non-empty
//! - Hinge position index: 0, 1 or 2
//! - Chains: two distinct pins
//! - Shapes: at least one point

use crate::error::ValidationError;
use shared::{ChainLink, ClientEvent, LevelChange, PinRequest, ShapeStroke, Vec2};

pub const MAX_HINGE_POSITION: u8 = 2;

pub fn validate_event(event: &ClientEvent) -> Result<(), ValidationError> {
    match event {
        ClientEvent::MouseMove { x, y, player_id } => {
            finite("x", *x)?;
            finite("y", *y)?;
            non_empty("playerId", player_id)
        }
        ClientEvent::DrawShape(shape) => validate_shape(shape),
        ClientEvent::DrawPin(pin) | ClientEvent::RegisterPin(pin) => validate_pin(pin),
        ClientEvent::CreateChain(chain) => validate_chain(chain),
        ClientEvent::ChangeHingePosition {
            hinge_pos_index,
            player_id,
            ..
        } => {
            if *hinge_pos_index > MAX_HINGE_POSITION {
                return Err(ValidationError::HingeIndexOutOfRange(*hinge_pos_index));
            }
            non_empty("playerId", player_id)
        }
        ClientEvent::ReleaseCategory { player_id, .. } => non_empty("playerId", player_id),
        ClientEvent::Erase {
            custom_id,
            player_id,
            ..
        } => {
            non_empty("customId", custom_id)?;
            non_empty("playerId", player_id)
        }
        ClientEvent::Push {
            force, player_id, ..
        } => {
            finite_vec("force", force)?;
            non_empty("playerId", player_id)
        }
        ClientEvent::ChangeTool {
            tool, player_id, ..
        } => {
            non_empty("tool", tool)?;
            non_empty("playerId", player_id)
        }
        ClientEvent::ChangeLevel(change) | ClientEvent::ResetLevel(change) => {
            validate_level_change(change)
        }
        ClientEvent::CompleteLevel { player_id, .. } => non_empty("playerId", player_id),
        ClientEvent::ChangeTurn { next_player_id } => non_empty("nextPlayerId", next_player_id),
        ClientEvent::GetNextCategory { player_id, .. } => non_empty("playerId", player_id),
        ClientEvent::GetCompletedLevels | ClientEvent::GetTurn => Ok(()),
    }
}

fn validate_shape(shape: &ShapeStroke) -> Result<(), ValidationError> {
    non_empty("customId", &shape.custom_id)?;
    non_empty("playerId", &shape.player_id)?;
    if shape.points.is_empty() {
        return Err(ValidationError::EmptyShape);
    }
    shape.points.iter().try_for_each(|p| finite_vec("points", p))
}

fn validate_pin(pin: &PinRequest) -> Result<(), ValidationError> {
    non_empty("customId", &pin.custom_id)?;
    non_empty("playerId", &pin.player_id)?;
    finite_vec("center", &pin.center)?;
    finite("radius", pin.radius)?;
    if pin.radius <= 0.0 {
        return Err(ValidationError::NotPositive {
            field: "radius",
            value: pin.radius,
        });
    }
    pin.points.iter().try_for_each(|p| finite_vec("points", p))
}

fn validate_chain(chain: &ChainLink) -> Result<(), ValidationError> {
    non_empty("pinAId", &chain.pin_a_id)?;
    non_empty("pinBId", &chain.pin_b_id)?;
    non_empty("playerId", &chain.player_id)?;
    if chain.pin_a_id == chain.pin_b_id {
        return Err(ValidationError::SelfLinkedChain(chain.pin_a_id.clone()));
    }
    for (field, value) in [
        ("stiffness", chain.stiffness),
        ("damping", chain.damping),
        ("length", chain.length),
    ] {
        finite(field, value)?;
        if value < 0.0 {
            return Err(ValidationError::Negative { field, value });
        }
    }
    Ok(())
}

fn validate_level_change(change: &LevelChange) -> Result<(), ValidationError> {
    non_empty("playerId", &change.player_id)
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::EmptyField { field })
    } else {
        Ok(())
    }
}

fn finite(field: &'static str, value: f32) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinite { field })
    }
}

fn finite_vec(field: &'static str, value: &Vec2) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinite { field })
    }
}
