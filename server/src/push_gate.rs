//! Rate limiting for the push action
//!
//! A push is a turn-consuming move: an accepted push hands the turn to the
//! other player. Pushes closer together than the cooldown are refused, and on
//! the locked level only the first accepted push ever goes through until the
//! level is changed or reset.

use crate::turn::TurnState;
use shared::{LevelId, PushRejection, LOCKED_PUSH_LEVEL, PUSH_COOLDOWN_MS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The push goes through; the turn now belongs to `next_turn`.
    Accepted { next_turn: String, locked: bool },
    Rejected(PushRejection),
}

#[derive(Debug, Clone)]
pub struct PushGate {
    cooldown_ms: u64,
    locked_level: Option<LevelId>,
    last_push_ms: Option<u64>,
    permanently_locked: bool,
}

impl PushGate {
    pub fn new(cooldown_ms: u64, locked_level: Option<LevelId>) -> Self {
        Self {
            cooldown_ms,
            locked_level,
            last_push_ms: None,
            permanently_locked: false,
        }
    }

    /// Evaluates a push on `level` at wall-clock time `now_ms`
    ///
    /// Rejections leave the gate and the turn untouched.
    pub fn try_push(&mut self, level: LevelId, now_ms: u64, turn: &mut TurnState) -> PushOutcome {
        let on_locked_level = self.locked_level == Some(level);

        if self.permanently_locked && on_locked_level {
            return PushOutcome::Rejected(PushRejection::Locked { level });
        }

        if let Some(last) = self.last_push_ms {
            let elapsed = now_ms.saturating_sub(last);
            if elapsed < self.cooldown_ms {
                return PushOutcome::Rejected(PushRejection::Cooldown {
                    remaining_ms: self.cooldown_ms - elapsed,
                });
            }
        }

        self.last_push_ms = Some(now_ms);
        if on_locked_level {
            self.permanently_locked = true;
        }

        PushOutcome::Accepted {
            next_turn: turn.advance().to_string(),
            locked: self.permanently_locked,
        }
    }

    /// Clears the permanent lock. The cooldown keeps running.
    pub fn clear_lock(&mut self) {
        self.permanently_locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.permanently_locked
    }
}

impl Default for PushGate {
    fn default() -> Self {
        Self::new(PUSH_COOLDOWN_MS, Some(LOCKED_PUSH_LEVEL))
    }
}
