use shared::{PLAYER_ONE, PLAYER_TWO};

/// Whose turn it is in the two-player session
///
/// Any client may set the turn to any id; the server does not check that the
/// request came from the player holding it.
#[derive(Debug, Clone)]
pub struct TurnState {
    players: [String; 2],
    current: String,
}

impl TurnState {
    /// The first player holds the initial turn
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        let first = first.into();
        Self {
            current: first.clone(),
            players: [first, second.into()],
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn set(&mut self, next: impl Into<String>) {
        self.current = next.into();
    }

    /// Hands the turn to the other player and returns the new holder
    ///
    /// An id that matches neither player hands the turn to the first one.
    pub fn advance(&mut self) -> &str {
        self.current = if self.current == self.players[0] {
            self.players[1].clone()
        } else {
            self.players[0].clone()
        };
        &self.current
    }
}

impl Default for TurnState {
    fn default() -> Self {
        Self::new(PLAYER_ONE, PLAYER_TWO)
    }
}
