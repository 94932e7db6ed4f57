//! Core types shared across the application
//! This module contains pure data types with no external dependencies

use thiserror::Error;

/// Face state of a single card slot.
///
/// A slot is never destroyed: a matched card moves to `Gone` and stays on
/// the board so indices remain stable for the whole game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardState {
    /// Face down, hidden from every player.
    Down,
    /// Face up but unowned (left behind by a failed match).
    Up,
    /// Face up and held by exactly one player mid-match.
    Controlled,
    /// Matched and removed from play.
    Gone,
}

impl CardState {
    /// Render the display token a viewer sees for a card in this state.
    ///
    /// `mine` is whether the viewing player currently controls the card;
    /// it only changes the output for `Controlled`.
    pub fn render(&self, mine: bool, value: &str) -> String {
        match self {
            CardState::Down => "down".to_string(),
            CardState::Gone => "none".to_string(),
            CardState::Up => format!("up {}", value),
            CardState::Controlled => {
                if mine {
                    format!("my {}", value)
                } else {
                    format!("up {}", value)
                }
            }
        }
    }
}

/// Failure categories surfaced by the board engine and its facade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// First flip attempted on a card that was already matched out.
    #[error("card was already matched and removed")]
    CardRemoved,
    /// Second flip attempted on a controlled or removed card.
    #[error("card is controlled by another player or removed")]
    RestrictedAccess,
    /// Coordinates outside the grid (raised by the facade, never the engine).
    #[error("card address is outside the grid")]
    InvalidAddress,
    /// A blocked wait was interrupted by shutdown.
    #[error("interrupted while waiting")]
    Cancelled,
}

impl GameError {
    /// Stable wire code used in protocol error responses.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::CardRemoved => "card_removed",
            GameError::RestrictedAccess => "restricted_access",
            GameError::InvalidAddress => "invalid_address",
            GameError::Cancelled => "cancelled",
        }
    }
}
