//! # holdem-ai: Computer Opponents
//!
//! Decision making for computer-controlled seats. Opponents read the same
//! [`StateView`] a remote client receives, so they never see hidden cards and
//! never touch the engine directly.
//!
//! ## Core Components
//!
//! - [`AIOpponent`] - Trait defining the interface for AI decision-making
//! - [`baseline`] - Difficulty-tuned heuristic opponent
//! - [`equity`] - Equity estimation seam and a Monte-Carlo implementation
//! - [`create_ai`] - Factory function for creating AI opponents
//!
//! ## Quick Start
//!
//! ```rust
//! use holdem_ai::{create_ai, AIOpponent};
//! use holdem_engine::engine::{Engine, TableConfig};
//! use holdem_engine::player::Seat;
//!
//! let ai = create_ai("hard").unwrap();
//!
//! let seats = vec![Seat::new("hero", "Hero", 2000), Seat::new("ai_1", "Bot", 2000)];
//! let mut engine = Engine::new(seats, TableConfig::with_big_blind(20).seeded(3)).unwrap();
//! engine.start_new_hand().unwrap();
//!
//! let actor = engine.action_on_player().unwrap().to_string();
//! let action = ai.decide(&engine.view(Some(&actor)), &actor);
//! println!("{} chose {:?}", ai.name(), action);
//! ```

use holdem_engine::player::PlayerAction;
use holdem_engine::view::StateView;
use thiserror::Error;

pub mod baseline;
pub mod equity;

pub use baseline::{BaselineAI, Difficulty};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AiError {
    #[error("Unknown AI type: {0}")]
    UnknownType(String),
}

/// Trait defining the interface for AI opponents in poker games.
///
/// # Example Implementation
///
/// ```rust
/// use holdem_ai::AIOpponent;
/// use holdem_engine::player::PlayerAction;
/// use holdem_engine::view::StateView;
///
/// struct CallingStation;
///
/// impl AIOpponent for CallingStation {
///     fn decide(&self, view: &StateView, player_id: &str) -> PlayerAction {
///         if view.to_call(player_id) == 0 {
///             PlayerAction::Check
///         } else {
///             PlayerAction::Call
///         }
///     }
///
///     fn name(&self) -> &str {
///         "CallingStation"
///     }
/// }
/// ```
pub trait AIOpponent: Send + Sync {
    /// Determine the next action for the AI player.
    ///
    /// # Arguments
    ///
    /// * `view` - Table projection for this player (own hole cards visible)
    /// * `player_id` - The seat to act for
    ///
    /// # Returns
    ///
    /// A `PlayerAction`. Implementations should only return actions that are
    /// legal in `view`; the engine rejects anything else.
    fn decide(&self, view: &StateView, player_id: &str) -> PlayerAction;

    /// Return the name/identifier of this AI implementation.
    fn name(&self) -> &str;
}

/// Factory function to create AI opponents by type string.
///
/// # Supported AI Types
///
/// - `"easy"`, `"medium"`, `"hard"`, `"expert"` - [`BaselineAI`] at that difficulty
/// - `"baseline"` - alias for `"medium"`
///
/// # Example
///
/// ```rust
/// use holdem_ai::{create_ai, AiError};
///
/// assert_eq!(create_ai("expert").unwrap().name(), "BaselineAI(expert)");
/// assert!(matches!(create_ai("godlike"), Err(AiError::UnknownType(_))));
/// ```
///
/// # Errors
///
/// [`AiError::UnknownType`] for any other name.
pub fn create_ai(ai_type: &str) -> Result<Box<dyn AIOpponent>, AiError> {
    let difficulty = match ai_type {
        "baseline" => Difficulty::Medium,
        other => other
            .parse::<Difficulty>()
            .map_err(|_| AiError::UnknownType(ai_type.to_string()))?,
    };
    Ok(Box::new(BaselineAI::new(difficulty)))
}
