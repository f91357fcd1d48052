//! Agent-visible output channel shared by every hardware representation.

use oxello_engine::Player;

/// Cell view written by board-query instructions for an open cell.
pub const OPEN_VIEW: f64 = 0.0;
/// Cell view for a cell held by the evaluated player.
pub const SELF_VIEW: f64 = 1.0;
/// Cell view for a cell held by the opponent.
pub const OPP_VIEW: f64 = 2.0;
/// Sentinel written when a query has no meaningful answer (off-board cell,
/// unset move, failed lookup).
pub const ILLEGAL_VIEW: f64 = -1.0;

/// The externally visible state an agent exposes while deciding a move.
///
/// Instructions write here; the move evaluator reads `proposed_move` once the
/// agent signals `done` or runs out of steps.
#[derive(Debug, Clone, Copy)]
pub struct Traits {
    /// Flat cell index proposed so far, unclamped. `None` until the program
    /// proposes one.
    pub proposed_move: Option<i64>,
    /// Set by `EndTurn`; halts evaluation early.
    pub done: bool,
    /// The side the agent is playing this evaluation.
    pub player: Player,
}

impl Traits {
    #[must_use]
    pub fn new(player: Player) -> Self {
        Self {
            proposed_move: None,
            done: false,
            player,
        }
    }

    /// Clears per-evaluation state and adopts the next side to play.
    pub fn reset(&mut self, player: Player) {
        *self = Self::new(player);
    }
}
