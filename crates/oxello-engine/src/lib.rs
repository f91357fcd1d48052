pub use self::{board_cache::*, core::*};

pub mod board_cache;
pub mod core;

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("move {cell} is not legal for {player}")]
pub struct InvalidMoveError {
    pub player: Player,
    pub cell: usize,
}
