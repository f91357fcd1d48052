//! Scratch boards an agent may mutate freely while thinking.

use oxello_engine::Board;

/// A pool of sandbox boards with one active board at a time.
///
/// Disc-placing instructions act on the active board only; the real game
/// state is never touched. Resetting the pool copies the origin position into
/// every sandbox and selects the first one.
#[derive(Debug, Clone)]
pub struct SandboxPool {
    boards: Vec<Board>,
    active: usize,
}

impl SandboxPool {
    /// Creates a pool of `count` sandboxes (at least one).
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            boards: vec![Board::new(); count.max(1)],
            active: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.boards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[must_use]
    pub fn active(&self) -> &Board {
        &self.boards[self.active]
    }

    pub fn active_mut(&mut self) -> &mut Board {
        &mut self.boards[self.active]
    }

    /// Selects a sandbox, clamping out-of-range indices to the last one.
    pub fn set_active(&mut self, index: usize) {
        self.active = index.min(self.boards.len() - 1);
    }

    #[must_use]
    pub fn active_index(&self) -> usize {
        self.active
    }

    /// Copies `origin` into every sandbox and selects the first.
    pub fn reset_from(&mut self, origin: &Board) {
        for board in &mut self.boards {
            *board = *origin;
        }
        self.active = 0;
    }

    /// Restores the active sandbox to `origin` without touching the others.
    pub fn reset_active(&mut self, origin: &Board) {
        self.boards[self.active] = *origin;
    }
}

#[cfg(test)]
mod tests {
    use oxello_engine::Player;

    use super::*;

    #[test]
    fn test_pool_never_empty() {
        let pool = SandboxPool::new(0);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_set_active_clamps() {
        let mut pool = SandboxPool::new(3);
        pool.set_active(99);
        assert_eq!(pool.active_index(), 2);
        pool.set_active(1);
        assert_eq!(pool.active_index(), 1);
    }

    #[test]
    fn test_reset_from_restores_every_sandbox() {
        let origin = Board::new();
        let mut pool = SandboxPool::new(2);
        pool.active_mut().do_move(Player::Dark, 19).unwrap();
        pool.set_active(1);
        pool.active_mut().do_move(Player::Dark, 26).unwrap();
        pool.reset_from(&origin);
        assert_eq!(pool.active_index(), 0);
        assert_eq!(*pool.active(), origin);
        pool.set_active(1);
        assert_eq!(*pool.active(), origin);
    }
}
