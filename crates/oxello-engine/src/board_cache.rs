//! Process-lifetime memoization of per-board derived queries.
//!
//! Board analysis (legal moves, flip lists, frontier sizes) is pure with
//! respect to the board state, so it is computed once per distinct
//! [`Fingerprint`] and shared from then on. The cache only ever grows; entries
//! are never evicted or recomputed.

use std::sync::Arc;

use dashmap::DashMap;

use crate::{Board, Fingerprint, NUM_CELLS, Player};

/// Precomputed answers for one player on one board state.
#[derive(Debug)]
struct SideInfo {
    /// Legal moves in ascending cell order.
    move_options: Vec<u8>,
    /// Bit per cell, set where the move is legal.
    valid_mask: u64,
    /// Flipped cells per move, indexed by cell. Empty for illegal moves.
    flip_lists: Vec<Vec<u8>>,
    /// Number of this player's discs that border an open cell.
    frontier: usize,
}

/// Precomputed answers for one board state, both players.
#[derive(Debug)]
struct BoardInfo {
    sides: [SideInfo; 2],
}

impl BoardInfo {
    fn compute(board: &Board) -> Self {
        let analyze = |player: Player| {
            let mut move_options = Vec::new();
            let mut valid_mask = 0_u64;
            let mut flip_lists = Vec::with_capacity(NUM_CELLS);
            for pos in 0..NUM_CELLS {
                let flips: Vec<u8> = board
                    .flip_list(player, pos)
                    .into_iter()
                    .map(|cell| u8::try_from(cell).unwrap_or(0))
                    .collect();
                if !flips.is_empty() {
                    move_options.push(u8::try_from(pos).unwrap_or(0));
                    valid_mask |= 1 << pos;
                }
                flip_lists.push(flips);
            }
            SideInfo {
                move_options,
                valid_mask,
                flip_lists,
                frontier: board.frontier_count(player),
            }
        };
        Self {
            sides: [analyze(Player::Dark), analyze(Player::Light)],
        }
    }

    fn side(&self, player: Player) -> &SideInfo {
        &self.sides[player.index()]
    }
}

/// Shared, insert-only cache of board analysis keyed by [`Fingerprint`].
///
/// Every accessor computes and stores the entry on first use, so callers never
/// observe a difference between a cache hit and a miss beyond latency. Safe to
/// query from multiple threads at once.
#[derive(Debug, Default)]
pub struct BoardCache {
    map: DashMap<Fingerprint, Arc<BoardInfo>>,
}

impl BoardCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn info(&self, board: &Board) -> Arc<BoardInfo> {
        Arc::clone(
            &self
                .map
                .entry(board.fingerprint())
                .or_insert_with(|| Arc::new(BoardInfo::compute(board))),
        )
    }

    /// Warms the cache for a board state. Idempotent.
    pub fn ensure_cached(&self, board: &Board) {
        let _ = self.info(board);
    }

    /// Returns the player's legal moves in ascending cell order.
    #[must_use]
    pub fn move_options(&self, board: &Board, player: Player) -> Vec<usize> {
        self.info(board)
            .side(player)
            .move_options
            .iter()
            .map(|&pos| usize::from(pos))
            .collect()
    }

    /// Checks whether `pos` is a legal move for `player`.
    #[must_use]
    pub fn is_valid_move(&self, board: &Board, player: Player, pos: usize) -> bool {
        pos < NUM_CELLS && self.info(board).side(player).valid_mask >> pos & 1 == 1
    }

    /// Counts the player's legal moves.
    #[must_use]
    pub fn move_count(&self, board: &Board, player: Player) -> usize {
        self.info(board).side(player).move_options.len()
    }

    /// Counts the discs a move by `player` at `pos` would flip. Zero for
    /// illegal or off-board moves.
    #[must_use]
    pub fn flip_count(&self, board: &Board, player: Player, pos: usize) -> usize {
        if pos >= NUM_CELLS {
            return 0;
        }
        self.info(board).side(player).flip_lists[pos].len()
    }

    /// Returns the discs a move by `player` at `pos` would flip.
    #[must_use]
    pub fn flip_list(&self, board: &Board, player: Player, pos: usize) -> Vec<usize> {
        if pos >= NUM_CELLS {
            return Vec::new();
        }
        self.info(board).side(player).flip_lists[pos]
            .iter()
            .map(|&cell| usize::from(cell))
            .collect()
    }

    /// Counts the player's discs that border at least one open cell.
    #[must_use]
    pub fn frontier_count(&self, board: &Board, player: Player) -> usize {
        self.info(board).side(player).frontier
    }

    /// Checks whether neither player has a legal move left.
    #[must_use]
    pub fn is_over(&self, board: &Board) -> bool {
        let info = self.info(board);
        info.side(Player::Dark).move_options.is_empty()
            && info.side(Player::Light).move_options.is_empty()
    }

    /// Number of distinct board states cached so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_matches_direct_computation() {
        let cache = BoardCache::new();
        let mut board = Board::new();
        board.do_move(Player::Dark, 19).unwrap();
        for player in [Player::Dark, Player::Light] {
            assert_eq!(cache.move_options(&board, player), board.move_options(player));
            assert_eq!(
                cache.frontier_count(&board, player),
                board.frontier_count(player)
            );
            for pos in 0..NUM_CELLS {
                assert_eq!(
                    cache.is_valid_move(&board, player, pos),
                    board.is_move_valid(player, pos)
                );
                assert_eq!(
                    cache.flip_list(&board, player, pos),
                    board.flip_list(player, pos)
                );
            }
        }
        assert_eq!(cache.is_over(&board), board.is_over());
    }

    #[test]
    fn test_cache_grows_per_distinct_state() {
        let cache = BoardCache::new();
        let board = Board::new();
        cache.ensure_cached(&board);
        cache.ensure_cached(&board);
        assert_eq!(cache.len(), 1);

        let mut next = board;
        next.do_move(Player::Dark, 19).unwrap();
        cache.ensure_cached(&next);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_hit_and_miss_answers_agree() {
        let cache = BoardCache::new();
        let board = Board::new();
        let miss = cache.move_options(&board, Player::Dark);
        let hit = cache.move_options(&board, Player::Dark);
        assert_eq!(miss, hit);
        assert_eq!(miss, vec![19, 26, 37, 44]);
    }

    #[test]
    fn test_off_board_queries() {
        let cache = BoardCache::new();
        let board = Board::new();
        assert!(!cache.is_valid_move(&board, Player::Dark, NUM_CELLS));
        assert_eq!(cache.flip_count(&board, Player::Dark, NUM_CELLS), 0);
        assert!(cache.flip_list(&board, Player::Dark, NUM_CELLS).is_empty());
    }
}
