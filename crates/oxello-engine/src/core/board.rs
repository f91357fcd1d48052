use std::fmt;

use serde::{Deserialize, Serialize};

use crate::InvalidMoveError;

/// Board edge length. The classic game is played on an 8x8 grid.
pub const BOARD_WIDTH: usize = 8;
/// Total number of cells on the board.
pub const NUM_CELLS: usize = BOARD_WIDTH * BOARD_WIDTH;

/// One of the two players. Dark moves first in a standard game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum Player {
    Dark,
    Light,
}

impl Player {
    /// Returns the other player.
    #[must_use]
    pub fn opponent(self) -> Self {
        match self {
            Player::Dark => Player::Light,
            Player::Light => Player::Dark,
        }
    }

    /// Returns a stable array index (Dark = 0, Light = 1).
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Player::Dark => 0,
            Player::Light => 1,
        }
    }
}

/// One of the 8 neighbor directions, clockwise from north.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    pub const ALL: [Self; 8] = [
        Self::North,
        Self::NorthEast,
        Self::East,
        Self::SouthEast,
        Self::South,
        Self::SouthWest,
        Self::West,
        Self::NorthWest,
    ];

    /// Maps an arbitrary integer onto a direction by wrapping modulo 8.
    ///
    /// Programs feed unconstrained values here, so the mapping must be total.
    #[must_use]
    pub fn from_index(index: i64) -> Self {
        let wrapped = usize::try_from(index.rem_euclid(8)).unwrap_or(0);
        Self::ALL[wrapped]
    }

    /// Returns the (dx, dy) offset for this direction.
    #[must_use]
    pub fn offset(self) -> (i64, i64) {
        match self {
            Self::North => (0, -1),
            Self::NorthEast => (1, -1),
            Self::East => (1, 0),
            Self::SouthEast => (1, 1),
            Self::South => (0, 1),
            Self::SouthWest => (-1, 1),
            Self::West => (-1, 0),
            Self::NorthWest => (-1, -1),
        }
    }
}

/// Compact identity of a board state.
///
/// Two boards with equal fingerprints answer every query identically, which is
/// what makes fingerprints usable as memoization keys: `occupied` has a bit per
/// occupied cell, `owner` has a bit per cell owned by Light (only meaningful
/// where `occupied` is set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub occupied: u64,
    pub owner: u64,
}

/// An Othello board backed by a bitmask pair.
///
/// Bit `i` of each mask corresponds to cell `i` where `i = y * 8 + x`,
/// row-major from the top-left corner. A set bit in `owner` marks a cell held
/// by Light; a clear bit on an occupied cell marks Dark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    occupied: u64,
    owner: u64,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Creates a board in the standard opening position.
    #[must_use]
    pub fn new() -> Self {
        let mut board = Self {
            occupied: 0,
            owner: 0,
        };
        board.set_pos(Self::pos_index(3, 3), Some(Player::Light));
        board.set_pos(Self::pos_index(4, 4), Some(Player::Light));
        board.set_pos(Self::pos_index(4, 3), Some(Player::Dark));
        board.set_pos(Self::pos_index(3, 4), Some(Player::Dark));
        board
    }

    /// Creates an empty board (no discs at all).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            occupied: 0,
            owner: 0,
        }
    }

    /// Restores a board from a fingerprint.
    #[must_use]
    pub fn from_fingerprint(fingerprint: Fingerprint) -> Self {
        Self {
            occupied: fingerprint.occupied,
            // Owner bits on unoccupied cells are meaningless; mask them off so
            // fingerprints stay canonical.
            owner: fingerprint.owner & fingerprint.occupied,
        }
    }

    /// Returns the memoization key for the current state.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            occupied: self.occupied,
            owner: self.owner,
        }
    }

    /// Resets the board to the standard opening position.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Checks whether a flat cell index is on the board.
    #[must_use]
    pub fn is_valid_pos(pos: usize) -> bool {
        pos < NUM_CELLS
    }

    /// Converts a flat cell index to its x coordinate.
    #[must_use]
    pub fn pos_x(pos: usize) -> usize {
        pos % BOARD_WIDTH
    }

    /// Converts a flat cell index to its y coordinate.
    #[must_use]
    pub fn pos_y(pos: usize) -> usize {
        pos / BOARD_WIDTH
    }

    /// Converts board coordinates to a flat cell index.
    #[must_use]
    pub fn pos_index(x: usize, y: usize) -> usize {
        y * BOARD_WIDTH + x
    }

    /// Returns the owner of a cell, or `None` for open or off-board cells.
    #[must_use]
    pub fn owner_of(&self, pos: usize) -> Option<Player> {
        if !Self::is_valid_pos(pos) || self.occupied >> pos & 1 == 0 {
            return None;
        }
        if self.owner >> pos & 1 == 1 {
            Some(Player::Light)
        } else {
            Some(Player::Dark)
        }
    }

    /// Checks whether a cell is occupied by either player.
    #[must_use]
    pub fn is_occupied(&self, pos: usize) -> bool {
        Self::is_valid_pos(pos) && self.occupied >> pos & 1 == 1
    }

    /// Places, replaces, or clears a disc without applying game rules.
    ///
    /// Used by test-case loading and tests; regular play goes through
    /// [`Board::do_move`].
    pub fn set_pos(&mut self, pos: usize, owner: Option<Player>) {
        if !Self::is_valid_pos(pos) {
            return;
        }
        let bit = 1 << pos;
        match owner {
            None => {
                self.occupied &= !bit;
                self.owner &= !bit;
            }
            Some(Player::Dark) => {
                self.occupied |= bit;
                self.owner &= !bit;
            }
            Some(Player::Light) => {
                self.occupied |= bit;
                self.owner |= bit;
            }
        }
    }

    /// Returns the neighboring cell in the given direction, or `None` when the
    /// step would leave the board.
    #[must_use]
    pub fn neighbor(pos: usize, dir: Direction) -> Option<usize> {
        if !Self::is_valid_pos(pos) {
            return None;
        }
        let (dx, dy) = dir.offset();
        let x = i64::try_from(Self::pos_x(pos)).ok()? + dx;
        let y = i64::try_from(Self::pos_y(pos)).ok()? + dy;
        let width = i64::try_from(BOARD_WIDTH).ok()?;
        if (0..width).contains(&x) && (0..width).contains(&y) {
            usize::try_from(y * width + x).ok()
        } else {
            None
        }
    }

    /// Walks from `pos` in `dir` and returns how many opposing discs a move by
    /// `player` at `pos` would capture along that ray (0 when the ray is not
    /// bracketed by one of the player's own discs).
    fn ray_flips(&self, player: Player, pos: usize, dir: Direction) -> usize {
        let opponent = player.opponent();
        let mut count = 0;
        let mut cursor = Self::neighbor(pos, dir);
        while let Some(cell) = cursor {
            match self.owner_of(cell) {
                Some(owner) if owner == opponent => {
                    count += 1;
                    cursor = Self::neighbor(cell, dir);
                }
                Some(_) => return count,
                None => return 0,
            }
        }
        0
    }

    /// Checks whether placing a disc at `pos` is a legal move for `player`.
    #[must_use]
    pub fn is_move_valid(&self, player: Player, pos: usize) -> bool {
        if !Self::is_valid_pos(pos) || self.is_occupied(pos) {
            return false;
        }
        Direction::ALL
            .iter()
            .any(|&dir| self.ray_flips(player, pos, dir) > 0)
    }

    /// Returns every disc that a move by `player` at `pos` would flip.
    ///
    /// Empty when the move is illegal.
    #[must_use]
    pub fn flip_list(&self, player: Player, pos: usize) -> Vec<usize> {
        let mut flips = Vec::new();
        if !Self::is_valid_pos(pos) || self.is_occupied(pos) {
            return flips;
        }
        for &dir in &Direction::ALL {
            let count = self.ray_flips(player, pos, dir);
            let mut cursor = Self::neighbor(pos, dir);
            for _ in 0..count {
                let cell = cursor.unwrap_or(pos);
                flips.push(cell);
                cursor = Self::neighbor(cell, dir);
            }
        }
        flips
    }

    /// Returns every legal move for `player`, in ascending cell order.
    ///
    /// The ascending order is load-bearing: it is the enumeration order used
    /// for tie-breaking when a proposed move is repaired to the nearest legal
    /// one.
    #[must_use]
    pub fn move_options(&self, player: Player) -> Vec<usize> {
        (0..NUM_CELLS)
            .filter(|&pos| self.is_move_valid(player, pos))
            .collect()
    }

    /// Applies a move for `player` at `pos`, flipping every captured disc.
    ///
    /// Returns the number of flipped discs.
    pub fn do_move(&mut self, player: Player, pos: usize) -> Result<usize, InvalidMoveError> {
        if !self.is_move_valid(player, pos) {
            return Err(InvalidMoveError { player, cell: pos });
        }
        let flips = self.flip_list(player, pos);
        self.set_pos(pos, Some(player));
        for &cell in &flips {
            self.set_pos(cell, Some(player));
        }
        Ok(flips.len())
    }

    /// Counts the player's discs that border at least one open cell.
    #[must_use]
    pub fn frontier_count(&self, player: Player) -> usize {
        (0..NUM_CELLS)
            .filter(|&pos| {
                self.owner_of(pos) == Some(player)
                    && Direction::ALL.iter().any(|&dir| {
                        Self::neighbor(pos, dir).is_some_and(|cell| !self.is_occupied(cell))
                    })
            })
            .count()
    }

    /// Checks whether neither player has a legal move left.
    #[must_use]
    pub fn is_over(&self) -> bool {
        (0..NUM_CELLS).all(|pos| {
            !self.is_move_valid(Player::Dark, pos) && !self.is_move_valid(Player::Light, pos)
        })
    }

    /// Counts the discs held by `player`.
    #[must_use]
    pub fn count(&self, player: Player) -> usize {
        let lights = (self.occupied & self.owner).count_ones() as usize;
        match player {
            Player::Light => lights,
            Player::Dark => self.occupied.count_ones() as usize - lights,
        }
    }

    /// Creates a board from ASCII art for testing.
    ///
    /// `x` is a Dark disc, `o` a Light disc and `.` an open cell; everything
    /// else (including whitespace) is skipped. The art must contain exactly 64
    /// cells, top-left first.
    #[must_use]
    pub fn from_ascii(art: &str) -> Self {
        let mut board = Self::empty();
        let cells: Vec<char> = art
            .chars()
            .filter(|c| matches!(c, '.' | 'x' | 'o'))
            .collect();
        assert_eq!(
            cells.len(),
            NUM_CELLS,
            "board art must have exactly {NUM_CELLS} cells, got {}",
            cells.len()
        );
        for (pos, &ch) in cells.iter().enumerate() {
            match ch {
                'x' => board.set_pos(pos, Some(Player::Dark)),
                'o' => board.set_pos(pos, Some(Player::Light)),
                _ => {}
            }
        }
        board
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..BOARD_WIDTH {
            for x in 0..BOARD_WIDTH {
                let ch = match self.owner_of(Self::pos_index(x, y)) {
                    Some(Player::Dark) => 'x',
                    Some(Player::Light) => 'o',
                    None => '.',
                };
                f.write_fmt(format_args!("{ch}"))?;
            }
            if y + 1 < BOARD_WIDTH {
                f.write_str("\n")?;
            }
        }
        Ok(())
    }
}

impl Serialize for Board {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // Format: "<occupied>:<owner>" as two 16-digit hex values.
        serializer.serialize_str(&format!("{:016x}:{:016x}", self.occupied, self.owner))
    }
}

impl<'de> Deserialize<'de> for Board {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let (occupied, owner) = s
            .split_once(':')
            .ok_or_else(|| serde::de::Error::custom("expected \"<occupied>:<owner>\""))?;
        let occupied = u64::from_str_radix(occupied, 16)
            .map_err(|e| serde::de::Error::custom(format!("invalid occupied mask: {e}")))?;
        let owner = u64::from_str_radix(owner, 16)
            .map_err(|e| serde::de::Error::custom(format!("invalid owner mask: {e}")))?;
        Ok(Self::from_fingerprint(Fingerprint { occupied, owner }))
    }
}
