//! Expert-labelled test cases.
//!
//! A test case is a board position, the side to move, the game round it was
//! taken from, and the move an expert played there. Cases are loaded from a
//! CSV file with a header row; each data row carries the 64 cell markers in
//! row-major order (1 = dark, 2 = light, anything else open), the player
//! marker (2 = light, anything else dark), the expert move as a flat cell
//! index, and the round number.

use std::path::Path;

use oxello_engine::{Board, NUM_CELLS, Player};

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum TestCaseError {
    #[display("failed to read test cases: {_0}")]
    Io(std::io::Error),
    #[display("line {line}: {reason}")]
    Parse {
        line: usize,
        #[error(not(source))]
        reason: String,
    },
}

/// One labelled position.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub board: Board,
    pub player: Player,
    /// Zero-based game round the position was captured at.
    pub round: usize,
    /// The expert's move, validated to be on the board at load time.
    pub expert_move: usize,
    /// Bit per cell, set where the move is legal for `player`. Precomputed at
    /// load time; positions recur constantly during evaluation.
    pub legal_mask: u64,
}

impl TestCase {
    /// Checks whether `pos` is a legal move for the case's player.
    #[must_use]
    pub fn is_legal(&self, pos: usize) -> bool {
        pos < NUM_CELLS && self.legal_mask >> pos & 1 == 1
    }

    /// Legal moves in ascending cell order.
    #[must_use]
    pub fn legal_moves(&self) -> Vec<usize> {
        (0..NUM_CELLS).filter(|&pos| self.is_legal(pos)).collect()
    }
}

/// A loaded set of test cases.
#[derive(Debug, Clone, Default)]
pub struct TestCaseSet {
    cases: Vec<TestCase>,
}

impl TestCaseSet {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TestCaseError> {
        let text = std::fs::read_to_string(path).map_err(TestCaseError::Io)?;
        Self::parse(&text)
    }

    /// Parses CSV text. The first non-empty line is a header and is skipped.
    pub fn parse(text: &str) -> Result<Self, TestCaseError> {
        let mut cases = Vec::new();
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());
        let _header = lines.next();
        for (index, line) in lines {
            cases.push(Self::parse_row(index + 1, line)?);
        }
        Ok(Self { cases })
    }

    fn parse_row(line: usize, row: &str) -> Result<TestCase, TestCaseError> {
        let parse_field = |field: &str| {
            field.trim().parse::<i64>().map_err(|e| TestCaseError::Parse {
                line,
                reason: format!("invalid field {field:?}: {e}"),
            })
        };
        let fields = row
            .split(',')
            .map(parse_field)
            .collect::<Result<Vec<_>, _>>()?;
        if fields.len() < NUM_CELLS + 3 {
            return Err(TestCaseError::Parse {
                line,
                reason: format!(
                    "expected at least {} fields, got {}",
                    NUM_CELLS + 3,
                    fields.len()
                ),
            });
        }

        let mut board = Board::empty();
        for (pos, &marker) in fields[..NUM_CELLS].iter().enumerate() {
            match marker {
                1 => board.set_pos(pos, Some(Player::Dark)),
                2 => board.set_pos(pos, Some(Player::Light)),
                _ => {}
            }
        }
        let player = if fields[NUM_CELLS] == 2 {
            Player::Light
        } else {
            Player::Dark
        };
        let expert_move = usize::try_from(fields[NUM_CELLS + 1])
            .ok()
            .filter(|&pos| pos < NUM_CELLS)
            .ok_or_else(|| TestCaseError::Parse {
                line,
                reason: format!("expert move {} is off the board", fields[NUM_CELLS + 1]),
            })?;
        let round = usize::try_from(fields[NUM_CELLS + 2]).map_err(|_| TestCaseError::Parse {
            line,
            reason: format!("invalid round {}", fields[NUM_CELLS + 2]),
        })?;

        let mut legal_mask = 0_u64;
        for pos in board.move_options(player) {
            legal_mask |= 1 << pos;
        }
        Ok(TestCase {
            board,
            player,
            round,
            expert_move,
            legal_mask,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TestCase> {
        self.cases.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestCase> {
        self.cases.iter()
    }

    /// Largest round number in the set, or 0 for an empty set.
    #[must_use]
    pub fn max_round(&self) -> usize {
        self.cases.iter().map(|case| case.round).max().unwrap_or(0)
    }
}

impl<'a> IntoIterator for &'a TestCaseSet {
    type Item = &'a TestCase;
    type IntoIter = std::slice::Iter<'a, TestCase>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opening_row(player: i64, expert: i64, round: i64) -> String {
        // Standard opening position: light at 27 and 36, dark at 28 and 35.
        let mut cells = vec![0_i64; NUM_CELLS];
        cells[27] = 2;
        cells[36] = 2;
        cells[28] = 1;
        cells[35] = 1;
        let mut fields: Vec<String> = cells.iter().map(ToString::to_string).collect();
        fields.push(player.to_string());
        fields.push(expert.to_string());
        fields.push(round.to_string());
        fields.join(",")
    }

    fn header() -> String {
        let mut fields: Vec<String> = (0..NUM_CELLS).map(|i| format!("cell_{i}")).collect();
        fields.extend(["player", "expert", "round"].map(String::from));
        fields.join(",")
    }

    #[test]
    fn test_parse_skips_header() {
        let text = format!("{}\n{}\n", header(), opening_row(1, 19, 0));
        let set = TestCaseSet::parse(&text).unwrap();
        assert_eq!(set.len(), 1);
        let case = set.get(0).unwrap();
        assert_eq!(case.player, Player::Dark);
        assert_eq!(case.expert_move, 19);
        assert_eq!(case.round, 0);
        assert_eq!(case.board, Board::new());
    }

    #[test]
    fn test_legal_mask_matches_board() {
        let text = format!("{}\n{}\n{}\n", header(), opening_row(1, 19, 0), opening_row(2, 20, 1));
        let set = TestCaseSet::parse(&text).unwrap();
        assert_eq!(set.get(0).unwrap().legal_moves(), vec![19, 26, 37, 44]);
        assert_eq!(set.get(1).unwrap().legal_moves(), vec![20, 29, 34, 43]);
        assert!(set.get(0).unwrap().is_legal(19));
        assert!(!set.get(0).unwrap().is_legal(20));
        assert!(!set.get(0).unwrap().is_legal(NUM_CELLS));
    }

    #[test]
    fn test_rejects_off_board_expert_move() {
        let text = format!("{}\n{}\n", header(), opening_row(1, 64, 0));
        let err = TestCaseSet::parse(&text).unwrap_err();
        assert!(matches!(err, TestCaseError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_rejects_short_rows() {
        let text = format!("{}\n1,2,3\n", header());
        assert!(TestCaseSet::parse(&text).is_err());
    }

    #[test]
    fn test_max_round() {
        let text = format!(
            "{}\n{}\n{}\n",
            header(),
            opening_row(1, 19, 3),
            opening_row(2, 20, 57)
        );
        let set = TestCaseSet::parse(&text).unwrap();
        assert_eq!(set.max_round(), 57);
        assert_eq!(TestCaseSet::default().max_round(), 0);
    }
}
