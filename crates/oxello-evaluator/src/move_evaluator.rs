//! Runs an agent on a test case and scores the outcome.

use oxello_engine::{Board, BoardCache, NUM_CELLS};
use oxello_vm::{ExecContext, SandboxPool, VirtualHardware};

use crate::TestCase;

/// Default number of hardware steps an agent gets per test case.
pub const DEFAULT_STEP_BUDGET: usize = 256;

/// Score contributions per outcome class.
#[derive(Debug, Clone, Copy)]
pub struct ScoreValues {
    /// Awarded when the proposal matches the expert's move exactly.
    pub expert: f64,
    /// Awarded when the proposal is legal but not the expert's move.
    pub legal: f64,
    /// Awarded otherwise, including when no move was proposed.
    pub illegal: f64,
}

impl Default for ScoreValues {
    fn default() -> Self {
        Self {
            expert: 2.0,
            legal: 1.0,
            illegal: -5.0,
        }
    }
}

/// Scores a raw proposal against a test case.
///
/// The expert comparison happens first on the unclamped proposal, then the
/// range check, then the legality lookup. `None` scores as illegal.
#[must_use]
pub fn score_move(case: &TestCase, proposal: Option<i64>, values: &ScoreValues) -> f64 {
    let Some(proposal) = proposal else {
        return values.illegal;
    };
    if usize::try_from(proposal).is_ok_and(|pos| pos == case.expert_move) {
        return values.expert;
    }
    match usize::try_from(proposal) {
        Ok(pos) if case.is_legal(pos) => values.legal,
        _ => values.illegal,
    }
}

/// Repairs a proposal to the nearest legal move by squared board distance.
///
/// The proposal is first clamped onto the board, then compared against every
/// legal move; strictly smaller distance wins, so ties keep the
/// lowest-indexed legal move. Returns `None` when there is no legal move at
/// all.
#[must_use]
pub fn nearest_legal_move(proposal: i64, legal: &[usize]) -> Option<usize> {
    let clamped = usize::try_from(proposal.clamp(0, i64::try_from(NUM_CELLS - 1).unwrap_or(63)))
        .unwrap_or(0);
    let (px, py) = (Board::pos_x(clamped), Board::pos_y(clamped));
    let mut best = None;
    let mut best_dist = NUM_CELLS * NUM_CELLS;
    for &pos in legal {
        let dx = Board::pos_x(pos).abs_diff(px);
        let dy = Board::pos_y(pos).abs_diff(py);
        let dist = dx * dx + dy * dy;
        if dist < best_dist {
            best = Some(pos);
            best_dist = dist;
        }
    }
    best
}

/// Drives one piece of hardware over test cases.
///
/// Owns the sandbox pool so repeated evaluations reuse the same scratch
/// boards. The board cache is shared and passed per call.
#[derive(Debug)]
pub struct MoveEvaluator<H> {
    hardware: H,
    sandbox: SandboxPool,
    step_budget: usize,
}

impl<H: VirtualHardware> MoveEvaluator<H> {
    #[must_use]
    pub fn new(hardware: H, sandbox_count: usize, step_budget: usize) -> Self {
        Self {
            hardware,
            sandbox: SandboxPool::new(sandbox_count),
            step_budget,
        }
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    /// Runs the agent on a case and returns its proposal.
    ///
    /// The hardware steps until it signals done or the step budget runs out.
    /// With `promise_valid`, an illegal or missing proposal is repaired to
    /// the nearest legal move; when the case has no legal move the proposal
    /// is returned unchanged.
    pub fn evaluate_move(
        &mut self,
        cache: &BoardCache,
        case: &TestCase,
        promise_valid: bool,
    ) -> Option<i64> {
        self.sandbox.reset_from(&case.board);
        self.hardware.reset(case.player);
        for _ in 0..self.step_budget {
            if self.hardware.is_done() {
                break;
            }
            let mut ctx = ExecContext {
                sandbox: &mut self.sandbox,
                cache,
                origin: &case.board,
            };
            self.hardware.step(&mut ctx);
        }
        let proposal = self.hardware.traits().proposed_move;
        if !promise_valid {
            return proposal;
        }
        let already_legal =
            proposal.is_some_and(|p| usize::try_from(p).is_ok_and(|pos| case.is_legal(pos)));
        if already_legal {
            return proposal;
        }
        match nearest_legal_move(proposal.unwrap_or(0), &case.legal_moves()) {
            Some(pos) => i64::try_from(pos).ok(),
            None => proposal,
        }
    }

    /// Runs the agent on a case and scores the raw proposal.
    pub fn evaluate_and_score(
        &mut self,
        cache: &BoardCache,
        case: &TestCase,
        values: &ScoreValues,
    ) -> f64 {
        let proposal = self.evaluate_move(cache, case, false);
        score_move(case, proposal, values)
    }
}

#[cfg(test)]
mod tests {
    use oxello_engine::Player;
    use oxello_vm::{Inst, Op, RegisterProgram, RegisterVm};

    use super::*;

    fn opening_case(expert_move: usize) -> TestCase {
        let board = Board::new();
        let mut legal_mask = 0_u64;
        for pos in board.move_options(Player::Dark) {
            legal_mask |= 1 << pos;
        }
        TestCase {
            board,
            player: Player::Dark,
            round: 0,
            expert_move,
            legal_mask,
        }
    }

    fn case_with_legal(expert_move: usize, legal: &[usize]) -> TestCase {
        let mut legal_mask = 0_u64;
        for &pos in legal {
            legal_mask |= 1 << pos;
        }
        TestCase {
            board: Board::new(),
            player: Player::Dark,
            round: 0,
            expert_move,
            legal_mask,
        }
    }

    #[test]
    fn test_score_branch_order() {
        let values = ScoreValues::default();
        let case = case_with_legal(12, &[3, 12, 20]);
        assert_eq!(score_move(&case, Some(12), &values), 2.0);
        assert_eq!(score_move(&case, Some(3), &values), 1.0);
        assert_eq!(score_move(&case, Some(4), &values), -5.0);
        assert_eq!(score_move(&case, Some(-1), &values), -5.0);
        assert_eq!(score_move(&case, Some(9999), &values), -5.0);
        assert_eq!(score_move(&case, None, &values), -5.0);
    }

    #[test]
    fn test_expert_outside_legal_mask_still_scores_expert() {
        // The expert comparison wins even when the mask disagrees.
        let case = case_with_legal(12, &[3, 20]);
        assert_eq!(score_move(&case, Some(12), &ScoreValues::default()), 2.0);
    }

    #[test]
    fn test_nearest_legal_move() {
        // 7 is (7, 0); 5 is (5, 0) at distance 4, 2 at distance 25, 9 at
        // distance 37.
        assert_eq!(nearest_legal_move(7, &[2, 5, 9]), Some(5));
        // Exact hits stay put.
        assert_eq!(nearest_legal_move(5, &[2, 5, 9]), Some(5));
        // Ties keep the first candidate: 4 is equidistant from 3 and 5.
        assert_eq!(nearest_legal_move(4, &[3, 5]), Some(3));
        // Out-of-range proposals clamp onto the board first.
        assert_eq!(nearest_legal_move(-50, &[0, 63]), Some(0));
        assert_eq!(nearest_legal_move(1000, &[0, 63]), Some(63));
        assert_eq!(nearest_legal_move(7, &[]), None);
    }

    fn propose_program(id: u8) -> RegisterProgram {
        RegisterProgram {
            insts: vec![
                Inst::new(Op::SetMem, [0, id, 0], 0),
                Inst::new(Op::SetMoveId, [0, 0, 0], 0),
                Inst::new(Op::EndTurn, [0, 0, 0], 0),
            ],
        }
    }

    #[test]
    fn test_evaluate_scores_proposal() {
        let cache = BoardCache::new();
        let case = opening_case(19);
        let values = ScoreValues::default();

        let vm = RegisterVm::new(propose_program(19));
        let mut evaluator = MoveEvaluator::new(vm, 1, DEFAULT_STEP_BUDGET);
        assert_eq!(evaluator.evaluate_and_score(&cache, &case, &values), 2.0);

        let vm = RegisterVm::new(propose_program(26));
        let mut evaluator = MoveEvaluator::new(vm, 1, DEFAULT_STEP_BUDGET);
        assert_eq!(evaluator.evaluate_and_score(&cache, &case, &values), 1.0);

        let vm = RegisterVm::new(propose_program(0));
        let mut evaluator = MoveEvaluator::new(vm, 1, DEFAULT_STEP_BUDGET);
        assert_eq!(evaluator.evaluate_and_score(&cache, &case, &values), -5.0);
    }

    #[test]
    fn test_promise_valid_repairs_proposal() {
        let cache = BoardCache::new();
        let case = opening_case(19);

        // Cell 18 is illegal; the closest legal move is 19.
        let vm = RegisterVm::new(propose_program(18));
        let mut evaluator = MoveEvaluator::new(vm, 1, DEFAULT_STEP_BUDGET);
        assert_eq!(evaluator.evaluate_move(&cache, &case, true), Some(19));

        // Legal proposals pass through untouched.
        let vm = RegisterVm::new(propose_program(44));
        let mut evaluator = MoveEvaluator::new(vm, 1, DEFAULT_STEP_BUDGET);
        assert_eq!(evaluator.evaluate_move(&cache, &case, true), Some(44));

        // No proposal at all repairs from cell 0.
        let vm = RegisterVm::new(RegisterProgram {
            insts: vec![Inst::new(Op::EndTurn, [0, 0, 0], 0)],
        });
        let mut evaluator = MoveEvaluator::new(vm, 1, DEFAULT_STEP_BUDGET);
        assert_eq!(evaluator.evaluate_move(&cache, &case, true), Some(19));
    }

    #[test]
    fn test_step_budget_halts_runaway_programs() {
        let cache = BoardCache::new();
        let case = opening_case(19);
        // Infinite loop: never signals done.
        let vm = RegisterVm::new(RegisterProgram {
            insts: vec![Inst::new(Op::Inc, [0, 0, 0], 0)],
        });
        let mut evaluator = MoveEvaluator::new(vm, 1, 16);
        assert_eq!(evaluator.evaluate_move(&cache, &case, false), None);
    }
}
