//! The shared instruction set.
//!
//! Both hardware representations run the same instructions over a 16-slot
//! memory; only the control-flow ops (`If`, `Call`, `Return`, `Fork`) differ
//! per representation and are handled by the VM itself. Every instruction is
//! total: malformed arguments degrade to sentinel writes or no-ops, never to
//! panics.

use std::fmt;

use oxello_engine::{BOARD_WIDTH, Board, BoardCache, NUM_CELLS, Direction};
use serde::{Deserialize, Serialize};

use crate::{
    ILLEGAL_VIEW, OPEN_VIEW, OPP_VIEW, SELF_VIEW, SandboxPool, Traits,
};

/// Number of memory slots (registers or frame-local memory) per execution
/// context.
pub const MEM_SLOTS: usize = 16;

/// Instruction opcodes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
pub enum Op {
    Nop,
    SetMem,
    CopyMem,
    SwapMem,
    Inc,
    Dec,
    Add,
    Sub,
    Mult,
    Div,
    Mod,
    TestEqu,
    TestNEqu,
    TestLess,
    If,
    Call,
    Return,
    Fork,
    GetBoardWidth,
    EndTurn,
    SetMoveXy,
    SetMoveId,
    GetMoveXy,
    GetMoveId,
    IsValidXy,
    IsValidId,
    IsValidOppXy,
    IsValidOppId,
    AdjacentXy,
    AdjacentId,
    ValidMoveCount,
    ValidOppMoveCount,
    GetBoardValueXy,
    GetBoardValueId,
    PlaceDiskXy,
    PlaceDiskId,
    PlaceOppDiskXy,
    PlaceOppDiskId,
    FlipCountXy,
    FlipCountId,
    OppFlipCountXy,
    OppFlipCountId,
    FrontierCount,
    ResetBoard,
    IsOver,
}

impl Op {
    /// Every opcode, used as the draw pool for mutation.
    pub const ALL: [Self; 45] = [
        Self::Nop,
        Self::SetMem,
        Self::CopyMem,
        Self::SwapMem,
        Self::Inc,
        Self::Dec,
        Self::Add,
        Self::Sub,
        Self::Mult,
        Self::Div,
        Self::Mod,
        Self::TestEqu,
        Self::TestNEqu,
        Self::TestLess,
        Self::If,
        Self::Call,
        Self::Return,
        Self::Fork,
        Self::GetBoardWidth,
        Self::EndTurn,
        Self::SetMoveXy,
        Self::SetMoveId,
        Self::GetMoveXy,
        Self::GetMoveId,
        Self::IsValidXy,
        Self::IsValidId,
        Self::IsValidOppXy,
        Self::IsValidOppId,
        Self::AdjacentXy,
        Self::AdjacentId,
        Self::ValidMoveCount,
        Self::ValidOppMoveCount,
        Self::GetBoardValueXy,
        Self::GetBoardValueId,
        Self::PlaceDiskXy,
        Self::PlaceDiskId,
        Self::PlaceOppDiskXy,
        Self::PlaceOppDiskId,
        Self::FlipCountXy,
        Self::FlipCountId,
        Self::OppFlipCountXy,
        Self::OppFlipCountId,
        Self::FrontierCount,
        Self::ResetBoard,
        Self::IsOver,
    ];

    /// Checks whether the opcode's behavior is representation-specific.
    #[must_use]
    pub fn is_control(self) -> bool {
        matches!(self, Self::If | Self::Call | Self::Return | Self::Fork)
    }
}

/// One instruction: an opcode, three small arguments and a binding tag.
///
/// Register hardware ignores the tag; tag hardware uses it for `Call` and
/// `Fork` binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inst {
    pub op: Op,
    pub args: [u8; 3],
    pub tag: u16,
}

impl Inst {
    #[must_use]
    pub fn new(op: Op, args: [u8; 3], tag: u16) -> Self {
        Self { op, args, tag }
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} tag={:04x}",
            self.op, self.args[0], self.args[1], self.args[2], self.tag
        )
    }
}

/// Everything an instruction may touch besides its own memory slots.
pub struct ExecContext<'a> {
    pub sandbox: &'a mut SandboxPool,
    pub cache: &'a BoardCache,
    /// The real position being evaluated; `ResetBoard` restores it.
    pub origin: &'a Board,
}

/// Maps an argument onto a memory slot.
#[must_use]
pub fn slot(arg: u8) -> usize {
    usize::from(arg) % MEM_SLOTS
}

fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

/// Truncates a memory value to an integer. NaN becomes 0, infinities
/// saturate.
#[must_use]
#[expect(clippy::cast_possible_truncation)]
pub fn int_arg(value: f64) -> i64 {
    value as i64
}

fn cell_from_id(value: f64) -> Option<usize> {
    let id = int_arg(value);
    usize::try_from(id).ok().filter(|&pos| pos < NUM_CELLS)
}

fn cell_from_xy(x: f64, y: f64) -> Option<usize> {
    let x = int_arg(x);
    let y = int_arg(y);
    let width = i64::try_from(BOARD_WIDTH).ok()?;
    if (0..width).contains(&x) && (0..width).contains(&y) {
        usize::try_from(y * width + x).ok()
    } else {
        None
    }
}

fn cell_view(board: &Board, traits: &Traits, pos: Option<usize>) -> f64 {
    let Some(pos) = pos else {
        return ILLEGAL_VIEW;
    };
    match board.owner_of(pos) {
        None => OPEN_VIEW,
        Some(owner) if owner == traits.player => SELF_VIEW,
        Some(_) => OPP_VIEW,
    }
}

/// Executes a non-control instruction against `mem`, `traits` and the board
/// context. Returns `false` for control ops, which the calling VM must handle
/// itself.
#[expect(clippy::too_many_lines)]
pub fn execute_shared(
    inst: &Inst,
    mem: &mut [f64; MEM_SLOTS],
    traits: &mut Traits,
    ctx: &mut ExecContext<'_>,
) -> bool {
    let [a, b, c] = inst.args;
    match inst.op {
        Op::If | Op::Call | Op::Return | Op::Fork => return false,
        Op::Nop => {}
        Op::SetMem => mem[slot(a)] = f64::from(b),
        Op::CopyMem => mem[slot(b)] = mem[slot(a)],
        Op::SwapMem => mem.swap(slot(a), slot(b)),
        Op::Inc => mem[slot(a)] += 1.0,
        Op::Dec => mem[slot(a)] -= 1.0,
        Op::Add => mem[slot(c)] = mem[slot(a)] + mem[slot(b)],
        Op::Sub => mem[slot(c)] = mem[slot(a)] - mem[slot(b)],
        Op::Mult => mem[slot(c)] = mem[slot(a)] * mem[slot(b)],
        Op::Div => {
            let denom = mem[slot(b)];
            mem[slot(c)] = if denom == 0.0 { 0.0 } else { mem[slot(a)] / denom };
        }
        Op::Mod => {
            let denom = mem[slot(b)];
            mem[slot(c)] = if denom == 0.0 { 0.0 } else { mem[slot(a)] % denom };
        }
        Op::TestEqu => mem[slot(c)] = flag(mem[slot(a)] == mem[slot(b)]),
        Op::TestNEqu => mem[slot(c)] = flag(mem[slot(a)] != mem[slot(b)]),
        Op::TestLess => mem[slot(c)] = flag(mem[slot(a)] < mem[slot(b)]),
        Op::GetBoardWidth => {
            #[expect(clippy::cast_precision_loss)]
            {
                mem[slot(a)] = BOARD_WIDTH as f64;
            }
        }
        Op::EndTurn => traits.done = true,
        Op::SetMoveXy => {
            let x = int_arg(mem[slot(a)]);
            let y = int_arg(mem[slot(b)]);
            let width = i64::try_from(BOARD_WIDTH).unwrap_or(8);
            traits.proposed_move = Some(y.saturating_mul(width).saturating_add(x));
        }
        Op::SetMoveId => traits.proposed_move = Some(int_arg(mem[slot(a)])),
        Op::GetMoveXy => match traits.proposed_move.and_then(|id| {
            usize::try_from(id).ok().filter(|&pos| pos < NUM_CELLS)
        }) {
            Some(pos) => {
                #[expect(clippy::cast_precision_loss)]
                {
                    mem[slot(a)] = Board::pos_x(pos) as f64;
                    mem[slot(b)] = Board::pos_y(pos) as f64;
                }
            }
            None => {
                mem[slot(a)] = ILLEGAL_VIEW;
                mem[slot(b)] = ILLEGAL_VIEW;
            }
        },
        Op::GetMoveId => {
            #[expect(clippy::cast_precision_loss)]
            {
                mem[slot(a)] = traits
                    .proposed_move
                    .map_or(ILLEGAL_VIEW, |id| id as f64);
            }
        }
        Op::IsValidXy | Op::IsValidId | Op::IsValidOppXy | Op::IsValidOppId => {
            let (pos, dest) = match inst.op {
                Op::IsValidXy | Op::IsValidOppXy => {
                    (cell_from_xy(mem[slot(a)], mem[slot(b)]), slot(c))
                }
                _ => (cell_from_id(mem[slot(a)]), slot(b)),
            };
            let player = match inst.op {
                Op::IsValidXy | Op::IsValidId => traits.player,
                _ => traits.player.opponent(),
            };
            mem[dest] = flag(pos.is_some_and(|pos| {
                ctx.cache.is_valid_move(ctx.sandbox.active(), player, pos)
            }));
        }
        Op::AdjacentXy => {
            let pos = cell_from_xy(mem[slot(a)], mem[slot(b)]);
            let dir = Direction::from_index(int_arg(mem[slot(c)]));
            match pos.and_then(|pos| Board::neighbor(pos, dir)) {
                Some(next) => {
                    #[expect(clippy::cast_precision_loss)]
                    {
                        mem[slot(a)] = Board::pos_x(next) as f64;
                        mem[slot(b)] = Board::pos_y(next) as f64;
                    }
                }
                None => {
                    mem[slot(a)] = ILLEGAL_VIEW;
                    mem[slot(b)] = ILLEGAL_VIEW;
                }
            }
        }
        Op::AdjacentId => {
            let pos = cell_from_id(mem[slot(a)]);
            let dir = Direction::from_index(int_arg(mem[slot(b)]));
            #[expect(clippy::cast_precision_loss)]
            {
                mem[slot(c)] = pos
                    .and_then(|pos| Board::neighbor(pos, dir))
                    .map_or(ILLEGAL_VIEW, |next| next as f64);
            }
        }
        Op::ValidMoveCount => {
            #[expect(clippy::cast_precision_loss)]
            {
                mem[slot(a)] =
                    ctx.cache.move_count(ctx.sandbox.active(), traits.player) as f64;
            }
        }
        Op::ValidOppMoveCount => {
            #[expect(clippy::cast_precision_loss)]
            {
                mem[slot(a)] = ctx
                    .cache
                    .move_count(ctx.sandbox.active(), traits.player.opponent())
                    as f64;
            }
        }
        Op::GetBoardValueXy => {
            let pos = cell_from_xy(mem[slot(a)], mem[slot(b)]);
            mem[slot(c)] = cell_view(ctx.sandbox.active(), traits, pos);
        }
        Op::GetBoardValueId => {
            let pos = cell_from_id(mem[slot(a)]);
            mem[slot(b)] = cell_view(ctx.sandbox.active(), traits, pos);
        }
        Op::PlaceDiskXy | Op::PlaceDiskId | Op::PlaceOppDiskXy | Op::PlaceOppDiskId => {
            let (pos, dest) = match inst.op {
                Op::PlaceDiskXy | Op::PlaceOppDiskXy => {
                    (cell_from_xy(mem[slot(a)], mem[slot(b)]), slot(c))
                }
                _ => (cell_from_id(mem[slot(a)]), slot(b)),
            };
            let player = match inst.op {
                Op::PlaceDiskXy | Op::PlaceDiskId => traits.player,
                _ => traits.player.opponent(),
            };
            let placed = pos.is_some_and(|pos| {
                ctx.sandbox.active_mut().do_move(player, pos).is_ok()
            });
            mem[dest] = flag(placed);
        }
        Op::FlipCountXy | Op::FlipCountId | Op::OppFlipCountXy | Op::OppFlipCountId => {
            let (pos, dest) = match inst.op {
                Op::FlipCountXy | Op::OppFlipCountXy => {
                    (cell_from_xy(mem[slot(a)], mem[slot(b)]), slot(c))
                }
                _ => (cell_from_id(mem[slot(a)]), slot(b)),
            };
            let player = match inst.op {
                Op::FlipCountXy | Op::FlipCountId => traits.player,
                _ => traits.player.opponent(),
            };
            #[expect(clippy::cast_precision_loss)]
            {
                mem[dest] = pos.map_or(0.0, |pos| {
                    ctx.cache.flip_count(ctx.sandbox.active(), player, pos) as f64
                });
            }
        }
        Op::FrontierCount => {
            #[expect(clippy::cast_precision_loss)]
            {
                mem[slot(a)] = ctx
                    .cache
                    .frontier_count(ctx.sandbox.active(), traits.player)
                    as f64;
            }
        }
        Op::ResetBoard => ctx.sandbox.reset_active(ctx.origin),
        Op::IsOver => mem[slot(a)] = flag(ctx.cache.is_over(ctx.sandbox.active())),
    }
    true
}
