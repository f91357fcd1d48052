//! The seam between program representations and the evaluation loop.

use rand::Rng;

use crate::{ExecContext, Inst, MEM_SLOTS, Op, Traits};
use oxello_engine::Player;

/// Execution limits for hardware that supports threads and calls.
#[derive(Debug, Clone, Copy)]
pub struct HardwareLimits {
    /// Maximum concurrently live threads.
    pub max_threads: usize,
    /// Maximum call-stack depth per thread.
    pub max_call_depth: usize,
    /// Minimum tag similarity for `Call` and `Fork` binding, in `0.0..=1.0`.
    pub min_bind_thresh: f64,
}

impl Default for HardwareLimits {
    fn default() -> Self {
        Self {
            max_threads: 16,
            max_call_depth: 128,
            min_bind_thresh: 0.5,
        }
    }
}

/// Per-instruction mutation rates.
#[derive(Debug, Clone, Copy)]
pub struct MutationParams {
    /// Exclusive upper bound for randomized arguments.
    pub max_arg: u8,
    /// Per-bit probability of flipping a tag bit.
    pub tag_flip_rate: f64,
    /// Per-instruction probability of substituting the opcode, and per-argument
    /// probability of substituting an argument.
    pub inst_sub_rate: f64,
}

impl Default for MutationParams {
    fn default() -> Self {
        #[expect(clippy::cast_possible_truncation)]
        let max_arg = MEM_SLOTS as u8;
        Self {
            max_arg,
            tag_flip_rate: 0.05,
            inst_sub_rate: 0.005,
        }
    }
}

/// A running agent: something that can be pointed at a position and stepped
/// until it proposes a move.
pub trait VirtualHardware {
    /// Clears all execution state and prepares to play as `player`.
    fn reset(&mut self, player: Player);

    /// Advances execution by one unit. A no-op for finished or empty
    /// programs.
    fn step(&mut self, ctx: &mut ExecContext<'_>);

    /// Checks whether the agent has signalled the end of its turn.
    fn is_done(&self) -> bool {
        self.traits().done
    }

    fn traits(&self) -> &Traits;

    fn traits_mut(&mut self) -> &mut Traits;
}

/// A heritable program: bootable into hardware, mutable, printable.
pub trait ProgramRep: Clone + Send + std::fmt::Display {
    type Hardware: VirtualHardware;

    /// Builds fresh hardware loaded with this program.
    fn boot(&self, limits: &HardwareLimits) -> Self::Hardware;

    /// Replaces the program on existing hardware, clearing execution state.
    fn load_into(&self, hardware: &mut Self::Hardware);

    /// Applies point mutations in place. Returns the number of changes made.
    fn mutate<R: Rng + ?Sized>(&mut self, params: &MutationParams, rng: &mut R) -> usize;
}

/// Mutates a flat instruction sequence: per-bit tag flips plus opcode and
/// argument substitutions. Shared by both program representations.
pub(crate) fn mutate_insts<R: Rng + ?Sized>(
    insts: &mut [Inst],
    params: &MutationParams,
    rng: &mut R,
) -> usize {
    use rand::seq::IndexedRandom as _;

    let mut mutations = 0;
    for inst in insts {
        for bit in 0..16 {
            if rng.random_bool(params.tag_flip_rate) {
                inst.tag ^= 1 << bit;
                mutations += 1;
            }
        }
        if rng.random_bool(params.inst_sub_rate) {
            inst.op = *Op::ALL.choose(rng).unwrap_or(&Op::Nop);
            mutations += 1;
        }
        for arg in &mut inst.args {
            if rng.random_bool(params.inst_sub_rate) {
                *arg = rng.random_range(0..params.max_arg.max(1));
                mutations += 1;
            }
        }
    }
    mutations
}

/// Flips tag bits at the per-bit rate. Used for function tags.
pub(crate) fn mutate_tag<R: Rng + ?Sized>(
    tag: &mut u16,
    params: &MutationParams,
    rng: &mut R,
) -> usize {
    let mut mutations = 0;
    for bit in 0..16 {
        if rng.random_bool(params.tag_flip_rate) {
            *tag ^= 1 << bit;
            mutations += 1;
        }
    }
    mutations
}
