//! Tag-matching dataflow hardware.
//!
//! A program is a set of functions, each labelled with a 16-bit tag. Execution
//! starts by spawning one thread on the function closest to the begin-turn
//! tag; `Call` and `Fork` bind their operand tag to the closest function at or
//! above the similarity threshold. Up to a fixed number of threads run
//! round-robin, each advancing one instruction per hardware step.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    ExecContext, HardwareLimits, Inst, MEM_SLOTS, MutationParams, Op, ProgramRep, Traits,
    VirtualHardware, execute_shared, hardware, slot,
};
use oxello_engine::Player;
use rand::Rng;

/// Tag used to locate the entry function when a turn begins.
pub const BEGIN_TURN_TAG: u16 = 0xffff;

/// Similarity of two tags: the fraction of matching bits.
#[must_use]
pub fn tag_similarity(a: u16, b: u16) -> f64 {
    f64::from(16 - (a ^ b).count_ones()) / 16.0
}

/// One tagged function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFunction {
    pub tag: u16,
    pub insts: Vec<Inst>,
}

/// A tag-matching program: an unordered set of tagged functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagProgram {
    pub functions: Vec<TagFunction>,
}

impl TagProgram {
    /// Finds the function most similar to `tag`, requiring at least `thresh`.
    /// Ties keep the earliest function.
    #[must_use]
    pub fn best_match(&self, tag: u16, thresh: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (index, function) in self.functions.iter().enumerate() {
            let similarity = tag_similarity(tag, function.tag);
            if similarity >= thresh && best.is_none_or(|(_, s)| similarity > s) {
                best = Some((index, similarity));
            }
        }
        best.map(|(index, _)| index)
    }

    #[must_use]
    pub fn inst_count(&self) -> usize {
        self.functions.iter().map(|f| f.insts.len()).sum()
    }
}

impl fmt::Display for TagProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, function) in self.functions.iter().enumerate() {
            writeln!(f, "fn-{index} tag={:04x}", function.tag)?;
            for inst in &function.insts {
                writeln!(f, "  {inst}")?;
            }
        }
        Ok(())
    }
}

impl ProgramRep for TagProgram {
    type Hardware = TagVm;

    fn boot(&self, limits: &HardwareLimits) -> TagVm {
        TagVm::new(self.clone(), *limits)
    }

    fn load_into(&self, hardware: &mut TagVm) {
        hardware.load(self.clone());
    }

    fn mutate<R: Rng + ?Sized>(&mut self, params: &MutationParams, rng: &mut R) -> usize {
        let mut mutations = 0;
        for function in &mut self.functions {
            mutations += hardware::mutate_tag(&mut function.tag, params, rng);
            mutations += hardware::mutate_insts(&mut function.insts, params, rng);
        }
        mutations
    }
}

#[derive(Debug, Clone)]
struct Frame {
    func: usize,
    ip: usize,
    mem: [f64; MEM_SLOTS],
}

#[derive(Debug, Clone)]
struct ThreadState {
    frames: Vec<Frame>,
}

/// The tag-matching virtual machine.
#[derive(Debug)]
pub struct TagVm {
    program: TagProgram,
    limits: HardwareLimits,
    traits: Traits,
    /// Fixed-size thread arena; `None` slots are free.
    threads: Vec<Option<ThreadState>>,
    /// Arena slots that execute this step, in spawn order.
    active: Vec<usize>,
    /// Slots spawned mid-step; they first execute next step.
    pending: Vec<usize>,
}

impl TagVm {
    #[must_use]
    pub fn new(program: TagProgram, limits: HardwareLimits) -> Self {
        let mut vm = Self {
            program,
            limits,
            traits: Traits::new(Player::Dark),
            threads: Vec::new(),
            active: Vec::new(),
            pending: Vec::new(),
        };
        vm.reset(Player::Dark);
        vm
    }

    pub fn load(&mut self, program: TagProgram) {
        self.program = program;
        self.reset(self.traits.player);
    }

    /// Number of live threads.
    #[must_use]
    pub fn live_threads(&self) -> usize {
        self.threads.iter().filter(|t| t.is_some()).count()
    }

    fn free_slot(&self) -> Option<usize> {
        self.threads.iter().position(Option::is_none)
    }

    fn spawn(&mut self, thread: ThreadState) -> Option<usize> {
        let index = self.free_slot()?;
        self.threads[index] = Some(thread);
        Some(index)
    }

    /// Advances one thread by one instruction. Returns a forked child, if
    /// any; placing it in the arena is the caller's job.
    fn step_thread(
        &mut self,
        thread: &mut ThreadState,
        ctx: &mut ExecContext<'_>,
    ) -> Option<ThreadState> {
        let frame = thread.frames.last_mut()?;
        let insts = &self.program.functions[frame.func].insts;
        let Some(inst) = insts.get(frame.ip).copied() else {
            // Falling off the end of a function is an implicit return.
            thread.frames.pop();
            return None;
        };
        frame.ip += 1;
        match inst.op {
            Op::If => {
                if frame.mem[slot(inst.args[0])] == 0.0 {
                    frame.ip += 1;
                }
            }
            Op::Call => {
                if thread.frames.len() < self.limits.max_call_depth
                    && let Some(func) =
                        self.program.best_match(inst.tag, self.limits.min_bind_thresh)
                {
                    thread.frames.push(Frame {
                        func,
                        ip: 0,
                        mem: [0.0; MEM_SLOTS],
                    });
                }
            }
            Op::Return => {
                thread.frames.pop();
            }
            Op::Fork => {
                if let Some(func) =
                    self.program.best_match(inst.tag, self.limits.min_bind_thresh)
                {
                    let mem = frame.mem;
                    return Some(ThreadState {
                        frames: vec![Frame { func, ip: 0, mem }],
                    });
                }
            }
            _ => {
                execute_shared(&inst, &mut frame.mem, &mut self.traits, ctx);
            }
        }
        None
    }
}

impl VirtualHardware for TagVm {
    fn reset(&mut self, player: Player) {
        self.traits.reset(player);
        self.threads = vec![None; self.limits.max_threads.max(1)];
        self.active.clear();
        self.pending.clear();
        if let Some(func) = self.program.best_match(BEGIN_TURN_TAG, 0.0) {
            let thread = ThreadState {
                frames: vec![Frame {
                    func,
                    ip: 0,
                    mem: [0.0; MEM_SLOTS],
                }],
            };
            if let Some(index) = self.spawn(thread) {
                self.active.push(index);
            }
        }
    }

    fn step(&mut self, ctx: &mut ExecContext<'_>) {
        self.active.append(&mut self.pending);
        let snapshot = self.active.clone();
        for index in snapshot {
            let Some(mut thread) = self.threads[index].take() else {
                continue;
            };
            let child = self.step_thread(&mut thread, ctx);
            if thread.frames.is_empty() {
                self.active.retain(|&i| i != index);
            } else {
                self.threads[index] = Some(thread);
            }
            if let Some(child) = child
                && let Some(spawned) = self.spawn(child)
            {
                self.pending.push(spawned);
            }
        }
    }

    fn traits(&self) -> &Traits {
        &self.traits
    }

    fn traits_mut(&mut self) -> &mut Traits {
        &mut self.traits
    }
}

#[cfg(test)]
mod tests {
    use oxello_engine::{Board, BoardCache};

    use crate::SandboxPool;

    use super::*;

    fn run_vm(program: TagProgram, steps: usize) -> TagVm {
        let mut vm = TagVm::new(program, HardwareLimits::default());
        vm.reset(Player::Dark);
        let origin = Board::new();
        let cache = BoardCache::new();
        let mut sandbox = SandboxPool::new(1);
        sandbox.reset_from(&origin);
        let mut ctx = ExecContext {
            sandbox: &mut sandbox,
            cache: &cache,
            origin: &origin,
        };
        for _ in 0..steps {
            if vm.is_done() {
                break;
            }
            vm.step(&mut ctx);
        }
        vm
    }

    fn entry(insts: Vec<Inst>) -> TagProgram {
        TagProgram {
            functions: vec![TagFunction {
                tag: BEGIN_TURN_TAG,
                insts,
            }],
        }
    }

    #[test]
    fn test_propose_and_end_turn() {
        let vm = run_vm(
            entry(vec![
                Inst::new(Op::SetMem, [0, 19, 0], 0),
                Inst::new(Op::SetMoveId, [0, 0, 0], 0),
                Inst::new(Op::EndTurn, [0, 0, 0], 0),
            ]),
            100,
        );
        assert!(vm.is_done());
        assert_eq!(vm.traits().proposed_move, Some(19));
    }

    #[test]
    fn test_if_skips_next_on_zero() {
        let vm = run_vm(
            entry(vec![
                // mem[0] is 0, so the EndTurn is skipped.
                Inst::new(Op::If, [0, 0, 0], 0),
                Inst::new(Op::EndTurn, [0, 0, 0], 0),
                Inst::new(Op::SetMem, [1, 7, 0], 0),
                Inst::new(Op::If, [1, 0, 0], 0),
                Inst::new(Op::SetMoveId, [1, 0, 0], 0),
                Inst::new(Op::EndTurn, [0, 0, 0], 0),
            ]),
            100,
        );
        assert!(vm.is_done());
        assert_eq!(vm.traits().proposed_move, Some(7));
    }

    #[test]
    fn test_empty_program_is_inert() {
        let mut vm = run_vm(TagProgram { functions: vec![] }, 10);
        assert!(!vm.is_done());
        assert_eq!(vm.traits().proposed_move, None);
        vm.reset(Player::Light);
        assert_eq!(vm.traits().player, Player::Light);
    }

    #[test]
    fn test_thread_dies_on_implicit_return() {
        let mut vm = run_vm(entry(vec![Inst::new(Op::Nop, [0, 0, 0], 0)]), 5);
        assert_eq!(vm.live_threads(), 0);
        // Further steps are no-ops.
        let origin = Board::new();
        let cache = BoardCache::new();
        let mut sandbox = SandboxPool::new(1);
        let mut ctx = ExecContext {
            sandbox: &mut sandbox,
            cache: &cache,
            origin: &origin,
        };
        vm.step(&mut ctx);
        assert!(!vm.is_done());
    }

    #[test]
    fn test_recursive_call_respects_depth_cap() {
        // A function that calls itself. Depth is capped, so stepping a long
        // time must neither panic nor grow without bound; once the cap stops
        // new calls the stack unwinds and the thread dies.
        let vm = run_vm(
            TagProgram {
                functions: vec![TagFunction {
                    tag: BEGIN_TURN_TAG,
                    insts: vec![Inst::new(Op::Call, [0, 0, 0], BEGIN_TURN_TAG)],
                }],
            },
            1_000,
        );
        assert!(!vm.is_done());
        assert_eq!(vm.live_threads(), 0);
    }

    #[test]
    fn test_fork_respects_thread_cap() {
        let vm = run_vm(
            TagProgram {
                functions: vec![TagFunction {
                    tag: BEGIN_TURN_TAG,
                    insts: vec![
                        Inst::new(Op::Fork, [0, 0, 0], BEGIN_TURN_TAG),
                        Inst::new(Op::Return, [0, 0, 0], 0),
                    ],
                }],
            },
            200,
        );
        assert!(vm.live_threads() <= HardwareLimits::default().max_threads);
    }

    #[test]
    fn test_call_below_threshold_is_noop() {
        // Entry tag is all ones; the call tag all zeros gives similarity 0.
        let program = TagProgram {
            functions: vec![TagFunction {
                tag: BEGIN_TURN_TAG,
                insts: vec![
                    Inst::new(Op::Call, [0, 0, 0], 0x0000),
                    Inst::new(Op::EndTurn, [0, 0, 0], 0),
                ],
            }],
        };
        let vm = run_vm(program, 10);
        assert!(vm.is_done());
    }

    #[test]
    fn test_best_match_prefers_closest_tag() {
        let program = TagProgram {
            functions: vec![
                TagFunction {
                    tag: 0x0f0f,
                    insts: vec![],
                },
                TagFunction {
                    tag: 0xff0f,
                    insts: vec![],
                },
            ],
        };
        assert_eq!(program.best_match(0xffff, 0.5), Some(1));
        assert_eq!(program.best_match(0x0f0f, 0.5), Some(0));
        // 0x3f0f is two bits from either tag; ties keep the earliest function.
        assert_eq!(program.best_match(0x3f0f, 0.5), Some(0));
        assert_eq!(program.best_match(0xf0f0, 0.9), None);
    }

    #[test]
    fn test_program_serde_round_trip() {
        let program = entry(vec![
            Inst::new(Op::SetMem, [0, 19, 0], 0x1234),
            Inst::new(Op::EndTurn, [0, 0, 0], 0),
        ]);
        let json = serde_json::to_string(&program).unwrap();
        let restored: TagProgram = serde_json::from_str(&json).unwrap();
        assert_eq!(program, restored);
    }

    #[test]
    fn test_mutation_reports_changes() {
        use rand::SeedableRng as _;

        let mut program = entry(vec![Inst::new(Op::Nop, [0, 0, 0], 0); 50]);
        let original = program.clone();
        let mut rng = rand_pcg::Pcg64Mcg::seed_from_u64(7);
        let params = MutationParams {
            tag_flip_rate: 0.5,
            inst_sub_rate: 0.5,
            ..MutationParams::default()
        };
        let mutations = program.mutate(&params, &mut rng);
        assert!(mutations > 0);
        assert_ne!(program, original);

        // Rate zero never changes anything.
        let mut stable = original.clone();
        let params = MutationParams {
            tag_flip_rate: 0.0,
            inst_sub_rate: 0.0,
            ..MutationParams::default()
        };
        assert_eq!(stable.mutate(&params, &mut rng), 0);
        assert_eq!(stable, original);
    }
}
