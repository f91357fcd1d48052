//! Linear register-machine hardware.
//!
//! A program is a flat instruction sequence executed one instruction per step
//! with a cyclic instruction pointer, so execution never falls off the end.
//! There are no functions, threads or calls: `Call`, `Return` and `Fork` are
//! no-ops, and instruction tags are inert (though still inherited and
//! mutated).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    ExecContext, HardwareLimits, Inst, MEM_SLOTS, MutationParams, Op, ProgramRep, Traits,
    VirtualHardware, execute_shared, hardware, slot,
};
use oxello_engine::Player;
use rand::Rng;

/// A linear register-machine program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterProgram {
    pub insts: Vec<Inst>,
}

impl fmt::Display for RegisterProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for inst in &self.insts {
            writeln!(f, "{inst}")?;
        }
        Ok(())
    }
}

impl ProgramRep for RegisterProgram {
    type Hardware = RegisterVm;

    fn boot(&self, _limits: &HardwareLimits) -> RegisterVm {
        RegisterVm::new(self.clone())
    }

    fn load_into(&self, hardware: &mut RegisterVm) {
        hardware.load(self.clone());
    }

    fn mutate<R: Rng + ?Sized>(&mut self, params: &MutationParams, rng: &mut R) -> usize {
        hardware::mutate_insts(&mut self.insts, params, rng)
    }
}

/// The register-machine virtual machine.
#[derive(Debug)]
pub struct RegisterVm {
    program: RegisterProgram,
    traits: Traits,
    regs: [f64; MEM_SLOTS],
    ip: usize,
}

impl RegisterVm {
    #[must_use]
    pub fn new(program: RegisterProgram) -> Self {
        Self {
            program,
            traits: Traits::new(Player::Dark),
            regs: [0.0; MEM_SLOTS],
            ip: 0,
        }
    }

    pub fn load(&mut self, program: RegisterProgram) {
        self.program = program;
        self.reset(self.traits.player);
    }

    #[must_use]
    pub fn ip(&self) -> usize {
        self.ip
    }
}

impl VirtualHardware for RegisterVm {
    fn reset(&mut self, player: Player) {
        self.traits.reset(player);
        self.regs = [0.0; MEM_SLOTS];
        self.ip = 0;
    }

    fn step(&mut self, ctx: &mut ExecContext<'_>) {
        let len = self.program.insts.len();
        if len == 0 {
            return;
        }
        let inst = self.program.insts[self.ip % len];
        self.ip = (self.ip + 1) % len;
        match inst.op {
            Op::If => {
                if self.regs[slot(inst.args[0])] == 0.0 {
                    self.ip = (self.ip + 1) % len;
                }
            }
            Op::Call | Op::Return | Op::Fork => {}
            _ => {
                execute_shared(&inst, &mut self.regs, &mut self.traits, ctx);
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

    fn run_vm(program: RegisterProgram, steps: usize) -> RegisterVm {
        let mut vm = RegisterVm::new(program);
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

    #[test]
    fn test_propose_and_end_turn() {
        let vm = run_vm(
            RegisterProgram {
                insts: vec![
                    Inst::new(Op::SetMem, [0, 26, 0], 0),
                    Inst::new(Op::SetMoveId, [0, 0, 0], 0),
                    Inst::new(Op::EndTurn, [0, 0, 0], 0),
                ],
            },
            100,
        );
        assert!(vm.is_done());
        assert_eq!(vm.traits().proposed_move, Some(26));
    }

    #[test]
    fn test_ip_wraps_around() {
        // No EndTurn: execution loops forever without leaving the program.
        let vm = run_vm(
            RegisterProgram {
                insts: vec![
                    Inst::new(Op::Inc, [0, 0, 0], 0),
                    Inst::new(Op::Nop, [0, 0, 0], 0),
                ],
            },
            10,
        );
        assert!(!vm.is_done());
        assert_eq!(vm.regs[0], 5.0);
        assert_eq!(vm.ip(), 0);
    }

    #[test]
    fn test_if_skip_wraps() {
        // The If is the last instruction; skipping on false wraps past the
        // first instruction.
        let vm = run_vm(
            RegisterProgram {
                insts: vec![
                    Inst::new(Op::EndTurn, [0, 0, 0], 0),
                    Inst::new(Op::If, [0, 0, 0], 0),
                ],
            },
            1,
        );
        assert!(vm.is_done());

        let mut vm = RegisterVm::new(RegisterProgram {
            insts: vec![
                Inst::new(Op::Nop, [0, 0, 0], 0),
                Inst::new(Op::If, [0, 0, 0], 0),
            ],
        });
        let origin = Board::new();
        let cache = BoardCache::new();
        let mut sandbox = SandboxPool::new(1);
        let mut ctx = ExecContext {
            sandbox: &mut sandbox,
            cache: &cache,
            origin: &origin,
        };
        vm.step(&mut ctx);
        vm.step(&mut ctx);
        // reg 0 is zero, so the If skips the wrapped-around Nop.
        assert_eq!(vm.ip(), 1);
    }

    #[test]
    fn test_empty_program_is_inert() {
        let vm = run_vm(RegisterProgram { insts: vec![] }, 10);
        assert!(!vm.is_done());
        assert_eq!(vm.traits().proposed_move, None);
    }

    #[test]
    fn test_call_return_fork_are_noops() {
        let vm = run_vm(
            RegisterProgram {
                insts: vec![
                    Inst::new(Op::Call, [0, 0, 0], 0xffff),
                    Inst::new(Op::Fork, [0, 0, 0], 0xffff),
                    Inst::new(Op::Return, [0, 0, 0], 0),
                    Inst::new(Op::EndTurn, [0, 0, 0], 0),
                ],
            },
            10,
        );
        assert!(vm.is_done());
    }

    #[test]
    fn test_serde_round_trip() {
        let program = RegisterProgram {
            insts: vec![Inst::new(Op::FlipCountId, [0, 1, 0], 0x00ff)],
        };
        let json = serde_json::to_string(&program).unwrap();
        let restored: RegisterProgram = serde_json::from_str(&json).unwrap();
        assert_eq!(program, restored);
    }
}
