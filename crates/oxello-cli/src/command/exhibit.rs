use std::path::PathBuf;

use anyhow::Context as _;
use oxello_engine::BoardCache;
use oxello_evaluator::{MoveEvaluator, ScoreValues, TestCaseSet, score_move};
use oxello_vm::{HardwareLimits, ProgramRep, RegisterProgram, TagProgram};
use serde::de::DeserializeOwned;

use crate::{command::RepresentationKind, model::AgentModel, util};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ExhibitArg {
    /// Trained model JSON file
    #[arg(long)]
    model: PathBuf,
    #[arg(long, default_value = "tag")]
    representation: RepresentationKind,
    /// Test case CSV file
    #[arg(long)]
    testcases: PathBuf,
    /// Number of cases to replay (0 means all)
    #[arg(long, default_value_t = 5)]
    limit: usize,
    #[arg(long, default_value_t = 256)]
    step_budget: usize,
    #[arg(long, default_value_t = 1)]
    sandboxes: usize,
}

pub(crate) fn run(arg: &ExhibitArg) -> anyhow::Result<()> {
    match arg.representation {
        RepresentationKind::Tag => run_with::<TagProgram>(arg),
        RepresentationKind::Register => run_with::<RegisterProgram>(arg),
    }
}

fn run_with<P>(arg: &ExhibitArg) -> anyhow::Result<()>
where
    P: ProgramRep + DeserializeOwned,
{
    let model: AgentModel<P> = util::read_json_file("model", &arg.model)?;
    let cases = TestCaseSet::load(&arg.testcases).with_context(|| {
        format!("Failed to load test cases from {}", arg.testcases.display())
    })?;

    let hardware = model.program.boot(&HardwareLimits::default());
    let mut evaluator = MoveEvaluator::new(hardware, arg.sandboxes, arg.step_budget);
    let cache = BoardCache::new();
    let values = ScoreValues::default();

    println!("Model: {} (trained {})", model.name, model.trained_at);
    let limit = if arg.limit == 0 { cases.len() } else { arg.limit };
    let mut expert_hits = 0_usize;
    for (index, case) in cases.iter().take(limit).enumerate() {
        let raw = evaluator.evaluate_move(&cache, case, false);
        let promised = evaluator.evaluate_move(&cache, case, true);
        let score = score_move(case, raw, &values);
        if raw.is_some_and(|p| usize::try_from(p).is_ok_and(|p| p == case.expert_move)) {
            expert_hits += 1;
        }

        println!();
        println!(
            "Case #{index} ({:?} to move, round {}):",
            case.player, case.round
        );
        println!("{}", case.board);
        println!("  Expert: {}", case.expert_move);
        match raw {
            Some(raw) => println!("  Proposed: {raw}"),
            None => println!("  Proposed: (none)"),
        }
        if promised != raw {
            match promised {
                Some(repaired) => println!("  Repaired to: {repaired}"),
                None => {}
            }
        }
        println!("  Score: {score:.1}");
    }
    println!();
    println!("Expert matches: {expert_hits}/{limit}");
    Ok(())
}
