use std::{fs, io::Write as _, path::PathBuf};

use anyhow::Context as _;
use chrono::{Local, Utc};
use oxello_evaluator::{ScoreValues, TestCaseSet};
use oxello_training::{Experiment, ExperimentConfig, GenerationSummary, SelectionMethod};
use oxello_vm::{
    BEGIN_TURN_TAG, HardwareLimits, Inst, MutationParams, Op, ProgramRep, RegisterProgram,
    TagFunction, TagProgram,
};
use serde::{Serialize, de::DeserializeOwned};

use crate::{command::RepresentationKind, model::AgentModel, util};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct TrainArg {
    /// Test case CSV file
    #[arg(long)]
    testcases: PathBuf,
    #[arg(long, default_value = "tag")]
    representation: RepresentationKind,
    #[arg(long, default_value = "lexicase")]
    selection: SelectionMethod,
    #[arg(long, default_value_t = 500)]
    generations: usize,
    #[arg(long, default_value_t = 1000)]
    pop_size: usize,
    #[arg(long, default_value_t = 4)]
    tournament_size: usize,
    #[arg(long, default_value_t = 1)]
    elite_count: usize,
    #[arg(long, default_value_t = 256)]
    step_budget: usize,
    #[arg(long, default_value_t = 1)]
    sandboxes: usize,
    /// Game rounds per eco-selection phase
    #[arg(long, default_value_t = 10)]
    phase_len: usize,
    /// Largest game round the eco phase partition covers
    #[arg(long, default_value_t = 60)]
    max_round: usize,
    /// Score for proposing the expert's move
    #[arg(long, default_value_t = 2.0)]
    expert_value: f64,
    /// Score for proposing a legal, non-expert move
    #[arg(long, default_value_t = 1.0)]
    legal_value: f64,
    /// Score for proposing an illegal move or none at all
    #[arg(long, default_value_t = -5.0, allow_negative_numbers = true)]
    illegal_value: f64,
    /// Per-bit probability of flipping a tag bit during mutation
    #[arg(long, default_value_t = 0.05)]
    tag_flip_rate: f64,
    /// Per-instruction and per-argument substitution probability
    #[arg(long, default_value_t = 0.005)]
    inst_sub_rate: f64,
    /// Maximum live threads on tag hardware
    #[arg(long, default_value_t = 16)]
    max_threads: usize,
    /// Maximum call-stack depth per thread on tag hardware
    #[arg(long, default_value_t = 128)]
    max_call_depth: usize,
    /// Minimum tag similarity for call/fork binding
    #[arg(long, default_value_t = 0.5)]
    bind_thresh: f64,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Print fitness statistics every N generations
    #[arg(long, default_value_t = 100)]
    report_interval: usize,
    /// Save a best-program snapshot every N generations (0 disables)
    #[arg(long, default_value_t = 100)]
    snapshot_interval: usize,
    /// Seed program JSON file; a built-in ancestor is used when omitted
    #[arg(long)]
    ancestor: Option<PathBuf>,
    /// Run directory; a timestamped one is created when omitted
    #[arg(long)]
    output: Option<PathBuf>,
}

/// The built-in tag ancestor: propose cell 0 and yield. Everything useful is
/// left for evolution to discover.
fn tag_ancestor() -> TagProgram {
    TagProgram {
        functions: vec![TagFunction {
            tag: BEGIN_TURN_TAG,
            insts: vec![
                Inst::new(Op::SetMoveId, [0, 0, 0], 0),
                Inst::new(Op::EndTurn, [0, 0, 0], 0),
            ],
        }],
    }
}

fn register_ancestor() -> RegisterProgram {
    RegisterProgram {
        insts: vec![
            Inst::new(Op::SetMoveId, [0, 0, 0], 0),
            Inst::new(Op::EndTurn, [0, 0, 0], 0),
        ],
    }
}

pub(crate) fn run(arg: &TrainArg) -> anyhow::Result<()> {
    match arg.representation {
        RepresentationKind::Tag => {
            let founder = match &arg.ancestor {
                Some(path) => util::read_json_file("ancestor", path)?,
                None => tag_ancestor(),
            };
            run_with(arg, founder, "tag")
        }
        RepresentationKind::Register => {
            let founder = match &arg.ancestor {
                Some(path) => util::read_json_file("ancestor", path)?,
                None => register_ancestor(),
            };
            run_with(arg, founder, "register")
        }
    }
}

fn run_with<P>(arg: &TrainArg, founder: P, name: &str) -> anyhow::Result<()>
where
    P: ProgramRep + Serialize + DeserializeOwned,
{
    let cases = TestCaseSet::load(&arg.testcases).with_context(|| {
        format!("Failed to load test cases from {}", arg.testcases.display())
    })?;
    anyhow::ensure!(!cases.is_empty(), "test case set is empty");
    eprintln!(
        "Loaded {} test cases (max round {})",
        cases.len(),
        cases.max_round()
    );

    let run_dir = arg.output.clone().unwrap_or_else(|| {
        PathBuf::from(format!("run-{}", Local::now().format("%Y%m%d-%H%M%S")))
    });
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("Failed to create run directory {}", run_dir.display()))?;

    let config = ExperimentConfig {
        pop_size: arg.pop_size,
        selection: arg.selection,
        tournament_size: arg.tournament_size,
        elite_count: arg.elite_count,
        step_budget: arg.step_budget,
        sandbox_count: arg.sandboxes,
        phase_len: arg.phase_len,
        max_round: arg.max_round,
        score_values: ScoreValues {
            expert: arg.expert_value,
            legal: arg.legal_value,
            illegal: arg.illegal_value,
        },
        mutation: MutationParams {
            tag_flip_rate: arg.tag_flip_rate,
            inst_sub_rate: arg.inst_sub_rate,
            ..MutationParams::default()
        },
        limits: HardwareLimits {
            max_threads: arg.max_threads,
            max_call_depth: arg.max_call_depth,
            min_bind_thresh: arg.bind_thresh,
        },
        seed: arg.seed,
    };
    let mut experiment = Experiment::new(config, cases, founder);

    let fitness_path = run_dir.join("fitness.csv");
    let mut fitness_log = std::io::BufWriter::new(
        fs::File::create(&fitness_path)
            .with_context(|| format!("Failed to create {}", fitness_path.display()))?,
    );
    writeln!(fitness_log, "generation,min,max,mean,median,std_dev")?;

    for generation in 0..arg.generations {
        let summary = experiment.evaluate();
        log_fitness(&mut fitness_log, &summary)?;
        if arg.report_interval > 0 && generation % arg.report_interval == 0 {
            report(&summary);
        }
        if arg.snapshot_interval > 0 && generation % arg.snapshot_interval == 0 {
            let path = run_dir.join(format!("snapshot-gen{generation}.json"));
            util::save_json(experiment.best_program(), &path)?;
        }
        experiment.advance();
    }

    let summary = experiment.evaluate();
    log_fitness(&mut fitness_log, &summary)?;
    report(&summary);
    fitness_log.flush()?;

    let model = AgentModel {
        name: format!("{name}-{}", arg.selection),
        trained_at: Utc::now(),
        generations: summary.generation,
        seed: arg.seed,
        final_fitness: summary.best_total,
        program: experiment.best_program().clone(),
    };
    let model_path = run_dir.join("model.json");
    util::save_json(&model, &model_path)?;

    eprintln!();
    eprintln!("Training completed");
    eprintln!("  Model: {}", model_path.display());
    eprintln!("  Name: {}", model.name);
    eprintln!("  Final fitness: {:.3}", model.final_fitness);
    eprintln!(
        "  Distinct boards cached: {}",
        experiment.board_cache().len()
    );
    Ok(())
}

fn log_fitness(log: &mut impl std::io::Write, summary: &GenerationSummary) -> anyhow::Result<()> {
    writeln!(
        log,
        "{},{:.3},{:.3},{:.3},{:.3},{:.3}",
        summary.generation,
        summary.fitness.min,
        summary.fitness.max,
        summary.fitness.mean,
        summary.fitness.median,
        summary.fitness.std_dev,
    )?;
    Ok(())
}

fn report(summary: &GenerationSummary) {
    eprintln!("Generation #{}:", summary.generation);
    eprintln!("  Best: {:.3} (slot {})", summary.best_total, summary.best_slot);
    eprintln!("  Min:  {:.3}", summary.fitness.min);
    eprintln!("  Max:  {:.3}", summary.fitness.max);
    eprintln!("  Mean: {:.3}", summary.fitness.mean);
}
