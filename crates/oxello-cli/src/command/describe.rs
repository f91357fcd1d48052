use std::path::PathBuf;

use oxello_vm::{RegisterProgram, TagProgram};
use serde::de::DeserializeOwned;

use crate::{command::RepresentationKind, model::AgentModel, util};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct DescribeArg {
    /// Trained model JSON file
    #[arg(long)]
    model: PathBuf,
    #[arg(long, default_value = "tag")]
    representation: RepresentationKind,
}

pub(crate) fn run(arg: &DescribeArg) -> anyhow::Result<()> {
    match arg.representation {
        RepresentationKind::Tag => run_with::<TagProgram>(arg),
        RepresentationKind::Register => run_with::<RegisterProgram>(arg),
    }
}

fn run_with<P>(arg: &DescribeArg) -> anyhow::Result<()>
where
    P: std::fmt::Display + DeserializeOwned,
{
    let model: AgentModel<P> = util::read_json_file("model", &arg.model)?;
    println!("Name: {}", model.name);
    println!("Trained at: {}", model.trained_at);
    println!("Generations: {}", model.generations);
    println!("Seed: {}", model.seed);
    println!("Final fitness: {:.3}", model.final_fitness);
    println!();
    println!("{}", model.program);
    Ok(())
}
