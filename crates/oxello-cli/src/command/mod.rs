use clap::{Parser, Subcommand};

use self::{describe::DescribeArg, exhibit::ExhibitArg, train::TrainArg};

mod describe;
mod exhibit;
mod train;

/// Which program representation a model uses.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, derive_more::FromStr)]
pub(crate) enum RepresentationKind {
    #[default]
    Tag,
    Register,
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Evolve agents against an expert-labelled test case set
    Train(#[clap(flatten)] TrainArg),
    /// Replay a trained agent on test cases, with move repair
    Exhibit(#[clap(flatten)] ExhibitArg),
    /// Print a trained model's metadata and program listing
    Describe(#[clap(flatten)] DescribeArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Train(arg) => train::run(&arg)?,
        Mode::Exhibit(arg) => exhibit::run(&arg)?,
        Mode::Describe(arg) => describe::run(&arg)?,
    }
    Ok(())
}
