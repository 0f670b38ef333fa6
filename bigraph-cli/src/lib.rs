//! Standard command line tools, used by the bigraph binary.

use bigraph_core::{MatchError, RuleError, ValidationError};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use thiserror::Error;

pub mod bigraph_io;
pub mod describe;
pub mod match_cmd;
pub mod rewrite;
pub mod validate;

/// CLI arguments.
#[derive(Parser, Debug)]
#[clap(version = "1.0", long_about = None)]
#[clap(about = "Bigraph CLI tools.")]
#[group(id = "bigraph")]
#[non_exhaustive]
pub enum CliArgs {
    /// Validate a serialized bigraph.
    Validate(validate::ValArgs),
    /// Describe the interfaces and contents of a bigraph.
    Describe(describe::DescribeArgs),
    /// Count the occurrences of a redex in an agent.
    Match(match_cmd::MatchArgs),
    /// Apply a rewriting rule to an agent.
    Rewrite(rewrite::RewriteArgs),
}

impl CliArgs {
    /// The verbosity requested for the subcommand.
    pub fn verbosity(&self) -> &Verbosity<InfoLevel> {
        match self {
            CliArgs::Validate(args) => &args.input_args.verbose,
            CliArgs::Describe(args) => &args.input_args.verbose,
            CliArgs::Match(args) => &args.input_args.verbose,
            CliArgs::Rewrite(args) => &args.input_args.verbose,
        }
    }

    /// Runs the subcommand.
    pub fn run(self) -> anyhow::Result<()> {
        match self {
            CliArgs::Validate(mut args) => args.run(),
            CliArgs::Describe(mut args) => args.run(),
            CliArgs::Match(mut args) => args.run(),
            CliArgs::Rewrite(mut args) => args.run(),
        }
    }
}

/// Error type for the CLI.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CliError {
    /// Error reading input.
    #[error("Error reading from path: {0}")]
    InputFile(#[from] std::io::Error),
    /// Error parsing input.
    #[error("Error parsing input: {0}")]
    Parse(#[from] serde_json::Error),
    /// The bigraph breaks an invariant.
    #[error("Bigraph invalid: {0}")]
    Validate(#[from] ValidationError),
    /// The matcher could not run.
    #[error(transparent)]
    Match(#[from] MatchError),
    /// A rule could not be applied.
    #[error(transparent)]
    Rule(#[from] RuleError),
}
