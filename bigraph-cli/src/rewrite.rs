//! The `rewrite` subcommand.

use std::io::Write;

use anyhow::Result;
use bigraph_core::Bigraph;
use clap::Parser;
use clio::{Input, Output};
use tracing::info;

use crate::CliError;
use crate::bigraph_io::{BigraphInputArgs, read_rule};

/// Apply a rewriting rule to an agent.
#[derive(Parser, Debug)]
#[clap(version = "1.0", long_about = None)]
#[clap(about = "Apply a rewriting rule and write the successors as a JSON array.")]
#[group(id = "bigraph")]
#[non_exhaustive]
pub struct RewriteArgs {
    /// The agent.
    #[command(flatten)]
    pub input_args: BigraphInputArgs,

    /// The rule.
    #[arg(long, value_parser)]
    pub rule: Input,

    /// Stop after this many successors.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output file. Use '-' for stdout.
    #[clap(short, long, value_parser, default_value = "-")]
    pub output: Output,
}

impl RewriteArgs {
    /// Load the agent and the rule and write the successors.
    pub fn run(&mut self) -> Result<()> {
        let agent = self.input_args.get_bigraph()?;
        let rule = read_rule(&mut self.rule)?;
        let successors: Vec<Bigraph> = rule
            .apply(&agent)
            .map_err(CliError::from)?
            .take(self.limit.unwrap_or(usize::MAX))
            .collect::<Result<_, _>>()
            .map_err(CliError::from)?;
        info!("{} successors", successors.len());
        serde_json::to_writer_pretty(&mut self.output, &successors)?;
        writeln!(self.output)?;
        Ok(())
    }
}
