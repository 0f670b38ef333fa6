//! The `match` subcommand.

use std::io::Write;

use anyhow::Result;
use bigraph_core::{Matcher, MatcherConfig};
use clap::Parser;
use clio::{Input, Output};
use tracing::debug;

use crate::CliError;
use crate::bigraph_io::{BigraphInputArgs, read_bigraph};

/// Count the occurrences of a redex in an agent.
#[derive(Parser, Debug)]
#[clap(version = "1.0", long_about = None)]
#[clap(about = "Count the occurrences of a redex in an agent.")]
#[group(id = "bigraph")]
#[non_exhaustive]
pub struct MatchArgs {
    /// The agent.
    #[command(flatten)]
    pub input_args: BigraphInputArgs,

    /// The redex.
    #[arg(long, value_parser)]
    pub redex: Input,

    /// Stop after this many matches.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Also match under nodes with passive controls.
    #[arg(long, default_value = "false")]
    pub ignore_passive: bool,

    /// Output file. Use '-' for stdout.
    #[clap(short, long, value_parser, default_value = "-")]
    pub output: Output,
}

impl MatchArgs {
    /// The matcher configuration given on the command line.
    pub fn config(&self) -> MatcherConfig {
        MatcherConfig {
            respect_passive: !self.ignore_passive,
            max_matches: self.limit,
        }
    }

    /// Load the agent and the redex and count the matches.
    pub fn run(&mut self) -> Result<()> {
        let agent = self.input_args.get_bigraph()?;
        let redex = read_bigraph(&mut self.redex)?;
        let matcher = Matcher::with_config(self.config());
        let count = matcher
            .matches(&agent, &redex)
            .map_err(CliError::from)?
            .count();
        debug!(count, "matching done");
        let match_str = if count == 1 { "match" } else { "matches" };
        writeln!(self.output, "{count} {match_str}")?;
        Ok(())
    }
}
