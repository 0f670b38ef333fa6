//! Input arguments for the bigraph CLI.

use std::io::Read;

use bigraph_core::{Bigraph, RewritingRule};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use clio::Input;
use serde::de::DeserializeOwned;

use crate::CliError;

/// Arguments for reading a bigraph input.
#[derive(Debug, clap::Args)]
pub struct BigraphInputArgs {
    /// Input file. Defaults to `-` for stdin.
    #[arg(value_parser, default_value = "-", help_heading = "Input")]
    pub input: Input,

    /// Verbosity.
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl BigraphInputArgs {
    /// Read a bigraph from the input.
    ///
    /// Loading validates the bigraph.
    pub fn get_bigraph(&mut self) -> Result<Bigraph, CliError> {
        read_json(&mut self.input)
    }

    /// Read a bigraph from a generic reader instead of the input.
    pub fn get_bigraph_from_reader<R: Read>(&self, reader: R) -> Result<Bigraph, CliError> {
        read_json(reader)
    }
}

/// Read a rewriting rule.
pub fn read_rule<R: Read>(reader: R) -> Result<RewritingRule, CliError> {
    read_json(reader)
}

/// Read a bigraph.
pub fn read_bigraph<R: Read>(reader: R) -> Result<Bigraph, CliError> {
    read_json(reader)
}

fn read_json<T: DeserializeOwned, R: Read>(reader: R) -> Result<T, CliError> {
    Ok(serde_json::from_reader(reader)?)
}
