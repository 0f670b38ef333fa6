//! The `validate` subcommand.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use crate::CliError;
use crate::bigraph_io::BigraphInputArgs;

/// Validate a serialized bigraph.
#[derive(Parser, Debug)]
#[clap(version = "1.0", long_about = None)]
#[clap(about = "Validate a bigraph.")]
#[group(id = "bigraph")]
#[non_exhaustive]
pub struct ValArgs {
    /// Bigraph input.
    #[command(flatten)]
    pub input_args: BigraphInputArgs,
}

/// String to print when validation is successful.
pub const VALID_PRINT: &str = "Bigraph valid!";

impl ValArgs {
    /// Load the bigraph and check its invariants.
    pub fn run(&mut self) -> Result<()> {
        let bigraph = self.input_args.get_bigraph()?;
        bigraph.validate().map_err(CliError::from)?;
        info!("{VALID_PRINT}");
        Ok(())
    }
}
