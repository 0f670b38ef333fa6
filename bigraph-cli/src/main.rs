//! Work with serialized bigraphs on the command line.

use bigraph_cli::CliArgs;
use clap::Parser as _;
use tracing::error;

fn main() {
    let args = CliArgs::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(args.verbosity().tracing_level_filter())
        .init();

    if let Err(e) = args.run() {
        error!("{e:#}");
        std::process::exit(1);
    }
}
