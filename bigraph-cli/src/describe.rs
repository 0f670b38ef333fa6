//! Describe the contents of a bigraph.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::Result;
use bigraph_core::{Bigraph, BigraphView, Interface};
use clap::Parser;
use clio::Output;
use smol_str::SmolStr;

use crate::bigraph_io::BigraphInputArgs;

/// Describe a serialized bigraph.
#[derive(Parser, Debug)]
#[clap(version = "1.0", long_about = None)]
#[clap(about = "Describe the interfaces and contents of a bigraph.")]
#[group(id = "bigraph")]
#[non_exhaustive]
pub struct DescribeArgs {
    /// Bigraph input.
    #[command(flatten)]
    pub input_args: BigraphInputArgs,

    #[arg(long, default_value = "false", help_heading = "JSON")]
    /// Output in json format
    pub json: bool,

    /// Output file. Use '-' for stdout.
    #[clap(short, long, value_parser, default_value = "-")]
    pub output: Output,
}

/// Summary of a bigraph.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Description {
    /// Identifier of the signature.
    pub signature: SmolStr,
    /// The roots and outer names.
    pub outer_face: Interface,
    /// The sites and inner names.
    pub inner_face: Interface,
    /// Number of nodes.
    pub nodes: usize,
    /// Number of edges.
    pub edges: usize,
    /// Number of nodes of each control.
    pub controls: BTreeMap<SmolStr, usize>,
}

impl From<&Bigraph> for Description {
    fn from(bigraph: &Bigraph) -> Self {
        let mut controls = BTreeMap::new();
        for n in bigraph.nodes() {
            *controls.entry(bigraph.control(n).name().clone()).or_default() += 1;
        }
        Self {
            signature: bigraph.signature().id().clone(),
            outer_face: bigraph.outer_face(),
            inner_face: bigraph.inner_face(),
            nodes: bigraph.num_nodes(),
            edges: bigraph.num_edges(),
            controls,
        }
    }
}

impl DescribeArgs {
    /// Load and describe the bigraph.
    pub fn run(&mut self) -> Result<()> {
        let bigraph = self.input_args.get_bigraph()?;
        let desc = Description::from(&bigraph);
        if self.json {
            serde_json::to_writer_pretty(&mut self.output, &desc)?;
            writeln!(self.output)?;
        } else {
            print_description(&desc, &mut self.output)?;
        }
        Ok(())
    }
}

/// Print a human-readable description of a bigraph.
fn print_description<W: Write + ?Sized>(desc: &Description, writer: &mut W) -> Result<()> {
    let node_str = if desc.nodes == 1 { "node" } else { "nodes" };
    let edge_str = if desc.edges == 1 { "edge" } else { "edges" };
    writeln!(writer, "Bigraph over signature {}", desc.signature)?;
    writeln!(writer, "Outer face: {}", desc.outer_face)?;
    writeln!(writer, "Inner face: {}", desc.inner_face)?;
    writeln!(
        writer,
        "Contains {} {node_str} and {} {edge_str}",
        desc.nodes, desc.edges
    )?;
    for (control, count) in &desc.controls {
        writeln!(writer, "  {control}: {count}")?;
    }
    Ok(())
}
