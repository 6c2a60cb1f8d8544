//! Binary to print the JSON Schema of the server config file, or write it to a path

// Most runtime code is unused by this binary
#![allow(unused_imports, dead_code)]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use schemars::schema_for;

mod runtime;

#[derive(Debug, clap::Parser)]
#[command(about = "Generate the JSON Schema for graphql-handler-server config files")]
struct Args {
    /// Write the schema here instead of stdout
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let schema = serde_json::to_string_pretty(&schema_for!(runtime::Config))
        .context("Failed to generate schema")?;

    match Args::parse().output {
        Some(path) => std::fs::write(&path, schema)
            .with_context(|| format!("Could not write schema to {}", path.display()))?,
        None => println!("{schema}"),
    }
    Ok(())
}
