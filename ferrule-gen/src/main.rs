//! # ferrule-gen Entry Point
//!
//! 1. Parses command-line arguments using [`cli::Cli`].
//! 2. Loads the optional configuration and the descriptor set.
//! 3. Renders every requested file, then writes them all to the output directory.
mod cli;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use ferrule_gen::config::GeneratorConfig;
use std::{fs, process};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Cli::parse();

    let config = match &args.config {
        Some(path) => GeneratorConfig::load(path)?,
        None => GeneratorConfig::default(),
    };

    let bytes = fs::read(&args.descriptor_set)
        .with_context(|| format!("Failed to read '{}'", args.descriptor_set.display()))?;

    let files = ferrule_gen::generate_from_descriptor_set(&bytes, &args.files, &config)?;
    ferrule_gen::write_all(&files, &args.out_dir)?;

    Ok(())
}
