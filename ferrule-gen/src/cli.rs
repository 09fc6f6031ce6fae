//! # CLI
//!
//! Command-line interface of `ferrule-gen`, defined with `clap`.
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "ferrule-gen",
    version,
    about = "Generate ferrule bindings from a Protobuf descriptor set"
)]
pub struct Cli {
    /// Path to the encoded FileDescriptorSet (e.g. `protoc --include_imports -o kv.bin kv.proto`)
    #[arg(long)]
    pub descriptor_set: PathBuf,

    /// Directory receiving the generated files
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Path to a JSON generator configuration
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// File to generate, as named in the descriptor set (repeatable).
    /// Defaults to every file declaring a service.
    #[arg(long = "file")]
    pub files: Vec<String>,
}
