//! # Ferrule Gen
//!
//! `ferrule-gen` generates typed ferrule bindings from Protobuf service descriptors. For every
//! input file it produces one Rust file holding, per service:
//!
//! * a typed client (`<Service>Client`) with one method per RPC,
//! * companion stream types for the streaming methods,
//! * a server trait (`<Service>Server`) to implement the business logic,
//! * a `build_<service>_procedures` function registering every method under every encoding.
//!
//! The generated file is meant to be included in the module `prost` generates for the file's
//! package, next to the message types:
//!
//! ```rust,ignore
//! pub mod kv {
//!     include!(concat!(env!("OUT_DIR"), "/kv.rs"));
//!     include!(concat!(env!("OUT_DIR"), "/kv.ferrule.rs"));
//! }
//! ```
//!
//! Generation is all-or-nothing: every file is rendered in memory first and nothing is written
//! if any of them fails.
pub mod config;
pub mod ir;
mod render;
pub mod template;

use config::{ConfigError, GeneratorConfig};
use ir::FileBindings;
use prost_reflect::{DescriptorPool, FileDescriptor};
use std::{
    fs,
    path::{Path, PathBuf},
};
use template::TemplateError;

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("File '{0}' is not part of the descriptor set")]
    FileNotFound(String),

    #[error("Invalid descriptor set: '{0}'")]
    Descriptor(#[from] prost_reflect::DescriptorError),

    #[error("Methods '{first}' and '{second}' of service '{service}' both map to '{ident}'")]
    MethodNameCollision {
        service: String,
        first: String,
        second: String,
        ident: String,
    },

    #[error("Failed to render {fragment}: '{source}'")]
    FragmentMismatch {
        fragment: String,
        source: TemplateError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to write '{path}': '{source}'")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One generated Rust file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Path relative to the output directory.
    pub name: String,
    pub content: String,
}

/// Generates the bindings of `files`.
///
/// # Arguments
///
/// * `pool` - Descriptors of the input files and everything they import.
/// * `files` - Names of the files to generate, as recorded in the descriptor set. When empty,
///   every file declaring at least one service is generated.
/// * `config` - Generator settings.
pub fn generate(
    pool: &DescriptorPool,
    files: &[String],
    config: &GeneratorConfig,
) -> Result<Vec<GeneratedFile>, GenerateError> {
    let targets: Vec<FileDescriptor> = if files.is_empty() {
        pool.files()
            .filter(|file| file.services().next().is_some())
            .collect()
    } else {
        files
            .iter()
            .map(|name| {
                pool.get_file_by_name(name)
                    .ok_or_else(|| GenerateError::FileNotFound(name.clone()))
            })
            .collect::<Result<_, _>>()?
    };

    targets
        .iter()
        .map(|file| {
            let bindings = FileBindings::build(file, config)?;
            let content = render::render_file(&bindings, config)?;
            tracing::debug!(
                source = %bindings.source,
                services = bindings.services.len(),
                "Rendered bindings"
            );
            Ok(GeneratedFile {
                name: bindings.output_name,
                content,
            })
        })
        .collect()
}

/// Decodes an encoded `FileDescriptorSet` and generates the bindings of `files`.
pub fn generate_from_descriptor_set(
    bytes: &[u8],
    files: &[String],
    config: &GeneratorConfig,
) -> Result<Vec<GeneratedFile>, GenerateError> {
    let pool = DescriptorPool::decode(bytes)?;
    generate(&pool, files, config)
}

/// Writes generated files under `out_dir`, creating directories as needed.
pub fn write_all(files: &[GeneratedFile], out_dir: &Path) -> Result<(), GenerateError> {
    for file in files {
        let path = out_dir.join(&file.name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| GenerateError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, &file.content).map_err(|source| GenerateError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Generated bindings");
    }
    Ok(())
}
