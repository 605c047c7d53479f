use std::path::PathBuf;

use raptorc_bytecode::EmitError;
use raptorc_cache::CacheError;
use raptorc_parser::ParserError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("failed to parse {document}: {}", first_message(.errors))]
    Parse {
        document: String,
        errors: Vec<ParserError>,
    },

    #[error("malformed syntax tree: {0}")]
    Malformed(String),

    #[error(transparent)]
    Emit(#[from] EmitError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("persistable generation requires a module builder")]
    MissingModule,
}

fn first_message(errors: &[ParserError]) -> String {
    match errors.first() {
        Some(first) if errors.len() > 1 => format!("{first} (and {} more)", errors.len() - 1),
        Some(first) => first.to_string(),
        None => "no diagnostics".to_string(),
    }
}

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("failed to access module {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed module: {0}")]
    Format(#[from] serde_json::Error),

    #[error("unsupported module format {format} version {version}")]
    UnsupportedFormat { format: String, version: u32 },
}
