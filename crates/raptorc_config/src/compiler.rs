use serde::{Deserialize, Serialize};

use crate::parse_flag;

/// How a compilation emits its code.
///
/// Chosen once per compilation and never revisited while generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenerationMode {
    /// Transient code, not addressable from a persisted module.
    Fast,
    /// Code defined as a named unit type inside a module that can be written
    /// to disk, with id and dependency-id accessors.
    Persistable,
}

impl GenerationMode {
    pub fn name(self) -> &'static str {
        match self {
            GenerationMode::Fast => "fast",
            GenerationMode::Persistable => "persistable",
        }
    }
}

/// Options owned by a compiler instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Compile every script as if it started with `"use strict"`.
    pub force_strict_mode: bool,

    /// Attach source maps with document names and force persistable generation.
    pub enable_debugging: bool,

    /// Keep a textual disassembly of every generated unit.
    pub enable_disassembly: bool,
}

impl CompilerOptions {
    /// Load options from environment variables
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Ok(val) = std::env::var("RAPTOR_STRICT") {
            options.force_strict_mode = parse_flag(&val, false);
        }

        if let Ok(val) = std::env::var("RAPTOR_DEBUG") {
            options.enable_debugging = parse_flag(&val, true);
        }

        if let Ok(val) = std::env::var("RAPTOR_DISASSEMBLE") {
            options.enable_disassembly = parse_flag(&val, true);
        }

        options
    }

    /// Persistable generation is forced whenever debugging is enabled or the
    /// owning compiler is going to save its output.
    pub fn generation_mode(&self, persisting: bool) -> GenerationMode {
        if persisting || self.enable_debugging {
            GenerationMode::Persistable
        } else {
            GenerationMode::Fast
        }
    }
}
