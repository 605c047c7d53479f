//! Persisted module format.
//!
//! A module is a named list of unit types. Each type carries an entry
//! point plus two accessors: the unit's id and its dependency ids. Script
//! bodies are exported with the entry method name [`GLOBAL_METHOD_NAME`]
//! and act as initializers; the restore routine lists them in the order
//! they must run.

use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use raptorc_bytecode::Code;
use raptorc_cache::UnitId;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::ModuleError;

pub const MODULE_FORMAT: &str = "raptor-module";
pub const MODULE_VERSION: u32 = 1;
pub const GLOBAL_METHOD_NAME: &str = "global_";
pub const RESTORE_ROUTINE_NAME: &str = "RestoreScriptEngine";
const UNIT_TYPE_PREFIX: &str = "ScriptUnit";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedType {
    pub name: String,
    pub entry: Code,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_id: Option<UnitId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_ids: Option<Vec<UnitId>>,
}

impl ExportedType {
    pub fn is_initializer(&self) -> bool {
        self.entry.signature.method_name == GLOBAL_METHOD_NAME
    }
}

/// Entry that recreates a runtime by running the listed initializers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreRoutine {
    pub name: String,
    pub initializers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedModule {
    pub format: String,
    pub version: u32,
    pub name: String,
    pub types: Vec<ExportedType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore: Option<RestoreRoutine>,
}

impl PersistedModule {
    pub fn find_type(&self, name: &str) -> Option<&ExportedType> {
        self.types.iter().find(|ty| ty.name == name)
    }

    /// Script-body types, in module order.
    pub fn initializers(&self) -> impl Iterator<Item = &ExportedType> {
        self.types.iter().filter(|ty| ty.is_initializer())
    }

    pub fn to_json(&self) -> Result<String, ModuleError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ModuleError> {
        let module: PersistedModule = serde_json::from_str(json)?;
        module.check_format()?;
        Ok(module)
    }

    fn check_format(&self) -> Result<(), ModuleError> {
        if self.format != MODULE_FORMAT || self.version != MODULE_VERSION {
            return Err(ModuleError::UnsupportedFormat {
                format: self.format.clone(),
                version: self.version,
            });
        }
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self, ModuleError> {
        let file = std::fs::File::open(path).map_err(|source| ModuleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let module: PersistedModule = serde_json::from_reader(BufReader::new(file))?;
        module.check_format()?;
        debug!(path = %path.display(), types = module.types.len(), "read module");
        Ok(module)
    }

    /// Write through a temporary file in the destination directory, so a
    /// reader never sees a partially written module.
    pub fn write_to(&self, path: &Path) -> Result<(), ModuleError> {
        let io_error = |source: std::io::Error| ModuleError::Io {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let file = NamedTempFile::new_in(dir).map_err(io_error)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush().map_err(io_error)?;
        let file = writer
            .into_inner()
            .map_err(|err| io_error(err.into_error()))?;
        file.persist(path).map_err(|err| io_error(err.error))?;

        debug!(path = %path.display(), types = self.types.len(), "wrote module");
        Ok(())
    }
}

/// Growable module that persistable generation defines unit types in.
#[derive(Debug)]
pub struct ModuleBuilder {
    name: String,
    types: Vec<ExportedType>,
    type_count: usize,
    restore: Option<RestoreRoutine>,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
            type_count: 0,
            restore: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &[ExportedType] {
        &self.types
    }

    pub fn type_count(&self) -> usize {
        self.type_count
    }

    /// Define a new unit type exposing `entry`, its id and dependency ids.
    /// Returns the type name.
    pub fn define_unit_type(
        &mut self,
        entry: &Arc<Code>,
        function_id: UnitId,
        dependency_ids: Vec<UnitId>,
    ) -> String {
        let name = format!("{UNIT_TYPE_PREFIX}{}", self.type_count);
        self.type_count += 1;
        self.types.push(ExportedType {
            name: name.clone(),
            entry: Code::clone(entry),
            function_id: Some(function_id),
            dependency_ids: Some(dependency_ids),
        });
        name
    }

    /// Drop every type defined after the first `type_count`, so a failed
    /// compilation leaves no partial unit types behind.
    pub fn truncate(&mut self, type_count: usize) {
        if type_count < self.type_count {
            debug!(
                module = %self.name,
                discarded = self.type_count - type_count,
                "discarded unit types"
            );
            self.types.truncate(type_count);
            self.type_count = type_count;
        }
    }

    /// Append the restore routine naming every initializer defined so far.
    pub fn define_restore_routine(&mut self) {
        let initializers = self
            .types
            .iter()
            .filter(|ty| ty.is_initializer())
            .map(|ty| ty.name.clone())
            .collect();
        self.restore = Some(RestoreRoutine {
            name: RESTORE_ROUTINE_NAME.to_string(),
            initializers,
        });
    }

    pub fn finish(self) -> PersistedModule {
        PersistedModule {
            format: MODULE_FORMAT.to_string(),
            version: MODULE_VERSION,
            name: self.name,
            types: self.types,
            restore: self.restore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raptorc_bytecode::{Instruction, UnitSignature};

    fn code(method_name: &str) -> Arc<Code> {
        Arc::new(Code {
            signature: UnitSignature {
                method_name: method_name.to_string(),
                display_name: String::new(),
                params: vec![],
                strict: false,
            },
            instructions: vec![Instruction::ReturnCompletion],
            constants: vec![],
            source_map: None,
        })
    }

    fn sample() -> PersistedModule {
        let mut builder = ModuleBuilder::new("sample");
        builder.define_unit_type(&code("function_f"), 0, vec![]);
        builder.define_unit_type(&code(GLOBAL_METHOD_NAME), 1, vec![0]);
        builder.define_restore_routine();
        builder.finish()
    }

    #[test]
    fn test_builder_names_types_and_restore() {
        let module = sample();
        assert_eq!(module.types[0].name, "ScriptUnit0");
        assert_eq!(module.types[1].name, "ScriptUnit1");
        let restore = module.restore.as_ref().unwrap();
        assert_eq!(restore.name, RESTORE_ROUTINE_NAME);
        assert_eq!(restore.initializers, vec!["ScriptUnit1"]);
        assert_eq!(
            module.initializers().map(|ty| ty.name.as_str()).collect::<Vec<_>>(),
            vec!["ScriptUnit1"]
        );
    }

    #[test]
    fn test_truncate_reuses_type_names() {
        let mut builder = ModuleBuilder::new("sample");
        builder.define_unit_type(&code("function_f"), 0, vec![]);
        builder.define_unit_type(&code("function_g"), 1, vec![]);
        builder.truncate(1);
        builder.truncate(5);
        assert_eq!(builder.type_count(), 1);
        assert_eq!(builder.define_unit_type(&code(GLOBAL_METHOD_NAME), 2, vec![0]), "ScriptUnit1");
        assert_eq!(builder.types().len(), 2);
    }

    #[test]
    fn test_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.rmod");
        let module = sample();
        module.write_to(&path).unwrap();
        assert_eq!(PersistedModule::read_from(&path).unwrap(), module);
        // Only the module itself remains in the directory.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_accessor_deserializes_as_none() {
        let mut module = sample();
        module.types[0].function_id = None;
        let json = module.to_json().unwrap();
        assert!(!json.contains("\"function_id\": null"));
        let back = PersistedModule::from_json(&json).unwrap();
        assert_eq!(back.types[0].function_id, None);
        assert_eq!(back.types[1].function_id, Some(1));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let mut module = sample();
        module.version = 99;
        let json = serde_json::to_string(&module).unwrap();
        assert!(matches!(
            PersistedModule::from_json(&json),
            Err(ModuleError::UnsupportedFormat { version: 99, .. })
        ));
    }

    #[test]
    fn test_unwritable_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("app.rmod");
        assert!(matches!(
            sample().write_to(&path),
            Err(ModuleError::Io { .. })
        ));
    }
}
