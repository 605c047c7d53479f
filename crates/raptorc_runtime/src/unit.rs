use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use raptorc_bytecode::Code;

use crate::error::RuntimeError;
use crate::interpreter;
use crate::runtime::Runtime;
use crate::scope::Scope;
use crate::value::Value;

/// Callable entry point of a unit: immutable, shareable bytecode.
#[derive(Clone, PartialEq)]
pub struct EntryPoint(Arc<Code>);

impl EntryPoint {
    pub fn new(code: Code) -> Self {
        Self(Arc::new(code))
    }

    pub fn from_shared(code: Arc<Code>) -> Self {
        Self(code)
    }

    pub fn code(&self) -> &Code {
        &self.0
    }

    pub fn shared_code(&self) -> Arc<Code> {
        Arc::clone(&self.0)
    }
}

impl fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EntryPoint({}, {} instructions)",
            self.0.signature.method_name,
            self.0.len()
        )
    }
}

/// Executable output of compiling one function or script body.
///
/// Immutable once built, apart from the disassembly which can be attached
/// at most once.
pub struct CompiledUnit {
    entry: EntryPoint,
    dependencies: Vec<Arc<CompiledUnit>>,
    disassembly: OnceCell<String>,
}

impl CompiledUnit {
    pub fn new(entry: EntryPoint, dependencies: Vec<Arc<CompiledUnit>>) -> Self {
        Self {
            entry,
            dependencies,
            disassembly: OnceCell::new(),
        }
    }

    pub fn entry(&self) -> &EntryPoint {
        &self.entry
    }

    pub fn dependencies(&self) -> &[Arc<CompiledUnit>] {
        &self.dependencies
    }

    pub fn method_name(&self) -> &str {
        &self.entry.code().signature.method_name
    }

    pub fn display_name(&self) -> &str {
        &self.entry.code().signature.display_name
    }

    pub fn disassembly(&self) -> Option<&str> {
        self.disassembly.get().map(String::as_str)
    }

    /// Attach a disassembly. Returns false if one was already attached.
    pub fn set_disassembly(&self, text: String) -> bool {
        self.disassembly.set(text).is_ok()
    }

    /// Run the unit in `scope`. `args` is `None` for script bodies.
    pub fn invoke(
        &self,
        runtime: &Runtime,
        scope: &Arc<Scope>,
        this: Value,
        args: Option<&[Value]>,
    ) -> Result<Value, RuntimeError> {
        let _depth = runtime.enter_call()?;
        interpreter::execute(self, runtime, scope, &this, args.unwrap_or(&[]))
    }
}

impl fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("entry", &self.entry)
            .field("dependencies", &self.dependencies.len())
            .field("disassembly", &self.disassembly.get().is_some())
            .finish()
    }
}
