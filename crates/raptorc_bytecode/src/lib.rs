//! Stack-machine bytecode for generated units.
//!
//! The code generator drives an [`Emitter`]; [`CodeBuffer`] is the concrete
//! emitter that resolves labels and produces an immutable [`Code`] object.
//! Everything here is serde-serialisable so generated code can be persisted
//! and reloaded without regenerating it.

pub mod code;
pub mod emitter;
pub mod instruction;
pub mod logging;
pub mod source_map;

pub use code::{Code, Constant, UnitSignature};
pub use emitter::{BranchKind, CodeBuffer, EmitError, Emitter, Label};
pub use instruction::Instruction;
pub use logging::LoggingEmitter;
pub use source_map::{SourceMap, SourceMapBuilder};
