//! Object model and interpreter the generated units run against.

pub mod error;
pub mod global;
mod interpreter;
pub mod runtime;
pub mod scope;
pub mod unit;
pub mod value;

pub use error::{ErrorKind, RuntimeError, StackFrame};
pub use global::GlobalObject;
pub use runtime::Runtime;
pub use scope::Scope;
pub use unit::{CompiledUnit, EntryPoint};
pub use value::{FunctionObject, Value};
