pub mod nodes;
pub mod span;
pub mod visitor;

pub use nodes::{BinaryOp, Expr, Function, Literal, LogicalOp, Node, Program, Statement, UnaryOp};
pub use span::{LineIndex, Span};
