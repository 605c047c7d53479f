//! Instruction set.
//!
//! Stack effect notation: `[..., a, b] -> [..., result]`. Operands named
//! `name` are indices into the constant pool that must hold a string.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instruction {
    /// `[...] -> [..., constants[index]]`
    PushConst(u32),
    PushUndefined,
    PushNull,
    PushBool(bool),
    /// Push the receiver the unit was invoked with.
    LoadThis,
    Pop,
    Dup,

    /// Resolve `name` through the scope chain.
    LoadName(u32),
    /// `[..., value] -> [..., value]`, assigning `name` through the scope chain.
    StoreName(u32),
    /// Declare `name` in the innermost scope as `undefined` unless already present.
    DeclareVar(u32),
    /// Bind argument `index` (or `undefined`) to parameter `name`.
    BindParameter { index: u32, name: u32 },
    /// Instantiate dependency `index` of the running unit as a closure over
    /// the current scope.
    MakeClosure(u32),

    Neg,
    Not,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    LtEq,
    Gt,
    GtEq,

    /// Absolute jump to an instruction index.
    Jump(u32),
    /// Pops the condition.
    JumpIfFalse(u32),
    /// Pops the condition.
    JumpIfTrue(u32),

    /// `[..., callee, arg0, .., argN-1] -> [..., result]`
    Call(u32),
    /// Pops the return value and leaves the unit.
    Return,
    /// Pops a value into the completion register of a script body.
    SetCompletion,
    /// Leaves the unit with the completion register.
    ReturnCompletion,
}

impl Instruction {
    /// Target of a jump instruction.
    pub fn jump_target(&self) -> Option<u32> {
        match self {
            Instruction::Jump(target)
            | Instruction::JumpIfFalse(target)
            | Instruction::JumpIfTrue(target) => Some(*target),
            _ => None,
        }
    }

    /// Constant-pool operand, used for annotating listings.
    pub fn constant_operand(&self) -> Option<u32> {
        match self {
            Instruction::PushConst(index)
            | Instruction::LoadName(index)
            | Instruction::StoreName(index)
            | Instruction::DeclareVar(index)
            | Instruction::BindParameter { name: index, .. } => Some(*index),
            _ => None,
        }
    }
}
