use thiserror::Error;

use crate::code::{Code, Constant, UnitSignature};
use crate::instruction::Instruction;
use crate::source_map::SourceMapBuilder;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmitError {
    #[error("label L{0} was branched to but never defined")]
    UndefinedLabel(u32),
    #[error("label L{0} defined more than once")]
    LabelRedefined(u32),
    #[error("label L{0} does not belong to this emitter")]
    UnknownLabel(u32),
}

/// A branch target created by [`Emitter::create_label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

impl Label {
    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Always,
    IfFalse,
    IfTrue,
}

/// Low-level instruction emitter driven by the code generator.
pub trait Emitter {
    fn emit(&mut self, instruction: Instruction);

    /// Returns the pool index of `constant`, reusing an equal entry.
    fn add_constant(&mut self, constant: Constant) -> u32;

    fn create_label(&mut self) -> Label;

    /// Bind `label` to the position of the next emitted instruction.
    fn define_label_position(&mut self, label: Label) -> Result<(), EmitError>;

    fn branch(&mut self, kind: BranchKind, label: Label);

    /// Map the next emitted instruction to the source range `start..end`.
    fn mark_sequence_point(&mut self, start: usize, end: usize);

    /// Index the next emitted instruction will have.
    fn position(&self) -> usize;

    /// Resolve labels and produce the finished code.
    fn complete(self) -> Result<Code, EmitError>;

    /// Disassembly recorded while emitting, if this emitter keeps one.
    fn take_disassembly(&mut self) -> Option<String> {
        None
    }
}

/// In-memory emitter producing a [`Code`] object.
pub struct CodeBuffer {
    signature: UnitSignature,
    instructions: Vec<Instruction>,
    constants: Vec<Constant>,
    labels: Vec<Option<u32>>,
    fixups: Vec<(usize, Label)>,
    source_map: Option<SourceMapBuilder>,
}

impl CodeBuffer {
    pub fn new(signature: UnitSignature) -> Self {
        Self {
            signature,
            instructions: Vec::new(),
            constants: Vec::new(),
            labels: Vec::new(),
            fixups: Vec::new(),
            source_map: None,
        }
    }

    /// Record sequence points into a source map naming `document`.
    pub fn with_source_map(mut self, document: Option<String>) -> Self {
        self.source_map = Some(SourceMapBuilder::new(document));
        self
    }

    pub fn signature(&self) -> &UnitSignature {
        &self.signature
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    fn check_label(&self, label: Label) -> Result<(), EmitError> {
        if (label.0 as usize) < self.labels.len() {
            Ok(())
        } else {
            Err(EmitError::UnknownLabel(label.0))
        }
    }
}

impl Emitter for CodeBuffer {
    fn emit(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    fn add_constant(&mut self, constant: Constant) -> u32 {
        let existing = self.constants.iter().position(|c| match (c, &constant) {
            (Constant::Number(a), Constant::Number(b)) => a.to_bits() == b.to_bits(),
            (a, b) => a == b,
        });
        match existing {
            Some(index) => index as u32,
            None => {
                self.constants.push(constant);
                (self.constants.len() - 1) as u32
            }
        }
    }

    fn create_label(&mut self) -> Label {
        self.labels.push(None);
        Label((self.labels.len() - 1) as u32)
    }

    fn define_label_position(&mut self, label: Label) -> Result<(), EmitError> {
        self.check_label(label)?;
        let slot = &mut self.labels[label.0 as usize];
        if slot.is_some() {
            return Err(EmitError::LabelRedefined(label.0));
        }
        *slot = Some(self.instructions.len() as u32);
        Ok(())
    }

    fn branch(&mut self, kind: BranchKind, label: Label) {
        self.fixups.push((self.instructions.len(), label));
        // Placeholder target, patched in `complete`.
        self.instructions.push(match kind {
            BranchKind::Always => Instruction::Jump(u32::MAX),
            BranchKind::IfFalse => Instruction::JumpIfFalse(u32::MAX),
            BranchKind::IfTrue => Instruction::JumpIfTrue(u32::MAX),
        });
    }

    fn mark_sequence_point(&mut self, start: usize, end: usize) {
        let pc = self.instructions.len() as u32;
        if let Some(map) = self.source_map.as_mut() {
            map.add(pc, start as u32, end as u32);
        }
    }

    fn position(&self) -> usize {
        self.instructions.len()
    }

    fn complete(mut self) -> Result<Code, EmitError> {
        for (at, label) in std::mem::take(&mut self.fixups) {
            self.check_label(label)?;
            let target = self.labels[label.0 as usize].ok_or(EmitError::UndefinedLabel(label.0))?;
            self.instructions[at] = match self.instructions[at] {
                Instruction::Jump(_) => Instruction::Jump(target),
                Instruction::JumpIfFalse(_) => Instruction::JumpIfFalse(target),
                Instruction::JumpIfTrue(_) => Instruction::JumpIfTrue(target),
                other => other,
            };
        }

        Ok(Code {
            signature: self.signature,
            instructions: self.instructions,
            constants: self.constants,
            source_map: self.source_map.map(SourceMapBuilder::finish),
        })
    }
}
