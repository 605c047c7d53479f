use std::fmt::Write as _;

use crate::code::{Code, Constant};
use crate::emitter::{BranchKind, EmitError, Emitter, Label};
use crate::instruction::Instruction;

/// Emitter decorator that records a textual listing of everything emitted.
///
/// The listing is written in emission order, so branches show label names
/// rather than resolved targets.
pub struct LoggingEmitter<E> {
    inner: E,
    log: String,
}

impl<E: Emitter> LoggingEmitter<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            log: String::new(),
        }
    }

    pub fn log(&self) -> &str {
        &self.log
    }
}

impl<E: Emitter> Emitter for LoggingEmitter<E> {
    fn emit(&mut self, instruction: Instruction) {
        let _ = writeln!(self.log, "  {:04}  {instruction:?}", self.inner.position());
        self.inner.emit(instruction);
    }

    fn add_constant(&mut self, constant: Constant) -> u32 {
        self.inner.add_constant(constant)
    }

    fn create_label(&mut self) -> Label {
        self.inner.create_label()
    }

    fn define_label_position(&mut self, label: Label) -> Result<(), EmitError> {
        self.inner.define_label_position(label)?;
        let _ = writeln!(self.log, "L{}:", label.index());
        Ok(())
    }

    fn branch(&mut self, kind: BranchKind, label: Label) {
        let mnemonic = match kind {
            BranchKind::Always => "Jump",
            BranchKind::IfFalse => "JumpIfFalse",
            BranchKind::IfTrue => "JumpIfTrue",
        };
        let _ = writeln!(
            self.log,
            "  {:04}  {mnemonic} L{}",
            self.inner.position(),
            label.index()
        );
        self.inner.branch(kind, label);
    }

    fn mark_sequence_point(&mut self, start: usize, end: usize) {
        let _ = writeln!(self.log, "  .sequence {start}..{end}");
        self.inner.mark_sequence_point(start, end);
    }

    fn position(&self) -> usize {
        self.inner.position()
    }

    fn complete(self) -> Result<Code, EmitError> {
        self.inner.complete()
    }

    fn take_disassembly(&mut self) -> Option<String> {
        Some(std::mem::take(&mut self.log))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::UnitSignature;
    use crate::emitter::CodeBuffer;

    #[test]
    fn test_logging_emitter_records_and_forwards() {
        let buf = CodeBuffer::new(UnitSignature {
            method_name: "global_".into(),
            display_name: String::new(),
            params: vec![],
            strict: false,
        });
        let mut emitter = LoggingEmitter::new(buf);
        let end = emitter.create_label();
        emitter.mark_sequence_point(1, 2);
        emitter.emit(Instruction::PushBool(false));
        emitter.branch(BranchKind::IfFalse, end);
        emitter.define_label_position(end).unwrap();
        emitter.emit(Instruction::ReturnCompletion);

        let listing = emitter.take_disassembly().unwrap();
        assert!(listing.contains(".sequence 1..2"));
        assert!(listing.contains("0001  JumpIfFalse L0"));
        assert!(listing.contains("L0:"));

        let code = emitter.complete().unwrap();
        assert_eq!(code.instructions[1], Instruction::JumpIfFalse(2));
    }
}
