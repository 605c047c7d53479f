use raptorc_ast::{BinaryOp, Expr, Literal, LogicalOp, Node, UnaryOp};
use raptorc_bytecode::{BranchKind, Constant, Emitter, Instruction};

use super::GenerationContext;
use crate::error::CodegenError;

impl<E: Emitter> GenerationContext<'_, '_, E> {
    /// Emit code leaving the value of `expr` on the operand stack.
    pub(crate) fn emit_expression(&mut self, expr: &Node<Expr>) -> Result<(), CodegenError> {
        match expr.as_ref() {
            Expr::Literal(literal) => self.emit_literal(literal)?,
            Expr::Identifier(name) => {
                let name = self.name_constant(name);
                self.emitter.emit(Instruction::LoadName(name));
            }
            Expr::This => self.emitter.emit(Instruction::LoadThis),
            Expr::Assign { name, value } => {
                self.emit_expression(value)?;
                let name = self.name_constant(name);
                self.emitter.emit(Instruction::StoreName(name));
            }
            Expr::Unary { op, expr } => {
                self.emit_expression(expr)?;
                self.emitter.emit(match op {
                    UnaryOp::Neg => Instruction::Neg,
                    UnaryOp::Not => Instruction::Not,
                });
            }
            Expr::Binary { op, left, right } => {
                self.emit_expression(left)?;
                self.emit_expression(right)?;
                self.emitter.emit(binary_instruction(*op));
            }
            Expr::Logical { op, left, right } => {
                // Short-circuit: the left value is the result unless the
                // right operand has to be evaluated.
                let end = self.emitter.create_label();
                self.emit_expression(left)?;
                self.emitter.emit(Instruction::Dup);
                let kind = match op {
                    LogicalOp::And => BranchKind::IfFalse,
                    LogicalOp::Or => BranchKind::IfTrue,
                };
                self.emitter.branch(kind, end);
                self.emitter.emit(Instruction::Pop);
                self.emit_expression(right)?;
                self.emitter.define_label_position(end)?;
            }
            Expr::Call { callee, args } => {
                self.emit_expression(callee)?;
                for arg in args {
                    self.emit_expression(arg)?;
                }
                let argc = u32::try_from(args.len())
                    .map_err(|_| CodegenError::Malformed("too many call arguments".to_string()))?;
                self.emitter.emit(Instruction::Call(argc));
            }
            Expr::Function(function) => {
                let index = self.compile_nested(function)?;
                self.emitter.emit(Instruction::MakeClosure(index));
            }
        }
        Ok(())
    }

    fn emit_literal(&mut self, literal: &Literal) -> Result<(), CodegenError> {
        match literal {
            Literal::Number(n) => {
                if !n.is_finite() {
                    return Err(CodegenError::Malformed(format!(
                        "numeric literal {n} is not finite"
                    )));
                }
                let index = self.emitter.add_constant(Constant::Number(*n));
                self.emitter.emit(Instruction::PushConst(index));
            }
            Literal::String(s) => {
                let index = self.emitter.add_constant(Constant::String(s.clone()));
                self.emitter.emit(Instruction::PushConst(index));
            }
            Literal::Bool(b) => self.emitter.emit(Instruction::PushBool(*b)),
            Literal::Null => self.emitter.emit(Instruction::PushNull),
            Literal::Undefined => self.emitter.emit(Instruction::PushUndefined),
        }
        Ok(())
    }
}

fn binary_instruction(op: BinaryOp) -> Instruction {
    match op {
        BinaryOp::Add => Instruction::Add,
        BinaryOp::Sub => Instruction::Sub,
        BinaryOp::Mul => Instruction::Mul,
        BinaryOp::Div => Instruction::Div,
        BinaryOp::Mod => Instruction::Mod,
        BinaryOp::Eq => Instruction::Eq,
        BinaryOp::Ne => Instruction::Ne,
        BinaryOp::Lt => Instruction::Lt,
        BinaryOp::LtEq => Instruction::LtEq,
        BinaryOp::Gt => Instruction::Gt,
        BinaryOp::GtEq => Instruction::GtEq,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use raptorc_ast::{Expr, Literal, Node, Program, Span, Statement};
    use raptorc_bytecode::Instruction;
    use raptorc_config::CompilerOptions;

    use crate::error::CodegenError;
    use crate::generator::{GenerationTarget, MethodGenerator};
    use crate::{CompiledUnitCache, ScriptSource};

    fn generate(program: Program) -> Result<Vec<Instruction>, CodegenError> {
        let cache = CompiledUnitCache::new();
        let options = CompilerOptions::default();
        let source = Arc::new(ScriptSource::from_string(""));
        let unit = MethodGenerator::for_program(source, &options, program)
            .generate(&cache, &mut GenerationTarget::Fast)?;
        Ok(unit.entry().code().instructions.clone())
    }

    fn expression_statement(expr: Expr) -> Program {
        let span = Span::new(0, 1);
        Program::new(vec![Node::new(Statement::Expr(Node::new(expr, span)), span)], false)
    }

    #[test]
    fn test_logical_and_short_circuits() {
        let program = raptorc_parser::parse("a && b;").unwrap();
        assert_eq!(
            generate(program).unwrap(),
            vec![
                Instruction::LoadName(0),
                Instruction::Dup,
                Instruction::JumpIfFalse(5),
                Instruction::Pop,
                Instruction::LoadName(1),
                Instruction::SetCompletion,
                Instruction::ReturnCompletion,
            ]
        );
    }

    #[test]
    fn test_call_pushes_callee_then_arguments() {
        let program = raptorc_parser::parse("f(1, 'two');").unwrap();
        assert_eq!(
            generate(program).unwrap()[..4],
            [
                Instruction::LoadName(0),
                Instruction::PushConst(1),
                Instruction::PushConst(2),
                Instruction::Call(2),
            ]
        );
    }

    #[test]
    fn test_non_finite_literal_is_malformed() {
        let program = expression_statement(Expr::Literal(Literal::Number(f64::INFINITY)));
        assert!(matches!(generate(program), Err(CodegenError::Malformed(_))));
    }

    #[test]
    fn test_repeated_constants_share_a_slot() {
        let program = raptorc_parser::parse("x = 1; y = 1; x = 2;").unwrap();
        let code = generate(program).unwrap();
        assert_eq!(code[0], Instruction::PushConst(0));
        assert_eq!(code[1], Instruction::StoreName(1));
        assert_eq!(code[3], Instruction::PushConst(0));
        assert_eq!(code[6], Instruction::PushConst(3));
        assert_eq!(code[7], Instruction::StoreName(1));
    }
}
