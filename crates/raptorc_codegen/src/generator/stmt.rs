use raptorc_ast::{Node, Statement};
use raptorc_bytecode::{BranchKind, Emitter, Instruction};

use super::{GenerationContext, GeneratorKind};
use crate::error::CodegenError;

impl<E: Emitter> GenerationContext<'_, '_, E> {
    /// Parameter binding, variable declarations and hoisted functions.
    pub(crate) fn emit_prologue(&mut self, params: &[String]) -> Result<(), CodegenError> {
        for (index, param) in params.iter().enumerate() {
            let name = self.name_constant(param);
            self.emitter.emit(Instruction::BindParameter {
                index: index as u32,
                name,
            });
        }

        let hints = self.hints;
        for variable in &hints.declared_variables {
            let name = self.name_constant(variable);
            self.emitter.emit(Instruction::DeclareVar(name));
        }

        for function in &hints.hoisted_functions {
            let Some(function_name) = function.as_ref().name.as_deref() else {
                continue;
            };
            let index = self.compile_nested(function)?;
            let name = self.name_constant(function_name);
            self.emitter.emit(Instruction::MakeClosure(index));
            self.emitter.emit(Instruction::StoreName(name));
            self.emitter.emit(Instruction::Pop);
        }
        Ok(())
    }

    pub(crate) fn emit_epilogue(&mut self) {
        match self.kind {
            GeneratorKind::Global => self.emitter.emit(Instruction::ReturnCompletion),
            GeneratorKind::Function => {
                self.emitter.emit(Instruction::PushUndefined);
                self.emitter.emit(Instruction::Return);
            }
        }
    }

    pub(crate) fn emit_statement(&mut self, stmt: &Node<Statement>) -> Result<(), CodegenError> {
        let span = stmt.span();
        match stmt.as_ref() {
            // Declarations are handled by the prologue.
            Statement::Function(_) | Statement::Empty => {}
            Statement::Block(statements) => {
                for inner in statements {
                    self.emit_statement(inner)?;
                }
            }
            Statement::Var { name, init } => {
                let Some(init) = init else {
                    return Ok(());
                };
                self.emitter.mark_sequence_point(span.start, span.end);
                self.emit_expression(init)?;
                let name = self.name_constant(name);
                self.emitter.emit(Instruction::StoreName(name));
                self.emitter.emit(Instruction::Pop);
            }
            Statement::Expr(expr) => {
                self.emitter.mark_sequence_point(span.start, span.end);
                self.emit_expression(expr)?;
                match self.kind {
                    GeneratorKind::Global => self.emitter.emit(Instruction::SetCompletion),
                    GeneratorKind::Function => self.emitter.emit(Instruction::Pop),
                }
            }
            Statement::Return(value) => {
                if self.kind == GeneratorKind::Global {
                    return Err(CodegenError::Malformed(
                        "return statement outside of a function".to_string(),
                    ));
                }
                self.emitter.mark_sequence_point(span.start, span.end);
                match value {
                    Some(value) => self.emit_expression(value)?,
                    None => self.emitter.emit(Instruction::PushUndefined),
                }
                self.emitter.emit(Instruction::Return);
            }
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let otherwise = self.emitter.create_label();
                let cond_span = cond.span();
                self.emitter.mark_sequence_point(cond_span.start, cond_span.end);
                self.emit_expression(cond)?;
                self.emitter.branch(BranchKind::IfFalse, otherwise);
                self.emit_statement(then_branch)?;
                match else_branch {
                    Some(else_branch) => {
                        let end = self.emitter.create_label();
                        self.emitter.branch(BranchKind::Always, end);
                        self.emitter.define_label_position(otherwise)?;
                        self.emit_statement(else_branch)?;
                        self.emitter.define_label_position(end)?;
                    }
                    None => self.emitter.define_label_position(otherwise)?,
                }
            }
            Statement::While { cond, body } => {
                let top = self.emitter.create_label();
                let exit = self.emitter.create_label();
                self.emitter.define_label_position(top)?;
                let cond_span = cond.span();
                self.emitter.mark_sequence_point(cond_span.start, cond_span.end);
                self.emit_expression(cond)?;
                self.emitter.branch(BranchKind::IfFalse, exit);
                self.emit_statement(body)?;
                self.emitter.branch(BranchKind::Always, top);
                self.emitter.define_label_position(exit)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use raptorc_bytecode::Instruction;
    use raptorc_config::CompilerOptions;
    use raptorc_runtime::{Runtime, Value};

    use crate::generator::{GenerationTarget, MethodGenerator};
    use crate::{CompiledUnitCache, ScriptSource};

    fn instructions(source: &str) -> Vec<Instruction> {
        let cache = CompiledUnitCache::new();
        let options = CompilerOptions::default();
        let source = Arc::new(ScriptSource::from_string(source));
        let unit = MethodGenerator::for_script(source, &options)
            .generate(&cache, &mut GenerationTarget::Fast)
            .unwrap();
        unit.entry().code().instructions.clone()
    }

    #[test]
    fn test_var_without_initializer_only_declares() {
        assert_eq!(
            instructions("var a;"),
            vec![Instruction::DeclareVar(0), Instruction::ReturnCompletion]
        );
    }

    #[test]
    fn test_if_else_layout() {
        let code = instructions("if (true) 1; else 2;");
        assert_eq!(
            code,
            vec![
                Instruction::PushBool(true),
                Instruction::JumpIfFalse(5),
                Instruction::PushConst(0),
                Instruction::SetCompletion,
                Instruction::Jump(7),
                Instruction::PushConst(1),
                Instruction::SetCompletion,
                Instruction::ReturnCompletion,
            ]
        );
    }

    #[test]
    fn test_while_loop_jumps_back_to_condition() {
        let code = instructions("while (false) x;");
        assert_eq!(code[0], Instruction::PushBool(false));
        assert_eq!(code[1], Instruction::JumpIfFalse(5));
        assert_eq!(code[4], Instruction::Jump(0));
    }

    #[test]
    fn test_completion_keeps_last_expression_statement() {
        let cache = CompiledUnitCache::new();
        let options = CompilerOptions::default();
        let unit = MethodGenerator::for_script(
            Arc::new(ScriptSource::from_string("1; var a = 5; 'last';")),
            &options,
        )
        .generate(&cache, &mut GenerationTarget::Fast)
        .unwrap();
        let runtime = Runtime::default();
        let scope = runtime.create_global_scope();
        let value = unit.invoke(&runtime, &scope, Value::Undefined, None).unwrap();
        assert_eq!(value, Value::from("last"));
    }
}
