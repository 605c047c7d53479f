use std::sync::Arc;

use raptorc_bytecode::{Code, Constant, Instruction};

use crate::error::{RuntimeError, StackFrame};
use crate::runtime::Runtime;
use crate::scope::Scope;
use crate::unit::CompiledUnit;
use crate::value::{FunctionObject, Value};

struct Frame<'a> {
    unit: &'a CompiledUnit,
    code: &'a Code,
    runtime: &'a Runtime,
    scope: &'a Arc<Scope>,
    stack: Vec<Value>,
}

pub(crate) fn execute(
    unit: &CompiledUnit,
    runtime: &Runtime,
    scope: &Arc<Scope>,
    this: &Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let code = unit.entry().code();
    let mut frame = Frame {
        unit,
        code,
        runtime,
        scope,
        stack: Vec::new(),
    };

    let mut completion = Value::Undefined;
    let mut pc = 0usize;
    while let Some(instruction) = code.instructions.get(pc) {
        let at = pc;
        pc += 1;
        let step = frame.step(*instruction, this, args, &mut completion);
        match step {
            Ok(Flow::Next) => {}
            Ok(Flow::Jump(target)) => pc = target as usize,
            Ok(Flow::Return(value)) => return Ok(value),
            Err(err) => return Err(err.with_frame(frame_info(code, at))),
        }
    }

    Ok(Value::Undefined)
}

fn frame_info(code: &Code, pc: usize) -> StackFrame {
    let source_map = code.source_map.as_ref();
    StackFrame {
        name: code.signature.display_name.clone(),
        document: source_map.and_then(|map| map.document.clone()),
        span: source_map.and_then(|map| map.lookup(pc as u32)),
    }
}

enum Flow {
    Next,
    Jump(u32),
    Return(Value),
}

impl Frame<'_> {
    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::internal("operand stack underflow"))
    }

    fn peek(&self) -> Result<&Value, RuntimeError> {
        self.stack
            .last()
            .ok_or_else(|| RuntimeError::internal("operand stack underflow"))
    }

    fn name(&self, index: u32) -> Result<&str, RuntimeError> {
        self.code
            .name(index)
            .ok_or_else(|| RuntimeError::internal(format!("constant {index} is not a name")))
    }

    fn binary(&mut self, op: fn(&Value, &Value) -> Value) -> Result<Flow, RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;
        self.stack.push(op(&left, &right));
        Ok(Flow::Next)
    }

    fn step(
        &mut self,
        instruction: Instruction,
        this: &Value,
        args: &[Value],
        completion: &mut Value,
    ) -> Result<Flow, RuntimeError> {
        match instruction {
            Instruction::PushConst(index) => {
                let value = match self.code.constant(index) {
                    Some(Constant::Number(n)) => Value::Number(*n),
                    Some(Constant::String(s)) => Value::string(s.as_str()),
                    None => {
                        return Err(RuntimeError::internal(format!(
                            "constant {index} out of range"
                        )));
                    }
                };
                self.stack.push(value);
            }
            Instruction::PushUndefined => self.stack.push(Value::Undefined),
            Instruction::PushNull => self.stack.push(Value::Null),
            Instruction::PushBool(b) => self.stack.push(Value::Bool(b)),
            Instruction::LoadThis => self.stack.push(this.clone()),
            Instruction::Pop => {
                self.pop()?;
            }
            Instruction::Dup => {
                let top = self.peek()?.clone();
                self.stack.push(top);
            }

            Instruction::LoadName(index) => {
                let name = self.name(index)?;
                let value = self
                    .scope
                    .lookup(name)
                    .ok_or_else(|| RuntimeError::reference(format!("{name} is not defined")))?;
                self.stack.push(value);
            }
            Instruction::StoreName(index) => {
                let value = self.peek()?.clone();
                let name = self.name(index)?;
                if !self.scope.assign(name, &value) {
                    if self.code.signature.strict {
                        return Err(RuntimeError::reference(format!("{name} is not defined")));
                    }
                    self.runtime.global_object().set(name, value);
                }
            }
            Instruction::DeclareVar(index) => {
                let name = self.name(index)?;
                self.scope.declare(name);
            }
            Instruction::BindParameter { index, name } => {
                let name = self.name(name)?;
                let value = args.get(index as usize).cloned().unwrap_or_default();
                self.scope.define(name, value);
            }
            Instruction::MakeClosure(index) => {
                let unit = self.unit.dependencies().get(index as usize).ok_or_else(|| {
                    RuntimeError::internal(format!("unit has no dependency {index}"))
                })?;
                let closure = FunctionObject::new(Arc::clone(unit), Arc::clone(self.scope));
                self.stack.push(Value::Function(Arc::new(closure)));
            }

            Instruction::Neg => {
                let value = self.pop()?;
                self.stack.push(Value::Number(-value.to_number()));
            }
            Instruction::Not => {
                let value = self.pop()?;
                self.stack.push(Value::Bool(!value.is_truthy()));
            }
            Instruction::Add => return self.binary(add),
            Instruction::Sub => return self.binary(|a, b| arithmetic(a, b, |x, y| x - y)),
            Instruction::Mul => return self.binary(|a, b| arithmetic(a, b, |x, y| x * y)),
            Instruction::Div => return self.binary(|a, b| arithmetic(a, b, |x, y| x / y)),
            Instruction::Mod => return self.binary(|a, b| arithmetic(a, b, |x, y| x % y)),
            Instruction::Eq => return self.binary(|a, b| Value::Bool(a.loose_eq(b))),
            Instruction::Ne => return self.binary(|a, b| Value::Bool(!a.loose_eq(b))),
            Instruction::Lt => return self.binary(|a, b| compare(a, b, |o| o.is_lt())),
            Instruction::LtEq => return self.binary(|a, b| compare(a, b, |o| o.is_le())),
            Instruction::Gt => return self.binary(|a, b| compare(a, b, |o| o.is_gt())),
            Instruction::GtEq => return self.binary(|a, b| compare(a, b, |o| o.is_ge())),

            Instruction::Jump(target) => return Ok(Flow::Jump(target)),
            Instruction::JumpIfFalse(target) => {
                if !self.pop()?.is_truthy() {
                    return Ok(Flow::Jump(target));
                }
            }
            Instruction::JumpIfTrue(target) => {
                if self.pop()?.is_truthy() {
                    return Ok(Flow::Jump(target));
                }
            }

            Instruction::Call(argc) => {
                let split = self
                    .stack
                    .len()
                    .checked_sub(argc as usize)
                    .ok_or_else(|| RuntimeError::internal("operand stack underflow"))?;
                let call_args = self.stack.split_off(split);
                let callee = self.pop()?;
                let result = match callee {
                    Value::Function(func) => func.call(self.runtime, Value::Undefined, &call_args)?,
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "{} is not a function",
                            other.type_name()
                        )));
                    }
                };
                self.stack.push(result);
            }
            Instruction::Return => return Ok(Flow::Return(self.pop()?)),
            Instruction::SetCompletion => *completion = self.pop()?,
            Instruction::ReturnCompletion => {
                return Ok(Flow::Return(std::mem::take(completion)));
            }
        }
        Ok(Flow::Next)
    }
}

fn add(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::String(_), _) | (_, Value::String(_)) => Value::string(format!("{left}{right}")),
        _ => Value::Number(left.to_number() + right.to_number()),
    }
}

fn arithmetic(left: &Value, right: &Value, op: fn(f64, f64) -> f64) -> Value {
    Value::Number(op(left.to_number(), right.to_number()))
}

fn compare(left: &Value, right: &Value, test: fn(std::cmp::Ordering) -> bool) -> Value {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    };
    Value::Bool(ordering.is_some_and(test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::unit::EntryPoint;
    use raptorc_bytecode::{SourceMapBuilder, UnitSignature};
    use raptorc_config::RuntimeConfig;

    fn code(
        name: &str,
        params: &[&str],
        strict: bool,
        instructions: Vec<Instruction>,
        constants: Vec<Constant>,
    ) -> Code {
        Code {
            signature: UnitSignature {
                method_name: format!("function_{name}"),
                display_name: name.to_string(),
                params: params.iter().map(|p| (*p).to_string()).collect(),
                strict,
            },
            instructions,
            constants,
            source_map: None,
        }
    }

    fn name(n: &str) -> Constant {
        Constant::String(n.to_string())
    }

    #[test]
    fn test_arithmetic_and_completion() {
        let unit = CompiledUnit::new(
            EntryPoint::new(code(
                "",
                &[],
                false,
                vec![
                    Instruction::PushConst(0),
                    Instruction::PushConst(1),
                    Instruction::Mul,
                    Instruction::PushConst(2),
                    Instruction::Add,
                    Instruction::SetCompletion,
                    Instruction::ReturnCompletion,
                ],
                vec![
                    Constant::Number(6.0),
                    Constant::Number(7.0),
                    Constant::String("!".into()),
                ],
            )),
            vec![],
        );
        let runtime = Runtime::default();
        let scope = runtime.create_global_scope();
        let result = unit.invoke(&runtime, &scope, Value::Undefined, None).unwrap();
        assert_eq!(result, Value::from("42!"));
    }

    #[test]
    fn test_closure_call_binds_parameters() {
        // function id(x) { return x; }
        let inner = Arc::new(CompiledUnit::new(
            EntryPoint::new(code(
                "id",
                &["x"],
                false,
                vec![
                    Instruction::BindParameter { index: 0, name: 0 },
                    Instruction::LoadName(0),
                    Instruction::Return,
                ],
                vec![name("x")],
            )),
            vec![],
        ));
        // r = id(5) with id instantiated from dependency 0
        let outer = CompiledUnit::new(
            EntryPoint::new(code(
                "",
                &[],
                false,
                vec![
                    Instruction::MakeClosure(0),
                    Instruction::PushConst(1),
                    Instruction::Call(1),
                    Instruction::StoreName(0),
                    Instruction::Pop,
                    Instruction::ReturnCompletion,
                ],
                vec![name("r"), Constant::Number(5.0)],
            )),
            vec![inner],
        );
        let runtime = Runtime::default();
        let scope = runtime.create_global_scope();
        outer.invoke(&runtime, &scope, Value::Undefined, None).unwrap();
        assert_eq!(runtime.global("r"), Some(Value::Number(5.0)));
    }

    #[test]
    fn test_strict_store_to_undeclared_is_reference_error() {
        let unit = CompiledUnit::new(
            EntryPoint::new(code(
                "f",
                &[],
                true,
                vec![Instruction::PushNull, Instruction::StoreName(0)],
                vec![name("ghost")],
            )),
            vec![],
        );
        let runtime = Runtime::default();
        let scope = runtime.create_global_scope();
        let err = unit
            .invoke(&runtime, &scope, Value::Undefined, None)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReferenceError);
        assert_eq!(err.message, "ghost is not defined");
        assert_eq!(err.stack[0].name, "f");
        assert!(runtime.global("ghost").is_none());
    }

    #[test]
    fn test_error_frame_records_source_span() {
        let mut map = SourceMapBuilder::new(Some("main.js".into()));
        map.add(0, 4, 9);
        let mut body = code("", &[], false, vec![Instruction::LoadName(0)], vec![name("nope")]);
        body.source_map = Some(map.finish());
        let unit = CompiledUnit::new(EntryPoint::new(body), vec![]);

        let runtime = Runtime::default();
        let scope = runtime.create_global_scope();
        let err = unit
            .invoke(&runtime, &scope, Value::Undefined, None)
            .unwrap_err();
        assert_eq!(err.stack[0].span, Some((4, 9)));
        assert_eq!(err.stack[0].document.as_deref(), Some("main.js"));
    }

    #[test]
    fn test_call_depth_is_bounded() {
        // function f() { return f(); }
        let recursive = code(
            "f",
            &[],
            false,
            vec![
                Instruction::LoadName(0),
                Instruction::Call(0),
                Instruction::Return,
            ],
            vec![name("f")],
        );
        let f = Arc::new(CompiledUnit::new(EntryPoint::new(recursive), vec![]));
        let runtime = Runtime::new(RuntimeConfig { max_call_depth: 16 });
        let scope = runtime.create_global_scope();
        runtime.global_object().set(
            "f",
            Value::Function(Arc::new(FunctionObject::new(f, Arc::clone(&scope)))),
        );

        let caller = CompiledUnit::new(
            EntryPoint::new(code(
                "",
                &[],
                false,
                vec![Instruction::LoadName(0), Instruction::Call(0), Instruction::Return],
                vec![name("f")],
            )),
            vec![],
        );
        let err = caller
            .invoke(&runtime, &scope, Value::Undefined, None)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::RangeError);
        assert!(err.stack.len() >= 16);

        // The depth counter unwinds with the error.
        let ok = CompiledUnit::new(
            EntryPoint::new(code(
                "",
                &[],
                false,
                vec![Instruction::PushNull, Instruction::Return],
                vec![],
            )),
            vec![],
        );
        assert_eq!(ok.invoke(&runtime, &scope, Value::Undefined, None).unwrap(), Value::Null);
    }

    #[test]
    fn test_calling_non_function_is_type_error() {
        let unit = CompiledUnit::new(
            EntryPoint::new(code(
                "",
                &[],
                false,
                vec![Instruction::PushConst(0), Instruction::Call(0)],
                vec![Constant::Number(1.0)],
            )),
            vec![],
        );
        let runtime = Runtime::default();
        let scope = runtime.create_global_scope();
        let err = unit
            .invoke(&runtime, &scope, Value::Undefined, None)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert_eq!(err.message, "number is not a function");
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(compare(&Value::from("a"), &Value::from("b"), |o| o.is_lt()), Value::Bool(true));
        assert_eq!(
            compare(&Value::Number(f64::NAN), &Value::Number(1.0), |o| o.is_ge()),
            Value::Bool(false)
        );
        assert_eq!(add(&Value::Number(1.0), &Value::Bool(true)), Value::Number(2.0));
        assert_eq!(add(&Value::from("n="), &Value::Null), Value::from("n=null"));
    }
}
