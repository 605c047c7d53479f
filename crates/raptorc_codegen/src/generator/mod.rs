//! Method generation.
//!
//! A [`MethodGenerator`] compiles one script or function body into a
//! [`CompiledUnit`] and registers it in the unit cache. Nested functions are
//! generated by child generators while the parent body is emitted, so they
//! are registered before the unit that depends on them.

mod expr;
mod stmt;

use std::sync::Arc;

use raptorc_ast::{Function, Node, Program, Statement};
use raptorc_bytecode::{Code, CodeBuffer, Constant, Emitter, LoggingEmitter, UnitSignature};
use raptorc_config::{CompilerOptions, GenerationMode};
use raptorc_runtime::{CompiledUnit, EntryPoint};
use tracing::debug;

use crate::CompiledUnitCache;
use crate::error::CodegenError;
use crate::hints::OptimizationHints;
use crate::module::{GLOBAL_METHOD_NAME, ModuleBuilder};
use crate::source::ScriptSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    /// A top-level script body.
    Global,
    Function,
}

/// Where generated code goes. Chosen once per compilation and shared by
/// every nested generator.
pub enum GenerationTarget<'m> {
    Fast,
    Persistable(&'m mut ModuleBuilder),
}

impl<'m> GenerationTarget<'m> {
    /// Target for `mode`. Persistable generation needs a module to define
    /// unit types in.
    pub fn new(
        mode: GenerationMode,
        module: Option<&'m mut ModuleBuilder>,
    ) -> Result<Self, CodegenError> {
        match (mode, module) {
            (GenerationMode::Fast, _) => Ok(GenerationTarget::Fast),
            (GenerationMode::Persistable, Some(module)) => {
                Ok(GenerationTarget::Persistable(module))
            }
            (GenerationMode::Persistable, None) => Err(CodegenError::MissingModule),
        }
    }

    pub fn mode(&self) -> GenerationMode {
        match self {
            GenerationTarget::Fast => GenerationMode::Fast,
            GenerationTarget::Persistable(_) => GenerationMode::Persistable,
        }
    }
}

enum Body {
    Pending,
    Script(Program),
    Function(Node<Function>),
}

/// Compiles one function or script body into a registered compiled unit.
pub struct MethodGenerator<'a> {
    source: Arc<ScriptSource>,
    options: &'a CompilerOptions,
    body: Body,
    inherited_strict: bool,
}

impl<'a> MethodGenerator<'a> {
    /// Generator for a script body; the source is parsed on first use.
    pub fn for_script(source: Arc<ScriptSource>, options: &'a CompilerOptions) -> Self {
        Self {
            source,
            options,
            body: Body::Pending,
            inherited_strict: false,
        }
    }

    /// Generator for an already parsed script body.
    pub fn for_program(
        source: Arc<ScriptSource>,
        options: &'a CompilerOptions,
        program: Program,
    ) -> Self {
        Self {
            source,
            options,
            body: Body::Script(program),
            inherited_strict: false,
        }
    }

    pub(crate) fn for_function(
        source: Arc<ScriptSource>,
        options: &'a CompilerOptions,
        function: Node<Function>,
        inherited_strict: bool,
    ) -> Self {
        Self {
            source,
            options,
            body: Body::Function(function),
            inherited_strict,
        }
    }

    pub fn kind(&self) -> GeneratorKind {
        match self.body {
            Body::Function(_) => GeneratorKind::Function,
            Body::Pending | Body::Script(_) => GeneratorKind::Global,
        }
    }

    pub fn method_name(&self) -> String {
        match &self.body {
            Body::Function(func) => format!("function_{}", func.as_ref().display_name()),
            Body::Pending | Body::Script(_) => GLOBAL_METHOD_NAME.to_string(),
        }
    }

    /// Name shown in stack traces; `None` for script bodies.
    pub fn stack_name(&self) -> Option<String> {
        match &self.body {
            Body::Function(func) => Some(func.as_ref().display_name().to_string()),
            Body::Pending | Body::Script(_) => None,
        }
    }

    pub fn source(&self) -> &Arc<ScriptSource> {
        &self.source
    }

    /// Parse the source into a syntax tree unless one is attached already.
    pub fn parse(&mut self) -> Result<(), CodegenError> {
        if matches!(self.body, Body::Pending) {
            let program = raptorc_parser::parse(self.source.code()).map_err(|errors| {
                CodegenError::Parse {
                    document: self.source.name(),
                    errors,
                }
            })?;
            self.body = Body::Script(program);
        }
        Ok(())
    }

    fn strict(&self) -> bool {
        let own = match &self.body {
            Body::Script(program) => program.strict,
            Body::Function(func) => func.as_ref().strict,
            Body::Pending => false,
        };
        self.options.force_strict_mode || self.inherited_strict || own
    }

    /// Generate, register and (when persisting) export the unit.
    ///
    /// Unit types defined by nested generators are only kept once the whole
    /// body has been generated; on error the module is rolled back.
    pub fn generate(
        &mut self,
        cache: &CompiledUnitCache,
        target: &mut GenerationTarget<'_>,
    ) -> Result<Arc<CompiledUnit>, CodegenError> {
        let checkpoint = match target {
            GenerationTarget::Persistable(module) => Some(module.type_count()),
            GenerationTarget::Fast => None,
        };
        let result = self.generate_unit(cache, target);
        if let (Err(_), Some(type_count), GenerationTarget::Persistable(module)) =
            (&result, checkpoint, target)
        {
            module.truncate(type_count);
        }
        result
    }

    fn generate_unit(
        &mut self,
        cache: &CompiledUnitCache,
        target: &mut GenerationTarget<'_>,
    ) -> Result<Arc<CompiledUnit>, CodegenError> {
        self.parse()?;

        let (statements, params, span_start) = match &self.body {
            Body::Script(program) => (program.statements.as_slice(), &[] as &[String], 0),
            Body::Function(func) => (
                func.as_ref().body.as_slice(),
                func.as_ref().params.as_slice(),
                func.span().start,
            ),
            Body::Pending => {
                return Err(CodegenError::Malformed("body was not parsed".to_string()));
            }
        };

        let hints = OptimizationHints::analyze(statements);
        let strict = self.strict();
        let signature = UnitSignature {
            method_name: self.method_name(),
            display_name: self.stack_name().unwrap_or_default(),
            params: params.to_vec(),
            strict,
        };

        let mut buffer = CodeBuffer::new(signature);
        if target.mode() == GenerationMode::Persistable && self.options.enable_debugging {
            buffer = buffer.with_source_map(Some(self.source.name()));
        }

        let body = BodyPlan {
            statements,
            params,
            span_start,
            hints,
            strict,
        };
        let (code, disassembly, nested) = if self.options.enable_disassembly {
            self.emit_with(LoggingEmitter::new(buffer), &body, cache, target)?
        } else {
            self.emit_with(buffer, &body, cache, target)?
        };

        let code = Arc::new(code);
        let unit = Arc::new(CompiledUnit::new(
            EntryPoint::from_shared(Arc::clone(&code)),
            nested,
        ));
        if let Some(text) = disassembly {
            unit.set_disassembly(text);
        }

        let id = cache.register(&unit, unit.dependencies())?;
        if let GenerationTarget::Persistable(module) = target {
            let dependency_ids = cache.dependency_ids(id)?;
            let type_name = module.define_unit_type(&code, id, dependency_ids);
            debug!(type_name = %type_name, id, "defined unit type");
        }

        debug!(
            method = %code.signature.method_name,
            id,
            mode = target.mode().name(),
            instructions = code.len(),
            dependencies = unit.dependencies().len(),
            "generated unit"
        );
        Ok(unit)
    }

    fn emit_with<E: Emitter>(
        &self,
        emitter: E,
        body: &BodyPlan<'_>,
        cache: &CompiledUnitCache,
        target: &mut GenerationTarget<'_>,
    ) -> Result<(Code, Option<String>, Vec<Arc<CompiledUnit>>), CodegenError> {
        let mut ctx = GenerationContext {
            emitter,
            kind: self.kind(),
            strict: body.strict,
            hints: &body.hints,
            function_name: self.stack_name(),
            source: &self.source,
            options: self.options,
            cache,
            target,
            nested: Vec::new(),
        };

        // Initialization code maps to the start of the body.
        ctx.emitter.mark_sequence_point(body.span_start, body.span_start);
        ctx.emit_prologue(body.params)?;
        for stmt in body.statements {
            ctx.emit_statement(stmt)?;
        }
        ctx.emit_epilogue();

        let GenerationContext {
            mut emitter,
            nested,
            function_name,
            ..
        } = ctx;
        let disassembly = emitter.take_disassembly().map(|log| match function_name {
            Some(name) => format!("function {name}\n{log}"),
            None => format!("global code\n{log}"),
        });
        let code = emitter.complete()?;
        Ok((code, disassembly, nested))
    }
}

struct BodyPlan<'b> {
    statements: &'b [Node<Statement>],
    params: &'b [String],
    span_start: usize,
    hints: OptimizationHints,
    strict: bool,
}

/// State shared by the per-node emitters while one body is generated.
pub(crate) struct GenerationContext<'g, 'm, E> {
    pub(crate) emitter: E,
    pub(crate) kind: GeneratorKind,
    pub(crate) strict: bool,
    pub(crate) hints: &'g OptimizationHints,
    pub(crate) function_name: Option<String>,
    pub(crate) source: &'g Arc<ScriptSource>,
    pub(crate) options: &'g CompilerOptions,
    pub(crate) cache: &'g CompiledUnitCache,
    pub(crate) target: &'g mut GenerationTarget<'m>,
    /// Units of nested functions, indexed by `MakeClosure`.
    pub(crate) nested: Vec<Arc<CompiledUnit>>,
}

impl<E: Emitter> GenerationContext<'_, '_, E> {
    pub(crate) fn name_constant(&mut self, name: &str) -> u32 {
        self.emitter.add_constant(Constant::String(name.to_string()))
    }

    /// Generate a nested function with a child generator and return its
    /// dependency index.
    pub(crate) fn compile_nested(
        &mut self,
        function: &Node<Function>,
    ) -> Result<u32, CodegenError> {
        let mut child = MethodGenerator::for_function(
            Arc::clone(self.source),
            self.options,
            function.clone(),
            self.strict,
        );
        let unit = child.generate(self.cache, self.target)?;
        self.nested.push(unit);
        Ok((self.nested.len() - 1) as u32)
    }
}
