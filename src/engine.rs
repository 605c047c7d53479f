//! In-process script execution.

use std::collections::BTreeMap;
use std::sync::Arc;

use raptorc_codegen::{
    CompiledUnitCache, GenerationTarget, MethodGenerator, ModuleBuilder, PersistedModule,
    ScriptSource,
};
use raptorc_config::{EngineConfig, GenerationMode};
use raptorc_runtime::{CompiledUnit, Runtime, Scope, Value};
use tracing::debug;

use crate::error::EngineError;

/// Compiles scripts and runs them against one runtime and global scope.
///
/// With debugging enabled the engine compiles in persistable mode and keeps
/// every generated unit type in an in-memory module.
pub struct ScriptEngine {
    config: EngineConfig,
    cache: Arc<CompiledUnitCache>,
    runtime: Runtime,
    scope: Arc<Scope>,
    module: Option<ModuleBuilder>,
}

impl ScriptEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let cache = Arc::new(CompiledUnitCache::with_config(&config.cache));
        Self::with_cache(config, cache)
    }

    /// Engine registering its units in a cache shared with other engines.
    pub fn with_cache(config: EngineConfig, cache: Arc<CompiledUnitCache>) -> Self {
        let runtime = Runtime::new(config.runtime.clone());
        let scope = runtime.create_global_scope();
        let module = match config.compiler.generation_mode(false) {
            GenerationMode::Persistable => Some(ModuleBuilder::new("engine")),
            GenerationMode::Fast => None,
        };
        Self {
            config,
            cache,
            runtime,
            scope,
            module,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CompiledUnitCache> {
        &self.cache
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Compile `source` into a registered unit without running it.
    pub fn compile(&mut self, source: ScriptSource) -> Result<Arc<CompiledUnit>, EngineError> {
        let mode = self.config.compiler.generation_mode(false);
        let mut target = GenerationTarget::new(mode, self.module.as_mut())?;
        let mut generator = MethodGenerator::for_script(Arc::new(source), &self.config.compiler);
        Ok(generator.generate(&self.cache, &mut target)?)
    }

    /// Run a compiled script body in the engine's global scope and return
    /// its completion value.
    pub fn run(&self, unit: &CompiledUnit) -> Result<Value, EngineError> {
        Ok(unit.invoke(&self.runtime, &self.scope, Value::Undefined, None)?)
    }

    pub fn execute_source(&mut self, source: ScriptSource) -> Result<Value, EngineError> {
        let document = source.name();
        let unit = self.compile(source)?;
        let value = self.run(&unit)?;
        debug!(document = %document, result = %value.render(), "executed script");
        Ok(value)
    }

    pub fn execute(&mut self, code: &str) -> Result<(), EngineError> {
        self.execute_source(ScriptSource::from_string(code))?;
        Ok(())
    }

    pub fn evaluate(&mut self, code: &str) -> Result<Value, EngineError> {
        self.execute_source(ScriptSource::from_string(code))
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.runtime.global(name)
    }

    pub fn global_snapshot(&self) -> BTreeMap<String, String> {
        self.runtime.global_snapshot()
    }

    /// Close the in-memory module, if the engine keeps one. Later scripts
    /// are collected into a fresh module of the same name.
    pub fn finish_module(&mut self) -> Option<PersistedModule> {
        let current = self.module.as_mut()?;
        let fresh = ModuleBuilder::new(current.name());
        let mut module = std::mem::replace(current, fresh);
        module.define_restore_routine();
        debug!(module = module.name(), types = module.type_count(), "finished engine module");
        Some(module.finish())
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raptorc_config::CompilerOptions;
    use raptorc_runtime::ErrorKind;

    #[test]
    fn test_globals_persist_between_scripts() {
        let mut engine = ScriptEngine::new();
        engine
            .execute("var count = 1; function bump() { count = count + 1; return count; }")
            .unwrap();
        assert_eq!(engine.evaluate("bump(); bump();").unwrap(), Value::Number(3.0));
        assert_eq!(engine.global("count"), Some(Value::Number(3.0)));
    }

    #[test]
    fn test_runtime_error_is_reported() {
        let mut engine = ScriptEngine::new();
        match engine.evaluate("missing();") {
            Err(EngineError::Runtime(err)) => assert_eq!(err.kind, ErrorKind::ReferenceError),
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    #[test]
    fn test_fast_mode_keeps_no_module() {
        let mut engine = ScriptEngine::new();
        engine.execute("var a = 1;").unwrap();
        assert!(engine.finish_module().is_none());
    }

    #[test]
    fn test_debugging_collects_unit_types() {
        let mut engine = debugging_engine();
        engine.execute("function f() { return 1; } var x = f();").unwrap();
        let module = engine.finish_module().unwrap();
        assert_eq!(module.types.len(), 2);
        assert_eq!(module.restore.unwrap().initializers, vec!["ScriptUnit1"]);
    }

    fn debugging_engine() -> ScriptEngine {
        let config = EngineConfig {
            compiler: CompilerOptions {
                enable_debugging: true,
                ..CompilerOptions::default()
            },
            ..EngineConfig::default()
        };
        ScriptEngine::with_config(config)
    }

    #[test]
    fn test_failed_compile_leaves_module_unchanged() {
        let mut engine = debugging_engine();
        engine.execute("var a = 1;").unwrap();
        // The nested function is generated before the top-level return fails.
        assert!(matches!(
            engine.execute("function f() { return 1; } return 2;"),
            Err(EngineError::Compile(_))
        ));
        engine.execute("function g() { return 2; } var b = g();").unwrap();

        let module = engine.finish_module().unwrap();
        let names: Vec<(&str, &str)> = module
            .types
            .iter()
            .map(|ty| (ty.name.as_str(), ty.entry.signature.method_name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("ScriptUnit0", "global_"),
                ("ScriptUnit1", "function_g"),
                ("ScriptUnit2", "global_"),
            ]
        );
        assert_eq!(
            module.restore.unwrap().initializers,
            vec!["ScriptUnit0", "ScriptUnit2"]
        );
    }

    #[test]
    fn test_execute_after_finish_module() {
        let mut engine = debugging_engine();
        engine.execute("var a = 1;").unwrap();
        assert_eq!(engine.finish_module().unwrap().types.len(), 1);

        engine.execute("var b = a + 1;").unwrap();
        assert_eq!(engine.global("b"), Some(Value::Number(2.0)));
        let next = engine.finish_module().unwrap();
        assert_eq!(next.name, "engine");
        assert_eq!(next.types.len(), 1);
        assert_eq!(next.types[0].name, "ScriptUnit0");
    }

    #[test]
    fn test_engines_share_a_cache() {
        let cache = Arc::new(CompiledUnitCache::new());
        let mut first = ScriptEngine::with_cache(EngineConfig::default(), Arc::clone(&cache));
        let mut second = ScriptEngine::with_cache(EngineConfig::default(), Arc::clone(&cache));
        first.execute("var a = 1;").unwrap();
        second.execute("var b = 2;").unwrap();
        assert_eq!(cache.next_id(), 2);
        assert!(second.global("a").is_none());
    }
}
