//! Batch compilation of scripts into a persisted module, and restoring a
//! runtime from one without recompiling.

use std::path::Path;
use std::sync::Arc;

use ahash::AHashMap;
use raptorc_cache::UnitId;
use raptorc_codegen::{
    CompiledUnitCache, ExportedType, GenerationTarget, MethodGenerator, ModuleBuilder,
    PersistedModule, ScriptSource,
};
use raptorc_config::{EngineConfig, RuntimeConfig};
use raptorc_runtime::{CompiledUnit, EntryPoint, Runtime, Value};
use raptorc_utils::{Profiler, Stopwatch};
use tracing::{debug, info};

use crate::error::{LoadError, SaveError};

/// Queues top-level sources, saves them as one module, and loads modules
/// back into fresh runtimes.
pub struct ScriptCompiler {
    config: EngineConfig,
    cache: Arc<CompiledUnitCache>,
    sources: Vec<Arc<ScriptSource>>,
}

/// An export with both accessors present, waiting for its dependencies.
struct Candidate<'m> {
    export: &'m ExportedType,
    id: UnitId,
    dependency_ids: &'m [UnitId],
}

impl ScriptCompiler {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let cache = Arc::new(CompiledUnitCache::with_config(&config.cache));
        Self {
            config,
            cache,
            sources: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CompiledUnitCache> {
        &self.cache
    }

    pub fn sources(&self) -> &[Arc<ScriptSource>] {
        &self.sources
    }

    /// Queue script text with no document name.
    pub fn include_input(&mut self, code: impl Into<String>) {
        self.include_source(ScriptSource::from_string(code));
    }

    pub fn include_source(&mut self, source: ScriptSource) {
        self.sources.push(Arc::new(source));
    }

    /// Compile every queued source, in order, into one module and write it
    /// to `path`. Nothing is written unless every source compiles.
    pub fn save(&self, path: &Path) -> Result<(), SaveError> {
        let mut clock = Stopwatch::start_new();
        let module = self.compile_module(&module_name(path))?;
        let compile_time = clock.lap();
        module.write_to(path)?;
        info!(
            path = %path.display(),
            units = module.types.len(),
            scripts = self.sources.len(),
            compile_ms = compile_time.as_secs_f64() * 1000.0,
            write_ms = clock.elapsed_ms(),
            "saved module"
        );
        Ok(())
    }

    /// Compile the queued sources into an in-memory module.
    pub fn compile_module(&self, name: &str) -> Result<PersistedModule, SaveError> {
        if self.sources.is_empty() {
            return Err(SaveError::NoSources);
        }

        let mut builder = ModuleBuilder::new(name);
        // Units must stay alive until every dependent has been registered.
        let mut units = Vec::with_capacity(self.sources.len());
        {
            let mut target = GenerationTarget::Persistable(&mut builder);
            for source in &self.sources {
                let mut generator =
                    MethodGenerator::for_script(Arc::clone(source), &self.config.compiler);
                let unit = generator
                    .generate(&self.cache, &mut target)
                    .map_err(|source_err| SaveError::Compile {
                        document: source.name(),
                        source: source_err,
                    })?;
                units.push(unit);
            }
        }
        builder.define_restore_routine();
        debug!(module = name, types = builder.type_count(), "compiled module");
        Ok(builder.finish())
    }

    pub fn load(&self, path: &Path) -> Result<Runtime, LoadError> {
        let module = PersistedModule::read_from(path)?;
        self.load_module(&module)
    }

    /// Rebuild a runtime from `module` using this compiler's cache.
    pub fn load_module(&self, module: &PersistedModule) -> Result<Runtime, LoadError> {
        load_module_with_cache(module, &self.cache, &self.config.runtime)
    }

    /// Rebuild a runtime by running the module's restore routine.
    pub fn restore(&self, module: &PersistedModule) -> Result<Runtime, LoadError> {
        let routine = module.restore.as_ref().ok_or(LoadError::MissingRestore)?;
        let initializers = routine
            .initializers
            .iter()
            .map(|name| {
                module
                    .find_type(name)
                    .filter(|export| export.is_initializer())
                    .ok_or_else(|| LoadError::UnknownInitializer { name: name.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        load_with_initializers(module, &self.cache, &self.config.runtime, &initializers)
    }
}

impl Default for ScriptCompiler {
    fn default() -> Self {
        Self::new()
    }
}

fn module_name(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "script".to_string(), |stem| stem.to_string_lossy().into_owned())
}

/// Rebuild a runtime from `module`, repopulating `cache` with the module's
/// declared ids, then run every initializer in module order.
pub fn load_module_with_cache(
    module: &PersistedModule,
    cache: &CompiledUnitCache,
    config: &RuntimeConfig,
) -> Result<Runtime, LoadError> {
    let initializers: Vec<&ExportedType> = module.initializers().collect();
    load_with_initializers(module, cache, config, &initializers)
}

fn load_with_initializers(
    module: &PersistedModule,
    cache: &CompiledUnitCache,
    config: &RuntimeConfig,
    initializers: &[&ExportedType],
) -> Result<Runtime, LoadError> {
    let mut profiler = Profiler::new();

    let candidates = profiler.record_phase("enumerate", || collect_candidates(module))?;
    cache.reset();
    let units = profiler.record_phase("resolve", || resolve(candidates, cache))?;
    let runtime = profiler.record_phase("initialize", || {
        run_initializers(initializers, &units, config)
    })?;

    for phase in profiler.phases() {
        debug!(
            phase = %phase.name,
            elapsed_ms = phase.duration.as_secs_f64() * 1000.0,
            "load phase"
        );
    }
    info!(
        module = %module.name,
        units = units.len(),
        initializers = initializers.len(),
        elapsed_ms = profiler.total().as_secs_f64() * 1000.0,
        "loaded module"
    );
    Ok(runtime)
}

fn collect_candidates(module: &PersistedModule) -> Result<Vec<Candidate<'_>>, LoadError> {
    module
        .types
        .iter()
        .map(|export| match (export.function_id, export.dependency_ids.as_deref()) {
            (Some(id), Some(dependency_ids)) => Ok(Candidate {
                export,
                id,
                dependency_ids,
            }),
            _ => Err(LoadError::MissingAccessor {
                export: export.name.clone(),
            }),
        })
        .collect()
}

/// Register candidates in dependency order under their declared ids.
///
/// Each pass admits the first candidate whose dependencies are all live in
/// the cache and then starts over. A pass that admits nothing means the
/// rest depend on missing or cyclic units.
fn resolve(
    mut unresolved: Vec<Candidate<'_>>,
    cache: &CompiledUnitCache,
) -> Result<AHashMap<UnitId, Arc<CompiledUnit>>, LoadError> {
    let mut units = AHashMap::with_capacity(unresolved.len());
    let mut passes = 0usize;

    while !unresolved.is_empty() {
        passes += 1;
        let ready = unresolved.iter().enumerate().find_map(|(position, candidate)| {
            candidate
                .dependency_ids
                .iter()
                .map(|id| cache.try_lookup(*id))
                .collect::<Option<Vec<_>>>()
                .map(|dependencies| (position, dependencies))
        });
        let Some((position, dependencies)) = ready else {
            let ids = unresolved.iter().map(|candidate| candidate.id).collect();
            return Err(LoadError::Unresolvable { ids });
        };

        let candidate = unresolved.remove(position);
        let unit = Arc::new(CompiledUnit::new(
            EntryPoint::new(candidate.export.entry.clone()),
            dependencies,
        ));
        cache.register_with_id(candidate.id, &unit, unit.dependencies())?;
        if units.insert(candidate.id, unit).is_some() {
            return Err(LoadError::IdCollision { id: candidate.id });
        }
    }

    debug!(passes, units = units.len(), "resolved module units");
    Ok(units)
}

fn run_initializers(
    initializers: &[&ExportedType],
    units: &AHashMap<UnitId, Arc<CompiledUnit>>,
    config: &RuntimeConfig,
) -> Result<Runtime, LoadError> {
    let runtime = Runtime::new(config.clone());
    let scope = runtime.create_global_scope();
    for export in initializers {
        let unit = export
            .function_id
            .and_then(|id| units.get(&id))
            .ok_or_else(|| LoadError::MissingAccessor {
                export: export.name.clone(),
            })?;
        unit.invoke(&runtime, &scope, Value::Undefined, None)
            .map_err(LoadError::Initializer)?;
        debug!(initializer = %export.name, "ran initializer");
    }
    Ok(runtime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use raptorc_bytecode::{Code, Instruction, UnitSignature};
    use raptorc_codegen::GLOBAL_METHOD_NAME;
    use raptorc_config::CacheConfig;

    fn export(name: &str, method: &str, id: UnitId, deps: &[UnitId]) -> ExportedType {
        ExportedType {
            name: name.to_string(),
            entry: Code {
                signature: UnitSignature {
                    method_name: method.to_string(),
                    display_name: String::new(),
                    params: vec![],
                    strict: false,
                },
                instructions: vec![Instruction::ReturnCompletion],
                constants: vec![],
                source_map: None,
            },
            function_id: Some(id),
            dependency_ids: Some(deps.to_vec()),
        }
    }

    fn module(types: Vec<ExportedType>) -> PersistedModule {
        let mut builder = ModuleBuilder::new("test");
        builder.define_restore_routine();
        let mut module = builder.finish();
        module.types = types;
        module
    }

    fn load(module: &PersistedModule) -> Result<Runtime, LoadError> {
        load_module_with_cache(module, &CompiledUnitCache::new(), &RuntimeConfig::default())
    }

    #[test]
    fn test_resolves_out_of_order_exports() {
        let module = module(vec![
            export("ScriptUnit0", GLOBAL_METHOD_NAME, 2, &[1]),
            export("ScriptUnit1", "function_b", 1, &[0]),
            export("ScriptUnit2", "function_a", 0, &[]),
        ]);
        let cache = CompiledUnitCache::new();
        load_module_with_cache(&module, &cache, &RuntimeConfig::default()).unwrap();
        // Units are owned by the runtime only through closures; none were made.
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.next_id(), 3);
    }

    #[test]
    fn test_compaction_during_resolution_keeps_pending_units() {
        let mut compiler = ScriptCompiler::new();
        compiler.include_input(
            r#"
            function a() { return 1; }
            function b() { return a() + 1; }
            function c() { return b() + 1; }
            function make() { return function() { return c() + 1; }; }
            var d = make();
            var r = d();
            "#,
        );
        let module = compiler.compile_module("compact").unwrap();
        assert_eq!(module.types.len(), 6);

        // A sweep runs after every second registration while loading.
        let cache = CompiledUnitCache::with_config(&CacheConfig::new(2));
        let runtime = load_module_with_cache(&module, &cache, &RuntimeConfig::default()).unwrap();
        let stats = cache.stats();
        assert_eq!(stats.compactions, 3);
        assert_eq!(stats.evicted, 0);

        assert_eq!(runtime.global("r"), Some(Value::Number(4.0)));
        assert!((0..5).all(|id| cache.contains(id)));
        assert!(!cache.contains(5));
        assert_eq!(cache.dependency_ids(4).unwrap(), vec![3]);
        assert_eq!(cache.compact(), 1);
    }

    #[test]
    fn test_cycle_is_unresolvable() {
        let module = module(vec![
            export("ScriptUnit0", "function_x", 0, &[1]),
            export("ScriptUnit1", "function_y", 1, &[0]),
            export("ScriptUnit2", GLOBAL_METHOD_NAME, 2, &[]),
        ]);
        let err = load(&module).unwrap_err();
        match err {
            LoadError::Unresolvable { ids } => assert_eq!(ids, vec![0, 1]),
            other => panic!("expected unresolvable module, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_declared_id_collides() {
        let module = module(vec![
            export("ScriptUnit0", "function_x", 0, &[]),
            export("ScriptUnit1", "function_y", 0, &[]),
        ]);
        let err = load(&module).unwrap_err();
        assert!(matches!(err, LoadError::IdCollision { id: 0 }));
    }

    #[test]
    fn test_missing_accessor_is_reported() {
        let mut broken = export("ScriptUnit0", GLOBAL_METHOD_NAME, 0, &[]);
        broken.dependency_ids = None;
        let err = load(&module(vec![broken])).unwrap_err();
        assert!(matches!(err, LoadError::MissingAccessor { export } if export == "ScriptUnit0"));
    }

    #[test]
    fn test_restore_requires_routine() {
        let mut module = module(vec![export("ScriptUnit0", GLOBAL_METHOD_NAME, 0, &[])]);
        module.restore = None;
        let compiler = ScriptCompiler::new();
        assert!(matches!(compiler.restore(&module), Err(LoadError::MissingRestore)));
        assert!(compiler.load_module(&module).is_ok());
    }

    #[test]
    fn test_save_without_sources_fails() {
        let compiler = ScriptCompiler::new();
        assert!(matches!(compiler.compile_module("empty"), Err(SaveError::NoSources)));
    }

    #[test]
    fn test_module_name_from_path() {
        assert_eq!(module_name(Path::new("out/app.rmod")), "app");
        assert_eq!(module_name(Path::new("")), "script");
    }
}
