use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use raptor::{
    EngineConfig, EngineError, PersistedModule, SaveError, ScriptCompiler, ScriptEngine,
    ScriptSource,
};
use raptorc_ast::LineIndex;
use raptorc_codegen::CodegenError;
use raptorc_runtime::{CompiledUnit, RuntimeError};
use raptorc_utils::logger::init_logging;
use tracing::debug;

/// Raptor - compile, run, save and restore scripts
#[derive(Parser, Debug)]
#[command(name = "raptor", version)]
struct Cli {
    /// Engine configuration file (requires the toml-config feature)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute scripts in one runtime and print the last completion value
    Run {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Compile in persistable mode with source maps
        #[arg(long)]
        debug: bool,

        /// Print the disassembly of every generated unit
        #[arg(long)]
        disassemble: bool,
    },
    /// Compile scripts into a persisted module
    Save {
        #[arg(short, long)]
        output: PathBuf,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Restore a runtime from a persisted module
    Load {
        module: PathBuf,

        /// Print the restored global variables
        #[arg(long)]
        globals: bool,
    },
    /// List the units exported by a persisted module
    Inspect {
        module: PathBuf,

        /// Also print each unit's instructions
        #[arg(long)]
        code: bool,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            files,
            debug,
            disassemble,
        } => run(config.with_debugging(debug).with_disassembly(disassemble), &files),
        Command::Save { output, files } => save(config, &output, &files),
        Command::Load { module, globals } => load(config, &module, globals),
        Command::Inspect { module, code } => inspect(&module, code),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => Ok(EngineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?
            .merge_with_env()),
        None => Ok(EngineConfig::from_env()),
    }
}

fn read_source(path: &Path) -> Result<ScriptSource> {
    ScriptSource::from_file(path).with_context(|| format!("failed to read {}", path.display()))
}

fn run(config: EngineConfig, files: &[PathBuf]) -> Result<()> {
    let disassemble = config.compiler.enable_disassembly;
    let mut engine = ScriptEngine::with_config(config);
    let mut last = None;

    for path in files {
        let source = read_source(path)?;
        let code = source.code().to_string();
        let unit = match engine.compile(source) {
            Ok(unit) => unit,
            Err(EngineError::Compile(err)) => return Err(report_compile_error(err, path, &code)),
            Err(err) => return Err(err.into()),
        };
        if disassemble {
            print_disassembly(&unit);
        }
        let value = engine
            .run(&unit)
            .map_err(|err| match err {
                EngineError::Runtime(err) => report_runtime_error(&err, path, &code),
                other => anyhow::Error::new(other),
            })
            .with_context(|| format!("error while running {}", path.display()))?;
        last = Some(value);
    }

    if let Some(value) = last {
        println!("{}", value.render());
    }
    debug!(stats = ?engine.cache().stats(), "cache statistics");
    Ok(())
}

fn save(config: EngineConfig, output: &Path, files: &[PathBuf]) -> Result<()> {
    let mut compiler = ScriptCompiler::with_config(config);
    let mut texts = Vec::with_capacity(files.len());
    for path in files {
        let source = read_source(path)?;
        texts.push((path.clone(), source.code().to_string()));
        compiler.include_source(source);
    }

    match compiler.save(output) {
        Ok(()) => {
            println!("saved {} script(s) to {}", files.len(), output.display());
            Ok(())
        }
        Err(SaveError::Compile { document, source }) => {
            let text = texts
                .iter()
                .find(|(path, _)| path.display().to_string() == document)
                .map(|(_, text)| text.as_str())
                .unwrap_or_default();
            Err(report_compile_error(source, Path::new(&document), text))
        }
        Err(err) => Err(err).with_context(|| format!("failed to save {}", output.display())),
    }
}

fn load(config: EngineConfig, module: &Path, globals: bool) -> Result<()> {
    let compiler = ScriptCompiler::with_config(config);
    let runtime = compiler
        .load(module)
        .with_context(|| format!("failed to load {}", module.display()))?;

    if globals {
        for (name, value) in runtime.global_snapshot() {
            println!("{name} = {value}");
        }
    } else {
        println!("restored {} global(s)", runtime.global_object().len());
    }
    Ok(())
}

fn inspect(path: &Path, code: bool) -> Result<()> {
    let module = PersistedModule::read_from(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    println!("module {} ({} units)", module.name, module.types.len());

    for export in &module.types {
        let id = export
            .function_id
            .map_or_else(|| "?".to_string(), |id| id.to_string());
        let deps = export
            .dependency_ids
            .as_ref()
            .map_or_else(|| "?".to_string(), |ids| format!("{ids:?}"));
        let marker = if export.is_initializer() { " [initializer]" } else { "" };
        println!(
            "  {:<14} id={id:<4} deps={deps:<12} {}{marker}",
            export.name, export.entry.signature.method_name
        );
        if code {
            print!("{}", export.entry.disassemble());
        }
    }

    match &module.restore {
        Some(routine) => println!("restore {}: {}", routine.name, routine.initializers.join(", ")),
        None => bail!("module {} has no restore routine", path.display()),
    }
    Ok(())
}

/// Render parse diagnostics against the script text; other compile errors
/// are returned as they are.
fn report_compile_error(err: CodegenError, path: &Path, text: &str) -> anyhow::Error {
    match err {
        CodegenError::Parse { document, errors } => {
            for error in &errors {
                eprint!("{}", error.report(&document, text));
            }
            anyhow::anyhow!("failed to parse {}", path.display())
        }
        other => anyhow::Error::new(other).context(format!("failed to compile {}", path.display())),
    }
}

/// Stack trace with frame positions from `path` shown as line and column.
fn report_runtime_error(err: &RuntimeError, path: &Path, text: &str) -> anyhow::Error {
    let document = path.display().to_string();
    let index = LineIndex::new(text);
    let frames: Vec<String> = err
        .stack
        .iter()
        .map(|frame| match frame.span {
            Some((start, _)) if frame.document.as_deref() == Some(document.as_str()) => {
                let (line, column) = index.line_col(start as usize);
                let name = if frame.name.is_empty() {
                    "<global>"
                } else {
                    frame.name.as_str()
                };
                format!("    at {name} ({document}:{line}:{column})")
            }
            _ => format!("    {frame}"),
        })
        .collect();

    if frames.is_empty() {
        anyhow::anyhow!("{err}")
    } else {
        anyhow::anyhow!("{err}\n{}", frames.join("\n"))
    }
}

fn print_disassembly(unit: &Arc<CompiledUnit>) {
    for dependency in unit.dependencies() {
        print_disassembly(dependency);
    }
    if let Some(listing) = unit.disassembly() {
        println!("{listing}");
    }
}
