//! wasm-lua CLI entry point.
//!
//! Runs Lua scripts with the `wasm` module preloaded, or inspects a
//! WebAssembly module's imports and exports.

use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use mlua::{Lua, Table};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use wasm_lua_common::{ConfigFile, LoggingConfig, RuntimeConfig};
use wasm_lua_core::{WasmEngine, wat_to_binary};

#[derive(Debug, Parser)]
#[command(name = "wasm-lua", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "WASM_LUA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a Lua script with `wasm` preloaded
    Run {
        /// Lua script to execute
        script: PathBuf,

        /// Arguments exposed to the script as `arg[1..]`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Print the imports and exports of a `.wasm` or `.wat` file
    Inspect {
        /// Module to inspect
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigFile::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ConfigFile::default(),
    };

    init_tracing(&config.logging);

    match cli.command {
        Command::Run { script, args } => run_script(&config.runtime, &script, &args),
        Command::Inspect { file } => inspect(&config.runtime, &file),
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    // Logs go to stderr so script output stays clean
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run_script(config: &RuntimeConfig, script: &Path, args: &[String]) -> anyhow::Result<()> {
    let source = std::fs::read(script)
        .with_context(|| format!("Failed to read script {}", script.display()))?;

    let lua = Lua::new();
    wasm_lua_host::preload(&lua, config).map_err(|e| anyhow!("Failed to load wasm module: {e}"))?;
    set_arg_table(&lua, script, args).map_err(|e| anyhow!("Failed to set `arg`: {e}"))?;

    info!(script = %script.display(), args = args.len(), "Running script");

    lua.load(source)
        .set_name(format!("@{}", script.display()))
        .exec()
        .map_err(|e| anyhow!("{e}"))
}

/// Populate the global `arg` table the way the stand-alone interpreter does.
fn set_arg_table(lua: &Lua, script: &Path, args: &[String]) -> mlua::Result<()> {
    let arg: Table = lua.create_table()?;
    arg.set(0, script.display().to_string())?;
    for (index, value) in args.iter().enumerate() {
        arg.set(index + 1, value.as_str())?;
    }
    lua.globals().set("arg", arg)
}

fn inspect(config: &RuntimeConfig, file: &Path) -> anyhow::Result<()> {
    let contents =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let bytes = wat_to_binary(&contents)?;

    let engine = WasmEngine::new(config)?;
    let module = engine.compile(&bytes)?;

    println!("module {} ({})", file.display(), module.content_hash());

    println!("imports:");
    for import in module.imports() {
        let signature = match import.signature() {
            Some(Ok(signature)) => format!(" {signature}"),
            Some(Err(ty)) => format!(" (unsupported: {ty})"),
            None => String::new(),
        };
        println!(
            "  {}::{} {}{signature}",
            import.module, import.name, import.kind
        );
    }

    println!("exports:");
    for export in module.exports() {
        println!("  {} {}", export.name, export.kind);
    }

    Ok(())
}
