use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use nefc::compiler::{self, Program};
use nefc::config::CompilerOptions;
use nefc::logging;
use nefc::smartcontract::Nef;
use nefc::vm::disasm;

#[derive(Parser)]
#[command(name = "nefc")]
#[command(about = "NeoVM contract compiler back-end", long_about = None)]
struct Cli {
    /// Log filter directive, e.g. `debug` or `nefc=trace`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a unit to a NEF file and manifest
    Compile {
        /// The compilation unit (JSON syntax tree)
        unit: PathBuf,

        /// Compiler options (defaults to <unit>.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output NEF path (defaults to the unit path with .nef extension)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Manifest path (defaults to the unit path with .manifest.json extension)
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Dump bytecode to stderr, or to a file with --dump-bytecode=path
        #[arg(long, value_name = "FILE", num_args = 0..=1)]
        dump_bytecode: Option<Option<PathBuf>>,

        /// Write per-method debug info as JSON next to the NEF
        #[arg(long)]
        debug: bool,
    },
    /// Check a unit without writing output
    Check {
        unit: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Disassemble a NEF file
    Dump {
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref());

    let result = match cli.command {
        Commands::Compile {
            unit,
            config,
            out,
            manifest,
            dump_bytecode,
            debug,
        } => run_compile(&unit, config.as_deref(), out, manifest, dump_bytecode, debug),
        Commands::Check { unit, config } => run_check(&unit, config.as_deref()),
        Commands::Dump { file } => run_dump(&file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_options(unit: &Path, config: Option<&Path>) -> Result<CompilerOptions, String> {
    match config {
        Some(path) => CompilerOptions::load(path).map_err(|e| e.to_string()),
        None => {
            let default = unit.with_extension("toml");
            if default.exists() {
                CompilerOptions::load(&default).map_err(|e| e.to_string())
            } else {
                Ok(CompilerOptions::default())
            }
        }
    }
}

fn build(unit_path: &Path, config: Option<&Path>) -> Result<(Program, CompilerOptions), String> {
    let options = load_options(unit_path, config)?;
    let unit = compiler::load_unit(unit_path).map_err(|e| e.to_string())?;
    let program = compiler::compile(&unit, &options).map_err(|diags| format!("compilation failed:\n{}", diags))?;
    Ok((program, options))
}

fn run_compile(
    unit_path: &Path,
    config: Option<&Path>,
    out: Option<PathBuf>,
    manifest: Option<PathBuf>,
    dump_bytecode: Option<Option<PathBuf>>,
    debug: bool,
) -> Result<(), String> {
    let (program, options) = build(unit_path, config)?;

    if let Some(target) = dump_bytecode {
        let listing = disasm::format_script(&program.script, &program.tokens).map_err(|e| e.to_string())?;
        match target {
            Some(path) => write(&path, listing.as_bytes())?,
            None => eprint!("{}", listing),
        }
    }

    let nef = program.to_nef(&options.source_url).map_err(|e| e.to_string())?;
    let nef_path = out.unwrap_or_else(|| unit_path.with_extension("nef"));
    write(&nef_path, &nef.to_bytes().map_err(|e| e.to_string())?)?;

    let manifest_json = program.manifest(&options).to_json().map_err(|e| e.to_string())?;
    let manifest_path = manifest.unwrap_or_else(|| unit_path.with_extension("manifest.json"));
    write(&manifest_path, manifest_json.as_bytes())?;

    if debug {
        let json = serde_json::to_string_pretty(&program.debug).map_err(|e| e.to_string())?;
        write(&nef_path.with_extension("debug.json"), json.as_bytes())?;
    }
    Ok(())
}

fn run_check(unit_path: &Path, config: Option<&Path>) -> Result<(), String> {
    build(unit_path, config)?;
    println!("ok");
    Ok(())
}

fn run_dump(path: &Path) -> Result<(), String> {
    let data = fs::read(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    let nef = Nef::from_bytes(&data).map_err(|e| e.to_string())?;
    println!("compiler: {}", nef.compiler);
    if !nef.source.is_empty() {
        println!("source: {}", nef.source);
    }
    print!("{}", disasm::format_script(&nef.script, &nef.tokens).map_err(|e| e.to_string())?);
    Ok(())
}

fn write(path: &Path, data: &[u8]) -> Result<(), String> {
    fs::write(path, data).map_err(|e| format!("failed to write {}: {}", path.display(), e))
}
