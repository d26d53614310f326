//!
//! Compile an SDSL source file into a SPIR-V module.
//!
//! Usage: `sdslc <file> [--effect NAME] [--entry NAME --stage STAGE] [-D NAME[=VALUE]]... [--disassemble] [--output FILE]`

use clap::Parser;
use sdsl::{compile, CompileRequest, EntryPoint, Stage};
use sdsl_tools::Intrinsics;
use std::fs;
use std::path::PathBuf;
use std::process;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "sdslc")]
#[command(about = "Compile an SDSL shader module to SPIR-V")]
struct Args {
    /// Path to the .sdsl source file
    file: PathBuf,

    /// Effect selecting the mixins to compile (all mixins when omitted)
    #[arg(long)]
    effect: Option<String>,

    /// Entry point function name
    #[arg(long, requires = "stage")]
    entry: Option<String>,

    /// Shader stage of the entry point (vertex, fragment, compute, ...)
    #[arg(long)]
    stage: Option<Stage>,

    /// Preprocessor definitions, `NAME` or `NAME=VALUE`
    #[arg(short = 'D', value_name = "NAME[=VALUE]")]
    defines: Vec<String>,

    /// Print the module as text instead of writing binary
    #[arg(long)]
    disassemble: bool,

    /// Explicit output file path (defaults to the source with a .spv extension)
    #[arg(long = "output", short = 'o')]
    output: Option<PathBuf>,
}

fn main() {
    sdsl_tools::init_logging();

    let args = Args::parse();

    let source = match fs::read_to_string(&args.file) {
        Ok(source) => source,
        Err(error) => {
            error!("Failed to read {}: {}", args.file.display(), error);
            process::exit(1);
        }
    };

    let module_name = args
        .file
        .file_stem()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "module".to_string());
    let file_name = args.file.display().to_string();

    let intrinsics = Intrinsics::new();
    let mut request = CompileRequest::new(module_name, source)
        .file_name(file_name)
        .provider(&intrinsics);
    for define in &args.defines {
        let (name, value) = define.split_once('=').unwrap_or((define.as_str(), "1"));
        request = request.define(name, value);
    }
    if let Some(effect) = &args.effect {
        request = request.effect(effect.clone());
    }
    match (&args.entry, args.stage) {
        (Some(name), Some(stage)) => {
            request = request.entry_point(EntryPoint::new(name.clone(), stage));
        }
        (None, Some(stage)) => warn!("--stage {} ignored without --entry", stage),
        _ => {}
    }

    info!("Compiling {}", args.file.display());
    let result = compile(&request);
    if result.has_errors() {
        eprintln!("{}", result.format_diagnostics());
        error!("Compilation failed with {} diagnostic(s)", result.diagnostics.len());
        process::exit(1);
    }
    if !result.diagnostics.is_empty() {
        warn!("{}", result.format_diagnostics());
    }

    let Some(module) = result.module else {
        error!("Compiler produced no module");
        process::exit(1);
    };
    info!(
        "Composed {} mixin(s), hash {:016x}",
        module.mixins.len(),
        module.hash
    );

    if args.disassemble {
        match module.disassemble() {
            Ok(text) => print!("{}", text),
            Err(error) => {
                error!("Failed to disassemble: {}", error);
                process::exit(1);
            }
        }
        return;
    }

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| args.file.with_extension("spv"));
    if let Err(error) = fs::write(&output_path, module.to_bytes()) {
        error!("Failed to write {}: {}", output_path.display(), error);
        process::exit(1);
    }

    info!("Wrote {} words to {}", module.words.len(), output_path.display());
}
