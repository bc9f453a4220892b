use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use miette::{miette, NamedSource, Result};
use tracing_subscriber::EnvFilter;

use p16c::{parse_module, stdlib_root, CompileOptions, CompileOutput, Compiler, Module};

#[derive(Debug, Parser)]
#[command(name = "p16c", version, about = "P16 compiler for the 16-bit interrupt-bus CPU")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the parsed syntax tree.
    Parse { path: PathBuf },
    /// Compile and report diagnostics without writing assembly.
    Check {
        path: PathBuf,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Compile to assembly.
    Build {
        path: PathBuf,
        #[command(flatten)]
        search: SearchArgs,
        /// Output file; assembly goes to stdout when omitted.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct SearchArgs {
    /// Additional module search root, searched after the standard library.
    #[arg(short = 'I', long = "include")]
    include: Vec<PathBuf>,
    /// Do not search the bundled standard library sources.
    #[arg(long)]
    no_stdlib: bool,
}

impl SearchArgs {
    fn options(&self, path: &Path) -> CompileOptions {
        let mut roots = Vec::new();
        if !self.no_stdlib {
            roots.push(stdlib_root());
        }
        if let Some(dir) = path.parent() {
            roots.push(dir.to_path_buf());
        }
        roots.extend(self.include.iter().cloned());
        CompileOptions {
            roots,
            ..CompileOptions::default()
        }
        .with_file(path.display().to_string())
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Parse { path } => {
            let module = read_module(&path)?;
            println!("{module:#?}");
            Ok(())
        }
        Command::Check { path, search } => {
            let output = compile_file(&path, &search)?;
            report(&output)?;
            println!("ok");
            Ok(())
        }
        Command::Build { path, search, out } => {
            let output = compile_file(&path, &search)?;
            report(&output)?;
            match out {
                Some(out) => {
                    std::fs::write(&out, &output.assembly)
                        .map_err(|err| miette!("failed to write {}: {err}", out.display()))?;
                    println!("built {}", out.display());
                }
                None => print!("{}", output.assembly),
            }
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_module(path: &Path) -> Result<Module> {
    let source = std::fs::read_to_string(path)
        .map_err(|err| miette!("failed to read {}: {err}", path.display()))?;
    parse_module(&source).map_err(|err| {
        let named = NamedSource::new(path.display().to_string(), source.clone());
        miette::Report::new(err).with_source_code(named)
    })
}

fn compile_file(path: &Path, search: &SearchArgs) -> Result<CompileOutput> {
    let module = read_module(path)?;
    let mut compiler = Compiler::new(search.options(path));
    compiler.compile_module(&module);
    Ok(compiler.finish())
}

/// Print every diagnostic to stderr; fail if any of them is an error.
fn report(output: &CompileOutput) -> Result<()> {
    for diagnostic in &output.diagnostics {
        eprintln!("{diagnostic}");
    }
    if output.failed {
        let count = output.errors().count();
        return Err(miette!("compilation failed with {count} error(s)"));
    }
    Ok(())
}
