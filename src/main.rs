use clap::{Args, Parser as ClapParser, Subcommand};
use mlogx::{CompileOutput, Compiler, CompilerError, Diagnostic, Settings, Severity};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(ClapParser)]
#[command(author, version, about = "mlogx compiler")]
struct Cli {
    /// Log compiler internals
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an mlogx file to mlog
    Compile {
        #[command(flatten)]
        unit: UnitArgs,
        /// Output file (defaults to the input with an .mlog extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compile without writing output and print diagnostics
    Check {
        #[command(flatten)]
        unit: UnitArgs,
    },
    /// Manage the project settings file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args)]
struct UnitArgs {
    /// Source file to compile
    input: PathBuf,
    /// Settings file (defaults to config.json next to the input)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Abort on the first line that fails to resolve
    #[arg(long)]
    strict: bool,
    /// Target a world processor
    #[arg(long)]
    world: bool,
    /// Annotate rewritten lines with their source location
    #[arg(long)]
    include_source: bool,
    /// Define a compiler constant
    #[arg(short = 'D', value_name = "NAME=VALUE")]
    define: Vec<String>,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a settings file with defaults
    Init {
        #[arg(default_value = Settings::FILE_NAME)]
        path: PathBuf,
    },
    /// Print the settings that apply to a path
    Show {
        #[arg(default_value = Settings::FILE_NAME)]
        path: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_settings(unit: &UnitArgs) -> Result<Settings, Box<dyn std::error::Error>> {
    let path = unit
        .config
        .clone()
        .unwrap_or_else(|| Settings::path_for(&unit.input));
    let mut settings = Settings::load(&path)?;
    for definition in &unit.define {
        settings.define(definition)?;
    }
    let options = &mut settings.compiler_options;
    options.strict |= unit.strict;
    options.world_processor |= unit.world;
    options.include_source |= unit.include_source;
    Ok(settings)
}

fn compile_unit(unit: &UnitArgs) -> Result<(Compiler, CompileOutput), Box<dyn std::error::Error>> {
    let settings = load_settings(unit)?;
    let source = fs::read_to_string(&unit.input).map_err(CompilerError::Io)?;
    let filename = unit.input.display().to_string();
    let compiler = Compiler::from_settings(&settings);
    let output = compiler.compile(&filename, &source)?;
    print_diagnostics(&output.diagnostics);
    Ok((compiler, output))
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{}", diagnostic);
    }
    let warnings = diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.severity == Severity::Warning)
        .count();
    if warnings > 0 {
        eprintln!("{} warning(s)", warnings);
    }
}

fn default_output(input: &Path) -> PathBuf {
    input.with_extension("mlog")
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(error) = run(cli.command) {
        eprintln!("{}", error);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Compile { unit, output } => {
            let (compiler, compiled) = compile_unit(&unit)?;
            let path = output.unwrap_or_else(|| default_output(&unit.input));
            fs::write(&path, compiler.render(&compiled.statements))?;
            println!(
                "Compiled {} to {} ({} instructions)",
                unit.input.display(),
                path.display(),
                compiled.statements.len()
            );
        }
        Commands::Check { unit } => {
            let (_, compiled) = compile_unit(&unit)?;
            println!("{}: {} diagnostic(s)", unit.input.display(), compiled.diagnostics.len());
        }
        Commands::Config { command } => match command {
            ConfigCommands::Init { path } => {
                if path.exists() {
                    println!("Settings file already exists at: {}", path.display());
                } else {
                    Settings::default().save(&path)?;
                    println!("Initialized settings file at: {}", path.display());
                }
            }
            ConfigCommands::Show { path } => {
                let settings = Settings::load(&path)?;
                println!("{}", serde_json::to_string_pretty(&settings)?);
            }
        },
    }

    Ok(())
}
