mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cbuild_lib::consts::CONFIG_FILENAME;
use cbuild_lib::execute::BuildError;

use cmd::{cmd_build, cmd_deps, cmd_list};
use output::{OutputFormat, print_error};

/// cbuild - Incremental build orchestrator for C projects
#[derive(Parser)]
#[command(name = "cbuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Path to the project file
  #[arg(short, long, global = true, default_value = CONFIG_FILENAME)]
  config: PathBuf,

  /// Output format
  #[arg(long, global = true, value_enum, default_value_t)]
  format: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build one or more configurations, in the order given
  Build {
    /// Names of the configurations to build
    #[arg(required = true)]
    names: Vec<String>,

    /// Report what would be compiled and linked without running the toolchain
    #[arg(long)]
    dry_run: bool,
  },

  /// List the configurations of the project
  List,

  /// Print the headers a source file depends on
  Deps {
    /// Configuration whose include directories are searched
    configuration: String,

    /// Source file to inspect
    source: PathBuf,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_filter = if cli.verbose { "cbuild_lib=debug" } else { "cbuild_lib=info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Build { names, dry_run } => cmd_build(&cli.config, &names, dry_run, cli.format),
    Commands::List => cmd_list(&cli.config, cli.format),
    Commands::Deps { configuration, source } => cmd_deps(&cli.config, &configuration, &source, cli.format),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{:#}", err));
      ExitCode::from(exit_status(&err))
    }
  }
}

/// A failing compiler or linker's exit code is forwarded; everything else is 1.
fn exit_status(err: &anyhow::Error) -> u8 {
  err
    .downcast_ref::<BuildError>()
    .map(BuildError::exit_code)
    .and_then(|code| u8::try_from(code).ok())
    .filter(|code| *code != 0)
    .unwrap_or(1)
}
