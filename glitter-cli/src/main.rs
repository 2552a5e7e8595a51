//! glitter CLI - Literate Programming Engine

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use glitter::config::Options;
use glitter::errors::{GlitterError, Result};

#[derive(Parser)]
#[command(name = "glitter")]
#[command(
    author,
    version,
    about = "Literate programming engine",
    long_about = "\
Literate programming engine that turns block-oriented source documents\n\
into compilable code and typesettable documentation.\n\n\
  tangle  - expand named code fragments into source files\n\
  weave   - produce a single document interleaving prose and code"
)]
struct Cli {
    /// Increase verbosity (repeatable)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Template override file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Read every file only once, even when included again
    #[arg(long, global = true)]
    forbid_multiple_includes: bool,

    /// Don't run the post-build command
    #[arg(long, global = true)]
    no_post_build: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce a single typesettable document
    Weave {
        /// Output filename
        #[arg(short, long, default_value = "default.tex")]
        out: String,

        /// Source files to weave, in order
        #[arg(value_name = "FILE", required = true)]
        files: Vec<String>,
    },

    /// Expand code fragments into source files
    Tangle {
        /// Source files or directories to search for tangle roots
        #[arg(value_name = "FILE", required = true)]
        files: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut options = Options::default();
    if let Some(ref path) = cli.config {
        options.load_overrides(path)?;
    }

    match cli.command {
        Commands::Weave { out, files } => {
            let file = File::create(&out).map_err(|source| GlitterError::WriteFailed {
                path: out.clone(),
                source,
            })?;
            let mut writer = BufWriter::new(file);
            glitter::weave::weave(
                &options,
                &files,
                cli.forbid_multiple_includes,
                &mut writer,
                &out,
            )?;
            writer.flush().map_err(|source| GlitterError::WriteFailed {
                path: out.clone(),
                source,
            })?;

            if !cli.no_post_build {
                glitter::hooks::execute_command(&options, options.get("WeaveCommand"), &out)?;
            }
            Ok(())
        }

        Commands::Tangle { files } => {
            let files = glitter::readers::find_tangle_files(&options, &files)?;
            glitter::tangle::tangle(&options, &files, cli.forbid_multiple_includes)?;

            if !cli.no_post_build {
                glitter::hooks::execute_command(&options, options.get("TangleCommand"), "")?;
            }
            Ok(())
        }
    }
}
