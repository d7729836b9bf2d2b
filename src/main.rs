mod commands;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "diffcrypt")]
#[command(version = "0.1.0")]
#[command(about = "Line-level file encryption that keeps git diffs small", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Run as if started in this directory
    #[arg(short = 'C', value_name = "DIR", global = true)]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write default .diffcrypt.toml and .diffcryptignore files
    Init,

    /// Encrypt a file or directory in place
    Encrypt {
        /// File or directory (defaults to the current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Decrypt a file or directory in place
    Decrypt {
        /// File or directory (defaults to the current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show which lines of a file the next encryption would keep
    Status {
        /// File to inspect
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .with_env_var("DIFFCRYPT_LOG")
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let base = cli.directory.unwrap_or_else(|| PathBuf::from("."));
    let root = commands::workspace_root(&base)
        .with_context(|| format!("cannot open workspace {}", base.display()))?;

    match cli.command {
        Commands::Init => commands::init(&root)?,
        Commands::Encrypt { path } => commands::encrypt(&root, &resolve(&base, &path)?).await?,
        Commands::Decrypt { path } => commands::decrypt(&root, &resolve(&base, &path)?).await?,
        Commands::Status { file } => commands::status(&root, &resolve(&base, &file)?).await?,
    }
    Ok(())
}

fn resolve(base: &Path, path: &Path) -> Result<PathBuf> {
    let joined = base.join(path);
    fs::canonicalize(&joined).with_context(|| format!("cannot access {}", joined.display()))
}
