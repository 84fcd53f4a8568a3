mod check;
mod list;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use cronkeep_config::CronKeepConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cronkeep", about = "Named cron job registry")]
struct Cli {
    /// Config file (defaults to ~/.cronkeep/config.json5)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate one or more schedule patterns
    Check {
        /// Patterns to validate (e.g. "0 */5 * * * *", "@every 30s")
        #[arg(required = true)]
        patterns: Vec<String>,
    },
    /// Register the configured jobs and print the resulting registry
    List,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => cronkeep_config::load_config_from(path)?,
        None => cronkeep_config::load_config()?,
    };
    init_tracing(&config)?;

    match cli.command {
        Commands::Check { patterns } => {
            if !check::run_check(&patterns) {
                std::process::exit(1);
            }
        }
        Commands::List => {
            let rt = tokio::runtime::Runtime::new()?;
            let entries = rt.block_on(list::run_list(&config))?;
            print!("{}", list::render(&entries));
        }
    }

    Ok(())
}

/// Initialize tracing: `RUST_LOG` wins, otherwise the configured level.
/// Output goes to the configured log file when one is set.
fn init_tracing(config: &CronKeepConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.level.as_str()));

    match &config.log.path {
        Some(path) => {
            let file = open_log_file(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new().create(true).append(true).open(path)
}
