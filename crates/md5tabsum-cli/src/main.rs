//! md5tabsum CLI - order-independent table checksums across database engines.

mod logging;
mod password;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use md5tabsum::{
    Config, DriverConnector, Orchestrator, PasswordStore, TableChecksum, TabsumError,
};
use tokio::sync::mpsc;
use tracing::info;

use crate::logging::FileLogLayer;

#[derive(Parser)]
#[command(name = "md5tabsum")]
#[command(about = "Order-independent MD5 checksums of database tables")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "md5tabsum.yaml")]
    config: PathBuf,

    /// Console log format (text or json)
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Console log verbosity (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    verbosity: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Checksum every table of every active instance (default)
    Run,

    /// Manage the encrypted password store
    Password {
        #[command(subcommand)]
        action: PasswordAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum PasswordAction {
    /// Create a new store with a password for every configured instance
    Create,

    /// Add the password of one instance
    Add {
        /// Instance id, e.g. postgresql.prod
        #[arg(short, long)]
        instance: String,
    },

    /// Replace the password of one instance
    Update {
        #[arg(short, long)]
        instance: String,
    },

    /// Remove the password of one instance
    Delete {
        #[arg(short, long)]
        instance: String,
    },

    /// List instances that have a stored password
    Show,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<u8, TabsumError> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        None | Some(Commands::Run) => run_checksums(&cli.verbosity, &cli.log_format, config).await,
        Some(Commands::Password { action }) => {
            logging::init(&cli.verbosity, &cli.log_format, None);
            password::handle(&config, action)?;
            Ok(0)
        }
    }
}

async fn run_checksums(verbosity: &str, log_format: &str, config: Config) -> Result<u8, TabsumError> {
    let file_level = config.run_log_level().tracing_level();
    let file_layer = FileLogLayer::open(&config.logfile, file_level)?;
    logging::init(verbosity, log_format, Some(file_layer));

    info!("md5tabsum version {}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(PasswordStore::new(&config.passwordstore));
    let orchestrator = Orchestrator::from_config(&config, store, Arc::new(DriverConnector));

    let (tx, rx) = mpsc::channel(256);
    let (summary, ()) = tokio::join!(orchestrator.run(tx), print_checksums(rx));

    let code = summary.exit_code();
    info!("[rc={}]", code);
    Ok(code)
}

/// Print results as they arrive: checksums on stdout, failures on stderr.
async fn print_checksums(mut rx: mpsc::Receiver<TableChecksum>) {
    while let Some(checksum) = rx.recv().await {
        match &checksum.error {
            None => println!("{}", checksum.output_line()),
            Some(e) => eprintln!(
                "{}.{}: {}",
                checksum.instance_id, checksum.table_name, e
            ),
        }
    }
}
