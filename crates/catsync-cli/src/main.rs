mod commands;

use std::fmt;
use std::path::PathBuf;

use clap::{ArgGroup, Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Err,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Err => "error",
        }
    }
}

/// The one thing a run does. Ordinals are stable and show up in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandAction {
    Fetch = 0,
    Validate = 1,
    Sync = 2,
}

impl fmt::Display for CommandAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetch => "fetch",
            Self::Validate => "validate",
            Self::Sync => "sync",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Parser)]
#[command(name = "catsync")]
#[command(about = "Reconcile a product catalog between Zuora and a CSV file")]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["fetch", "validate_csv", "sync"])
))]
struct Cli {
    /// Download the catalog and write it as CSV.
    #[arg(short = 'F', long)]
    fetch: bool,

    /// Compare the CSV against the saved snapshot.
    #[arg(short = 'V', long = "validate-csv")]
    validate_csv: bool,

    /// Push CSV changes to the environment.
    #[arg(short = 'S', long)]
    sync: bool,

    /// Environment name from the config file.
    #[arg(short = 'e', long)]
    environment: String,

    /// Catalog config file.
    #[arg(short = 'k', long = "config")]
    config: PathBuf,

    /// Optional sanity rules applied while reading the CSV.
    #[arg(short = 's', long)]
    sanity: Option<PathBuf>,

    /// Apply every change without asking.
    #[arg(short = 'x', long = "push-through")]
    push_through: bool,

    #[arg(short = 'c', long)]
    csv: PathBuf,

    /// Catalog snapshot, written by fetch and read by validate and sync.
    #[arg(short = 'd', long)]
    dump: PathBuf,

    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        ignore_case = true,
        default_value = "INFO"
    )]
    log_level: LogLevel,
}

impl Cli {
    fn action(&self) -> CommandAction {
        // clap guarantees exactly one flag is set.
        match (self.fetch, self.validate_csv, self.sync) {
            (true, _, _) => CommandAction::Fetch,
            (_, true, _) => CommandAction::Validate,
            _ => CommandAction::Sync,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level.
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli.log_level.directive()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let action = cli.action();
    let config = catsync_core::load_config(&cli.environment, &cli.config)?;
    tracing::info!(
        action = %action,
        ordinal = action as u8,
        environment = %config.environment.name,
        csv = %cli.csv.display(),
        dump = %cli.dump.display(),
        "starting"
    );

    match action {
        CommandAction::Fetch => commands::run_fetch(&cli, &config).await,
        CommandAction::Validate => commands::run_validate(&cli, &config).map(|counts| {
            println!("{counts}");
        }),
        CommandAction::Sync => commands::run_sync(&cli, &config).await,
    }
}
