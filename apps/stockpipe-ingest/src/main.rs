mod commands;
mod infra;
mod obs;

use clap::{Parser, Subcommand};
use commands::{Command, RunArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stockpipe-ingest")]
#[command(
    about = "Incremental daily stock price ingestion into PostgreSQL.",
    version,
    arg_required_else_help = true
)]
#[command(
    after_help = "Examples:\n  stockpipe-ingest migrate --config configs/sample.toml\n  stockpipe-ingest run --config configs/sample.toml --ticker AAPL --ticker MSFT\n  stockpipe-ingest run --config configs/sample.toml --dry-run --json\n  stockpipe-ingest show-config --config configs/sample.toml\n"
)]
struct Cli {
    /// Log filter used when STOCKPIPE_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format: text | json.
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    /// Serve Prometheus metrics on host:port.
    #[arg(long, global = true)]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Create the feature table if it does not exist.
    Migrate {
        #[arg(long, env = "STOCKPIPE_CONFIG")]
        config: PathBuf,
        /// Overrides STOCKPIPE_DB_URL and the [db] section.
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Fetch, gap-fill, derive features and store new rows for each ticker.
    Run {
        #[arg(long, env = "STOCKPIPE_CONFIG")]
        config: PathBuf,
        /// Ticker to ingest; repeatable. Defaults to run.tickers from the config.
        #[arg(long = "ticker", value_name = "TICKER")]
        tickers: Vec<String>,
        /// Overrides STOCKPIPE_DB_URL and the [db] section.
        #[arg(long)]
        db_url: Option<String>,
        /// Use an empty in-memory store instead of Postgres.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        /// Print a JSON summary instead of one line per ticker.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the loaded config as TOML with credentials redacted.
    ShowConfig {
        #[arg(long, env = "STOCKPIPE_CONFIG")]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    obs::init_tracing(&cli.log_level, &cli.log_format)?;
    obs::init_metrics(cli.metrics_addr.as_deref())?;

    let command = match cli.command {
        CliCommand::Migrate { config, db_url } => Command::Migrate { config, db_url },
        CliCommand::Run {
            config,
            tickers,
            db_url,
            dry_run,
            json,
        } => Command::Run(RunArgs {
            config,
            tickers,
            db_url,
            dry_run,
            json,
        }),
        CliCommand::ShowConfig { config } => Command::ShowConfig { config },
    };
    commands::run(command)
}
