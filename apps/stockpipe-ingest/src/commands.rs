use crate::infra;
use std::path::{Path, PathBuf};
use stockpipe_application::config::{load_config, to_toml_pretty, validate_config, Config};
use stockpipe_application::ingestion::{BatchSummary, IncrementalIngestion, IngestionBatch};
use stockpipe_domain::repositories::series_store::PersistedSeriesStore;
use stockpipe_infrastructure::persistence::memory::InMemorySeriesStore;
use stockpipe_infrastructure::persistence::postgres_series::validate_table_name;

pub enum Command {
    Migrate {
        config: PathBuf,
        db_url: Option<String>,
    },
    Run(RunArgs),
    ShowConfig {
        config: PathBuf,
    },
}

pub struct RunArgs {
    pub config: PathBuf,
    pub tickers: Vec<String>,
    pub db_url: Option<String>,
    pub dry_run: bool,
    pub json: bool,
}

pub fn run(command: Command) -> Result<(), String> {
    match command {
        Command::Migrate { config, db_url } => run_migrate(&config, db_url.as_deref()),
        Command::Run(args) => run_ingest(args),
        Command::ShowConfig { config } => run_show_config(&config),
    }
}

fn load_checked(path: &Path) -> Result<Config, String> {
    let config = load_config(path)?;
    validate_config(&config).map_err(|err| format!("invalid config {}: {err}", path.display()))?;
    validate_table_name(&config.db.table)
        .map_err(|err| format!("invalid config {}: db.table: {err}", path.display()))?;
    Ok(config)
}

fn run_migrate(config_path: &Path, db_url: Option<&str>) -> Result<(), String> {
    metrics::counter!("stockpipe.cli.commands_total", "command" => "migrate").increment(1);
    let config = load_checked(config_path)?;
    let store = infra::build_postgres_store(&config, db_url)?;
    store.migrate().map_err(|err| err.to_string())?;
    println!("stockpipe-ingest: schema ready (table={})", store.table());
    Ok(())
}

fn run_show_config(config_path: &Path) -> Result<(), String> {
    metrics::counter!("stockpipe.cli.commands_total", "command" => "show-config").increment(1);
    let config = load_checked(config_path)?;
    print!("{}", to_toml_pretty(&config)?);
    Ok(())
}

fn run_ingest(args: RunArgs) -> Result<(), String> {
    metrics::counter!("stockpipe.cli.commands_total", "command" => "run").increment(1);
    let config = load_checked(&args.config)?;
    let tickers = if args.tickers.is_empty() {
        config.run.tickers.clone()
    } else {
        args.tickers
    };
    if tickers.is_empty() {
        return Err("no tickers to ingest: pass --ticker or set run.tickers".to_string());
    }

    let source = infra::build_source(&config)?;
    let store: Box<dyn PersistedSeriesStore> = if args.dry_run {
        tracing::info!("dry run: writing to an empty in-memory store");
        Box::new(InMemorySeriesStore::new())
    } else {
        Box::new(infra::build_postgres_store(&config, args.db_url.as_deref())?)
    };

    let ingestion = IncrementalIngestion::new(source.as_ref(), store.as_ref(), config.features);
    let summary = IngestionBatch::new(ingestion).run_all(tickers.as_slice());

    if args.json {
        let rendered = serde_json::to_string_pretty(&summary.to_json())
            .map_err(|err| format!("failed to render summary JSON: {err}"))?;
        println!("{rendered}");
    } else {
        print_summary(&summary, args.dry_run);
    }

    if summary.failed() > 0 {
        return Err(format!(
            "{} of {} tickers failed",
            summary.failed(),
            summary.outcomes.len()
        ));
    }
    Ok(())
}

fn print_summary(summary: &BatchSummary, dry_run: bool) {
    let verb = if dry_run { "would write" } else { "wrote" };
    for outcome in &summary.outcomes {
        match &outcome.result {
            Ok(run) => {
                let range = match (run.range_start, run.range_end) {
                    (Some(start), Some(end)) => format!("{start}..{end}"),
                    _ => "up to date".to_string(),
                };
                println!(
                    "{}: {verb} {} rows (fetched={}, filled={}, dropped={}, range={range})",
                    run.ticker,
                    run.rows_written,
                    run.fetched,
                    run.gap_fill.forward_filled + run.gap_fill.backward_filled,
                    run.gap_fill.dropped_rows
                );
            }
            Err(err) => println!("{}: failed ({}): {err}", outcome.ticker, err.kind()),
        }
    }
    println!(
        "stockpipe-ingest: {} ok, {} failed, {} rows",
        summary.succeeded(),
        summary.failed(),
        summary.rows_written()
    );
}
