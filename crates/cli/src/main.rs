use crate::{
    commands::{Commands, NavArgs},
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use connectors::{memory::MemoryFetcher, sql::postgres::fetcher::PgFetcher};
use cursor_client::{Cursor, CursorError, stream::StreamControl};
use cursor_config::{
    env::EnvContext,
    settings::{CursorMode, CursorSettings},
};
use cursor_core::fetcher::{BatchFetcher, FetchDirection, FetchRequest};
use model::records::row::Row;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod output;
mod script;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "scroll",
    version = "0.1.0",
    about = "Scrollable cursor over batched query results"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "JSON settings file; SCROLL_* environment variables override it"
    )]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    // Rows go to stdout, logs to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let code = match run(cli, &shutdown).await {
        Ok(()) => ExitCode::Success,
        Err(_) if shutdown.is_shutdown_requested() => ExitCode::ShutdownRequested,
        Err(err) => {
            error!(%err, "scroll failed");
            ExitCode::GeneralError
        }
    };
    std::process::exit(code.as_i32());
}

async fn run(cli: Cli, shutdown: &ShutdownCoordinator) -> Result<(), CliError> {
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Demo { rows, nav } => {
            let settings = nav_settings(settings, &nav);
            let fetcher = Arc::new(MemoryFetcher::numbered(rows));
            let initial = fetcher.initial_batch(settings.effective_fetch_size());
            let columns = fetcher.columns().to_vec();
            let cursor = Cursor::open(fetcher, initial, columns, &settings);
            navigate(cursor, &nav, shutdown).await
        }
        Commands::Pg {
            url,
            query,
            count,
            nav,
        } => {
            let settings = nav_settings(settings, &nav);
            let mut fetcher = PgFetcher::connect(&url, query).await?;
            if count {
                fetcher = fetcher.with_row_count();
            }
            let columns = fetcher.columns().await?;
            let request = FetchRequest::forward(1, settings.effective_fetch_size());
            let initial = fetcher
                .fetch(request)
                .await
                .map_err(|source| CursorError::Fetch {
                    row: 1,
                    direction: FetchDirection::Forward,
                    source,
                })?;
            let cursor = Cursor::open(Arc::new(fetcher), initial, columns, &settings);
            navigate(cursor, &nav, shutdown).await
        }
        Commands::Stream {
            rows,
            fetch_size,
            prefetch,
            latency_ms,
        } => {
            let mut settings = settings
                .with_mode(CursorMode::ForwardOnly)
                .with_prefetch_threshold(prefetch);
            if let Some(size) = fetch_size {
                settings = settings.with_fetch_size(size);
            }
            settings.validate()?;

            let mut fetcher = MemoryFetcher::numbered(rows);
            if let Some(ms) = latency_ms {
                fetcher = fetcher.with_latency(Duration::from_millis(ms));
            }
            let initial = fetcher.initial_batch(settings.effective_fetch_size());
            let columns = fetcher.columns().to_vec();
            let mut cursor = Cursor::open(Arc::new(fetcher), initial, columns.clone(), &settings)
                .with_cancel_token(shutdown.cancel_token());

            let mut sink = |row_number: i64, row: &Row| {
                match output::print_row(&columns, row_number, row) {
                    Ok(()) => StreamControl::Continue,
                    Err(err) => {
                        warn!(%err, "Failed to print row, closing cursor");
                        StreamControl::Close
                    }
                }
            };
            let delivered = cursor.stream_to(&mut sink).await?;
            info!(rows = delivered, "Stream complete.");
            Ok(())
        }
    }
}

fn load_settings(path: Option<&str>) -> Result<CursorSettings, CliError> {
    let settings = match path {
        Some(path) => CursorSettings::from_file(path)?,
        None => CursorSettings::default(),
    };
    let settings = settings.with_env(&EnvContext::capture())?;
    settings.validate()?;
    Ok(settings)
}

fn nav_settings(mut settings: CursorSettings, nav: &NavArgs) -> CursorSettings {
    if let Some(size) = nav.fetch_size {
        settings = settings.with_fetch_size(size.max(1));
    }
    if nav.forward_only {
        settings = settings.with_mode(CursorMode::ForwardOnly);
    }
    settings
}

async fn navigate(
    cursor: Cursor,
    nav: &NavArgs,
    shutdown: &ShutdownCoordinator,
) -> Result<(), CliError> {
    let steps = script::parse(&nav.script)?;
    let cancel = shutdown.cancel_token();
    let mut cursor = cursor.with_cancel_token(cancel.clone());

    script::run(&mut cursor, &steps, &cancel).await?;

    let stats = cursor.stats();
    info!(
        fetches = stats.fetches,
        cache_hits = stats.cache_hits,
        evictions = stats.evictions,
        "Navigation finished."
    );
    cursor.close();
    Ok(())
}
