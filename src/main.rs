//! Catalog Sync
//!
//! Imports products from a CSV export into the remote catalog. Per-record
//! outcomes are printed to stdout; the exit code only reflects setup errors.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use catalog_sync::config::Settings;
use catalog_sync::providers::{ClientContext, ShopifyProvider};
use catalog_sync::sync::{
    read_rows, SyncMode, SyncOptions, SyncOrchestrator, SyncOutcome, SyncReport,
};

#[derive(Parser)]
#[command(name = "catalog-sync")]
#[command(about = "Import products into the catalog from a CSV export", long_about = None)]
#[command(version)]
struct Cli {
    /// Semicolon-delimited product export
    #[arg(default_value = "files/Produits AVA.csv")]
    csv_path: PathBuf,

    /// Credential used for every call (taken modulo the pool size)
    #[arg(long, default_value_t = 0)]
    token_index: usize,

    /// Maximum number of products to import
    #[arg(long)]
    limit: Option<usize>,

    /// Products submitted concurrently (default from config)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Create products through the GraphQL endpoint
    #[arg(long)]
    graphql: bool,

    /// Cross-link every created product with a linked_products metafield
    #[arg(long)]
    link_products: bool,

    /// Print the payloads without calling the API
    #[arg(long)]
    dry_run: bool,

    /// Abort the run after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let settings = Settings::load().context("Failed to load configuration")?;

    info!(
        "Starting catalog-sync v{} against {}",
        env!("CARGO_PKG_VERSION"),
        settings.api_base_url()
    );

    let rows = read_rows(&cli.csv_path)?;
    info!(rows = rows.len(), path = %cli.csv_path.display(), "Loaded input file");

    if cli.dry_run {
        return print_payloads(&rows, cli.limit);
    }

    let context = Arc::new(
        ClientContext::from_settings(&settings).context("Failed to initialize API access")?,
    );
    info!(credentials = context.pool().len(), "Credential pool loaded");

    let provider = Arc::new(ShopifyProvider::new(context, &settings));
    let orchestrator = SyncOrchestrator::new(provider);

    let mut options = SyncOptions::from(&settings.sync);
    options.credential_index = cli.token_index;
    options.limit = cli.limit;
    if let Some(concurrency) = cli.concurrency {
        options.concurrency = concurrency.max(1);
    }
    if cli.graphql {
        options.mode = SyncMode::GraphQl;
    }

    let cancel = CancellationToken::new();
    spawn_cancellation(cancel.clone(), cli.timeout_secs);

    let report = orchestrator.run(&rows, &options, &cancel).await;
    print_report(&report);

    if cli.link_products && !cancel.is_cancelled() {
        let ids: Vec<i64> = report.results.iter().filter_map(|r| r.product_id()).collect();

        if ids.len() > 1 {
            for link in orchestrator.link_products(options.credential_index, &ids).await {
                match link.outcome {
                    Ok(metafield_id) => println!("→ Linked {} (metafield {})", link.product_id, metafield_id),
                    Err(e) => println!("→ Linking failed for {}: {}", link.product_id, e),
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("catalog_sync=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Cancel on Ctrl-C, and after `timeout_secs` when given
fn spawn_cancellation(cancel: CancellationToken, timeout_secs: Option<u64>) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling pending products");
            on_signal.cancel();
        }
    });

    if let Some(secs) = timeout_secs {
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    warn!(timeout_secs = secs, "Run timeout reached, cancelling");
                    cancel.cancel();
                }
                _ = cancel.cancelled() => {}
            }
        });
    }
}

fn print_payloads(rows: &[catalog_sync::sync::RawRow], limit: Option<usize>) -> Result<()> {
    let builder = catalog_sync::sync::PayloadBuilder::new();
    for row in rows.iter().take(limit.unwrap_or(usize::MAX)) {
        let (payload, label) = builder.build(row);
        println!("# {}", label);
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    for result in &report.results {
        match &result.outcome {
            SyncOutcome::Created { id, title } => println!(
                "→ Created {}: {} - {}",
                result.display_label(),
                id,
                title.as_deref().unwrap_or("")
            ),
            SyncOutcome::Failed(failure) => {
                println!("→ Failed {}: {}", result.display_label(), failure)
            }
        }
        for warning in &result.warnings {
            println!("  warning: {}", warning);
        }
    }

    println!(
        "Run {}: {} created, {} failed ({} cancelled) of {} in {}s",
        report.run_id,
        report.succeeded(),
        report.failed(),
        report.cancelled(),
        report.total(),
        report.duration_secs()
    );
}
