use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{error, info, warn};
use pricing_lib::arbitration::{ArbitrationOracle, ProviderChainOracle};
use pricing_lib::config::MatchingConfig;
use pricing_lib::delivery::WebhookClient;
use pricing_lib::ingest::{read_dataset, resolve_columns};
use pricing_lib::matching::index::CandidateIndex;
use pricing_lib::matching::missing::find_missing;
use pricing_lib::matching::orchestrator::MatchEngine;
use pricing_lib::models::core::ProductRecord;
use pricing_lib::utils::env::load_env;
use pricing_lib::utils::get_memory_usage;
use pricing_lib::utils::progress::ProgressCallback;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Match the merchant catalog against competitor catalogs and classify
/// price positioning, then surface competitor products missing from the
/// merchant catalog.
#[derive(Parser, Debug)]
#[command(name = "analyze", version, about)]
struct Cli {
    /// Merchant catalog (JSON array of row objects).
    #[arg(long)]
    ours: PathBuf,

    /// Competitor catalog files; repeat for multiple competitors.
    #[arg(long = "competitor", required = true)]
    competitors: Vec<PathBuf>,

    /// Classified output path.
    #[arg(long, default_value = "analysis.json")]
    output: PathBuf,

    /// Missing-products output path.
    #[arg(long, default_value = "missing.json")]
    missing_output: PathBuf,

    /// Explicit product-name column, overriding header detection.
    #[arg(long)]
    name_column: Option<String>,

    /// Skip the arbitration oracle even when provider keys are configured.
    #[arg(long)]
    no_oracle: bool,

    /// Optional webhook endpoint for the classified and missing lists.
    #[arg(long)]
    webhook_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    load_env();
    let cli = Cli::parse();

    let config = Arc::new(MatchingConfig::from_env());
    config.log_config();

    let run_id = Uuid::new_v4().to_string();
    let run_start = Instant::now();
    info!("🚀 Starting pricing analysis run {}", run_id);

    // Merchant catalog is the one input nothing works without.
    let merchant_dataset = read_dataset(&cli.ours)
        .with_context(|| format!("Failed to load merchant catalog {}", cli.ours.display()))?;
    let merchant_columns = resolve_columns(&merchant_dataset, cli.name_column.as_deref());
    let merchant_records = merchant_dataset.records(&merchant_columns);
    info!(
        "🧴 Merchant catalog '{}': {} rows",
        merchant_dataset.source,
        merchant_records.len()
    );

    // Competitor files degrade per-file: a bad file is reported and the
    // rest of the run continues.
    let mut indices: Vec<CandidateIndex> = Vec::new();
    for path in &cli.competitors {
        match read_dataset(path) {
            Ok(dataset) => {
                let columns = resolve_columns(&dataset, cli.name_column.as_deref());
                let records: Vec<ProductRecord> = dataset.records(&columns);
                let index = CandidateIndex::build(&dataset.source, &records, &config);
                info!(
                    "🗂️  Competitor '{}': {} indexed entries ({} excluded)",
                    dataset.source,
                    index.len(),
                    index.excluded_rows
                );
                indices.push(index);
            }
            Err(e) => {
                error!("Skipping competitor file {}: {:#}", path.display(), e);
            }
        }
    }
    if indices.is_empty() {
        return Err(anyhow!("no readable competitor catalog among {} input files", cli.competitors.len()));
    }

    let oracle: Option<Arc<dyn ArbitrationOracle>> = if cli.no_oracle {
        info!("🤖 Arbitration oracle disabled by flag");
        None
    } else {
        match ProviderChainOracle::from_env(&config)? {
            Some(chain) => Some(Arc::new(chain) as Arc<dyn ArbitrationOracle>),
            None => {
                warn!("🤖 No arbitration provider keys configured; ambiguous matches follow the failure policy");
                None
            }
        }
    };

    let mut engine = MatchEngine::new(Arc::clone(&config));
    if let Some(oracle) = oracle {
        engine = engine.with_oracle(oracle);
    }

    let callback: ProgressCallback = Arc::new(|fraction| {
        log::debug!("Analysis progress: {:.1}%", fraction * 100.0);
    });
    let report = engine
        .run_full_analysis(&run_id, &merchant_records, &indices, Some(callback))
        .await?;

    let missing = find_missing(&merchant_records, &indices, &config);

    fs::write(&cli.output, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;
    fs::write(&cli.missing_output, serde_json::to_string_pretty(&missing)?)
        .with_context(|| format!("Failed to write {}", cli.missing_output.display()))?;
    info!(
        "💾 Wrote {} classified rows to {} and {} missing products to {}",
        report.rows.len(),
        cli.output.display(),
        missing.len(),
        cli.missing_output.display()
    );

    if let Some(url) = &cli.webhook_url {
        let client = WebhookClient::new(url.clone())?;
        let (updates, missing_delivery) = futures::future::join(
            client.send_price_updates(&report.rows),
            client.send_missing_products(&missing),
        )
        .await;
        for outcome in [updates, missing_delivery] {
            match outcome {
                Ok(o) if o.success => {}
                Ok(o) => warn!("Webhook delivery returned status {}", o.status),
                Err(e) => warn!("Webhook delivery failed: {:#}", e),
            }
        }
    }

    let stats = &report.stats;
    info!("=== Run Summary ===");
    info!("Run ID: {}", run_id);
    info!(
        "Rows: {} total, {} classified, {} samples skipped, {} empty names",
        stats.total_rows, stats.classified_rows, stats.skipped_samples, stats.skipped_empty_names
    );
    info!(
        "Decisions: {} approved, {} higher, {} lower, {} review, {} missing",
        stats.approved, stats.price_higher, stats.price_lower, stats.needs_review, stats.missing_from_competitor
    );
    info!(
        "Matching: {} auto-accepted, {} arbitrated, {} fallback, avg best score {:.1}",
        stats.auto_accepted, stats.arbitrated, stats.fallback_top, stats.avg_best_score
    );
    info!(
        "Oracle: {} batches ({} items), {} cache hits, {} failures",
        stats.oracle_batches, stats.oracle_items, stats.oracle_cache_hits, stats.oracle_failures
    );
    info!("Missing products found: {}", missing.len());
    info!("Memory usage: {} MB", get_memory_usage().await);
    info!("Total execution time: {:.2?}", run_start.elapsed());
    info!("Analysis run completed successfully!");
    Ok(())
}
