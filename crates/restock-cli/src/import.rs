//! `restock-cli import` — submit a file of product references and process
//! the job inline, printing progress and a final summary.

use std::path::Path;
use std::sync::Arc;

use rust_decimal::Decimal;

use restock_core::RawInputRecord;
use restock_enrich::EnrichmentClient;
use restock_pipeline::{
    run_job, submit_batch, BatchOptions, BudgetManager, PipelineConfig, StopHandle, SubmitError,
    SystemClock,
};
use restock_storefront::StorefrontClient;

/// Parses one input line into a [`RawInputRecord`].
///
/// Format: `reference[,title[,cost[,category]]]`. Empty cells become `None`;
/// an unparseable cost is dropped with a warning rather than rejecting the
/// line (the enrichment price still covers it). Returns `None` for blank
/// lines and `#` comments.
fn parse_line(line: &str) -> Option<RawInputRecord> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let mut cells = trimmed.splitn(4, ',').map(str::trim);
    let reference = cells.next()?.to_owned();
    if reference.is_empty() {
        return None;
    }

    let title = cells.next().filter(|c| !c.is_empty()).map(str::to_owned);
    let cost = cells.next().filter(|c| !c.is_empty()).and_then(|cell| {
        match cell.parse::<Decimal>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(cell, error = %e, "unparseable cost cell ignored");
                None
            }
        }
    });
    let category = cells.next().filter(|c| !c.is_empty()).map(str::to_owned);

    Some(RawInputRecord {
        reference,
        title,
        cost,
        category,
    })
}

pub(crate) async fn run_import(
    file: &Path,
    options: BatchOptions,
    push: bool,
) -> anyhow::Result<()> {
    let config = restock_core::load_app_config()?;

    let content = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", file.display()))?;
    let raw_inputs: Vec<RawInputRecord> = content.lines().filter_map(parse_line).collect();
    if raw_inputs.is_empty() {
        anyhow::bail!("{} contains no input lines", file.display());
    }

    let pool_config = restock_db::PoolConfig::from_app_config(&config);
    let pool = restock_db::connect_pool(&config.database_url, pool_config).await?;
    restock_db::run_migrations(&pool).await?;

    let pricing = match restock_core::load_competitors(&config.competitors_path) {
        Ok(file) => restock_core::PricingConfig {
            competitors: file.competitors,
            ..restock_core::PricingConfig::default()
        },
        Err(restock_core::ConfigError::CompetitorsFileIo { path, .. }) => {
            tracing::warn!(path, "competitors.yaml not readable — using built-in bands");
            restock_core::PricingConfig::default()
        }
        Err(e) => return Err(e.into()),
    };
    let pipeline = PipelineConfig {
        sub_batch_size: config.sub_batch_size,
        inter_batch_delay_ms: config.inter_batch_delay_ms,
        pricing,
    };

    let budget = BudgetManager::new(
        config.budget_daily_limit,
        config.budget_cost_per_identifier,
        Arc::new(SystemClock),
    );

    let enricher = EnrichmentClient::with_base_url(
        config.enrich_api_key.as_deref().unwrap_or_default(),
        config.enrich_timeout_secs,
        config.enrich_max_retries,
        config.enrich_backoff_base_ms,
        &config.enrich_base_url,
    )?;

    let pusher = if push {
        match (&config.storefront_base_url, &config.storefront_token) {
            (Some(base_url), Some(token)) => Some(StorefrontClient::new(
                base_url,
                token,
                config.storefront_timeout_secs,
                config.storefront_max_retries,
                config.storefront_backoff_base_ms,
            )?),
            _ => anyhow::bail!(
                "--push requires RESTOCK_STOREFRONT_BASE_URL and RESTOCK_STOREFRONT_TOKEN"
            ),
        }
    } else {
        None
    };

    let total_lines = raw_inputs.len();
    let (receipt, plan) = match submit_batch(
        &pool,
        &pool,
        &budget,
        raw_inputs,
        options,
        config.fuzzy_threshold,
        "cli",
    )
    .await
    {
        Ok(result) => result,
        Err(SubmitError::BudgetExceeded {
            required,
            remaining,
        }) => {
            anyhow::bail!(
                "budget exceeded: batch needs {required} tokens, {remaining} remain today — \
                 shrink the batch and retry"
            );
        }
        Err(e) => return Err(e.into()),
    };

    println!("job {}", receipt.job.public_id);
    println!(
        "  accepted {} of {total_lines} lines ({} rejected, {} duplicates)",
        receipt.accepted_count,
        receipt.rejected_inputs.len(),
        receipt.duplicates.len()
    );
    for rejected in &receipt.rejected_inputs {
        println!("  rejected: {} ({})", rejected.reference, rejected.reason);
    }
    for duplicate in &receipt.duplicates {
        match duplicate.similarity {
            Some(similarity) => println!(
                "  duplicate: {} ~ {} (fuzzy, {similarity:.2})",
                duplicate.identifier, duplicate.matched_identifier
            ),
            None => println!(
                "  duplicate: {} = {}",
                duplicate.identifier, duplicate.matched_identifier
            ),
        }
    }

    let summary = run_job(
        plan,
        &pipeline,
        &pool,
        &pool,
        &enricher,
        pusher.as_ref(),
        StopHandle::new(),
    )
    .await;

    println!(
        "{}: {} processed, {} succeeded, {} failed, {} skipped",
        summary.status, summary.processed, summary.succeeded, summary.failed, summary.skipped
    );
    let snapshot = budget.snapshot();
    println!(
        "budget: {}/{} tokens used today",
        snapshot.used, snapshot.limit
    );

    Ok(())
}
