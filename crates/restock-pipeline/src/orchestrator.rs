//! The batch job orchestrator: drives a [`JobPlan`] through enrichment,
//! pricing, and reconciliation in bounded sub-batches.
//!
//! Contract points:
//! - sub-batches run in submission order; catalog membership is checked
//!   once per sub-batch, not per item;
//! - counters and error rows are written after every single item so a
//!   poller observes monotonic progress;
//! - a pause between sub-batches paces the downstream providers;
//! - the stop flag is checked between sub-batches; cooperative, never
//!   preemptive, and already-applied writes stay applied;
//! - one item's failure never aborts its sub-batch; store faults and
//!   provider quota exhaustion abort the job with a synthetic `system`
//!   error row.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use restock_core::dedup::NormalizedInput;
use restock_core::pricing::PricingConfig;
use restock_core::{Identifier, ItemErrorKind, ItemOutcome, JobStatus};
use restock_enrich::{EnrichError, EnrichOptions, EnrichedRecord};

use crate::error::{ItemFailure, PipelineError};
use crate::intake::JobPlan;
use crate::reconcile::{reconcile_item, ReconcileError};
use crate::traits::{CatalogStore, EnrichmentProvider, JobStore, StorefrontPusher};

/// Orchestrator tunables. Defaults: sub-batches of 10, 500 ms between them.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sub_batch_size: usize,
    pub inter_batch_delay_ms: u64,
    pub pricing: PricingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sub_batch_size: 10,
            inter_batch_delay_ms: 500,
            pricing: PricingConfig::default(),
        }
    }
}

/// Cooperative cancellation flag, cloneable across tasks. Requesting a stop
/// never unwinds completed writes.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Final tally for a run, mirroring the persisted counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSummary {
    pub status: JobStatus,
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
}

/// Runs a job to completion (or stop/failure).
///
/// Never returns an error: item-scoped problems are recorded on the job and
/// processing continues; job-scoped faults mark the job `failed` with a
/// synthetic `system` error row, best effort.
pub async fn run_job<C, J, E, P>(
    plan: JobPlan,
    config: &PipelineConfig,
    catalog: &C,
    jobs: &J,
    enricher: &E,
    pusher: Option<&P>,
    stop: StopHandle,
) -> JobSummary
where
    C: CatalogStore,
    J: JobStore,
    E: EnrichmentProvider,
    P: StorefrontPusher,
{
    let job = plan.job;
    let mut summary = JobSummary {
        status: JobStatus::Processing,
        processed: 0,
        succeeded: 0,
        failed: 0,
        skipped: 0,
    };

    match process_job(&plan, config, catalog, jobs, enricher, pusher, &stop, &mut summary).await {
        Ok(final_status) => {
            summary.status = final_status;
        }
        Err(e) => {
            tracing::error!(job_id = %job.public_id, error = %e, "import job failed");
            fail_job_best_effort(jobs, &job, &e.to_string()).await;
            summary.status = JobStatus::Failed;
        }
    }

    tracing::info!(
        job_id = %job.public_id,
        status = %summary.status,
        processed = summary.processed,
        succeeded = summary.succeeded,
        failed = summary.failed,
        skipped = summary.skipped,
        "import job finished"
    );

    summary
}

/// The processing loop proper. Returns the terminal status on the happy and
/// stopped paths; store/quota faults bubble as [`PipelineError`].
#[allow(clippy::too_many_arguments)]
async fn process_job<C, J, E, P>(
    plan: &JobPlan,
    config: &PipelineConfig,
    catalog: &C,
    jobs: &J,
    enricher: &E,
    pusher: Option<&P>,
    stop: &StopHandle,
    summary: &mut JobSummary,
) -> Result<JobStatus, PipelineError>
where
    C: CatalogStore,
    J: JobStore,
    E: EnrichmentProvider,
    P: StorefrontPusher,
{
    let job = &plan.job;
    jobs.start(job).await?;

    let sub_batch_size = config.sub_batch_size.max(1);
    let enrich_options = EnrichOptions {
        skip_cache: plan.options.skip_cache,
    };
    let mut pricing = config.pricing.clone();
    if let Some(percent) = plan.options.markup_percent {
        pricing = pricing.with_markup_percent(percent);
    }

    let mut first_batch = true;
    for chunk in plan.items.chunks(sub_batch_size) {
        if stop.is_stopped() {
            jobs.append_error(
                job,
                None,
                ItemErrorKind::Cancelled,
                "stop requested — remaining items were not processed",
            )
            .await?;
            jobs.stop(job).await?;
            return Ok(JobStatus::Stopped);
        }

        // Mandatory pacing; downstream rate limits assume it.
        if !first_batch && config.inter_batch_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.inter_batch_delay_ms)).await;
        }
        first_batch = false;

        let chunk_ids: Vec<Identifier> = chunk.iter().map(|i| i.identifier.clone()).collect();
        let existing: HashSet<Identifier> = catalog
            .list_by_identifiers(&chunk_ids)
            .await?
            .into_iter()
            .map(|entry| entry.identifier)
            .collect();

        let mut to_enrich: Vec<&NormalizedInput> = Vec::with_capacity(chunk.len());
        for item in chunk {
            if plan.options.skip_existing && existing.contains(&item.identifier) {
                jobs.record_item(job, ItemOutcome::Skipped).await?;
                summary.processed += 1;
                summary.skipped += 1;
            } else {
                to_enrich.push(item);
            }
        }

        if to_enrich.is_empty() {
            continue;
        }

        let enrich_ids: Vec<Identifier> =
            to_enrich.iter().map(|i| i.identifier.clone()).collect();

        match enricher.enrich(&enrich_ids, &enrich_options).await {
            Ok(response) => {
                tracing::debug!(
                    job_id = %job.public_id,
                    requested = enrich_ids.len(),
                    returned = response.records.len(),
                    tokens_used = response.tokens_used,
                    tokens_saved = response.tokens_saved,
                    from_cache = response.from_cache,
                    from_api = response.from_api,
                    "enrichment sub-batch returned"
                );

                let by_id: HashMap<&Identifier, &EnrichedRecord> = response
                    .records
                    .iter()
                    .map(|r| (&r.identifier, r))
                    .collect();

                for item in to_enrich {
                    let outcome = match by_id.get(&item.identifier) {
                        None => Err(ItemFailure {
                            identifier: item.identifier.clone(),
                            kind: ItemErrorKind::EnrichmentMiss,
                            message: "no enrichment data returned for identifier".to_owned(),
                        }),
                        Some(record) => {
                            let exists = existing.contains(&item.identifier);
                            match reconcile_item(
                                catalog, pusher, &pricing, item, record, exists, plan.seed,
                            )
                            .await
                            {
                                Ok(_) => Ok(()),
                                Err(ReconcileError::Item(failure)) => Err(failure),
                                Err(ReconcileError::Store(e)) => return Err(e.into()),
                            }
                        }
                    };

                    record_outcome(jobs, job, summary, &item.identifier, outcome).await?;
                }
            }
            Err(EnrichError::QuotaExceeded(message)) => {
                return Err(PipelineError::QuotaExceeded(message));
            }
            Err(e) => {
                // The whole sub-batch call failed after the client's bounded
                // retries. Each item is recorded individually and later
                // sub-batches still run.
                let kind = match &e {
                    EnrichError::RateLimited { .. } => ItemErrorKind::RateLimited,
                    _ => ItemErrorKind::EnrichmentMiss,
                };
                tracing::warn!(
                    job_id = %job.public_id,
                    error = %e,
                    items = to_enrich.len(),
                    "enrichment sub-batch failed — recording per-item failures"
                );
                for item in to_enrich {
                    let failure = ItemFailure {
                        identifier: item.identifier.clone(),
                        kind,
                        message: format!("enrichment request failed: {e}"),
                    };
                    record_outcome(jobs, job, summary, &item.identifier, Err(failure)).await?;
                }
            }
        }
    }

    jobs.complete(job).await?;
    Ok(JobStatus::Completed)
}

/// Persists one item's outcome — counter first, then the error row for
/// failures — and mirrors it into the in-memory summary.
async fn record_outcome<J: JobStore>(
    jobs: &J,
    job: &crate::traits::JobHandle,
    summary: &mut JobSummary,
    identifier: &Identifier,
    outcome: Result<(), ItemFailure>,
) -> Result<(), PipelineError> {
    match outcome {
        Ok(()) => {
            jobs.record_item(job, ItemOutcome::Succeeded).await?;
            summary.processed += 1;
            summary.succeeded += 1;
        }
        Err(failure) => {
            jobs.record_item(job, ItemOutcome::Failed).await?;
            jobs.append_error(job, Some(identifier), failure.kind, &failure.message)
                .await?;
            summary.processed += 1;
            summary.failed += 1;
            tracing::debug!(
                identifier = %identifier,
                kind = %failure.kind,
                message = %failure.message,
                "item failed"
            );
        }
    }
    Ok(())
}

/// Marks the job failed and appends the synthetic `system` error row,
/// swallowing secondary store errors (there is nowhere left to report them
/// but the log).
async fn fail_job_best_effort<J: JobStore>(
    jobs: &J,
    job: &crate::traits::JobHandle,
    message: &str,
) {
    if let Err(e) = jobs.append_error(job, None, ItemErrorKind::System, message).await {
        tracing::error!(job_id = %job.public_id, error = %e, "failed to append system error row");
    }
    if let Err(e) = jobs.fail(job).await {
        tracing::error!(job_id = %job.public_id, error = %e, "failed to mark job as failed");
    }
}
