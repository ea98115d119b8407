//! End-to-end pipeline tests against in-memory fakes of the collaborator
//! contracts. No network, no database: the fakes assert the counter
//! invariants on every write, so any double count or gap fails the test at
//! the exact item that caused it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use restock_core::dedup::NormalizedInput;
use restock_core::{
    CatalogEntry, Identifier, ItemErrorKind, ItemOutcome, JobStatus, ListingStatus, PricedListing,
    PushStatus, RawInputRecord,
};
use restock_enrich::{EnrichError, EnrichOptions, EnrichResponse, EnrichedRecord};
use restock_pipeline::{
    run_job, submit_batch, BatchOptions, BudgetManager, CatalogStore, EnrichmentProvider,
    JobHandle, JobPlan, JobStore, PipelineConfig, StopHandle, StoreError, StorefrontPusher,
    SubmitError, SystemClock,
};
use restock_storefront::{ProductPayload, PushReceipt, StorefrontError};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryCatalog {
    entries: Mutex<HashMap<Identifier, CatalogEntry>>,
    next_id: AtomicI64,
}

impl MemoryCatalog {
    fn entry(&self, identifier: &Identifier) -> Option<CatalogEntry> {
        self.entries.lock().unwrap().get(identifier).cloned()
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Seed an entry as if a previous import created it.
    fn seed(&self, identifier: &Identifier, title: &str) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = CatalogEntry {
            id,
            identifier: identifier.clone(),
            title: title.to_owned(),
            image_url: Some("https://img.example.com/seed.jpg".to_owned()),
            category: None,
            brand: None,
            cost_price: Decimal::new(500, 2),
            list_price: Decimal::new(850, 2),
            compare_at_price: None,
            competitor_prices: vec![],
            profit_amount: Decimal::new(350, 2),
            profit_percent: Decimal::new(7000, 2),
            profit_status: restock_core::ProfitStatus::Profitable,
            rating: None,
            review_count: None,
            is_available: true,
            status: ListingStatus::Active,
            storefront_product_id: None,
            storefront_variant_id: None,
            push_status: PushStatus::Pending,
            pushed_at: None,
            last_enriched_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.entries.lock().unwrap().insert(identifier.clone(), entry);
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn find_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<CatalogEntry>, StoreError> {
        Ok(self.entry(identifier))
    }

    async fn list_by_identifiers(
        &self,
        identifiers: &[Identifier],
    ) -> Result<Vec<CatalogEntry>, StoreError> {
        let entries = self.entries.lock().unwrap();
        Ok(identifiers
            .iter()
            .filter_map(|id| entries.get(id).cloned())
            .collect())
    }

    async fn list_titles(&self) -> Result<Vec<(Identifier, String)>, StoreError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .values()
            .map(|e| (e.identifier.clone(), e.title.clone()))
            .collect())
    }

    async fn upsert(&self, listing: &PricedListing) -> Result<CatalogEntry, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        let now = Utc::now();
        let entry = match entries.get(&listing.identifier) {
            Some(existing) => CatalogEntry {
                // Update path: identity, created_at, operator status, and
                // push bookkeeping survive; everything else refreshes.
                id: existing.id,
                identifier: existing.identifier.clone(),
                title: listing.title.clone(),
                image_url: listing.image_url.clone(),
                category: listing.category.clone(),
                brand: listing.brand.clone(),
                cost_price: listing.cost_price,
                list_price: listing.list_price,
                compare_at_price: Some(listing.compare_at_price),
                competitor_prices: listing.competitor_prices.clone(),
                profit_amount: listing.profit_amount,
                profit_percent: listing.profit_percent,
                profit_status: listing.profit_status,
                rating: listing.rating,
                review_count: listing.review_count,
                is_available: listing.is_available,
                status: existing.status,
                storefront_product_id: existing.storefront_product_id.clone(),
                storefront_variant_id: existing.storefront_variant_id.clone(),
                push_status: existing.push_status,
                pushed_at: existing.pushed_at,
                last_enriched_at: Some(now),
                created_at: existing.created_at,
                updated_at: now,
            },
            None => CatalogEntry {
                id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                identifier: listing.identifier.clone(),
                title: listing.title.clone(),
                image_url: listing.image_url.clone(),
                category: listing.category.clone(),
                brand: listing.brand.clone(),
                cost_price: listing.cost_price,
                list_price: listing.list_price,
                compare_at_price: Some(listing.compare_at_price),
                competitor_prices: listing.competitor_prices.clone(),
                profit_amount: listing.profit_amount,
                profit_percent: listing.profit_percent,
                profit_status: listing.profit_status,
                rating: listing.rating,
                review_count: listing.review_count,
                is_available: listing.is_available,
                status: listing.status,
                storefront_product_id: None,
                storefront_variant_id: None,
                push_status: PushStatus::Pending,
                pushed_at: None,
                last_enriched_at: Some(now),
                created_at: now,
                updated_at: now,
            },
        };
        entries.insert(listing.identifier.clone(), entry.clone());
        Ok(entry)
    }

    async fn set_push_state(
        &self,
        identifier: &Identifier,
        status: PushStatus,
        receipt: Option<&PushReceipt>,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .get_mut(identifier)
            .ok_or_else(|| StoreError("push state for unknown identifier".to_owned()))?;
        entry.push_status = status;
        if let Some(receipt) = receipt {
            entry.storefront_product_id = Some(receipt.external_id.clone());
            entry.storefront_variant_id = Some(receipt.variant_id.clone());
        }
        if status == PushStatus::Pushed {
            entry.pushed_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
struct JobState {
    status: Option<JobStatus>,
    total: u32,
    processed: u32,
    succeeded: u32,
    failed: u32,
    skipped: u32,
    errors: Vec<(Option<Identifier>, ItemErrorKind, String)>,
}

#[derive(Default)]
struct MemoryJobs {
    states: Mutex<HashMap<i64, JobState>>,
    next_id: AtomicI64,
}

impl MemoryJobs {
    fn state(&self, job: &JobHandle) -> JobState {
        self.states.lock().unwrap().get(&job.id).cloned().unwrap()
    }

    fn job_count(&self) -> usize {
        self.states.lock().unwrap().len()
    }
}

#[async_trait]
impl JobStore for MemoryJobs {
    async fn create(&self, total: u32, _trigger_source: &str) -> Result<JobHandle, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut states = self.states.lock().unwrap();
        states.insert(
            id,
            JobState {
                status: Some(JobStatus::Pending),
                total,
                ..JobState::default()
            },
        );
        Ok(JobHandle {
            id,
            public_id: Uuid::new_v4(),
        })
    }

    async fn start(&self, job: &JobHandle) -> Result<(), StoreError> {
        let mut states = self.states.lock().unwrap();
        let state = states.get_mut(&job.id).unwrap();
        assert_eq!(state.status, Some(JobStatus::Pending), "start from pending only");
        state.status = Some(JobStatus::Processing);
        Ok(())
    }

    async fn record_item(&self, job: &JobHandle, outcome: ItemOutcome) -> Result<(), StoreError> {
        let mut states = self.states.lock().unwrap();
        let state = states.get_mut(&job.id).unwrap();
        state.processed += 1;
        match outcome {
            ItemOutcome::Succeeded => state.succeeded += 1,
            ItemOutcome::Failed => state.failed += 1,
            ItemOutcome::Skipped => state.skipped += 1,
        }
        // The pipeline's core counter invariants, checked on every write.
        assert!(
            state.processed <= state.total,
            "processed {} exceeded total {}",
            state.processed,
            state.total
        );
        assert!(
            state.succeeded + state.failed + state.skipped == state.processed,
            "outcome counters diverged from processed"
        );
        Ok(())
    }

    async fn append_error(
        &self,
        job: &JobHandle,
        identifier: Option<&Identifier>,
        kind: ItemErrorKind,
        message: &str,
    ) -> Result<(), StoreError> {
        let mut states = self.states.lock().unwrap();
        let state = states.get_mut(&job.id).unwrap();
        state
            .errors
            .push((identifier.cloned(), kind, message.to_owned()));
        Ok(())
    }

    async fn complete(&self, job: &JobHandle) -> Result<(), StoreError> {
        let mut states = self.states.lock().unwrap();
        let state = states.get_mut(&job.id).unwrap();
        assert_eq!(state.status, Some(JobStatus::Processing));
        state.status = Some(JobStatus::Completed);
        Ok(())
    }

    async fn fail(&self, job: &JobHandle) -> Result<(), StoreError> {
        let mut states = self.states.lock().unwrap();
        states.get_mut(&job.id).unwrap().status = Some(JobStatus::Failed);
        Ok(())
    }

    async fn stop(&self, job: &JobHandle) -> Result<(), StoreError> {
        let mut states = self.states.lock().unwrap();
        states.get_mut(&job.id).unwrap().status = Some(JobStatus::Stopped);
        Ok(())
    }
}

/// Scripted enrichment provider: serves records from a map, optionally
/// failing every call, and logs the per-call identifier sets.
#[derive(Default)]
struct ScriptedEnricher {
    records: HashMap<Identifier, EnrichedRecord>,
    fail_every_call: Option<fn() -> EnrichError>,
    calls: Mutex<Vec<Vec<Identifier>>>,
}

impl ScriptedEnricher {
    fn with_records(ids: &[&str]) -> Self {
        let mut records = HashMap::new();
        for raw in ids {
            let identifier = Identifier::parse(raw).expect("test identifier");
            records.insert(identifier.clone(), record_for(&identifier));
        }
        Self {
            records,
            ..Self::default()
        }
    }

    fn call_log(&self) -> Vec<Vec<Identifier>> {
        self.calls.lock().unwrap().clone()
    }
}

fn record_for(identifier: &Identifier) -> EnrichedRecord {
    EnrichedRecord {
        identifier: identifier.clone(),
        title: Some(format!("Product {identifier}")),
        image_url: Some(format!("https://img.example.com/{identifier}.jpg")),
        price: Some(Decimal::new(1000, 2)),
        rating: Some(Decimal::new(45, 1)),
        review_count: Some(100),
        in_stock: true,
        category: Some("Electronics".to_owned()),
        brand: Some("Acme".to_owned()),
    }
}

#[async_trait]
impl EnrichmentProvider for ScriptedEnricher {
    async fn enrich(
        &self,
        identifiers: &[Identifier],
        _options: &EnrichOptions,
    ) -> Result<EnrichResponse, EnrichError> {
        self.calls.lock().unwrap().push(identifiers.to_vec());
        if let Some(make_err) = self.fail_every_call {
            return Err(make_err());
        }
        let records: Vec<EnrichedRecord> = identifiers
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect();
        let returned = u32::try_from(records.len()).unwrap();
        Ok(EnrichResponse {
            records,
            tokens_used: returned,
            tokens_saved: 0,
            from_cache: 0,
            from_api: returned,
        })
    }
}

/// Scripted storefront pusher: succeeds with canned receipts or always fails.
#[derive(Default)]
struct ScriptedPusher {
    fail: bool,
    pushes: Mutex<Vec<(Option<String>, String)>>,
}

#[async_trait]
impl StorefrontPusher for ScriptedPusher {
    async fn push(
        &self,
        external_id: Option<&str>,
        product: &ProductPayload,
    ) -> Result<PushReceipt, StorefrontError> {
        self.pushes
            .lock()
            .unwrap()
            .push((external_id.map(str::to_owned), product.identifier.to_string()));
        if self.fail {
            return Err(StorefrontError::RateLimited { retry_after_secs: 1 });
        }
        Ok(PushReceipt {
            external_id: format!("ext-{}", product.identifier),
            variant_id: format!("var-{}", product.identifier),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn id(raw: &str) -> Identifier {
    Identifier::parse(raw).expect("test identifier")
}

fn inputs(raw_ids: &[&str]) -> Vec<RawInputRecord> {
    raw_ids
        .iter()
        .map(|r| RawInputRecord::from_reference(*r))
        .collect()
}

async fn plan_for(jobs: &MemoryJobs, raw_ids: &[&str], options: BatchOptions) -> JobPlan {
    let items: Vec<NormalizedInput> = raw_ids
        .iter()
        .map(|raw| NormalizedInput {
            identifier: id(raw),
            record: RawInputRecord::from_reference(*raw),
        })
        .collect();
    let total = u32::try_from(items.len()).unwrap();
    let job = jobs.create(total, "test").await.unwrap();
    JobPlan {
        job,
        items,
        options,
        seed: 42,
    }
}

fn budget(limit: u32) -> BudgetManager {
    BudgetManager::new(limit, 1, Arc::new(SystemClock))
}

const NO_PUSHER: Option<&ScriptedPusher> = None;

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        inter_batch_delay_ms: 0,
        ..PipelineConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Orchestrator behavior
// ---------------------------------------------------------------------------

#[tokio::test]
async fn happy_path_processes_every_item() {
    let catalog = MemoryCatalog::default();
    let jobs = MemoryJobs::default();
    let enricher = ScriptedEnricher::with_records(&["B000000001", "B000000002", "B000000003"]);
    let plan = plan_for(
        &jobs,
        &["B000000001", "B000000002", "B000000003"],
        BatchOptions::default(),
    )
    .await;
    let job = plan.job;

    let summary = run_job(
        plan,
        &fast_config(),
        &catalog,
        &jobs,
        &enricher,
        NO_PUSHER,
        StopHandle::new(),
    )
    .await;

    assert_eq!(summary.status, JobStatus::Completed);
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(catalog.len(), 3);

    let state = jobs.state(&job);
    assert_eq!(state.status, Some(JobStatus::Completed));
    assert_eq!(state.processed, 3);
    assert!(state.errors.is_empty());
}

#[tokio::test]
async fn sub_batches_run_in_submission_order() {
    let catalog = MemoryCatalog::default();
    let jobs = MemoryJobs::default();
    let raw = ["B000000001", "B000000002", "B000000003", "B000000004", "B000000005"];
    let enricher = ScriptedEnricher::with_records(&raw);
    let plan = plan_for(&jobs, &raw, BatchOptions::default()).await;

    let config = PipelineConfig {
        sub_batch_size: 2,
        inter_batch_delay_ms: 0,
        ..PipelineConfig::default()
    };
    let summary = run_job(
        plan,
        &config,
        &catalog,
        &jobs,
        &enricher,
        NO_PUSHER,
        StopHandle::new(),
    )
    .await;

    assert_eq!(summary.succeeded, 5);
    let calls = enricher.call_log();
    assert_eq!(calls.len(), 3, "5 items at sub-batch size 2 → 3 calls");
    assert_eq!(calls[0], vec![id("B000000001"), id("B000000002")]);
    assert_eq!(calls[1], vec![id("B000000003"), id("B000000004")]);
    assert_eq!(calls[2], vec![id("B000000005")]);
}

#[tokio::test]
async fn enrichment_miss_is_item_scoped() {
    let catalog = MemoryCatalog::default();
    let jobs = MemoryJobs::default();
    // Only two of three identifiers have data.
    let enricher = ScriptedEnricher::with_records(&["B000000001", "B000000003"]);
    let plan = plan_for(
        &jobs,
        &["B000000001", "B000000002", "B000000003"],
        BatchOptions::default(),
    )
    .await;
    let job = plan.job;

    let summary = run_job(
        plan,
        &fast_config(),
        &catalog,
        &jobs,
        &enricher,
        NO_PUSHER,
        StopHandle::new(),
    )
    .await;

    assert_eq!(summary.status, JobStatus::Completed, "misses don't fail the job");
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);

    let state = jobs.state(&job);
    assert_eq!(state.errors.len(), 1);
    let (identifier, kind, _) = &state.errors[0];
    assert_eq!(identifier.as_ref(), Some(&id("B000000002")));
    assert_eq!(*kind, ItemErrorKind::EnrichmentMiss);
}

#[tokio::test]
async fn validation_failure_is_item_scoped() {
    let catalog = MemoryCatalog::default();
    let jobs = MemoryJobs::default();
    let mut enricher = ScriptedEnricher::with_records(&["B000000001", "B000000002"]);
    // Strip the image from one record; it must fail validation, not the job.
    enricher
        .records
        .get_mut(&id("B000000002"))
        .unwrap()
        .image_url = None;

    let plan = plan_for(&jobs, &["B000000001", "B000000002"], BatchOptions::default()).await;
    let job = plan.job;

    let summary = run_job(
        plan,
        &fast_config(),
        &catalog,
        &jobs,
        &enricher,
        NO_PUSHER,
        StopHandle::new(),
    )
    .await;

    assert_eq!(summary.status, JobStatus::Completed);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(catalog.len(), 1, "invalid record must not reach the catalog");

    let state = jobs.state(&job);
    let (_, kind, message) = &state.errors[0];
    assert_eq!(*kind, ItemErrorKind::Validation);
    assert!(message.contains("image"), "message was: {message}");
}

#[tokio::test]
async fn skip_existing_skips_without_enriching() {
    let catalog = MemoryCatalog::default();
    catalog.seed(&id("B000000001"), "Already Here");
    let jobs = MemoryJobs::default();
    let enricher = ScriptedEnricher::with_records(&["B000000001", "B000000002"]);

    let plan = plan_for(
        &jobs,
        &["B000000001", "B000000002"],
        BatchOptions {
            skip_existing: true,
            ..BatchOptions::default()
        },
    )
    .await;

    let summary = run_job(
        plan,
        &fast_config(),
        &catalog,
        &jobs,
        &enricher,
        NO_PUSHER,
        StopHandle::new(),
    )
    .await;

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.processed, 2);

    // The skipped identifier never reached the enrichment provider.
    let calls = enricher.call_log();
    assert_eq!(calls, vec![vec![id("B000000002")]]);
    // And its catalog entry was not touched.
    assert_eq!(catalog.entry(&id("B000000001")).unwrap().title, "Already Here");
}

#[tokio::test]
async fn stop_before_start_cancels_cleanly() {
    let catalog = MemoryCatalog::default();
    let jobs = MemoryJobs::default();
    let enricher = ScriptedEnricher::with_records(&["B000000001"]);
    let plan = plan_for(&jobs, &["B000000001"], BatchOptions::default()).await;
    let job = plan.job;

    let stop = StopHandle::new();
    stop.stop();
    let summary = run_job(
        plan,
        &fast_config(),
        &catalog,
        &jobs,
        &enricher,
        NO_PUSHER,
        stop,
    )
    .await;

    assert_eq!(summary.status, JobStatus::Stopped);
    assert_eq!(summary.processed, 0);

    let state = jobs.state(&job);
    assert_eq!(state.status, Some(JobStatus::Stopped));
    let (_, kind, _) = &state.errors[0];
    assert_eq!(*kind, ItemErrorKind::Cancelled);
    assert!(enricher.call_log().is_empty(), "no work after stop");
}

#[tokio::test]
async fn rerun_of_same_batch_is_idempotent() {
    let catalog = MemoryCatalog::default();
    let jobs = MemoryJobs::default();
    let enricher = ScriptedEnricher::with_records(&["B000000001", "B000000002"]);

    for _ in 0..2 {
        let plan = plan_for(&jobs, &["B000000001", "B000000002"], BatchOptions::default()).await;
        let summary = run_job(
            plan,
            &fast_config(),
            &catalog,
            &jobs,
            &enricher,
            NO_PUSHER,
            StopHandle::new(),
        )
        .await;
        assert_eq!(summary.succeeded, 2);
    }

    // Same identifiers reconciled twice → still one row each.
    assert_eq!(catalog.len(), 2);
}

#[tokio::test]
async fn quota_exhaustion_fails_the_job_with_system_error() {
    let catalog = MemoryCatalog::default();
    let jobs = MemoryJobs::default();
    let enricher = ScriptedEnricher {
        fail_every_call: Some(|| EnrichError::QuotaExceeded("daily quota exhausted".to_owned())),
        ..ScriptedEnricher::default()
    };
    let plan = plan_for(&jobs, &["B000000001"], BatchOptions::default()).await;
    let job = plan.job;

    let summary = run_job(
        plan,
        &fast_config(),
        &catalog,
        &jobs,
        &enricher,
        NO_PUSHER,
        StopHandle::new(),
    )
    .await;

    assert_eq!(summary.status, JobStatus::Failed);
    let state = jobs.state(&job);
    assert_eq!(state.status, Some(JobStatus::Failed));
    let (identifier, kind, message) = &state.errors[0];
    assert!(identifier.is_none(), "system errors are job-scoped");
    assert_eq!(*kind, ItemErrorKind::System);
    assert!(message.contains("quota"), "message was: {message}");
}

#[tokio::test]
async fn rate_limited_sub_batch_fails_items_but_not_job() {
    let catalog = MemoryCatalog::default();
    let jobs = MemoryJobs::default();
    let enricher = ScriptedEnricher {
        fail_every_call: Some(|| EnrichError::RateLimited { retry_after_secs: 1 }),
        ..ScriptedEnricher::default()
    };
    let plan = plan_for(&jobs, &["B000000001", "B000000002"], BatchOptions::default()).await;
    let job = plan.job;

    let summary = run_job(
        plan,
        &fast_config(),
        &catalog,
        &jobs,
        &enricher,
        NO_PUSHER,
        StopHandle::new(),
    )
    .await;

    assert_eq!(summary.status, JobStatus::Completed);
    assert_eq!(summary.failed, 2);

    let state = jobs.state(&job);
    assert_eq!(state.errors.len(), 2);
    assert!(state
        .errors
        .iter()
        .all(|(_, kind, _)| *kind == ItemErrorKind::RateLimited));
}

// ---------------------------------------------------------------------------
// Storefront push behavior
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_push_records_receipt() {
    let catalog = MemoryCatalog::default();
    let jobs = MemoryJobs::default();
    let enricher = ScriptedEnricher::with_records(&["B000000001"]);
    let pusher = ScriptedPusher::default();
    let plan = plan_for(&jobs, &["B000000001"], BatchOptions::default()).await;

    let summary = run_job(
        plan,
        &fast_config(),
        &catalog,
        &jobs,
        &enricher,
        Some(&pusher),
        StopHandle::new(),
    )
    .await;

    assert_eq!(summary.succeeded, 1);
    let entry = catalog.entry(&id("B000000001")).unwrap();
    assert_eq!(entry.push_status, PushStatus::Pushed);
    assert_eq!(entry.storefront_product_id.as_deref(), Some("ext-B000000001"));
    assert!(entry.pushed_at.is_some());
}

#[tokio::test]
async fn push_failure_keeps_catalog_write_and_item_success() {
    let catalog = MemoryCatalog::default();
    let jobs = MemoryJobs::default();
    let enricher = ScriptedEnricher::with_records(&["B000000001"]);
    let pusher = ScriptedPusher {
        fail: true,
        ..ScriptedPusher::default()
    };
    let plan = plan_for(&jobs, &["B000000001"], BatchOptions::default()).await;
    let job = plan.job;

    let summary = run_job(
        plan,
        &fast_config(),
        &catalog,
        &jobs,
        &enricher,
        Some(&pusher),
        StopHandle::new(),
    )
    .await;

    // The item still succeeds; only the push state records the failure.
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);
    let entry = catalog.entry(&id("B000000001")).unwrap();
    assert_eq!(entry.push_status, PushStatus::Failed);
    assert!(jobs.state(&job).errors.is_empty());
}

// ---------------------------------------------------------------------------
// Submission: normalize → dedup → budget gate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_batch_rejects_malformed_and_dedups() {
    let catalog = MemoryCatalog::default();
    let jobs = MemoryJobs::default();
    let budget = budget(100);

    let raw = inputs(&[
        "B000000001",
        "http://x/dp/B000000001", // exact duplicate of the first, via URL
        "not-a-product",
        "B000000002",
    ]);
    let (receipt, plan) = submit_batch(
        &catalog,
        &jobs,
        &budget,
        raw,
        BatchOptions::default(),
        0.85,
        "test",
    )
    .await
    .expect("submission should succeed");

    assert_eq!(receipt.accepted_count, 2);
    assert_eq!(receipt.rejected_inputs.len(), 1);
    assert_eq!(receipt.rejected_inputs[0].reference, "not-a-product");
    assert_eq!(receipt.duplicates.len(), 1);
    assert_eq!(plan.items.len(), 2);

    // Two unique identifiers → two tokens reserved.
    assert_eq!(budget.snapshot().used, 2);
}

#[tokio::test]
async fn submit_batch_over_budget_creates_no_job_and_consumes_nothing() {
    let catalog = MemoryCatalog::default();
    let jobs = MemoryJobs::default();
    let budget = budget(1);

    let raw = inputs(&["B000000001", "B000000002", "B000000003"]);
    let err = submit_batch(
        &catalog,
        &jobs,
        &budget,
        raw,
        BatchOptions::default(),
        0.85,
        "test",
    )
    .await
    .unwrap_err();

    assert!(
        matches!(
            err,
            SubmitError::BudgetExceeded {
                required: 3,
                remaining: 1
            }
        ),
        "got: {err:?}"
    );
    assert_eq!(jobs.job_count(), 0, "no job may exist after a budget rejection");
    assert_eq!(budget.snapshot().used, 0, "no tokens may be consumed");
}

#[tokio::test]
async fn submit_batch_with_only_garbage_is_empty() {
    let catalog = MemoryCatalog::default();
    let jobs = MemoryJobs::default();
    let budget = budget(10);

    let err = submit_batch(
        &catalog,
        &jobs,
        &budget,
        inputs(&["nope", "also nope"]),
        BatchOptions::default(),
        0.85,
        "test",
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SubmitError::EmptyBatch));
    assert_eq!(jobs.job_count(), 0);
}

#[tokio::test]
async fn submit_batch_fuzzy_dedup_flags_catalog_title_match() {
    let catalog = MemoryCatalog::default();
    catalog.seed(&id("B000000009"), "Wireless Charger 2-Pack");
    let jobs = MemoryJobs::default();
    let budget = budget(10);

    let mut record = RawInputRecord::from_reference("B000000001");
    record.title = Some("wireless charger 2 pack".to_owned());

    let (receipt, _plan) = submit_batch(
        &catalog,
        &jobs,
        &budget,
        vec![record, RawInputRecord::from_reference("B000000002")],
        BatchOptions {
            fuzzy_dedup: true,
            ..BatchOptions::default()
        },
        0.85,
        "test",
    )
    .await
    .expect("submission should succeed");

    assert_eq!(receipt.accepted_count, 1);
    assert_eq!(receipt.duplicates.len(), 1);
    assert_eq!(receipt.duplicates[0].matched_identifier, id("B000000009"));
    assert!(receipt.duplicates[0].similarity.is_some());
}

#[tokio::test]
async fn submitted_plan_runs_end_to_end() {
    let catalog = MemoryCatalog::default();
    let jobs = MemoryJobs::default();
    let budget = budget(10);
    let enricher = ScriptedEnricher::with_records(&["B000000001", "B000000002"]);

    let (receipt, plan) = submit_batch(
        &catalog,
        &jobs,
        &budget,
        inputs(&["B000000001", "B000000002"]),
        BatchOptions::default(),
        0.85,
        "test",
    )
    .await
    .expect("submission should succeed");

    let summary = run_job(
        plan,
        &fast_config(),
        &catalog,
        &jobs,
        &enricher,
        NO_PUSHER,
        StopHandle::new(),
    )
    .await;

    assert_eq!(summary.status, JobStatus::Completed);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(jobs.state(&receipt.job).total, 2);
    assert_eq!(catalog.len(), 2);
}
