//! Batch driver
//!
//! Per-entity flow: acquire a session through the rotation controller
//! (logging credentials in as needed), fetch the entity's listing,
//! insert the batch, then apply the mandatory randomized inter-entity
//! delay. Rate-limit and token-expiry failures rotate the credential and
//! retry the same entity a bounded number of times; unclassified
//! failures are logged and the run moves on. Only pool exhaustion halts
//! the run, and always behind a final checkpoint.

use crate::account::{PoolError, RotationController};
use crate::auth::{Session, SessionEstablisher};
use crate::batch::entities::Entity;
use crate::batch::progress::{Checkpoint, CheckpointStore, ErrorLog, PauseFlag};
use crate::config::BatchConfig;
use crate::fetch::{DocumentFetcher, FetchErrorKind};
use crate::storage::DocumentStore;
use crate::{HarvestError, Result};
use chrono::Utc;
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Run-level switches from the CLI
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Index of the first entity to process
    pub start: usize,
    /// Cap on entities processed this run
    pub max: Option<usize>,
    /// Continue from the last checkpoint
    pub resume: bool,
    /// Re-harvest entities that already have stored documents
    pub force: bool,
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub inserted: u64,
}

enum EntityOutcome {
    Inserted(usize),
    NothingNew,
    Failed { error_type: &'static str, message: String },
}

/// Drives the whole harvest loop
pub struct BatchDriver {
    fetcher: DocumentFetcher,
    store: DocumentStore,
    pool: RotationController,
    establisher: Box<dyn SessionEstablisher>,
    checkpoints: CheckpointStore,
    errors: ErrorLog,
    pause: PauseFlag,
    batch: BatchConfig,
    config_hash: String,
    interrupt: Arc<AtomicBool>,
    current_handle: Option<String>,
}

impl BatchDriver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fetcher: DocumentFetcher,
        store: DocumentStore,
        pool: RotationController,
        establisher: Box<dyn SessionEstablisher>,
        checkpoints: CheckpointStore,
        errors: ErrorLog,
        pause: PauseFlag,
        batch: BatchConfig,
        config_hash: String,
        interrupt: Arc<AtomicBool>,
    ) -> Self {
        Self {
            fetcher,
            store,
            pool,
            establisher,
            checkpoints,
            errors,
            pause,
            batch,
            config_hash,
            interrupt,
            current_handle: None,
        }
    }

    /// Processes the entity list and returns the run counters
    pub async fn run(&mut self, entities: &[Entity], options: &BatchOptions) -> Result<BatchStats> {
        let started = Instant::now();
        let mut stats = BatchStats::default();
        let mut start = options.start;
        let mut processed_entities: HashSet<String> = HashSet::new();

        if options.resume {
            match self.checkpoints.load()? {
                Some(checkpoint) => {
                    if checkpoint.config_hash != self.config_hash {
                        tracing::warn!(
                            "Resuming against a different configuration (checkpoint hash {})",
                            checkpoint.config_hash
                        );
                    }
                    start = checkpoint.offset;
                    stats.processed = checkpoint.processed;
                    stats.succeeded = checkpoint.succeeded;
                    stats.failed = checkpoint.failed;
                    processed_entities = checkpoint.processed_entities.into_iter().collect();
                    tracing::info!(offset = start, "Resuming from checkpoint");
                }
                None => tracing::warn!("--resume requested but no checkpoint exists"),
            }
        }
        // The flag this process writes on interrupt is only stale when the
        // operator explicitly resumes; a flag present on a fresh start is a
        // standing halt request and is honored by the loop below.
        if self.pause.is_set() {
            if options.resume {
                tracing::info!(
                    path = %self.pause.path().display(),
                    "Clearing pause flag left by the interrupted run"
                );
                if let Err(e) = self.pause.clear() {
                    tracing::warn!("Failed to clear pause flag: {}", e);
                }
            } else {
                tracing::warn!(
                    path = %self.pause.path().display(),
                    "Pause flag present at startup; halting before the first entity"
                );
            }
        }

        let skip_existing: HashSet<String> = if options.force {
            HashSet::new()
        } else {
            self.store.existing_entities()?
        };

        let total = entities.len();
        let mut offset = start;
        let mut since_checkpoint = 0usize;
        let mut processed_this_run = 0usize;
        let mut interrupted = false;

        for (index, entity) in entities.iter().enumerate().skip(start) {
            offset = index;

            if self.interrupt.load(Ordering::SeqCst) {
                tracing::info!("Interrupt received, halting");
                if let Err(e) = self.pause.set() {
                    tracing::warn!("Failed to write pause flag: {}", e);
                }
                interrupted = true;
                break;
            }
            if self.pause.is_set() {
                tracing::info!(path = %self.pause.path().display(), "Pause flag present, halting");
                interrupted = true;
                break;
            }
            if let Some(max) = options.max {
                if processed_this_run >= max {
                    tracing::info!(max, "Entity cap reached");
                    break;
                }
            }

            if processed_entities.contains(&entity.short_name) {
                offset = index + 1;
                continue;
            }
            if skip_existing.contains(&entity.short_name) {
                tracing::info!(entity = %entity.short_name, "Already harvested, skipping");
                offset = index + 1;
                continue;
            }
            if options.force {
                let deleted = self.store.delete_for_entity(&entity.short_name)?;
                if deleted > 0 {
                    tracing::info!(entity = %entity.short_name, deleted, "Cleared for re-harvest");
                }
            }

            tracing::info!(
                entity = %entity.short_name,
                position = index + 1,
                total,
                "Processing entity"
            );

            let outcome = match self.process_entity(entity).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Pool exhaustion (or a database fault) halts the run;
                    // the checkpoint keeps it resumable.
                    self.errors
                        .record(&entity.short_name, "RUN_HALTED", &e.to_string());
                    self.save_checkpoint(offset, total, &stats, &processed_entities);
                    return Err(e);
                }
            };

            match outcome {
                EntityOutcome::Inserted(count) => {
                    stats.succeeded += 1;
                    stats.inserted += count as u64;
                    tracing::info!(entity = %entity.short_name, inserted = count, "Entity complete");
                }
                EntityOutcome::NothingNew => {
                    stats.failed += 1;
                    self.errors.record(
                        &entity.short_name,
                        "NO_NEW_DOCUMENTS",
                        "fetch returned no newly inserted documents",
                    );
                }
                EntityOutcome::Failed {
                    error_type,
                    message,
                } => {
                    stats.failed += 1;
                    self.errors.record(&entity.short_name, error_type, &message);
                }
            }

            stats.processed += 1;
            processed_entities.insert(entity.short_name.clone());
            processed_this_run += 1;
            since_checkpoint += 1;
            offset = index + 1;

            if since_checkpoint >= self.batch.checkpoint_interval {
                self.save_checkpoint(offset, total, &stats, &processed_entities);
                since_checkpoint = 0;
            }
            if processed_this_run % 10 == 0 {
                self.log_progress(&stats, started);
            }

            self.entity_delay().await;
        }

        self.save_checkpoint(offset, total, &stats, &processed_entities);
        if let Err(e) = self.errors.flush() {
            tracing::warn!("Failed to flush error log: {}", e);
        }
        if !interrupted {
            if let Err(e) = self.pause.clear() {
                tracing::warn!("Failed to clear pause flag: {}", e);
            }
        }
        self.log_progress(&stats, started);
        Ok(stats)
    }

    /// Handles one entity, rotating credentials on recoverable failures
    async fn process_entity(&mut self, entity: &Entity) -> Result<EntityOutcome> {
        let mut last_message = String::new();

        for attempt in 1..=self.batch.entity_retry_attempts {
            let session = self.acquire_session().await?;

            match self
                .fetcher
                .fetch_documents(&session, entity.code(), &entity.short_name)
                .await
            {
                Ok(documents) => {
                    let inserted = self.store.insert_batch(&documents)?;
                    let quota_reached = self.pool.record_use(&session.handle)?;
                    if quota_reached {
                        self.current_handle =
                            Some(self.pool.report_quota_reached(&session.handle)?);
                    }
                    return if inserted > 0 {
                        Ok(EntityOutcome::Inserted(inserted))
                    } else {
                        Ok(EntityOutcome::NothingNew)
                    };
                }
                Err(e) if e.kind == FetchErrorKind::RateLimited => {
                    last_message = e.message;
                    self.current_handle = Some(self.pool.report_rate_limited(&session.handle)?);
                }
                Err(e) if e.kind == FetchErrorKind::TokenExpired => {
                    last_message = e.message;
                    self.current_handle = Some(self.pool.report_token_expired(&session.handle)?);
                }
                Err(e) => {
                    // Unclassified failure: soft, recorded, run continues
                    return Ok(EntityOutcome::Failed {
                        error_type: "FETCH_FAILED",
                        message: e.to_string(),
                    });
                }
            }
            tracing::warn!(
                entity = %entity.short_name,
                attempt,
                "Rotated credential, retrying entity"
            );
        }

        Ok(EntityOutcome::Failed {
            error_type: "RETRIES_EXHAUSTED",
            message: format!(
                "gave up after {} rotations: {}",
                self.batch.entity_retry_attempts, last_message
            ),
        })
    }

    /// Returns a usable session, establishing logins (and demoting
    /// credentials that fail to log in) until one works or the pool is
    /// exhausted
    async fn acquire_session(&mut self) -> Result<Session> {
        loop {
            let handle = match self.current_handle.clone() {
                Some(handle) => handle,
                None => self.pool.select()?,
            };

            let (needs_login, secret) = {
                let record = self.record(&handle)?;
                (!record.is_logged_in || record.token.is_empty(), record.secret.clone())
            };

            if needs_login {
                match self.establisher.establish(&handle, secret.as_deref()).await {
                    Ok(artifacts) => self.pool.apply_artifacts(&handle, artifacts)?,
                    Err(e) => {
                        tracing::warn!(handle = %handle, "Login failed: {}", e);
                        self.current_handle = Some(self.pool.report_login_failed(&handle)?);
                        continue;
                    }
                }
            }

            let built = Session::from_record(self.record(&handle)?);
            match built {
                Ok(session) => {
                    self.current_handle = Some(handle);
                    return Ok(session);
                }
                Err(e) => {
                    tracing::warn!(handle = %handle, "Unusable session artifacts: {}", e);
                    self.current_handle = Some(self.pool.report_login_failed(&handle)?);
                }
            }
        }
    }

    fn record(&self, handle: &str) -> Result<&crate::account::CredentialRecord> {
        self.pool
            .credential(handle)
            .ok_or_else(|| HarvestError::Pool(PoolError::UnknownHandle(handle.to_string())))
    }

    fn save_checkpoint(
        &self,
        offset: usize,
        total: usize,
        stats: &BatchStats,
        processed_entities: &HashSet<String>,
    ) {
        let mut names: Vec<String> = processed_entities.iter().cloned().collect();
        names.sort();
        let checkpoint = Checkpoint {
            offset,
            total,
            processed: stats.processed,
            succeeded: stats.succeeded,
            failed: stats.failed,
            processed_entities: names,
            config_hash: self.config_hash.clone(),
            timestamp: Utc::now().to_rfc3339(),
        };
        match self.checkpoints.save(&checkpoint) {
            Ok(()) => tracing::debug!(offset, "Checkpoint saved"),
            Err(e) => tracing::warn!("Failed to save checkpoint: {}", e),
        }
    }

    fn log_progress(&self, stats: &BatchStats, started: Instant) {
        let elapsed = started.elapsed().as_secs_f64();
        let per_minute = if elapsed > 0.0 {
            stats.processed as f64 / elapsed * 60.0
        } else {
            0.0
        };
        let status = self.pool.status();
        tracing::info!(
            processed = stats.processed,
            succeeded = stats.succeeded,
            failed = stats.failed,
            inserted = stats.inserted,
            per_minute = format!("{:.1}", per_minute),
            pool_available = status.available,
            pool_round = status.round,
            "Progress"
        );
    }

    /// Mandatory randomized inter-entity delay
    async fn entity_delay(&self) {
        let (min, max) = (self.batch.entity_delay_min_ms, self.batch.entity_delay_max_ms);
        let delay = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}
