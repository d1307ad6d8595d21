//! Change log execution.
//!
//! A run initializes the bookkeeping tables, takes the lock, applies every
//! changeset that has no execution record, skips those whose recorded
//! checksum still matches and stops at the first one that drifted. The lock
//! is released and the versioner closed on every exit path once acquired.

use std::collections::HashMap;

use tracing::{debug, error, info, warn};

use crate::change::Change;
use crate::changelog::{ChangeLog, ChangeSet};
use crate::checksum;
use crate::error::{VersoError, VersoResult};
use crate::history::{self, CHANGE_LOG_TABLE, CHANGE_SET_ID, CHECKSUM};
use crate::tracker::{LOCK_FAILED, RunTracker};
use crate::versioner::{ConnectionArgs, SchemaVersioner};

/// Configuration for the executor.
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    /// Overwrite drifted checksums instead of failing the run.
    pub update_checksums: bool,
}

impl ExecutorConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable checksum refresh mode.
    pub fn update_checksums(mut self, update: bool) -> Self {
        self.update_checksums = update;
        self
    }
}

/// Applies change logs through a [`SchemaVersioner`].
pub struct ChangeLogExecutor<V: SchemaVersioner> {
    versioner: V,
    config: ExecutorConfig,
}

impl<V: SchemaVersioner> ChangeLogExecutor<V> {
    /// Create an executor with the default configuration.
    pub fn new(versioner: V) -> Self {
        Self::with_config(versioner, ExecutorConfig::default())
    }

    /// Create an executor with a configuration.
    pub fn with_config(versioner: V, config: ExecutorConfig) -> Self {
        Self { versioner, config }
    }

    /// The configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// The underlying versioner.
    pub fn versioner(&self) -> &V {
        &self.versioner
    }

    /// Consume the executor, returning the versioner.
    pub fn into_inner(self) -> V {
        self.versioner
    }

    /// Execute a change log and set the tracker's exit code from the outcome.
    pub async fn run(&mut self, log: &ChangeLog, args: &ConnectionArgs) -> RunTracker {
        let mut tracker = RunTracker::new();
        let success = self.execute(log, args, &mut tracker).await;
        tracker.complete(success);
        tracker
    }

    /// Execute a change log.
    ///
    /// Returns `true` only if every changeset was skipped or executed. The
    /// first error is recorded on `tracker`; the exit code is left to the
    /// caller.
    pub async fn execute(
        &mut self,
        log: &ChangeLog,
        args: &ConnectionArgs,
        tracker: &mut RunTracker,
    ) -> bool {
        tracker.set_total_count(log.len());
        info!(changesets = log.len(), "Executing change log");

        let success = match self.init(args).await {
            Err(err) => {
                error!("Failed to initialize bookkeeping tables: {}", err);
                tracker.errored_change_set(None, err.to_string());
                false
            }
            Ok(()) => match self.lock().await {
                Err(err) => {
                    error!("{} {}", LOCK_FAILED, err);
                    tracker.errored_change_set(None, LOCK_FAILED);
                    false
                }
                Ok(()) => {
                    let applied = match self.apply_all(log, tracker).await {
                        Ok(()) => true,
                        Err(err) => {
                            error!("{}", err);
                            tracker.errored_change_set(err.change_set_id(), err.to_string());
                            false
                        }
                    };
                    let unlocked = match self.unlock().await {
                        Ok(()) => true,
                        Err(err) => {
                            error!("{}", err);
                            tracker.errored_change_set(None, err.to_string());
                            false
                        }
                    };
                    applied && unlocked
                }
            },
        };

        if let Err(err) = self.versioner.close().await {
            warn!("Failed to close versioner: {}", err);
        }

        info!(
            total = tracker.total_count(),
            executed = tracker.executed_count(),
            skipped = tracker.skip_count(),
            success,
            "Change log execution finished"
        );
        success
    }

    async fn init(&mut self, args: &ConnectionArgs) -> VersoResult<()> {
        self.versioner.init(args).await?;

        for (table, index) in [history::change_log_table(), history::lock_table()] {
            if self.versioner.is_table_present(&table.table).await? {
                continue;
            }
            info!(table = %table.table, "Creating bookkeeping table");
            self.versioner.create_table(&table).await?;
            self.versioner.create_index(&index).await?;
        }
        Ok(())
    }

    async fn lock(&self) -> VersoResult<()> {
        self.versioner
            .insert(&history::lock_row())
            .await
            .map_err(|e| VersoError::Lock(e.to_string()))?;
        info!("Acquired change log lock");
        Ok(())
    }

    async fn unlock(&self) -> VersoResult<()> {
        self.versioner
            .delete(&history::unlock_row())
            .await
            .map_err(|e| VersoError::Unlock(e.to_string()))?;
        info!("Released change log lock");
        Ok(())
    }

    async fn apply_all(&self, log: &ChangeLog, tracker: &mut RunTracker) -> VersoResult<()> {
        let current: HashMap<String, String> = self
            .versioner
            .fetch_current_change_sets(CHANGE_LOG_TABLE, CHANGE_SET_ID, CHECKSUM)
            .await?;
        debug!(recorded = current.len(), "Fetched execution records");

        for change_set in log {
            let checksum = checksum::evaluate(change_set)?;

            match current.get(&change_set.id) {
                Some(stored) if *stored == checksum => {
                    debug!(changeset = %change_set.id, "Skipping changeset, already executed");
                    tracker.skipping_change_set();
                }
                Some(stored) if self.config.update_checksums => {
                    warn!(
                        changeset = %change_set.id,
                        old = %stored,
                        new = %checksum,
                        "Updating checksum of modified changeset"
                    );
                    self.versioner
                        .update(&history::checksum_update(&change_set.id, &checksum))
                        .await
                        .map_err(|e| VersoError::dispatch(&change_set.id, "update", e.message()))?;
                }
                Some(stored) => {
                    return Err(VersoError::ChecksumMismatch {
                        id: change_set.id.clone(),
                        old: stored.clone(),
                        new: checksum,
                    });
                }
                None => {
                    info!(changeset = %change_set.id, author = %change_set.author, "Executing changeset");
                    self.apply(change_set).await?;
                    self.versioner
                        .insert(&history::execution_record(change_set, &checksum))
                        .await
                        .map_err(|e| VersoError::dispatch(&change_set.id, "insert", e.message()))?;
                    tracker.executed_change_set();
                }
            }
        }
        Ok(())
    }

    async fn apply(&self, change_set: &ChangeSet) -> VersoResult<()> {
        for change in &change_set.changes {
            debug!(changeset = %change_set.id, change = change.kind(), "Applying change");
            let result = match change {
                Change::CreateTable(c) => self.versioner.create_table(c).await,
                Change::CreateIndex(c) => self.versioner.create_index(c).await,
                Change::Insert(c) => self.versioner.insert(c).await,
                Change::Update(c) => self.versioner.update(c).await,
                Change::Delete(c) => self.versioner.delete(c).await,
                Change::Query(c) => self.versioner.execute_query(c).await,
                Change::Script(c) => self.versioner.execute_script(c).await,
                Change::FindAndUpdate(c) => self.versioner.find_and_update(c).await,
            };
            result.map_err(|e| VersoError::dispatch(&change_set.id, change.kind(), e.message()))?;
        }
        Ok(())
    }
}
