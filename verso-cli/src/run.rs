//! Load the change log and drive the executor against the chosen store.

use tracing::info;
use verso_core::{
    ChangeLog, ChangeLogExecutor, ExecutorConfig, MemoryVersioner, RunTracker, SchemaVersioner,
    loader,
};
use verso_mongodb::MongoVersioner;

use crate::cli::DbType;
use crate::config::Settings;
use crate::error::CliResult;

/// Load the change log named by `settings`.
pub fn load_change_log(settings: &Settings) -> CliResult<ChangeLog> {
    let log = loader::load(&settings.changelog)?;
    info!(
        path = %settings.changelog.display(),
        changesets = log.len(),
        "Loaded change log"
    );
    Ok(log)
}

/// Apply `log` with the versioner selected by `settings.db_type`.
pub async fn apply(settings: &Settings, log: &ChangeLog) -> RunTracker {
    let config = ExecutorConfig::new().update_checksums(settings.update_checksums);
    match settings.db_type {
        DbType::Mongo => run_with(MongoVersioner::new(), config, settings, log).await,
        DbType::Memory => run_with(MemoryVersioner::new(), config, settings, log).await,
    }
}

async fn run_with<V: SchemaVersioner>(
    versioner: V,
    config: ExecutorConfig,
    settings: &Settings,
    log: &ChangeLog,
) -> RunTracker {
    let mut executor = ChangeLogExecutor::with_config(versioner, config);
    executor.run(log, &settings.connection).await
}
