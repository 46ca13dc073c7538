use crate::config::{
    check_batch_size, check_processing_time, OrchestratorConfig, DEFAULT_BATCH_SIZE,
    DEFAULT_MAX_PROCESSING_TIME_SECS,
};
use crate::error::Result;
use crate::session::PersistOptions;
use serde::{Deserialize, Serialize};

/// Options shared by every member of one bulk submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BulkOptions {
    pub batch_size: usize,
    pub continue_on_error: bool,
    pub validate_business_id_uniqueness: bool,
    pub max_processing_time_secs: u64,
    pub persist: PersistOptions,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            continue_on_error: true,
            validate_business_id_uniqueness: true,
            max_processing_time_secs: DEFAULT_MAX_PROCESSING_TIME_SECS,
            persist: PersistOptions::default(),
        }
    }
}

impl BulkOptions {
    /// Defaults taken from the orchestrator configuration.
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            batch_size: config.default_batch_size,
            max_processing_time_secs: config.max_processing_time_secs,
            ..Self::default()
        }
    }

    pub fn check(&self) -> Result<()> {
        check_batch_size(self.batch_size)?;
        check_processing_time(self.max_processing_time_secs)
    }
}
