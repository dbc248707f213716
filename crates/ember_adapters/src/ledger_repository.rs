use std::path::PathBuf;

use async_trait::async_trait;
use ember_core::ledger::UnlockLedger;
use ember_core::ports::UnlockLedgerRepository;
use ember_core::Error;
use tokio::fs;
use tracing::{instrument, warn};

/// Unlocked instances, stored as a JSON object keyed by instance name
pub struct FileUnlockLedgerRepository {
    ledger_path: PathBuf,
}

impl FileUnlockLedgerRepository {
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            ledger_path: config_dir.join("unlocked_instances.json"),
        }
    }
}

#[async_trait]
impl UnlockLedgerRepository for FileUnlockLedgerRepository {
    /// A missing ledger is an empty one. A corrupt file is a storage error and is
    /// left on disk untouched.
    #[instrument(skip(self))]
    async fn load(&self) -> Result<UnlockLedger, Error> {
        if !fs::try_exists(&self.ledger_path).await.unwrap_or(false) {
            return Ok(UnlockLedger::new());
        }

        let content = fs::read_to_string(&self.ledger_path).await?;
        serde_json::from_str(&content).map_err(|e| {
            warn!(error = %e, path = ?self.ledger_path, "unlock ledger is corrupt");
            Error::Storage(format!("failed to parse unlock ledger: {}", e))
        })
    }

    #[instrument(skip(self, ledger), fields(entries = ledger.len()))]
    async fn save(&self, ledger: &UnlockLedger) -> Result<(), Error> {
        if let Some(parent) = self.ledger_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(ledger)
            .map_err(|e| Error::Storage(format!("failed to serialize unlock ledger: {}", e)))?;
        fs::write(&self.ledger_path, content).await?;
        Ok(())
    }
}
