use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ember_core::config::ClientConfig;
use ember_core::ports::ClientConfigRepository;
use ember_core::Error;
use tokio::fs;
use tracing::{debug, instrument, warn};

const CLIENT_CONFIG_FILE: &str = "client_config.toml";

/// The `configClient` record: selected account and instance plus launch preferences.
///
/// A missing file is a first start, not an error. `load` answers with defaults so
/// the launcher can render, and `exists` lets the account sync write those
/// defaults once before the first account is touched.
pub struct FileClientConfigRepository {
    record_path: PathBuf,
}

impl FileClientConfigRepository {
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            record_path: config_dir.join(CLIENT_CONFIG_FILE),
        }
    }

    fn staging_path(&self) -> PathBuf {
        self.record_path.with_extension("toml.tmp")
    }
}

fn parse_record(content: &str, path: &Path) -> Result<ClientConfig, Error> {
    toml::from_str(content).map_err(|e| {
        warn!(path = %path.display(), error = %e, "client config is not valid TOML");
        Error::Storage(format!("failed to parse client config: {}", e))
    })
}

#[async_trait]
impl ClientConfigRepository for FileClientConfigRepository {
    #[instrument(skip(self))]
    async fn load(&self) -> Result<ClientConfig, Error> {
        if !self.exists().await {
            debug!("no client config yet, using defaults");
            return Ok(ClientConfig::default());
        }

        let content = fs::read_to_string(&self.record_path).await?;
        let config = parse_record(&content, &self.record_path)?;
        debug!(
            account = ?config.selected_account,
            instance = ?config.selected_instance,
            "client config loaded"
        );
        Ok(config)
    }

    async fn exists(&self) -> bool {
        fs::try_exists(&self.record_path).await.unwrap_or(false)
    }

    /// The sync loop saves after every deselection, so the record is written to a
    /// staging file and renamed over the old one. A crash mid-save leaves the
    /// previous record intact.
    #[instrument(skip(self, config))]
    async fn save(&self, config: &ClientConfig) -> Result<(), Error> {
        if let Some(parent) = self.record_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(config)
            .map_err(|e| Error::Storage(format!("failed to serialize client config: {}", e)))?;
        let staging = self.staging_path();
        fs::write(&staging, content).await?;
        fs::rename(&staging, &self.record_path).await?;

        debug!(path = %self.record_path.display(), "client config saved");
        Ok(())
    }
}
