use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{ClientConfig, CloseBehavior, MemorySettings, ScreenSize, Theme};
use crate::error::Error;
use crate::ports::ClientConfigRepository;

/// Launch preferences stored in the client config record
pub struct SettingsUseCase<C>
where
    C: ClientConfigRepository,
{
    config_repo: Arc<C>,
}

impl<C> SettingsUseCase<C>
where
    C: ClientConfigRepository,
{
    pub fn new(config_repo: Arc<C>) -> Self {
        Self { config_repo }
    }

    pub async fn current(&self) -> Result<ClientConfig, Error> {
        self.config_repo.load().await
    }

    /// Pull out-of-range memory settings back into range for this machine
    pub async fn normalize_memory(&self, total_gb: f64) -> Result<MemorySettings, Error> {
        self.update(|config| {
            config.java.memory = config.java.memory.clamped(total_gb);
            config.java.memory
        })
        .await
    }

    /// Store new heap bounds, clamped the way the memory slider clamps them
    pub async fn set_memory(
        &self,
        min: f64,
        max: f64,
        total_gb: f64,
    ) -> Result<MemorySettings, Error> {
        let max_allowed = MemorySettings::max_allowed(total_gb);
        let clamp = |gb: f64| gb.max(MemorySettings::MIN_ALLOWED_GB).min(max_allowed);

        let max = clamp(max);
        let min = clamp(min).min(max);
        let memory = MemorySettings { min, max };

        info!(min, max, "java memory updated");
        self.update(|config| {
            config.java.memory = memory;
            memory
        })
        .await
    }

    /// Use a specific java binary, or the bundled runtime with `None`
    pub async fn set_java_path(&self, path: Option<PathBuf>) -> Result<(), Error> {
        if let Some(path) = &path {
            if !is_java_executable(path) {
                return Err(Error::InvalidJavaPath(path.clone()));
            }
        }
        debug!(?path, "java path updated");
        self.update(|config| config.java.path = path).await
    }

    pub async fn set_resolution(&self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidResolution { width, height });
        }
        self.update(|config| config.game.screen = ScreenSize { width, height })
            .await
    }

    pub async fn reset_resolution(&self) -> Result<(), Error> {
        self.update(|config| config.game.screen = ScreenSize::default())
            .await
    }

    pub async fn set_close_behavior(&self, behavior: CloseBehavior) -> Result<(), Error> {
        info!(%behavior, "close behavior updated");
        self.update(|config| config.launcher.close_behavior = behavior)
            .await
    }

    pub async fn set_download_multi(&self, count: u32) -> Result<(), Error> {
        self.update(|config| config.launcher.download_multi = count.max(1))
            .await
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<(), Error> {
        self.update(|config| config.launcher.theme = theme).await
    }

    async fn update<T>(&self, apply: impl FnOnce(&mut ClientConfig) -> T) -> Result<T, Error> {
        let mut config = self.config_repo.load().await?;
        let before = config.clone();
        let result = apply(&mut config);
        if config != before {
            self.config_repo.save(&config).await?;
        }
        Ok(result)
    }
}

/// File stem must be `java` or `javaw`; a Windows `.exe` suffix is ignored
pub fn is_java_executable(path: &std::path::Path) -> bool {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let stem = file_name.strip_suffix(".exe").unwrap_or(file_name);
    stem == "java" || stem == "javaw"
}
