use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{ClientConfig, CloseBehavior, ScreenSize};
use crate::entities::{Account, InstanceDescriptor};

/// Milliseconds the launch library waits on each download request
pub const DOWNLOAD_TIMEOUT_MS: u64 = 10_000;

/// Game directory under the platform app data folder.
///
/// macOS keeps the folder visible, everywhere else it is a dot directory.
pub fn game_directory(app_data: &Path, data_directory: &str, macos: bool) -> PathBuf {
    if macos {
        app_data.join(data_directory)
    } else {
        app_data.join(format!(".{}", data_directory))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoaderOptions {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub build: Option<String>,
    pub enable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryOptions {
    pub min: String,
    pub max: String,
}

/// Everything the game launcher needs for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchOptions {
    pub url: Option<String>,
    pub authenticator: Account,
    pub timeout: u64,
    pub path: PathBuf,
    pub instance: String,
    pub version: Option<String>,
    /// Game keeps running when the launcher exits
    pub detached: bool,
    pub download_file_multiple: u32,
    pub intel_enabled_mac: bool,
    pub loader: LoaderOptions,
    pub verify: bool,
    pub ignored: Vec<String>,
    pub java_path: Option<PathBuf>,
    pub screen: ScreenSize,
    pub memory: MemoryOptions,
}

impl LaunchOptions {
    pub fn build(
        instance: &InstanceDescriptor,
        account: &Account,
        config: &ClientConfig,
        game_path: PathBuf,
    ) -> Self {
        let loader = instance.loader.clone().unwrap_or_default();
        let enable = loader.loader_type.as_deref() != Some("none");

        Self {
            url: instance.url.clone(),
            authenticator: account.clone(),
            timeout: DOWNLOAD_TIMEOUT_MS,
            path: game_path,
            instance: instance.name.clone(),
            version: loader.minecraft_version,
            detached: config.launcher.close_behavior != CloseBehavior::CloseAll,
            download_file_multiple: config.launcher.download_multi,
            intel_enabled_mac: config.launcher.intel_enabled_mac,
            loader: LoaderOptions {
                kind: loader.loader_type,
                build: loader.loader_version,
                enable,
            },
            verify: instance.verify,
            ignored: instance.ignored.clone(),
            java_path: config.java.path.clone(),
            screen: config.game.screen,
            memory: MemoryOptions {
                min: config.java.memory.min_arg(),
                max: config.java.memory.max_arg(),
            },
        }
    }
}

/// Events reported by a running launch
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchEvent {
    Extract,
    Progress { current: u64, total: u64 },
    Check { current: u64, total: u64 },
    /// Seconds left
    Estimated(u64),
    /// Bytes per second
    Speed(u64),
    Patch,
    /// A line of game output
    Data(String),
    Close(Option<i32>),
    Error(String),
}

impl LaunchEvent {
    /// Completion for progress-like events
    pub fn percent(&self) -> Option<f64> {
        match self {
            LaunchEvent::Progress { current, total } | LaunchEvent::Check { current, total } => {
                if *total == 0 {
                    Some(0.0)
                } else {
                    Some((*current as f64 / *total as f64) * 100.0)
                }
            }
            _ => None,
        }
    }
}
