use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entities::AccountId;

/// Application settings, layered by the `config` crate in ember_adapters
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub log_level: String,
    /// Base URL of the launcher server (instances, news, remote config)
    pub api_url: String,
    /// Name of the game data folder under the platform app data directory
    pub data_directory: String,
    /// Microsoft OAuth client id used for token refresh
    pub client_id: Option<String>,
    pub azauth_url: Option<String>,
    pub validation_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            api_url: "http://localhost".to_string(),
            data_directory: "Minecraft".to_string(),
            client_id: None,
            azauth_url: None,
            validation_url: None,
            request_timeout_secs: 30,
        }
    }
}

// ============================================================================
// Client config record
// ============================================================================

/// What to do with the launcher window once the game starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CloseBehavior {
    /// Hide the launcher while the game runs, show it again afterwards
    #[default]
    CloseLauncher,
    /// Quit the launcher together with the game
    CloseAll,
    /// Keep the launcher open
    CloseNone,
}

impl fmt::Display for CloseBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseBehavior::CloseLauncher => write!(f, "close-launcher"),
            CloseBehavior::CloseAll => write!(f, "close-all"),
            CloseBehavior::CloseNone => write!(f, "close-none"),
        }
    }
}

impl FromStr for CloseBehavior {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "close-launcher" => Ok(CloseBehavior::CloseLauncher),
            "close-all" => Ok(CloseBehavior::CloseAll),
            "close-none" => Ok(CloseBehavior::CloseNone),
            other => Err(format!("unknown close behavior '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Auto,
    Dark,
    Light,
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Theme::Auto),
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(format!("unknown theme '{}'", other)),
        }
    }
}

/// Java heap bounds in gigabytes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemorySettings {
    pub min: f64,
    pub max: f64,
}

impl MemorySettings {
    pub const MIN_ALLOWED_GB: f64 = 1.0;

    /// Largest heap the slider offers: 80% of RAM, capped to 2..=16 GB
    pub fn max_allowed(total_gb: f64) -> f64 {
        (total_gb * 0.8).floor().min(16.0).max(2.0)
    }

    /// Bring both bounds into the allowed range for a machine with `total_gb` of RAM
    pub fn clamped(self, total_gb: f64) -> Self {
        let max_allowed = Self::max_allowed(total_gb);

        let mut min = self.min;
        let mut max = self.max;
        if min.is_nan() || min < Self::MIN_ALLOWED_GB {
            min = Self::MIN_ALLOWED_GB;
        }
        if max.is_nan() || max > max_allowed {
            max = max_allowed.min(4.0);
        }
        if min > max {
            min = max;
        }
        Self { min, max }
    }

    /// Heap size as a JVM `-Xm*` value, e.g. `2048M`
    pub fn min_arg(&self) -> String {
        format!("{}M", (self.min * 1024.0).round() as u64)
    }

    pub fn max_arg(&self) -> String {
        format!("{}M", (self.max * 1024.0).round() as u64)
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self { min: 2.0, max: 4.0 }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct JavaSettings {
    /// `None` means the runtime bundled under the game directory
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub memory: MemorySettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self {
            width: 854,
            height: 480,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct GameConfig {
    #[serde(default)]
    pub screen: ScreenSize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LauncherConfig {
    #[serde(default = "default_download_multi")]
    pub download_multi: u32,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub close_behavior: CloseBehavior,
    #[serde(default = "default_true")]
    pub intel_enabled_mac: bool,
}

fn default_download_multi() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            download_multi: default_download_multi(),
            theme: Theme::default(),
            close_behavior: CloseBehavior::default(),
            intel_enabled_mac: true,
        }
    }
}

/// Singleton record with the user's selections and launch preferences.
///
/// Missing sections deserialize to their defaults, so older files keep loading.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub selected_account: Option<AccountId>,
    #[serde(default)]
    pub selected_instance: Option<String>,
    #[serde(default)]
    pub java: JavaSettings,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub launcher: LauncherConfig,
}

impl ClientConfig {
    pub fn is_selected(&self, id: &AccountId) -> bool {
        self.selected_account.as_ref() == Some(id)
    }
}
