use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use ember_core::config::Settings;

pub fn get_configuration_with_paths(
    current_dir_path: Option<PathBuf>,
    system_config_dir_path: Option<PathBuf>,
) -> Result<Settings, config::ConfigError> {
    let config_directory = current_dir_path.unwrap_or_else(|| {
        std::env::current_dir()
            .map(|p| p.join("config"))
            .unwrap_or_else(|_| PathBuf::from("config"))
    });

    let system_config_dir = match system_config_dir_path {
        Some(path) => path,
        None => config_dir(),
    };

    let defaults = Settings::default();
    let settings = Config::builder()
        .set_default("log_level", defaults.log_level)?
        .set_default("api_url", defaults.api_url)?
        .set_default("data_directory", defaults.data_directory)?
        .set_default("request_timeout_secs", defaults.request_timeout_secs)?
        .add_source(File::from(system_config_dir.join("config.toml")).required(false))
        .add_source(File::from(config_directory.join("config.toml")).required(false))
        .add_source(Environment::with_prefix("EMBER").separator("__"))
        .build()?;

    settings.try_deserialize::<Settings>()
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    get_configuration_with_paths(None, None)
}

/// Platform config directory; also where the launcher keeps its own records
pub fn config_dir() -> PathBuf {
    ProjectDirs::from("com", "ember", "ember")
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("config"))
}

/// Platform roaming data directory the game folder is created under
pub fn app_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::tempdir;

    fn clear_env() {
        for (key, _) in std::env::vars() {
            if key.starts_with("EMBER__") {
                std::env::remove_var(&key);
            }
        }
    }

    fn nowhere() -> Option<PathBuf> {
        Some(PathBuf::from("/nonexistent"))
    }

    #[serial]
    #[test]
    fn test_get_configuration_defaults() {
        clear_env();

        let settings = get_configuration_with_paths(nowhere(), nowhere()).unwrap();

        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.api_url, "http://localhost");
        assert_eq!(settings.data_directory, "Minecraft");
        assert_eq!(settings.request_timeout_secs, 30);
        assert!(settings.client_id.is_none());
        assert!(settings.validation_url.is_none());
    }

    #[serial]
    #[test]
    fn test_get_configuration_file_override() {
        clear_env();

        let dir = tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("config.toml")).unwrap();
        file.write_all(
            br#"
            api_url = "https://launcher.example.net"
            data_directory = "Arcadia"
            validation_url = "https://launcher.example.net/unlock"
            log_level = "debug"
            "#,
        )
        .unwrap();

        let settings =
            get_configuration_with_paths(Some(dir.path().to_path_buf()), nowhere()).unwrap();

        assert_eq!(settings.api_url, "https://launcher.example.net");
        assert_eq!(settings.data_directory, "Arcadia");
        assert_eq!(
            settings.validation_url.as_deref(),
            Some("https://launcher.example.net/unlock")
        );
        assert_eq!(settings.log_level, "debug");
    }

    #[serial]
    #[test]
    fn test_get_configuration_precedence_env_over_file() {
        clear_env();

        let dir = tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("config.toml")).unwrap();
        file.write_all(b"log_level = \"debug\"\nrequest_timeout_secs = 10\n")
            .unwrap();

        std::env::set_var("EMBER__LOG_LEVEL", "trace");
        std::env::set_var("EMBER__CLIENT_ID", "00000000-aaaa");

        let settings =
            get_configuration_with_paths(Some(dir.path().to_path_buf()), nowhere()).unwrap();

        assert_eq!(settings.log_level, "trace");
        assert_eq!(settings.client_id.as_deref(), Some("00000000-aaaa"));
        assert_eq!(settings.request_timeout_secs, 10);

        clear_env();
    }
}
