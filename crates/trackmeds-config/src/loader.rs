use std::path::{Path, PathBuf};

use trackmeds_common::{Error, Result};
use tracing::info;

use crate::model::AppConfig;

const DATABASE_FILE: &str = "trackmeds.db";

pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Result<Self> {
        let config_dir = Self::default_config_dir();
        Ok(Self { config_dir })
    }

    pub fn default_config_dir() -> PathBuf {
        let home_config = dirs::home_dir().map(|h| h.join(".trackmeds"));
        let xdg_config = dirs::config_dir().map(|c| c.join("trackmeds"));

        match (xdg_config, home_config) {
            (Some(xdg), Some(home)) => {
                // Prefer XDG unless only the legacy home directory exists.
                if !xdg.exists() && home.exists() {
                    home
                } else {
                    xdg
                }
            }
            (Some(xdg), None) => xdg,
            (None, Some(home)) => home,
            (None, None) => PathBuf::from(".trackmeds"),
        }
    }

    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Returns true if a config file (YAML or TOML) exists on disk.
    pub fn config_file_exists(&self) -> bool {
        self.config_dir.join("config.yml").exists() || self.config_dir.join("config.toml").exists()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let yaml_path = self.config_dir.join("config.yml");
        let toml_path = self.config_dir.join("config.toml");

        let config: AppConfig = if yaml_path.exists() {
            info!("loading config from {}", yaml_path.display());
            let contents = std::fs::read_to_string(&yaml_path)?;
            serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("failed to parse YAML config: {e}")))?
        } else if toml_path.exists() {
            info!("loading config from {}", toml_path.display());
            let contents = std::fs::read_to_string(&toml_path)?;
            toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("failed to parse TOML config: {e}")))?
        } else {
            info!("no config file found, using defaults");
            AppConfig::default()
        };

        validate(&config)?;
        Ok(config)
    }

    /// Directory holding the persistent store.
    pub fn data_dir(&self, config: &AppConfig) -> PathBuf {
        config
            .data_dir
            .clone()
            .unwrap_or_else(|| self.config_dir.join("data"))
    }

    pub fn database_path(&self, config: &AppConfig) -> PathBuf {
        self.data_dir(config).join(DATABASE_FILE)
    }

    pub fn ensure_dirs(&self, config: &AppConfig) -> Result<()> {
        let dirs = [self.config_dir.clone(), self.data_dir(config)];

        for dir in &dirs {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }

        Ok(())
    }
}

fn validate(config: &AppConfig) -> Result<()> {
    if config.reminders.snooze_minutes <= 0 {
        return Err(Error::Config(format!(
            "reminders.snooze_minutes must be positive, got {}",
            config.reminders.snooze_minutes
        )));
    }
    if config.reminders.history_limit == 0 {
        return Err(Error::Config(
            "reminders.history_limit must be at least 1".into(),
        ));
    }
    if config.reminders.poll_interval_secs == 0 {
        return Err(Error::Config(
            "reminders.poll_interval_secs must be at least 1".into(),
        ));
    }
    Ok(())
}
