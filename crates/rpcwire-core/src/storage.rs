//! Configuration storage

use crate::{config::Config, Error, Result};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";

pub struct ConfigStorage {
    config_dir: PathBuf,
}

impl ConfigStorage {
    pub fn new(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Reads the config file, writing defaults first when it is missing or
    /// empty.
    pub fn load(&self) -> Result<Config> {
        let config_path = self.config_path();

        if !config_path.exists() {
            let config = Config::default();
            self.save(&config)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;

        if content.trim().is_empty() {
            let config = Config::default();
            self.save(&config)?;
            return Ok(config);
        }

        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;

        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(self.config_path(), content)?;

        Ok(())
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("rpcwire"))
        .ok_or_else(|| Error::Validation("Could not find config directory".to_string()))
}

pub fn init_config_dir() -> Result<PathBuf> {
    let config_dir = get_config_dir()?;
    std::fs::create_dir_all(&config_dir)?;
    Ok(config_dir)
}

/// Loads the config from an explicit file, or from the platform config
/// directory when none is given.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            if path.file_name().and_then(|n| n.to_str()) == Some(CONFIG_FILE) {
                return ConfigStorage::new(dir).load();
            }
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        }
        None => ConfigStorage::new(init_config_dir()?).load(),
    }
}
