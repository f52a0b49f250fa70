use std::path::PathBuf;

use color_eyre::Result;
use color_eyre::eyre::{Context, eyre};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub spotify: ProviderCredentials,
    pub youtube: ProviderCredentials,
}

/// OAuth client credentials used to refresh expired access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .context(format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("playlist-porter").join("config.toml"))
    }

    /// Load config from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path().ok_or(eyre!("Config file not found"))?;

        Self::from_file(&config_path)
    }

    /// Create a template config file, if it doesn't exist
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path().ok_or(eyre!("No default config path found"))?;
        if path.exists() {
            return Err(eyre!("Config file already exists: {}", path.display()));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create {}", parent.display()))?;
        }

        let template = Config {
            spotify: ProviderCredentials {
                client_id: "your-spotify-client-id".into(),
                client_secret: "your-spotify-client-secret".into(),
            },
            youtube: ProviderCredentials {
                client_id: "your-google-client-id".into(),
                client_secret: "your-google-client-secret".into(),
            },
        };
        let contents = toml::to_string_pretty(&template)?;
        std::fs::write(&path, contents)
            .context(format!("Failed to write config file: {}", path.display()))?;
        Ok(path)
    }
}
