use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::MatchStrategyKind;
use crate::error::SelectorError;
use crate::http::HttpSettings;
use crate::resolver::{ChoiceEntry, ManualChoices};

pub const DEFAULT_CONFIG_FILE: &str = "wfs.json";
pub const DEFAULT_MAPPING_FILE: &str = "country_region_mapping.csv";
const DEFAULT_LISTING_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONTENT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub mapping_path: Option<String>,
    #[serde(default)]
    pub strategy: Option<MatchStrategyKind>,
    #[serde(default)]
    pub region_hint: Option<String>,
    /// `0` leaves the listing request unbounded.
    #[serde(default)]
    pub listing_timeout_secs: Option<u64>,
    #[serde(default)]
    pub content_timeout_secs: Option<u64>,
    #[serde(default)]
    pub accept_invalid_certs: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub mapping_path: Utf8PathBuf,
    pub strategy: MatchStrategyKind,
    pub region_hint: Option<String>,
    pub listing: HttpSettings,
    pub content: HttpSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `wfs.json` from the working directory when it
    /// exists. Without either, every setting takes its default.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, SelectorError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Self::resolve_config(Config::default()));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| SelectorError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| SelectorError::ConfigParse(err.to_string()))?;

        Ok(Self::resolve_config(config))
    }

    pub fn resolve_config(config: Config) -> ResolvedConfig {
        let accept_invalid_certs = config.accept_invalid_certs.unwrap_or(false);
        let listing_timeout = match config
            .listing_timeout_secs
            .unwrap_or(DEFAULT_LISTING_TIMEOUT_SECS)
        {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let content_timeout = config
            .content_timeout_secs
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_CONTENT_TIMEOUT_SECS);

        ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            mapping_path: Utf8PathBuf::from(
                config
                    .mapping_path
                    .unwrap_or_else(|| DEFAULT_MAPPING_FILE.to_string()),
            ),
            strategy: config.strategy.unwrap_or_default(),
            region_hint: config.region_hint.filter(|hint| !hint.trim().is_empty()),
            listing: HttpSettings {
                timeout: listing_timeout,
                accept_invalid_certs,
            },
            content: HttpSettings {
                timeout: Some(Duration::from_secs(content_timeout)),
                accept_invalid_certs,
            },
        }
    }
}

/// Reads manual choices saved as `[{ "city", "country", "file" }]`.
pub fn load_choices(path: &str) -> Result<ManualChoices, SelectorError> {
    let path = PathBuf::from(path);
    let content =
        fs::read_to_string(&path).map_err(|_| SelectorError::ConfigRead(path.clone()))?;
    let entries: Vec<ChoiceEntry> = serde_json::from_str(&content)
        .map_err(|err| SelectorError::ConfigParse(err.to_string()))?;
    Ok(ManualChoices::from_entries(entries))
}
