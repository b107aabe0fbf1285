use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SelectorError;

/// One archive link found in a region listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub group_key: String,
    pub relative_href: String,
    pub display_name: String,
    pub absolute_url: String,
}

/// One row of user input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestPair {
    pub city: String,
    pub country: String,
}

impl RequestPair {
    pub fn new(city: &str, country: &str) -> Self {
        Self {
            city: city.trim().to_string(),
            country: normalize_country(country),
        }
    }

    pub fn key(&self) -> PairKey {
        PairKey {
            city: self.city.clone(),
            country: self.country.clone(),
        }
    }
}

impl fmt::Display for RequestPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.city, self.country)
    }
}

/// Identity used for manual choices. Duplicate input rows share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub city: String,
    pub country: String,
}

impl PairKey {
    pub fn new(city: &str, country: &str) -> Self {
        RequestPair::new(city, country).key()
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.city, self.country)
    }
}

impl FromStr for PairKey {
    type Err = SelectorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (city, country) = value
            .split_once('|')
            .ok_or_else(|| SelectorError::InvalidChoiceSpec(value.to_string()))?;
        if city.trim().is_empty() || country.trim().is_empty() {
            return Err(SelectorError::InvalidChoiceSpec(value.to_string()));
        }
        Ok(PairKey::new(city, country))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Resolved,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub pair: RequestPair,
    pub file: Option<FileRecord>,
    pub status: ResolutionStatus,
}

impl Resolution {
    pub fn resolved(pair: RequestPair, file: FileRecord) -> Self {
        Self {
            pair,
            file: Some(file),
            status: ResolutionStatus::Resolved,
        }
    }

    pub fn unresolved(pair: RequestPair) -> Self {
        Self {
            pair,
            file: None,
            status: ResolutionStatus::Unresolved,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status == ResolutionStatus::Resolved
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategyKind {
    #[default]
    Substring,
    Strict,
}

impl fmt::Display for MatchStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStrategyKind::Substring => write!(f, "substring"),
            MatchStrategyKind::Strict => write!(f, "strict"),
        }
    }
}

/// Countries are compared trimmed and upper-cased everywhere.
pub fn normalize_country(value: &str) -> String {
    value.trim().to_uppercase()
}
