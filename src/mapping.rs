use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::domain::normalize_country;
use crate::error::SelectorError;

const COUNTRY_COLUMN: &str = "country";
const URL_COLUMN: &str = "region_url";

/// Country → region listing URL, keyed by trimmed upper-cased country.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryMap {
    entries: BTreeMap<String, String>,
}

impl CountryMap {
    pub fn from_entries<I, C, U>(entries: I) -> Self
    where
        I: IntoIterator<Item = (C, U)>,
        C: AsRef<str>,
        U: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(country, url)| {
                    (normalize_country(country.as_ref()), url.as_ref().trim().to_string())
                })
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, SelectorError> {
        let file = File::open(path).map_err(|err| SelectorError::MappingRead {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_reader(file)
    }

    /// Reads a CSV with `Country` and `Region_URL` headers (any case).
    /// Later rows win over earlier rows for the same country.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SelectorError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let headers = reader
            .headers()
            .map_err(|err| SelectorError::MappingFormat(err.to_string()))?
            .clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| SelectorError::MappingFormat(format!("missing `{name}` column")))
        };
        let country_idx = column(COUNTRY_COLUMN)?;
        let url_idx = column(URL_COLUMN)?;

        let mut entries = BTreeMap::new();
        for record in reader.records() {
            let record = record.map_err(|err| SelectorError::MappingFormat(err.to_string()))?;
            let country = record.get(country_idx).unwrap_or_default();
            let url = record.get(url_idx).unwrap_or_default();
            if country.is_empty() || url.is_empty() {
                let line = record.position().map(|pos| pos.line()).unwrap_or_default();
                tracing::warn!(line, "skipping mapping row without country or URL");
                continue;
            }
            entries.insert(normalize_country(country), url.to_string());
        }
        Ok(Self { entries })
    }

    pub fn get(&self, country: &str) -> Option<&str> {
        self.entries
            .get(&normalize_country(country))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
