use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SelectorError {
    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to load country-region mapping from {path}: {message}")]
    #[diagnostic(help("the mapping must be a CSV file with `Country` and `Region_URL` columns"))]
    MappingRead { path: PathBuf, message: String },

    #[error("malformed country-region mapping: {0}")]
    MappingFormat(String),

    #[error("failed to read input file at {path}: {message}")]
    InputRead { path: PathBuf, message: String },

    #[error("unsupported input file type: {0}")]
    #[diagnostic(help("use an .xlsx, .xls, .ods or .csv file"))]
    UnsupportedInput(String),

    #[error("input must have 'City' and 'Country' columns (missing: {0})")]
    MissingColumns(String),

    #[error("invalid manual choice `{0}`")]
    #[diagnostic(help("expected CITY|COUNTRY=FILE, e.g. \"Pune|INDIA=IND_MH_Pune.430630_TMYx.zip\""))]
    InvalidChoiceSpec(String),

    #[error("no pending disambiguation for {city} ({country})")]
    UnknownPair { city: String, country: String },

    #[error("`{file}` is not a candidate for {city} ({country})")]
    InvalidChoice {
        city: String,
        country: String,
        file: String,
    },

    #[error("no region URL found for country '{0}'")]
    #[diagnostic(help("add the country to the mapping file or pass the listing URL directly"))]
    UnknownCountry(String),

    #[error("listing request failed: {0}")]
    ListingHttp(String),

    #[error("listing returned status {status} for {url}")]
    ListingStatus { status: u16, url: String },

    #[error("content request failed: {0}")]
    ContentHttp(String),

    #[error("content returned status {status} for {url}")]
    ContentStatus { status: u16, url: String },

    #[error("failed to write report: {0}")]
    ReportWrite(String),

    #[error("failed to write bundle: {0}")]
    BundleWrite(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl SelectorError {
    /// Errors that stop a run before anything is fetched.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            SelectorError::ConfigRead(_)
                | SelectorError::ConfigParse(_)
                | SelectorError::MappingRead { .. }
                | SelectorError::MappingFormat(_)
                | SelectorError::InputRead { .. }
                | SelectorError::UnsupportedInput(_)
                | SelectorError::MissingColumns(_)
                | SelectorError::InvalidChoiceSpec(_)
        )
    }
}
