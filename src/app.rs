use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::bundle::{self, Bundle, ContentFetcher, DirectoryExport};
use crate::domain::{FileRecord, RequestPair};
use crate::error::SelectorError;
use crate::input::{self, InputPairs};
use crate::listing::{DirectoryFetcher, Listing};
use crate::mapping::CountryMap;
use crate::matching::{MatchStrategy, SubstringMatch};
use crate::report::Report;
use crate::resolver::ResolutionSession;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Non-fatal problems of a run, each scoped to the country it affects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    UnknownCountry { country: String },
    ListingFailed { country: String, url: String, reason: String },
}

impl std::fmt::Display for RunWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunWarning::UnknownCountry { country } => write!(
                f,
                "no region URL found for country '{country}'; check the mapping and input country names"
            ),
            RunWarning::ListingFailed {
                country,
                url,
                reason,
            } => write!(f, "could not fetch listing for {country} from {url}: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CountryFiles {
    pub files: HashMap<String, Vec<FileRecord>>,
    pub warnings: Vec<RunWarning>,
}

#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub session: ResolutionSession,
    pub warnings: Vec<RunWarning>,
}

pub struct App<D: DirectoryFetcher, C: ContentFetcher> {
    directory: D,
    content: C,
    strategy: Box<dyn MatchStrategy>,
}

impl<D: DirectoryFetcher, C: ContentFetcher> App<D, C> {
    pub fn new(directory: D, content: C) -> Self {
        Self {
            directory,
            content,
            strategy: Box::new(SubstringMatch),
        }
    }

    pub fn with_strategy(mut self, strategy: Box<dyn MatchStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn listing(&self, region_url: &str) -> Result<Listing, SelectorError> {
        self.directory.fetch_listing(region_url)
    }

    /// Fetches the listing of every distinct country in `pairs`, in sorted
    /// order. Unknown countries and failed fetches become warnings.
    pub fn fetch_country_files(
        &self,
        pairs: &[RequestPair],
        mapping: &CountryMap,
        sink: &dyn ProgressSink,
    ) -> CountryFiles {
        let countries = pairs
            .iter()
            .map(|pair| pair.country.as_str())
            .collect::<BTreeSet<_>>();
        let mut result = CountryFiles::default();

        for country in countries {
            let Some(url) = mapping.get(country) else {
                tracing::warn!(country, "no region URL for country");
                let warning = RunWarning::UnknownCountry {
                    country: country.to_string(),
                };
                sink.event(ProgressEvent {
                    message: format!("warning: {warning}"),
                    elapsed: None,
                });
                result.warnings.push(warning);
                continue;
            };

            sink.event(ProgressEvent {
                message: format!("phase=Fetch; listing {country} from {url}"),
                elapsed: None,
            });
            tracing::info!(country, url, "fetching listing");
            let start = Instant::now();
            match self.directory.fetch_listing(url) {
                Ok(listing) => {
                    sink.event(ProgressEvent {
                        message: format!("{country}: {} archives listed", listing.len()),
                        elapsed: Some(start.elapsed()),
                    });
                    result.files.insert(country.to_string(), listing.records);
                }
                Err(err) => {
                    tracing::warn!(country, url, error = %err, "listing fetch failed");
                    let warning = RunWarning::ListingFailed {
                        country: country.to_string(),
                        url: url.to_string(),
                        reason: err.to_string(),
                    };
                    sink.event(ProgressEvent {
                        message: format!("warning: {warning}"),
                        elapsed: Some(start.elapsed()),
                    });
                    result.warnings.push(warning);
                }
            }
        }

        result
    }

    pub fn resolve(
        &self,
        pairs: &[RequestPair],
        mapping: &CountryMap,
        sink: &dyn ProgressSink,
    ) -> ResolveOutcome {
        let CountryFiles { files, warnings } = self.fetch_country_files(pairs, mapping, sink);
        sink.event(ProgressEvent {
            message: format!(
                "phase=Resolve; matching {} pairs with {} strategy",
                pairs.len(),
                self.strategy.name()
            ),
            elapsed: None,
        });
        let session = ResolutionSession::build(pairs, &files, self.strategy.as_ref());
        let pending = session.pending().len();
        if pending > 0 {
            sink.event(ProgressEvent {
                message: format!("{pending} pairs need a manual choice"),
                elapsed: None,
            });
        }
        ResolveOutcome { session, warnings }
    }

    /// Reads the pairs from `input_path` and resolves them. An unreadable or
    /// malformed input fails before any listing is requested.
    pub fn resolve_input(
        &self,
        input_path: &Path,
        mapping: &CountryMap,
        sink: &dyn ProgressSink,
    ) -> Result<(InputPairs, ResolveOutcome), SelectorError> {
        let input = input::read_pairs(input_path)?;
        tracing::info!(
            pairs = input.pairs.len(),
            skipped = input.skipped_rows.len(),
            "loaded input"
        );
        let outcome = self.resolve(&input.pairs, mapping, sink);
        Ok((input, outcome))
    }

    pub fn bundle(&self, report: &Report, sink: &dyn ProgressSink) -> Result<Bundle, SelectorError> {
        sink.event(ProgressEvent {
            message: "phase=Bundle; downloading selected files".to_string(),
            elapsed: None,
        });
        bundle::assemble_bundle(&report.rows, &self.content, sink)
    }

    pub fn export_dir(
        &self,
        report: &Report,
        base_dir: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<DirectoryExport, SelectorError> {
        bundle::export_to_dir(&report.rows, &self.content, base_dir, sink)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::listing::parse_listing;
    use crate::output::JsonOutput;

    #[derive(Default)]
    struct MockDirectory {
        calls: Mutex<Vec<String>>,
    }

    impl DirectoryFetcher for MockDirectory {
        fn fetch_listing(&self, region_url: &str) -> Result<Listing, SelectorError> {
            self.calls.lock().unwrap().push(region_url.to_string());
            if region_url.contains("nepal") {
                return Err(SelectorError::ListingHttp("connection refused".to_string()));
            }
            Ok(parse_listing(
                region_url,
                r#"<a href="MH/MUM_MH_Mumbai.430030_TMYx.zip">MUM_MH_Mumbai.430030_TMYx.zip</a>"#,
            ))
        }
    }

    struct NoContent;

    impl ContentFetcher for NoContent {
        fn fetch_content(&self, url: &str) -> Result<Vec<u8>, SelectorError> {
            Err(SelectorError::ContentHttp(format!("offline: {url}")))
        }
    }

    #[test]
    fn fetches_each_country_once_and_keeps_going() {
        let mapping = CountryMap::from_entries([
            ("INDIA", "https://example.org/india/"),
            ("NEPAL", "https://example.org/nepal/"),
        ]);
        let pairs = vec![
            RequestPair::new("Mumbai", "INDIA"),
            RequestPair::new("Kathmandu", "NEPAL"),
            RequestPair::new("Mumbai", "india"),
            RequestPair::new("Atlantis", "ATLANTIS"),
        ];
        let app = App::new(MockDirectory::default(), NoContent);
        let outcome = app.resolve(&pairs, &mapping, &JsonOutput);

        assert_eq!(
            *app.directory.calls.lock().unwrap(),
            vec!["https://example.org/india/", "https://example.org/nepal/"]
        );
        assert_eq!(outcome.warnings.len(), 2);
        assert!(matches!(&outcome.warnings[0], RunWarning::UnknownCountry { country } if country == "ATLANTIS"));
        assert!(matches!(&outcome.warnings[1], RunWarning::ListingFailed { country, .. } if country == "NEPAL"));

        let report = outcome.session.finalize();
        let statuses = report.rows.iter().map(|row| row.is_found()).collect::<Vec<_>>();
        assert_eq!(statuses, vec![true, false, true, false]);
    }
}
