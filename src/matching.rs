use crate::domain::{FileRecord, MatchStrategyKind, RequestPair};
use crate::filename::ParsedFilename;
use crate::normalize::{name_contains, names_equal};

const TMYX_SUFFIX: &str = "tmyx.zip";

/// Decides which records of a country's listing are candidates for a pair.
///
/// Implementations must keep the relative listing order of the records they
/// return unless they document a different ordering.
pub trait MatchStrategy: Send + Sync {
    fn candidates<'a>(&self, pair: &RequestPair, files: &'a [FileRecord]) -> Vec<&'a FileRecord>;

    fn name(&self) -> &'static str;
}

/// Normalized city contained in the normalized display name, which must end
/// in `tmyx.zip`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatch;

impl MatchStrategy for SubstringMatch {
    fn candidates<'a>(&self, pair: &RequestPair, files: &'a [FileRecord]) -> Vec<&'a FileRecord> {
        files
            .iter()
            .filter(|file| {
                name_contains(&file.display_name, &pair.city)
                    && file.display_name.to_lowercase().ends_with(TMYX_SUFFIX)
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "substring"
    }
}

/// Exact city token match on names of the `IND_<cc>_<city>.<id>_TMYx.zip`
/// shape.
///
/// With a region hint, only candidates whose region code equals the hint or
/// whose group key contains it are returned, so a single hinted station
/// resolves on its own. Without a hinted match every candidate is kept.
#[derive(Debug, Clone, Default)]
pub struct StrictFilenameMatch {
    region_hint: Option<String>,
}

impl StrictFilenameMatch {
    pub fn new(region_hint: Option<String>) -> Self {
        let region_hint = region_hint
            .map(|hint| hint.trim().to_string())
            .filter(|hint| !hint.is_empty());
        Self { region_hint }
    }

    fn prefers(&self, file: &FileRecord, parsed: &ParsedFilename) -> bool {
        let Some(hint) = &self.region_hint else {
            return false;
        };
        parsed.region_matches(hint) || name_contains(&file.group_key, hint)
    }
}

impl MatchStrategy for StrictFilenameMatch {
    fn candidates<'a>(&self, pair: &RequestPair, files: &'a [FileRecord]) -> Vec<&'a FileRecord> {
        let mut preferred = Vec::new();
        let mut rest = Vec::new();
        for file in files {
            let Some(parsed) = ParsedFilename::parse(&file.display_name) else {
                continue;
            };
            if !names_equal(&parsed.city_token, &pair.city) {
                continue;
            }
            if self.prefers(file, &parsed) {
                preferred.push(file);
            } else {
                rest.push(file);
            }
        }
        if preferred.is_empty() { rest } else { preferred }
    }

    fn name(&self) -> &'static str {
        "strict"
    }
}

pub fn strategy_for(kind: MatchStrategyKind, region_hint: Option<String>) -> Box<dyn MatchStrategy> {
    match kind {
        MatchStrategyKind::Substring => Box::new(SubstringMatch),
        MatchStrategyKind::Strict => Box::new(StrictFilenameMatch::new(region_hint)),
    }
}
