use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::{FileRecord, PairKey, RequestPair, Resolution};
use crate::error::SelectorError;
use crate::matching::MatchStrategy;
use crate::report::{Report, ReportRow};

const INTL_AIRPORT_MARKER: &str = ".intl.ap";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoDecision {
    Resolved(FileRecord),
    Ambiguous(Vec<FileRecord>),
    NoCandidates,
}

/// Picks a winner among `candidates`: the first international airport
/// station, otherwise the only candidate. Anything else is left to the user.
pub fn auto_resolve(candidates: &[&FileRecord]) -> AutoDecision {
    if let Some(airport) = candidates
        .iter()
        .find(|file| file.display_name.to_lowercase().contains(INTL_AIRPORT_MARKER))
    {
        return AutoDecision::Resolved((*airport).clone());
    }
    match candidates {
        [] => AutoDecision::NoCandidates,
        [only] => AutoDecision::Resolved((*only).clone()),
        many => AutoDecision::Ambiguous(many.iter().map(|file| (*file).clone()).collect()),
    }
}

/// Keeps the first candidate of each display name, in listing order.
fn unique_by_name(candidates: Vec<&FileRecord>) -> Vec<&FileRecord> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|file| seen.insert(file.display_name.as_str()))
        .collect()
}

/// A pair waiting for the user to pick one of several archives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Disambiguation {
    pub key: PairKey,
    pub options: Vec<String>,
}

/// One manual pick as stored in a choices file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceEntry {
    pub city: String,
    pub country: String,
    pub file: String,
}

/// Manual picks, keyed by pair identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualChoices(BTreeMap<PairKey, String>);

impl ManualChoices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: PairKey, file: impl Into<String>) {
        self.0.insert(key, file.into());
    }

    pub fn get(&self, key: &PairKey) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &str)> {
        self.0.iter().map(|(key, file)| (key, file.as_str()))
    }

    pub fn from_entries(entries: Vec<ChoiceEntry>) -> Self {
        let mut choices = Self::new();
        for entry in entries {
            choices.insert(PairKey::new(&entry.city, &entry.country), entry.file.trim());
        }
        choices
    }

    pub fn to_entries(&self) -> Vec<ChoiceEntry> {
        self.0
            .iter()
            .map(|(key, file)| ChoiceEntry {
                city: key.city.clone(),
                country: key.country.clone(),
                file: file.clone(),
            })
            .collect()
    }
}

/// Parses a `CITY|COUNTRY=FILE` command-line choice.
pub fn parse_choice_spec(value: &str) -> Result<(PairKey, String), SelectorError> {
    let (key, file) = value
        .split_once('=')
        .ok_or_else(|| SelectorError::InvalidChoiceSpec(value.to_string()))?;
    let file = file.trim();
    if file.is_empty() {
        return Err(SelectorError::InvalidChoiceSpec(value.to_string()));
    }
    let key = key
        .parse::<PairKey>()
        .map_err(|_| SelectorError::InvalidChoiceSpec(value.to_string()))?;
    Ok((key, file.to_string()))
}

/// Resolution state of one run: one resolution per input pair plus the
/// disambiguations still open.
#[derive(Debug, Clone)]
pub struct ResolutionSession {
    resolutions: Vec<Resolution>,
    disambiguations: Vec<Disambiguation>,
    candidates: HashMap<PairKey, Vec<FileRecord>>,
    choices: ManualChoices,
}

impl ResolutionSession {
    /// `country_files` holds the listing of every country that could be
    /// fetched; pairs of other countries are unresolved.
    pub fn build(
        pairs: &[RequestPair],
        country_files: &HashMap<String, Vec<FileRecord>>,
        strategy: &dyn MatchStrategy,
    ) -> Self {
        let mut resolutions = Vec::with_capacity(pairs.len());
        let mut disambiguations = Vec::new();
        let mut candidates = HashMap::new();

        for pair in pairs {
            let Some(files) = country_files.get(&pair.country) else {
                resolutions.push(Resolution::unresolved(pair.clone()));
                continue;
            };
            let matches = unique_by_name(strategy.candidates(pair, files));
            tracing::debug!(pair = %pair, candidates = matches.len(), "matched pair");
            match auto_resolve(&matches) {
                AutoDecision::Resolved(file) => {
                    resolutions.push(Resolution::resolved(pair.clone(), file));
                }
                AutoDecision::NoCandidates => {
                    resolutions.push(Resolution::unresolved(pair.clone()));
                }
                AutoDecision::Ambiguous(options) => {
                    let key = pair.key();
                    if !candidates.contains_key(&key) {
                        disambiguations.push(Disambiguation {
                            key: key.clone(),
                            options: options.iter().map(|f| f.display_name.clone()).collect(),
                        });
                        candidates.insert(key, options);
                    }
                    resolutions.push(Resolution::unresolved(pair.clone()));
                }
            }
        }

        Self {
            resolutions,
            disambiguations,
            candidates,
            choices: ManualChoices::new(),
        }
    }

    pub fn resolutions(&self) -> &[Resolution] {
        &self.resolutions
    }

    /// Every disambiguation of the run, answered or not.
    pub fn disambiguations(&self) -> &[Disambiguation] {
        &self.disambiguations
    }

    pub fn pending(&self) -> Vec<&Disambiguation> {
        self.disambiguations
            .iter()
            .filter(|item| self.choices.get(&item.key).is_none())
            .collect()
    }

    pub fn choices(&self) -> &ManualChoices {
        &self.choices
    }

    /// Records `file` as the pick for `key`, overriding the state of every
    /// pair with that identity.
    pub fn apply_choice(&mut self, key: &PairKey, file: &str) -> Result<(), SelectorError> {
        let options = self
            .candidates
            .get(key)
            .ok_or_else(|| SelectorError::UnknownPair {
                city: key.city.clone(),
                country: key.country.clone(),
            })?;
        let chosen = options
            .iter()
            .find(|option| option.display_name == file.trim())
            .cloned()
            .ok_or_else(|| SelectorError::InvalidChoice {
                city: key.city.clone(),
                country: key.country.clone(),
                file: file.to_string(),
            })?;

        for resolution in self.resolutions.iter_mut() {
            if resolution.pair.key() == *key {
                *resolution = Resolution::resolved(resolution.pair.clone(), chosen.clone());
            }
        }
        self.choices.insert(key.clone(), chosen.display_name);
        Ok(())
    }

    pub fn apply_choices(&mut self, choices: &ManualChoices) -> Result<(), SelectorError> {
        for (key, file) in choices.iter() {
            self.apply_choice(key, file)?;
        }
        Ok(())
    }

    pub fn finalize(self) -> Report {
        Report::new(self.resolutions.iter().map(ReportRow::from).collect())
    }
}
