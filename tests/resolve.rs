use std::collections::HashMap;
use std::sync::Mutex;

use assert_matches::assert_matches;

use weather_file_selector::app::{App, RunWarning};
use weather_file_selector::bundle::ContentFetcher;
use weather_file_selector::domain::{PairKey, RequestPair};
use weather_file_selector::error::SelectorError;
use weather_file_selector::listing::{CachedDirectoryFetcher, DirectoryFetcher, Listing, parse_listing};
use weather_file_selector::mapping::CountryMap;
use weather_file_selector::matching::StrictFilenameMatch;
use weather_file_selector::output::JsonOutput;
use weather_file_selector::report::RowStatus;
use weather_file_selector::resolver::ManualChoices;

const INDIA_URL: &str = "https://climate.example.org/ASIA/IND_India/";

const INDIA_LISTING: &str = r#"
<html><body><table>
<tr><td><a href="../">Parent Directory</a></td></tr>
<tr><td><a href="DL/IND_DL_New.Delhi.421820_TMYx.zip">IND_DL_New.Delhi.421820_TMYx.zip</a></td></tr>
<tr><td><a href="DL/IND_DL_New.Delhi-Safdarjung.Intl.AP.421820_TMYx.zip">IND_DL_New.Delhi-Safdarjung.Intl.AP.421820_TMYx.zip</a></td></tr>
<tr><td><a href="MH/IND_MH_Mumbai.430030_TMYx.zip">IND_MH_Mumbai.430030_TMYx.zip</a></td></tr>
<tr><td><a href="MH/IND_MH_Pune.430630_TMYx.zip">IND_MH_Pune.430630_TMYx.zip</a></td></tr>
<tr><td><a href="MH/IND_MH_Pune-Lohegaon.430640_TMYx.zip">IND_MH_Pune-Lohegaon.430640_TMYx.zip</a></td></tr>
<tr><td><a href="MH/IND_MH_Pune.430630_TMYx.2007-2021.zip">IND_MH_Pune.430630_TMYx.2007-2021.zip</a></td></tr>
<tr><td><a href="readme.txt">readme.txt</a></td></tr>
</table></body></html>
"#;

#[derive(Default)]
struct StaticDirectory {
    calls: Mutex<Vec<String>>,
}

impl DirectoryFetcher for StaticDirectory {
    fn fetch_listing(&self, region_url: &str) -> Result<Listing, SelectorError> {
        self.calls.lock().unwrap().push(region_url.to_string());
        if region_url == INDIA_URL {
            Ok(parse_listing(region_url, INDIA_LISTING))
        } else {
            Err(SelectorError::ListingStatus {
                status: 503,
                url: region_url.to_string(),
            })
        }
    }
}

struct NoContent;

impl ContentFetcher for NoContent {
    fn fetch_content(&self, url: &str) -> Result<Vec<u8>, SelectorError> {
        Err(SelectorError::ContentHttp(format!("offline: {url}")))
    }
}

fn mapping() -> CountryMap {
    CountryMap::from_entries([
        ("INDIA", INDIA_URL),
        ("NEPAL", "https://climate.example.org/ASIA/NPL_Nepal/"),
    ])
}

#[test]
fn airport_station_is_picked_automatically() {
    let app = App::new(StaticDirectory::default(), NoContent);
    let pairs = vec![RequestPair::new("New Delhi", "India")];
    let outcome = app.resolve(&pairs, &mapping(), &JsonOutput);

    assert!(outcome.session.pending().is_empty());
    let report = outcome.session.finalize();
    let row = &report.rows[0];
    assert_eq!(row.status, RowStatus::Found);
    assert_eq!(row.weather_file_zip, "IND_DL_New.Delhi-Safdarjung.Intl.AP.421820_TMYx.zip");
    assert_eq!(
        row.weather_file_url,
        "https://climate.example.org/ASIA/IND_India/DL/IND_DL_New.Delhi-Safdarjung.Intl.AP.421820_TMYx.zip"
    );
}

#[test]
fn single_candidate_is_picked_automatically() {
    let app = App::new(StaticDirectory::default(), NoContent);
    let pairs = vec![RequestPair::new("mumbai", "INDIA")];
    let report = app.resolve(&pairs, &mapping(), &JsonOutput).session.finalize();

    assert_eq!(report.rows[0].weather_file_zip, "IND_MH_Mumbai.430030_TMYx.zip");
    assert_eq!(report.rows[0].city, "mumbai");
    assert_eq!(report.counts().found, 1);
}

#[test]
fn unknown_country_is_not_fetched() {
    let app = App::new(StaticDirectory::default(), NoContent);
    let pairs = vec![RequestPair::new("Poseidonis", "Atlantis")];
    let outcome = app.resolve(&pairs, &mapping(), &JsonOutput);

    assert_eq!(
        outcome.warnings,
        vec![RunWarning::UnknownCountry {
            country: "ATLANTIS".to_string()
        }]
    );
    let report = outcome.session.finalize();
    assert_eq!(report.rows[0].status, RowStatus::NotFound);
    assert_eq!(report.rows[0].weather_file_zip, "");
    assert_eq!(report.rows[0].weather_file_url, "");
}

#[test]
fn failed_listing_only_affects_its_country() {
    let directory = StaticDirectory::default();
    let app = App::new(&directory, NoContent);
    let pairs = vec![
        RequestPair::new("Kathmandu", "NEPAL"),
        RequestPair::new("Mumbai", "INDIA"),
    ];
    let outcome = app.resolve(&pairs, &mapping(), &JsonOutput);

    assert_matches!(
        outcome.warnings.as_slice(),
        [RunWarning::ListingFailed { country, .. }] if country == "NEPAL"
    );
    let report = outcome.session.finalize();
    let statuses = report.rows.iter().map(|row| row.status).collect::<Vec<_>>();
    assert_eq!(statuses, vec![RowStatus::NotFound, RowStatus::Found]);
    assert_eq!(directory.calls.lock().unwrap().len(), 2);
}

#[test]
fn ambiguous_pair_waits_for_a_choice() {
    let app = App::new(StaticDirectory::default(), NoContent);
    let pairs = vec![RequestPair::new("Pune", "INDIA")];
    let outcome = app.resolve(&pairs, &mapping(), &JsonOutput);

    let pending = outcome.session.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].key, PairKey::new("Pune", "INDIA"));
    assert_eq!(
        pending[0].options,
        vec![
            "IND_MH_Pune.430630_TMYx.zip".to_string(),
            "IND_MH_Pune-Lohegaon.430640_TMYx.zip".to_string(),
        ]
    );

    let report = outcome.session.finalize();
    assert_eq!(report.rows[0].status, RowStatus::NotFound);
}

#[test]
fn manual_choice_overrides_every_duplicate_row() {
    let app = App::new(StaticDirectory::default(), NoContent);
    let pairs = vec![
        RequestPair::new("Pune", "INDIA"),
        RequestPair::new("Mumbai", "INDIA"),
        RequestPair::new("Pune", "india"),
    ];
    let mut session = app.resolve(&pairs, &mapping(), &JsonOutput).session;

    let mut choices = ManualChoices::new();
    choices.insert(
        PairKey::new("Pune", "INDIA"),
        "IND_MH_Pune-Lohegaon.430640_TMYx.zip",
    );
    session.apply_choices(&choices).unwrap();
    let report = session.finalize();

    let names = report
        .rows
        .iter()
        .map(|row| row.weather_file_zip.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec![
            "IND_MH_Pune-Lohegaon.430640_TMYx.zip",
            "IND_MH_Mumbai.430030_TMYx.zip",
            "IND_MH_Pune-Lohegaon.430640_TMYx.zip",
        ]
    );
    assert_eq!(report.counts().found, 3);
}

#[test]
fn rows_keep_input_order() {
    let app = App::new(StaticDirectory::default(), NoContent);
    let pairs = vec![
        RequestPair::new("Mumbai", "INDIA"),
        RequestPair::new("Atlantis", "ATLANTIS"),
        RequestPair::new("New Delhi", "INDIA"),
        RequestPair::new("Mumbai", "INDIA"),
    ];
    let report = app.resolve(&pairs, &mapping(), &JsonOutput).session.finalize();

    let cities = report.rows.iter().map(|row| row.city.as_str()).collect::<Vec<_>>();
    assert_eq!(cities, vec!["Mumbai", "Atlantis", "New Delhi", "Mumbai"]);
    assert_eq!(report.counts().found, 3);
    assert_eq!(report.counts().not_found, 1);
}

#[test]
fn cached_fetcher_lists_each_region_once() {
    let inner = StaticDirectory::default();
    let cached = CachedDirectoryFetcher::new(&inner);
    let app = App::new(&cached, NoContent);
    let pairs = vec![RequestPair::new("Mumbai", "INDIA")];

    app.resolve(&pairs, &mapping(), &JsonOutput);
    app.resolve(&pairs, &mapping(), &JsonOutput);

    assert_eq!(inner.calls.lock().unwrap().len(), 1);
    assert_eq!(cached.cached_urls(), 1);
}

#[test]
fn strict_strategy_ignores_suffixed_stations() {
    let app = App::new(StaticDirectory::default(), NoContent)
        .with_strategy(Box::new(StrictFilenameMatch::new(None)));
    let pairs = vec![RequestPair::new("Pune", "INDIA")];
    let outcome = app.resolve(&pairs, &mapping(), &JsonOutput);

    assert_eq!(app.strategy_name(), "strict");
    assert!(outcome.session.pending().is_empty());
    let report = outcome.session.finalize();
    assert_eq!(report.rows[0].weather_file_zip, "IND_MH_Pune.430630_TMYx.zip");
}

#[test]
fn listing_skips_non_archives() {
    let listing = parse_listing(INDIA_URL, INDIA_LISTING);
    assert_eq!(listing.len(), 6);
    let groups = listing
        .groups
        .iter()
        .map(|(group, files)| (group.as_str(), files.len()))
        .collect::<HashMap<_, _>>();
    assert_eq!(groups, HashMap::from([("DL", 2), ("MH", 4)]));
}

#[test]
fn missing_header_fails_before_any_listing_fetch() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("cities.csv");
    std::fs::write(&path, "Town,Country\nMumbai,INDIA\n").unwrap();

    let directory = StaticDirectory::default();
    let app = App::new(&directory, NoContent);
    let err = app.resolve_input(&path, &mapping(), &JsonOutput).unwrap_err();

    assert!(err.is_setup_error());
    assert_matches!(err, SelectorError::MissingColumns(missing) if missing == "City");
    assert!(directory.calls.lock().unwrap().is_empty());
}

#[test]
fn input_file_is_resolved_end_to_end() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("cities.csv");
    std::fs::write(&path, "City,Country\nMumbai,India\n,India\nNew Delhi,INDIA\n").unwrap();

    let app = App::new(StaticDirectory::default(), NoContent);
    let (input, outcome) = app.resolve_input(&path, &mapping(), &JsonOutput).unwrap();

    assert_eq!(input.skipped_rows, vec![2]);
    assert_eq!(outcome.session.finalize().counts().found, 2);
}

struct IconLinkDirectory;

impl DirectoryFetcher for IconLinkDirectory {
    fn fetch_listing(&self, region_url: &str) -> Result<Listing, SelectorError> {
        Ok(parse_listing(
            region_url,
            r#"
            <tr><td><a href="MH/IND_MH_Mumbai.430030_TMYx.zip"><img src="/icons/compressed.gif" alt="[   ]"></a></td>
                <td><a href="MH/IND_MH_Mumbai.430030_TMYx.zip">IND_MH_Mumbai.430030_TMYx.zip</a></td></tr>
            "#,
        ))
    }
}

#[test]
fn icon_link_does_not_make_a_single_station_ambiguous() {
    let app = App::new(IconLinkDirectory, NoContent);
    let pairs = vec![RequestPair::new("Mumbai", "INDIA")];
    let outcome = app.resolve(&pairs, &mapping(), &JsonOutput);

    assert!(outcome.session.pending().is_empty());
    let report = outcome.session.finalize();
    assert_eq!(report.rows[0].status, RowStatus::Found);
    assert_eq!(
        report.rows[0].weather_file_url,
        "https://climate.example.org/ASIA/IND_India/MH/IND_MH_Mumbai.430030_TMYx.zip"
    );
}
