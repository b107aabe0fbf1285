use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::time::Instant;

use camino::Utf8PathBuf;
use reqwest::blocking::Client;
use serde::Serialize;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::app::{ProgressEvent, ProgressSink};
use crate::error::SelectorError;
use crate::fs_util;
use crate::http::{self, HttpSettings};
use crate::report::ReportRow;

pub trait ContentFetcher: Send + Sync {
    fn fetch_content(&self, url: &str) -> Result<Vec<u8>, SelectorError>;
}

impl<T: ContentFetcher + ?Sized> ContentFetcher for &T {
    fn fetch_content(&self, url: &str) -> Result<Vec<u8>, SelectorError> {
        (**self).fetch_content(url)
    }
}

#[derive(Clone)]
pub struct HttpContentFetcher {
    client: Client,
}

impl HttpContentFetcher {
    pub fn new(settings: HttpSettings) -> Result<Self, SelectorError> {
        let client = http::build_client(settings, SelectorError::ContentHttp)?;
        Ok(Self { client })
    }
}

impl ContentFetcher for HttpContentFetcher {
    fn fetch_content(&self, url: &str) -> Result<Vec<u8>, SelectorError> {
        let response = http::send_with_retries(|| self.client.get(url), SelectorError::ContentHttp)?;
        if !response.status().is_success() {
            return Err(SelectorError::ContentStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        let bytes = response
            .bytes()
            .map_err(|err| SelectorError::ContentHttp(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleFailure {
    pub file: String,
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BundleSummary {
    pub entries: Vec<String>,
    pub failures: Vec<BundleFailure>,
}

#[derive(Debug, Clone)]
pub struct Bundle {
    pub bytes: Vec<u8>,
    pub entries: Vec<String>,
    pub failures: Vec<BundleFailure>,
}

impl Bundle {
    pub fn summary(&self) -> BundleSummary {
        BundleSummary {
            entries: self.entries.clone(),
            failures: self.failures.clone(),
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<(), SelectorError> {
        fs_util::write_bytes_atomic(path, &self.bytes)
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryExport {
    pub dir: Utf8PathBuf,
    pub files: Vec<String>,
    pub failures: Vec<BundleFailure>,
}

/// Packs every Found row into one in-memory ZIP.
///
/// A row whose content cannot be fetched is logged, recorded in
/// `failures` and left out; the archive is produced even if nothing
/// succeeds. Rows sharing a display name are written once.
pub fn assemble_bundle(
    rows: &[ReportRow],
    fetcher: &dyn ContentFetcher,
    sink: &dyn ProgressSink,
) -> Result<Bundle, SelectorError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut entries = Vec::new();
    let mut failures = Vec::new();

    for_each_found(rows, fetcher, sink, &mut failures, |name, content| {
        writer
            .start_file(name, options)
            .map_err(|err| SelectorError::BundleWrite(err.to_string()))?;
        writer
            .write_all(content)
            .map_err(|err| SelectorError::BundleWrite(err.to_string()))?;
        entries.push(name.to_string());
        Ok(())
    })?;

    let bytes = writer
        .finish()
        .map_err(|err| SelectorError::BundleWrite(err.to_string()))?
        .into_inner();
    sink.event(ProgressEvent {
        message: format!(
            "phase=Bundle; {} files packed, {} failed",
            entries.len(),
            failures.len()
        ),
        elapsed: None,
    });
    Ok(Bundle {
        bytes,
        entries,
        failures,
    })
}

/// Writes every Found row into a fresh `download_<timestamp>` directory
/// under `base_dir`, with the same per-file tolerance as the bundle.
pub fn export_to_dir(
    rows: &[ReportRow],
    fetcher: &dyn ContentFetcher,
    base_dir: &Path,
    sink: &dyn ProgressSink,
) -> Result<DirectoryExport, SelectorError> {
    let dir = fs_util::create_timestamped_dir(base_dir)?;
    let mut files = Vec::new();
    let mut failures = Vec::new();

    for_each_found(rows, fetcher, sink, &mut failures, |name, content| {
        fs_util::write_bytes_atomic(dir.join(name).as_std_path(), content)?;
        files.push(name.to_string());
        Ok(())
    })?;

    sink.event(ProgressEvent {
        message: format!("phase=Export; {} files written to {dir}", files.len()),
        elapsed: None,
    });
    Ok(DirectoryExport {
        dir,
        files,
        failures,
    })
}

fn for_each_found<F>(
    rows: &[ReportRow],
    fetcher: &dyn ContentFetcher,
    sink: &dyn ProgressSink,
    failures: &mut Vec<BundleFailure>,
    mut store: F,
) -> Result<(), SelectorError>
where
    F: FnMut(&str, &[u8]) -> Result<(), SelectorError>,
{
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for row in rows.iter().filter(|row| row.is_found()) {
        let name = row.weather_file_zip.as_str();
        let url = row.weather_file_url.as_str();
        if let Some(first_url) = seen.get(name) {
            if *first_url != url {
                tracing::warn!(file = name, url, first_url = *first_url, "skipping file whose name is already bundled");
                sink.event(ProgressEvent {
                    message: format!("warning: {name} from {url} clashes with an earlier file of the same name"),
                    elapsed: None,
                });
                failures.push(BundleFailure {
                    file: name.to_string(),
                    url: url.to_string(),
                    reason: format!("name already used by {first_url}"),
                });
            }
            continue;
        }
        seen.insert(name, url);
        if !fs_util::is_safe_entry_name(name) {
            tracing::warn!(file = name, "skipping file with unsafe name");
            failures.push(BundleFailure {
                file: name.to_string(),
                url: row.weather_file_url.clone(),
                reason: "unsafe file name".to_string(),
            });
            continue;
        }

        let start = Instant::now();
        match fetcher.fetch_content(&row.weather_file_url) {
            Ok(content) => {
                sink.event(ProgressEvent {
                    message: format!("fetched {name} ({} bytes)", content.len()),
                    elapsed: Some(start.elapsed()),
                });
                store(name, &content)?;
            }
            Err(err) => {
                tracing::warn!(file = name, url = %row.weather_file_url, error = %err, "failed to download file");
                sink.event(ProgressEvent {
                    message: format!("warning: failed to download {name}: {err}"),
                    elapsed: Some(start.elapsed()),
                });
                failures.push(BundleFailure {
                    file: name.to_string(),
                    url: row.weather_file_url.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Read;

    use zip::ZipArchive;

    use super::*;
    use crate::output::JsonOutput;
    use crate::report::RowStatus;

    struct MapFetcher(HashMap<String, Vec<u8>>);

    impl ContentFetcher for MapFetcher {
        fn fetch_content(&self, url: &str) -> Result<Vec<u8>, SelectorError> {
            self.0.get(url).cloned().ok_or_else(|| SelectorError::ContentStatus {
                status: 404,
                url: url.to_string(),
            })
        }
    }

    fn row(name: &str, status: RowStatus) -> ReportRow {
        ReportRow {
            city: "City".to_string(),
            country: "INDIA".to_string(),
            weather_file_zip: name.to_string(),
            weather_file_url: format!("https://example.org/india/G/{name}"),
            status,
        }
    }

    fn fetcher_for(names: &[&str]) -> MapFetcher {
        MapFetcher(
            names
                .iter()
                .map(|name| (format!("https://example.org/india/G/{name}"), name.as_bytes().to_vec()))
                .collect(),
        )
    }

    #[test]
    fn failed_fetch_is_left_out() {
        let rows = vec![
            row("A_TMYx.zip", RowStatus::Found),
            row("B_TMYx.zip", RowStatus::Found),
            row("C_TMYx.zip", RowStatus::Found),
            row("", RowStatus::NotFound),
        ];
        let fetcher = fetcher_for(&["A_TMYx.zip", "C_TMYx.zip"]);
        let bundle = assemble_bundle(&rows, &fetcher, &JsonOutput).unwrap();

        assert_eq!(bundle.entries, vec!["A_TMYx.zip", "C_TMYx.zip"]);
        assert_eq!(bundle.failures.len(), 1);
        assert_eq!(bundle.failures[0].file, "B_TMYx.zip");

        let mut archive = ZipArchive::new(Cursor::new(bundle.bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut content = String::new();
        archive
            .by_name("C_TMYx.zip")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "C_TMYx.zip");
    }

    #[test]
    fn empty_bundle_is_still_an_archive() {
        let rows = vec![row("A_TMYx.zip", RowStatus::Found)];
        let bundle = assemble_bundle(&rows, &fetcher_for(&[]), &JsonOutput).unwrap();
        assert!(bundle.entries.is_empty());
        let archive = ZipArchive::new(Cursor::new(bundle.bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }

    #[test]
    fn duplicate_rows_are_written_once() {
        let rows = vec![
            row("A_TMYx.zip", RowStatus::Found),
            row("A_TMYx.zip", RowStatus::Found),
        ];
        let bundle = assemble_bundle(&rows, &fetcher_for(&["A_TMYx.zip"]), &JsonOutput).unwrap();
        assert_eq!(bundle.entries, vec!["A_TMYx.zip"]);
        assert!(bundle.failures.is_empty());
    }

    #[test]
    fn same_name_from_another_url_is_reported() {
        let mut other = row("A_TMYx.zip", RowStatus::Found);
        other.country = "NEPAL".to_string();
        other.weather_file_url = "https://example.org/nepal/G/A_TMYx.zip".to_string();
        let rows = vec![row("A_TMYx.zip", RowStatus::Found), other];
        let bundle = assemble_bundle(&rows, &fetcher_for(&["A_TMYx.zip"]), &JsonOutput).unwrap();

        assert_eq!(bundle.entries, vec!["A_TMYx.zip"]);
        assert_eq!(bundle.failures.len(), 1);
        assert_eq!(bundle.failures[0].url, "https://example.org/nepal/G/A_TMYx.zip");
        assert!(bundle.failures[0].reason.contains("https://example.org/india/G/A_TMYx.zip"));
    }

    #[test]
    fn export_writes_into_timestamped_dir() {
        let temp = tempfile::tempdir().unwrap();
        let rows = vec![
            row("A_TMYx.zip", RowStatus::Found),
            row("B_TMYx.zip", RowStatus::Found),
        ];
        let export =
            export_to_dir(&rows, &fetcher_for(&["B_TMYx.zip"]), temp.path(), &JsonOutput).unwrap();

        assert_eq!(export.files, vec!["B_TMYx.zip"]);
        assert_eq!(export.failures.len(), 1);
        let written = std::fs::read(export.dir.join("B_TMYx.zip").as_std_path()).unwrap();
        assert_eq!(written, b"B_TMYx.zip");
        assert!(!export.dir.join("A_TMYx.zip").as_std_path().exists());
    }
}
