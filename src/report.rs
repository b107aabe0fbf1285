use std::fmt;
use std::path::Path;

use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;

use crate::domain::Resolution;
use crate::error::SelectorError;
use crate::fs_util;

pub const REPORT_HEADERS: [&str; 5] = [
    "City",
    "Country",
    "Weather File-zip",
    "Weather File Url",
    "Status",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowStatus {
    Found,
    #[serde(rename = "Not found")]
    NotFound,
}

impl RowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RowStatus::Found => "Found",
            RowStatus::NotFound => "Not found",
        }
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Weather File-zip")]
    pub weather_file_zip: String,
    #[serde(rename = "Weather File Url")]
    pub weather_file_url: String,
    #[serde(rename = "Status")]
    pub status: RowStatus,
}

impl ReportRow {
    pub fn is_found(&self) -> bool {
        self.status == RowStatus::Found
    }

    fn cells(&self) -> [&str; 5] {
        [
            self.city.as_str(),
            self.country.as_str(),
            self.weather_file_zip.as_str(),
            self.weather_file_url.as_str(),
            self.status.as_str(),
        ]
    }
}

impl From<&Resolution> for ReportRow {
    fn from(resolution: &Resolution) -> Self {
        let (file, url, status) = match (&resolution.file, resolution.is_resolved()) {
            (Some(file), true) => (
                file.display_name.clone(),
                file.absolute_url.clone(),
                RowStatus::Found,
            ),
            _ => (String::new(), String::new(), RowStatus::NotFound),
        };
        Self {
            city: resolution.pair.city.clone(),
            country: resolution.pair.country.clone(),
            weather_file_zip: file,
            weather_file_url: url,
            status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    pub found: usize,
    pub not_found: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub rows: Vec<ReportRow>,
    pub generated_at: String,
}

impl Report {
    pub fn new(rows: Vec<ReportRow>) -> Self {
        Self {
            rows,
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn counts(&self) -> ReportCounts {
        let found = self.rows.iter().filter(|row| row.is_found()).count();
        ReportCounts {
            found,
            not_found: self.rows.len() - found,
        }
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, SelectorError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(REPORT_HEADERS)
            .map_err(|err| SelectorError::ReportWrite(err.to_string()))?;
        for row in &self.rows {
            writer
                .write_record(row.cells())
                .map_err(|err| SelectorError::ReportWrite(err.to_string()))?;
        }
        writer
            .into_inner()
            .map_err(|err| SelectorError::ReportWrite(err.to_string()))
    }

    pub fn to_xlsx_bytes(&self) -> Result<Vec<u8>, SelectorError> {
        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();
        let worksheet = workbook.add_worksheet();
        for (col, header) in REPORT_HEADERS.iter().enumerate() {
            worksheet
                .write_string_with_format(0, col as u16, *header, &bold)
                .map_err(|err| SelectorError::ReportWrite(err.to_string()))?;
        }
        for (index, row) in self.rows.iter().enumerate() {
            for (col, value) in row.cells().iter().enumerate() {
                worksheet
                    .write_string(index as u32 + 1, col as u16, *value)
                    .map_err(|err| SelectorError::ReportWrite(err.to_string()))?;
            }
        }
        workbook
            .save_to_buffer()
            .map_err(|err| SelectorError::ReportWrite(err.to_string()))
    }

    /// Writes the report as `.csv` or, for any other extension, `.xlsx`.
    pub fn write_to(&self, path: &Path) -> Result<(), SelectorError> {
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        let bytes = if is_csv {
            self.to_csv_bytes()?
        } else {
            self.to_xlsx_bytes()?
        };
        fs_util::write_bytes_atomic(path, &bytes)
    }
}
