use std::fs::File;
use std::io::Read;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use serde::Serialize;

use crate::domain::RequestPair;
use crate::error::SelectorError;

const SPREADSHEET_EXTS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InputPairs {
    pub pairs: Vec<RequestPair>,
    /// 1-based data row numbers skipped for an empty city or country.
    pub skipped_rows: Vec<usize>,
}

/// Reads (city, country) pairs from a spreadsheet's first sheet or a CSV
/// file, chosen by extension.
pub fn read_pairs(path: &Path) -> Result<InputPairs, SelectorError> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let rows = if ext == "csv" {
        let file = File::open(path).map_err(|err| read_error(path, err.to_string()))?;
        read_csv_rows(file).map_err(|message| read_error(path, message))?
    } else if SPREADSHEET_EXTS.contains(&ext.as_str()) {
        read_sheet_rows(path)?
    } else {
        return Err(SelectorError::UnsupportedInput(path.display().to_string()));
    };
    pairs_from_rows(rows)
}

fn read_error(path: &Path, message: String) -> SelectorError {
    SelectorError::InputRead {
        path: path.to_path_buf(),
        message,
    }
}

fn read_csv_rows<R: Read>(reader: R) -> Result<Vec<Vec<String>>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| err.to_string())?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn read_sheet_rows(path: &Path) -> Result<Vec<Vec<String>>, SelectorError> {
    let mut workbook = open_workbook_auto(path).map_err(|err| read_error(path, err.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| read_error(path, "workbook has no sheets".to_string()))?
        .map_err(|err| read_error(path, err.to_string()))?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Turns a header row plus data rows into pairs.
///
/// The header must contain `City` and `Country` (trimmed, any case). Rows
/// whose city or country is blank are skipped; all others keep their order.
pub fn pairs_from_rows(rows: Vec<Vec<String>>) -> Result<InputPairs, SelectorError> {
    let mut rows = rows.into_iter();
    let header = rows.next().unwrap_or_default();
    let column = |name: &str| {
        header
            .iter()
            .position(|cell| cell.trim().eq_ignore_ascii_case(name))
    };
    let (city_idx, country_idx) = match (column("city"), column("country")) {
        (Some(city), Some(country)) => (city, country),
        (city, country) => {
            let missing = [("City", city), ("Country", country)]
                .into_iter()
                .filter(|(_, idx)| idx.is_none())
                .map(|(name, _)| name)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(SelectorError::MissingColumns(missing));
        }
    };

    let mut input = InputPairs::default();
    for (index, row) in rows.enumerate() {
        let city = row.get(city_idx).map(|v| v.trim()).unwrap_or_default();
        let country = row.get(country_idx).map(|v| v.trim()).unwrap_or_default();
        if city.is_empty() && country.is_empty() {
            continue;
        }
        if city.is_empty() || country.is_empty() {
            tracing::warn!(row = index + 1, city, country, "skipping row with a blank city or country");
            input.skipped_rows.push(index + 1);
            continue;
        }
        input.pairs.push(RequestPair::new(city, country));
    }
    Ok(input)
}
