//! CSV loader for CapEx records.
//!
//! The header row is checked for every required column before any data row
//! is read, so a malformed source never produces a partial aggregation.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use super::{Measure, Measures, Record, CAPEX_TYPE_COLUMN, MARKET_COLUMN};

/// Failure to read or interpret the records source.
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("Failed to open data source {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Delimiter {0:?} is not a single ASCII character")]
    InvalidDelimiter(char),

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Data source is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Row {row}: column {column} has non-numeric value {value:?}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },
}

/// Column positions resolved from the header row.
struct ColumnIndex {
    market: usize,
    capex_type: usize,
    measures: [usize; 9],
}

impl ColumnIndex {
    fn resolve(headers: &csv::StringRecord) -> Result<Self, DataLoadError> {
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);

        let mut missing = Vec::new();
        let market = position(MARKET_COLUMN);
        if market.is_none() {
            missing.push(MARKET_COLUMN.to_string());
        }
        let capex_type = position(CAPEX_TYPE_COLUMN);
        if capex_type.is_none() {
            missing.push(CAPEX_TYPE_COLUMN.to_string());
        }

        let mut measures = [0usize; 9];
        for (slot, measure) in measures.iter_mut().zip(Measure::ALL) {
            match position(measure.column()) {
                Some(idx) => *slot = idx,
                None => missing.push(measure.column().to_string()),
            }
        }

        match (market, capex_type) {
            (Some(market), Some(capex_type)) if missing.is_empty() => Ok(Self {
                market,
                capex_type,
                measures,
            }),
            _ => Err(DataLoadError::MissingColumns(missing)),
        }
    }
}

/// Load records from a CSV file on disk.
pub fn load_records(path: &Path, delimiter: u8) -> Result<Vec<Record>, DataLoadError> {
    let file = File::open(path).map_err(|source| DataLoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let records = read_records(file, delimiter)?;
    debug!(path = %path.display(), rows = records.len(), "Loaded CapEx records");
    Ok(records)
}

/// Read records from any CSV reader.
///
/// Extra columns are ignored. An empty numeric cell contributes 0 to the sums.
/// Rows with an empty market or CapEx type cannot be keyed and are skipped.
pub fn read_records<R: Read>(reader: R, delimiter: u8) -> Result<Vec<Record>, DataLoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let index = ColumnIndex::resolve(csv_reader.headers()?)?;

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (i, row) in csv_reader.records().enumerate() {
        let row = row?;
        // 1-based data row number, header excluded
        let row_number = i + 1;

        let market = row.get(index.market).unwrap_or_default();
        let capex_type = row.get(index.capex_type).unwrap_or_default();
        if market.is_empty() || capex_type.is_empty() {
            skipped += 1;
            continue;
        }

        let mut measures = Measures::default();
        for (measure, &col) in Measure::ALL.into_iter().zip(index.measures.iter()) {
            let raw = row.get(col).unwrap_or_default();
            *measures.get_mut(measure) = parse_cell(raw).ok_or_else(|| {
                DataLoadError::InvalidValue {
                    row: row_number,
                    column: measure.column().to_string(),
                    value: raw.to_string(),
                }
            })?;
        }

        records.push(Record::new(market, capex_type, measures));
    }

    if skipped > 0 {
        warn!(skipped, "Skipped rows without a market or CapEx type");
    }

    Ok(records)
}

fn parse_cell(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return Some(0.0);
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Market,CapEx_Type,Historical_Spend_Million,Projected_Spend_Million,\
Expected_Asset_Lifespan_Years,Predicted_Risk_Percentage,NPV_Million,Priority_Score,\
Revenue_Impact_Million,Cost_Impact_Million,Margin_Impact_Million";

    #[test]
    fn test_reads_rows_in_order() {
        let csv = format!("{HEADER}\nM1,A,10,20,5,1,2,3,4,5,6\nM2,B,3,4,5,6,7,8,9,10,11\n");
        let records = read_records(csv.as_bytes(), b',').unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].market, "M1");
        assert_eq!(records[0].capex_type, "A");
        assert_eq!(records[0].measures.historical_spend, 10.0);
        assert_eq!(records[0].measures.projected_spend, 20.0);
        assert_eq!(records[1].measures.margin_impact, 11.0);
    }

    #[test]
    fn test_extra_columns_and_reordering_are_ignored() {
        let csv = "Region,Margin_Impact_Million,Cost_Impact_Million,Revenue_Impact_Million,\
Priority_Score,NPV_Million,Predicted_Risk_Percentage,Expected_Asset_Lifespan_Years,\
Projected_Spend_Million,Historical_Spend_Million,CapEx_Type,Market\n\
EMEA,9,8,7,6,5,4,3,2,1,Network,Germany\n";
        let records = read_records(csv.as_bytes(), b',').unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.market, "Germany");
        assert_eq!(r.capex_type, "Network");
        assert_eq!(r.measures, Measures::from_values([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]));
    }

    #[test]
    fn test_missing_columns_fail_before_rows() {
        // Row is garbage too, but the header check must fire first
        let csv = "Market,CapEx_Type,Historical_Spend_Million\nM1,A,not-a-number\n";
        let err = read_records(csv.as_bytes(), b',').unwrap_err();
        match err {
            DataLoadError::MissingColumns(cols) => {
                assert_eq!(cols.len(), 8);
                assert!(cols.contains(&"Projected_Spend_Million".to_string()));
                assert!(!cols.contains(&"Historical_Spend_Million".to_string()));
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_key_column_is_reported() {
        let header = HEADER.replace("CapEx_Type,", "");
        let err = read_records(format!("{header}\n").as_bytes(), b',').unwrap_err();
        assert!(matches!(err, DataLoadError::MissingColumns(ref c) if c == &vec!["CapEx_Type".to_string()]));
    }

    #[test]
    fn test_non_numeric_cell_is_an_error() {
        let csv = format!("{HEADER}\nM1,A,10,twenty,5,1,2,3,4,5,6\n");
        let err = read_records(csv.as_bytes(), b',').unwrap_err();
        match err {
            DataLoadError::InvalidValue { row, column, value } => {
                assert_eq!(row, 1);
                assert_eq!(column, "Projected_Spend_Million");
                assert_eq!(value, "twenty");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_cells_count_as_zero() {
        let csv = format!("{HEADER}\nM1,A,,20,,,,,,,\n");
        let records = read_records(csv.as_bytes(), b',').unwrap();
        assert_eq!(records[0].measures.historical_spend, 0.0);
        assert_eq!(records[0].measures.projected_spend, 20.0);
    }

    #[test]
    fn test_rows_without_key_are_skipped() {
        let csv = format!("{HEADER}\n,A,1,1,1,1,1,1,1,1,1\nM1,A,1,1,1,1,1,1,1,1,1\n");
        let records = read_records(csv.as_bytes(), b',').unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_semicolon_delimiter() {
        let csv = format!("{}\nM1;A;1;2;3;4;5;6;7;8;9\n", HEADER.replace(',', ";"));
        let records = read_records(csv.as_bytes(), b';').unwrap();
        assert_eq!(records[0].measures.margin_impact, 9.0);
    }

    #[test]
    fn test_missing_file() {
        let err = load_records(Path::new("/definitely/not/here.csv"), b',').unwrap_err();
        assert!(matches!(err, DataLoadError::Open { .. }));
    }
}
