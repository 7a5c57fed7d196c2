// src/candle_csv.rs
// Candle files for offline scans: `timestamp,open,high,low,close,volume`
// with a header row. Column order is free; a row with any empty
// price/volume field becomes a missing candle, a non-numeric one is an error.

use std::io::Read;
use std::path::Path;

use chrono::DateTime;
use csv::ReaderBuilder;
use log::{debug, warn};

use crate::errors::{EngineError, ServiceError};
use crate::types::{Candle, CandleSeries};

const COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

/// Epoch seconds or an RFC3339 string.
fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>()
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.timestamp()))
}

pub fn read_candles<R: Read>(reader: R) -> Result<CandleSeries, ServiceError> {
    let mut rdr = ReaderBuilder::new().has_headers(true).flexible(true).from_reader(reader);

    let headers = rdr.headers()?.clone();
    let mut idx = [None; 6];
    for (i, name) in headers.iter().enumerate() {
        if let Some(col) = COLUMNS.iter().position(|c| c.eq_ignore_ascii_case(name.trim())) {
            idx[col] = Some(i);
        }
    }
    let [ts_idx, rest @ ..] = idx;
    let missing: Vec<&str> = rest
        .iter()
        .zip(&COLUMNS[1..])
        .filter(|(i, _)| i.is_none())
        .map(|(_, name)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(ServiceError::BadRequest(format!("CSV is missing columns: {}", missing.join(", "))));
    }

    let mut slots = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let field = |col: usize| -> Result<Option<f64>, ServiceError> {
            let Some(raw) = rest[col].and_then(|i| record.get(i)).map(str::trim).filter(|v| !v.is_empty()) else {
                return Ok(None);
            };
            raw.parse::<f64>().map(Some).map_err(|_| {
                EngineError::invalid(format!("row {} column {}: {:?}", row + 1, COLUMNS[col + 1], raw)).into()
            })
        };
        let values = [field(0)?, field(1)?, field(2)?, field(3)?, field(4)?];
        let slot = match values {
            [Some(open), Some(high), Some(low), Some(close), Some(volume)] => {
                let mut candle = Candle::new(open, high, low, close, volume);
                candle.timestamp = ts_idx
                    .and_then(|i| record.get(i))
                    .and_then(parse_timestamp)
                    .unwrap_or_default();
                Some(candle)
            }
            _ => {
                warn!("CSV row {} is incomplete, treating it as a missing candle", row + 1);
                None
            }
        };
        slots.push(slot);
    }

    debug!("Read {} candle rows from CSV", slots.len());
    Ok(CandleSeries::new(slots))
}

pub fn read_candles_file(path: &Path) -> Result<CandleSeries, ServiceError> {
    let file = std::fs::File::open(path)?;
    read_candles(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_rows_and_missing_candles() {
        let data = "timestamp,open,high,low,close,volume\n\
                    1700000000,100,101,99,100.5,10\n\
                    1700003600,,,,,\n\
                    2023-11-14T23:13:20Z,100.5,102,100,101,12\n";
        let series = read_candles(data.as_bytes()).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.get(0).map(|c| c.close), Some(100.5));
        assert!(series.get(1).is_none());
        assert_eq!(series.get(2).map(|c| c.timestamp), Some(1_700_003_600));
    }

    #[test]
    fn non_numeric_field_is_invalid_input() {
        let data = "timestamp,open,high,low,close,volume\n\
                    1,100,101,99,100,10\n\
                    2,100,101,99,abc,10\n";
        let err = read_candles(data.as_bytes()).unwrap_err();
        assert!(matches!(err, ServiceError::Engine(EngineError::InvalidInput(_))), "{:?}", err);
        assert!(err.to_string().contains("row 2 column close"), "{}", err);
    }

    #[test]
    fn column_order_is_free() {
        let data = "close,volume,open,high,low\n10,5,9,11,8\n";
        let series = read_candles(data.as_bytes()).unwrap();
        let candle = series.get(0).unwrap();
        assert_eq!((candle.open, candle.high, candle.low, candle.close), (9.0, 11.0, 8.0, 10.0));
        assert_eq!(candle.timestamp, 0);
    }

    #[test]
    fn missing_columns_are_rejected() {
        let err = read_candles("open,high,low\n1,2,0.5\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("close, volume"));
    }
}
