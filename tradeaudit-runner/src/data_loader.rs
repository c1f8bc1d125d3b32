//! CSV loader for already-normalized trade files.
//!
//! Expected header: `asset, direction, open_time, close_time, entry_price,
//! exit_price, quantity, leverage, pnl, fees`. `leverage`, `pnl` and `fees`
//! may be empty (1, derived from prices, 0). Broker-specific normalization
//! happens upstream; this only parses and validates.

use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use tradeaudit_core::domain::{Direction, TradeError, TradeInput, TradeRecord, TradeSet};

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Errors from loading a trade file. `row` is the 1-based data row.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("row {row}: malformed CSV: {source}")]
    Csv {
        row: usize,
        #[source]
        source: csv::Error,
    },
    #[error("row {row}: invalid {field} '{value}'")]
    Field {
        row: usize,
        field: &'static str,
        value: String,
    },
    #[error("row {row}: {source}")]
    Trade {
        row: usize,
        #[source]
        source: TradeError,
    },
}

#[derive(Debug, Deserialize)]
struct TradeRow {
    asset: String,
    direction: String,
    open_time: String,
    close_time: String,
    entry_price: String,
    exit_price: String,
    quantity: String,
    #[serde(default)]
    leverage: Option<String>,
    #[serde(default)]
    pnl: Option<String>,
    #[serde(default)]
    fees: Option<String>,
}

/// Load and validate a trade CSV into a canonically ordered set.
pub fn load_trades(path: &Path) -> Result<TradeSet, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let set = read_trades(file)?;
    debug!(path = %path.display(), trades = set.len(), "loaded trades");
    Ok(set)
}

/// Parse trades from any CSV source.
pub fn read_trades<R: Read>(reader: R) -> Result<TradeSet, LoadError> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut trades = Vec::new();
    for (i, result) in csv.deserialize::<TradeRow>().enumerate() {
        let row = i + 1;
        let raw = result.map_err(|source| LoadError::Csv { row, source })?;
        trades.push(parse_row(row, raw)?);
    }
    Ok(TradeSet::new(trades))
}

fn parse_row(row: usize, raw: TradeRow) -> Result<TradeRecord, LoadError> {
    let direction = Direction::from_str(&raw.direction)
        .map_err(|source| LoadError::Trade { row, source })?;

    let input = TradeInput {
        asset: raw.asset,
        direction,
        open_time: parse_timestamp(row, "open_time", &raw.open_time)?,
        close_time: parse_timestamp(row, "close_time", &raw.close_time)?,
        entry_price: parse_decimal(row, "entry_price", &raw.entry_price)?,
        exit_price: parse_decimal(row, "exit_price", &raw.exit_price)?,
        quantity: parse_decimal(row, "quantity", &raw.quantity)?,
        leverage: match non_empty(&raw.leverage) {
            Some(v) => v.parse::<f64>().map_err(|_| field_error(row, "leverage", v))?,
            None => 1.0,
        },
        pnl: non_empty(&raw.pnl)
            .map(|v| parse_decimal(row, "pnl", v))
            .transpose()?,
        fees: match non_empty(&raw.fees) {
            Some(v) => parse_decimal(row, "fees", v)?,
            None => Decimal::ZERO,
        },
    };
    TradeRecord::new(input).map_err(|source| LoadError::Trade { row, source })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn field_error(row: usize, field: &'static str, value: &str) -> LoadError {
    LoadError::Field {
        row,
        field,
        value: value.to_string(),
    }
}

fn parse_decimal(row: usize, field: &'static str, value: &str) -> Result<Decimal, LoadError> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|_| field_error(row, field, value))
}

/// Parse a naive timestamp; RFC 3339 values with an offset are converted to UTC.
pub fn parse_timestamp(row: usize, field: &'static str, value: &str) -> Result<NaiveDateTime, LoadError> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.naive_utc()))
        .ok_or_else(|| field_error(row, field, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::io::Write;

    const HEADER: &str =
        "asset,direction,open_time,close_time,entry_price,exit_price,quantity,leverage,pnl,fees\n";

    fn read(body: &str) -> Result<TradeSet, LoadError> {
        read_trades(format!("{HEADER}{body}").as_bytes())
    }

    #[test]
    fn parses_and_orders_rows() {
        let set = read(
            "ETHUSDT,short,2024-01-02 10:00:00,2024-01-02 11:00:00,2000,1990,1.5,20,,0.5\n\
             BTCUSDT,LONG,2024-01-01T09:00:00,2024-01-01T09:30:00,40000,40100,0.1,,12.5,\n",
        )
        .unwrap();
        assert_eq!(set.len(), 2);
        let first = &set.trades()[0];
        assert_eq!(first.asset(), "BTCUSDT");
        assert_eq!(first.leverage(), 1.0);
        assert_eq!(first.pnl(), dec!(12.5));
        assert_eq!(first.fees(), Decimal::ZERO);

        let second = &set.trades()[1];
        assert_eq!(second.direction(), Direction::Short);
        // (2000 - 1990) * 1.5 - 0.5, derived
        assert_eq!(second.pnl(), dec!(14.5));
        assert_eq!(
            second.close_time(),
            NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(11, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn rfc3339_offsets_convert_to_utc() {
        let ts = parse_timestamp(1, "open_time", "2024-03-01T12:00:00+02:00").unwrap();
        assert_eq!(
            ts,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn bad_timestamp_reports_row_and_field() {
        let err = read(
            "BTC,long,2024-01-01 09:00:00,2024-01-01 10:00:00,1,2,1,,,\n\
             BTC,long,yesterday,2024-01-01 10:00:00,1,2,1,,,\n",
        )
        .unwrap_err();
        match err {
            LoadError::Field { row, field, value } => {
                assert_eq!(row, 2);
                assert_eq!(field, "open_time");
                assert_eq!(value, "yesterday");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_trade_reports_row() {
        let err = read("BTC,long,2024-01-01 10:00:00,2024-01-01 09:00:00,1,2,1,,,\n").unwrap_err();
        assert!(matches!(
            err,
            LoadError::Trade {
                row: 1,
                source: TradeError::CloseBeforeOpen { .. }
            }
        ));
        assert!(err.to_string().starts_with("row 1:"));
    }

    #[test]
    fn unknown_direction_rejected() {
        let err = read("BTC,flat,2024-01-01 09:00:00,2024-01-01 10:00:00,1,2,1,,,\n").unwrap_err();
        assert!(matches!(
            err,
            LoadError::Trade {
                source: TradeError::UnknownDirection(_),
                ..
            }
        ));
    }

    #[test]
    fn bad_number_rejected() {
        let err = read("BTC,long,2024-01-01 09:00:00,2024-01-01 10:00:00,abc,2,1,,,\n").unwrap_err();
        assert!(matches!(err, LoadError::Field { field: "entry_price", .. }));
    }

    #[test]
    fn header_only_is_empty_set() {
        let set = read("").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{HEADER}SOL,buy,2024-05-01 00:00:00,2024-05-01 00:10:00,100,101,2,5,,0.1\n"
        )
        .unwrap();
        let set = load_trades(file.path()).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.trades()[0].pnl(), dec!(1.9));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_trades(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
