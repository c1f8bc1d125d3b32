//! TradeRecord: one closed position, the unit of analysis.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Weekday};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Side of a closed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> i64 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("LONG"),
            Direction::Short => f.write_str("SHORT"),
        }
    }
}

impl FromStr for Direction {
    type Err = TradeError;

    /// Accepts LONG/SHORT (any case) and the broker spellings BUY/SELL,
    /// OPEN LONG/CLOSE SHORT etc.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        let side = normalized
            .strip_prefix("OPEN ")
            .or_else(|| normalized.strip_prefix("CLOSE "))
            .unwrap_or(&normalized);
        match side {
            "LONG" | "BUY" => Ok(Direction::Long),
            "SHORT" | "SELL" => Ok(Direction::Short),
            _ => Err(TradeError::UnknownDirection(s.to_string())),
        }
    }
}

/// Errors from building a trade record.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TradeError {
    #[error("close_time {close} precedes open_time {open}")]
    CloseBeforeOpen {
        open: NaiveDateTime,
        close: NaiveDateTime,
    },
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: String },
    #[error("fees must be non-negative, got {0}")]
    NegativeFees(Decimal),
    #[error("asset symbol is empty")]
    EmptyAsset,
    #[error("unknown direction '{0}' (expected LONG or SHORT)")]
    UnknownDirection(String),
    #[error("pnl derived from prices overflows")]
    PnlOverflow,
    #[error("|{field}| must not exceed {limit}, got {value}")]
    OutOfRange {
        field: &'static str,
        limit: i64,
        value: String,
    },
}

/// Largest accepted `|pnl|` and `fees`, in quote units.
///
/// Keeps every per-set `Decimal` sum (totals, equity curves, drawdowns) far
/// inside `Decimal`'s range for any realistic trade count.
pub const MAX_ABS_AMOUNT: i64 = 1_000_000_000_000_000;

/// Unvalidated trade fields, as produced by a loader.
///
/// `pnl: None` means "derive it from prices"; see [`TradeRecord::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeInput {
    pub asset: String,
    pub direction: Direction,
    pub open_time: NaiveDateTime,
    pub close_time: NaiveDateTime,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub quantity: Decimal,
    pub leverage: f64,
    pub pnl: Option<Decimal>,
    pub fees: Decimal,
}

/// A closed position with its derived attributes cached at construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    // ── Identification ──
    asset: String,
    direction: Direction,

    // ── Timing ──
    open_time: NaiveDateTime,
    close_time: NaiveDateTime,

    // ── Execution ──
    entry_price: Decimal,
    exit_price: Decimal,
    quantity: Decimal,
    leverage: f64,

    // ── Result ──
    pnl: Decimal,
    fees: Decimal,

    // ── Derived ──
    duration_ms: i64,
    is_win: bool,
}

impl TradeRecord {
    /// Validate the input and cache the derived attributes.
    ///
    /// When `pnl` is absent it is derived as
    /// `sign(direction) * (exit - entry) * quantity - fees`.
    pub fn new(input: TradeInput) -> Result<Self, TradeError> {
        let TradeInput {
            asset,
            direction,
            open_time,
            close_time,
            entry_price,
            exit_price,
            quantity,
            leverage,
            pnl,
            fees,
        } = input;

        let asset = asset.trim().to_string();
        if asset.is_empty() {
            return Err(TradeError::EmptyAsset);
        }
        if close_time < open_time {
            return Err(TradeError::CloseBeforeOpen {
                open: open_time,
                close: close_time,
            });
        }
        for (field, value) in [
            ("entry_price", entry_price),
            ("exit_price", exit_price),
            ("quantity", quantity),
        ] {
            if value <= Decimal::ZERO {
                return Err(TradeError::NonPositive {
                    field,
                    value: value.to_string(),
                });
            }
        }
        if !(leverage.is_finite() && leverage > 0.0) {
            return Err(TradeError::NonPositive {
                field: "leverage",
                value: leverage.to_string(),
            });
        }
        if fees < Decimal::ZERO {
            return Err(TradeError::NegativeFees(fees));
        }
        check_amount("fees", fees)?;

        let pnl = match pnl {
            Some(pnl) => pnl,
            None => derive_pnl(direction, entry_price, exit_price, quantity, fees)?,
        };
        check_amount("pnl", pnl)?;
        let duration_ms = close_time
            .signed_duration_since(open_time)
            .num_milliseconds();

        Ok(Self {
            asset,
            direction,
            open_time,
            close_time,
            entry_price,
            exit_price,
            quantity,
            leverage,
            pnl,
            fees,
            duration_ms,
            is_win: pnl > Decimal::ZERO,
        })
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn open_time(&self) -> NaiveDateTime {
        self.open_time
    }

    pub fn close_time(&self) -> NaiveDateTime {
        self.close_time
    }

    pub fn entry_price(&self) -> Decimal {
        self.entry_price
    }

    pub fn exit_price(&self) -> Decimal {
        self.exit_price
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn leverage(&self) -> f64 {
        self.leverage
    }

    /// Realized PnL, net of fees.
    pub fn pnl(&self) -> Decimal {
        self.pnl
    }

    pub fn fees(&self) -> Decimal {
        self.fees
    }

    /// PnL before fees.
    pub fn gross_pnl(&self) -> Decimal {
        self.pnl + self.fees
    }

    pub fn pnl_f64(&self) -> f64 {
        self.pnl.to_f64().unwrap_or(0.0)
    }

    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.duration_ms)
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_ms as f64 / 60_000.0
    }

    pub fn is_win(&self) -> bool {
        self.is_win
    }

    pub fn is_loss(&self) -> bool {
        self.pnl < Decimal::ZERO
    }

    /// Zero PnL: neither a win nor a loss.
    pub fn is_breakeven(&self) -> bool {
        self.pnl.is_zero()
    }

    /// Calendar day of the close.
    pub fn calendar_day(&self) -> NaiveDate {
        self.close_time.date()
    }

    /// Hour of day (0-23) of the close.
    pub fn hour(&self) -> u32 {
        self.close_time.hour()
    }

    /// Fractional hour of the close, e.g. 9.5 for 09:30.
    pub fn fractional_hour(&self) -> f64 {
        self.close_time.hour() as f64
            + self.close_time.minute() as f64 / 60.0
            + self.close_time.second() as f64 / 3600.0
    }

    pub fn weekday(&self) -> Weekday {
        self.close_time.weekday()
    }
}

fn derive_pnl(
    direction: Direction,
    entry: Decimal,
    exit: Decimal,
    quantity: Decimal,
    fees: Decimal,
) -> Result<Decimal, TradeError> {
    exit.checked_sub(entry)
        .and_then(|diff| diff.checked_mul(quantity))
        .and_then(|gross| gross.checked_mul(Decimal::from(direction.sign())))
        .and_then(|gross| gross.checked_sub(fees))
        .ok_or(TradeError::PnlOverflow)
}

fn check_amount(field: &'static str, value: Decimal) -> Result<(), TradeError> {
    if value.abs() > Decimal::from(MAX_ABS_AMOUNT) {
        return Err(TradeError::OutOfRange {
            field,
            limit: MAX_ABS_AMOUNT,
            value: value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn sample_input() -> TradeInput {
        TradeInput {
            asset: "BTCUSDT".into(),
            direction: Direction::Long,
            open_time: at(9, 0),
            close_time: at(9, 45),
            entry_price: dec!(100),
            exit_price: dec!(110),
            quantity: dec!(2),
            leverage: 20.0,
            pnl: None,
            fees: dec!(1.5),
        }
    }

    #[test]
    fn derives_pnl_for_long() {
        let trade = TradeRecord::new(sample_input()).unwrap();
        assert_eq!(trade.pnl(), dec!(18.5));
        assert_eq!(trade.gross_pnl(), dec!(20));
        assert!(trade.is_win());
        assert!(!trade.is_loss());
    }

    #[test]
    fn derives_pnl_for_short() {
        let mut input = sample_input();
        input.direction = Direction::Short;
        input.fees = Decimal::ZERO;
        let trade = TradeRecord::new(input).unwrap();
        assert_eq!(trade.pnl(), dec!(-20));
        assert!(trade.is_loss());
    }

    #[test]
    fn provided_pnl_wins_over_prices() {
        let mut input = sample_input();
        input.pnl = Some(dec!(-3));
        let trade = TradeRecord::new(input).unwrap();
        assert_eq!(trade.pnl(), dec!(-3));
    }

    #[test]
    fn caches_duration_and_time_keys() {
        let trade = TradeRecord::new(sample_input()).unwrap();
        assert_eq!(trade.duration(), Duration::minutes(45));
        assert!((trade.duration_minutes() - 45.0).abs() < 1e-12);
        assert_eq!(trade.hour(), 9);
        assert!((trade.fractional_hour() - 9.75).abs() < 1e-12);
        assert_eq!(trade.weekday(), Weekday::Mon);
        assert_eq!(
            trade.calendar_day(),
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
        );
    }

    #[test]
    fn zero_pnl_is_breakeven() {
        let mut input = sample_input();
        input.pnl = Some(Decimal::ZERO);
        let trade = TradeRecord::new(input).unwrap();
        assert!(trade.is_breakeven());
        assert!(!trade.is_win());
        assert!(!trade.is_loss());
    }

    #[test]
    fn rejects_close_before_open() {
        let mut input = sample_input();
        input.close_time = at(8, 0);
        assert!(matches!(
            TradeRecord::new(input),
            Err(TradeError::CloseBeforeOpen { .. })
        ));
    }

    #[test]
    fn rejects_non_positive_fields() {
        let mut input = sample_input();
        input.quantity = Decimal::ZERO;
        assert!(matches!(
            TradeRecord::new(input),
            Err(TradeError::NonPositive { field: "quantity", .. })
        ));

        let mut input = sample_input();
        input.leverage = 0.0;
        assert!(matches!(
            TradeRecord::new(input),
            Err(TradeError::NonPositive { field: "leverage", .. })
        ));

        let mut input = sample_input();
        input.leverage = f64::NAN;
        assert!(TradeRecord::new(input).is_err());
    }

    #[test]
    fn rejects_negative_fees_and_empty_asset() {
        let mut input = sample_input();
        input.fees = dec!(-0.1);
        assert_eq!(
            TradeRecord::new(input),
            Err(TradeError::NegativeFees(dec!(-0.1)))
        );

        let mut input = sample_input();
        input.asset = "   ".into();
        assert_eq!(TradeRecord::new(input), Err(TradeError::EmptyAsset));
    }

    #[test]
    fn huge_prices_fail_instead_of_overflowing() {
        let mut input = sample_input();
        input.entry_price = Decimal::ONE;
        input.exit_price = Decimal::MAX;
        input.fees = Decimal::ZERO;
        assert_eq!(TradeRecord::new(input), Err(TradeError::PnlOverflow));
    }

    #[test]
    fn derived_pnl_beyond_the_bound_is_rejected() {
        let mut input = sample_input();
        input.entry_price = dec!(1);
        input.exit_price = dec!(1000000000000);
        input.quantity = dec!(10000);
        assert!(matches!(
            TradeRecord::new(input),
            Err(TradeError::OutOfRange { field: "pnl", .. })
        ));
    }

    #[test]
    fn provided_amounts_are_bounded() {
        let mut input = sample_input();
        input.pnl = Some(Decimal::MIN);
        assert!(matches!(
            TradeRecord::new(input),
            Err(TradeError::OutOfRange { field: "pnl", .. })
        ));

        let mut input = sample_input();
        input.fees = Decimal::MAX;
        assert!(matches!(
            TradeRecord::new(input),
            Err(TradeError::OutOfRange { field: "fees", .. })
        ));

        let mut input = sample_input();
        input.pnl = Some(Decimal::from(-MAX_ABS_AMOUNT));
        assert!(TradeRecord::new(input).is_ok());
    }

    #[test]
    fn direction_parsing() {
        assert_eq!("long".parse::<Direction>().unwrap(), Direction::Long);
        assert_eq!(" SHORT ".parse::<Direction>().unwrap(), Direction::Short);
        assert_eq!("Buy".parse::<Direction>().unwrap(), Direction::Long);
        assert_eq!("OPEN SHORT".parse::<Direction>().unwrap(), Direction::Short);
        assert_eq!("close long".parse::<Direction>().unwrap(), Direction::Long);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn trade_serializes_derived_fields() {
        let trade = TradeRecord::new(sample_input()).unwrap();
        let json = serde_json::to_value(&trade).unwrap();
        assert_eq!(json["direction"], "LONG");
        assert_eq!(json["duration_ms"], 45 * 60_000);
        assert_eq!(json["is_win"], true);
    }
}
