use std::fmt;
use std::io;

use polars::error::PolarsError;
use polars::frame::DataFrame;

// ── column names ────────────────────────────────────────────────────────────
pub const STORE: &str = "Store";
pub const DAY_OF_WEEK: &str = "DayOfWeek";
pub const DATE: &str = "Date";
pub const SALES: &str = "Sales";
pub const CUSTOMERS: &str = "Customers";
pub const OPEN: &str = "Open";
pub const PROMO: &str = "Promo";
pub const STATE_HOLIDAY: &str = "StateHoliday";
pub const SCHOOL_HOLIDAY: &str = "SchoolHoliday";

pub const YEAR: &str = "Year";
pub const MONTH: &str = "Month";
pub const YEAR_MONTH: &str = "YearMonth";
pub const STATE_HOLIDAY_BINARY: &str = "StateHolidayBinary";

pub const STORE_TYPE: &str = "StoreType";
pub const ASSORTMENT: &str = "Assortment";
pub const COMPETITION_DISTANCE: &str = "CompetitionDistance";
pub const COMPETITION_OPEN_SINCE_MONTH: &str = "CompetitionOpenSinceMonth";
pub const COMPETITION_OPEN_SINCE_YEAR: &str = "CompetitionOpenSinceYear";
pub const PROMO2: &str = "Promo2";

pub const AVG_SALES: &str = "AvgSales";
pub const AVG_CUSTOMERS: &str = "AvgCustomers";

pub const SALES_RECORD_COLUMNS: [&str; 9] = [
    STORE,
    DAY_OF_WEEK,
    DATE,
    SALES,
    CUSTOMERS,
    OPEN,
    PROMO,
    STATE_HOLIDAY,
    SCHOOL_HOLIDAY,
];

pub const STORE_ATTRIBUTE_COLUMNS: [&str; 7] = [
    STORE,
    STORE_TYPE,
    ASSORTMENT,
    COMPETITION_DISTANCE,
    COMPETITION_OPEN_SINCE_MONTH,
    COMPETITION_OPEN_SINCE_YEAR,
    PROMO2,
];

/// A tabular input that can be read from disk into a `DataFrame`.
pub trait Dataset {
    fn load(&self) -> Result<DataFrame, SalesError>;
}

/// Public holiday category of a sales day.
///
/// The raw column mixes the integer `0` and the string `"0"` for "no holiday";
/// both parse to [`StateHoliday::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateHoliday {
    None,
    Public,
    Easter,
    Christmas,
}

impl StateHoliday {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "a" => Some(Self::Public),
            "b" => Some(Self::Easter),
            "c" => Some(Self::Christmas),
            other => match other.parse::<f64>() {
                Ok(v) if v == 0.0 => Some(Self::None),
                _ => None,
            },
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::None => "0",
            Self::Public => "a",
            Self::Easter => "b",
            Self::Christmas => "c",
        }
    }

    pub fn is_holiday(self) -> bool {
        !matches!(self, Self::None)
    }
}

#[derive(Debug)]
pub enum SalesError {
    /// Unreadable file, missing column or malformed value. `context` names the
    /// file or column at fault.
    Parse { context: String, detail: String },
    UnrecognizedCategory { column: String, value: String },
    Alignment(String),
    Configuration(String),
    Render { chart: String, detail: String },
    Polars(PolarsError),
    Io(io::Error),
    Csv(csv::Error),
}

impl SalesError {
    pub fn parse(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Parse {
            context: context.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for SalesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { context, detail } => write!(f, "parse error in {context}: {detail}"),
            Self::UnrecognizedCategory { column, value } => {
                write!(f, "unrecognized category {value:?} in column `{column}`")
            }
            Self::Alignment(msg) => write!(f, "forecast alignment error: {msg}"),
            Self::Configuration(msg) => write!(f, "configuration error: {msg}"),
            Self::Render { chart, detail } => write!(f, "failed to render `{chart}`: {detail}"),
            Self::Polars(e) => write!(f, "dataframe error: {e}"),
            Self::Io(e) => write!(f, "i/o error: {e}"),
            Self::Csv(e) => write!(f, "csv error: {e}"),
        }
    }
}

impl std::error::Error for SalesError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Polars(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PolarsError> for SalesError {
    fn from(e: PolarsError) -> Self {
        Self::Polars(e)
    }
}

impl From<io::Error> for SalesError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<csv::Error> for SalesError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_holiday_codes() {
        assert_eq!(StateHoliday::parse("0"), Some(StateHoliday::None));
        assert_eq!(StateHoliday::parse("0.0"), Some(StateHoliday::None));
        assert_eq!(StateHoliday::parse(" a "), Some(StateHoliday::Public));
        assert_eq!(StateHoliday::parse("c"), Some(StateHoliday::Christmas));
        assert_eq!(StateHoliday::parse("d"), None);
        assert_eq!(StateHoliday::parse("1"), None);
        assert_eq!(StateHoliday::parse(""), None);
        assert!(StateHoliday::Easter.is_holiday());
        assert!(!StateHoliday::None.is_holiday());
    }
}
