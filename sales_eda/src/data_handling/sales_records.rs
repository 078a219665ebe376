use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use tracing::{debug, info};

use crate::helper_functions::{read_csv_with_dtypes, require_columns, string_values};
use crate::models::{
    Dataset, SalesError, StateHoliday, DATE, MONTH, SALES_RECORD_COLUMNS, STATE_HOLIDAY,
    STATE_HOLIDAY_BINARY, YEAR, YEAR_MONTH,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Daily per-store sales table (`train.csv`).
pub struct SalesRecords {
    pub path: PathBuf,
}

impl Dataset for SalesRecords {
    fn load(&self) -> Result<DataFrame, SalesError> {
        info!("Reading sales records from {}", self.path.display());
        let df = read_csv_with_dtypes(
            &self.path,
            &[(DATE, DataType::String), (STATE_HOLIDAY, DataType::String)],
        )?;
        require_columns(&df, &SALES_RECORD_COLUMNS, &self.path.display().to_string())?;
        debug!("Loaded {} sales rows", df.height());
        Ok(df)
    }
}

/// Add `Year`, `Month` and `YearMonth` parsed from `Date`.
///
/// `YearMonth` keeps the unpadded month (`"2013-1"`); use
/// [`crate::helper_functions::year_month_order`] when chronological order matters.
pub fn derive_calendar_fields(df: &DataFrame) -> Result<DataFrame, SalesError> {
    let dates = string_values(df, DATE)?;

    let mut years = Vec::with_capacity(dates.len());
    let mut months = Vec::with_capacity(dates.len());
    let mut year_months = Vec::with_capacity(dates.len());

    for (row, raw) in dates.iter().enumerate() {
        let raw = raw.as_deref().ok_or_else(|| {
            SalesError::parse(format!("column `{DATE}`"), format!("missing date at row {row}"))
        })?;
        let date = NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|e| {
            SalesError::parse(
                format!("column `{DATE}`"),
                format!("malformed date {raw:?} at row {row}: {e}"),
            )
        })?;

        years.push(date.year());
        months.push(date.month() as i32);
        year_months.push(format!("{}-{}", date.year(), date.month()));
    }

    let mut out = df.clone();
    out.with_column(Series::new(PlSmallStr::from(YEAR), years))?;
    out.with_column(Series::new(PlSmallStr::from(MONTH), months))?;
    out.with_column(Series::new(PlSmallStr::from(YEAR_MONTH), year_months))?;
    Ok(out)
}

/// Coerce every numeric zero in `StateHoliday` to the string `"0"`.
///
/// Values outside the known codes are left untouched (trimmed) so that the
/// binary mapping can report them.
pub fn normalize_state_holiday(df: &DataFrame) -> Result<DataFrame, SalesError> {
    let normalized: Vec<Option<String>> = string_values(df, STATE_HOLIDAY)?
        .into_iter()
        .map(|value| {
            value.map(|raw| match StateHoliday::parse(&raw) {
                Some(holiday) => holiday.code().to_string(),
                None => raw.trim().to_string(),
            })
        })
        .collect();

    let mut out = df.clone();
    out.with_column(Series::new(PlSmallStr::from(STATE_HOLIDAY), normalized))?;
    Ok(out)
}

/// `StateHolidayBinary` is 0 on regular days and 1 on any state holiday.
pub fn derive_state_holiday_binary(df: &DataFrame) -> Result<DataFrame, SalesError> {
    let mut flags = Vec::with_capacity(df.height());
    for value in string_values(df, STATE_HOLIDAY)? {
        let holiday = value
            .as_deref()
            .and_then(StateHoliday::parse)
            .ok_or_else(|| SalesError::UnrecognizedCategory {
                column: STATE_HOLIDAY.to_string(),
                value: value.clone().unwrap_or_else(|| "null".to_string()),
            })?;
        flags.push(holiday.is_holiday() as i32);
    }

    let mut out = df.clone();
    out.with_column(Series::new(PlSmallStr::from(STATE_HOLIDAY_BINARY), flags))?;
    Ok(out)
}

pub fn derive_sales_features(df: &DataFrame) -> Result<DataFrame, SalesError> {
    let df = derive_calendar_fields(df)?;
    let df = normalize_state_holiday(&df)?;
    derive_state_holiday_binary(&df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper_functions::f64_values;
    use polars::df;

    fn holidays(codes: &[&str]) -> DataFrame {
        df!["StateHoliday" => codes].unwrap()
    }

    #[test]
    fn calendar_fields_from_date() {
        let df = df![
            "Date" => &["2015-03-17", "2013-10-01"],
            "Sales" => &[1.0, 2.0]
        ]
        .unwrap();
        let out = derive_calendar_fields(&df).unwrap();

        assert_eq!(f64_values(&out, YEAR).unwrap(), vec![Some(2015.0), Some(2013.0)]);
        assert_eq!(f64_values(&out, MONTH).unwrap(), vec![Some(3.0), Some(10.0)]);
        assert_eq!(
            string_values(&out, YEAR_MONTH).unwrap(),
            vec![Some("2015-3".to_string()), Some("2013-10".to_string())]
        );
        // input left untouched
        assert_eq!(df.width(), 2);
    }

    #[test]
    fn malformed_date_is_a_parse_error() {
        let df = df!["Date" => &["2015-03-17", "17/03/2015"]].unwrap();
        let err = derive_calendar_fields(&df).unwrap_err();
        match err {
            SalesError::Parse { detail, .. } => assert!(detail.contains("row 1")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn holiday_binary_maps_known_codes() {
        let df = normalize_state_holiday(&holidays(&["0", "a", "b", "c", "0.0"])).unwrap();
        let out = derive_state_holiday_binary(&df).unwrap();
        assert_eq!(
            f64_values(&out, STATE_HOLIDAY_BINARY).unwrap(),
            vec![Some(0.0), Some(1.0), Some(1.0), Some(1.0), Some(0.0)]
        );
        assert_eq!(
            string_values(&out, STATE_HOLIDAY).unwrap()[4],
            Some("0".to_string())
        );
    }

    #[test]
    fn numeric_zero_is_normalized() {
        let df = df!["StateHoliday" => &[0i64, 0]].unwrap();
        let out = derive_state_holiday_binary(&normalize_state_holiday(&df).unwrap()).unwrap();
        assert_eq!(
            string_values(&out, STATE_HOLIDAY).unwrap(),
            vec![Some("0".to_string()), Some("0".to_string())]
        );
    }

    #[test]
    fn loader_reads_date_and_holiday_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        std::fs::write(
            &path,
            "Store,DayOfWeek,Date,Sales,Customers,Open,Promo,StateHoliday,SchoolHoliday\n\
             1,5,2015-07-31,5263,555,1,1,0,1\n\
             2,5,2015-07-31,6064,625,1,1,0,1\n",
        )
        .unwrap();

        let df = SalesRecords { path }.load().unwrap();
        assert_eq!(df.column(DATE).unwrap().dtype(), &DataType::String);
        assert_eq!(df.column(STATE_HOLIDAY).unwrap().dtype(), &DataType::String);
        let out = derive_sales_features(&df).unwrap();
        assert_eq!(
            f64_values(&out, STATE_HOLIDAY_BINARY).unwrap(),
            vec![Some(0.0), Some(0.0)]
        );
    }

    #[test]
    fn unknown_holiday_code_fails_loudly() {
        let err = derive_state_holiday_binary(&holidays(&["a", "x"])).unwrap_err();
        match err {
            SalesError::UnrecognizedCategory { column, value } => {
                assert_eq!(column, STATE_HOLIDAY);
                assert_eq!(value, "x");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
