use std::env;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use polars::prelude::*;
use tracing::{debug, error};

use crate::models::SalesError;

pub fn project_root() -> PathBuf {
    match env::var_os("PROJECT_ROOT") {
        Some(val) => PathBuf::from(val),
        None => {
            // Fall back to current directory if PROJECT_ROOT not set
            env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        }
    }
}

/// Anchor a relative path at the project root; absolute paths pass through.
pub fn resolve_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root().join(path)
    }
}

/// Read a headed, comma-delimited CSV file.
///
/// Types are inferred over the whole file so that columns mixing `0` and `"a"`
/// come back as strings instead of failing half way through.
pub fn read_csv(file_path: &Path) -> Result<DataFrame, SalesError> {
    read_csv_with_dtypes(file_path, &[])
}

/// Like [`read_csv`], but the listed columns skip inference and are read with
/// the given dtype. Every listed column must exist in the file.
pub fn read_csv_with_dtypes(
    file_path: &Path,
    dtypes: &[(&str, DataType)],
) -> Result<DataFrame, SalesError> {
    let path_str = file_path.display().to_string();
    debug!("Reading CSV from {}", path_str);

    let overwrite = (!dtypes.is_empty()).then(|| {
        Arc::new(Schema::from_iter(
            dtypes
                .iter()
                .map(|(name, dtype)| (PlSmallStr::from(*name), dtype.clone())),
        ))
    });

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_schema_overwrite(overwrite)
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| {
            error!("Failed to read {}: {}", path_str, e);
            SalesError::parse(path_str, e.to_string())
        })
}

pub fn write_frame_csv<W: Write>(df: &mut DataFrame, writer: W) -> Result<(), SalesError> {
    CsvWriter::new(writer).include_header(true).finish(df)?;
    Ok(())
}

pub fn dataframe_to_csv(df: &mut DataFrame, path: &Path) -> Result<(), SalesError> {
    let file = File::create(path)?;
    write_frame_csv(df, file)
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Names from `required` that are absent from `df`, in the order given.
pub fn missing_columns<'a>(df: &DataFrame, required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|name| !has_column(df, name))
        .collect()
}

/// Fail with a [`SalesError::Parse`] naming `source` if any column is absent.
pub fn require_columns(df: &DataFrame, required: &[&str], source: &str) -> Result<(), SalesError> {
    let missing = missing_columns(df, required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SalesError::parse(
            source,
            format!("missing required column(s): {}", missing.join(", ")),
        ))
    }
}

pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, SalesError> {
    let casted = df.column(name)?.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().collect())
}

pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, SalesError> {
    let casted = df.column(name)?.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

/// Parse a `"{year}-{month}"` key into a chronologically sortable pair.
pub fn year_month_order(key: &str) -> Option<(i32, u32)> {
    let (year, month) = key.split_once('-')?;
    Some((year.trim().parse().ok()?, month.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn reports_missing_columns_in_order() {
        let df = df!["Store" => &[1i64, 2], "Sales" => &[10.0, 20.0]].unwrap();
        assert_eq!(missing_columns(&df, &["Foo", "Sales", "Bar"]), vec!["Foo", "Bar"]);
        let err = require_columns(&df, &["Foo"], "train.csv").unwrap_err();
        assert!(matches!(err, SalesError::Parse { .. }));
        assert!(err.to_string().contains("Foo"));
    }

    #[test]
    fn year_month_keys_sort_chronologically() {
        let mut keys = vec!["2014-1", "2013-10", "2013-2", "2013-1"];
        keys.sort_by_key(|k| year_month_order(k));
        assert_eq!(keys, vec!["2013-1", "2013-2", "2013-10", "2014-1"]);
        assert_eq!(year_month_order("garbage"), None);
    }

    #[test]
    fn reads_mixed_holiday_codes_as_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        std::fs::write(&path, "Store,StateHoliday\n1,0\n2,a\n3,\"0\"\n").unwrap();

        let df = read_csv(&path).unwrap();
        let values = string_values(&df, "StateHoliday").unwrap();
        assert_eq!(values, vec![Some("0".into()), Some("a".into()), Some("0".into())]);
    }

    #[test]
    fn dtype_override_keeps_numeric_looking_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        std::fs::write(&path, "Store,StateHoliday\n1,0\n2,0\n").unwrap();

        let inferred = read_csv(&path).unwrap();
        assert_eq!(inferred.column("StateHoliday").unwrap().dtype(), &DataType::Int64);

        let df = read_csv_with_dtypes(&path, &[("StateHoliday", DataType::String)]).unwrap();
        assert_eq!(df.column("StateHoliday").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("Store").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn unreadable_file_is_a_parse_error() {
        let err = read_csv(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, SalesError::Parse { .. }));
    }
}
