//! Group/aggregate helpers that turn the derived tables into plain series
//! ready for drawing. Nothing here touches the filesystem.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use ndarray::Array2;
use ndarray_stats::CorrelationExt;
use polars::prelude::*;

use crate::analysis::chart_spec::RowFilter;
use crate::helper_functions::{f64_values, string_values, year_month_order};
use crate::models::{SalesError, STORE, YEAR_MONTH};

/// Category order for an axis: the explicit order when given, otherwise the
/// observed values sorted numerically when they all parse as numbers and
/// lexically when they do not.
pub fn ordered_categories<'a>(
    observed: impl IntoIterator<Item = &'a str>,
    order: Option<&[&str]>,
) -> Vec<String> {
    if let Some(order) = order {
        return order.iter().map(|s| s.to_string()).collect();
    }

    let unique: BTreeSet<&str> = observed.into_iter().collect();
    let mut values: Vec<String> = unique.into_iter().map(|s| s.to_string()).collect();
    let all_numeric = values.iter().all(|v| v.parse::<f64>().is_ok());
    if all_numeric {
        values.sort_by(|a, b| {
            let (a, b) = (a.parse::<f64>().unwrap_or(0.0), b.parse::<f64>().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        });
    }
    values
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountTable {
    pub categories: Vec<String>,
    /// One entry per hue value; a single unnamed hue when the count is not split.
    pub hues: Vec<String>,
    /// `counts[hue][category]`
    pub counts: Vec<Vec<usize>>,
}

pub fn count_by(
    df: &DataFrame,
    column: &str,
    hue: Option<&str>,
    order: Option<&[&str]>,
) -> Result<CountTable, SalesError> {
    let keys = string_values(df, column)?;
    let hue_keys = match hue {
        Some(h) => string_values(df, h)?,
        None => vec![Some(String::new()); keys.len()],
    };

    let categories = ordered_categories(keys.iter().flatten().map(String::as_str), order);
    let hues = ordered_categories(hue_keys.iter().flatten().map(String::as_str), None);

    let cat_index: HashMap<&str, usize> = categories
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();
    let hue_index: HashMap<&str, usize> =
        hues.iter().enumerate().map(|(i, h)| (h.as_str(), i)).collect();

    let mut counts = vec![vec![0usize; categories.len()]; hues.len()];
    for (key, hue_key) in keys.iter().zip(hue_keys.iter()) {
        if let (Some(key), Some(hue_key)) = (key, hue_key) {
            if let (Some(&c), Some(&h)) = (cat_index.get(key.as_str()), hue_index.get(hue_key.as_str())) {
                counts[h][c] += 1;
            }
        }
    }

    Ok(CountTable {
        categories,
        hues,
        counts,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupMean {
    pub key: String,
    /// `None` for a category with no rows.
    pub mean: Option<f64>,
    pub count: usize,
}

fn row_mask(df: &DataFrame, filter: Option<&RowFilter>) -> Result<Vec<bool>, SalesError> {
    let mut mask = vec![true; df.height()];
    let Some(filter) = filter else {
        return Ok(mask);
    };

    if let Some((column, excluded)) = filter.exclude {
        for (keep, value) in mask.iter_mut().zip(string_values(df, column)?) {
            *keep &= value.as_deref() != Some(excluded);
        }
    }
    if let Some(column) = filter.positive {
        for (keep, value) in mask.iter_mut().zip(f64_values(df, column)?) {
            *keep &= value.is_some_and(|v| v > 0.0);
        }
    }
    Ok(mask)
}

/// Mean of `value` per category of `category`, optionally restricted by `filter`.
pub fn mean_by(
    df: &DataFrame,
    category: &str,
    value: &str,
    filter: Option<&RowFilter>,
    order: Option<&[&str]>,
) -> Result<Vec<GroupMean>, SalesError> {
    let keys = string_values(df, category)?;
    let values = f64_values(df, value)?;
    let mask = row_mask(df, filter)?;

    let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();
    for ((key, v), keep) in keys.iter().zip(values.iter()).zip(mask.iter()) {
        if let (true, Some(key), Some(v)) = (*keep, key, v) {
            let entry = sums.entry(key.as_str()).or_insert((0.0, 0));
            entry.0 += v;
            entry.1 += 1;
        }
    }

    // Without an explicit order only categories surviving the filter are shown
    let categories = ordered_categories(
        keys.iter()
            .zip(mask.iter())
            .filter(|(_, keep)| **keep)
            .filter_map(|(key, _)| key.as_deref()),
        order,
    );
    Ok(categories
        .into_iter()
        .map(|key| {
            let (sum, count) = sums.get(key.as_str()).copied().unwrap_or((0.0, 0));
            GroupMean {
                mean: (count > 0).then(|| sum / count as f64),
                key,
                count,
            }
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearMonthTrend {
    pub labels: Vec<String>,
    pub means: Vec<f64>,
    /// Month-over-month change of the monthly total; the first month has none.
    pub pct_change: Vec<Option<f64>>,
}

/// Per-YearMonth mean and summed percent change of `value`, in calendar order.
///
/// `store` restricts the rows to a single store id.
pub fn year_month_trend(
    df: &DataFrame,
    value: &str,
    store: Option<i64>,
) -> Result<YearMonthTrend, SalesError> {
    let keys = string_values(df, YEAR_MONTH)?;
    let values = f64_values(df, value)?;
    let stores = match store {
        Some(_) => f64_values(df, STORE)?,
        None => vec![None; df.height()],
    };

    let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();
    for ((key, v), s) in keys.iter().zip(values.iter()).zip(stores.iter()) {
        if let Some(id) = store {
            if *s != Some(id as f64) {
                continue;
            }
        }
        if let (Some(key), Some(v)) = (key, v) {
            let entry = sums.entry(key.as_str()).or_insert((0.0, 0));
            entry.0 += v;
            entry.1 += 1;
        }
    }

    let mut labels: Vec<String> = sums.keys().map(|k| k.to_string()).collect();
    labels.sort_by(|a, b| year_month_order(a).cmp(&year_month_order(b)).then_with(|| a.cmp(b)));

    let totals: Vec<f64> = labels.iter().map(|l| sums[l.as_str()].0).collect();
    let means = labels
        .iter()
        .map(|l| {
            let (sum, count) = sums[l.as_str()];
            sum / count as f64
        })
        .collect();
    Ok(YearMonthTrend {
        labels,
        means,
        pct_change: pct_change(&totals),
    })
}

/// Fractional change from the previous value. A zero predecessor gives `None`
/// rather than an infinite change, so the point is left off the line.
pub fn pct_change(values: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    for (i, &v) in values.iter().enumerate() {
        if i == 0 {
            out.push(None);
            continue;
        }
        let prev = values[i - 1];
        out.push((prev != 0.0).then(|| (v - prev) / prev));
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub lo: f64,
    pub width: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn edges(&self, bin: usize) -> (f64, f64) {
        let x0 = self.lo + bin as f64 * self.width;
        (x0, x0 + self.width)
    }
}

/// Equal-width bins spanning the data range; a single distinct value gets a
/// unit-wide range around it and an empty input falls back to `fallback`.
pub fn histogram(values: &[f64], bins: usize, fallback: (f64, f64)) -> Histogram {
    let bins = bins.max(1);
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();

    let (lo, hi) = if finite.is_empty() {
        fallback
    } else {
        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if min == max {
            (min - 0.5, max + 0.5)
        } else {
            (min, max)
        }
    };

    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in finite {
        let mut idx = ((v - lo) / width).floor() as usize;
        if idx >= bins {
            idx = bins - 1;
        }
        counts[idx] += 1;
    }

    Histogram { lo, width, counts }
}

/// `(x, y)` pairs where both values are present.
pub fn scatter_points(df: &DataFrame, x: &str, y: &str) -> Result<Vec<(f64, f64)>, SalesError> {
    let xs = f64_values(df, x)?;
    let ys = f64_values(df, y)?;
    Ok(xs
        .into_iter()
        .zip(ys)
        .filter_map(|(x, y)| Some((x?, y?)))
        .collect())
}

/// Replace each listed categorical column with one 0/1 column per observed
/// value, named `{column}_{value}`.
pub fn one_hot(df: &DataFrame, columns: &[&str]) -> Result<DataFrame, SalesError> {
    let mut out = df.clone();
    for &column in columns {
        let keys = string_values(&out, column)?;
        let categories = ordered_categories(keys.iter().flatten().map(String::as_str), None);

        out = out.drop(column)?;
        for category in categories {
            let indicator: Vec<i32> = keys
                .iter()
                .map(|k| (k.as_deref() == Some(category.as_str())) as i32)
                .collect();
            out.with_column(Series::new(
                PlSmallStr::from(format!("{column}_{category}")),
                indicator,
            ))?;
        }
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct Correlation {
    pub names: Vec<String>,
    pub matrix: Array2<f64>,
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Boolean
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Pairwise Pearson correlation of every numeric column. Rows holding a null
/// in any of those columns are left out; zero-variance columns give NaN.
pub fn correlation_matrix(df: &DataFrame) -> Result<Correlation, SalesError> {
    let mut names = Vec::new();
    let mut columns = Vec::new();
    for column in df.get_columns() {
        if is_numeric(column.dtype()) {
            names.push(column.name().to_string());
            columns.push(f64_values(df, column.name().as_str())?);
        }
    }

    let complete: Vec<usize> = (0..df.height())
        .filter(|&row| columns.iter().all(|c| c[row].is_some_and(f64::is_finite)))
        .collect();

    let p = names.len();
    if complete.is_empty() {
        return Ok(Correlation {
            names,
            matrix: Array2::from_elem((p, p), f64::NAN),
        });
    }

    let data = Array2::from_shape_fn((p, complete.len()), |(var, obs)| {
        columns[var][complete[obs]].unwrap_or(f64::NAN)
    });
    let matrix = data
        .pearson_correlation()
        .unwrap_or_else(|_| Array2::from_elem((p, p), f64::NAN));

    Ok(Correlation { names, matrix })
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn explicit_order_keeps_empty_categories() {
        let df = df![
            "StoreType" => &["a", "c", "a"],
            "AvgSales" => &[10.0, 30.0, 20.0]
        ]
        .unwrap();
        let means = mean_by(&df, "StoreType", "AvgSales", None, Some(&["a", "b", "c", "d"][..])).unwrap();

        let keys: Vec<&str> = means.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c", "d"]);
        assert_eq!(means[0].mean, Some(15.0));
        assert_eq!(means[1].mean, None);
        assert_eq!(means[1].count, 0);
        assert_eq!(means[2].mean, Some(30.0));
    }

    #[test]
    fn numeric_categories_sort_numerically() {
        let cats = ordered_categories(["10", "2", "1"], None);
        assert_eq!(cats, vec!["1", "2", "10"]);
        let cats = ordered_categories(["b", "a", "c"], None);
        assert_eq!(cats, vec!["a", "b", "c"]);
    }

    #[test]
    fn filtered_means_skip_regular_days_and_zero_sales() {
        let df = df![
            "StateHoliday" => &["0", "a", "a", "b"],
            "Sales" => &[500.0, 0.0, 40.0, 60.0]
        ]
        .unwrap();
        let filter = RowFilter {
            exclude: Some(("StateHoliday", "0")),
            positive: Some("Sales"),
        };
        let means = mean_by(&df, "StateHoliday", "Sales", Some(&filter), None).unwrap();
        let keys: Vec<&str> = means.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(means[0].mean, Some(40.0));
        assert_eq!(means[1].mean, Some(60.0));
    }

    #[test]
    fn pct_change_skips_zero_predecessor() {
        assert_eq!(pct_change(&[0.0, 5.0, 10.0]), vec![None, None, Some(1.0)]);
    }

    #[test]
    fn counts_split_by_hue() {
        let df = df![
            "Open" => &[1i64, 0, 1, 1],
            "DayOfWeek" => &[7i64, 7, 1, 7]
        ]
        .unwrap();
        let table = count_by(&df, "Open", Some("DayOfWeek"), None).unwrap();
        assert_eq!(table.categories, vec!["0", "1"]);
        assert_eq!(table.hues, vec!["1", "7"]);
        assert_eq!(table.counts, vec![vec![0, 1], vec![1, 2]]);
    }

    #[test]
    fn trend_is_chronological_with_pct_change() {
        let df = df![
            "Store" => &[1i64, 1, 1, 2],
            "YearMonth" => &["2013-10", "2013-2", "2013-2", "2013-10"],
            "Sales" => &[300.0, 100.0, 100.0, 100.0]
        ]
        .unwrap();
        let trend = year_month_trend(&df, "Sales", None).unwrap();
        assert_eq!(trend.labels, vec!["2013-2", "2013-10"]);
        assert_eq!(trend.means, vec![100.0, 200.0]);
        assert_eq!(trend.pct_change, vec![None, Some(1.0)]);

        let single = year_month_trend(&df, "Sales", Some(2)).unwrap();
        assert_eq!(single.labels, vec!["2013-10"]);
        assert_eq!(single.means, vec![100.0]);
    }

    #[test]
    fn histogram_bins_cover_data_range() {
        let hist = histogram(&[0.0, 1.0, 2.0, 3.0, 4.0], 4, (0.0, 1.0));
        assert_eq!(hist.counts, vec![1, 1, 1, 2]);
        assert_eq!(hist.edges(1), (1.0, 2.0));

        let empty = histogram(&[], 70, (0.0, 20000.0));
        assert_eq!(empty.counts.len(), 70);
        assert!(empty.counts.iter().all(|&c| c == 0));
    }

    #[test]
    fn one_hot_expands_and_drops_source_column() {
        let df = df![
            "DayOfWeek" => &[1i64, 3, 1],
            "Sales" => &[1.0, 2.0, 3.0]
        ]
        .unwrap();
        let out = one_hot(&df, &["DayOfWeek"]).unwrap();
        assert!(out.column("DayOfWeek").is_err());
        assert_eq!(f64_values(&out, "DayOfWeek_1").unwrap(), vec![Some(1.0), Some(0.0), Some(1.0)]);
        assert_eq!(f64_values(&out, "DayOfWeek_3").unwrap(), vec![Some(0.0), Some(1.0), Some(0.0)]);
    }

    #[test]
    fn correlation_of_linear_columns() {
        let df = df![
            "a" => &[1.0, 2.0, 3.0, 4.0],
            "b" => &[2.0, 4.0, 6.0, 8.0],
            "c" => &[4.0, 3.0, 2.0, 1.0],
            "label" => &["x", "y", "z", "w"]
        ]
        .unwrap();
        let corr = correlation_matrix(&df).unwrap();
        assert_eq!(corr.names, vec!["a", "b", "c"]);
        assert!((corr.matrix[[0, 1]] - 1.0).abs() < 1e-9);
        assert!((corr.matrix[[0, 2]] + 1.0).abs() < 1e-9);
        assert!((corr.matrix[[2, 2]] - 1.0).abs() < 1e-9);
    }
}
