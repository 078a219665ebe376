use std::error::Error;
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use polars::frame::DataFrame;
use tracing::{debug, error, info, warn};

use crate::analysis::aggregation::{
    correlation_matrix, count_by, histogram, mean_by, one_hot, scatter_points, year_month_trend,
    YearMonthTrend,
};
use crate::analysis::chart_spec::{validate_specs, ChartKind, ChartSpec, SourceTable};
use crate::analysis::plotting;
use crate::data_handling::DerivedTables;
use crate::helper_functions::{f64_values, year_month_order};
use crate::models::{
    SalesError, COMPETITION_OPEN_SINCE_MONTH, COMPETITION_OPEN_SINCE_YEAR, SALES, STORE,
};

/// Competitor openings before this year predate the sales history.
const FIRST_SALES_YEAR: i32 = 2013;

/// Validate every chart, then draw them one by one into `out_dir`.
///
/// Nothing is written unless all charts pass validation. Existing files with
/// the same name are overwritten.
pub fn render_charts(
    tables: &DerivedTables,
    specs: &[ChartSpec],
    out_dir: &Path,
) -> Result<Vec<PathBuf>, SalesError> {
    validate_specs(specs, tables)?;

    create_dir_all(out_dir).map_err(|e| {
        error!("Failed to create output directory {}: {}", out_dir.display(), e);
        SalesError::Io(e)
    })?;

    let mut written = Vec::with_capacity(specs.len());
    for spec in specs {
        let path = out_dir.join(spec.file_name());
        render_chart(tables, spec, &path).map_err(|e| SalesError::Render {
            chart: spec.title.to_string(),
            detail: e.to_string(),
        })?;
        info!("Plotted {}", spec.title);
        written.push(path);
    }
    Ok(written)
}

fn table_for(tables: &DerivedTables, table: SourceTable) -> &DataFrame {
    match table {
        SourceTable::Sales => &tables.sales,
        SourceTable::Stores => &tables.stores,
    }
}

fn render_chart(tables: &DerivedTables, spec: &ChartSpec, path: &Path) -> Result<(), Box<dyn Error>> {
    let df = table_for(tables, spec.table);
    debug!("Rendering `{}` to {}", spec.key, path.display());

    match &spec.kind {
        ChartKind::Count { column, hue, order } => {
            let counts = count_by(df, column, *hue, *order)?;
            plotting::draw_count_chart(path, spec.title, column, &counts)
        }
        ChartKind::MeanBars {
            category,
            panels,
            order,
        } => {
            let mut groups = Vec::with_capacity(panels.len());
            for panel in panels {
                let means = mean_by(df, category, panel.value, panel.filter.as_ref(), *order)?;
                let caption = match &panel.filter {
                    Some(_) => format!("{} (filtered)", panel.value),
                    None => panel.value.to_string(),
                };
                groups.push((caption, means));
            }
            plotting::draw_mean_bars(path, spec.title, category, &groups)
        }
        ChartKind::YearMonthTrend { value } => {
            let trend = year_month_trend(df, value, None)?;
            plotting::draw_year_month_trend(path, spec.title, value, &trend)
        }
        ChartKind::Histogram { column, bins, clip } => {
            let values: Vec<f64> = f64_values(df, column)?.into_iter().flatten().collect();
            let hist = histogram(&values, *bins, *clip);
            plotting::draw_histogram(path, spec.title, column, &hist, *clip)
        }
        ChartKind::Scatter { x, y } => {
            let points = scatter_points(df, x, y)?;
            plotting::draw_scatter(path, spec.title, x, y, &points)
        }
        ChartKind::CorrelationHeatmap { one_hot: columns } => {
            let expanded = one_hot(df, columns)?;
            let corr = correlation_matrix(&expanded)?;
            plotting::draw_heatmap(path, spec.title, &corr)
        }
        ChartKind::CompetitionEffect { store_id } => {
            let trend = year_month_trend(df, SALES, Some(*store_id))?;
            if trend.labels.is_empty() {
                warn!("Store {} has no sales records; drawing an empty chart", store_id);
            }
            let opened = competition_opening(&tables.stores, *store_id)?;
            let marker = opened.and_then(|(year, month)| competition_marker(&trend, year, month));
            plotting::draw_competition_effect(path, spec.title, *store_id, &trend, marker)
        }
    }
}

/// Year and month a competitor opened near `store_id`, when both are known.
fn competition_opening(stores: &DataFrame, store_id: i64) -> Result<Option<(i32, u32)>, SalesError> {
    let ids = f64_values(stores, STORE)?;
    let Some(row) = ids.iter().position(|id| *id == Some(store_id as f64)) else {
        warn!("Store {} not present in the store table", store_id);
        return Ok(None);
    };

    let year = f64_values(stores, COMPETITION_OPEN_SINCE_YEAR)?[row];
    let month = f64_values(stores, COMPETITION_OPEN_SINCE_MONTH)?[row];
    Ok(match (year, month) {
        (Some(y), Some(m)) => Some((y as i32, m as u32)),
        _ => None,
    })
}

/// Index on the trend's month axis where the marker goes, if it falls on the axis.
pub fn competition_marker(trend: &YearMonthTrend, year: i32, month: u32) -> Option<usize> {
    if year < FIRST_SALES_YEAR {
        return None;
    }
    let (first_year, first_month) = trend.labels.first().and_then(|l| year_month_order(l))?;
    let offset = (year - first_year) * 12 + month as i32 - first_month as i32;
    (offset >= 0 && (offset as usize) < trend.labels.len()).then_some(offset as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::chart_spec::chart_catalogue;
    use crate::data_handling::derive_features;
    use crate::data_handling::tests::sample_tables;

    fn trend(labels: &[&str]) -> YearMonthTrend {
        YearMonthTrend {
            labels: labels.iter().map(|l| l.to_string()).collect(),
            means: vec![1.0; labels.len()],
            pct_change: vec![None; labels.len()],
        }
    }

    #[test]
    fn marker_lands_on_the_opening_month() {
        let t = trend(&["2013-1", "2013-2", "2013-3", "2013-4"]);
        assert_eq!(competition_marker(&t, 2013, 3), Some(2));
        assert_eq!(competition_marker(&t, 2012, 3), None);
        assert_eq!(competition_marker(&t, 2014, 3), None);
        assert_eq!(competition_marker(&trend(&[]), 2013, 3), None);
    }

    #[test]
    fn opening_needs_year_and_month() {
        let (sales, stores) = sample_tables();
        let tables = derive_features(&sales, &stores).unwrap();
        assert_eq!(competition_opening(&tables.stores, 1).unwrap(), Some((2014, 9)));
        assert_eq!(competition_opening(&tables.stores, 2).unwrap(), None);
        assert_eq!(competition_opening(&tables.stores, 42).unwrap(), None);
    }

    fn assert_all_charts_written(written: &[PathBuf], out: &Path) {
        let specs = chart_catalogue(1);
        assert_eq!(written.len(), specs.len());
        for spec in &specs {
            assert!(out.join(spec.file_name()).is_file(), "missing {}", spec.title);
        }
    }

    #[test]
    fn catalogue_renders_one_png_per_chart_and_overwrites() {
        let (sales, stores) = sample_tables();
        let tables = derive_features(&sales, &stores).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("plots");

        let written = render_charts(&tables, &chart_catalogue(1), &out).unwrap();
        assert_all_charts_written(&written, &out);
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 22);

        let again = render_charts(&tables, &chart_catalogue(1), &out).unwrap();
        assert_all_charts_written(&again, &out);
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 22);
    }

    #[test]
    fn empty_sales_still_render() {
        let (sales, stores) = sample_tables();
        let tables = derive_features(&sales.head(Some(0)), &stores).unwrap();
        assert_eq!(tables.sales.height(), 0);
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("plots");

        let written = render_charts(&tables, &chart_catalogue(1), &out).unwrap();
        assert_all_charts_written(&written, &out);
    }

    #[test]
    fn bad_spec_writes_nothing() {
        let (sales, stores) = sample_tables();
        let tables = derive_features(&sales, &stores).unwrap();
        let mut specs = chart_catalogue(1);
        specs.push(ChartSpec {
            key: "foo",
            title: "Foo",
            table: SourceTable::Sales,
            kind: ChartKind::Scatter { x: "Foo", y: "Sales" },
        });

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("plots");
        let err = render_charts(&tables, &specs, &out).unwrap_err();

        assert!(matches!(err, SalesError::Configuration(_)));
        assert!(!out.exists());
    }
}
