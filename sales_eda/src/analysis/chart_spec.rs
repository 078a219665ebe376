//! The fixed catalogue of analysis charts and the checks run against it
//! before anything is drawn.

use std::collections::BTreeSet;

use crate::data_handling::DerivedTables;
use crate::helper_functions::missing_columns;
use crate::models::*;

const DAY_ORDER: &[&str] = &["1", "2", "3", "4", "5", "6", "7"];
const STORE_TYPE_ORDER: &[&str] = &["a", "b", "c", "d"];
const ASSORTMENT_ORDER: &[&str] = &["a", "b", "c"];

pub const HISTOGRAM_BINS: usize = 70;
pub const DEFAULT_STORE_ID: i64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceTable {
    Sales,
    Stores,
}

/// Row restriction applied before averaging one panel.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFilter {
    /// Drop rows where `column == value`.
    pub exclude: Option<(&'static str, &'static str)>,
    /// Keep only rows where this column is strictly positive.
    pub positive: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub value: &'static str,
    pub filter: Option<RowFilter>,
}

impl Panel {
    pub fn mean_of(value: &'static str) -> Self {
        Self { value, filter: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartKind {
    Count {
        column: &'static str,
        hue: Option<&'static str>,
        order: Option<&'static [&'static str]>,
    },
    MeanBars {
        category: &'static str,
        panels: Vec<Panel>,
        order: Option<&'static [&'static str]>,
    },
    YearMonthTrend {
        value: &'static str,
    },
    Histogram {
        column: &'static str,
        bins: usize,
        clip: (f64, f64),
    },
    Scatter {
        x: &'static str,
        y: &'static str,
    },
    CorrelationHeatmap {
        one_hot: &'static [&'static str],
    },
    /// Monthly sales of one store with a marker where a competitor opened.
    /// Reads the sales rows from the chart's table and the opening date from
    /// the store table.
    CompetitionEffect {
        store_id: i64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    /// Stable identifier used to select charts on the command line.
    pub key: &'static str,
    pub title: &'static str,
    pub table: SourceTable,
    pub kind: ChartKind,
}

impl ChartSpec {
    pub fn file_name(&self) -> String {
        format!("{}.png", self.title)
    }

    /// Every `(table, column)` this chart reads.
    pub fn required_columns(&self) -> Vec<(SourceTable, &'static str)> {
        let table = self.table;
        let mut cols: Vec<(SourceTable, &'static str)> = Vec::new();
        match &self.kind {
            ChartKind::Count { column, hue, .. } => {
                cols.push((table, *column));
                cols.extend(hue.iter().map(|h| (table, *h)));
            }
            ChartKind::MeanBars {
                category, panels, ..
            } => {
                cols.push((table, *category));
                for panel in panels {
                    cols.push((table, panel.value));
                    if let Some(filter) = &panel.filter {
                        cols.extend(filter.exclude.iter().map(|(c, _)| (table, *c)));
                        cols.extend(filter.positive.iter().map(|c| (table, *c)));
                    }
                }
            }
            ChartKind::YearMonthTrend { value } => {
                cols.push((table, YEAR_MONTH));
                cols.push((table, *value));
            }
            ChartKind::Histogram { column, .. } => cols.push((table, *column)),
            ChartKind::Scatter { x, y } => {
                cols.push((table, *x));
                cols.push((table, *y));
            }
            ChartKind::CorrelationHeatmap { one_hot } => {
                cols.extend(one_hot.iter().map(|c| (table, *c)));
            }
            ChartKind::CompetitionEffect { .. } => {
                cols.extend([(table, STORE), (table, YEAR_MONTH), (table, SALES)]);
                cols.extend([
                    (SourceTable::Stores, STORE),
                    (SourceTable::Stores, COMPETITION_OPEN_SINCE_YEAR),
                    (SourceTable::Stores, COMPETITION_OPEN_SINCE_MONTH),
                ]);
            }
        }
        cols
    }
}

fn sales_and_customers(key: &'static str, title: &'static str, category: &'static str) -> ChartSpec {
    ChartSpec {
        key,
        title,
        table: SourceTable::Sales,
        kind: ChartKind::MeanBars {
            category,
            panels: vec![Panel::mean_of(SALES), Panel::mean_of(CUSTOMERS)],
            order: None,
        },
    }
}

fn store_averages(
    key: &'static str,
    title: &'static str,
    category: &'static str,
    order: Option<&'static [&'static str]>,
) -> ChartSpec {
    ChartSpec {
        key,
        title,
        table: SourceTable::Stores,
        kind: ChartKind::MeanBars {
            category,
            panels: vec![Panel::mean_of(AVG_SALES), Panel::mean_of(AVG_CUSTOMERS)],
            order,
        },
    }
}

fn count(
    key: &'static str,
    title: &'static str,
    table: SourceTable,
    column: &'static str,
    order: Option<&'static [&'static str]>,
) -> ChartSpec {
    ChartSpec {
        key,
        title,
        table,
        kind: ChartKind::Count {
            column,
            hue: None,
            order,
        },
    }
}

/// All charts, in rendering order.
pub fn chart_catalogue(store_id: i64) -> Vec<ChartSpec> {
    use SourceTable::{Sales, Stores};

    vec![
        ChartSpec {
            key: "open-by-day-of-week",
            title: "No. of Open or Closed Stores (by Day Of Week)",
            table: Sales,
            kind: ChartKind::Count {
                column: OPEN,
                hue: Some(DAY_OF_WEEK),
                order: None,
            },
        },
        ChartSpec {
            key: "sales-by-year-month",
            title: "Avg. Sales & Percentage Change (by Year-Month)",
            table: Sales,
            kind: ChartKind::YearMonthTrend { value: SALES },
        },
        sales_and_customers("sales-by-year", "Avg. Sales & Customers (by Year)", YEAR),
        sales_and_customers("sales-by-month", "Avg. Sales & Customers (by Month)", MONTH),
        ChartSpec {
            key: "sales-by-day-of-week",
            title: "Avg. Sales & Customers (by Day of Week)",
            table: Sales,
            kind: ChartKind::MeanBars {
                category: DAY_OF_WEEK,
                panels: vec![Panel::mean_of(SALES), Panel::mean_of(CUSTOMERS)],
                order: Some(DAY_ORDER),
            },
        },
        sales_and_customers("sales-by-promo", "Avg. Sales & Customers (by Promo)", PROMO),
        count("state-holiday-count", "No. of State Holidays", Sales, STATE_HOLIDAY, None),
        sales_and_customers(
            "sales-by-state-holiday-binary",
            "Avg. Sales & Customers (by State Holiday Binary)",
            STATE_HOLIDAY_BINARY,
        ),
        ChartSpec {
            key: "sales-by-state-holiday",
            title: "Avg. Sales & Customers (by State Holiday)",
            table: Sales,
            kind: ChartKind::MeanBars {
                category: STATE_HOLIDAY,
                panels: vec![
                    Panel::mean_of(SALES),
                    Panel {
                        value: SALES,
                        filter: Some(RowFilter {
                            exclude: Some((STATE_HOLIDAY, "0")),
                            positive: Some(SALES),
                        }),
                    },
                ],
                order: None,
            },
        },
        count("school-holiday-count", "No. of School Holidays", Sales, SCHOOL_HOLIDAY, None),
        sales_and_customers(
            "sales-by-school-holiday",
            "Avg. Sales & Customers (by School Holiday)",
            SCHOOL_HOLIDAY,
        ),
        ChartSpec {
            key: "sales-histogram",
            title: "Frequency of Sales Values",
            table: Sales,
            kind: ChartKind::Histogram {
                column: SALES,
                bins: HISTOGRAM_BINS,
                clip: (0.0, 20000.0),
            },
        },
        ChartSpec {
            key: "customers-histogram",
            title: "Frequency of Customers Values",
            table: Sales,
            kind: ChartKind::Histogram {
                column: CUSTOMERS,
                bins: HISTOGRAM_BINS,
                clip: (0.0, 9000.0),
            },
        },
        count(
            "store-type-count",
            "No. Of Stores (by Store Type)",
            Stores,
            STORE_TYPE,
            Some(STORE_TYPE_ORDER),
        ),
        store_averages(
            "sales-by-store-type",
            "Avg. Sales & Customers (by Store Type)",
            STORE_TYPE,
            Some(STORE_TYPE_ORDER),
        ),
        count(
            "assortment-count",
            "No. Of Stores (by Assortment)",
            Stores,
            ASSORTMENT,
            Some(ASSORTMENT_ORDER),
        ),
        store_averages(
            "sales-by-assortment",
            "Avg. Sales & Customers (by Assortment)",
            ASSORTMENT,
            Some(ASSORTMENT_ORDER),
        ),
        count("promo2-count", "No. Of Stores (by Promo2)", Stores, PROMO2, None),
        store_averages("sales-by-promo2", "Avg. Sales & Customers (by Promo2)", PROMO2, None),
        ChartSpec {
            key: "competition-distance",
            title: "Competition Distance vs. Sales",
            table: Stores,
            kind: ChartKind::Scatter {
                x: COMPETITION_DISTANCE,
                y: AVG_SALES,
            },
        },
        ChartSpec {
            key: "competition-effect",
            title: "Effect of Competition",
            table: Sales,
            kind: ChartKind::CompetitionEffect { store_id },
        },
        ChartSpec {
            key: "correlation",
            title: "Correlation Matrix",
            table: Sales,
            kind: ChartKind::CorrelationHeatmap {
                one_hot: &[DAY_OF_WEEK, STATE_HOLIDAY],
            },
        },
    ]
}

/// Pick charts by key, keeping catalogue order. An empty selection means all.
pub fn select_charts(catalogue: Vec<ChartSpec>, keys: &[String]) -> Result<Vec<ChartSpec>, SalesError> {
    if keys.is_empty() {
        return Ok(catalogue);
    }

    let known: BTreeSet<&str> = catalogue.iter().map(|c| c.key).collect();
    let unknown: Vec<&str> = keys
        .iter()
        .map(String::as_str)
        .filter(|k| !known.contains(k))
        .collect();
    if !unknown.is_empty() {
        return Err(SalesError::Configuration(format!(
            "unknown chart key(s): {} (run `list-charts` for the catalogue)",
            unknown.join(", ")
        )));
    }

    Ok(catalogue
        .into_iter()
        .filter(|c| keys.iter().any(|k| k == c.key))
        .collect())
}

/// Check every chart against the table schemas. All problems are reported at once.
pub fn validate_specs(specs: &[ChartSpec], tables: &DerivedTables) -> Result<(), SalesError> {
    let mut problems = Vec::new();
    for spec in specs {
        let required = spec.required_columns();
        for table in [SourceTable::Sales, SourceTable::Stores] {
            let names: Vec<&str> = required
                .iter()
                .filter(|(t, _)| *t == table)
                .map(|(_, c)| *c)
                .collect();
            let df = match table {
                SourceTable::Sales => &tables.sales,
                SourceTable::Stores => &tables.stores,
            };
            for column in missing_columns(df, &names) {
                problems.push(format!("`{}` needs column `{column}` in the {table:?} table", spec.key));
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(SalesError::Configuration(problems.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::derive_features;
    use crate::data_handling::tests::sample_tables;

    #[test]
    fn catalogue_keys_and_titles_are_unique() {
        let catalogue = chart_catalogue(DEFAULT_STORE_ID);
        assert_eq!(catalogue.len(), 22);
        let keys: BTreeSet<&str> = catalogue.iter().map(|c| c.key).collect();
        let titles: BTreeSet<&str> = catalogue.iter().map(|c| c.title).collect();
        assert_eq!(keys.len(), catalogue.len());
        assert_eq!(titles.len(), catalogue.len());
    }

    #[test]
    fn catalogue_matches_derived_schema() {
        let (sales, stores) = sample_tables();
        let tables = derive_features(&sales, &stores).unwrap();
        validate_specs(&chart_catalogue(1), &tables).unwrap();
    }

    #[test]
    fn selection_keeps_catalogue_order() {
        let picked = select_charts(
            chart_catalogue(1),
            &["correlation".to_string(), "sales-by-year".to_string()],
        )
        .unwrap();
        let keys: Vec<&str> = picked.iter().map(|c| c.key).collect();
        assert_eq!(keys, vec!["sales-by-year", "correlation"]);
    }

    #[test]
    fn unknown_selection_is_a_configuration_error() {
        let err = select_charts(chart_catalogue(1), &["nope".to_string()]).unwrap_err();
        assert!(matches!(err, SalesError::Configuration(_)));
    }

    #[test]
    fn missing_column_is_a_configuration_error() {
        let (sales, stores) = sample_tables();
        let tables = derive_features(&sales, &stores).unwrap();
        let spec = ChartSpec {
            key: "foo",
            title: "Foo",
            table: SourceTable::Stores,
            kind: ChartKind::Histogram {
                column: "Foo",
                bins: 10,
                clip: (0.0, 1.0),
            },
        };
        let err = validate_specs(&[spec], &tables).unwrap_err();
        match err {
            SalesError::Configuration(msg) => assert!(msg.contains("Foo")),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
