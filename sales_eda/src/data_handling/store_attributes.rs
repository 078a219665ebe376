use std::path::PathBuf;

use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::helper_functions::{read_csv, require_columns};
use crate::models::{
    Dataset, SalesError, AVG_CUSTOMERS, AVG_SALES, COMPETITION_DISTANCE, CUSTOMERS, SALES,
    STORE, STORE_ATTRIBUTE_COLUMNS,
};

/// Static per-store attributes (`store.csv`).
pub struct StoreAttributesTable {
    pub path: PathBuf,
}

impl Dataset for StoreAttributesTable {
    fn load(&self) -> Result<DataFrame, SalesError> {
        info!("Reading store attributes from {}", self.path.display());
        let df = read_csv(&self.path)?;
        require_columns(&df, &STORE_ATTRIBUTE_COLUMNS, &self.path.display().to_string())?;
        debug!("Loaded {} stores", df.height());
        Ok(df)
    }
}

fn with_int_store_key(df: &DataFrame) -> Result<DataFrame, SalesError> {
    let mut out = df.clone();
    let key = out.column(STORE)?.cast(&DataType::Int64)?;
    out.with_column(key)?;
    Ok(out)
}

/// Mean `Sales` and `Customers` per store, one row per store with at least one record.
pub fn store_sales_averages(sales: &DataFrame) -> Result<DataFrame, SalesError> {
    let averages = with_int_store_key(sales)?
        .lazy()
        .group_by_stable([col(STORE)])
        .agg([
            col(SALES).cast(DataType::Float64).mean().alias(AVG_SALES),
            col(CUSTOMERS).cast(DataType::Float64).mean().alias(AVG_CUSTOMERS),
        ])
        .sort([STORE], SortMultipleOptions::default())
        .collect()?;
    Ok(averages)
}

/// Inner join of the per-store averages onto the attribute table.
///
/// Stores without sales history do not survive the join.
pub fn enrich_store_attributes(
    averages: &DataFrame,
    stores: &DataFrame,
) -> Result<DataFrame, SalesError> {
    let enriched = with_int_store_key(averages)?
        .lazy()
        .join(
            with_int_store_key(stores)?.lazy(),
            [col(STORE)],
            [col(STORE)],
            JoinArgs::new(JoinType::Inner),
        )
        .sort([STORE], SortMultipleOptions::default())
        .collect()?;

    let dropped = stores.height().saturating_sub(enriched.height());
    if dropped > 0 {
        warn!("{} store(s) without sales records dropped from the store table", dropped);
    }
    Ok(enriched)
}

/// Replace missing `CompetitionDistance` values with the column median.
///
/// A column with no values at all stays null.
pub fn fill_competition_distance(stores: &DataFrame) -> Result<DataFrame, SalesError> {
    let distance = col(COMPETITION_DISTANCE).cast(DataType::Float64);
    let filled = stores
        .clone()
        .lazy()
        .with_column(
            distance
                .clone()
                .fill_null(distance.median())
                .alias(COMPETITION_DISTANCE),
        )
        .collect()?;
    Ok(filled)
}
