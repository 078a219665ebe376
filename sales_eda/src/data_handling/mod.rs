//! Loading the raw tables and deriving the features the charts consume.

pub mod sales_records;
pub mod store_attributes;

use polars::frame::DataFrame;
use tracing::info;

use crate::models::SalesError;
use sales_records::derive_sales_features;
use store_attributes::{enrich_store_attributes, fill_competition_distance, store_sales_averages};

/// The enriched sales and store tables. Both are fresh frames; the inputs they
/// were derived from are never modified.
#[derive(Debug, Clone)]
pub struct DerivedTables {
    pub sales: DataFrame,
    pub stores: DataFrame,
}

pub fn derive_features(sales: &DataFrame, stores: &DataFrame) -> Result<DerivedTables, SalesError> {
    let sales = derive_sales_features(sales)?;
    let averages = store_sales_averages(&sales)?;
    let stores = enrich_store_attributes(&averages, stores)?;
    let stores = fill_competition_distance(&stores)?;

    info!(
        "Derived features for {} sales rows across {} stores",
        sales.height(),
        stores.height()
    );
    Ok(DerivedTables { sales, stores })
}
