//! blending.rs - weighted average of two aligned forecast files
//!
//! Both inputs must list the same `Id`s in the same order; the blend is
//! refused otherwise so rows can never be paired with the wrong record.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::SalesError;

/// One predicted row of a forecast file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "Sales")]
    pub sales: f64,
}

/// Blend weights, kept on disk as JSON next to the forecasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendConfig {
    pub weight_a: f64,
    pub weight_b: f64,
    /// Scalar applied to the weighted sum.
    pub correction: f64,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            weight_a: 0.5,
            weight_b: 0.5,
            correction: 0.970,
        }
    }
}

impl BlendConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, SalesError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| SalesError::parse(path.display().to_string(), e.to_string()))?;
        let config: BlendConfig = serde_json::from_str(&json).map_err(|e| {
            SalesError::Configuration(format!("invalid blend config {}: {e}", path.display()))
        })?;
        info!("Loaded blend configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SalesError> {
        for (name, value) in [
            ("weight_a", self.weight_a),
            ("weight_b", self.weight_b),
            ("correction", self.correction),
        ] {
            if !value.is_finite() {
                return Err(SalesError::Configuration(format!(
                    "blend parameter `{name}` must be finite, got {value}"
                )));
            }
        }
        Ok(())
    }
}

pub fn read_forecasts(path: &Path) -> Result<Vec<ForecastRecord>, SalesError> {
    let path_str = path.display().to_string();
    let mut reader =
        csv::Reader::from_path(path).map_err(|e| SalesError::parse(&path_str, e.to_string()))?;

    let mut records = Vec::new();
    for (row, record) in reader.deserialize().enumerate() {
        let record: ForecastRecord =
            record.map_err(|e| SalesError::parse(&path_str, format!("row {row}: {e}")))?;
        records.push(record);
    }
    debug!("Read {} forecasts from {}", records.len(), path_str);
    Ok(records)
}

pub fn write_forecasts(path: &Path, records: &[ForecastRecord]) -> Result<(), SalesError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Both forecasts must have the same length and the same `Id` at every position.
pub fn check_alignment(a: &[ForecastRecord], b: &[ForecastRecord]) -> Result<(), SalesError> {
    if a.len() != b.len() {
        return Err(SalesError::Alignment(format!(
            "row counts differ: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    if let Some((row, (x, y))) = a
        .iter()
        .zip(b.iter())
        .enumerate()
        .find(|(_, (x, y))| x.id != y.id)
    {
        return Err(SalesError::Alignment(format!(
            "Id mismatch at row {row}: {} vs {}",
            x.id, y.id
        )));
    }
    Ok(())
}

/// `(a * weight_a + b * weight_b) * correction`, keyed by the Ids of `a`.
pub fn blend(
    a: &[ForecastRecord],
    b: &[ForecastRecord],
    config: &BlendConfig,
) -> Result<Vec<ForecastRecord>, SalesError> {
    config.validate()?;
    check_alignment(a, b)?;

    Ok(a.iter()
        .zip(b.iter())
        .map(|(x, y)| ForecastRecord {
            id: x.id,
            sales: (x.sales * config.weight_a + y.sales * config.weight_b) * config.correction,
        })
        .collect())
}

/// Read both inputs, blend, and write the result. Nothing is written on failure.
pub fn blend_files(
    first: &Path,
    second: &Path,
    output: &Path,
    config: &BlendConfig,
) -> Result<usize, SalesError> {
    let a = read_forecasts(first)?;
    let b = read_forecasts(second)?;
    let blended = blend(&a, &b, config)?;
    write_forecasts(output, &blended)?;
    info!(
        "Blended {} forecasts (w_a = {}, w_b = {}, correction = {}) into {}",
        blended.len(),
        config.weight_a,
        config.weight_b,
        config.correction,
        output.display()
    );
    Ok(blended.len())
}
