//! Command-line parsing. Dispatch lives in `main.rs`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::analysis::chart_spec::DEFAULT_STORE_ID;
use crate::blending::BlendConfig;

#[derive(Debug, Parser)]
#[command(
    name = "sales_eda",
    version,
    about = "Exploratory charts for store sales data and forecast blending"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Derive features from the sales and store tables and render the charts.
    Plots(PlotsArgs),
    /// Blend two aligned forecast files into one.
    Blend(BlendArgs),
    /// Print the available chart keys and titles.
    ListCharts,
}

#[derive(Debug, Args, Clone)]
pub struct PlotsArgs {
    /// Daily sales records (CSV).
    #[arg(long, default_value = "data/train.csv")]
    pub sales: PathBuf,

    /// Store attribute table (CSV).
    #[arg(long, default_value = "data/store.csv")]
    pub stores: PathBuf,

    /// Directory the PNG files are written to.
    #[arg(long, default_value = "plots")]
    pub out_dir: PathBuf,

    /// Comma-separated chart keys to render (default: all). See `list-charts`.
    #[arg(long, value_delimiter = ',')]
    pub charts: Vec<String>,

    /// Store used by the competition effect chart.
    #[arg(long, default_value_t = DEFAULT_STORE_ID)]
    pub store_id: i64,

    /// Also write the derived sales and store tables as CSV into this directory.
    #[arg(long)]
    pub export_derived: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct BlendArgs {
    /// First forecast file (`Id,Sales`).
    #[arg(long, default_value = "predictions/xgboostregressor6.csv")]
    pub first: PathBuf,

    /// Second forecast file (`Id,Sales`).
    #[arg(long, default_value = "predictions/xgboostregressor-log.csv")]
    pub second: PathBuf,

    /// Where the blended forecast is written.
    #[arg(long, default_value = "predictions/xgboostensemble2.csv")]
    pub output: PathBuf,

    /// JSON file with `weight_a`, `weight_b` and `correction`.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub weight_a: Option<f64>,

    #[arg(long)]
    pub weight_b: Option<f64>,

    /// Scalar applied after weighting.
    #[arg(long)]
    pub correction: Option<f64>,
}

impl BlendArgs {
    /// Flag values win over the config file, which wins over the defaults.
    pub fn apply_overrides(&self, mut config: BlendConfig) -> BlendConfig {
        if let Some(w) = self.weight_a {
            config.weight_a = w;
        }
        if let Some(w) = self.weight_b {
            config.weight_b = w;
        }
        if let Some(c) = self.correction {
            config.correction = c;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_keys_split_on_commas() {
        let cli = Cli::try_parse_from([
            "sales_eda",
            "plots",
            "--charts",
            "sales-histogram,correlation",
            "--store-id",
            "12",
        ])
        .unwrap();
        let Command::Plots(args) = cli.command else {
            panic!("expected plots subcommand");
        };
        assert_eq!(args.charts, vec!["sales-histogram", "correlation"]);
        assert_eq!(args.store_id, 12);
        assert_eq!(args.sales, PathBuf::from("data/train.csv"));
        assert!(args.export_derived.is_none());
    }

    #[test]
    fn flags_override_config_values() {
        let cli = Cli::try_parse_from(["sales_eda", "blend", "--correction", "1.0"]).unwrap();
        let Command::Blend(args) = cli.command else {
            panic!("expected blend subcommand");
        };
        let config = args.apply_overrides(BlendConfig {
            weight_a: 0.3,
            weight_b: 0.7,
            correction: 0.9,
        });
        assert_eq!(config.weight_a, 0.3);
        assert_eq!(config.weight_b, 0.7);
        assert_eq!(config.correction, 1.0);
    }
}
