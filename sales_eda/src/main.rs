use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::analysis::chart_spec::{chart_catalogue, select_charts};
use crate::analysis::renderer::render_charts;
use crate::blending::{blend_files, BlendConfig};
use crate::cli::{BlendArgs, Cli, Command, PlotsArgs};
use crate::data_handling::sales_records::SalesRecords;
use crate::data_handling::store_attributes::StoreAttributesTable;
use crate::data_handling::derive_features;
use crate::helper_functions::{dataframe_to_csv, resolve_path};
use crate::models::Dataset;

mod analysis;
mod blending;
mod cli;
mod data_handling;
mod helper_functions;
mod models;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Plots(args) => run_plots(&args),
        Command::Blend(args) => run_blend(&args),
        Command::ListCharts => {
            for spec in chart_catalogue(0) {
                println!("{:<32} {}", spec.key, spec.title);
            }
            Ok(())
        }
    }
}

fn run_plots(args: &PlotsArgs) -> anyhow::Result<()> {
    info!("Starting the sales chart pipeline");

    // Resolve the selection before touching the data so typos fail fast
    let specs = select_charts(chart_catalogue(args.store_id), &args.charts)?;

    let sales = SalesRecords {
        path: resolve_path(&args.sales),
    }
    .load()
    .with_context(|| format!("loading sales records from {}", args.sales.display()))?;
    let stores = StoreAttributesTable {
        path: resolve_path(&args.stores),
    }
    .load()
    .with_context(|| format!("loading store attributes from {}", args.stores.display()))?;

    let mut tables = derive_features(&sales, &stores).context("deriving features")?;

    if let Some(dir) = &args.export_derived {
        let dir = resolve_path(dir);
        std::fs::create_dir_all(&dir)?;
        dataframe_to_csv(&mut tables.sales, &dir.join("sales_derived.csv"))?;
        dataframe_to_csv(&mut tables.stores, &dir.join("stores_derived.csv"))?;
        info!("Derived tables written to {}", dir.display());
    }

    let out_dir = resolve_path(&args.out_dir);
    let written = render_charts(&tables, &specs, &out_dir)?;
    info!("{} charts written to {}", written.len(), out_dir.display());
    Ok(())
}

fn run_blend(args: &BlendArgs) -> anyhow::Result<()> {
    let base = match &args.config {
        Some(path) => BlendConfig::from_json_file(&resolve_path(path))?,
        None => BlendConfig::default(),
    };
    let config = args.apply_overrides(base);

    blend_files(
        &resolve_path(&args.first),
        &resolve_path(&args.second),
        &resolve_path(&args.output),
        &config,
    )
    .context("blending forecasts")?;
    Ok(())
}
