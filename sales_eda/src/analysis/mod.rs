pub mod aggregation;
pub mod chart_spec;
pub(crate) mod plotting;
pub mod renderer;
