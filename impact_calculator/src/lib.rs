pub mod aggregator;
pub mod bins;
pub mod error;
pub mod models;
pub mod periods;
pub mod pipeline;
pub mod potential;
pub mod shift;
pub mod summarizer;

pub use aggregator::{YearlyImpactAggregator, YearlyResults};
pub use bins::{sort_bins, BinGroups};
pub use error::{EngineError, EngineResult};
pub use models::{
    BarchartSummary, BinId, DrImplementationSeries, DrPotentialSeries, EmissionRateSeries,
    EngineConfig, EngineInputs, ImpactOutputs, Plan, PlanSeason, ProductCatalog, ResultKey,
    Season, YearlyAvoidedEmissions,
};
pub use periods::{summarize_dr_hours, DrHoursSummary, PeriodConfig, PeriodWindow};
pub use pipeline::run_emissions_impacts;
pub use potential::{bin_potential_tables, potential_comparison, BinPotential, PotentialComparison};
pub use shift::shift_hours;
pub use summarizer::BarchartSummarizer;
