use thiserror::Error;

/// Failures raised by the emissions-impact engine.
///
/// Every variant is fatal for the run: the engine never substitutes a
/// default for a value it could not compute.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// An input argument has the wrong shape. Raised before any computation.
    #[error("invalid argument `{argument}`: {reason}")]
    Validation { argument: &'static str, reason: String },

    /// The shift transform found an implementation run of odd length.
    #[error("implementation run starting at hour {index} has length {length}; run length must be even, DR shift windows are symmetric")]
    OddShiftWindow { index: usize, length: usize },

    /// A scheduled product has no row in the plan's product info.
    #[error("product `{product}` has no product-info row for plan `{plan}`")]
    UnknownProduct { product: String, plan: String },

    /// The potential table has no value for a product in a forecast year.
    #[error("no DR potential for product `{product}` in {plan_season} for year {year}")]
    MissingPotential {
        product: String,
        plan_season: String,
        year: i32,
    },

    /// Emission-rate rows of a year do not pair one-to-one with the hourly schedule.
    #[error("year {year} has {rates} emission-rate hours after leap-day removal but the schedule has {indicator}")]
    HourCountMismatch {
        year: i32,
        rates: usize,
        indicator: usize,
    },

    /// A label in the input tables could not be parsed.
    #[error("unrecognised {field} label `{value}`")]
    InvalidLabel { field: &'static str, value: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
