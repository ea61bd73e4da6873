use crate::aggregator::YearlyImpactAggregator;
use crate::error::{EngineError, EngineResult};
use crate::models::{EngineConfig, EngineInputs, ImpactOutputs, PlanSeason, HOURS_PER_YEAR};
use crate::summarizer::BarchartSummarizer;
use log::info;

/// Validate inputs, compute every scenario, then summarise the baseline scenario.
pub fn run_emissions_impacts(inputs: &EngineInputs, config: &EngineConfig) -> EngineResult<ImpactOutputs> {
    config.validate()?;
    validate_inputs(inputs)?;

    let yearly = YearlyImpactAggregator::new(config.clone()).calculate_all(inputs)?;
    info!("Computed {} yearly avoided-emissions tables", yearly.len());

    // Baseline results are the ones without a scenario prefix.
    let baseline = yearly.iter().filter(|(key, _)| key.is_baseline());
    let (season_summary, bin1_detail) = BarchartSummarizer::new(config.clone()).summarize(baseline)?;

    Ok(ImpactOutputs {
        yearly,
        season_summary,
        bin1_detail,
    })
}

fn invalid(argument: &'static str, reason: impl Into<String>) -> EngineError {
    EngineError::Validation {
        argument,
        reason: reason.into(),
    }
}

pub fn validate_inputs(inputs: &EngineInputs) -> EngineResult<()> {
    let rates = &inputs.emission_rates;
    if rates.timestamps.is_empty() {
        return Err(invalid("emission_rates", "table has no rows"));
    }
    if rates.baseline().is_none() {
        return Err(invalid("emission_rates", "table has no scenario columns"));
    }
    rates.scenario_tokens()?;
    if let Some(bad) = rates
        .scenarios
        .iter()
        .find(|s| s.values.len() != rates.timestamps.len())
    {
        return Err(invalid(
            "emission_rates",
            format!(
                "scenario `{}` has {} rows, expected {}",
                bad.name,
                bad.values.len(),
                rates.timestamps.len()
            ),
        ));
    }

    if inputs.dr_hours.is_empty() {
        return Err(invalid("dr_hours", "mapping is empty"));
    }
    if inputs.dr_potential.is_empty() {
        return Err(invalid("dr_potential", "mapping is empty"));
    }
    if inputs.product_info.is_empty() {
        return Err(invalid("product_info", "mapping is empty"));
    }
    if inputs.plans.is_empty() {
        return Err(invalid("plans", "no plans listed"));
    }

    for plan in &inputs.plans {
        let seasons = inputs
            .plan_seasons
            .get(plan)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid("plan_seasons", format!("no seasons listed for plan {}", plan)))?;
        if !inputs.product_info.contains_key(plan) {
            return Err(invalid("product_info", format!("no product info for plan {}", plan)));
        }
        for season in seasons {
            let key = PlanSeason::new(*plan, *season);
            let hours = inputs
                .dr_hours
                .get(&key)
                .ok_or_else(|| invalid("dr_hours", format!("no schedule for {}", key)))?;
            if hours.len() != HOURS_PER_YEAR {
                return Err(invalid(
                    "dr_hours",
                    format!("{} has {} rows, expected {}", key, hours.len(), HOURS_PER_YEAR),
                ));
            }
            if let Some(column) = hours.products.iter().find(|p| p.values.len() != hours.len()) {
                return Err(invalid(
                    "dr_hours",
                    format!("{} column {} has {} rows, expected {}", key, column.name, column.values.len(), hours.len()),
                ));
            }
            let potential = inputs
                .dr_potential
                .get(&key)
                .ok_or_else(|| invalid("dr_potential", format!("no potential table for {}", key)))?;
            if let Some(column) = potential.products.iter().find(|p| p.values.len() != potential.years.len()) {
                return Err(invalid(
                    "dr_potential",
                    format!("{} column {} has {} rows, expected {}", key, column.name, column.values.len(), potential.years.len()),
                ));
            }
        }
    }

    Ok(())
}
