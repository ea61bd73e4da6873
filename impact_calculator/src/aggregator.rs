use crate::bins::sort_bins;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    BinId, DrImplementationSeries, DrPotentialSeries, EngineConfig, EngineInputs, PlanSeason,
    ProductCatalog, ProductKind, ResultKey, YearlyAvoidedEmissions,
};
use crate::shift::shift_hours;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;

pub type YearlyResults = BTreeMap<ResultKey, YearlyAvoidedEmissions>;

/// Hourly emission rates of one scenario, split by year with Feb 29 removed.
struct ScenarioProfiles {
    /// `None` for the baseline scenario.
    token: Option<String>,
    by_year: BTreeMap<i32, Vec<f64>>,
}

/// Everything needed to evaluate the bins of one plan and season.
struct SeasonContext<'a> {
    plan_season: PlanSeason,
    hours: &'a DrImplementationSeries,
    potential: &'a DrPotentialSeries,
    catalog: &'a ProductCatalog,
    first_year: i32,
    last_year: i32,
}

pub struct YearlyImpactAggregator {
    config: EngineConfig,
}

impl YearlyImpactAggregator {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Compute yearly avoided emissions for every scenario, plan, season and bin.
    ///
    /// Inputs are assumed to have passed the orchestrator's validation; a
    /// missing table surfaces as a validation error naming it.
    pub fn calculate_all(&self, inputs: &EngineInputs) -> EngineResult<YearlyResults> {
        let (first_year, last_year) =
            inputs
                .emission_rates
                .year_range()
                .ok_or_else(|| EngineError::Validation {
                    argument: "emission_rates",
                    reason: "table has no rows".to_string(),
                })?;

        let tokens = inputs.emission_rates.scenario_tokens()?;
        let profiles: Vec<ScenarioProfiles> = inputs
            .emission_rates
            .scenarios
            .iter()
            .zip(tokens)
            .map(|(scenario, token)| ScenarioProfiles {
                token,
                by_year: inputs.emission_rates.yearly_profiles(scenario),
            })
            .collect();

        let mut contexts = Vec::new();
        for plan_season in inputs.plan_season_keys() {
            contexts.push(SeasonContext {
                plan_season,
                hours: lookup(&inputs.dr_hours, &plan_season, "dr_hours")?,
                potential: lookup(&inputs.dr_potential, &plan_season, "dr_potential")?,
                catalog: inputs
                    .product_info
                    .get(&plan_season.plan)
                    .ok_or_else(|| EngineError::Validation {
                        argument: "product_info",
                        reason: format!("no product info for plan {}", plan_season.plan),
                    })?,
                first_year,
                last_year,
            });
        }

        let jobs: Vec<(&ScenarioProfiles, &SeasonContext)> = profiles
            .iter()
            .flat_map(|scenario| contexts.iter().map(move |context| (scenario, context)))
            .collect();

        info!(
            "Aggregating {} scenario/plan/season combinations over {}-{}",
            jobs.len(),
            first_year,
            last_year
        );

        let batches: Vec<Vec<(ResultKey, YearlyAvoidedEmissions)>> = if self.config.parallel {
            jobs.par_iter()
                .map(|(scenario, context)| self.calculate_season(scenario, context))
                .collect::<EngineResult<_>>()?
        } else {
            jobs.iter()
                .map(|(scenario, context)| self.calculate_season(scenario, context))
                .collect::<EngineResult<_>>()?
        };

        Ok(batches.into_iter().flatten().collect())
    }

    fn calculate_season(
        &self,
        scenario: &ScenarioProfiles,
        context: &SeasonContext,
    ) -> EngineResult<Vec<(ResultKey, YearlyAvoidedEmissions)>> {
        let groups = sort_bins(context.catalog, &context.hours.product_names())?;

        groups
            .iter()
            .map(|(bin, products)| {
                let key = ResultKey::new(scenario.token.clone(), context.plan_season, bin);
                debug!("Calculating {} ({} products)", key, products.len());
                let table = self.calculate_bin(&scenario.by_year, context, bin, products)?;
                Ok((key, table))
            })
            .collect()
    }

    fn calculate_bin(
        &self,
        rates_by_year: &BTreeMap<i32, Vec<f64>>,
        context: &SeasonContext,
        bin: BinId,
        products: &[String],
    ) -> EngineResult<YearlyAvoidedEmissions> {
        let dual_plan = context.plan_season.plan == self.config.dual_plan;
        let has_dual_product = products.iter().any(|p| *p == self.config.dual_product);
        let dual = dual_plan && has_dual_product && bin == BinId(self.config.dual_bin);
        if dual_plan && has_dual_product && !dual {
            warn!(
                "{} is in {} of {}, outside dual {}; evaluating it by its own classification",
                self.config.dual_product,
                bin,
                context.plan_season,
                BinId(self.config.dual_bin)
            );
        }

        let columns: Vec<String> = if dual {
            vec![
                self.config.companion_product.clone(),
                self.config.dual_shift_name(),
                self.config.dual_shed_name(),
            ]
        } else {
            products.to_vec()
        };
        let mut table = YearlyAvoidedEmissions::zeros(context.first_year, context.last_year, &columns);

        for product in products {
            let info = context.catalog.lookup(product)?;
            let indicator = context.hours.product(product).ok_or_else(|| EngineError::Validation {
                argument: "dr_hours",
                reason: format!("{} has no schedule for {}", context.plan_season, product),
            })?;

            if dual && *product == self.config.dual_product {
                let shifted = shift_hours(indicator)?;
                self.fill_column(&mut table, &self.config.dual_shed_name(), product, indicator, rates_by_year, context)?;
                self.fill_column(&mut table, &self.config.dual_shift_name(), product, &shifted, rates_by_year, context)?;
                continue;
            }

            if !columns.contains(product) {
                debug!(
                    "Skipping {} in {} {}: not part of the dual-hypothesis product set",
                    product, context.plan_season, bin
                );
                continue;
            }

            let schedule = match info.kind {
                ProductKind::Shift => shift_hours(indicator)?,
                ProductKind::Shed => indicator.to_vec(),
            };
            self.fill_column(&mut table, product, product, &schedule, rates_by_year, context)?;
        }

        Ok(table)
    }

    fn fill_column(
        &self,
        table: &mut YearlyAvoidedEmissions,
        column: &str,
        product: &str,
        schedule: &[i8],
        rates_by_year: &BTreeMap<i32, Vec<f64>>,
        context: &SeasonContext,
    ) -> EngineResult<()> {
        let years = table.years.clone();
        for (row, year) in years.into_iter().enumerate() {
            let potential =
                context
                    .potential
                    .value(product, year)
                    .ok_or_else(|| EngineError::MissingPotential {
                        product: product.to_string(),
                        plan_season: context.plan_season.to_string(),
                        year,
                    })?;

            let rates = rates_by_year.get(&year).map(Vec::as_slice).unwrap_or(&[]);
            if rates.len() != schedule.len() {
                return Err(EngineError::HourCountMismatch {
                    year,
                    rates: rates.len(),
                    indicator: schedule.len(),
                });
            }

            table.set(column, row, self.yearly_impact(rates, schedule, potential));
        }
        Ok(())
    }

    /// Metric tons CO2e avoided in one year: rate × indicator × MW × unit factor, summed over hours.
    pub fn yearly_impact(&self, rates: &[f64], schedule: &[i8], potential_mw: f64) -> f64 {
        rates
            .iter()
            .zip(schedule.iter())
            .map(|(rate, on)| rate * f64::from(*on) * potential_mw * self.config.emissions_unit_factor)
            .sum()
    }
}

fn lookup<'a, T>(
    map: &'a BTreeMap<PlanSeason, T>,
    key: &PlanSeason,
    argument: &'static str,
) -> EngineResult<&'a T> {
    map.get(key).ok_or_else(|| EngineError::Validation {
        argument,
        reason: format!("no table for {}", key),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        EmissionRateSeries, HourStamp, IndicatorColumn, NamedColumn, Plan, ProductInfo,
        ScenarioRates, Season,
    };
    use approx::assert_relative_eq;

    const HOURS: usize = 48;

    /// Two short "years" of 48 hours each; enough to exercise the pairing logic.
    fn rates(values: impl Fn(usize) -> f64, scenarios: &[&str]) -> EmissionRateSeries {
        let mut stamps = Vec::new();
        for year in [2030, 2031] {
            for h in 0..HOURS {
                stamps.push(HourStamp::new(year, 1, 1 + (h / 24) as u32, (h % 24) as u32 + 1));
            }
        }
        let scenario_columns = scenarios
            .iter()
            .enumerate()
            .map(|(i, name)| {
                ScenarioRates::new(*name, (0..stamps.len()).map(|h| values(h) * (i + 1) as f64).collect())
            })
            .collect();
        EmissionRateSeries::new(stamps, scenario_columns)
    }

    fn window(start: usize, len: usize) -> Vec<i8> {
        (0..HOURS).map(|h| i8::from(h >= start && h < start + len)).collect()
    }

    fn inputs(plan: Plan, products: &[(&str, u8, ProductKind, f64)]) -> EngineInputs {
        let ps = PlanSeason::new(plan, Season::Summer);
        let hours = DrImplementationSeries::new(
            (0..HOURS).map(|h| (h % 24) as u32 + 1).collect(),
            products
                .iter()
                .map(|(name, ..)| IndicatorColumn::new(*name, window(18, 4)))
                .collect(),
        );
        let potential = DrPotentialSeries::new(
            vec![2030, 2031],
            products
                .iter()
                .map(|(name, _, _, mw)| NamedColumn::new(*name, vec![*mw, *mw * 2.0]))
                .collect(),
        );
        let catalog = ProductCatalog::new(
            plan,
            products
                .iter()
                .map(|(name, bin, kind, _)| ProductInfo {
                    product: name.to_string(),
                    bin: BinId(*bin),
                    kind: *kind,
                })
                .collect(),
        );
        EngineInputs {
            emission_rates: rates(|_| 1.0, &["Baseline Emissions Rate Estimate", "SCC Emissions Rate"]),
            dr_hours: BTreeMap::from([(ps, hours)]),
            dr_potential: BTreeMap::from([(ps, potential)]),
            product_info: BTreeMap::from([(plan, catalog)]),
            plans: vec![plan],
            plan_seasons: BTreeMap::from([(plan, vec![Season::Summer])]),
        }
    }

    #[test]
    fn test_shed_closed_form() {
        let inputs = inputs(Plan::OldBins, &[("ComCurtail", 2, ProductKind::Shed, 3.0)]);
        let aggregator = YearlyImpactAggregator::new(EngineConfig::default().sequential());
        let results = aggregator.calculate_all(&inputs).unwrap();

        let key: ResultKey = "oldbins_Summer_bin2".parse().unwrap();
        let table = &results[&key];
        assert_eq!(table.years, vec![2030, 2031]);
        // one 4-hour window per year, rate 1.0, 3 MW then 6 MW
        assert_relative_eq!(table.value("ComCurtail", 2030).unwrap(), 4.0 * 3.0 * 0.4536, epsilon = 1e-9);
        assert_relative_eq!(table.value("ComCurtail", 2031).unwrap(), 4.0 * 6.0 * 0.4536, epsilon = 1e-9);
    }

    #[test]
    fn test_flat_rate_shift_nets_to_zero() {
        let inputs = inputs(Plan::OldBins, &[("ResTOU", 1, ProductKind::Shift, 1.0)]);
        let results = YearlyImpactAggregator::new(EngineConfig::default())
            .calculate_all(&inputs)
            .unwrap();
        let key: ResultKey = "oldbins_Summer_bin1".parse().unwrap();
        assert_relative_eq!(results[&key].value("ResTOU", 2030).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_dual_product_columns() {
        let inputs = inputs(
            Plan::NewBins,
            &[("DVR", 1, ProductKind::Shed, 1.0), ("ResTOU", 1, ProductKind::Shift, 2.0)],
        );
        let results = YearlyImpactAggregator::new(EngineConfig::default())
            .calculate_all(&inputs)
            .unwrap();
        let key: ResultKey = "newbins_Summer_bin1".parse().unwrap();
        let table = &results[&key];
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["DVR", "ResTOU_shift", "ResTOU_shed"]);

        assert_relative_eq!(table.value("DVR", 2030).unwrap(), 4.0 * 0.4536, epsilon = 1e-9);
        assert_relative_eq!(table.value("ResTOU_shed", 2030).unwrap(), 4.0 * 2.0 * 0.4536, epsilon = 1e-9);
        assert_relative_eq!(table.value("ResTOU_shift", 2030).unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_scenario_keys() {
        let inputs = inputs(Plan::OldBins, &[("ComCurtail", 2, ProductKind::Shed, 3.0)]);
        let results = YearlyImpactAggregator::new(EngineConfig::default())
            .calculate_all(&inputs)
            .unwrap();
        let keys: Vec<String> = results.keys().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["oldbins_Summer_bin2", "SCC_oldbins_Summer_bin2"]);

        let baseline = results[&"oldbins_Summer_bin2".parse::<ResultKey>().unwrap()].value("ComCurtail", 2030);
        let scc = results[&"SCC_oldbins_Summer_bin2".parse::<ResultKey>().unwrap()].value("ComCurtail", 2030);
        // second scenario column carries doubled rates
        assert_relative_eq!(scc.unwrap(), 2.0 * baseline.unwrap(), epsilon = 1e-9);
    }

    #[test]
    fn test_shared_scenario_prefix_rejected() {
        let mut inputs = inputs(Plan::OldBins, &[("ComCurtail", 2, ProductKind::Shed, 3.0)]);
        inputs.emission_rates = rates(|_| 1.0, &["Baseline Estimate", "SCC Low", "SCC High"]);
        let err = YearlyImpactAggregator::new(EngineConfig::default())
            .calculate_all(&inputs)
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation { argument: "emission_rates", .. }));
    }

    #[test]
    fn test_dual_product_outside_dual_bin_keeps_own_column() {
        let inputs = inputs(
            Plan::NewBins,
            &[("DVR", 1, ProductKind::Shed, 1.0), ("ResTOU", 2, ProductKind::Shed, 2.0)],
        );
        let results = YearlyImpactAggregator::new(EngineConfig::default())
            .calculate_all(&inputs)
            .unwrap();

        let bin1 = &results[&"newbins_Summer_bin1".parse::<ResultKey>().unwrap()];
        let names: Vec<&str> = bin1.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["DVR"]);

        let bin2 = &results[&"newbins_Summer_bin2".parse::<ResultKey>().unwrap()];
        let names: Vec<&str> = bin2.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["ResTOU"]);
        assert_relative_eq!(bin2.value("ResTOU", 2030).unwrap(), 4.0 * 2.0 * 0.4536, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_potential_year() {
        let mut inputs = inputs(Plan::OldBins, &[("ComCurtail", 2, ProductKind::Shed, 3.0)]);
        let ps = PlanSeason::new(Plan::OldBins, Season::Summer);
        if let Some(potential) = inputs.dr_potential.get_mut(&ps) {
            potential.years = vec![2030, 2032];
        }
        let err = YearlyImpactAggregator::new(EngineConfig::default())
            .calculate_all(&inputs)
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::MissingPotential {
                product: "ComCurtail".to_string(),
                plan_season: "oldbins_Summer".to_string(),
                year: 2031,
            }
        );
    }

    #[test]
    fn test_hour_count_mismatch() {
        let aggregator = YearlyImpactAggregator::new(EngineConfig::default());
        let mut inputs = inputs(Plan::OldBins, &[("ComCurtail", 2, ProductKind::Shed, 3.0)]);
        inputs.emission_rates.timestamps.truncate(HOURS + 10);
        let err = aggregator.calculate_all(&inputs).unwrap_err();
        assert!(matches!(err, EngineError::HourCountMismatch { year: 2031, rates: 10, .. }));
    }

    #[test]
    fn test_yearly_impact_is_linear_in_potential() {
        let aggregator = YearlyImpactAggregator::new(EngineConfig::default());
        let rates: Vec<f64> = (0..HOURS).map(|h| 0.5 + h as f64 / 10.0).collect();
        let schedule = shift_hours(&window(10, 4)).unwrap();
        let single = aggregator.yearly_impact(&rates, &schedule, 7.5);
        let double = aggregator.yearly_impact(&rates, &schedule, 15.0);
        assert_relative_eq!(double, 2.0 * single, epsilon = 1e-9);
    }
}
