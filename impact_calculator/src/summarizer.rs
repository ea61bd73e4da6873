use crate::error::{EngineError, EngineResult};
use crate::models::{
    BarchartSummary, BinId, EngineConfig, NamedColumn, Plan, ResultKey, Season,
    YearlyAvoidedEmissions,
};
use log::warn;
use std::collections::{BTreeMap, BTreeSet};

/// Per-product totals of one bin, in the order products were first seen.
#[derive(Debug, Clone, Default)]
struct ProductTotals(Vec<(String, f64)>);

impl ProductTotals {
    fn add(&mut self, product: &str, value: f64) {
        match self.0.iter_mut().find(|(name, _)| name == product) {
            Some((_, total)) => *total += value,
            None => self.0.push((product.to_string(), value)),
        }
    }

    fn get(&self, product: &str) -> f64 {
        self.0
            .iter()
            .find(|(name, _)| name == product)
            .map_or(0.0, |(_, total)| *total)
    }

    fn sum(&self) -> f64 {
        self.0.iter().map(|(_, total)| total).sum()
    }
}

/// Season totals of one plan, one slot per bin.
#[derive(Debug, Clone, Default)]
struct PlanAccumulator {
    seasons: BTreeMap<Season, Vec<ProductTotals>>,
}

impl PlanAccumulator {
    fn bin(&self, season: Season, bin: BinId) -> Option<&ProductTotals> {
        let slot = usize::from(bin.number()).checked_sub(1)?;
        self.seasons.get(&season)?.get(slot)
    }
}

pub struct BarchartSummarizer {
    config: EngineConfig,
}

impl BarchartSummarizer {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Collapse one scenario's yearly tables into season totals.
    ///
    /// Returns the season-by-grouping table and the dual-bin detail table.
    pub fn summarize<'a, I>(&self, tables: I) -> EngineResult<(BarchartSummary, BarchartSummary)>
    where
        I: IntoIterator<Item = (&'a ResultKey, &'a YearlyAvoidedEmissions)>,
    {
        let mut accumulators: BTreeMap<Plan, PlanAccumulator> = BTreeMap::new();
        let mut scenario: Option<Option<&str>> = None;
        let mut seasons = BTreeSet::new();
        let mut detail_seasons = BTreeSet::new();
        let bin_count = usize::from(self.config.bin_count);

        for (key, table) in tables {
            match scenario {
                None => scenario = Some(key.scenario.as_deref()),
                Some(seen) if seen != key.scenario.as_deref() => {
                    return Err(EngineError::Validation {
                        argument: "tables",
                        reason: format!(
                            "summary input mixes scenarios {} and {}",
                            seen.unwrap_or("baseline"),
                            key.scenario.as_deref().unwrap_or("baseline")
                        ),
                    });
                }
                Some(_) => {}
            }

            let season = key.plan_season.season;
            seasons.insert(season);
            if key.bin.number() == 0 || usize::from(key.bin.number()) > bin_count {
                warn!("Ignoring {}: bin outside 1..={}", key, bin_count);
                continue;
            }
            if key.plan_season.plan == self.config.dual_plan && key.bin == BinId(self.config.dual_bin) {
                detail_seasons.insert(season);
            }

            let bins = accumulators
                .entry(key.plan_season.plan)
                .or_default()
                .seasons
                .entry(season)
                .or_insert_with(|| vec![ProductTotals::default(); bin_count]);
            let totals = &mut bins[usize::from(key.bin.number()) - 1];
            for (product, total) in table.column_totals() {
                totals.add(product, total);
            }
        }

        let seasons: Vec<Season> = seasons.into_iter().collect();
        let detail_seasons: Vec<Season> = detail_seasons.into_iter().collect();
        Ok((
            self.season_summary(&accumulators, seasons),
            self.dual_detail(&accumulators, detail_seasons),
        ))
    }

    fn season_summary(
        &self,
        accumulators: &BTreeMap<Plan, PlanAccumulator>,
        seasons: Vec<Season>,
    ) -> BarchartSummary {
        let empty = PlanAccumulator::default();
        let companion = self.config.companion_product.as_str();
        let dual_bin = BinId(self.config.dual_bin);
        let mut columns = Vec::new();

        for plan in Plan::ALL {
            let acc = accumulators.get(&plan).unwrap_or(&empty);
            if plan == self.config.dual_plan {
                for (suffix, variant) in [
                    ("shed", self.config.dual_shed_name()),
                    ("shift", self.config.dual_shift_name()),
                ] {
                    let values = seasons
                        .iter()
                        .map(|season| {
                            acc.bin(*season, dual_bin)
                                .map_or(0.0, |t| t.get(companion) + t.get(&variant))
                        })
                        .collect();
                    columns.push(NamedColumn::new(format!("{}_{}_{}", plan, dual_bin, suffix), values));
                }
            } else {
                for bin in self.config.bins() {
                    let values = seasons
                        .iter()
                        .map(|season| acc.bin(*season, bin).map_or(0.0, ProductTotals::sum))
                        .collect();
                    columns.push(NamedColumn::new(format!("{}_{}", plan, bin), values));
                }
            }
        }

        BarchartSummary { seasons, columns }
    }

    fn dual_detail(
        &self,
        accumulators: &BTreeMap<Plan, PlanAccumulator>,
        seasons: Vec<Season>,
    ) -> BarchartSummary {
        let dual_bin = BinId(self.config.dual_bin);
        let acc = accumulators.get(&self.config.dual_plan);
        let columns = [
            self.config.companion_product.clone(),
            self.config.dual_shift_name(),
            self.config.dual_shed_name(),
        ]
        .into_iter()
        .map(|product| {
            let values = seasons
                .iter()
                .map(|season| {
                    acc.and_then(|a| a.bin(*season, dual_bin))
                        .map_or(0.0, |t| t.get(&product))
                })
                .collect();
            NamedColumn::new(product, values)
        })
        .collect();

        BarchartSummary { seasons, columns }
    }
}
