use anyhow::{Context, Result};
use impact_calculator::{EngineConfig, PeriodConfig, Plan, Season};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Settings for one run of the processor. Every field has a default so a
/// JSON config file only needs the values it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub engine: EngineConfig,
    pub periods: PeriodConfig,
    /// Seasons with DR hours, per plan. Plans run in key order.
    pub plan_seasons: BTreeMap<Plan, Vec<Season>>,
    /// When set for a plan, only these products are loaded for it.
    pub product_subsets: BTreeMap<Plan, Vec<String>>,
    /// Year for the bin potential comparison; defaults to each table's last year.
    pub comparison_year: Option<i32>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            periods: PeriodConfig::default(),
            plan_seasons: BTreeMap::from([
                (Plan::OldBins, vec![Season::Winter, Season::Summer]),
                (Plan::NewBins, vec![Season::Winter, Season::Summer, Season::Fall]),
            ]),
            product_subsets: BTreeMap::from([(
                Plan::NewBins,
                vec!["DVR".to_string(), "ResTOU".to_string()],
            )]),
            comparison_year: None,
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file: {:?}", path))?;
        config
            .engine
            .validate()
            .with_context(|| format!("Invalid engine settings in {:?}", path))?;
        Ok(config)
    }

    pub fn plans(&self) -> Vec<Plan> {
        self.plan_seasons.keys().copied().collect()
    }

    /// Drop every plan not named in `plans`.
    pub fn restrict_plans(&mut self, plans: &[Plan]) {
        self.plan_seasons.retain(|plan, _| plans.contains(plan));
    }

    pub fn keeps_product(&self, plan: Plan, product: &str) -> bool {
        self.product_subsets
            .get(&plan)
            .map_or(true, |subset| subset.iter().any(|p| p == product))
    }
}
