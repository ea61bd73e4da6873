use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Version of the bin-classification scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    OldBins,
    NewBins,
}

impl Plan {
    pub const ALL: [Plan; 2] = [Plan::OldBins, Plan::NewBins];

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::OldBins => "oldbins",
            Plan::NewBins => "newbins",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oldbins" => Ok(Plan::OldBins),
            "newbins" => Ok(Plan::NewBins),
            _ => Err(EngineError::InvalidLabel {
                field: "plan",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Fall];

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Season::ALL
            .into_iter()
            .find(|season| season.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::InvalidLabel {
                field: "season",
                value: s.to_string(),
            })
    }
}

/// Composite key for everything defined per plan and season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlanSeason {
    pub plan: Plan,
    pub season: Season,
}

impl PlanSeason {
    pub fn new(plan: Plan, season: Season) -> Self {
        Self { plan, season }
    }
}

impl fmt::Display for PlanSeason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.plan, self.season)
    }
}

impl FromStr for PlanSeason {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (plan, season) = s.split_once('_').ok_or_else(|| EngineError::InvalidLabel {
            field: "plan_season",
            value: s.to_string(),
        })?;
        Ok(Self::new(plan.parse()?, season.parse()?))
    }
}

/// Capacity bin number, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BinId(pub u8);

impl BinId {
    /// Parse a product-info label such as `Bin 3`.
    pub fn from_label(label: &str) -> EngineResult<Self> {
        let trimmed = label.trim();
        let digits = match trimmed.get(..3) {
            Some(prefix) if prefix.eq_ignore_ascii_case("bin") => trimmed[3..].trim(),
            _ => trimmed,
        };
        digits
            .parse::<u8>()
            .ok()
            .filter(|n| *n > 0)
            .map(BinId)
            .ok_or_else(|| EngineError::InvalidLabel {
                field: "bin",
                value: label.to_string(),
            })
    }

    pub fn number(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for BinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bin{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductKind {
    /// Moves load into the hours around the implementation window.
    Shift,
    /// Drops load with no compensating increase.
    Shed,
}

impl FromStr for ProductKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shift" => Ok(ProductKind::Shift),
            "shed" => Ok(ProductKind::Shed),
            _ => Err(EngineError::InvalidLabel {
                field: "shift or shed",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub product: String,
    pub bin: BinId,
    pub kind: ProductKind,
}

/// Product-info rows for one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCatalog {
    pub plan: Plan,
    pub products: Vec<ProductInfo>,
}

impl ProductCatalog {
    pub fn new(plan: Plan, products: Vec<ProductInfo>) -> Self {
        Self { plan, products }
    }

    pub fn lookup(&self, product: &str) -> EngineResult<&ProductInfo> {
        self.products
            .iter()
            .find(|info| info.product == product)
            .ok_or_else(|| EngineError::UnknownProduct {
                product: product.to_string(),
                plan: self.plan.to_string(),
            })
    }

    pub fn products_in_bin(&self, bin: BinId) -> impl Iterator<Item = &str> {
        self.products
            .iter()
            .filter(move |info| info.bin == bin)
            .map(|info| info.product.as_str())
    }
}

/// Timestamp of one row of the hourly emission-rate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourStamp {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
}

impl HourStamp {
    pub fn new(year: i32, month: u32, day: u32, hour: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
        }
    }

    pub fn is_leap_day(&self) -> bool {
        self.month == 2 && self.day == 29
    }
}

/// A named column of numbers (potential in MW, emissions in metric tons).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedColumn {
    pub name: String,
    pub values: Vec<f64>,
}

impl NamedColumn {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }
}

/// Marginal emission rates (lb CO2e/kWh) for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRates {
    pub name: String,
    pub values: Vec<f64>,
}

impl ScenarioRates {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// First whitespace-separated word of the column name, used in result keys.
    pub fn token(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(self.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionRateSeries {
    pub timestamps: Vec<HourStamp>,
    pub scenarios: Vec<ScenarioRates>,
}

impl EmissionRateSeries {
    pub fn new(timestamps: Vec<HourStamp>, scenarios: Vec<ScenarioRates>) -> Self {
        Self {
            timestamps,
            scenarios,
        }
    }

    pub fn year_range(&self) -> Option<(i32, i32)> {
        let min = self.timestamps.iter().map(|t| t.year).min()?;
        let max = self.timestamps.iter().map(|t| t.year).max()?;
        Some((min, max))
    }

    /// The scenario whose results feed the summaries.
    pub fn baseline(&self) -> Option<&ScenarioRates> {
        self.scenarios.first()
    }

    /// Result-key prefix of every scenario, `None` for the baseline.
    ///
    /// Prefixes must be unique and must not read as a plan name, otherwise two
    /// scenarios would land on the same result key.
    pub fn scenario_tokens(&self) -> EngineResult<Vec<Option<String>>> {
        let mut tokens: Vec<Option<String>> = Vec::with_capacity(self.scenarios.len());
        for (idx, scenario) in self.scenarios.iter().enumerate() {
            if idx == 0 {
                tokens.push(None);
                continue;
            }
            let token = scenario.token();
            if token.parse::<Plan>().is_ok() {
                return Err(EngineError::Validation {
                    argument: "emission_rates",
                    reason: format!("scenario `{}` is named like a plan", scenario.name),
                });
            }
            if tokens.iter().flatten().any(|t| t == token) {
                return Err(EngineError::Validation {
                    argument: "emission_rates",
                    reason: format!(
                        "scenario `{}` shares the key prefix `{}` with another scenario",
                        scenario.name, token
                    ),
                });
            }
            tokens.push(Some(token.to_string()));
        }
        Ok(tokens)
    }

    /// Split one scenario's rates into per-year hourly profiles with Feb 29 removed,
    /// so every year pairs with an 8760-hour schedule.
    pub fn yearly_profiles(&self, scenario: &ScenarioRates) -> BTreeMap<i32, Vec<f64>> {
        let mut profiles: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
        for (stamp, rate) in self.timestamps.iter().zip(scenario.values.iter()) {
            if stamp.is_leap_day() {
                continue;
            }
            profiles
                .entry(stamp.year)
                .or_insert_with(|| Vec::with_capacity(HOURS_PER_YEAR))
                .push(*rate);
        }
        profiles
    }
}

pub const HOURS_PER_YEAR: usize = 8760;

/// Per-hour implementation indicator of one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorColumn {
    pub name: String,
    pub values: Vec<i8>,
}

impl IndicatorColumn {
    pub fn new(name: impl Into<String>, values: Vec<i8>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Hourly DR schedule of a representative season-year. Always 8760 rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrImplementationSeries {
    pub hour_of_day: Vec<u32>,
    pub products: Vec<IndicatorColumn>,
}

impl DrImplementationSeries {
    pub fn new(hour_of_day: Vec<u32>, products: Vec<IndicatorColumn>) -> Self {
        Self {
            hour_of_day,
            products,
        }
    }

    pub fn len(&self) -> usize {
        self.hour_of_day.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hour_of_day.is_empty()
    }

    pub fn product_names(&self) -> Vec<&str> {
        self.products.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn product(&self, name: &str) -> Option<&[i8]> {
        self.products
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.values.as_slice())
    }
}

/// Forecast yearly capacity (MW) per product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrPotentialSeries {
    pub years: Vec<i32>,
    pub products: Vec<NamedColumn>,
}

impl DrPotentialSeries {
    pub fn new(years: Vec<i32>, products: Vec<NamedColumn>) -> Self {
        Self { years, products }
    }

    pub fn column(&self, product: &str) -> Option<&NamedColumn> {
        self.products.iter().find(|c| c.name == product)
    }

    pub fn value(&self, product: &str, year: i32) -> Option<f64> {
        let row = self.years.iter().position(|y| *y == year)?;
        self.column(product)?.values.get(row).copied()
    }
}

/// Avoided emissions (metric tons CO2e) per forecast year for the products of
/// one scenario/plan/season/bin. Positive is avoided, negative is induced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyAvoidedEmissions {
    pub years: Vec<i32>,
    pub columns: Vec<NamedColumn>,
}

impl YearlyAvoidedEmissions {
    pub fn zeros(first_year: i32, last_year: i32, names: &[String]) -> Self {
        let years: Vec<i32> = (first_year..=last_year).collect();
        let columns = names
            .iter()
            .map(|name| NamedColumn::new(name.clone(), vec![0.0; years.len()]))
            .collect();
        Self { years, columns }
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn value(&self, name: &str, year: i32) -> Option<f64> {
        let row = self.years.iter().position(|y| *y == year)?;
        self.column(name)?.get(row).copied()
    }

    pub(crate) fn set(&mut self, name: &str, row: usize, value: f64) {
        if let Some(column) = self.columns.iter_mut().find(|c| c.name == name) {
            column.values[row] = value;
        }
    }

    /// Sum every product column over all years.
    pub fn column_totals(&self) -> Vec<(&str, f64)> {
        self.columns
            .iter()
            .map(|c| (c.name.as_str(), c.total()))
            .collect()
    }
}

/// Lookup key of one yearly result table.
///
/// Renders as `[<scenario>_]<plan>_<season>_bin<N>`; the scenario prefix is
/// absent for the baseline scenario.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResultKey {
    pub scenario: Option<String>,
    pub plan_season: PlanSeason,
    pub bin: BinId,
}

impl ResultKey {
    pub fn new(scenario: Option<String>, plan_season: PlanSeason, bin: BinId) -> Self {
        Self {
            scenario,
            plan_season,
            bin,
        }
    }

    pub fn is_baseline(&self) -> bool {
        self.scenario.is_none()
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scenario) = &self.scenario {
            write!(f, "{}_", scenario)?;
        }
        write!(f, "{}_{}", self.plan_season, self.bin)
    }
}

impl FromStr for ResultKey {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidLabel {
            field: "result key",
            value: s.to_string(),
        };
        let mut parts = s.rsplitn(4, '_');
        let bin = parts
            .next()
            .and_then(|b| b.strip_prefix("bin"))
            .ok_or_else(invalid)?;
        let bin = BinId::from_label(bin)?;
        let season: Season = parts.next().ok_or_else(invalid)?.parse()?;
        let plan: Plan = parts.next().ok_or_else(invalid)?.parse()?;
        let scenario = parts.next().map(str::to_string);
        Ok(Self::new(scenario, PlanSeason::new(plan, season), bin))
    }
}

/// Season-by-column summary table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BarchartSummary {
    pub seasons: Vec<Season>,
    pub columns: Vec<NamedColumn>,
}

impl BarchartSummary {
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn value(&self, season: Season, column: &str) -> Option<f64> {
        let row = self.seasons.iter().position(|s| *s == season)?;
        self.column(column)?.get(row).copied()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Engine parameters that used to be module-wide constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// lb CO2e/kWh times MW to metric tons CO2e per hour.
    pub emissions_unit_factor: f64,
    pub bin_count: u8,
    /// Plan whose dual product is evaluated as both shift and shed.
    pub dual_plan: Plan,
    pub dual_product: String,
    /// Product summed with each dual variant in the summaries.
    pub companion_product: String,
    pub dual_bin: u8,
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            emissions_unit_factor: 0.4536,
            bin_count: 4,
            dual_plan: Plan::NewBins,
            dual_product: "ResTOU".to_string(),
            companion_product: "DVR".to_string(),
            dual_bin: 1,
            parallel: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.bin_count == 0 {
            return Err(EngineError::Validation {
                argument: "bin_count",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.dual_bin == 0 || self.dual_bin > self.bin_count {
            return Err(EngineError::Validation {
                argument: "dual_bin",
                reason: format!("{} is outside bins 1..={}", self.dual_bin, self.bin_count),
            });
        }
        if !self.emissions_unit_factor.is_finite() {
            return Err(EngineError::Validation {
                argument: "emissions_unit_factor",
                reason: format!("{} is not a finite number", self.emissions_unit_factor),
            });
        }
        Ok(())
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn dual_shift_name(&self) -> String {
        format!("{}_shift", self.dual_product)
    }

    pub fn dual_shed_name(&self) -> String {
        format!("{}_shed", self.dual_product)
    }

    pub fn bins(&self) -> impl Iterator<Item = BinId> {
        (1..=self.bin_count).map(BinId)
    }
}

/// Everything the upstream loader hands to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInputs {
    pub emission_rates: EmissionRateSeries,
    pub dr_hours: BTreeMap<PlanSeason, DrImplementationSeries>,
    pub dr_potential: BTreeMap<PlanSeason, DrPotentialSeries>,
    pub product_info: BTreeMap<Plan, ProductCatalog>,
    pub plans: Vec<Plan>,
    pub plan_seasons: BTreeMap<Plan, Vec<Season>>,
}

impl EngineInputs {
    pub fn plan_season_keys(&self) -> Vec<PlanSeason> {
        self.plans
            .iter()
            .flat_map(|plan| {
                self.plan_seasons
                    .get(plan)
                    .into_iter()
                    .flatten()
                    .map(move |season| PlanSeason::new(*plan, *season))
            })
            .collect()
    }
}

/// The three outputs handed to the downstream writer.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactOutputs {
    pub yearly: BTreeMap<ResultKey, YearlyAvoidedEmissions>,
    pub season_summary: BarchartSummary,
    pub bin1_detail: BarchartSummary,
}

impl ImpactOutputs {
    pub fn scenarios(&self) -> BTreeSet<Option<&str>> {
        self.yearly.keys().map(|k| k.scenario.as_deref()).collect()
    }
}
