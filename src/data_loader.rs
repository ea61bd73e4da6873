use crate::config::RunConfig;
use anyhow::{bail, Context, Result};
use glob::glob;
use impact_calculator::models::{
    HourStamp, IndicatorColumn, NamedColumn, ProductInfo, ScenarioRates,
};
use impact_calculator::{
    BinId, DrImplementationSeries, DrPotentialSeries, EmissionRateSeries, EngineInputs, Plan,
    PlanSeason, ProductCatalog,
};
use log::{debug, info, warn};
use polars::prelude::*;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

pub const EMISSION_RATES_FILE: &str = "emission_rates.csv";
pub const DR_HOURS_DIR: &str = "dr_hours";
pub const DR_POTENTIAL_DIR: &str = "dr_potential";
pub const PRODUCT_INFO_DIR: &str = "product_info";

const TIMESTAMP_COLUMNS: [&str; 4] = ["Report_Year", "Report_Month", "Report_Day", "Report_Hour"];
const HOURS_KEY_COLUMNS: [&str; 3] = ["Month", "Day", "hourID"];
const POTENTIAL_YEAR_COLUMN: &str = "Year";

#[derive(Debug, Deserialize)]
struct ProductInfoRecord {
    #[serde(rename = "Product")]
    product: String,
    #[serde(rename = "Bin")]
    bin: String,
    #[serde(rename = "Shift or Shed?")]
    kind: String,
}

/// Reads the input directory into the tables the engine works on.
pub struct InputLoader<'a> {
    input_dir: PathBuf,
    config: &'a RunConfig,
    stem_pattern: Regex,
}

impl<'a> InputLoader<'a> {
    pub fn new(input_dir: impl Into<PathBuf>, config: &'a RunConfig) -> Result<Self> {
        Ok(Self {
            input_dir: input_dir.into(),
            config,
            stem_pattern: Regex::new(r"(?i)^(oldbins|newbins)_(winter|spring|summer|fall)$")?,
        })
    }

    pub fn load(&self) -> Result<EngineInputs> {
        info!("Loading inputs from {}", self.input_dir.display());

        let emission_rates = self.load_emission_rates()?;
        let plans = self.config.plans();

        let mut product_info = BTreeMap::new();
        for plan in &plans {
            product_info.insert(*plan, self.load_product_info(*plan)?);
        }

        let hours_files = self.discover(DR_HOURS_DIR)?;
        let potential_files = self.discover(DR_POTENTIAL_DIR)?;

        let mut dr_hours = BTreeMap::new();
        let mut dr_potential = BTreeMap::new();
        for (plan, seasons) in &self.config.plan_seasons {
            for season in seasons {
                let ps = PlanSeason::new(*plan, *season);
                let hours_path = hours_files
                    .get(&ps)
                    .with_context(|| format!("No DR hours file for {}", ps))?;
                let potential_path = potential_files
                    .get(&ps)
                    .with_context(|| format!("No DR potential file for {}", ps))?;
                dr_hours.insert(ps, self.load_dr_hours(ps, hours_path)?);
                dr_potential.insert(ps, self.load_dr_potential(ps, potential_path)?);
            }
        }

        info!(
            "Loaded {} hourly rates across {} scenarios, {} plan-seasons",
            emission_rates.timestamps.len(),
            emission_rates.scenarios.len(),
            dr_hours.len()
        );

        Ok(EngineInputs {
            emission_rates,
            dr_hours,
            dr_potential,
            product_info,
            plans,
            plan_seasons: self.config.plan_seasons.clone(),
        })
    }

    /// Map every `<plan>_<Season>.csv` file in `subdir` to its plan-season.
    fn discover(&self, subdir: &str) -> Result<BTreeMap<PlanSeason, PathBuf>> {
        let pattern = self.input_dir.join(subdir).join("*.csv");
        let pattern = pattern
            .to_str()
            .with_context(|| format!("Non UTF-8 input path: {:?}", pattern))?;

        let mut found = BTreeMap::new();
        for path in glob(pattern)?.filter_map(Result::ok) {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(caps) = self.stem_pattern.captures(stem) else {
                warn!("Skipping {}: not named <plan>_<Season>.csv", path.display());
                continue;
            };
            let ps = PlanSeason::new(caps[1].parse()?, caps[2].parse()?);
            if found.insert(ps, path.clone()).is_some() {
                bail!("Two {} files for {}", subdir, ps);
            }
        }
        debug!("Found {} files in {}", found.len(), subdir);
        Ok(found)
    }

    fn load_emission_rates(&self) -> Result<EmissionRateSeries> {
        let path = self.input_dir.join(EMISSION_RATES_FILE);
        let df = read_frame(&path)?;

        let years = int_column(&df, TIMESTAMP_COLUMNS[0], &path)?;
        let months = int_column(&df, TIMESTAMP_COLUMNS[1], &path)?;
        let days = int_column(&df, TIMESTAMP_COLUMNS[2], &path)?;
        let hours = int_column(&df, TIMESTAMP_COLUMNS[3], &path)?;
        let timestamps = (0..df.height())
            .map(|i| HourStamp::new(years[i] as i32, months[i] as u32, days[i] as u32, hours[i] as u32))
            .collect();

        let mut scenarios = Vec::new();
        for name in other_columns(&df, &TIMESTAMP_COLUMNS) {
            let values = float_column(&df, &name, &path)?;
            scenarios.push(ScenarioRates::new(name, values));
        }
        if scenarios.is_empty() {
            bail!("{} has no emission rate scenario columns", path.display());
        }

        Ok(EmissionRateSeries::new(timestamps, scenarios))
    }

    fn load_product_info(&self, plan: Plan) -> Result<ProductCatalog> {
        let path = self.input_dir.join(PRODUCT_INFO_DIR).join(format!("{}.csv", plan));
        let mut reader = csv::Reader::from_path(&path)
            .with_context(|| format!("Failed to open product info: {}", path.display()))?;

        let mut products = Vec::new();
        let mut seen = HashSet::new();
        for record in reader.deserialize() {
            let record: ProductInfoRecord =
                record.with_context(|| format!("Bad product info row in {}", path.display()))?;
            if !self.config.keeps_product(plan, &record.product) {
                continue;
            }
            if !seen.insert(record.product.clone()) {
                bail!("Product {} listed twice in {}", record.product, path.display());
            }
            products.push(ProductInfo {
                bin: BinId::from_label(&record.bin)?,
                kind: record.kind.parse()?,
                product: record.product,
            });
        }

        Ok(ProductCatalog::new(plan, products))
    }

    fn load_dr_hours(&self, ps: PlanSeason, path: &Path) -> Result<DrImplementationSeries> {
        let df = read_frame(path)?;
        let hour_of_day = int_column(&df, HOURS_KEY_COLUMNS[2], path)?
            .into_iter()
            .map(|h| h as u32)
            .collect();

        let mut products = Vec::new();
        for name in other_columns(&df, &HOURS_KEY_COLUMNS) {
            if !self.config.keeps_product(ps.plan, &name) {
                continue;
            }
            let values = int_column(&df, &name, path)?;
            if let Some(bad) = values.iter().find(|v| !matches!(v, 0 | 1)) {
                bail!("{}: column {} holds {}, expected 0 or 1", path.display(), name, bad);
            }
            products.push(IndicatorColumn::new(name, values.into_iter().map(|v| v as i8).collect()));
        }

        Ok(DrImplementationSeries::new(hour_of_day, products))
    }

    fn load_dr_potential(&self, ps: PlanSeason, path: &Path) -> Result<DrPotentialSeries> {
        let df = read_frame(path)?;
        let years = int_column(&df, POTENTIAL_YEAR_COLUMN, path)?
            .into_iter()
            .map(|y| y as i32)
            .collect();

        let mut products = Vec::new();
        for name in other_columns(&df, &[POTENTIAL_YEAR_COLUMN]) {
            if !self.config.keeps_product(ps.plan, &name) {
                continue;
            }
            let values = float_column(&df, &name, path)?;
            products.push(NamedColumn::new(name, values));
        }

        Ok(DrPotentialSeries::new(years, products))
    }
}

fn read_frame(path: &Path) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("Failed to open {}", path.display()))?
        .finish()
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Column names in file order, excluding `skip`.
fn other_columns(df: &DataFrame, skip: &[&str]) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .filter(|name| !skip.contains(&name.as_str()))
        .collect()
}

fn float_column(df: &DataFrame, name: &str, path: &Path) -> Result<Vec<f64>> {
    let series = df
        .column(name)
        .with_context(|| format!("{} has no column {}", path.display(), name))?
        .cast(&DataType::Float64)?;
    let values = series.f64()?;
    if values.null_count() > 0 {
        bail!("{}: column {} has {} missing values", path.display(), name, values.null_count());
    }
    Ok(values.into_no_null_iter().collect())
}

fn int_column(df: &DataFrame, name: &str, path: &Path) -> Result<Vec<i64>> {
    let series = df
        .column(name)
        .with_context(|| format!("{} has no column {}", path.display(), name))?
        .cast(&DataType::Int64)?;
    let values = series.i64()?;
    if values.null_count() > 0 {
        bail!("{}: column {} has {} missing values", path.display(), name, values.null_count());
    }
    Ok(values.into_no_null_iter().collect())
}
