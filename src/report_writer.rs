use anyhow::{Context, Result};
use impact_calculator::models::NamedColumn;
use impact_calculator::{
    BarchartSummary, BinPotential, DrHoursSummary, DrPotentialSeries, ImpactOutputs,
    PeriodWindow, PotentialComparison, YearlyAvoidedEmissions,
};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use polars::prelude::*;
use rayon::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub const IMPACTS_DIR: &str = "emissions_impacts";
pub const SEASON_BARCHART_FILE: &str = "emissions_impacts/emissions_reductions_barchart.csv";
pub const DETAIL_BARCHART_FILE: &str = "emissions_impacts/newbins_barchart.csv";
pub const DR_HOURS_FILE: &str = "dr_hours/output_dr_hours.csv";
pub const DR_POTENTIAL_DIR: &str = "dr_potential";
pub const COMPARISON_FILE: &str = "dr_potential/comparison_barchart.csv";

/// Writes processed tables as CSV under one output directory.
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        for sub in [IMPACTS_DIR, "dr_hours", DR_POTENTIAL_DIR] {
            fs::create_dir_all(output_dir.join(sub))
                .with_context(|| format!("Failed to create {}", output_dir.join(sub).display()))?;
        }
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// One file per yearly table plus the two barchart summaries.
    pub fn write_impacts(&self, outputs: &ImpactOutputs) -> Result<()> {
        let pb = ProgressBar::new(outputs.yearly.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")?,
        );

        let tables: Vec<_> = outputs.yearly.iter().collect();
        tables.par_iter().try_for_each(|(key, table)| -> Result<()> {
            let path = self.output_dir.join(IMPACTS_DIR).join(format!("{}.csv", key));
            write_csv(&mut yearly_frame(table)?, &path)?;
            pb.inc(1);
            Ok(())
        })?;
        pb.finish();

        write_csv(
            &mut barchart_frame(&outputs.season_summary)?,
            &self.output_dir.join(SEASON_BARCHART_FILE),
        )?;
        write_csv(
            &mut barchart_frame(&outputs.bin1_detail)?,
            &self.output_dir.join(DETAIL_BARCHART_FILE),
        )?;

        info!("Wrote {} yearly impact tables", tables.len());
        Ok(())
    }

    pub fn write_dr_hours(&self, summaries: &[DrHoursSummary]) -> Result<()> {
        let join = |windows: &[PeriodWindow]| {
            windows.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
        };
        let labels: Vec<String> = summaries.iter().map(|s| s.plan_season.to_string()).collect();
        let non_dlc: Vec<String> = summaries.iter().map(|s| join(&s.non_dlc)).collect();
        let dlc: Vec<String> = summaries.iter().map(|s| join(&s.dlc)).collect();

        let mut df = DataFrame::new(vec![
            Series::new("plan_season".into(), labels),
            Series::new("non_dlc_periods".into(), non_dlc),
            Series::new("dlc_periods".into(), dlc),
        ])?;
        write_csv(&mut df, &self.output_dir.join(DR_HOURS_FILE))
    }

    pub fn write_dr_potential(
        &self,
        bins: &[BinPotential],
        comparison: &[PotentialComparison],
    ) -> Result<()> {
        for bin in bins {
            let path = self
                .output_dir
                .join(DR_POTENTIAL_DIR)
                .join(format!("{}.csv", bin.label()));
            write_csv(&mut potential_frame(&bin.table)?, &path)?;
        }

        let mut df = DataFrame::new(vec![
            Series::new(
                "Bin".into(),
                comparison.iter().map(|c| c.label.clone()).collect::<Vec<_>>(),
            ),
            Series::new(
                "Year".into(),
                comparison.iter().map(|c| c.year).collect::<Vec<_>>(),
            ),
            Series::new(
                "Potential (MW)".into(),
                comparison.iter().map(|c| c.total_mw).collect::<Vec<_>>(),
            ),
        ])?;
        write_csv(&mut df, &self.output_dir.join(COMPARISON_FILE))
    }
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    CsvWriter::new(file)
        .include_header(true)
        .finish(df)
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn with_columns(mut series: Vec<Series>, columns: &[NamedColumn]) -> Result<DataFrame> {
    series.extend(
        columns
            .iter()
            .map(|c| Series::new(c.name.as_str().into(), c.values.clone())),
    );
    Ok(DataFrame::new(series)?)
}

fn yearly_frame(table: &YearlyAvoidedEmissions) -> Result<DataFrame> {
    with_columns(vec![Series::new("Year".into(), table.years.clone())], &table.columns)
}

fn potential_frame(table: &DrPotentialSeries) -> Result<DataFrame> {
    with_columns(vec![Series::new("Year".into(), table.years.clone())], &table.products)
}

fn barchart_frame(summary: &BarchartSummary) -> Result<DataFrame> {
    let seasons: Vec<&str> = summary.seasons.iter().map(|s| s.as_str()).collect();
    with_columns(vec![Series::new("Season".into(), seasons)], &summary.columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use impact_calculator::{BinId, Plan, PlanSeason, ResultKey, Season};
    use std::collections::BTreeMap;

    fn outputs() -> ImpactOutputs {
        let ps = PlanSeason::new(Plan::NewBins, Season::Summer);
        let mut table = YearlyAvoidedEmissions::zeros(2030, 2031, &["DVR".to_string()]);
        table.columns[0].values = vec![1.5, 2.5];
        ImpactOutputs {
            yearly: BTreeMap::from([
                (ResultKey::new(None, ps, BinId(1)), table.clone()),
                (ResultKey::new(Some("SCC".to_string()), ps, BinId(1)), table),
            ]),
            season_summary: BarchartSummary {
                seasons: vec![Season::Summer],
                columns: vec![NamedColumn::new("oldbins_bin1", vec![4.0])],
            },
            bin1_detail: BarchartSummary::default(),
        }
    }

    #[test]
    fn test_impact_files_written() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path()).unwrap();
        writer.write_impacts(&outputs()).unwrap();

        let baseline = fs::read_to_string(dir.path().join("emissions_impacts/newbins_Summer_bin1.csv")).unwrap();
        assert_eq!(baseline.lines().next(), Some("Year,DVR"));
        let row: Vec<f64> = baseline.lines().nth(2).unwrap().split(',').map(|v| v.parse().unwrap()).collect();
        assert_eq!(row, vec![2031.0, 2.5]);
        assert!(dir.path().join("emissions_impacts/SCC_newbins_Summer_bin1.csv").exists());

        let barchart = fs::read_to_string(dir.path().join(SEASON_BARCHART_FILE)).unwrap();
        let (season, value) = barchart.lines().nth(1).unwrap().split_once(',').unwrap();
        assert_eq!(season, "Summer");
        assert_eq!(value.parse::<f64>().unwrap(), 4.0);
    }

    #[test]
    fn test_dr_hours_joined() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path()).unwrap();
        let summary = DrHoursSummary {
            plan_season: PlanSeason::new(Plan::OldBins, Season::Winter),
            non_dlc: vec![PeriodWindow { start_hour: 18, end_hour: 21 }],
            dlc: vec![
                PeriodWindow { start_hour: 6, end_hour: 9 },
                PeriodWindow { start_hour: 17, end_hour: 20 },
            ],
        };
        writer.write_dr_hours(&[summary]).unwrap();

        let text = fs::read_to_string(dir.path().join(DR_HOURS_FILE)).unwrap();
        assert_eq!(text.lines().nth(1), Some("oldbins_Winter,18 - 21,6 - 9; 17 - 20"));
    }
}
