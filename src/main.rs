use anyhow::Result;
use clap::{Parser, ValueEnum};
use impact_calculator::{
    bin_potential_tables, potential_comparison, run_emissions_impacts, summarize_dr_hours,
    BarchartSummary, Plan, YearlyAvoidedEmissions,
};
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

mod config;
mod data_loader;
mod report_writer;

use config::RunConfig;
use data_loader::InputLoader;
use report_writer::ReportWriter;

#[derive(Parser)]
#[command(name = "dr_impacts_processor")]
#[command(about = "Calculate avoided CO2e emissions of demand response programs")]
struct Args {
    /// Directory holding emission_rates.csv, dr_hours/, dr_potential/ and product_info/
    #[arg(short, long, default_value = "input_data")]
    input_dir: PathBuf,

    /// Directory for processed CSV files
    #[arg(short = 'd', long, default_value = "processed_data")]
    output_dir: PathBuf,

    /// JSON run configuration; unset fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Restrict the run to these plans (comma separated)
    #[arg(long, value_delimiter = ',')]
    plans: Vec<Plan>,

    /// Year for the bin potential comparison
    #[arg(long)]
    comparison_year: Option<i32>,

    /// Evaluate jobs on one thread
    #[arg(long)]
    sequential: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "csv")]
    output: OutputFormat,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
    Summary,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    yearly: BTreeMap<String, &'a YearlyAvoidedEmissions>,
    season_summary: &'a BarchartSummary,
    bin1_detail: &'a BarchartSummary,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!(
        "Starting DR emissions impacts on {} CPU cores ({} rayon threads)",
        num_cpus::get(),
        rayon::current_num_threads()
    );

    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if !args.plans.is_empty() {
        config.restrict_plans(&args.plans);
    }
    if args.comparison_year.is_some() {
        config.comparison_year = args.comparison_year;
    }
    if args.sequential {
        config.engine.parallel = false;
    }
    if config.plan_seasons.is_empty() {
        anyhow::bail!("No plans left to process");
    }

    let inputs = InputLoader::new(&args.input_dir, &config)?.load()?;
    let start = std::time::Instant::now();
    let outputs = run_emissions_impacts(&inputs, &config.engine)?;
    info!(
        "Calculated {} yearly tables in {:?}",
        outputs.yearly.len(),
        start.elapsed()
    );

    let dr_hours = summarize_dr_hours(&inputs.dr_hours, &config.periods);
    let bins = bin_potential_tables(
        &inputs.dr_potential,
        &inputs.product_info,
        config.engine.bin_count,
    )?;
    let comparison = potential_comparison(&bins, config.comparison_year);

    match args.output {
        OutputFormat::Csv => {
            let writer = ReportWriter::new(&args.output_dir)?;
            writer.write_impacts(&outputs)?;
            writer.write_dr_hours(&dr_hours)?;
            writer.write_dr_potential(&bins, &comparison)?;
            println!("✅ Results written to {}", writer.output_dir().display());
        }
        OutputFormat::Json => {
            let report = JsonReport {
                yearly: outputs
                    .yearly
                    .iter()
                    .map(|(key, table)| (key.to_string(), table))
                    .collect(),
                season_summary: &outputs.season_summary,
                bin1_detail: &outputs.bin1_detail,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Summary => {
            println!("DR Emissions Impacts Summary");
            println!("============================");
            println!(
                "Scenarios: {}  Tables: {}",
                inputs.emission_rates.scenarios.len(),
                outputs.yearly.len()
            );
            println!();
            println!("Avoided emissions by season (t CO2e, baseline):");
            for column in &outputs.season_summary.columns {
                let cells: Vec<String> = outputs
                    .season_summary
                    .seasons
                    .iter()
                    .zip(&column.values)
                    .map(|(season, value)| format!("{} {:.1}", season, value))
                    .collect();
                println!("  {:<20} {}", column.name, cells.join(", "));
            }
            println!();
            println!("Bin potential:");
            for row in &comparison {
                println!("  {:<24} {} {:>10.1} MW", row.label, row.year, row.total_mw);
            }
        }
    }

    Ok(())
}
