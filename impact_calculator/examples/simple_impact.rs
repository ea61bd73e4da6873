use impact_calculator::models::{
    HourStamp, IndicatorColumn, NamedColumn, ProductInfo, ProductKind, ScenarioRates,
};
use impact_calculator::{
    run_emissions_impacts, BinId, DrImplementationSeries, DrPotentialSeries, EmissionRateSeries,
    EngineConfig, EngineInputs, Plan, PlanSeason, ProductCatalog, Season,
};
use std::collections::BTreeMap;

fn main() {
    // One year of marginal emission rates (lb CO2e/kWh):
    // Night hours (clean): 0.6
    // Day hours: 0.9
    // Evening peak (dirty): 1.4
    let mut stamps = Vec::new();
    let mut rates = Vec::new();
    for h in 0..8760u32 {
        let hour = h % 24 + 1;
        stamps.push(HourStamp::new(2030, 1 + h / 744, 1 + (h / 24) % 28, hour));
        rates.push(match hour {
            1..=6 | 23..=24 => 0.6,
            18..=21 => 1.4,
            _ => 0.9,
        });
    }

    // Every day: DR implemented 18-21
    let schedule: Vec<i8> = (0..8760u32)
        .map(|h| i8::from((18..=21).contains(&(h % 24 + 1))))
        .collect();

    let ps = PlanSeason::new(Plan::NewBins, Season::Summer);
    let inputs = EngineInputs {
        emission_rates: EmissionRateSeries::new(
            stamps,
            vec![ScenarioRates::new("Baseline Emissions Rate Estimate", rates)],
        ),
        dr_hours: BTreeMap::from([(
            ps,
            DrImplementationSeries::new(
                (0..8760u32).map(|h| h % 24 + 1).collect(),
                vec![
                    IndicatorColumn::new("DVR", schedule.clone()),
                    IndicatorColumn::new("ResTOU", schedule),
                ],
            ),
        )]),
        dr_potential: BTreeMap::from([(
            ps,
            DrPotentialSeries::new(
                vec![2030],
                vec![
                    NamedColumn::new("DVR", vec![40.0]),
                    NamedColumn::new("ResTOU", vec![120.0]),
                ],
            ),
        )]),
        product_info: BTreeMap::from([(
            Plan::NewBins,
            ProductCatalog::new(
                Plan::NewBins,
                vec![
                    ProductInfo {
                        product: "DVR".to_string(),
                        bin: BinId(1),
                        kind: ProductKind::Shed,
                    },
                    ProductInfo {
                        product: "ResTOU".to_string(),
                        bin: BinId(1),
                        kind: ProductKind::Shift,
                    },
                ],
            ),
        )]),
        plans: vec![Plan::NewBins],
        plan_seasons: BTreeMap::from([(Plan::NewBins, vec![Season::Summer])]),
    };

    let outputs = match run_emissions_impacts(&inputs, &EngineConfig::default()) {
        Ok(outputs) => outputs,
        Err(e) => {
            eprintln!("Calculation failed: {}", e);
            return;
        }
    };

    println!("DR Emissions Impacts");
    println!("====================");
    for (key, table) in &outputs.yearly {
        println!("{}:", key);
        for (product, total) in table.column_totals() {
            println!("  {}: {:.1} t CO2e", product, total);
        }
    }
    println!();
    println!("Season summary:");
    for column in &outputs.season_summary.columns {
        for (season, value) in outputs.season_summary.seasons.iter().zip(&column.values) {
            println!("  {} {}: {:.1} t CO2e", column.name, season, value);
        }
    }
}
