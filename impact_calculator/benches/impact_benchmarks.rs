use criterion::{black_box, criterion_group, criterion_main, Criterion};
use impact_calculator::models::{
    HourStamp, IndicatorColumn, NamedColumn, ProductInfo, ProductKind, ScenarioRates,
};
use impact_calculator::{
    run_emissions_impacts, shift_hours, BinId, DrImplementationSeries, DrPotentialSeries,
    EmissionRateSeries, EngineConfig, EngineInputs, Plan, PlanSeason, ProductCatalog, Season,
};
use std::collections::BTreeMap;

const YEARS: std::ops::RangeInclusive<i32> = 2022..=2041;

fn evening_peaks() -> Vec<i8> {
    (0..8760).map(|h| i8::from((17..21).contains(&(h % 24)))).collect()
}

/// 20 years of synthetic rates with a daily shape; no leap days so every year is 8760 hours.
fn synthetic_inputs() -> EngineInputs {
    let mut stamps = Vec::new();
    for year in YEARS {
        for h in 0..8760u32 {
            stamps.push(HourStamp::new(year, 1 + h / 744, 1 + (h / 24) % 28, h % 24 + 1));
        }
    }
    let baseline: Vec<f64> = (0..stamps.len())
        .map(|h| 0.8 + 0.4 * ((h % 24) as f64 / 24.0))
        .collect();
    let scc: Vec<f64> = baseline.iter().map(|r| r * 1.1).collect();

    let products = [
        ("DVR", 1, ProductKind::Shed),
        ("ResTOU", 1, ProductKind::Shift),
        ("ComCurtail", 2, ProductKind::Shed),
        ("ResDLC", 3, ProductKind::Shift),
    ];
    let years: Vec<i32> = YEARS.collect();
    let mut dr_hours = BTreeMap::new();
    let mut dr_potential = BTreeMap::new();
    let seasons = vec![Season::Winter, Season::Summer, Season::Fall];
    for season in &seasons {
        let ps = PlanSeason::new(Plan::NewBins, *season);
        dr_hours.insert(
            ps,
            DrImplementationSeries::new(
                (0..8760u32).map(|h| h % 24 + 1).collect(),
                products
                    .iter()
                    .map(|(name, ..)| IndicatorColumn::new(*name, evening_peaks()))
                    .collect(),
            ),
        );
        dr_potential.insert(
            ps,
            DrPotentialSeries::new(
                years.clone(),
                products
                    .iter()
                    .map(|(name, ..)| NamedColumn::new(*name, vec![25.0; years.len()]))
                    .collect(),
            ),
        );
    }
    let catalog = ProductCatalog::new(
        Plan::NewBins,
        products
            .iter()
            .map(|(name, bin, kind)| ProductInfo {
                product: name.to_string(),
                bin: BinId(*bin),
                kind: *kind,
            })
            .collect(),
    );

    EngineInputs {
        emission_rates: EmissionRateSeries::new(
            stamps,
            vec![
                ScenarioRates::new("Baseline Emissions Rate Estimate", baseline),
                ScenarioRates::new("SCC Emissions Rate Estimate", scc),
            ],
        ),
        dr_hours,
        dr_potential,
        product_info: BTreeMap::from([(Plan::NewBins, catalog)]),
        plans: vec![Plan::NewBins],
        plan_seasons: BTreeMap::from([(Plan::NewBins, seasons)]),
    }
}

fn benchmark_shift_transform(c: &mut Criterion) {
    let hours = evening_peaks();
    c.bench_function("shift_hours_8760", |b| {
        b.iter(|| black_box(shift_hours(black_box(&hours))));
    });
}

fn benchmark_pipeline(c: &mut Criterion) {
    let inputs = synthetic_inputs();

    c.bench_function("pipeline_parallel_20y", |b| {
        let config = EngineConfig::default();
        b.iter(|| black_box(run_emissions_impacts(&inputs, &config)));
    });

    c.bench_function("pipeline_sequential_20y", |b| {
        let config = EngineConfig::default().sequential();
        b.iter(|| black_box(run_emissions_impacts(&inputs, &config)));
    });
}

criterion_group!(benches, benchmark_shift_transform, benchmark_pipeline);
criterion_main!(benches);
