use crate::error::{EngineError, EngineResult};
use crate::models::{BinId, DrPotentialSeries, Plan, PlanSeason, ProductCatalog};
use log::warn;
use std::collections::BTreeMap;

/// Potential of the products of one bin, for one plan and season.
#[derive(Debug, Clone, PartialEq)]
pub struct BinPotential {
    pub plan_season: PlanSeason,
    pub bin: BinId,
    pub table: DrPotentialSeries,
}

impl BinPotential {
    pub fn label(&self) -> String {
        format!("{}_{}", self.plan_season, self.bin)
    }

    pub fn total_in_year(&self, year: i32) -> Option<f64> {
        let row = self.table.years.iter().position(|y| *y == year)?;
        Some(self.table.products.iter().filter_map(|c| c.values.get(row)).sum())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PotentialComparison {
    pub label: String,
    pub year: i32,
    pub total_mw: f64,
}

/// Split each potential table into one table per non-empty bin.
pub fn bin_potential_tables(
    potential: &BTreeMap<PlanSeason, DrPotentialSeries>,
    catalogs: &BTreeMap<Plan, ProductCatalog>,
    bin_count: u8,
) -> EngineResult<Vec<BinPotential>> {
    let mut out = Vec::new();

    for (plan_season, table) in potential {
        let catalog = catalogs
            .get(&plan_season.plan)
            .ok_or_else(|| EngineError::Validation {
                argument: "product_info",
                reason: format!("no product info for plan {}", plan_season.plan),
            })?;

        for bin in (1..=bin_count).map(BinId) {
            let members: Vec<&str> = catalog.products_in_bin(bin).collect();
            let products: Vec<_> = table
                .products
                .iter()
                .filter(|c| members.contains(&c.name.as_str()))
                .cloned()
                .collect();
            if products.is_empty() {
                continue;
            }
            out.push(BinPotential {
                plan_season: *plan_season,
                bin,
                table: DrPotentialSeries::new(table.years.clone(), products),
            });
        }
    }

    Ok(out)
}

/// Total potential of every bin in `year`, or in each table's final year.
pub fn potential_comparison(tables: &[BinPotential], year: Option<i32>) -> Vec<PotentialComparison> {
    tables
        .iter()
        .filter_map(|bin| {
            let year = year.or_else(|| bin.table.years.last().copied())?;
            match bin.total_in_year(year) {
                Some(total_mw) => Some(PotentialComparison {
                    label: bin.label(),
                    year,
                    total_mw,
                }),
                None => {
                    warn!("{} has no potential for {}", bin.label(), year);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NamedColumn, ProductInfo, ProductKind, Season};

    #[test]
    fn test_bins_split_and_compared() {
        let ps = PlanSeason::new(Plan::OldBins, Season::Summer);
        let potential = DrPotentialSeries::new(
            vec![2040, 2041],
            vec![
                NamedColumn::new("DVR", vec![1.0, 2.0]),
                NamedColumn::new("ComCurtail", vec![10.0, 11.0]),
                NamedColumn::new("ResTOU", vec![3.0, 4.0]),
            ],
        );
        let info = |product: &str, bin: u8| ProductInfo {
            product: product.to_string(),
            bin: BinId(bin),
            kind: ProductKind::Shed,
        };
        let catalog = ProductCatalog::new(
            Plan::OldBins,
            vec![info("ResTOU", 1), info("DVR", 1), info("ComCurtail", 3), info("Unused", 4)],
        );

        let tables = bin_potential_tables(
            &BTreeMap::from([(ps, potential)]),
            &BTreeMap::from([(Plan::OldBins, catalog)]),
            4,
        )
        .unwrap();

        let labels: Vec<String> = tables.iter().map(BinPotential::label).collect();
        assert_eq!(labels, vec!["oldbins_Summer_bin1", "oldbins_Summer_bin3"]);
        // column order follows the potential table
        assert_eq!(tables[0].table.products[0].name, "DVR");

        let comparison = potential_comparison(&tables, None);
        assert_eq!(comparison[0].year, 2041);
        assert_eq!(comparison[0].total_mw, 6.0);
        assert_eq!(comparison[1].total_mw, 11.0);

        assert!(potential_comparison(&tables, Some(2050)).is_empty());
    }
}
