use crate::models::{DrImplementationSeries, PlanSeason};
use crate::shift::implementation_runs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A daily implementation window, by hour-of-day (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl fmt::Display for PeriodWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start_hour, self.end_hour)
    }
}

/// Reference products whose windows stand in for all products of their type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodConfig {
    pub non_dlc_product: String,
    /// Direct-load-control products run longer windows.
    pub dlc_product: String,
}

impl Default for PeriodConfig {
    fn default() -> Self {
        Self {
            non_dlc_product: "DVR".to_string(),
            dlc_product: "ResHPWHDLCGrd".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrHoursSummary {
    pub plan_season: PlanSeason,
    pub non_dlc: Vec<PeriodWindow>,
    pub dlc: Vec<PeriodWindow>,
}

/// Distinct implementation windows of one product, in first-seen order.
///
/// A window opens on a 0 to 1 transition, so a run already active on the
/// first row is not listed. Windows are deduplicated by start hour.
pub fn list_periods(hours: &DrImplementationSeries, product: &str) -> Vec<PeriodWindow> {
    let Some(indicator) = hours.product(product) else {
        return Vec::new();
    };

    let mut windows: Vec<PeriodWindow> = Vec::new();
    for run in implementation_runs(indicator).into_iter().filter(|r| r.start > 0) {
        let Some(start_hour) = hours.hour_of_day.get(run.start).copied() else {
            continue;
        };
        if windows.iter().any(|w| w.start_hour == start_hour) {
            continue;
        }
        windows.push(PeriodWindow {
            start_hour,
            end_hour: start_hour + run.len as u32 - 1,
        });
    }
    windows
}

pub fn summarize_dr_hours(
    dr_hours: &BTreeMap<PlanSeason, DrImplementationSeries>,
    config: &PeriodConfig,
) -> Vec<DrHoursSummary> {
    dr_hours
        .iter()
        .map(|(plan_season, hours)| DrHoursSummary {
            plan_season: *plan_season,
            non_dlc: list_periods(hours, &config.non_dlc_product),
            dlc: list_periods(hours, &config.dlc_product),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IndicatorColumn, Plan, Season};

    fn three_days(windows: &[(u32, u32)]) -> Vec<i8> {
        (0..72u32)
            .map(|h| {
                let hour = h % 24 + 1;
                i8::from(windows.iter().any(|(s, e)| hour >= *s && hour <= *e))
            })
            .collect()
    }

    #[test]
    fn test_periods_listed_once_per_start_hour() {
        let hours = DrImplementationSeries::new(
            (0..72u32).map(|h| h % 24 + 1).collect(),
            vec![
                IndicatorColumn::new("DVR", three_days(&[(18, 21)])),
                IndicatorColumn::new("ResHPWHDLCGrd", three_days(&[(6, 11), (17, 22)])),
            ],
        );
        assert_eq!(
            list_periods(&hours, "DVR"),
            vec![PeriodWindow { start_hour: 18, end_hour: 21 }]
        );
        let dlc: Vec<String> = list_periods(&hours, "ResHPWHDLCGrd")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(dlc, vec!["6 - 11", "17 - 22"]);
        assert!(list_periods(&hours, "ComCurtail").is_empty());

        let ps = PlanSeason::new(Plan::OldBins, Season::Winter);
        let summary = summarize_dr_hours(&BTreeMap::from([(ps, hours)]), &PeriodConfig::default());
        assert_eq!(summary[0].plan_season, ps);
        assert_eq!(summary[0].dlc.len(), 2);
    }
}
