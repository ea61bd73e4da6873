use crate::error::{EngineError, EngineResult};

/// A contiguous block of implemented hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImplementationRun {
    pub start: usize,
    pub len: usize,
}

impl ImplementationRun {
    pub fn last(&self) -> usize {
        self.start + self.len - 1
    }
}

/// Find every run of implemented (`1`) hours, in index order.
pub fn implementation_runs(indicator: &[i8]) -> Vec<ImplementationRun> {
    let mut runs: Vec<ImplementationRun> = Vec::new();
    let mut previous: Option<usize> = None;

    for (idx, _) in indicator.iter().enumerate().filter(|(_, v)| **v == 1) {
        match (previous, runs.last_mut()) {
            (Some(prev), Some(run)) if idx - prev == 1 => run.len += 1,
            _ => runs.push(ImplementationRun { start: idx, len: 1 }),
        }
        previous = Some(idx);
    }

    runs
}

/// Turn a shed schedule into a shift schedule.
///
/// Each run of length `L` keeps its `1`s and gets `L/2` hours of `-1` on
/// either side, marking where the moved load lands. Runs are handled in
/// order and each writes `-1` unconditionally, so when two windows overlap the
/// later run's writes win, including over the earlier run's implemented hours.
/// Writes past either end of the series are dropped.
pub fn shift_hours(indicator: &[i8]) -> EngineResult<Vec<i8>> {
    let runs = implementation_runs(indicator);
    let mut shifted = indicator.to_vec();

    for run in runs {
        if run.len % 2 != 0 {
            return Err(EngineError::OddShiftWindow {
                index: run.start,
                length: run.len,
            });
        }

        for k in 1..=run.len / 2 {
            if let Some(before) = run.start.checked_sub(k) {
                shifted[before] = -1;
            }
            if let Some(after) = shifted.get_mut(run.last() + k) {
                *after = -1;
            }
        }
    }

    Ok(shifted)
}
