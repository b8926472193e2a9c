//! Chart statistics computed from already-fetched readings.
//!
//! Quantiles use the nearest-rank rule on the ascending sample:
//! `v[floor(f * n)]`. All functions are pure.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::models::Reading;

/// Five-number summary plus the values outside the 1.5 IQR fences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BoxPlotSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub outliers: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CellStats {
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// One day of the heat map. `stats` is `None` when the day has no data.
///
/// `weekday` counts days from the start date, not Monday; `date` names the
/// calendar day the cell covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HeatmapCell {
    pub week: u32,
    pub weekday: u32,
    #[ts(type = "string")]
    pub date: NaiveDate,
    pub stats: Option<CellStats>,
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

// `sorted` must be non-empty.
fn nearest_rank(sorted: &[f64], fraction: f64) -> f64 {
    let index = (fraction * sorted.len() as f64).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// Summarizes a sample for a box plot. Non-finite values are ignored;
/// an empty sample yields `None`.
pub fn compute_box_plot_summary(values: &[f64]) -> Option<BoxPlotSummary> {
    let sorted = sorted_finite(values);
    let (&min, &max) = (sorted.first()?, sorted.last()?);

    let q1 = nearest_rank(&sorted, 0.25);
    let median = nearest_rank(&sorted, 0.5);
    let q3 = nearest_rank(&sorted, 0.75);

    let iqr = q3 - q1;
    let (low_fence, high_fence) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
    let outliers = sorted
        .iter()
        .copied()
        .filter(|v| *v < low_fence || *v > high_fence)
        .collect();

    Some(BoxPlotSummary {
        min,
        q1,
        median,
        q3,
        max,
        outliers,
    })
}

fn cell_stats(values: &[f64]) -> Option<CellStats> {
    let sorted = sorted_finite(values);
    let (&min, &max) = (sorted.first()?, sorted.last()?);

    Some(CellStats {
        median: nearest_rank(&sorted, 0.5),
        min,
        max,
        count: sorted.len(),
    })
}

/// Buckets readings into a `num_weeks` x 7 grid starting at `start_date`.
///
/// A reading's cell is taken from the whole-day offset of its UTC date
/// from `start_date`. Readings before `start_date` or past the last week
/// are dropped. The result always has `num_weeks * 7` cells in
/// `(week, weekday)` order.
pub fn compute_weekly_heatmap_buckets(
    readings: &[Reading],
    start_date: NaiveDate,
    num_weeks: u32,
) -> Vec<HeatmapCell> {
    let total_days = num_weeks as usize * 7;
    let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); total_days];

    for reading in readings {
        let days = (reading.datetime.date() - start_date).num_days();
        if days < 0 || days >= total_days as i64 {
            continue;
        }
        buckets[days as usize].push(reading.value);
    }

    buckets
        .iter()
        .enumerate()
        .map(|(day, values)| HeatmapCell {
            week: (day / 7) as u32,
            weekday: (day % 7) as u32,
            date: start_date + Days::new(day as u64),
            stats: cell_stats(values),
        })
        .collect()
}
