// src/numeric.rs
// Small numeric helpers shared by the evaluators and the flag scan.

use serde::{Deserialize, Serialize};

pub const FIBONACCI_LEVELS: [f64; 7] = [0.0, 23.6, 38.2, 50.0, 61.8, 78.6, 100.0];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Falling,
    Flat,
}

impl Trend {
    pub fn as_str(self) -> &'static str {
        match self {
            Trend::Rising => "rising",
            Trend::Falling => "falling",
            Trend::Flat => "flat",
        }
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Population standard deviation. Zero for an empty slice.
pub fn volatility(values: &[f64]) -> f64 {
    match mean(values) {
        Some(avg) => {
            let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
            variance.sqrt()
        }
        None => 0.0,
    }
}

/// Length of the run at the end of `values` for which `pred` holds.
pub fn trailing_run<F>(values: &[f64], pred: F) -> usize
where
    F: Fn(f64) -> bool,
{
    values.iter().rev().take_while(|v| pred(**v)).count()
}

/// Compares the average of the first and last halves of the trailing
/// `periods` values. `None` when fewer than `periods` values exist.
pub fn half_window_trend(values: &[f64], periods: usize) -> Option<Trend> {
    if periods < 2 || values.len() < periods {
        return None;
    }
    let recent = &values[values.len() - periods..];
    let half = periods / 2;
    let first = mean(&recent[..half])?;
    let second = mean(&recent[recent.len() - half..])?;
    Some(compare(first, second))
}

/// First-vs-last comparison over the trailing `periods` values.
pub fn endpoint_trend(values: &[f64], periods: usize) -> Option<Trend> {
    if periods < 2 || values.len() < periods {
        return None;
    }
    let recent = &values[values.len() - periods..];
    Some(compare(recent[0], recent[recent.len() - 1]))
}

fn compare(earlier: f64, later: f64) -> Trend {
    if later > earlier {
        Trend::Rising
    } else if later < earlier {
        Trend::Falling
    } else {
        Trend::Flat
    }
}

pub fn nearest_fibonacci_level(value: f64) -> f64 {
    FIBONACCI_LEVELS
        .iter()
        .copied()
        .fold(FIBONACCI_LEVELS[0], |best, level| {
            if (level - value).abs() < (best - value).abs() {
                level
            } else {
                best
            }
        })
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Exponential moving average seeded with the simple average of the first
/// `period` values. Entries before the seed are `None`.
pub fn ema_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut current = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(current);
    for i in period..values.len() {
        current = alpha * values[i] + (1.0 - alpha) * current;
        out[i] = Some(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volatility_is_population_std_dev() {
        let v = volatility(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((v - 2.0).abs() < 1e-12);
        assert_eq!(volatility(&[]), 0.0);
    }

    #[test]
    fn trailing_run_stops_at_first_miss() {
        assert_eq!(trailing_run(&[80.0, 60.0, 75.0, 78.0], |v| v > 70.0), 2);
        assert_eq!(trailing_run(&[], |v| v > 70.0), 0);
    }

    #[test]
    fn half_window_trend_needs_full_window() {
        assert_eq!(half_window_trend(&[1.0, 2.0, 3.0, 4.0], 5), None);
        assert_eq!(half_window_trend(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0], 5), Some(Trend::Rising));
        assert_eq!(half_window_trend(&[5.0, 4.0, 9.0, 2.0, 1.0], 5), Some(Trend::Falling));
        assert_eq!(half_window_trend(&[1.0, 1.0, 7.0, 1.0, 1.0], 5), Some(Trend::Flat));
    }

    #[test]
    fn nearest_level_prefers_closest() {
        assert_eq!(nearest_fibonacci_level(40.0), 38.2);
        assert_eq!(nearest_fibonacci_level(70.0), 61.8);
        assert_eq!(nearest_fibonacci_level(99.0), 100.0);
    }

    #[test]
    fn ema_is_seeded_with_sma() {
        let ema = ema_series(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(ema[0], None);
        assert_eq!(ema[2], Some(2.0));
        assert!((ema[3].unwrap() - 3.0).abs() < 1e-12);
    }
}
