// src/patterns/scoring.rs
use crate::types::{CandleSeries, FlagOrientation};

pub const IDEAL_FLAG_DURATION: f64 = 7.0;

const FLAGPOLE_POINTS: f64 = 40.0;
const DURATION_POINTS: f64 = 20.0;
const VOLUME_POINTS: f64 = 20.0;
const BREAKOUT_POINTS: f64 = 20.0;

/// Quality score in 0..=100 for a confirmed flag.
///
/// Four components, each clamped to its own cap before summing:
/// flagpole strength (40), closeness of the flag duration to seven candles (20),
/// volume dry-up from pole to flag (20) and the close-to-close breakout move (20).
/// Returns 0 if any candle the score needs is missing.
pub fn pattern_score(
    candles: &CandleSeries,
    orientation: FlagOrientation,
    flagpole_start: usize,
    flag_start: usize,
    breakout: usize,
    avg_flagpole_volume: f64,
    avg_flag_volume: f64,
) -> u8 {
    if flag_start == 0 || breakout == 0 {
        return 0;
    }
    let (Some(pole_first), Some(pole_last), Some(breakout_candle), Some(before_breakout)) = (
        candles.get(flagpole_start),
        candles.get(flag_start - 1),
        candles.get(breakout),
        candles.get(breakout - 1),
    ) else {
        return 0;
    };

    let sign = orientation.sign();
    let anchor = orientation.trailing_extreme(pole_first);
    let flagpole_strength = sign * (orientation.leading_extreme(pole_last) - anchor) / anchor;

    let flag_duration = breakout.saturating_sub(flag_start) as f64;
    let duration_fit = 1.0 - (flag_duration - IDEAL_FLAG_DURATION).abs() / IDEAL_FLAG_DURATION;

    let volume_decrease = if avg_flagpole_volume > 0.0 {
        1.0 - avg_flag_volume / avg_flagpole_volume
    } else {
        0.0
    };

    let breakout_strength = sign * (breakout_candle.close - before_breakout.close) / before_breakout.close;

    let total = capped(flagpole_strength, FLAGPOLE_POINTS)
        + capped(duration_fit, DURATION_POINTS)
        + capped(volume_decrease, VOLUME_POINTS)
        + capped(breakout_strength, BREAKOUT_POINTS);

    total.round().clamp(0.0, 100.0) as u8
}

fn capped(ratio: f64, points: f64) -> f64 {
    if ratio.is_finite() {
        (ratio * points).clamp(0.0, points)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Candle;

    fn series(closes: &[(f64, f64, f64)]) -> CandleSeries {
        closes
            .iter()
            .map(|&(high, low, close)| Candle::new(close, high, low, close, 100.0))
            .collect()
    }

    #[test]
    fn components_are_capped_individually() {
        // A 100% pole and a 110% breakout would overflow their caps.
        let candles = series(&[
            (10.0, 10.0, 10.0),
            (20.0, 10.0, 20.0),
            (20.0, 18.0, 19.0),
            (19.5, 18.5, 19.0),
            (45.0, 19.0, 40.0),
        ]);
        let score = pattern_score(&candles, FlagOrientation::Bull, 0, 2, 4, 200.0, 50.0);
        // pole 40 + duration (1 - 5/7)*20 + volume 15 + breakout 20
        assert_eq!(score, 81);
    }

    #[test]
    fn missing_candle_scores_zero() {
        let mut slots: Vec<Option<Candle>> = series(&[(10.0, 9.0, 9.5); 5]).slots().to_vec();
        slots[1] = None;
        let candles = CandleSeries::new(slots);
        assert_eq!(pattern_score(&candles, FlagOrientation::Bear, 0, 2, 4, 100.0, 50.0), 0);
    }

    #[test]
    fn negative_components_floor_at_zero() {
        let candles = series(&[(10.0, 9.0, 9.5), (10.0, 9.0, 9.5), (10.0, 9.0, 9.5), (10.0, 9.0, 9.5)]);
        // flag volume above pole volume and a breakout that moved the wrong way
        let score = pattern_score(&candles, FlagOrientation::Bull, 0, 1, 3, 50.0, 100.0);
        assert!(score <= 20);
    }
}
