// src/indicators/rsi.rs
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{ensure_finite, EngineError};
use crate::indicators::ensure_all_finite;
use crate::numeric::{trailing_run, volatility};
use crate::types::{Direction, IndicatorKind, Signal, SignalDetails, Vote};

pub const OVERBOUGHT: f64 = 70.0;
pub const OVERSOLD: f64 = 30.0;
pub const MIDLINE: f64 = 50.0;
/// Cap on how far volatility may widen the bands.
pub const MAX_BAND_WIDENING: f64 = 10.0;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RsiReading {
    pub value: f64,
    /// Past readings, oldest first, excluding `value`.
    #[serde(default)]
    pub history: Vec<f64>,
}

impl RsiReading {
    pub fn new(value: f64, history: Vec<f64>) -> Self {
        Self { value, history }
    }
}

pub fn evaluate(reading: &RsiReading) -> Result<Signal, EngineError> {
    let value = ensure_finite("rsi.value", reading.value)?;
    if !(0.0..=100.0).contains(&value) {
        return Err(EngineError::invalid(format!("RSI {} is outside 0..=100", value)));
    }
    ensure_all_finite("rsi.history", &reading.history)?;

    let previous = reading.history.last().copied().unwrap_or(value);
    let widening = (volatility(&reading.history) * 2.0).min(MAX_BAND_WIDENING);
    let upper = OVERBOUGHT + widening;
    let lower = OVERSOLD - widening;

    let mut series = reading.history.clone();
    series.push(value);

    let (vote, reason, extreme_duration) = if value > upper {
        let held = trailing_run(&series, |v| v > upper);
        (Vote::strong(Direction::Fall), format!("RSI overbought for {} periods", held), held)
    } else if value < lower {
        let held = trailing_run(&series, |v| v < lower);
        (Vote::strong(Direction::Rise), format!("RSI oversold for {} periods", held), held)
    } else if value < previous && previous >= MIDLINE {
        (Vote::weak(Direction::Fall), "RSI declining from bullish territory".to_string(), 0)
    } else if value > previous && previous <= MIDLINE {
        (Vote::weak(Direction::Rise), "RSI rising from bearish territory".to_string(), 0)
    } else {
        (Vote::Neutral, "RSI in neutral zone".to_string(), 0)
    };

    debug!("RSI {} (prev {}), bands {:.2}/{:.2} -> {:?}", value, previous, lower, upper, vote);

    Ok(Signal {
        kind: IndicatorKind::Rsi,
        vote,
        reason,
        reading: format!("{:.2}", value),
        details: SignalDetails::Rsi {
            value,
            upper_threshold: upper,
            lower_threshold: lower,
            extreme_duration,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Strength;

    #[test]
    fn overbought_without_history_is_strong_fall() {
        let signal = evaluate(&RsiReading::new(75.0, vec![])).unwrap();
        assert_eq!(signal.vote, Vote::Fall(Strength::Strong));
        assert_eq!(signal.reason, "RSI overbought for 1 periods");
    }

    #[test]
    fn oversold_counts_consecutive_periods() {
        let signal = evaluate(&RsiReading::new(20.0, vec![50.0, 25.0, 22.0])).unwrap();
        // volatility widens the lower band below 20, so this is no longer oversold
        assert_ne!(signal.vote, Vote::Rise(Strength::Strong));

        let steady = evaluate(&RsiReading::new(25.0, vec![26.0, 24.0, 25.0])).unwrap();
        assert_eq!(steady.vote, Vote::Rise(Strength::Strong));
        assert!(matches!(steady.details, SignalDetails::Rsi { extreme_duration: 4, .. }));
    }

    #[test]
    fn dropping_through_midline_is_weak_fall() {
        let signal = evaluate(&RsiReading::new(45.0, vec![50.0])).unwrap();
        assert_eq!(signal.vote, Vote::Fall(Strength::Weak));
        assert_eq!(signal.reason, "RSI declining from bullish territory");
    }

    #[test]
    fn rising_from_bearish_territory_is_weak_rise() {
        let signal = evaluate(&RsiReading::new(44.0, vec![40.0])).unwrap();
        assert_eq!(signal.vote, Vote::Rise(Strength::Weak));
    }

    #[test]
    fn flat_reading_is_neutral() {
        let signal = evaluate(&RsiReading::new(55.0, vec![])).unwrap();
        assert_eq!(signal.vote, Vote::Neutral);
        assert_eq!(signal.reading, "55.00");
    }

    #[test]
    fn widening_is_capped() {
        let signal = evaluate(&RsiReading::new(85.0, vec![10.0, 90.0, 10.0, 90.0])).unwrap();
        match signal.details {
            SignalDetails::Rsi { upper_threshold, lower_threshold, .. } => {
                assert_eq!(upper_threshold, 80.0);
                assert_eq!(lower_threshold, 20.0);
            }
            other => panic!("unexpected details {:?}", other),
        }
        assert_eq!(signal.vote, Vote::Fall(Strength::Strong));
    }

    #[test]
    fn out_of_range_is_invalid() {
        assert!(matches!(evaluate(&RsiReading::new(120.0, vec![])), Err(EngineError::InvalidInput(_))));
        assert!(evaluate(&RsiReading::new(50.0, vec![f64::NAN])).is_err());
    }
}
