// src/indicators/fibonacci.rs
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{ensure_finite, EngineError};
use crate::indicators::ensure_all_finite;
use crate::numeric::{mean, nearest_fibonacci_level};
use crate::types::{Direction, IndicatorKind, Signal, SignalDetails, TrendStrength, Vote};

pub const SHALLOW_RETRACEMENT: f64 = 38.2;
pub const DEEP_RETRACEMENT: f64 = 61.8;
pub const STRENGTH_WINDOW: usize = 5;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketTrend {
    Uptrend,
    Downtrend,
}

impl MarketTrend {
    /// The direction a continuation of this trend would take.
    pub fn direction(self) -> Direction {
        match self {
            MarketTrend::Uptrend => Direction::Rise,
            MarketTrend::Downtrend => Direction::Fall,
        }
    }

    fn word(self) -> &'static str {
        match self {
            MarketTrend::Uptrend => "uptrend",
            MarketTrend::Downtrend => "downtrend",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FibonacciReading {
    /// Retracement level in percent.
    pub value: f64,
    pub trend: MarketTrend,
    /// Past retracement levels, oldest first.
    #[serde(default)]
    pub history: Vec<f64>,
}

/// Average of the last five retracements: shallow means a strong trend,
/// deep means a weak one.
pub fn trend_strength(history: &[f64]) -> TrendStrength {
    if history.len() < STRENGTH_WINDOW {
        return TrendStrength::Unknown;
    }
    match mean(&history[history.len() - STRENGTH_WINDOW..]) {
        Some(avg) if avg < SHALLOW_RETRACEMENT => TrendStrength::Strong,
        Some(avg) if avg > DEEP_RETRACEMENT => TrendStrength::Weak,
        Some(_) => TrendStrength::Moderate,
        None => TrendStrength::Unknown,
    }
}

pub fn evaluate(reading: &FibonacciReading) -> Result<Signal, EngineError> {
    let value = ensure_finite("fibonacci.value", reading.value)?;
    ensure_all_finite("fibonacci.history", &reading.history)?;

    let level = nearest_fibonacci_level(value);
    let strength = trend_strength(&reading.history);
    let word = reading.trend.word();

    let (mut vote, mut reason) = match reading.trend {
        MarketTrend::Downtrend if value > DEEP_RETRACEMENT => (
            Vote::strong(Direction::Fall),
            format!("Strong FIB retracement ({}%) in {}, potential continuation", level, word),
        ),
        MarketTrend::Downtrend => (
            Vote::weak(Direction::Rise),
            format!("Weak FIB retracement ({}%) in {}, potential reversal", level, word),
        ),
        MarketTrend::Uptrend if value < SHALLOW_RETRACEMENT => (
            Vote::strong(Direction::Rise),
            format!("Weak FIB retracement ({}%) in {}, potential continuation", level, word),
        ),
        MarketTrend::Uptrend => (
            Vote::weak(Direction::Fall),
            format!("Strong FIB retracement ({}%) in {}, potential reversal", level, word),
        ),
    };

    let continuation = vote.direction() == reading.trend.direction();
    match strength {
        TrendStrength::Strong if continuation => {
            vote = vote.strengthened();
            reason.push_str(", strong overall trend supports this direction");
        }
        TrendStrength::Weak if !continuation => {
            vote = vote.strengthened();
            reason.push_str(", weak overall trend supports potential reversal");
        }
        _ => {}
    }

    debug!("Fibonacci {} ({:?}, {:?}) -> {:?}", value, reading.trend, strength, vote);

    Ok(Signal {
        kind: IndicatorKind::Fibonacci,
        vote,
        reason,
        reading: format!("Retrace: {:.4} Trend: {}", value, word.to_uppercase()),
        details: SignalDetails::Fibonacci {
            retracement_level: level,
            trend_strength: strength,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Strength;

    fn reading(value: f64, trend: MarketTrend, history: Vec<f64>) -> FibonacciReading {
        FibonacciReading { value, trend, history }
    }

    #[test]
    fn deep_retracement_in_downtrend_continues_down() {
        let signal = evaluate(&reading(70.0, MarketTrend::Downtrend, vec![])).unwrap();
        assert_eq!(signal.vote, Vote::Fall(Strength::Strong));
        assert!(signal.reason.contains("(61.8%)"));
    }

    #[test]
    fn shallow_retracement_in_downtrend_reverses_up() {
        let signal = evaluate(&reading(30.0, MarketTrend::Downtrend, vec![])).unwrap();
        assert_eq!(signal.vote, Vote::Rise(Strength::Weak));
    }

    #[test]
    fn uptrend_splits_at_shallow_level() {
        let cont = evaluate(&reading(20.0, MarketTrend::Uptrend, vec![])).unwrap();
        assert_eq!(cont.vote, Vote::Rise(Strength::Strong));
        let rev = evaluate(&reading(50.0, MarketTrend::Uptrend, vec![])).unwrap();
        assert_eq!(rev.vote, Vote::Fall(Strength::Weak));
    }

    #[test]
    fn weak_trend_reinforces_reversal() {
        let history = vec![70.0, 72.0, 68.0, 75.0, 80.0];
        let signal = evaluate(&reading(50.0, MarketTrend::Uptrend, history)).unwrap();
        assert_eq!(signal.vote, Vote::Fall(Strength::Strong));
        assert!(signal.reason.ends_with("weak overall trend supports potential reversal"));
        assert!(matches!(
            signal.details,
            SignalDetails::Fibonacci { trend_strength: TrendStrength::Weak, .. }
        ));
    }

    #[test]
    fn strong_trend_notes_continuation() {
        let history = vec![20.0, 25.0, 30.0, 22.0, 18.0];
        let signal = evaluate(&reading(20.0, MarketTrend::Uptrend, history)).unwrap();
        assert_eq!(signal.vote, Vote::Rise(Strength::Strong));
        assert!(signal.reason.contains("strong overall trend"));
    }

    #[test]
    fn short_history_has_unknown_strength() {
        assert_eq!(trend_strength(&[10.0, 20.0]), TrendStrength::Unknown);
        assert_eq!(trend_strength(&[50.0; 5]), TrendStrength::Moderate);
    }

    #[test]
    fn trend_tag_parses_uppercase() {
        let parsed: FibonacciReading = serde_json::from_str(r#"{"value": 40.0, "trend": "DOWNTREND"}"#).unwrap();
        assert_eq!(parsed.trend, MarketTrend::Downtrend);
        assert!(parsed.history.is_empty());
    }
}
