// src/indicators/macd.rs
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{ensure_finite, EngineError};
use crate::numeric::Trend;
use crate::types::{Direction, IndicatorKind, Signal, SignalDetails, Vote};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct MacdSample {
    pub macd: f64,
    pub signal: f64,
    /// Close of the candle the sample was taken on, if the provider sent it.
    #[serde(default)]
    pub close: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MacdReading {
    pub macd: f64,
    pub signal: f64,
    /// Past samples, oldest first. At least the prior sample is required.
    #[serde(default)]
    pub history: Vec<MacdSample>,
}

fn rising_or_falling(current: f64, previous: f64) -> Trend {
    if current > previous {
        Trend::Rising
    } else {
        Trend::Falling
    }
}

pub fn evaluate(reading: &MacdReading) -> Result<Signal, EngineError> {
    let macd = ensure_finite("macd.macd", reading.macd)?;
    let signal = ensure_finite("macd.signal", reading.signal)?;
    for (i, sample) in reading.history.iter().enumerate() {
        ensure_finite(&format!("macd.history[{}].macd", i), sample.macd)?;
        ensure_finite(&format!("macd.history[{}].signal", i), sample.signal)?;
        if let Some(close) = sample.close {
            ensure_finite(&format!("macd.history[{}].close", i), close)?;
        }
    }
    let previous = reading
        .history
        .last()
        .ok_or_else(|| EngineError::insufficient("MACD needs at least one prior sample"))?;

    let histogram = macd - signal;
    let macd_trend = rising_or_falling(macd, previous.macd);
    let signal_trend = rising_or_falling(signal, previous.signal);

    let (mut vote, mut reason) = if macd > signal {
        let mut reason = format!("MACD ({}) above Signal ({})", macd_trend.as_str(), signal_trend.as_str());
        let vote = if macd > 0.0 && signal > 0.0 {
            reason.push_str(", above zero line - strong bullish");
            Vote::strong(Direction::Rise)
        } else {
            Vote::weak(Direction::Rise)
        };
        (vote, reason)
    } else if macd < signal {
        let mut reason = format!("MACD ({}) below Signal ({})", macd_trend.as_str(), signal_trend.as_str());
        let vote = if macd < 0.0 && signal < 0.0 {
            reason.push_str(", below zero line - strong bearish");
            Vote::strong(Direction::Fall)
        } else {
            Vote::weak(Direction::Fall)
        };
        (vote, reason)
    } else {
        (Vote::Neutral, "MACD and Signal lines are equal".to_string())
    };

    // Price trend over the supplied window against the MACD's own direction.
    let closes: Vec<f64> = reading.history.iter().filter_map(|s| s.close).collect();
    let divergence = match (closes.first(), closes.last()) {
        (Some(first), Some(last)) if closes.len() >= 2 => rising_or_falling(*last, *first) != macd_trend,
        _ => false,
    };
    if divergence {
        reason.push_str(" - Potential divergence detected");
        vote = vote.strengthened();
    }

    debug!("MACD {} / signal {} (hist {}) -> {:?}", macd, signal, histogram, vote);

    Ok(Signal {
        kind: IndicatorKind::Macd,
        vote,
        reason,
        reading: format!("MACD: {:.4} Signal: {:.4} Histogram: {:.4}", macd, signal, histogram),
        details: SignalDetails::Macd { histogram, divergence },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Strength;

    fn sample(macd: f64, signal: f64, close: Option<f64>) -> MacdSample {
        MacdSample { macd, signal, close }
    }

    fn reading(macd: f64, signal: f64, history: Vec<MacdSample>) -> MacdReading {
        MacdReading { macd, signal, history }
    }

    #[test]
    fn bullish_cross_above_zero_is_strong_rise() {
        let signal = evaluate(&reading(1.2, 0.8, vec![sample(1.0, 0.7, None)])).unwrap();
        assert_eq!(signal.vote, Vote::Rise(Strength::Strong));
        assert!(signal.reason.contains("strong bullish"));
    }

    #[test]
    fn below_signal_but_above_zero_is_weak_fall() {
        let signal = evaluate(&reading(0.5, 0.8, vec![sample(0.6, 0.7, None)])).unwrap();
        assert_eq!(signal.vote, Vote::Fall(Strength::Weak));
    }

    #[test]
    fn equal_lines_are_neutral() {
        let signal = evaluate(&reading(0.5, 0.5, vec![sample(0.4, 0.4, None)])).unwrap();
        assert_eq!(signal.vote, Vote::Neutral);
    }

    #[test]
    fn price_divergence_strengthens_the_call() {
        // MACD falling while closes rose over the window
        let history = vec![sample(0.9, 0.8, Some(100.0)), sample(0.7, 0.6, Some(104.0))];
        let signal = evaluate(&reading(0.4, 0.6, history)).unwrap();
        assert_eq!(signal.vote, Vote::Fall(Strength::Strong));
        assert!(signal.reason.ends_with("Potential divergence detected"));
        assert!(matches!(signal.details, SignalDetails::Macd { divergence: true, .. }));
    }

    #[test]
    fn agreeing_price_trend_leaves_vote_alone() {
        let history = vec![sample(0.9, 0.8, Some(104.0)), sample(0.7, 0.6, Some(100.0))];
        let signal = evaluate(&reading(0.4, 0.6, history)).unwrap();
        assert_eq!(signal.vote, Vote::Fall(Strength::Weak));
    }

    #[test]
    fn missing_prior_sample_is_insufficient() {
        let err = evaluate(&reading(0.4, 0.6, vec![])).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData(_)));
    }
}
