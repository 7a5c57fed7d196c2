// src/indicators/vosc.rs
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{ensure_finite, EngineError};
use crate::numeric::{endpoint_trend, half_window_trend, Trend};
use crate::types::{Direction, IndicatorKind, Signal, SignalDetails, Vote};

pub const TREND_PERIODS: usize = 5;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct VoscSample {
    pub value: f64,
    #[serde(default)]
    pub price: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VoscReading {
    pub value: f64,
    /// Past oscillator samples, oldest first.
    #[serde(default)]
    pub history: Vec<VoscSample>,
}

impl VoscReading {
    pub fn new(value: f64, history: Vec<VoscSample>) -> Self {
        Self { value, history }
    }
}

/// Price direction over the trailing window; `None` unless every sample in
/// the window carries a price.
fn price_direction(history: &[VoscSample]) -> Option<Direction> {
    if history.len() < TREND_PERIODS {
        return None;
    }
    let prices: Option<Vec<f64>> = history[history.len() - TREND_PERIODS..].iter().map(|s| s.price).collect();
    endpoint_trend(&prices?, TREND_PERIODS).map(Direction::from)
}

pub fn evaluate(reading: &VoscReading) -> Result<Signal, EngineError> {
    let value = ensure_finite("vosc.value", reading.value)?;
    for (i, sample) in reading.history.iter().enumerate() {
        ensure_finite(&format!("vosc.history[{}].value", i), sample.value)?;
        if let Some(price) = sample.price {
            ensure_finite(&format!("vosc.history[{}].price", i), price)?;
        }
    }

    let values: Vec<f64> = reading.history.iter().map(|s| s.value).collect();
    let trend = half_window_trend(&values, TREND_PERIODS);

    let (mut vote, mut reason) = if value > 0.0 {
        (
            Vote::weak(Direction::Rise),
            format!("Positive VOSC ({:.2}), indicating higher short-term volume", value),
        )
    } else if value < 0.0 {
        (
            Vote::weak(Direction::Fall),
            format!("Negative VOSC ({:.2}), indicating higher long-term volume", value),
        )
    } else {
        (
            Vote::Neutral,
            "VOSC at zero, indicating balanced short and long-term volumes".to_string(),
        )
    };

    match (trend, vote.direction()) {
        (Some(Trend::Rising), Direction::Rise) | (Some(Trend::Falling), Direction::Fall) => {
            vote = vote.strengthened();
            reason.push_str(&format!(", with {} trend strengthening the signal", trend.map_or("", Trend::as_str)));
        }
        (Some(t @ (Trend::Rising | Trend::Falling)), _) => {
            reason.push_str(&format!(", but {} trend suggests caution", t.as_str()));
        }
        _ => {}
    }

    let price_divergence = matches!(price_direction(&reading.history), Some(d) if d != vote.direction());
    if price_divergence {
        reason.push_str(". Potential divergence with price trend detected");
    }

    debug!("VOSC {} (trend {:?}) -> {:?}", value, trend, vote);

    Ok(Signal {
        kind: IndicatorKind::Vosc,
        vote,
        reason,
        reading: format!("{:.2}", value),
        details: SignalDetails::Vosc { value, trend, price_divergence },
    })
}
