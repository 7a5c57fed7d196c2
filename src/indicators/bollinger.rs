// src/indicators/bollinger.rs
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{ensure_finite, EngineError};
use crate::indicators::ensure_all_finite;
use crate::numeric::Trend;
use crate::types::{Direction, IndicatorKind, Signal, SignalDetails, Vote};

/// Bandwidth below which the bands count as squeezed.
pub const SQUEEZE_BANDWIDTH: f64 = 0.1;
/// %B beyond which a band break counts as strong.
pub const STRONG_BREAK_MARGIN: f64 = 0.05;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BollingerReading {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// Past middle-band values, oldest first.
    #[serde(default)]
    pub middle_history: Vec<f64>,
}

impl BollingerReading {
    pub fn new(upper: f64, middle: f64, lower: f64) -> Self {
        Self { upper, middle, lower, middle_history: Vec::new() }
    }

    pub fn percent_b(&self, price: f64) -> f64 {
        (price - self.lower) / (self.upper - self.lower)
    }

    pub fn bandwidth(&self) -> f64 {
        (self.upper - self.lower) / self.middle
    }

    fn middle_trend(&self) -> Option<Trend> {
        let previous = *self.middle_history.last()?;
        Some(if self.middle > previous {
            Trend::Rising
        } else if self.middle < previous {
            Trend::Falling
        } else {
            Trend::Flat
        })
    }
}

pub fn evaluate(price: f64, reading: &BollingerReading) -> Result<Signal, EngineError> {
    let price = ensure_finite("price", price)?;
    ensure_finite("bollinger.upper", reading.upper)?;
    ensure_finite("bollinger.middle", reading.middle)?;
    ensure_finite("bollinger.lower", reading.lower)?;
    ensure_all_finite("bollinger.middle_history", &reading.middle_history)?;
    if reading.upper <= reading.lower {
        return Err(EngineError::invalid(format!(
            "Bollinger upper band {} is not above lower band {}",
            reading.upper, reading.lower
        )));
    }
    if reading.middle <= 0.0 {
        return Err(EngineError::invalid(format!("Bollinger middle band {} is not positive", reading.middle)));
    }

    let percent_b = reading.percent_b(price);
    let bandwidth = reading.bandwidth();
    let trend = reading.middle_trend();
    let mut squeeze = false;

    let (vote, mut reason) = if price > reading.upper {
        let vote = if percent_b > 1.0 + STRONG_BREAK_MARGIN {
            Vote::strong(Direction::Fall)
        } else {
            Vote::weak(Direction::Fall)
        };
        (vote, format!("Price above upper band ({:.2}), potential reversal downward", percent_b))
    } else if price < reading.lower {
        let vote = if percent_b < -STRONG_BREAK_MARGIN {
            Vote::strong(Direction::Rise)
        } else {
            Vote::weak(Direction::Rise)
        };
        (vote, format!("Price below lower band ({:.2}), potential reversal upward", percent_b))
    } else {
        let mut reason = format!("Price within bands ({:.2})", percent_b);
        let mut vote = Vote::Neutral;
        if let Some(t @ (Trend::Rising | Trend::Falling)) = trend {
            if bandwidth < SQUEEZE_BANDWIDTH {
                squeeze = true;
                vote = Vote::weak(Direction::from(t));
                let word = if t == Trend::Rising { "up" } else { "down" };
                reason.push_str(&format!(", low bandwidth ({:.2}), potential {}ward breakout", bandwidth, word));
            }
        }
        (vote, reason)
    };

    if let Some(t) = trend {
        reason.push_str(&format!(", overall trend: {}", t.as_str()));
    }

    debug!("Bollinger %B {:.3}, bandwidth {:.3} -> {:?}", percent_b, bandwidth, vote);

    Ok(Signal {
        kind: IndicatorKind::Bollinger,
        vote,
        reason,
        reading: format!(
            "Upper: {:.4} Middle: {:.4} Lower: {:.4}",
            reading.upper, reading.middle, reading.lower
        ),
        details: SignalDetails::Bollinger { percent_b, bandwidth, squeeze },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Strength;

    #[test]
    fn price_inside_bands_is_neutral() {
        let signal = evaluate(100.0, &BollingerReading::new(105.0, 100.0, 95.0)).unwrap();
        assert_eq!(signal.vote, Vote::Neutral);
        assert_eq!(signal.reason, "Price within bands (0.50)");
        assert!(matches!(signal.details, SignalDetails::Bollinger { squeeze: false, .. }));
    }

    #[test]
    fn far_above_upper_band_is_strong_fall() {
        let signal = evaluate(106.0, &BollingerReading::new(105.0, 100.0, 95.0)).unwrap();
        assert_eq!(signal.vote, Vote::Fall(Strength::Strong));
        let near = evaluate(105.2, &BollingerReading::new(105.0, 100.0, 95.0)).unwrap();
        assert_eq!(near.vote, Vote::Fall(Strength::Weak));
    }

    #[test]
    fn below_lower_band_is_rise() {
        let strong = evaluate(94.0, &BollingerReading::new(105.0, 100.0, 95.0)).unwrap();
        assert_eq!(strong.vote, Vote::Rise(Strength::Strong));
        let weak = evaluate(94.9, &BollingerReading::new(105.0, 100.0, 95.0)).unwrap();
        assert_eq!(weak.vote, Vote::Rise(Strength::Weak));
    }

    #[test]
    fn squeeze_follows_middle_band_trend() {
        let mut reading = BollingerReading::new(102.0, 100.0, 98.0);
        reading.middle_history = vec![99.0, 99.5];
        let signal = evaluate(100.5, &reading).unwrap();
        assert_eq!(signal.vote, Vote::Rise(Strength::Weak));
        assert!(signal.reason.contains("potential upward breakout"));
        assert!(signal.reason.ends_with("overall trend: rising"));
    }

    #[test]
    fn squeeze_without_history_stays_neutral() {
        let signal = evaluate(100.5, &BollingerReading::new(102.0, 100.0, 98.0)).unwrap();
        assert_eq!(signal.vote, Vote::Neutral);
    }

    #[test]
    fn collapsed_bands_are_invalid() {
        let err = evaluate(100.0, &BollingerReading::new(95.0, 100.0, 95.0)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}
