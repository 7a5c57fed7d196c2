// src/target.rs
// Target price and confidence from the indicator signals plus an optional
// flag pattern.

use log::{debug, warn};
use serde::Serialize;

use crate::consensus::aggregate;
use crate::types::{Direction, IndicatorKind, PatternResult, Signal, SignalDetails};

pub const PATTERN_CONFIDENCE: f64 = 2.0;
pub const BOLLINGER_LOW_PERCENT_B: f64 = 0.2;
pub const BOLLINGER_HIGH_PERCENT_B: f64 = 0.8;
/// Floor on the accumulated move so the target stays above zero.
pub const MAX_DOWNSIDE_PERCENTAGE: f64 = 99.0;

/// (confidence weight, expected move in percent) per indicator.
fn contribution(kind: IndicatorKind) -> (f64, f64) {
    match kind {
        IndicatorKind::Rsi => (1.0, 2.0),
        IndicatorKind::Macd => (1.0, 1.5),
        IndicatorKind::Bollinger => (1.0, 2.0),
        IndicatorKind::Fibonacci => (0.5, 1.0),
        IndicatorKind::Vosc => (0.5, 1.0),
        IndicatorKind::EmaCross => (0.5, 0.5),
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TargetEstimate {
    pub current_price: f64,
    pub target_price: f64,
    pub price_change_percentage: f64,
    /// Weighted consensus of the supplied signals. With no signals at all a
    /// found pattern decides it; otherwise the pattern only moves the price.
    pub predicted_direction: Direction,
    /// 0..=100
    pub confidence: u8,
    pub raw_confidence_score: f64,
    pub max_confidence_score: f64,
    /// Direction of the last contributor in evaluation order, kept so callers
    /// can see when it disagrees with the consensus.
    pub last_contributor_direction: Direction,
    pub direction_disagreement: bool,
}

/// Bollinger contributes by %B position rather than by its vote.
fn estimator_direction(signal: &Signal) -> Direction {
    match signal.details {
        SignalDetails::Bollinger { percent_b, .. } if percent_b < BOLLINGER_LOW_PERCENT_B => Direction::Rise,
        SignalDetails::Bollinger { percent_b, .. } if percent_b > BOLLINGER_HIGH_PERCENT_B => Direction::Fall,
        SignalDetails::Bollinger { .. } => Direction::Neutral,
        _ => signal.direction(),
    }
}

/// Absent indicators add nothing to either score. A supplied pattern adds its
/// weight to the maximum whether or not it was found.
pub fn estimate(current_price: f64, signals: &[Signal], pattern: Option<&PatternResult>) -> TargetEstimate {
    let mut price_change_percentage = 0.0;
    let mut raw_confidence_score = 0.0;
    let mut max_confidence_score = 0.0;
    let mut last_contributor_direction = Direction::Neutral;
    let mut pattern_direction = None;

    for kind in IndicatorKind::ALL {
        let Some(signal) = signals.iter().find(|s| s.kind == kind) else {
            continue;
        };
        let (confidence, move_pct) = contribution(kind);
        max_confidence_score += confidence;

        let direction = estimator_direction(signal);
        if !direction.is_neutral() {
            raw_confidence_score += confidence;
            price_change_percentage += direction.sign() * move_pct;
            last_contributor_direction = direction;
        }
    }

    if let Some(pattern) = pattern {
        max_confidence_score += PATTERN_CONFIDENCE;
        if let (true, Some(height)) = (pattern.found, pattern.flagpole_height) {
            if current_price > 0.0 {
                let direction = pattern.orientation.direction();
                price_change_percentage += direction.sign() * height / current_price * 100.0;
                raw_confidence_score += PATTERN_CONFIDENCE;
                last_contributor_direction = direction;
                pattern_direction = Some(direction);
            }
        }
    }

    let predicted_direction = match pattern_direction {
        Some(direction) if signals.is_empty() => direction,
        _ => aggregate(signals).verdict,
    };
    price_change_percentage = match predicted_direction {
        Direction::Rise => price_change_percentage.abs(),
        Direction::Fall => -price_change_percentage.abs(),
        Direction::Neutral => price_change_percentage,
    }
    .max(-MAX_DOWNSIDE_PERCENTAGE);

    let direction_disagreement =
        !last_contributor_direction.is_neutral() && last_contributor_direction != predicted_direction;
    if direction_disagreement {
        warn!(
            "Last contributing indicator points {} but consensus is {}",
            last_contributor_direction.as_str(),
            predicted_direction.as_str()
        );
    }

    let confidence = if max_confidence_score > 0.0 {
        (100.0 * raw_confidence_score / max_confidence_score).round().clamp(0.0, 100.0) as u8
    } else {
        0
    };
    let target_price = current_price * (1.0 + price_change_percentage / 100.0);

    debug!(
        "Target {:.4} from {:.4} ({:+.2}%), confidence {} ({}/{})",
        target_price, current_price, price_change_percentage, confidence, raw_confidence_score, max_confidence_score
    );

    TargetEstimate {
        current_price,
        target_price,
        price_change_percentage,
        predicted_direction,
        confidence,
        raw_confidence_score,
        max_confidence_score,
        last_contributor_direction,
        direction_disagreement,
    }
}
