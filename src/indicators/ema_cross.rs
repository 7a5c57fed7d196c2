// src/indicators/ema_cross.rs
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{ensure_finite, EngineError};
use crate::numeric::{ema_series, round_to};
use crate::types::{Direction, IndicatorKind, Signal, SignalDetails, Vote};

/// The long EMA period is the short period plus this offset.
pub const LONG_PERIOD_OFFSET: usize = 14;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct EmaCrossReading {
    pub short_current: f64,
    pub long_current: f64,
    pub short_previous: f64,
    pub long_previous: f64,
}

impl EmaCrossReading {
    /// Derives both EMAs from a close series. Needs at least
    /// `short_period + LONG_PERIOD_OFFSET + 1` closes.
    pub fn from_closes(closes: &[f64], short_period: usize) -> Option<Self> {
        if short_period == 0 {
            return None;
        }
        let long_period = short_period + LONG_PERIOD_OFFSET;
        if closes.len() < long_period + 1 {
            return None;
        }
        let short = ema_series(closes, short_period);
        let long = ema_series(closes, long_period);
        let n = closes.len();
        Some(Self {
            short_current: short[n - 1]?,
            long_current: long[n - 1]?,
            short_previous: short[n - 2]?,
            long_previous: long[n - 2]?,
        })
    }
}

pub fn evaluate(reading: &EmaCrossReading) -> Result<Signal, EngineError> {
    let sc = ensure_finite("ema.short_current", reading.short_current)?;
    let lc = ensure_finite("ema.long_current", reading.long_current)?;
    let sp = ensure_finite("ema.short_previous", reading.short_previous)?;
    let lp = ensure_finite("ema.long_previous", reading.long_previous)?;

    let (vote, reason) = if sc > lc && sp <= lp {
        (Vote::weak(Direction::Rise), "Short EMA crossed above long EMA")
    } else if sc < lc && sp >= lp {
        (Vote::weak(Direction::Fall), "Short EMA crossed below long EMA")
    } else {
        (Vote::Neutral, "No EMA crossover")
    };
    debug!("EMA short {} / long {} (prev {} / {}) -> {:?}", sc, lc, sp, lp, vote);

    Ok(Signal {
        kind: IndicatorKind::EmaCross,
        vote,
        reason: reason.to_string(),
        reading: format!(
            "CShort: {} CLong: {} PShort: {} PLong: {}",
            round_to(sc, 4),
            round_to(lc, 4),
            round_to(sp, 4),
            round_to(lp, 4)
        ),
        details: SignalDetails::EmaCross {
            short_current: sc,
            long_current: lc,
        },
    })
}
