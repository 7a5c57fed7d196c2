// src/indicators/mod.rs
// Stateless evaluators: one indicator reading in, one `Signal` out.
// Display strings are part of the returned signal; nothing is cached.

pub mod bollinger;
pub mod ema_cross;
pub mod fibonacci;
pub mod macd;
pub mod rsi;
pub mod vosc;

pub use bollinger::BollingerReading;
pub use ema_cross::EmaCrossReading;
pub use fibonacci::{FibonacciReading, MarketTrend};
pub use macd::{MacdReading, MacdSample};
pub use rsi::RsiReading;
pub use vosc::{VoscReading, VoscSample};

use crate::errors::{ensure_finite, EngineError};

pub(crate) fn ensure_all_finite(field: &str, values: &[f64]) -> Result<(), EngineError> {
    for (i, v) in values.iter().enumerate() {
        ensure_finite(&format!("{}[{}]", field, i), *v)?;
    }
    Ok(())
}
