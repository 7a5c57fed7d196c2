// src/patterns/mod.rs
use crate::errors::EngineError;
use crate::types::{CandleSeries, PatternResult};

// Trait for pattern recognizers
pub trait PatternRecognizer {
    fn detect(&self, candles: &CandleSeries) -> Result<PatternResult, EngineError>;
}

mod flag;
mod scoring;

pub use flag::{detect_flag, FlagOptions, FlagRecognizer, DEFAULT_PERIOD};
pub use scoring::{pattern_score, IDEAL_FLAG_DURATION};
