// src/lib.rs
pub mod api;
pub mod candle_csv;
pub mod config;
pub mod consensus;
pub mod engine;
pub mod errors;
pub mod indicators;
pub mod numeric;
pub mod pattern_log;
pub mod patterns;
pub mod provider;
pub mod target;
pub mod types;

pub use engine::{Evaluation, EvaluationRequest, ForecastEngine, Formula};
pub use errors::{EngineError, ServiceError};
