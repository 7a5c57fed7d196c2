// src/api/mod.rs
pub mod handlers;

use actix_web::web;

use crate::engine::ForecastEngine;
use crate::errors::ServiceError;
use crate::pattern_log::PatternLog;
use crate::provider::{MarketDataProvider, MarketQuery};

/// Shared by every worker. Holds no per-request results.
pub struct AppState<P> {
    pub provider: P,
    pub engine: ForecastEngine,
    pub pattern_log: PatternLog,
    pub default_interval: String,
    pub default_period: usize,
}

impl<P> AppState<P> {
    pub fn new(provider: P, engine: ForecastEngine, pattern_log: PatternLog) -> Self {
        Self {
            provider,
            engine,
            pattern_log,
            default_interval: crate::config::DEFAULT_INTERVAL.to_string(),
            default_period: crate::patterns::DEFAULT_PERIOD,
        }
    }

    pub fn with_defaults(mut self, interval: &str, period: usize) -> Self {
        self.default_interval = interval.to_string();
        self.default_period = period;
        self
    }

    /// Builds a provider query, filling in the configured interval/period.
    pub fn query(
        &self,
        asset: &str,
        quote: &str,
        interval: Option<&str>,
        period: Option<usize>,
    ) -> Result<MarketQuery, ServiceError> {
        let valid = |s: &str| !s.trim().is_empty() && s.trim().chars().all(|c| c.is_ascii_alphanumeric());
        if !valid(asset) || !valid(quote) {
            return Err(ServiceError::BadRequest(format!("invalid pair {:?}/{:?}", asset, quote)));
        }
        let period = period.unwrap_or(self.default_period);
        if period == 0 {
            return Err(ServiceError::BadRequest("period must be at least 1".to_string()));
        }
        let interval = interval.filter(|i| !i.trim().is_empty()).unwrap_or(self.default_interval.as_str());
        Ok(MarketQuery::new(asset, quote, interval, period))
    }
}

pub fn configure<P: MarketDataProvider + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health))
        .route("/symbols", web::get().to(handlers::symbols::<P>))
        .route("/analyze", web::post().to(handlers::analyze::<P>))
        .route("/scan/{asset}/{quote}", web::get().to(handlers::scan::<P>));
}
