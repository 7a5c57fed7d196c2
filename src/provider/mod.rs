// src/provider/mod.rs
// Market data sources. Every reading is fetched on its own so one failing
// endpoint only removes that indicator from the evaluation.

pub mod taapi;

use std::future::Future;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::engine::{EvaluationRequest, Formula};
use crate::errors::ServiceError;
use crate::indicators::{
    BollingerReading, EmaCrossReading, FibonacciReading, MacdReading, RsiReading, VoscReading,
};
use crate::types::{CandleSeries, IndicatorKind};

pub use taapi::TaapiClient;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MarketQuery {
    pub asset: String,
    pub quote: String,
    pub interval: String,
    pub period: usize,
}

impl MarketQuery {
    pub fn new(asset: &str, quote: &str, interval: &str, period: usize) -> Self {
        Self {
            asset: asset.trim().to_uppercase(),
            quote: quote.trim().to_uppercase(),
            interval: interval.to_string(),
            period,
        }
    }

    /// `BTC/USDT`
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.asset, self.quote)
    }
}

#[allow(async_fn_in_trait)]
pub trait MarketDataProvider {
    async fn price(&self, query: &MarketQuery) -> Result<f64, ServiceError>;
    /// The last `query.period` candles, oldest first.
    async fn candles(&self, query: &MarketQuery) -> Result<CandleSeries, ServiceError>;
    async fn rsi(&self, query: &MarketQuery) -> Result<RsiReading, ServiceError>;
    async fn macd(&self, query: &MarketQuery) -> Result<MacdReading, ServiceError>;
    async fn bollinger(&self, query: &MarketQuery) -> Result<BollingerReading, ServiceError>;
    async fn fibonacci(&self, query: &MarketQuery) -> Result<FibonacciReading, ServiceError>;
    async fn vosc(&self, query: &MarketQuery) -> Result<VoscReading, ServiceError>;
    async fn ema_cross(&self, query: &MarketQuery) -> Result<EmaCrossReading, ServiceError>;

    /// Tradable symbols; providers without a listing return none.
    async fn symbols(&self) -> Result<Vec<String>, ServiceError> {
        Ok(Vec::new())
    }
}

async fn optional<T, F>(wanted: bool, what: &str, query: &MarketQuery, fetch: F) -> Option<T>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    if !wanted {
        return None;
    }
    match fetch.await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{} fetch for {} failed, leaving it out: {}", what, query.symbol(), e);
            None
        }
    }
}

/// Fetches everything `formula` needs concurrently. The price is required;
/// any other failed fetch leaves its slot empty.
pub async fn gather<P: MarketDataProvider>(
    provider: &P,
    query: &MarketQuery,
    formula: Formula,
) -> Result<EvaluationRequest, ServiceError> {
    debug!("Gathering {:?} inputs for {} ({})", formula, query.symbol(), query.interval);
    let wants = |kind: IndicatorKind| formula.includes(kind);

    let (price, rsi, macd, bollinger, fibonacci, vosc, ema_cross, candles) = futures::join!(
        provider.price(query),
        optional(wants(IndicatorKind::Rsi), "RSI", query, provider.rsi(query)),
        optional(wants(IndicatorKind::Macd), "MACD", query, provider.macd(query)),
        optional(wants(IndicatorKind::Bollinger), "Bollinger", query, provider.bollinger(query)),
        optional(wants(IndicatorKind::Fibonacci), "Fibonacci", query, provider.fibonacci(query)),
        optional(wants(IndicatorKind::Vosc), "VOSC", query, provider.vosc(query)),
        optional(wants(IndicatorKind::EmaCross), "EMA crossover", query, provider.ema_cross(query)),
        optional(formula.needs_candles(), "Candles", query, provider.candles(query)),
    );

    let mut request = EvaluationRequest::new(price?);
    request.rsi = rsi;
    request.macd = macd;
    request.bollinger = bollinger;
    request.fibonacci = fibonacci;
    request.vosc = vosc;
    request.ema_cross = ema_cross;
    request.candles = candles;
    request.period = query.period;
    request.orientations = formula.orientations();
    Ok(request)
}
