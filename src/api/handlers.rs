// src/api/handlers.rs
use actix_web::{web, HttpResponse, Responder};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::engine::{Evaluation, Formula};
use crate::errors::ServiceError;
use crate::patterns::{detect_flag, FlagOptions};
use crate::provider::{gather, MarketDataProvider};
use crate::types::{FlagOrientation, PatternResult};

fn default_quote() -> String {
    "USDT".to_string()
}

#[derive(Deserialize, Debug, Clone)]
pub struct AnalyzeRequest {
    #[serde(alias = "cryptoAsset")]
    pub asset: String,
    #[serde(default = "default_quote", alias = "pair")]
    pub quote: String,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub period: Option<usize>,
    #[serde(alias = "formulaType")]
    pub formula: Formula,
    #[serde(default)]
    pub flag_options: Option<FlagOptions>,
}

#[derive(Serialize, Debug)]
pub struct AnalyzeResponse {
    pub symbol: String,
    pub interval: String,
    pub formula: Formula,
    #[serde(flatten)]
    pub evaluation: Evaluation,
}

#[derive(Deserialize, Debug, Default)]
pub struct ScanParams {
    pub interval: Option<String>,
    pub period: Option<usize>,
}

#[derive(Serialize, Debug)]
pub struct ScanResponse {
    pub pair: String,
    pub name: String,
    pub interval: String,
    /// `None` when the price fetch failed; the scan itself still ran.
    pub asset_price: Option<f64>,
    pub bull_flag: PatternResult,
    pub bear_flag: PatternResult,
}

pub async fn health() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

pub async fn symbols<P: MarketDataProvider + 'static>(
    state: web::Data<AppState<P>>,
) -> Result<HttpResponse, ServiceError> {
    let symbols = state.provider.symbols().await?;
    Ok(HttpResponse::Ok().json(symbols))
}

pub async fn analyze<P: MarketDataProvider + 'static>(
    state: web::Data<AppState<P>>,
    body: web::Json<AnalyzeRequest>,
) -> Result<HttpResponse, ServiceError> {
    let body = body.into_inner();
    let query = state.query(&body.asset, &body.quote, body.interval.as_deref(), body.period)?;
    info!("Analyze {} {} with {:?}", query.symbol(), query.interval, body.formula);

    let mut request = gather(&state.provider, &query, body.formula).await?;
    if let Some(options) = body.flag_options {
        options.validate()?;
        request.flag_options = Some(options);
    }
    let evaluation = state.engine.evaluate(&request)?;

    Ok(HttpResponse::Ok().json(AnalyzeResponse {
        symbol: query.symbol(),
        interval: query.interval,
        formula: body.formula,
        evaluation,
    }))
}

pub async fn scan<P: MarketDataProvider + 'static>(
    state: web::Data<AppState<P>>,
    path: web::Path<(String, String)>,
    params: web::Query<ScanParams>,
) -> Result<HttpResponse, ServiceError> {
    let (asset, quote) = path.into_inner();
    let query = state.query(&asset, &quote, params.interval.as_deref(), params.period)?;
    let symbol = query.symbol();

    let (price, candles) = futures::join!(state.provider.price(&query), state.provider.candles(&query));
    let candles = candles?;
    let asset_price = match price {
        Ok(price) => Some(price),
        Err(e) => {
            warn!("Price for {} unavailable during scan: {}", symbol, e);
            None
        }
    };

    let options = state.engine.flag_options();
    let bull_flag = detect_flag(&candles, FlagOrientation::Bull, query.period, options)?;
    let bear_flag = detect_flag(&candles, FlagOrientation::Bear, query.period, options)?;

    for result in [&bull_flag, &bear_flag] {
        if let Err(e) = state.pattern_log.record(&symbol, result).await {
            warn!(
                "Could not write {} flag for {} to {}: {}",
                result.orientation.name(),
                symbol,
                state.pattern_log.path().display(),
                e
            );
        }
    }

    Ok(HttpResponse::Ok().json(ScanResponse {
        pair: symbol,
        name: query.asset,
        interval: query.interval,
        asset_price,
        bull_flag,
        bear_flag,
    }))
}
