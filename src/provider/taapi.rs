// src/provider/taapi.rs
// TAAPI.IO REST client. Current values and `results=N` histories come from
// separate requests; histories end with the current sample, which is
// trimmed before the reading reaches an evaluator.

use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{MarketDataProvider, MarketQuery};
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::indicators::ema_cross::LONG_PERIOD_OFFSET;
use crate::indicators::{
    BollingerReading, EmaCrossReading, FibonacciReading, MacdReading, MacdSample, MarketTrend, RsiReading,
    VoscReading, VoscSample,
};
use crate::types::CandleSeries;

pub const RSI_HISTORY_RESULTS: usize = 30;
pub const HISTORY_RESULTS: usize = 10;
pub const VOSC_SHORT_PERIOD: usize = 10;
pub const VOSC_LONG_PERIOD: usize = 50;
/// Quote currencies offered by `symbols`.
pub const LISTED_QUOTES: [&str; 2] = ["/USDT", "/USDC"];

#[derive(Deserialize, Debug)]
struct Value {
    value: f64,
}

#[derive(Deserialize, Debug)]
struct Values {
    value: Vec<f64>,
}

#[derive(Deserialize, Debug)]
struct Macd<T> {
    #[serde(rename = "valueMACD")]
    macd: T,
    #[serde(rename = "valueMACDSignal")]
    signal: T,
}

#[derive(Deserialize, Debug)]
struct Bands<T> {
    #[serde(rename = "valueUpperBand")]
    upper: T,
    #[serde(rename = "valueMiddleBand")]
    middle: T,
    #[serde(rename = "valueLowerBand")]
    lower: T,
}

#[derive(Deserialize, Debug)]
struct Retracement {
    value: f64,
    trend: MarketTrend,
}

#[derive(Deserialize, Debug)]
struct Backtrack {
    value: f64,
    #[serde(default)]
    backtrack: usize,
}

/// Drops the trailing current sample of a `results=N` history.
fn past_only<T>(mut history: Vec<T>) -> Vec<T> {
    history.pop();
    history
}

/// Pairs each past sample with the close of the same candle, aligned from
/// the newest end. `closes` still includes the current candle.
fn aligned_closes(closes: &[f64], samples: usize) -> Vec<Option<f64>> {
    let past = closes.len().saturating_sub(1);
    (0..samples)
        .map(|i| {
            let back = samples - i;
            past.checked_sub(back).map(|idx| closes[idx])
        })
        .collect()
}

fn current_and_previous(mut points: Vec<Backtrack>, period: usize) -> Result<(f64, f64), ServiceError> {
    points.sort_by_key(|p| p.backtrack);
    match points.as_slice() {
        [current, previous, ..] => Ok((current.value, previous.value)),
        _ => Err(ServiceError::Provider(format!(
            "EMA({}) returned {} backtracks, need 2",
            period,
            points.len()
        ))),
    }
}

pub struct TaapiClient {
    http: Client,
    base_url: String,
    secret: String,
    exchange: String,
}

impl TaapiClient {
    pub fn new(base_url: &str, secret: &str, exchange: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: secret.to_string(),
            exchange: exchange.to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let secret = config
            .taapi_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ServiceError::Config("TAAPI_SECRET is not set".to_string()))?;
        Ok(Self::new(&config.taapi_base_url, secret, &config.taapi_exchange))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &MarketQuery,
        extra: &[(&str, String)],
    ) -> Result<T, ServiceError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut params = vec![
            ("secret", self.secret.clone()),
            ("exchange", self.exchange.clone()),
            ("symbol", query.symbol()),
            ("interval", query.interval.clone()),
        ];
        params.extend(extra.iter().cloned());
        debug!("TAAPI {} {} {:?}", endpoint, query.symbol(), extra);

        let response = self.http.get(&url).query(&params).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Provider(format!("{} returned {}: {}", endpoint, status, body)));
        }
        Ok(response.json::<T>().await?)
    }

    /// Last `count` candle closes including the current one. Failures are
    /// logged and yield an empty list so price context stays optional.
    async fn recent_closes(&self, query: &MarketQuery, count: usize) -> Vec<f64> {
        match self
            .get::<CandleSeries>("candles", query, &[("period", count.to_string())])
            .await
        {
            Ok(series) => series.closes(),
            Err(e) => {
                warn!("Closes for {} unavailable: {}", query.symbol(), e);
                Vec::new()
            }
        }
    }

    /// Exchange symbols quoted in USDT or USDC.
    pub async fn list_symbols(&self) -> Result<Vec<String>, ServiceError> {
        let url = format!("{}/exchange-symbols", self.base_url);
        let params = [("secret", self.secret.as_str()), ("exchange", self.exchange.as_str())];
        let response = self.http.get(&url).query(&params).send().await?;
        if !response.status().is_success() {
            return Err(ServiceError::Provider(format!("exchange-symbols returned {}", response.status())));
        }
        let symbols: Vec<String> = response.json().await?;
        Ok(symbols
            .into_iter()
            .filter(|s| LISTED_QUOTES.iter().any(|q| s.ends_with(q)))
            .collect())
    }
}

impl MarketDataProvider for TaapiClient {
    async fn price(&self, query: &MarketQuery) -> Result<f64, ServiceError> {
        let Value { value } = self.get("price", query, &[]).await?;
        Ok(value)
    }

    async fn candles(&self, query: &MarketQuery) -> Result<CandleSeries, ServiceError> {
        self.get("candles", query, &[("period", query.period.to_string())]).await
    }

    async fn rsi(&self, query: &MarketQuery) -> Result<RsiReading, ServiceError> {
        let current_params = [("period", query.period.to_string())];
        let history_params = [
            ("period", query.period.to_string()),
            ("results", RSI_HISTORY_RESULTS.to_string()),
        ];
        let (current, history) = futures::join!(
            self.get::<Value>("rsi", query, &current_params),
            self.get::<Values>("rsi", query, &history_params),
        );
        Ok(RsiReading::new(current?.value, past_only(history?.value)))
    }

    async fn macd(&self, query: &MarketQuery) -> Result<MacdReading, ServiceError> {
        let history_params = [("results", HISTORY_RESULTS.to_string())];
        let (current, history, closes) = futures::join!(
            self.get::<Macd<f64>>("macd", query, &[]),
            self.get::<Macd<Vec<f64>>>("macd", query, &history_params),
            self.recent_closes(query, HISTORY_RESULTS),
        );
        let current = current?;
        let history = history?;
        let pairs: Vec<(f64, f64)> = past_only(history.macd.into_iter().zip(history.signal).collect());
        let closes = aligned_closes(&closes, pairs.len());
        Ok(MacdReading {
            macd: current.macd,
            signal: current.signal,
            history: pairs
                .into_iter()
                .zip(closes)
                .map(|((macd, signal), close)| MacdSample { macd, signal, close })
                .collect(),
        })
    }

    async fn bollinger(&self, query: &MarketQuery) -> Result<BollingerReading, ServiceError> {
        let current_params = [("period", query.period.to_string())];
        let history_params = [
            ("period", query.period.to_string()),
            ("results", HISTORY_RESULTS.to_string()),
        ];
        let (current, history) = futures::join!(
            self.get::<Bands<f64>>("bbands", query, &current_params),
            self.get::<Bands<Vec<f64>>>("bbands", query, &history_params),
        );
        let current = current?;
        let mut reading = BollingerReading::new(current.upper, current.middle, current.lower);
        // only the middle band history is used; a failed request just drops the squeeze context
        match history {
            Ok(bands) => {
                debug!("bbands history: {} upper / {} lower samples", bands.upper.len(), bands.lower.len());
                reading.middle_history = past_only(bands.middle);
            }
            Err(e) => warn!("Bollinger history for {} unavailable: {}", query.symbol(), e),
        }
        Ok(reading)
    }

    async fn fibonacci(&self, query: &MarketQuery) -> Result<FibonacciReading, ServiceError> {
        let current_params = [("period", query.period.to_string())];
        let history_params = [
            ("period", query.period.to_string()),
            ("results", HISTORY_RESULTS.to_string()),
        ];
        let (current, history) = futures::join!(
            self.get::<Retracement>("fibonacciretracement", query, &current_params),
            self.get::<Values>("fibonacciretracement", query, &history_params),
        );
        let current = current?;
        Ok(FibonacciReading {
            value: current.value,
            trend: current.trend,
            history: past_only(history?.value),
        })
    }

    async fn vosc(&self, query: &MarketQuery) -> Result<VoscReading, ServiceError> {
        let periods = [
            ("short_period", VOSC_SHORT_PERIOD.to_string()),
            ("long_period", VOSC_LONG_PERIOD.to_string()),
        ];
        let mut with_results = periods.to_vec();
        with_results.push(("results", HISTORY_RESULTS.to_string()));
        let (current, history, closes) = futures::join!(
            self.get::<Value>("vosc", query, &periods),
            self.get::<Values>("vosc", query, &with_results),
            self.recent_closes(query, HISTORY_RESULTS),
        );
        let values = past_only(history?.value);
        let closes = aligned_closes(&closes, values.len());
        Ok(VoscReading::new(
            current?.value,
            values
                .into_iter()
                .zip(closes)
                .map(|(value, price)| VoscSample { value, price })
                .collect(),
        ))
    }

    async fn ema_cross(&self, query: &MarketQuery) -> Result<EmaCrossReading, ServiceError> {
        let short_period = query.period;
        let long_period = short_period + LONG_PERIOD_OFFSET;
        let short_params = [("backtracks", "2".to_string()), ("period", short_period.to_string())];
        let long_params = [("backtracks", "2".to_string()), ("period", long_period.to_string())];
        let (short, long) = futures::join!(
            self.get::<Vec<Backtrack>>("ema", query, &short_params),
            self.get::<Vec<Backtrack>>("ema", query, &long_params),
        );
        let (short_current, short_previous) = current_and_previous(short?, short_period)?;
        let (long_current, long_previous) = current_and_previous(long?, long_period)?;
        Ok(EmaCrossReading {
            short_current,
            long_current,
            short_previous,
            long_previous,
        })
    }

    async fn symbols(&self) -> Result<Vec<String>, ServiceError> {
        self.list_symbols().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_loses_its_current_sample() {
        assert_eq!(past_only(vec![1.0, 2.0, 3.0]), vec![1.0, 2.0]);
        assert!(past_only(Vec::<f64>::new()).is_empty());
    }

    #[test]
    fn closes_align_from_newest_end() {
        // closes: four past candles plus the current one
        let closes = [10.0, 11.0, 12.0, 13.0, 14.0];
        assert_eq!(aligned_closes(&closes, 3), vec![Some(11.0), Some(12.0), Some(13.0)]);
        assert_eq!(aligned_closes(&closes[..2], 3), vec![None, None, Some(10.0)]);
        assert_eq!(aligned_closes(&[], 2), vec![None, None]);
    }

    #[test]
    fn backtracks_are_ordered_newest_first() {
        let points = vec![Backtrack { value: 9.0, backtrack: 1 }, Backtrack { value: 10.0, backtrack: 0 }];
        assert_eq!(current_and_previous(points, 14).unwrap(), (10.0, 9.0));
        assert!(current_and_previous(vec![Backtrack { value: 1.0, backtrack: 0 }], 14).is_err());
    }

    #[test]
    fn parses_provider_payloads() {
        let macd: Macd<Vec<f64>> =
            serde_json::from_str(r#"{"valueMACD":[1.0,2.0],"valueMACDSignal":[0.5,1.5],"valueMACDHist":[0.5,0.5]}"#)
                .unwrap();
        assert_eq!(macd.signal, vec![0.5, 1.5]);
        let fib: Retracement =
            serde_json::from_str(r#"{"value":61.8,"trend":"DOWNTREND","startPrice":1.0,"endPrice":2.0}"#).unwrap();
        assert_eq!(fib.trend, MarketTrend::Downtrend);
        let candles: CandleSeries = serde_json::from_str(
            r#"[{"timestampHuman":"x","timestamp":1,"open":1,"high":2,"low":0.5,"close":1.5,"volume":10}]"#,
        )
        .unwrap();
        assert_eq!(candles.closes(), vec![1.5]);
    }
}
