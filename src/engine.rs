// src/engine.rs
// Runs every evaluator and detector the request has input for, then fuses
// their outputs. Nothing survives between calls.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::consensus::{aggregate, ConsensusResult};
use crate::errors::{ensure_finite, EngineError};
use crate::indicators::{
    bollinger, ema_cross, fibonacci, macd, rsi, vosc, BollingerReading, EmaCrossReading, FibonacciReading,
    MacdReading, RsiReading, VoscReading,
};
use crate::patterns::{detect_flag, FlagOptions, DEFAULT_PERIOD};
use crate::target::{estimate, TargetEstimate};
use crate::types::{CandleSeries, FlagOrientation, IndicatorKind, PatternResult, Signal};

/// Which evaluators a caller asked for.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Formula {
    #[serde(alias = "formula1")]
    Rsi,
    #[serde(alias = "formula2")]
    Macd,
    #[serde(alias = "formula3")]
    Bollinger,
    #[serde(alias = "formula4")]
    Fibonacci,
    #[serde(alias = "formula5")]
    Vosc,
    #[serde(alias = "formula6")]
    EmaCross,
    #[serde(alias = "formula8")]
    BullFlag,
    #[serde(alias = "formula7")]
    BearFlag,
    All,
}

impl Formula {
    pub fn includes(self, kind: IndicatorKind) -> bool {
        match self {
            Formula::All => true,
            Formula::Rsi => kind == IndicatorKind::Rsi,
            Formula::Macd => kind == IndicatorKind::Macd,
            Formula::Bollinger => kind == IndicatorKind::Bollinger,
            Formula::Fibonacci => kind == IndicatorKind::Fibonacci,
            Formula::Vosc => kind == IndicatorKind::Vosc,
            Formula::EmaCross => kind == IndicatorKind::EmaCross,
            Formula::BullFlag | Formula::BearFlag => false,
        }
    }

    pub fn orientations(self) -> Vec<FlagOrientation> {
        match self {
            Formula::All => vec![FlagOrientation::Bull, FlagOrientation::Bear],
            Formula::BullFlag => vec![FlagOrientation::Bull],
            Formula::BearFlag => vec![FlagOrientation::Bear],
            _ => Vec::new(),
        }
    }

    pub fn needs_candles(self) -> bool {
        !self.orientations().is_empty()
    }
}

fn both_orientations() -> Vec<FlagOrientation> {
    vec![FlagOrientation::Bull, FlagOrientation::Bear]
}

fn default_period() -> usize {
    DEFAULT_PERIOD
}

/// Everything one evaluation needs. Absent readings are simply left out of
/// the consensus and the confidence ceiling.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    pub current_price: f64,
    #[serde(default)]
    pub rsi: Option<RsiReading>,
    #[serde(default)]
    pub macd: Option<MacdReading>,
    #[serde(default)]
    pub bollinger: Option<BollingerReading>,
    #[serde(default)]
    pub fibonacci: Option<FibonacciReading>,
    #[serde(default)]
    pub vosc: Option<VoscReading>,
    #[serde(default)]
    pub ema_cross: Option<EmaCrossReading>,
    #[serde(default)]
    pub candles: Option<CandleSeries>,
    #[serde(default = "default_period")]
    pub period: usize,
    #[serde(default = "both_orientations")]
    pub orientations: Vec<FlagOrientation>,
    #[serde(default)]
    pub flag_options: Option<FlagOptions>,
}

impl EvaluationRequest {
    pub fn new(current_price: f64) -> Self {
        Self {
            current_price,
            rsi: None,
            macd: None,
            bollinger: None,
            fibonacci: None,
            vosc: None,
            ema_cross: None,
            candles: None,
            period: DEFAULT_PERIOD,
            orientations: both_orientations(),
            flag_options: None,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SkippedIndicator {
    pub indicator: IndicatorKind,
    pub reason: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub current_price: f64,
    pub consensus: ConsensusResult,
    pub signals: Vec<Signal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bull_flag: Option<PatternResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bear_flag: Option<PatternResult>,
    pub target: TargetEstimate,
    pub skipped: Vec<SkippedIndicator>,
}

impl Evaluation {
    pub fn signal(&self, kind: IndicatorKind) -> Option<&Signal> {
        self.signals.iter().find(|s| s.kind == kind)
    }
}

/// The flag result the estimator should weigh: a found bull flag, else a
/// found bear flag, else whichever scan ran on enough data.
pub fn pattern_for_estimate<'a>(
    bull: Option<&'a PatternResult>,
    bear: Option<&'a PatternResult>,
) -> Option<&'a PatternResult> {
    let usable = |p: &&PatternResult| !p.is_insufficient();
    bull.filter(|p| p.found)
        .or_else(|| bear.filter(|p| p.found))
        .or_else(|| bull.filter(usable))
        .or_else(|| bear.filter(usable))
}

#[derive(Debug, Clone, Default)]
pub struct ForecastEngine {
    flag_options: FlagOptions,
}

impl ForecastEngine {
    pub fn new(flag_options: FlagOptions) -> Self {
        Self { flag_options }
    }

    pub fn flag_options(&self) -> &FlagOptions {
        &self.flag_options
    }

    pub fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation, EngineError> {
        let price = ensure_finite("current_price", request.current_price)?;
        if price <= 0.0 {
            return Err(EngineError::invalid(format!("current price {} is not positive", price)));
        }

        let mut signals = Vec::new();
        let mut skipped = Vec::new();
        let mut keep = |kind: IndicatorKind, outcome: Option<Result<Signal, EngineError>>| -> Result<(), EngineError> {
            match outcome {
                None => Ok(()),
                Some(Ok(signal)) => {
                    signals.push(signal);
                    Ok(())
                }
                Some(Err(EngineError::InsufficientData(reason))) => {
                    warn!("{} left out of the evaluation: {}", kind.label(), reason);
                    skipped.push(SkippedIndicator { indicator: kind, reason });
                    Ok(())
                }
                Some(Err(e)) => Err(e),
            }
        };

        keep(IndicatorKind::Rsi, request.rsi.as_ref().map(rsi::evaluate))?;
        keep(IndicatorKind::Macd, request.macd.as_ref().map(macd::evaluate))?;
        keep(
            IndicatorKind::Bollinger,
            request.bollinger.as_ref().map(|r| bollinger::evaluate(price, r)),
        )?;
        keep(IndicatorKind::Fibonacci, request.fibonacci.as_ref().map(fibonacci::evaluate))?;
        keep(IndicatorKind::Vosc, request.vosc.as_ref().map(vosc::evaluate))?;
        keep(IndicatorKind::EmaCross, request.ema_cross.as_ref().map(ema_cross::evaluate))?;

        let options = request.flag_options.unwrap_or(self.flag_options);
        let scan = |orientation: FlagOrientation| -> Result<Option<PatternResult>, EngineError> {
            match &request.candles {
                Some(candles) if request.orientations.contains(&orientation) => {
                    detect_flag(candles, orientation, request.period, &options).map(Some)
                }
                _ => Ok(None),
            }
        };
        let bull_flag = scan(FlagOrientation::Bull)?;
        let bear_flag = scan(FlagOrientation::Bear)?;

        let consensus = aggregate(&signals);
        let target = estimate(
            price,
            &signals,
            pattern_for_estimate(bull_flag.as_ref(), bear_flag.as_ref()),
        );
        debug!(
            "Evaluation: {} signals, {} skipped, verdict {}, confidence {}",
            signals.len(),
            skipped.len(),
            consensus.verdict.as_str(),
            target.confidence
        );

        Ok(Evaluation {
            current_price: price,
            consensus,
            signals,
            bull_flag,
            bear_flag,
            target,
            skipped,
        })
    }
}
