// src/patterns/flag.rs
// Flagpole -> flag -> breakout scan. One implementation for both
// orientations; the bear scan is the bull scan with the price sign flipped.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::errors::{ensure_finite, EngineError};
use crate::patterns::scoring::pattern_score;
use crate::patterns::PatternRecognizer;
use crate::types::{Candle, CandleSeries, FlagOrientation, PatternResult};

pub const DEFAULT_PERIOD: usize = 14;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct FlagOptions {
    pub min_flag_duration: usize,
    /// Minimum flagpole height relative to its starting price.
    pub flagpole_threshold: f64,
    /// Tolerance applied outward to the flagpole envelope to bound the flag.
    pub flag_threshold: f64,
    pub volume_decrease_threshold: f64,
    pub breakout_volume_increase: f64,
    pub significant_trend_percentage: f64,
    pub max_pattern_duration: usize,
}

impl Default for FlagOptions {
    fn default() -> Self {
        Self {
            min_flag_duration: 5,
            flagpole_threshold: 0.02,
            flag_threshold: 0.01,
            volume_decrease_threshold: 0.8,
            breakout_volume_increase: 1.5,
            significant_trend_percentage: 0.05,
            max_pattern_duration: 30,
        }
    }
}

impl FlagOptions {
    pub fn validate(&self) -> Result<(), EngineError> {
        let ratios = [
            ("flagpole_threshold", self.flagpole_threshold),
            ("flag_threshold", self.flag_threshold),
            ("volume_decrease_threshold", self.volume_decrease_threshold),
            ("breakout_volume_increase", self.breakout_volume_increase),
            ("significant_trend_percentage", self.significant_trend_percentage),
        ];
        for (name, value) in ratios {
            if ensure_finite(name, value)? < 0.0 {
                return Err(EngineError::invalid(format!("{} must not be negative ({})", name, value)));
            }
        }
        Ok(())
    }
}

pub struct FlagRecognizer {
    pub orientation: FlagOrientation,
    pub period: usize,
    pub options: FlagOptions,
}

impl FlagRecognizer {
    pub fn new(orientation: FlagOrientation) -> Self {
        Self {
            orientation,
            period: DEFAULT_PERIOD,
            options: FlagOptions::default(),
        }
    }

    pub fn with_period(mut self, period: usize) -> Self {
        self.period = period;
        self
    }

    pub fn with_options(mut self, options: FlagOptions) -> Self {
        self.options = options;
        self
    }
}

impl PatternRecognizer for FlagRecognizer {
    fn detect(&self, candles: &CandleSeries) -> Result<PatternResult, EngineError> {
        detect_flag(candles, self.orientation, self.period, &self.options)
    }
}

/// Scans `candles` for a flag in the given orientation.
///
/// `Ok` covers every well-formed input, including "not found" and
/// "insufficient data" outcomes. `Err` is reserved for malformed candles or
/// options.
pub fn detect_flag(
    candles: &CandleSeries,
    orientation: FlagOrientation,
    period: usize,
    options: &FlagOptions,
) -> Result<PatternResult, EngineError> {
    if candles.len() < period {
        debug!(
            "[FlagScan] {} scan skipped: {} candles, period {}",
            orientation.name(),
            candles.len(),
            period
        );
        return Ok(PatternResult::insufficient(orientation));
    }
    options.validate()?;
    candles.validate()?;

    let Some(flagpole_start) = find_flagpole_start(candles, orientation, options.significant_trend_percentage)
    else {
        return Ok(PatternResult::not_found(
            orientation,
            format!("No significant {} found", orientation.trend_word()),
            Some(candles.clone()),
        ));
    };
    debug!("[FlagScan] {} flagpole starts at {}", orientation.name(), flagpole_start);

    let scan = FlagScan::new(candles, orientation, options, flagpole_start);
    match scan.run() {
        Some(mut result) => {
            info!(
                "[FlagScan] {} flag confirmed: breakout {:?}, target {:?}, score {:?}",
                orientation.name(),
                result.breakout_index,
                result.target_price,
                result.score
            );
            result.candles = Some(candles.clone());
            Ok(result)
        }
        None => Ok(PatternResult::not_found(
            orientation,
            format!("No valid {} flag pattern found", orientation.name().to_lowercase()),
            Some(candles.clone()),
        )),
    }
}

/// First index whose move from the previous candle exceeds `threshold` in the
/// trend direction; the flagpole starts one candle earlier.
fn find_flagpole_start(candles: &CandleSeries, orientation: FlagOrientation, threshold: f64) -> Option<usize> {
    let sign = orientation.sign();
    (1..candles.len()).find_map(|i| {
        let prev = candles.get(i - 1)?;
        let cur = candles.get(i)?;
        let base = orientation.trailing_extreme(prev);
        let relative_move = sign * (orientation.leading_extreme(cur) - base) / base;
        (relative_move > threshold).then_some(i - 1)
    })
}

struct FlagScan<'a> {
    candles: &'a CandleSeries,
    orientation: FlagOrientation,
    options: &'a FlagOptions,
    flagpole_start: usize,
    flagpole_high: f64,
    flagpole_low: f64,
    flagpole_volume: f64,
    flagpole_candles: usize,
    flag_start: Option<usize>,
    flag_volume: f64,
    flag_duration: usize,
}

impl<'a> FlagScan<'a> {
    fn new(
        candles: &'a CandleSeries,
        orientation: FlagOrientation,
        options: &'a FlagOptions,
        flagpole_start: usize,
    ) -> Self {
        Self {
            candles,
            orientation,
            options,
            flagpole_start,
            flagpole_high: f64::NEG_INFINITY,
            flagpole_low: f64::INFINITY,
            flagpole_volume: 0.0,
            flagpole_candles: 0,
            flag_start: None,
            flag_volume: 0.0,
            flag_duration: 0,
        }
    }

    fn run(mut self) -> Option<PatternResult> {
        let candles = self.candles;
        for i in self.flagpole_start..candles.len() {
            let Some(candle) = candles.get(i) else {
                continue;
            };
            match self.flag_start {
                None => {
                    self.extend_flagpole(candle);
                    if self.reverses(i, candle) {
                        if !self.flagpole_tall_enough() {
                            debug!("[FlagScan] flagpole ending at {} is below flagpole_threshold", i);
                            return None;
                        }
                        self.flag_start = Some(i);
                    }
                }
                Some(flag_start) => {
                    if i - self.flagpole_start > self.options.max_pattern_duration {
                        debug!("[FlagScan] no breakout within {} candles", self.options.max_pattern_duration);
                        return None;
                    }
                    self.flag_duration += 1;
                    self.flag_volume += candle.volume;

                    let (upper, lower) = self.flag_bounds();
                    if self.is_breakout(candle, upper, lower) {
                        return self.confirm(flag_start, i, candle);
                    }
                    if candle.high > upper || candle.low < lower {
                        debug!("[FlagScan] candle {} left the flag bounds [{}, {}]", i, lower, upper);
                        return None;
                    }
                }
            }
        }
        None
    }

    fn extend_flagpole(&mut self, candle: &Candle) {
        self.flagpole_high = self.flagpole_high.max(candle.high);
        self.flagpole_low = self.flagpole_low.min(candle.low);
        self.flagpole_volume += candle.volume;
        self.flagpole_candles += 1;
    }

    /// A close against the trend ends the flagpole.
    fn reverses(&self, i: usize, candle: &Candle) -> bool {
        if i <= self.flagpole_start {
            return false;
        }
        match self.candles.get(i - 1) {
            Some(prev) => self.orientation.sign() * (candle.close - prev.close) < 0.0,
            None => false,
        }
    }

    fn flagpole_tall_enough(&self) -> bool {
        let Some(first) = self.candles.get(self.flagpole_start) else {
            return false;
        };
        let anchor = self.orientation.trailing_extreme(first);
        (self.flagpole_high - self.flagpole_low) / anchor >= self.options.flagpole_threshold
    }

    fn flag_bounds(&self) -> (f64, f64) {
        let t = self.options.flag_threshold;
        (self.flagpole_high * (1.0 + t), self.flagpole_low * (1.0 - t))
    }

    fn is_breakout(&self, candle: &Candle, upper: f64, lower: f64) -> bool {
        match self.orientation {
            FlagOrientation::Bull => candle.close > upper,
            FlagOrientation::Bear => candle.close < lower,
        }
    }

    fn confirm(&self, flag_start: usize, breakout: usize, candle: &Candle) -> Option<PatternResult> {
        let avg_flagpole_volume = self.flagpole_volume / self.flagpole_candles as f64;
        let avg_flag_volume = self.flag_volume / self.flag_duration as f64;
        let opts = self.options;

        let volume_dried_up = avg_flag_volume < avg_flagpole_volume * opts.volume_decrease_threshold;
        let volume_surged = candle.volume > avg_flag_volume * opts.breakout_volume_increase;
        let long_enough = self.flag_duration >= opts.min_flag_duration;
        let within_span = breakout - self.flagpole_start <= opts.max_pattern_duration;

        if !(volume_dried_up && volume_surged && long_enough && within_span) {
            debug!(
                "[FlagScan] breakout at {} rejected: dried_up={} surged={} duration={} span_ok={}",
                breakout, volume_dried_up, volume_surged, self.flag_duration, within_span
            );
            return None;
        }

        let flagpole_height = (self.flagpole_high - self.flagpole_low).abs();
        if flagpole_height <= 0.0 {
            return None;
        }
        let target_price = candle.close + self.orientation.sign() * flagpole_height;
        if target_price <= 0.0 {
            debug!(
                "[FlagScan] breakout at {} rejected: flagpole {} projects a non-positive target {}",
                breakout, flagpole_height, target_price
            );
            return None;
        }
        let score = pattern_score(
            self.candles,
            self.orientation,
            self.flagpole_start,
            flag_start,
            breakout,
            avg_flagpole_volume,
            avg_flag_volume,
        );

        Some(PatternResult {
            orientation: self.orientation,
            found: true,
            target_price: Some(target_price),
            flagpole_height: Some(flagpole_height),
            score: Some(score),
            flagpole_start_index: Some(self.flagpole_start),
            flag_start_index: Some(flag_start),
            breakout_index: Some(breakout),
            error: None,
            candles: None,
        })
    }
}
