// src/types.rs
use serde::{Deserialize, Serialize, Serializer};

use crate::errors::{ensure_finite, EngineError};
use crate::numeric::Trend;

// --- Candles ---

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    #[serde(default)]
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self { timestamp: 0, open, high, low, close, volume }
    }

    pub fn validate(&self, index: usize) -> Result<(), EngineError> {
        let field = |name: &str| format!("candle[{}].{}", index, name);
        ensure_finite(&field("open"), self.open)?;
        ensure_finite(&field("high"), self.high)?;
        ensure_finite(&field("low"), self.low)?;
        ensure_finite(&field("close"), self.close)?;
        ensure_finite(&field("volume"), self.volume)?;
        if self.high < self.low {
            return Err(EngineError::invalid(format!(
                "candle[{}] has high {} below low {}",
                index, self.high, self.low
            )));
        }
        if self.low <= 0.0 {
            return Err(EngineError::invalid(format!("candle[{}] has non-positive low {}", index, self.low)));
        }
        if self.volume < 0.0 {
            return Err(EngineError::invalid(format!("candle[{}] has negative volume {}", index, self.volume)));
        }
        Ok(())
    }
}

/// Oldest-to-newest candle slots. A `None` slot is a sample the provider
/// failed to deliver; scans skip it rather than reading it as zero.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct CandleSeries(Vec<Option<Candle>>);

impl CandleSeries {
    pub fn new(slots: Vec<Option<Candle>>) -> Self {
        Self(slots)
    }

    pub fn from_candles(candles: Vec<Candle>) -> Self {
        Self(candles.into_iter().map(Some).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.0.get(index).and_then(|slot| slot.as_ref())
    }

    pub fn slots(&self) -> &[Option<Candle>] {
        &self.0
    }

    /// Closes of the candles that are present, in order.
    pub fn closes(&self) -> Vec<f64> {
        self.0.iter().flatten().map(|c| c.close).collect()
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        for (i, candle) in self.0.iter().enumerate() {
            if let Some(c) = candle {
                c.validate(i)?;
            }
        }
        Ok(())
    }
}

impl FromIterator<Candle> for CandleSeries {
    fn from_iter<I: IntoIterator<Item = Candle>>(iter: I) -> Self {
        Self(iter.into_iter().map(Some).collect())
    }
}

// --- Signals ---

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Rise,
    Fall,
    Neutral,
}

impl Direction {
    /// +1 for rise, -1 for fall, 0 for neutral.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Rise => 1.0,
            Direction::Fall => -1.0,
            Direction::Neutral => 0.0,
        }
    }

    pub fn is_neutral(self) -> bool {
        matches!(self, Direction::Neutral)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Rise => "rise",
            Direction::Fall => "fall",
            Direction::Neutral => "neutral",
        }
    }
}

impl From<Trend> for Direction {
    fn from(trend: Trend) -> Self {
        match trend {
            Trend::Rising => Direction::Rise,
            Trend::Falling => Direction::Fall,
            Trend::Flat => Direction::Neutral,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Weak,
    Strong,
}

/// A directional call and how hard it pushes the consensus.
/// `Neutral` never counts towards rise or fall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vote {
    Rise(Strength),
    Fall(Strength),
    Neutral,
}

impl Vote {
    pub fn direction(self) -> Direction {
        match self {
            Vote::Rise(_) => Direction::Rise,
            Vote::Fall(_) => Direction::Fall,
            Vote::Neutral => Direction::Neutral,
        }
    }

    pub fn strength(self) -> Option<Strength> {
        match self {
            Vote::Rise(s) | Vote::Fall(s) => Some(s),
            Vote::Neutral => None,
        }
    }

    pub fn weak(direction: Direction) -> Self {
        Self::with_strength(direction, Strength::Weak)
    }

    pub fn strong(direction: Direction) -> Self {
        Self::with_strength(direction, Strength::Strong)
    }

    fn with_strength(direction: Direction, strength: Strength) -> Self {
        match direction {
            Direction::Rise => Vote::Rise(strength),
            Direction::Fall => Vote::Fall(strength),
            Direction::Neutral => Vote::Neutral,
        }
    }

    /// Same direction, strong. Neutral stays neutral.
    pub fn strengthened(self) -> Self {
        Self::strong(self.direction())
    }

    /// Ordinal weight used on the wire: -1 strong rise, 0 weak rise,
    /// 1 weak fall, 2 strong fall, `None` for neutral.
    pub fn weight(self) -> Option<i8> {
        match self {
            Vote::Rise(Strength::Strong) => Some(-1),
            Vote::Rise(Strength::Weak) => Some(0),
            Vote::Fall(Strength::Weak) => Some(1),
            Vote::Fall(Strength::Strong) => Some(2),
            Vote::Neutral => None,
        }
    }
}

impl Serialize for Vote {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct VoteRepr {
            direction: Direction,
            strength: Option<Strength>,
            weight: Option<i8>,
        }
        VoteRepr {
            direction: self.direction(),
            strength: self.strength(),
            weight: self.weight(),
        }
        .serialize(serializer)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Rsi,
    Macd,
    Bollinger,
    Fibonacci,
    Vosc,
    EmaCross,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 6] = [
        IndicatorKind::Rsi,
        IndicatorKind::Macd,
        IndicatorKind::Bollinger,
        IndicatorKind::Fibonacci,
        IndicatorKind::Vosc,
        IndicatorKind::EmaCross,
    ];

    pub fn label(self) -> &'static str {
        match self {
            IndicatorKind::Rsi => "RSI",
            IndicatorKind::Macd => "MACD",
            IndicatorKind::Bollinger => "Bollinger Bands",
            IndicatorKind::Fibonacci => "Fibonacci Retracement",
            IndicatorKind::Vosc => "Volume Oscillator",
            IndicatorKind::EmaCross => "EMA Crossover",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrendStrength {
    Strong,
    Moderate,
    Weak,
    Unknown,
}

/// Indicator-specific values carried alongside the vote.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SignalDetails {
    Rsi {
        value: f64,
        upper_threshold: f64,
        lower_threshold: f64,
        extreme_duration: usize,
    },
    Macd {
        histogram: f64,
        divergence: bool,
    },
    Bollinger {
        percent_b: f64,
        bandwidth: f64,
        squeeze: bool,
    },
    Fibonacci {
        retracement_level: f64,
        trend_strength: TrendStrength,
    },
    Vosc {
        value: f64,
        trend: Option<Trend>,
        price_divergence: bool,
    },
    EmaCross {
        short_current: f64,
        long_current: f64,
    },
}

/// One evaluator's verdict. `reason` and `reading` are descriptive only;
/// nothing downstream reads them back.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Signal {
    pub kind: IndicatorKind,
    #[serde(flatten)]
    pub vote: Vote,
    pub reason: String,
    /// Current indicator value formatted for display.
    pub reading: String,
    pub details: SignalDetails,
}

impl Signal {
    pub fn direction(&self) -> Direction {
        self.vote.direction()
    }
}

// --- Patterns ---

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FlagOrientation {
    Bull,
    Bear,
}

impl FlagOrientation {
    /// +1 for bull, -1 for bear. Flips every inequality in the scan.
    pub fn sign(self) -> f64 {
        match self {
            FlagOrientation::Bull => 1.0,
            FlagOrientation::Bear => -1.0,
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            FlagOrientation::Bull => Direction::Rise,
            FlagOrientation::Bear => Direction::Fall,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FlagOrientation::Bull => "Bull",
            FlagOrientation::Bear => "Bear",
        }
    }

    pub fn trend_word(self) -> &'static str {
        match self {
            FlagOrientation::Bull => "uptrend",
            FlagOrientation::Bear => "downtrend",
        }
    }

    /// The candle extreme that moves with the trend.
    pub fn leading_extreme(self, candle: &Candle) -> f64 {
        match self {
            FlagOrientation::Bull => candle.high,
            FlagOrientation::Bear => candle.low,
        }
    }

    /// The candle extreme the trend moves away from.
    pub fn trailing_extreme(self, candle: &Candle) -> f64 {
        match self {
            FlagOrientation::Bull => candle.low,
            FlagOrientation::Bear => candle.high,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PatternResult {
    pub orientation: FlagOrientation,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flagpole_height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flagpole_start_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag_start_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakout_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Scanned candles, kept for chart rendering by the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candles: Option<CandleSeries>,
}

impl PatternResult {
    pub fn insufficient(orientation: FlagOrientation) -> Self {
        Self::not_found(orientation, "Insufficient data", None)
    }

    pub fn not_found(orientation: FlagOrientation, reason: impl Into<String>, candles: Option<CandleSeries>) -> Self {
        Self {
            orientation,
            found: false,
            target_price: None,
            flagpole_height: None,
            score: None,
            flagpole_start_index: None,
            flag_start_index: None,
            breakout_index: None,
            error: Some(reason.into()),
            candles,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        !self.found && self.error.as_deref() == Some("Insufficient data")
    }
}
