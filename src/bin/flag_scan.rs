// src/bin/flag_scan.rs
// Offline bull/bear flag scan over a CSV candle file.
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::{error, info};
use serde::Serialize;

use flag_forecaster::candle_csv::read_candles_file;
use flag_forecaster::errors::ServiceError;
use flag_forecaster::indicators::{ema_cross, EmaCrossReading};
use flag_forecaster::patterns::{FlagOptions, FlagRecognizer, PatternRecognizer, DEFAULT_PERIOD};
use flag_forecaster::types::{FlagOrientation, PatternResult, Signal};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OrientationArg {
    Bull,
    Bear,
    Both,
}

#[derive(Parser, Debug)]
#[command(name = "flag-scan")]
#[command(about = "Scan a CSV candle file for bull and bear flag patterns")]
struct Args {
    /// CSV with timestamp,open,high,low,close,volume columns
    #[arg(short, long)]
    file: PathBuf,

    /// Minimum number of candles required for a scan
    #[arg(short, long, default_value_t = DEFAULT_PERIOD)]
    period: usize,

    #[arg(short, long, value_enum, default_value_t = OrientationArg::Both)]
    orientation: OrientationArg,

    /// Also report a short/long EMA crossover computed from the closes
    #[arg(long)]
    ema_period: Option<usize>,

    #[arg(long)]
    min_flag_duration: Option<usize>,
    #[arg(long)]
    flagpole_threshold: Option<f64>,
    #[arg(long)]
    flag_threshold: Option<f64>,
    #[arg(long)]
    volume_decrease_threshold: Option<f64>,
    #[arg(long)]
    breakout_volume_increase: Option<f64>,
    #[arg(long)]
    significant_trend_percentage: Option<f64>,
    #[arg(long)]
    max_pattern_duration: Option<usize>,

    /// Keep the scanned candles in the JSON output
    #[arg(long)]
    with_candles: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn flag_options(&self) -> FlagOptions {
        let mut options = FlagOptions::default();
        if let Some(v) = self.min_flag_duration {
            options.min_flag_duration = v;
        }
        if let Some(v) = self.flagpole_threshold {
            options.flagpole_threshold = v;
        }
        if let Some(v) = self.flag_threshold {
            options.flag_threshold = v;
        }
        if let Some(v) = self.volume_decrease_threshold {
            options.volume_decrease_threshold = v;
        }
        if let Some(v) = self.breakout_volume_increase {
            options.breakout_volume_increase = v;
        }
        if let Some(v) = self.significant_trend_percentage {
            options.significant_trend_percentage = v;
        }
        if let Some(v) = self.max_pattern_duration {
            options.max_pattern_duration = v;
        }
        options
    }

    fn orientations(&self) -> Vec<FlagOrientation> {
        match self.orientation {
            OrientationArg::Bull => vec![FlagOrientation::Bull],
            OrientationArg::Bear => vec![FlagOrientation::Bear],
            OrientationArg::Both => vec![FlagOrientation::Bull, FlagOrientation::Bear],
        }
    }
}

#[derive(Serialize)]
struct ScanReport {
    file: String,
    candles: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    bull_flag: Option<PatternResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bear_flag: Option<PatternResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ema_cross: Option<Signal>,
}

fn setup_logging(debug: bool) {
    use env_logger::{Builder, Target};
    use log::LevelFilter;

    let mut builder = Builder::from_default_env();
    builder.target(Target::Stderr);
    builder.filter_level(if debug { LevelFilter::Debug } else { LevelFilter::Info });
    builder.init();
}

fn run(args: &Args) -> Result<ScanReport, ServiceError> {
    let candles = read_candles_file(&args.file)?;
    info!("Loaded {} candles from {}", candles.len(), args.file.display());

    let options = args.flag_options();
    let mut report = ScanReport {
        file: args.file.display().to_string(),
        candles: candles.len(),
        bull_flag: None,
        bear_flag: None,
        ema_cross: None,
    };

    for orientation in args.orientations() {
        let recognizer = FlagRecognizer::new(orientation)
            .with_period(args.period)
            .with_options(options);
        let mut result = recognizer.detect(&candles)?;
        if !args.with_candles {
            result.candles = None;
        }
        match orientation {
            FlagOrientation::Bull => report.bull_flag = Some(result),
            FlagOrientation::Bear => report.bear_flag = Some(result),
        }
    }

    if let Some(short_period) = args.ema_period {
        match EmaCrossReading::from_closes(&candles.closes(), short_period) {
            Some(reading) => report.ema_cross = Some(ema_cross::evaluate(&reading)?),
            None => info!("Not enough closes for an EMA({}) crossover", short_period),
        }
    }
    Ok(report)
}

fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(args.debug);

    let report = match run(&args) {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    match serde_json::to_string_pretty(&report) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Could not serialize report: {}", e);
            ExitCode::FAILURE
        }
    }
}
