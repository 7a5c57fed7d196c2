// tests/engine_scenarios.rs
use flag_forecaster::consensus::aggregate;
use flag_forecaster::engine::{EvaluationRequest, ForecastEngine};
use flag_forecaster::indicators::{
    bollinger, rsi, BollingerReading, EmaCrossReading, FibonacciReading, MacdReading, MacdSample, MarketTrend,
    RsiReading, VoscReading, VoscSample,
};
use flag_forecaster::patterns::{detect_flag, FlagOptions};
use flag_forecaster::target::estimate;
use flag_forecaster::types::{
    Candle, CandleSeries, Direction, FlagOrientation, IndicatorKind, Signal, SignalDetails, Strength, Vote,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn c(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
    Candle::new(open, high, low, close, volume)
}

/// Drop, quiet consolidation, then a high-volume close below the flag.
fn bear_flag_series() -> CandleSeries {
    CandleSeries::from_candles(vec![
        c(100.0, 101.0, 99.0, 100.0, 100.0),
        c(100.0, 100.5, 93.0, 94.0, 300.0),
        c(94.0, 94.5, 90.0, 90.5, 300.0),
        c(90.5, 92.0, 90.2, 91.5, 100.0),
        c(91.5, 92.5, 91.0, 92.0, 100.0),
        c(92.0, 93.0, 91.5, 92.5, 100.0),
        c(92.5, 93.0, 91.8, 92.2, 100.0),
        c(92.2, 92.8, 91.5, 91.8, 100.0),
        c(91.8, 92.4, 91.2, 91.6, 100.0),
        c(91.6, 92.0, 91.0, 91.3, 100.0),
        c(91.3, 91.5, 88.0, 88.5, 400.0),
        c(88.5, 89.0, 87.5, 88.0, 200.0),
        c(88.0, 88.5, 87.0, 87.5, 200.0),
        c(87.5, 88.0, 86.5, 87.0, 200.0),
    ])
}

fn signal(kind: IndicatorKind, vote: Vote) -> Signal {
    Signal {
        kind,
        vote,
        reason: String::new(),
        reading: String::new(),
        details: SignalDetails::Macd { histogram: 0.0, divergence: false },
    }
}

#[test]
fn short_series_is_insufficient_for_every_period() {
    init_logging();
    let full = bear_flag_series();
    for period in 1..=20 {
        for len in 0..period.min(full.len() + 1) {
            let series = CandleSeries::new(full.slots()[..len].to_vec());
            for orientation in [FlagOrientation::Bull, FlagOrientation::Bear] {
                let result = detect_flag(&series, orientation, period, &FlagOptions::default()).unwrap();
                assert!(!result.found);
                assert_eq!(result.error.as_deref(), Some("Insufficient data"));
                assert!(result.target_price.is_none() && result.flagpole_height.is_none() && result.score.is_none());
            }
        }
    }
}

#[test]
fn bear_breakout_projects_below_the_breakout_close() {
    init_logging();
    let series = bear_flag_series();
    let result = detect_flag(&series, FlagOrientation::Bear, 14, &FlagOptions::default()).unwrap();
    assert!(result.found, "{:?}", result.error);
    let breakout = result.breakout_index.unwrap();
    let breakout_close = series.get(breakout).unwrap().close;
    assert!(result.target_price.unwrap() < breakout_close);
    assert!(result.score.unwrap() <= 100);
}

#[test]
fn empty_and_tied_consensus_is_neutral() {
    assert_eq!(aggregate(&[]).verdict, Direction::Neutral);
    let tied = [
        signal(IndicatorKind::Rsi, Vote::Rise(Strength::Weak)),
        signal(IndicatorKind::Macd, Vote::Fall(Strength::Weak)),
        signal(IndicatorKind::Vosc, Vote::Rise(Strength::Strong)),
        signal(IndicatorKind::Fibonacci, Vote::Fall(Strength::Strong)),
    ];
    let result = aggregate(&tied);
    assert_eq!(result.tally.rise_count, result.tally.fall_count);
    assert_eq!(result.verdict, Direction::Neutral);
}

#[test]
fn eight_signal_tally_favours_fall() {
    let mut signals = vec![signal(IndicatorKind::Rsi, Vote::Fall(Strength::Strong)); 3];
    signals.extend(vec![signal(IndicatorKind::Macd, Vote::Rise(Strength::Strong)); 2]);
    signals.extend(vec![signal(IndicatorKind::Vosc, Vote::Neutral); 3]);
    let result = aggregate(&signals);
    assert_eq!(result.tally.fall_count, 6);
    assert_eq!(result.tally.rise_count, 4);
    assert_eq!(result.verdict, Direction::Fall);
}

#[test]
fn reasons_do_not_feed_back_into_decisions() {
    let original = rsi::evaluate(&RsiReading::new(75.0, vec![])).unwrap();
    let mut rewritten = original.clone();
    rewritten.reason = "RSI oversold, strong buy".to_string();
    assert_eq!(aggregate(&[original.clone()]), aggregate(&[rewritten.clone()]));
    assert_eq!(
        estimate(100.0, &[original], None).target_price,
        estimate(100.0, &[rewritten], None).target_price
    );
}

#[test]
fn documented_indicator_scenarios() {
    let hot = rsi::evaluate(&RsiReading::new(75.0, vec![])).unwrap();
    assert_eq!(hot.vote, Vote::Fall(Strength::Strong));

    let cooling = rsi::evaluate(&RsiReading::new(45.0, vec![50.0])).unwrap();
    assert_eq!(cooling.vote, Vote::Fall(Strength::Weak));

    let inside = bollinger::evaluate(100.0, &BollingerReading::new(105.0, 100.0, 95.0)).unwrap();
    assert_eq!(inside.vote, Vote::Neutral);
    assert!(matches!(inside.details, SignalDetails::Bollinger { percent_b, .. } if (percent_b - 0.5).abs() < 1e-12));
}

fn full_request(price: f64) -> EvaluationRequest {
    let mut request = EvaluationRequest::new(price);
    request.rsi = Some(RsiReading::new(28.0, vec![35.0, 33.0, 31.0, 29.0]));
    request.macd = Some(MacdReading {
        macd: -0.4,
        signal: -0.3,
        history: vec![MacdSample { macd: -0.2, signal: -0.25, close: Some(92.0) }],
    });
    request.bollinger = Some(BollingerReading::new(95.0, 90.0, 85.0));
    request.fibonacci = Some(FibonacciReading { value: 70.0, trend: MarketTrend::Downtrend, history: vec![] });
    request.vosc = Some(VoscReading::new(
        -2.0,
        vec![4.0, 3.0, 2.0, 1.0, 0.0].iter().map(|&value| VoscSample { value, price: None }).collect(),
    ));
    request.ema_cross = Some(EmaCrossReading {
        short_current: 88.0,
        long_current: 89.0,
        short_previous: 90.0,
        long_previous: 89.5,
    });
    request.candles = Some(bear_flag_series());
    request
}

#[test]
fn full_evaluation_combines_indicators_and_bear_flag() {
    init_logging();
    let evaluation = ForecastEngine::default().evaluate(&full_request(88.5)).unwrap();

    assert_eq!(evaluation.signals.len(), 6);
    assert!(evaluation.skipped.is_empty());
    assert!(evaluation.bear_flag.as_ref().map_or(false, |p| p.found));
    assert!(!evaluation.bull_flag.as_ref().map_or(true, |p| p.found));

    // six indicators plus the pattern
    assert_eq!(evaluation.target.max_confidence_score, 6.5);
    assert!(evaluation.target.confidence <= 100);
    if evaluation.target.predicted_direction == Direction::Fall {
        assert!(evaluation.target.target_price < 88.5);
    }
}

#[test]
fn confidence_stays_bounded_for_every_subset_of_inputs() {
    let engine = ForecastEngine::default();
    let full = full_request(90.0);
    for mask in 0u32..128 {
        let mut request = EvaluationRequest::new(90.0);
        let has = |bit: u32| mask & (1 << bit) != 0;
        if has(0) {
            request.rsi = full.rsi.clone();
        }
        if has(1) {
            request.macd = full.macd.clone();
        }
        if has(2) {
            request.bollinger = full.bollinger.clone();
        }
        if has(3) {
            request.fibonacci = full.fibonacci.clone();
        }
        if has(4) {
            request.vosc = full.vosc.clone();
        }
        if has(5) {
            request.ema_cross = full.ema_cross;
        }
        if has(6) {
            request.candles = full.candles.clone();
        }
        let evaluation = engine.evaluate(&request).unwrap();
        let target = &evaluation.target;
        assert!(target.confidence <= 100, "mask {:b}", mask);
        assert!(target.target_price.is_finite(), "mask {:b}", mask);
        assert!(target.raw_confidence_score <= target.max_confidence_score);
        if mask == 0 {
            assert_eq!(target.confidence, 0);
        }
    }
}

#[test]
fn missing_candles_do_not_break_the_scan() {
    let mut slots: Vec<Option<Candle>> = bear_flag_series().slots().to_vec();
    slots.insert(6, None);
    slots.push(None);
    let series = CandleSeries::new(slots);
    let result = detect_flag(&series, FlagOrientation::Bear, 14, &FlagOptions::default()).unwrap();
    assert!(result.found, "{:?}", result.error);
    assert_eq!(result.breakout_index, Some(11));
}
