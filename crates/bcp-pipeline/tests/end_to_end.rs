// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{
    BcpError, CancelToken, ErrorKind, EventRecord, ExecutionContext, MemoryLog, ReproMode,
    TimeSeries,
};
use bcp_insight::{ImpactMeasure, Reliability};
use bcp_pipeline::{AnalysisConfig, AnalysisPipeline, ModelChoice, analyze};
use bcp_preprocess::Transform;
use chrono::{Days, NaiveDate};
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256PlusPlus;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid start date")
}

fn at(offset: u64) -> NaiveDate {
    start() + Days::new(offset)
}

/// Length-200 series with a level shift from 0 to 5 at position 100.
fn fixture_series() -> TimeSeries {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(2020);
    let values = (0..200)
        .map(|t| {
            let level = if t < 100 { 0.0 } else { 5.0 };
            level + rng.sample::<f64, _>(StandardNormal)
        })
        .collect();
    TimeSeries::daily(start(), values).expect("fixture series should be valid")
}

/// Ten catalog events; "policy change" lands two days after the true shift.
fn fixture_events() -> Vec<EventRecord> {
    [
        ("new year", 0, "global", "calendar"),
        ("earnings q1", 25, "us", "earnings"),
        ("supply shock", 48, "asia", "supply"),
        ("rate decision", 70, "us", "monetary"),
        ("policy change", 102, "eu", "regulatory"),
        ("earnings q2", 116, "us", "earnings"),
        ("strike", 131, "eu", "labour"),
        ("product launch", 150, "global", "corporate"),
        ("election", 171, "us", "political"),
        ("storm", 190, "asia", "weather"),
    ]
    .into_iter()
    .map(|(name, offset, region, event_type)| {
        EventRecord::new(name, at(offset))
            .with_region(region)
            .with_event_type(event_type)
            .with_notes(format!("fixture event at day {offset}"))
    })
    .collect()
}

fn quick_config() -> AnalysisConfig {
    AnalysisConfig {
        chains: 2,
        draws: 1000,
        tune: 500,
        seed: 7,
        ..AnalysisConfig::default()
    }
}

#[test]
fn mean_shift_fixture_produces_expected_insight() {
    let report = analyze(
        &fixture_series(),
        &fixture_events(),
        &quick_config(),
        &ExecutionContext::new(),
    )
    .expect("analysis should succeed");

    assert_eq!(report.model, "mean_shift");
    assert_eq!(report.estimates.len(), 1);
    let estimate = &report.estimates[0];
    assert!(estimate.position.abs_diff(100) <= 5, "position={}", estimate.position);
    assert!(estimate.credible_interval.0 <= estimate.position as f64);
    assert!(estimate.credible_interval.1 >= estimate.position as f64);

    assert_eq!(report.insights.len(), 1);
    let insight = &report.insights[0];
    assert_eq!(insight.matched_event.name, "policy change");
    assert_eq!(
        insight.day_offset,
        (at(102) - estimate.date).num_days()
    );

    let impact = insight.impact.as_ref().expect("impact for slot 0");
    assert_eq!(impact.measure, ImpactMeasure::Mean);
    assert!((impact.difference - 5.0).abs() < 0.75, "difference={}", impact.difference);

    assert_eq!(report.diagnostics.chains, 2);
    assert_eq!(report.diagnostics.draws_per_chain, 1000);
    assert_eq!(report.diagnostics.seed, Some(7));
    assert_eq!(report.diagnostics.n, 200);
    assert!(!report.diagnostics.retried);
    assert_eq!(report.convergence.converged, report.is_reliable());
}

#[test]
fn repeated_seeded_runs_give_identical_insights() {
    let series = fixture_series();
    let events = fixture_events();
    let pipeline = AnalysisPipeline::new(quick_config()).expect("config should be valid");

    let first = pipeline
        .run(&series, &events, &ExecutionContext::new())
        .expect("first run");
    let second = pipeline
        .run(&series, &events, &ExecutionContext::new())
        .expect("second run");
    let strict = AnalysisPipeline::new(AnalysisConfig {
        repro_mode: ReproMode::Strict,
        ..quick_config()
    })
    .expect("config should be valid")
    .run(&series, &events, &ExecutionContext::new())
    .expect("strict run");

    assert_eq!(first.insights, second.insights);
    assert_eq!(first.insights, strict.insights);
    assert_eq!(first.estimates, second.estimates);
    assert_eq!(first.impacts, strict.impacts);
}

#[test]
fn extracted_estimate_feeds_back_into_association() {
    let series = fixture_series();
    let events = fixture_events();
    let report = analyze(&series, &events, &quick_config(), &ExecutionContext::new())
        .expect("analysis should succeed");

    let matched = bcp_insight::associate(report.estimates[0].date, &events)
        .expect("catalog is non-empty");
    assert_eq!(matched, &report.insights[0].matched_event);
    let again = bcp_insight::generate_insights(&report.estimates, &report.impacts, &events)
        .expect("insights");
    assert_eq!(again, report.insights);
}

#[test]
fn variance_model_on_log_returns() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(99);
    let mut price = 100.0_f64;
    let prices = (0..301)
        .map(|t| {
            let vol = if t <= 150 { 0.005 } else { 0.03 };
            let value = price;
            price *= (vol * rng.sample::<f64, _>(StandardNormal)).exp();
            value
        })
        .collect();
    let series = TimeSeries::daily(start(), prices).expect("price series");
    let events = vec![
        EventRecord::new("calm", at(20)),
        EventRecord::new("turmoil", at(150)),
    ];
    let config = AnalysisConfig {
        model: ModelChoice::Variance,
        transform: Transform::LogReturns,
        ..quick_config()
    };

    let report = analyze(&series, &events, &config, &ExecutionContext::new())
        .expect("analysis should succeed");
    assert_eq!(report.model, "variance_shift");
    assert_eq!(report.transform, Transform::LogReturns);
    assert_eq!(report.input.n, 300);
    let estimate = &report.estimates[0];
    assert!(estimate.date.abs_diff_days(at(151)) <= 10, "date={}", estimate.date);
    assert_eq!(report.insights[0].matched_event.name, "turmoil");
    let impact = &report.impacts[0];
    assert_eq!(impact.measure, ImpactMeasure::Variance);
    assert!(impact.after > 4.0 * impact.before);
    assert!(
        report
            .diagnostics
            .notes
            .iter()
            .any(|note| note.starts_with("log_returns"))
    );
    let stationarity = report.stationarity.as_ref().expect("adf test should run");
    assert!(stationarity.is_stationary(), "{}", stationarity.describe());
    assert_eq!(stationarity.nobs + stationarity.used_lag + 1, 300);
}

trait DayDistance {
    fn abs_diff_days(self, other: NaiveDate) -> u64;
}

impl DayDistance for NaiveDate {
    fn abs_diff_days(self, other: NaiveDate) -> u64 {
        (self - other).num_days().unsigned_abs()
    }
}

#[test]
fn empty_catalog_is_an_event_association_error() {
    let err = analyze(&fixture_series(), &[], &quick_config(), &ExecutionContext::new())
        .expect_err("empty catalog must fail");
    assert_eq!(err.kind(), ErrorKind::EventAssociation);
}

#[test]
fn infeasible_model_fails_before_sampling() {
    let config = AnalysisConfig {
        k: 20,
        min_dist: 10,
        ..quick_config()
    };
    let log = MemoryLog::new();
    let err = analyze(
        &fixture_series(),
        &fixture_events(),
        &config,
        &ExecutionContext::new().with_log_sink(&log),
    )
    .expect_err("k * min_dist >= n must fail");
    assert!(matches!(err, BcpError::ModelConfig(_)), "{err}");
    assert!(log.records().is_empty());
}

#[test]
fn cancellation_surfaces_cancelled() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = analyze(
        &fixture_series(),
        &fixture_events(),
        &quick_config(),
        &ExecutionContext::new().with_cancel(&cancel),
    )
    .expect_err("cancelled analysis must fail");
    assert_eq!(err, BcpError::Cancelled);
    assert_eq!(err.kind(), ErrorKind::SamplingDivergence);
}

#[test]
fn run_log_records_the_insight() {
    let log = MemoryLog::new();
    let report = analyze(
        &fixture_series(),
        &fixture_events(),
        &quick_config(),
        &ExecutionContext::new().with_log_sink(&log),
    )
    .expect("analysis should succeed");
    assert!(log.contains("analysis started: model=mean_shift"));
    assert!(log.contains("'policy change'"));
    if report
        .estimates
        .iter()
        .any(|estimate| estimate.reliability == Reliability::Unreliable)
    {
        assert!(log.contains("convergence warning"));
    }
}

#[cfg(feature = "serde")]
#[test]
fn report_json_has_documented_shape() {
    let report = analyze(
        &fixture_series(),
        &fixture_events(),
        &quick_config(),
        &ExecutionContext::new(),
    )
    .expect("analysis should succeed");
    let json = report.to_json_value().expect("report should encode");

    let estimate = &json["estimates"][0];
    assert!(estimate["date"].is_string());
    assert!(estimate["position"].is_u64());
    assert_eq!(
        estimate["credible_interval"]
            .as_array()
            .expect("interval array")
            .len(),
        2
    );
    assert!(estimate["reliability"].is_string());

    let convergence = &json["convergence"];
    assert!(convergence["tau[0]"]["rhat"].is_number());
    assert!(convergence["tau[0]"]["ess"].is_number());
    assert!(convergence["converged"].is_boolean());
    assert!(convergence["warnings"].is_array());

    let insight = &json["insights"][0];
    assert_eq!(insight["event_name"], "policy change");
    assert_eq!(insight["region"], "eu");
    assert_eq!(insight["impact"]["measure"], "mean");
    assert!(insight["impact"]["pct_change"].is_number() || insight["impact"]["pct_change"].is_null());

    let stationarity = &json["stationarity"];
    assert!(stationarity["statistic"].is_number());
    assert!(stationarity["critical_values"]["five_percent"].is_number());
    assert!(stationarity["conclusion"].is_string());

    assert_eq!(json["diagnostics"]["chains"], 2);
    assert_eq!(json["diagnostics"]["params_json"]["seed"], 7);
    assert!(report.to_json().expect("report text").contains("\"model\": \"mean_shift\""));
}
