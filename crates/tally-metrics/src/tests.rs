use crate::clock::{Clock, ManualClock};
use crate::{
    codec, http, MetricContext, MetricError, MetricKind, SamplingConfig, SnapshotEntry,
};
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tower::util::ServiceExt;

fn manual_context() -> (Arc<ManualClock>, MetricContext) {
    let clock = Arc::new(ManualClock::new());
    let context = MetricContext::with_config("test", SamplingConfig::default(), clock.clone());
    (clock, context)
}

#[test]
fn concurrent_increments_sum_exactly() {
    let context = Arc::new(MetricContext::new("test"));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let context = Arc::clone(&context);
            thread::spawn(move || {
                for _ in 0..1000 {
                    context.increment_counter("hits", 3).unwrap();
                    context.increment_basic("jobs", 1).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = context.snapshot();
    match snapshot.get("hits") {
        Some(SnapshotEntry::Counter { value, .. }) => assert_eq!(*value, 24_000),
        other => panic!("unexpected entry: {other:?}"),
    }
    assert_eq!(context.basic_value("jobs").unwrap(), 8000);
}

#[test]
fn rate_is_exact_with_manual_clock() {
    let (clock, context) = manual_context();
    context.increment_counter("req", 0).unwrap();

    context.increment_counter("req", 100).unwrap();
    clock.advance(Duration::from_secs(4));
    let rate = context.counter_rate("req").unwrap();
    assert_eq!(rate.per_sec, 25.0);
    assert_eq!(rate.elapsed, Duration::from_secs(4));

    context.increment_counter("req", 10).unwrap();
    clock.advance(Duration::from_secs(2));
    assert_eq!(context.counter_rate("req").unwrap().per_sec, 5.0);
}

/// Moves forward one millisecond on every reading.
#[derive(Debug, Default)]
struct TickingClock {
    millis: AtomicU64,
}

impl Clock for TickingClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[test]
fn concurrent_rate_computations_account_for_every_increment() {
    let context = Arc::new(MetricContext::with_config(
        "test",
        SamplingConfig::default(),
        Arc::new(TickingClock::default()),
    ));
    context.increment_counter("req", 0).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let context = Arc::clone(&context);
            thread::spawn(move || {
                let mut seen = 0.0;
                for _ in 0..500 {
                    context.increment_counter("req", 2).unwrap();
                    let rate = context.counter_rate("req").unwrap();
                    assert!(rate.per_sec.is_finite(), "rate {rate:?}");
                    seen += rate.per_sec * rate.elapsed.as_secs_f64();
                }
                seen
            })
        })
        .collect();
    let mut total: f64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

    let last = context.counter_rate("req").unwrap();
    total += last.per_sec * last.elapsed.as_secs_f64();
    assert_eq!(total.round(), 8000.0);
}

#[test]
fn rate_is_not_idempotent() {
    let context = MetricContext::new("test");
    context.increment_counter("req", 50).unwrap();
    thread::sleep(Duration::from_millis(20));

    let first = context.counter_rate("req").unwrap();
    let second = context.counter_rate("req").unwrap();
    assert!(first.per_sec > 0.0);
    assert!(second.per_sec >= 0.0);
    assert_eq!(second.per_sec, 0.0);
    assert!(second.elapsed <= first.elapsed);
}

#[test]
fn unchanged_counter_over_zero_time_is_zero_not_nan() {
    let (_clock, context) = manual_context();
    context.increment_counter("idle", 0).unwrap();
    let rate = context.counter_rate("idle").unwrap();
    assert_eq!(rate.per_sec, 0.0);
    assert_eq!(rate.elapsed, Duration::ZERO);
}

#[test]
fn percentiles_use_nearest_rank() {
    let context = MetricContext::new("test");
    for v in 1..=100 {
        context.observe("latency", f64::from(v)).unwrap();
    }
    assert_eq!(context.percentile("latency", 50.0).unwrap(), 50.0);
    assert_eq!(context.percentile("latency", 95.0).unwrap(), 95.0);
    assert_eq!(context.percentile("latency", 100.0).unwrap(), 100.0);
    assert!(matches!(
        context.percentile("latency", 0.0),
        Err(MetricError::InvalidPercentile(_))
    ));
    assert!(matches!(
        context.percentile("latency", 100.5),
        Err(MetricError::InvalidPercentile(_))
    ));
}

#[test]
fn empty_distribution_fails() {
    let context = MetricContext::new("test");
    context.register("latency", MetricKind::StatsTimer).unwrap();
    assert!(matches!(
        context.percentile("latency", 50.0),
        Err(MetricError::EmptyDistribution(name)) if name == "latency"
    ));
    assert!(matches!(
        context.percentile("missing", 50.0),
        Err(MetricError::NotFound(_))
    ));
}

#[test]
fn distribution_keeps_most_recent_samples() {
    let clock = Arc::new(ManualClock::new());
    let sampling = SamplingConfig {
        capacity: 4,
        window_secs: 10,
    };
    let context = MetricContext::with_config("test", sampling, clock.clone());

    for v in [100.0, 1.0, 2.0, 3.0, 4.0] {
        context.observe("t", v).unwrap();
    }
    // 100.0 was overwritten by the fifth sample.
    assert_eq!(context.percentile("t", 100.0).unwrap(), 4.0);

    clock.advance(Duration::from_secs(11));
    assert!(matches!(
        context.percentile("t", 50.0),
        Err(MetricError::EmptyDistribution(_))
    ));
}

#[test]
fn names_are_unique_across_kinds() {
    let context = MetricContext::new("test");
    context.set_gauge("load", 0.5).unwrap();

    let err = context.increment_counter("load", 1).unwrap_err();
    assert!(matches!(
        err,
        MetricError::KindConflict {
            existing: MetricKind::Gauge,
            requested: MetricKind::Counter,
            ..
        }
    ));
    assert!(context.register("load", MetricKind::StatsTimer).is_err());
    assert_eq!(context.gauge_value("load").unwrap(), 0.5);
}

#[test]
fn register_and_unregister_are_idempotent() {
    let context = MetricContext::new("test");
    context.register("q", MetricKind::Gauge).unwrap();
    context.register("q", MetricKind::Gauge).unwrap();
    assert_eq!(context.len(), 1);
    assert_eq!(context.kind_of("q"), Some(MetricKind::Gauge));

    assert!(!context.unregister("q", MetricKind::Counter));
    assert!(context.unregister("q", MetricKind::Gauge));
    assert!(!context.unregister("q", MetricKind::Gauge));
    assert!(context.is_empty());
}

#[test]
fn snapshot_orders_by_kind_then_name() {
    let context = MetricContext::new("test");
    context.observe("z.timer", 1.0).unwrap();
    context.increment_basic("b.basic", 1).unwrap();
    context.set_gauge("y.gauge", 1.0).unwrap();
    context.set_gauge("a.gauge", 1.0).unwrap();
    context.increment_counter("m.counter", 1).unwrap();

    let names: Vec<String> = context
        .snapshot()
        .iter()
        .map(|e| e.name().to_string())
        .collect();
    assert_eq!(
        names,
        vec!["m.counter", "a.gauge", "y.gauge", "b.basic", "z.timer"]
    );
}

#[test]
fn output_filter_excludes_metrics() {
    let context = MetricContext::new("test");
    context.set_gauge("good", 1.0).unwrap();
    context.set_gauge("bad", f64::NAN).unwrap();
    context.set_output_filter(Arc::new(crate::reject_nan));

    let snapshot = context.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.entries()[0].name(), "good");
    assert_eq!(
        context
            .snapshot_with(&|_: &str, _: &SnapshotEntry| true)
            .len(),
        2
    );
}

#[test]
fn statstimer_snapshot_reports_fixed_percentiles() {
    let context = MetricContext::new("test");
    for v in 1..=1000 {
        context.observe("rpc", f64::from(v)).unwrap();
    }
    let snapshot = context.snapshot();
    let Some(SnapshotEntry::StatsTimer { percentiles, .. }) = snapshot.get("rpc") else {
        panic!("rpc should be a statstimer");
    };
    let labels: Vec<&str> = percentiles.iter().map(|p| p.percentile.as_str()).collect();
    assert_eq!(
        labels,
        vec![
            "50.000000",
            "75.000000",
            "95.000000",
            "99.000000",
            "99.900000",
            "99.990000",
            "99.999000"
        ]
    );
    assert_eq!(percentiles[0].value, 500.0);
    assert_eq!(percentiles[4].value, 999.0);
}

#[test]
fn render_text_lists_every_metric() {
    let (_clock, context) = manual_context();
    context.increment_counter("c", 2).unwrap();
    context.set_gauge("g", 1.5).unwrap();
    context.increment_basic("b", 3).unwrap();

    let text = context.render_text();
    assert_eq!(text, "counter c 2 inf\ngauge g 1.500\nbasiccounter b 3\n");
}

async fn get(
    context: Arc<MetricContext>,
    uri: &str,
) -> Result<(StatusCode, Option<String>, Vec<u8>)> {
    let response = http::router(context)
        .oneshot(Request::builder().uri(uri).body(Body::empty())?)
        .await?;
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, content_type, body.to_vec()))
}

#[tokio::test]
async fn http_serves_full_snapshot() -> Result<()> {
    let context = Arc::new(MetricContext::new("test"));
    context.set_gauge("service.latency_ms", 250.0)?;
    context.increment_counter("service.hits", 4)?;

    let (status, content_type, body) = get(context, "/api/v1/metrics.json/").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));

    let snapshot = codec::decode(&body)?;
    assert_eq!(snapshot.len(), 2);
    assert_eq!(
        snapshot.get("service.latency_ms"),
        Some(&SnapshotEntry::Gauge {
            name: "service.latency_ms".into(),
            value: 250.0
        })
    );
    Ok(())
}

#[tokio::test]
async fn http_filters_by_kind_and_nan() -> Result<()> {
    let context = Arc::new(MetricContext::new("test"));
    context.set_gauge("ok", 1.0)?;
    context.set_gauge("nan", f64::NAN)?;
    context.increment_counter("hits", 1)?;

    let (status, _, body) = get(context.clone(), "/api/v1/metrics.json/Gauges").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(codec::decode(&body)?.len(), 2);

    let (_, _, body) = get(context.clone(), "/api/v1/metrics.json/Gauges?allowNaN=false").await?;
    let snapshot = codec::decode(&body)?;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.entries()[0].name(), "ok");

    let (status, _, _) = get(context, "/api/v1/metrics.json/Histograms").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
