#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::FixedCollector;
use tally_core::model::ConstMetric;
use tally_core::{Desc, MetricType, MetricValue, Opts};
use tally_registry::config::RegistrySection;
use tally_registry::expose;
use tally_registry::metrics::CounterVec;
use tally_registry::{Collector, MetricSink, Registry};

#[tokio::test]
async fn one_family_per_collector_regardless_of_order() {
    let orders = [
        ["alpha", "bravo", "charlie"],
        ["charlie", "alpha", "bravo"],
        ["bravo", "charlie", "alpha"],
        ["charlie", "bravo", "alpha"],
    ];
    for order in orders {
        let reg = Registry::new();
        for name in order {
            reg.register(FixedCollector::named(name, 1.0).arc()).unwrap();
        }

        let g = reg.gather().await;
        assert!(g.errors.is_empty(), "{:?}", g.errors);
        let names: Vec<&str> = g.families.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["alpha", "bravo", "charlie"], "order {order:?}");
        assert_eq!(g.family("bravo").unwrap().metrics.len(), 1);
    }
}

#[tokio::test]
async fn empty_registry_gathers_nothing() {
    let g = Registry::new().gather().await;
    assert!(g.families.is_empty());
    assert!(g.errors.is_empty());
}

#[tokio::test]
async fn failing_collector_does_not_hide_others() {
    let reg = Registry::new();
    for name in ["a_up", "b_up", "c_up"] {
        reg.register(FixedCollector::named(name, 1.0).arc()).unwrap();
    }
    reg.register(FixedCollector::named("broken_up", 1.0).failing().arc())
        .unwrap();

    let g = reg.gather().await;
    assert_eq!(g.families.len(), 3);
    assert_eq!(g.errors.len(), 1);
    assert_eq!(g.errors[0].kind().as_str(), "COLLECTION_FAILED");
    assert!(g.errors[0].to_string().contains("backend unreachable"));
}

#[tokio::test]
async fn panicking_collector_is_reported() {
    let reg = Registry::new();
    reg.register(FixedCollector::named("ok_up", 1.0).arc()).unwrap();
    reg.register(FixedCollector::named("boom_up", 1.0).panicking().arc())
        .unwrap();

    let g = reg.gather().await;
    assert_eq!(g.families.len(), 1);
    assert_eq!(g.errors.len(), 1);
    assert_eq!(g.errors[0].kind().as_str(), "COLLECTION_FAILED");
    assert!(g.errors[0].to_string().contains("panicked"));
}

#[tokio::test]
async fn slow_collector_times_out() {
    let reg = Registry::with_config(RegistrySection {
        gather_timeout_ms: 50,
        ..RegistrySection::default()
    })
    .unwrap();
    reg.register(FixedCollector::named("fast_up", 1.0).arc()).unwrap();
    reg.register(
        FixedCollector::named("slow_up", 1.0)
            .slow(Duration::from_millis(500))
            .arc(),
    )
    .unwrap();

    let g = reg.gather().await;
    assert_eq!(g.families.len(), 1);
    assert_eq!(g.families[0].name, "fast_up");
    assert_eq!(g.errors.len(), 1);
    assert_eq!(g.errors[0].kind().as_str(), "COLLECTION_TIMEOUT");
}

#[tokio::test]
async fn undeclared_metric_is_rejected() {
    let reg = Registry::new();
    let declared = Arc::new(Desc::new("declared_up", "Declared.", &[], &[]));
    let other = Arc::new(Desc::new("sneaky_up", "Not declared.", &[], &[]));
    let emit = vec![ConstMetric::new(other, MetricType::Gauge, 1.0, &[]).unwrap()];
    reg.register(FixedCollector::new(vec![declared], emit).arc())
        .unwrap();

    let g = reg.gather().await;
    assert!(g.families.is_empty());
    assert_eq!(g.errors.len(), 1);
    assert!(g.errors[0].to_string().contains("was not declared"));
}

#[tokio::test]
async fn duplicate_label_values_are_rejected() {
    let reg = Registry::new();
    let desc = Arc::new(Desc::new("jobs_total", "Jobs.", &["queue"], &[]));
    let emit = vec![
        ConstMetric::new(Arc::clone(&desc), MetricType::Counter, 1.0, &["mail"]).unwrap(),
        ConstMetric::new(Arc::clone(&desc), MetricType::Counter, 2.0, &["mail"]).unwrap(),
        ConstMetric::new(Arc::clone(&desc), MetricType::Counter, 3.0, &["sms"]).unwrap(),
    ];
    reg.register(FixedCollector::new(vec![desc], emit).arc()).unwrap();

    let g = reg.gather().await;
    assert_eq!(g.family("jobs_total").unwrap().metrics.len(), 2);
    assert_eq!(g.errors.len(), 1);
    assert!(g.errors[0].to_string().contains("same label values"));
}

#[tokio::test]
async fn unchecked_collectors_are_validated_at_gather() {
    let reg = Registry::new();
    reg.register(FixedCollector::named("shared_up", 1.0).unchecked().arc())
        .unwrap();
    reg.register(FixedCollector::named("shared_up", 2.0).unchecked().arc())
        .unwrap();

    let g = reg.gather().await;
    assert_eq!(g.family("shared_up").unwrap().metrics.len(), 1);
    assert_eq!(g.errors.len(), 1);
}

#[tokio::test]
async fn family_type_mismatch_is_rejected() {
    let reg = Registry::new();
    let eu = Arc::new(Desc::new("zone_up", "Zone reachability.", &[], &[("zone", "eu")]));
    let us = Arc::new(Desc::new("zone_up", "Zone reachability.", &[], &[("zone", "us")]));
    let eu_metric = ConstMetric::new(Arc::clone(&eu), MetricType::Gauge, 1.0, &[]).unwrap();
    let us_metric = ConstMetric::new(Arc::clone(&us), MetricType::Counter, 1.0, &[]).unwrap();
    reg.register(FixedCollector::new(vec![eu], vec![eu_metric]).arc())
        .unwrap();
    reg.register(FixedCollector::new(vec![us], vec![us_metric]).arc())
        .unwrap();

    let g = reg.gather().await;
    assert_eq!(g.family("zone_up").unwrap().metrics.len(), 1);
    assert_eq!(g.errors.len(), 1);
    assert!(g.errors[0].to_string().contains("has type"));
}

#[tokio::test]
async fn metrics_from_many_collectors_merge_into_one_family() {
    let reg = Registry::new();
    for zone in ["us", "eu", "ap"] {
        let desc = Desc::new("zone_up", "Zone reachability.", &[], &[("zone", zone)]);
        reg.register(FixedCollector::single(desc, 1.0).arc()).unwrap();
    }

    let g = reg.gather().await;
    assert!(g.errors.is_empty(), "{:?}", g.errors);
    let fam = g.family("zone_up").unwrap();
    let zones: Vec<&str> = fam
        .metrics
        .iter()
        .map(|m| m.label_value("zone").unwrap())
        .collect();
    assert_eq!(zones, ["ap", "eu", "us"]);
}

#[tokio::test]
async fn metric_vec_children_are_gathered() {
    let reg = Registry::new();
    let requests = Arc::new(CounterVec::new(
        Opts::new("requests_total", "Requests served.").namespace("api"),
        &["method"],
    ));
    reg.register(requests.clone()).unwrap();

    requests.with_label_values(&["post"]).unwrap().inc();
    requests.with_label_values(&["get"]).unwrap().add(2.0);
    requests.with_label_values(&["get"]).unwrap().inc();

    let g = reg.gather().await;
    assert!(g.errors.is_empty(), "{:?}", g.errors);
    let fam = g.family("api_requests_total").unwrap();
    assert_eq!(fam.metric_type, MetricType::Counter);
    assert_eq!(fam.metrics.len(), 2);
    assert_eq!(fam.metrics[0].label_value("method"), Some("get"));
    assert_eq!(fam.metrics[0].value, MetricValue::Counter { value: 3.0 });
    assert_eq!(fam.metrics[1].value, MetricValue::Counter { value: 1.0 });
}

#[tokio::test]
async fn unregistered_collector_is_not_gathered() {
    let reg = Registry::new();
    let c = FixedCollector::named("gone_up", 1.0).arc();
    reg.register(Arc::clone(&c)).unwrap();
    reg.register(FixedCollector::named("kept_up", 1.0).arc()).unwrap();
    assert!(reg.unregister(&c));

    let g = reg.gather().await;
    assert!(g.family("gone_up").is_none());
    assert!(g.family("kept_up").is_some());
}

#[tokio::test]
async fn concurrency_limit_of_one_still_gathers_everything() {
    let reg = Registry::with_config(RegistrySection {
        max_concurrent_collects: 1,
        ..RegistrySection::default()
    })
    .unwrap();
    for i in 0..10 {
        reg.register(FixedCollector::named(&format!("serial_{i}"), 1.0).arc())
            .unwrap();
    }
    let g = reg.gather().await;
    assert_eq!(g.families.len(), 10);
    assert!(g.errors.is_empty());
}

#[tokio::test]
async fn render_produces_text_exposition() {
    let reg = Registry::new();
    reg.register(FixedCollector::named("queue_depth", 4.0).arc())
        .unwrap();

    let (body, errors) = expose::render(&reg).await;
    assert!(errors.is_empty());
    assert_eq!(
        body,
        "# HELP queue_depth Test metric.\n# TYPE queue_depth gauge\nqueue_depth 4\n"
    );
}

#[tokio::test]
async fn gathered_serializes_to_json() {
    let reg = Registry::new();
    reg.register(FixedCollector::named("queue_depth", 4.0).arc())
        .unwrap();

    reg.register(FixedCollector::named("broken_up", 1.0).failing().arc())
        .unwrap();

    let g = reg.gather().await;
    let v = serde_json::to_value(&g).unwrap();
    assert_eq!(v["families"][0]["name"], "queue_depth");
    assert_eq!(v["families"][0]["type"], "gauge");
    assert_eq!(v["errors"][0]["code"], "COLLECTION_FAILED");
    assert!(v["errors"][0]["message"]
        .as_str()
        .unwrap()
        .contains("backend unreachable"));
}

/// Blocks in `collect` and records how many runs overlap.
struct HungCollector {
    desc: Arc<Desc>,
    hold: Duration,
    calls: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl Collector for HungCollector {
    fn describe(&self) -> Vec<Arc<Desc>> {
        vec![Arc::clone(&self.desc)]
    }

    fn collect(&self, _sink: &mut MetricSink) -> tally_core::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.hold);
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn hung_collector_is_not_invoked_again_while_running() {
    let reg = Registry::with_config(RegistrySection {
        gather_timeout_ms: 20,
        ..RegistrySection::default()
    })
    .unwrap();
    let hung = Arc::new(HungCollector {
        desc: Arc::new(Desc::new("hung_up", "Never answers in time.", &[], &[])),
        hold: Duration::from_millis(600),
        calls: AtomicUsize::new(0),
        running: AtomicUsize::new(0),
        max_running: AtomicUsize::new(0),
    });
    reg.register(hung.clone()).unwrap();
    reg.register(FixedCollector::named("fast_up", 1.0).arc()).unwrap();

    let g = reg.gather().await;
    assert_eq!(g.errors.len(), 1);
    assert_eq!(g.errors[0].kind().as_str(), "COLLECTION_TIMEOUT");

    for _ in 0..4 {
        let g = reg.gather().await;
        assert!(g.family("fast_up").is_some());
        assert_eq!(g.errors.len(), 1);
        assert_eq!(g.errors[0].kind().as_str(), "COLLECTION_TIMEOUT");
        assert!(g.errors[0].to_string().contains("still running"));
    }
    assert_eq!(hung.calls.load(Ordering::SeqCst), 1);

    // once the stuck run returns, the collector is tried again
    tokio::time::sleep(Duration::from_millis(900)).await;
    let _ = reg.gather().await;
    assert_eq!(hung.calls.load(Ordering::SeqCst), 2);
    assert_eq!(hung.max_running.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_gathers_with_register_churn() {
    let reg = Arc::new(Registry::new());
    for i in 0..4 {
        reg.register(FixedCollector::named(&format!("stable_{i}"), 1.0).arc())
            .unwrap();
    }

    let mut churn = Vec::new();
    for t in 0..4 {
        let reg = Arc::clone(&reg);
        churn.push(std::thread::spawn(move || {
            for i in 0..50 {
                let c = FixedCollector::named(&format!("churn_{t}_{i}"), 1.0).arc();
                reg.register(Arc::clone(&c)).unwrap();
                assert!(reg.unregister(&c));
            }
        }));
    }

    let mut gathers = Vec::new();
    for _ in 0..8 {
        let reg = Arc::clone(&reg);
        gathers.push(tokio::spawn(async move {
            for _ in 0..20 {
                let g = reg.gather().await;
                assert!(g.errors.is_empty(), "{:?}", g.errors);
                for i in 0..4 {
                    let fam = g.family(&format!("stable_{i}")).expect("stable family");
                    assert_eq!(fam.metrics.len(), 1);
                }
                let names: Vec<&str> = g.families.iter().map(|f| f.name.as_str()).collect();
                assert!(names.windows(2).all(|w| w[0] < w[1]), "{names:?}");
                assert!(g.families.iter().all(|f| f.metrics.len() == 1));
            }
        }));
    }

    for g in gathers {
        g.await.unwrap();
    }
    for h in churn {
        h.join().unwrap();
    }
    assert_eq!(reg.len(), 4);
}
