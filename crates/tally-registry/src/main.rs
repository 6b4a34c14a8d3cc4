//! tally demo: registers a few metrics, runs one gather pass, and prints the
//! exposition to stdout.
//!
//! Usage: `tally-registry [config.yaml] [--json]`

use std::sync::Arc;
use std::time::Instant;

use tracing_subscriber::{fmt, EnvFilter};

use tally_core::{Desc, HistogramOpts, Opts};
use tally_registry::config::{self, RegistryConfig};
use tally_registry::expose::render_text;
use tally_registry::metrics::{CallbackMetric, Counter, Histogram};
use tally_registry::{Collector, IntoCollector, Registry};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let as_json = args.iter().any(|a| a == "--json");
    let cfg = match args.iter().find(|a| !a.starts_with("--")) {
        Some(path) => config::load_from_file(path).expect("config load failed"),
        None => RegistryConfig::default(),
    };

    let registry = Registry::from_config(&cfg).expect("registry config invalid");

    let started = Instant::now();
    let uptime = Arc::new(
        CallbackMetric::gauge(
            Desc::new("tally_demo_uptime_seconds", "Seconds since the demo started.", &[], &[]),
            move || started.elapsed().as_secs_f64(),
        )
        .into_collector(),
    );
    let gathers = Arc::new(
        Counter::new(Opts::new("gathers_total", "Gather passes run.").namespace("tally_demo"))
            .into_collector(),
    );
    let gather_seconds = Arc::new(
        Histogram::new(HistogramOpts::new("tally_demo_gather_seconds", "Gather pass latency."))
            .expect("default buckets are valid")
            .into_collector(),
    );

    registry.must_register([
        uptime as Arc<dyn Collector>,
        Arc::clone(&gathers) as Arc<dyn Collector>,
        Arc::clone(&gather_seconds) as Arc<dyn Collector>,
    ]);

    let t0 = Instant::now();
    gathers.inc();
    let gathered = registry.gather().await;
    gather_seconds.observe_duration(t0.elapsed());

    for e in &gathered.errors {
        tracing::warn!(code = e.kind().as_str(), error = %e, "collection error");
    }
    tracing::info!(families = gathered.families.len(), "gathered");

    if as_json {
        let body = serde_json::to_string_pretty(&gathered).expect("snapshot serializes");
        println!("{body}");
    } else {
        print!("{}", render_text(&gathered.families));
    }
}
