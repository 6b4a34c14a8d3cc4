//! Prometheus text exposition format.
//!
//! Families are rendered in the order given (gather already sorts them by
//! name). Histograms expand to `_bucket`/`_sum`/`_count` series and summaries
//! to quantile/`_sum`/`_count` series.

use std::fmt::Write;

use tally_core::{LabelPair, MetricFamily, MetricRecord, MetricValue};

pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".into()
    } else if v == f64::INFINITY {
        "+Inf".into()
    } else if v == f64::NEG_INFINITY {
        "-Inf".into()
    } else {
        v.to_string()
    }
}

/// `{a="1",b="2"}` or empty when there are no labels. `extra` is appended last
/// (used for `le` and `quantile`).
fn label_block(labels: &[LabelPair], extra: Option<(&str, &str)>) -> String {
    let mut parts: Vec<String> = labels
        .iter()
        .map(|lp| format!("{}=\"{}\"", lp.name, escape_label(&lp.value)))
        .collect();
    if let Some((k, v)) = extra {
        parts.push(format!("{k}=\"{v}\""));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", parts.join(","))
    }
}

fn sample(out: &mut String, name: &str, labels: &str, value: &str, ts: Option<i64>) {
    let _ = match ts {
        Some(ts) => writeln!(out, "{name}{labels} {value} {ts}"),
        None => writeln!(out, "{name}{labels} {value}"),
    };
}

fn render_record(out: &mut String, name: &str, m: &MetricRecord) {
    let ts = m.timestamp_ms;
    match &m.value {
        MetricValue::Counter { value }
        | MetricValue::Gauge { value }
        | MetricValue::Untyped { value } => {
            sample(out, name, &label_block(&m.labels, None), &format_float(*value), ts);
        }
        MetricValue::Histogram {
            sample_count,
            sample_sum,
            buckets,
        } => {
            let bucket_name = format!("{name}_bucket");
            for b in buckets {
                let le = format_float(b.upper_bound);
                let labels = label_block(&m.labels, Some(("le", &le)));
                sample(out, &bucket_name, &labels, &b.cumulative_count.to_string(), ts);
            }
            let labels = label_block(&m.labels, Some(("le", "+Inf")));
            sample(out, &bucket_name, &labels, &sample_count.to_string(), ts);

            let plain = label_block(&m.labels, None);
            sample(out, &format!("{name}_sum"), &plain, &format_float(*sample_sum), ts);
            sample(out, &format!("{name}_count"), &plain, &sample_count.to_string(), ts);
        }
        MetricValue::Summary {
            sample_count,
            sample_sum,
            quantiles,
        } => {
            for q in quantiles {
                let quantile = format_float(q.quantile);
                let labels = label_block(&m.labels, Some(("quantile", &quantile)));
                sample(out, name, &labels, &format_float(q.value), ts);
            }
            let plain = label_block(&m.labels, None);
            sample(out, &format!("{name}_sum"), &plain, &format_float(*sample_sum), ts);
            sample(out, &format!("{name}_count"), &plain, &sample_count.to_string(), ts);
        }
    }
}

/// Render families in Prometheus text exposition format.
pub fn render_text(families: &[MetricFamily]) -> String {
    let mut out = String::new();
    for f in families {
        let _ = writeln!(out, "# HELP {} {}", f.name, escape_help(&f.help));
        let _ = writeln!(out, "# TYPE {} {}", f.name, f.metric_type.as_str());
        for m in &f.metrics {
            render_record(&mut out, &f.name, m);
        }
    }
    out
}
