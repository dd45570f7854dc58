//! Metrics snapshot for internal API consumption.
//!
//! This module reads the rendered Prometheus exposition back into structured
//! data: one entry per label combination, histograms folded into their
//! buckets, and fleet-level aggregates for status pages and tests.

use {
    crate::definitions::{applier, labels, membership, placement, scheduling, work},
    serde::{Deserialize, Serialize},
    std::collections::{BTreeMap, HashMap},
};

/// Type of metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

/// A single metric value with its labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// The metric name
    pub name: String,
    /// The metric type
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    /// Labels attached to this metric
    pub labels: BTreeMap<String, String>,
    /// The current value (for counters and gauges)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Histogram data (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub histogram: Option<HistogramSnapshot>,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MetricSnapshot {
    /// Whether every `(key, value)` pair is among this metric's labels.
    #[must_use]
    pub fn has_labels(&self, pairs: &[(&str, &str)]) -> bool {
        pairs
            .iter()
            .all(|(k, v)| self.labels.get(*k).is_some_and(|actual| actual == v))
    }

    fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Histogram bucket and summary data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistogramSnapshot {
    /// Total count of observations
    pub count: u64,
    /// Sum of all observed values
    pub sum: f64,
    /// Bucket boundaries and their cumulative counts, ascending, `+Inf` last
    pub buckets: Vec<HistogramBucket>,
    /// Percentiles estimated from the buckets
    pub percentiles: PercentilesSnapshot,
}

impl HistogramSnapshot {
    /// Cumulative count of the bucket with upper bound `le`.
    #[must_use]
    pub fn bucket(&self, le: f64) -> Option<u64> {
        self.buckets.iter().find(|b| b.le == le).map(|b| b.count)
    }

    /// Cumulative count of the `+Inf` bucket.
    #[must_use]
    pub fn inf_bucket(&self) -> Option<u64> {
        self.bucket(f64::INFINITY)
    }

    /// Upper bound of the first bucket holding the `q` quantile.
    ///
    /// Falls back to the largest finite bound when the rank lands in `+Inf`.
    #[must_use]
    pub fn estimate_quantile(&self, q: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let rank = q * self.count as f64;
        let largest_finite = self
            .buckets
            .iter()
            .rev()
            .find(|b| b.le.is_finite())
            .map_or(0.0, |b| b.le);
        self.buckets
            .iter()
            .find(|b| b.count as f64 >= rank)
            .map_or(largest_finite, |b| {
                if b.le.is_finite() {
                    b.le
                } else {
                    largest_finite
                }
            })
    }
}

/// A single histogram bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Upper bound of this bucket (inclusive; `+Inf` for the last one)
    pub le: f64,
    /// Cumulative count of observations <= le
    pub count: u64,
}

/// Pre-calculated percentiles for histograms
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PercentilesSnapshot {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// A complete snapshot of all metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Timestamp when the snapshot was taken (Unix millis)
    pub timestamp: u64,
    /// All metric values
    pub metrics: Vec<MetricSnapshot>,
    /// Metrics grouped by control plane area
    pub categories: FleetCategories,
}

/// Metrics organized by control plane area
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetCategories {
    pub membership: MembershipMetrics,
    pub placement: PlacementMetrics,
    pub scheduling: SchedulingMetrics,
    pub applier: ApplierMetrics,
}

/// Join/leave outcomes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MembershipMetrics {
    pub joins: u64,
    pub leaves: u64,
}

/// Placement apply outcomes, summed over placements
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlacementMetrics {
    pub applied: u64,
    pub failed: u64,
}

/// Scheduler activity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulingMetrics {
    /// Completed scheduling cycles
    pub cycles: u64,
    /// Cycles that failed
    pub failed_cycles: u64,
    /// Cycles that asked to be requeued
    pub requeued_cycles: u64,
    /// Scheduling loops running right now
    pub active_workers: u64,
    /// Total time spent in completed cycles
    pub total_cycle_milliseconds: f64,
    /// Average cycle duration
    pub avg_cycle_milliseconds: Option<f64>,
}

/// Work applier activity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplierMetrics {
    /// Work processing requests
    pub work_requests: u64,
    /// Work processing requests whose apply step failed
    pub failed_work_applies: u64,
    /// Manifest processing requests
    pub manifest_requests: u64,
    /// Manifest processing requests that found drift
    pub manifests_with_drift: u64,
    /// Timed work applies
    pub timed_applies: u64,
    /// Average time from work update to apply
    pub avg_apply_seconds: Option<f64>,
}

impl MetricsSnapshot {
    /// Create a new empty snapshot
    #[must_use]
    pub fn new() -> Self {
        Self {
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
            metrics: Vec::new(),
            categories: FleetCategories::default(),
        }
    }

    /// Parse Prometheus text format into a structured snapshot.
    ///
    /// `# TYPE` lines decide how samples are read; histogram `_bucket`, `_sum`
    /// and `_count` samples are folded into one entry per label combination.
    /// Lines that do not parse are skipped.
    #[must_use]
    pub fn from_prometheus_text(text: &str) -> Self {
        let mut snapshot = Self::new();
        let mut types: HashMap<String, MetricType> = HashMap::new();
        let mut descriptions: HashMap<String, String> = HashMap::new();
        let mut histograms: HashMap<(String, BTreeMap<String, String>), usize> = HashMap::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix("# HELP ") {
                if let Some((name, help)) = rest.split_once(' ') {
                    descriptions.insert(name.to_string(), help.to_string());
                }
                continue;
            }
            if let Some(rest) = line.strip_prefix("# TYPE ") {
                if let Some((name, kind)) = rest.split_once(' ') {
                    let metric_type = match kind.trim() {
                        "counter" => MetricType::Counter,
                        "histogram" => MetricType::Histogram,
                        _ => MetricType::Gauge,
                    };
                    types.insert(name.to_string(), metric_type);
                }
                continue;
            }
            if line.starts_with('#') {
                continue;
            }

            let Some(sample) = parse_sample(line) else {
                continue;
            };

            if let Some((base, part)) = histogram_part(&sample.name, &types) {
                let mut labels = sample.labels;
                let le = labels.remove("le");
                let idx = *histograms
                    .entry((base.to_string(), labels.clone()))
                    .or_insert_with(|| {
                        snapshot.metrics.push(MetricSnapshot {
                            name: base.to_string(),
                            metric_type: MetricType::Histogram,
                            labels,
                            value: None,
                            histogram: Some(HistogramSnapshot::default()),
                            description: None,
                        });
                        snapshot.metrics.len() - 1
                    });
                if let Some(histogram) = snapshot.metrics[idx].histogram.as_mut() {
                    match part {
                        HistogramPart::Bucket => {
                            if let Some(le) = le.as_deref().and_then(parse_value) {
                                histogram.buckets.push(HistogramBucket {
                                    le,
                                    count: sample.value as u64,
                                });
                            }
                        },
                        HistogramPart::Sum => histogram.sum = sample.value,
                        HistogramPart::Count => histogram.count = sample.value as u64,
                    }
                }
                continue;
            }

            let metric_type = types
                .get(&sample.name)
                .copied()
                .unwrap_or_else(|| infer_type(&sample.name));
            snapshot.metrics.push(MetricSnapshot {
                name: sample.name,
                metric_type,
                labels: sample.labels,
                value: Some(sample.value),
                histogram: None,
                description: None,
            });
        }

        for metric in &mut snapshot.metrics {
            metric.description = descriptions.get(&metric.name).cloned();
            if let Some(histogram) = metric.histogram.as_mut() {
                histogram.buckets.sort_by(|a, b| a.le.total_cmp(&b.le));
                histogram.percentiles = PercentilesSnapshot {
                    p50: histogram.estimate_quantile(0.50),
                    p90: histogram.estimate_quantile(0.90),
                    p95: histogram.estimate_quantile(0.95),
                    p99: histogram.estimate_quantile(0.99),
                };
            }
        }

        for metric in &snapshot.metrics {
            update_categories(&mut snapshot.categories, metric);
        }
        let scheduling = &mut snapshot.categories.scheduling;
        if scheduling.cycles > 0 {
            scheduling.avg_cycle_milliseconds =
                Some(scheduling.total_cycle_milliseconds / scheduling.cycles as f64);
        }

        snapshot
    }

    /// First metric named `name` carrying every given label pair.
    #[must_use]
    pub fn find(&self, name: &str, labels: &[(&str, &str)]) -> Option<&MetricSnapshot> {
        self.metrics
            .iter()
            .find(|m| m.name == name && m.has_labels(labels))
    }

    /// Value of a counter label combination, `None` if it was never emitted.
    #[must_use]
    pub fn counter_value(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.find(name, labels)
            .filter(|m| m.metric_type == MetricType::Counter)
            .and_then(|m| m.value)
    }

    /// Value of a gauge label combination.
    #[must_use]
    pub fn gauge_value(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.find(name, labels)
            .filter(|m| m.metric_type == MetricType::Gauge)
            .and_then(|m| m.value)
    }

    /// Distribution of a histogram label combination.
    #[must_use]
    pub fn histogram(&self, name: &str, labels: &[(&str, &str)]) -> Option<&HistogramSnapshot> {
        self.find(name, labels).and_then(|m| m.histogram.as_ref())
    }
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

struct Sample {
    name: String,
    labels: BTreeMap<String, String>,
    value: f64,
}

#[derive(Clone, Copy)]
enum HistogramPart {
    Bucket,
    Sum,
    Count,
}

fn histogram_part<'a>(
    name: &'a str,
    types: &HashMap<String, MetricType>,
) -> Option<(&'a str, HistogramPart)> {
    [
        ("_bucket", HistogramPart::Bucket),
        ("_sum", HistogramPart::Sum),
        ("_count", HistogramPart::Count),
    ]
    .into_iter()
    .find_map(|(suffix, part)| {
        let base = name.strip_suffix(suffix)?;
        (types.get(base) == Some(&MetricType::Histogram)).then_some((base, part))
    })
}

/// Fallback for samples without a `# TYPE` line.
fn infer_type(name: &str) -> MetricType {
    if name.ends_with("_total") || name.ends_with("_counter") {
        MetricType::Counter
    } else {
        MetricType::Gauge
    }
}

/// Parse a single sample line.
///
/// Format: `name{label1="value1",label2="value2"} value [timestamp]`
/// or `name value [timestamp]`.
fn parse_sample(line: &str) -> Option<Sample> {
    let (name, labels, rest) = match line.find('{') {
        Some(brace) => {
            let (labels, rest) = parse_labels(&line[brace + 1..])?;
            (&line[..brace], labels, rest)
        },
        None => {
            let (name, rest) = line.split_once(' ')?;
            (name, BTreeMap::new(), rest)
        },
    };
    let value = parse_value(rest.split_whitespace().next()?)?;

    Some(Sample {
        name: name.trim().to_string(),
        labels,
        value,
    })
}

/// Parse `key1="value1",key2="value2"}` up to the closing brace.
///
/// Returns the labels and the remainder after the brace.
fn parse_labels(input: &str) -> Option<(BTreeMap<String, String>, &str)> {
    let mut labels = BTreeMap::new();
    let mut rest = input.trim_start();

    loop {
        if let Some(after) = rest.strip_prefix('}') {
            return Some((labels, after));
        }
        let (key, after_key) = rest.split_once('=')?;
        let after_quote = after_key.strip_prefix('"')?;

        let mut value = String::new();
        let mut chars = after_quote.char_indices();
        let end = loop {
            let (idx, c) = chars.next()?;
            match c {
                '"' => break idx,
                '\\' => match chars.next()?.1 {
                    'n' => value.push('\n'),
                    other => value.push(other),
                },
                c => value.push(c),
            }
        };
        labels.insert(key.trim().to_string(), value);

        rest = after_quote[end + 1..].trim_start();
        if let Some(after_comma) = rest.strip_prefix(',') {
            rest = after_comma.trim_start();
        }
    }
}

fn parse_value(raw: &str) -> Option<f64> {
    match raw {
        "+Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => raw.parse().ok(),
    }
}

/// Update category aggregates based on a metric
fn update_categories(categories: &mut FleetCategories, metric: &MetricSnapshot) {
    let value = metric.value.unwrap_or(0.0) as u64;

    match metric.name.as_str() {
        membership::JOIN_RESULT_COUNTER if metric.label(labels::RESULT) == Some("success") => {
            categories.membership.joins += value;
        },
        membership::LEAVE_RESULT_COUNTER if metric.label(labels::RESULT) == Some("success") => {
            categories.membership.leaves += value;
        },
        placement::APPLY_SUCCEED_COUNTER => categories.placement.applied += value,
        placement::APPLY_FAILED_COUNTER => categories.placement.failed += value,
        scheduling::ACTIVE_WORKERS => categories.scheduling.active_workers = value,
        scheduling::CYCLE_DURATION_MILLISECONDS => {
            if let Some(histogram) = &metric.histogram {
                let scheduling = &mut categories.scheduling;
                scheduling.cycles += histogram.count;
                scheduling.total_cycle_milliseconds += histogram.sum;
                if metric.label(labels::IS_FAILED) == Some("true") {
                    scheduling.failed_cycles += histogram.count;
                }
                if metric.label(labels::NEEDS_REQUEUE) == Some("true") {
                    scheduling.requeued_cycles += histogram.count;
                }
            }
        },
        work::APPLY_TIME_SECONDS => {
            if let Some(histogram) = &metric.histogram {
                let applier = &mut categories.applier;
                let timed = applier.timed_applies + histogram.count;
                if timed > 0 {
                    let previous_sum =
                        applier.avg_apply_seconds.unwrap_or(0.0) * applier.timed_applies as f64;
                    applier.avg_apply_seconds = Some((previous_sum + histogram.sum) / timed as f64);
                }
                applier.timed_applies = timed;
            }
        },
        applier::WORK_PROCESSING_REQUESTS_TOTAL => {
            categories.applier.work_requests += value;
            if metric.label(labels::APPLY_STATUS) == Some("failed") {
                categories.applier.failed_work_applies += value;
            }
        },
        applier::MANIFEST_PROCESSING_REQUESTS_TOTAL => {
            categories.applier.manifest_requests += value;
            if metric.label(labels::DRIFT_DETECTION_STATUS) == Some("found") {
                categories.applier.manifests_with_drift += value;
            }
        },
        _ => {},
    }
}
