//! Metric name, label and bucket definitions.
//!
//! Every series the fleet control plane emits is declared here. Centralizing the
//! definitions keeps names, label schemas and buckets in one place and makes it
//! easy to see what a scrape of a member agent or hub controller will contain.

use std::fmt;

/// Cluster membership metrics
pub mod membership {
    /// Successful join operations (labels: result)
    pub const JOIN_RESULT_COUNTER: &str = "join_result_counter";
    /// Successful leave operations (labels: result)
    pub const LEAVE_RESULT_COUNTER: &str = "leave_result_counter";
}

/// Work applier latency metrics
pub mod work {
    /// Seconds between a work being created/updated and applied on the member cluster
    pub const APPLY_TIME_SECONDS: &str = "work_apply_time_seconds";
}

/// Resource placement metrics
pub mod placement {
    /// Failed applies of a cluster resource placement (labels: name)
    pub const APPLY_FAILED_COUNTER: &str = "placement_apply_failed_counter";
    /// Successful applies of a cluster resource placement (labels: name)
    pub const APPLY_SUCCEED_COUNTER: &str = "placement_apply_succeed_counter";
}

/// Scheduler metrics
pub mod scheduling {
    /// Duration of one scheduling loop run in milliseconds
    pub const CYCLE_DURATION_MILLISECONDS: &str = "scheduling_cycle_duration_milliseconds";
    /// Number of scheduling loop runs currently in progress
    pub const ACTIVE_WORKERS: &str = "scheduling_active_workers";
}

/// Work applier processing metrics
pub mod applier {
    /// Processing requests of work objects, including retries and periodic checks
    pub const WORK_PROCESSING_REQUESTS_TOTAL: &str = "fleet_work_processing_requests_total";
    /// Processing requests of manifest objects, including retries and periodic checks
    pub const MANIFEST_PROCESSING_REQUESTS_TOTAL: &str = "fleet_manifest_processing_requests_total";
}

/// Label keys used across the catalog
pub mod labels {
    pub const RESULT: &str = "result";
    pub const NAME: &str = "name";
    pub const IS_FAILED: &str = "is_failed";
    pub const NEEDS_REQUEUE: &str = "needs_requeue";
    pub const APPLY_STATUS: &str = "apply_status";
    pub const AVAILABILITY_STATUS: &str = "availability_status";
    pub const DIFF_REPORTING_STATUS: &str = "diff_reporting_status";
    pub const DRIFT_DETECTION_STATUS: &str = "drift_detection_status";
    pub const DIFF_DETECTION_STATUS: &str = "diff_detection_status";
}

/// Histogram buckets
pub mod buckets {
    /// Work apply latency buckets (in seconds)
    /// Fine below one second, coarse up to two minutes
    pub const WORK_APPLY_TIME: &[f64] = &[
        0.01, 0.025, 0.05, 0.1, 0.15, 0.2, 0.25, 0.3, 0.4, 0.5, 0.7, 0.9, 1.0, 1.25, 1.5, 1.75,
        2.0, 2.5, 3.0, 3.5, 4.0, 4.5, 5.0, 7.0, 9.0, 10.0, 15.0, 20.0, 30.0, 60.0, 120.0,
    ];

    /// Scheduling cycle duration buckets (in milliseconds)
    pub const SCHEDULING_CYCLE: &[f64] = &[
        10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0, 50000.0,
    ];
}

/// Kind of a metric series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesKind {
    Counter,
    Gauge,
    Histogram,
}

impl SeriesKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema of one series: everything fixed at creation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesSpec {
    pub name: &'static str,
    pub kind: SeriesKind,
    pub help: &'static str,
    /// Ordered label keys. Emissions must supply exactly these keys.
    pub label_keys: &'static [&'static str],
    /// Ascending bucket boundaries, empty unless `kind` is a histogram.
    pub buckets: &'static [f64],
}

impl SeriesSpec {
    #[must_use]
    pub const fn counter(
        name: &'static str,
        help: &'static str,
        label_keys: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            kind: SeriesKind::Counter,
            help,
            label_keys,
            buckets: &[],
        }
    }

    #[must_use]
    pub const fn gauge(
        name: &'static str,
        help: &'static str,
        label_keys: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            kind: SeriesKind::Gauge,
            help,
            label_keys,
            buckets: &[],
        }
    }

    #[must_use]
    pub const fn histogram(
        name: &'static str,
        help: &'static str,
        label_keys: &'static [&'static str],
        buckets: &'static [f64],
    ) -> Self {
        Self {
            name,
            kind: SeriesKind::Histogram,
            help,
            label_keys,
            buckets,
        }
    }
}

/// Every series in the catalog, in registration order.
pub const SERIES: &[SeriesSpec] = &[
    SeriesSpec::counter(
        membership::JOIN_RESULT_COUNTER,
        "Number of successful Join operations",
        &[labels::RESULT],
    ),
    SeriesSpec::counter(
        membership::LEAVE_RESULT_COUNTER,
        "Number of successful Leave operations",
        &[labels::RESULT],
    ),
    SeriesSpec::histogram(
        work::APPLY_TIME_SECONDS,
        "Length of time between when a work resource is created/updated to when it is applied on the member cluster",
        &[labels::NAME],
        buckets::WORK_APPLY_TIME,
    ),
    SeriesSpec::counter(
        placement::APPLY_FAILED_COUNTER,
        "Number of failed to apply cluster resource placement",
        &[labels::NAME],
    ),
    SeriesSpec::counter(
        placement::APPLY_SUCCEED_COUNTER,
        "Number of successfully applied cluster resource placement",
        &[labels::NAME],
    ),
    SeriesSpec::histogram(
        scheduling::CYCLE_DURATION_MILLISECONDS,
        "The duration of a scheduling cycle run in milliseconds",
        &[labels::IS_FAILED, labels::NEEDS_REQUEUE],
        buckets::SCHEDULING_CYCLE,
    ),
    SeriesSpec::gauge(
        scheduling::ACTIVE_WORKERS,
        "Number of currently running scheduling loop",
        &[],
    ),
    SeriesSpec::counter(
        applier::WORK_PROCESSING_REQUESTS_TOTAL,
        "Total number of processing requests of work objects, including retries and periodic checks",
        &[
            labels::APPLY_STATUS,
            labels::AVAILABILITY_STATUS,
            labels::DIFF_REPORTING_STATUS,
        ],
    ),
    SeriesSpec::counter(
        applier::MANIFEST_PROCESSING_REQUESTS_TOTAL,
        "Total number of processing requests of manifest objects, including retries and periodic checks",
        &[
            labels::APPLY_STATUS,
            labels::AVAILABILITY_STATUS,
            labels::DIFF_REPORTING_STATUS,
            labels::DRIFT_DETECTION_STATUS,
            labels::DIFF_DETECTION_STATUS,
        ],
    ),
];
