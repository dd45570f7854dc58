//! The fleet metrics catalog.
//!
//! [`MetricsCatalog`] is built once at process start and handed to every
//! component that emits metrics. Cloning it is cheap; all clones emit to the
//! same series.

use {
    crate::{
        definitions::{SERIES, SeriesSpec, applier, membership, placement, scheduling, work},
        error::Result,
        label_values::{
            ManifestProcessingLabels, OperationResult, ResourceName, SchedulingOutcome,
            WorkProcessingLabels,
        },
        recorder::CatalogConfig,
        registry::{CounterVec, GaugeVec, HistogramVec, SeriesRegistry},
        snapshot::MetricsSnapshot,
    },
    metrics::Gauge,
    std::{
        sync::Arc,
        time::{Duration, Instant},
    },
    tracing::info,
};

/// Every series of the fleet control plane.
#[derive(Clone)]
pub struct MetricsCatalog {
    registry: Arc<SeriesRegistry>,
    join_result: CounterVec<OperationResult>,
    leave_result: CounterVec<OperationResult>,
    work_apply_time: HistogramVec<ResourceName>,
    placement_apply_failed: CounterVec<ResourceName>,
    placement_apply_succeeded: CounterVec<ResourceName>,
    scheduling_cycle_duration: HistogramVec<SchedulingOutcome>,
    scheduling_active_workers: GaugeVec<()>,
    work_processing_requests: CounterVec<WorkProcessingLabels>,
    manifest_processing_requests: CounterVec<ManifestProcessingLabels>,
}

impl MetricsCatalog {
    /// Register every series and build the recorder behind them.
    ///
    /// Call once during startup and pass the catalog to the components that
    /// need it.
    ///
    /// # Errors
    ///
    /// Returns an error if the recorder cannot be built. The catalog's own
    /// schema is fixed, so any other error is a bug in its definitions.
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let registry = SeriesRegistry::new(config, SERIES)?;

        let catalog = Self {
            join_result: registry.counter(membership::JOIN_RESULT_COUNTER)?,
            leave_result: registry.counter(membership::LEAVE_RESULT_COUNTER)?,
            work_apply_time: registry.histogram(work::APPLY_TIME_SECONDS)?,
            placement_apply_failed: registry.counter(placement::APPLY_FAILED_COUNTER)?,
            placement_apply_succeeded: registry.counter(placement::APPLY_SUCCEED_COUNTER)?,
            scheduling_cycle_duration: registry
                .histogram(scheduling::CYCLE_DURATION_MILLISECONDS)?,
            scheduling_active_workers: registry.gauge(scheduling::ACTIVE_WORKERS)?,
            work_processing_requests: registry.counter(applier::WORK_PROCESSING_REQUESTS_TOTAL)?,
            manifest_processing_requests: registry
                .counter(applier::MANIFEST_PROCESSING_REQUESTS_TOTAL)?,
            registry: Arc::new(registry),
        };

        // The unlabeled gauge has a single combination, expose it from the start.
        catalog.scheduling_active_workers.set(&(), 0.0);

        info!(
            series = SERIES.len(),
            enabled = catalog.registry.is_enabled(),
            "metrics catalog initialized"
        );
        Ok(catalog)
    }

    /// Record a successful cluster join.
    pub fn report_join_success(&self) {
        // Failures are not reported: the controller retries failed
        // reconciliations and retry exhaustion is alerted on separately.
        self.join_result.increment(&OperationResult::Success);
    }

    /// Record a successful cluster leave.
    pub fn report_leave_success(&self) {
        // Same policy as joins, failures are never counted here.
        self.leave_result.increment(&OperationResult::Success);
    }

    /// `work_apply_time_seconds{name}`
    #[must_use]
    pub fn work_apply_time(&self) -> &HistogramVec<ResourceName> {
        &self.work_apply_time
    }

    /// `placement_apply_failed_counter{name}`
    #[must_use]
    pub fn placement_apply_failed(&self) -> &CounterVec<ResourceName> {
        &self.placement_apply_failed
    }

    /// `placement_apply_succeed_counter{name}`
    #[must_use]
    pub fn placement_apply_succeeded(&self) -> &CounterVec<ResourceName> {
        &self.placement_apply_succeeded
    }

    /// `scheduling_cycle_duration_milliseconds{is_failed, needs_requeue}`
    #[must_use]
    pub fn scheduling_cycle_duration(&self) -> &HistogramVec<SchedulingOutcome> {
        &self.scheduling_cycle_duration
    }

    /// `scheduling_active_workers`
    #[must_use]
    pub fn scheduling_active_workers(&self) -> &GaugeVec<()> {
        &self.scheduling_active_workers
    }

    /// `fleet_work_processing_requests_total{apply_status, availability_status, diff_reporting_status}`
    #[must_use]
    pub fn work_processing_requests(&self) -> &CounterVec<WorkProcessingLabels> {
        &self.work_processing_requests
    }

    /// `fleet_manifest_processing_requests_total{apply_status, availability_status,
    /// diff_reporting_status, drift_detection_status, diff_detection_status}`
    #[must_use]
    pub fn manifest_processing_requests(&self) -> &CounterVec<ManifestProcessingLabels> {
        &self.manifest_processing_requests
    }

    /// Mark a scheduling loop run as active until the guard is dropped.
    #[must_use = "the worker is counted as active only while the guard is alive"]
    pub fn active_scheduling_worker(&self) -> ActiveWorkerGuard {
        let gauge = self.scheduling_active_workers.with(&());
        gauge.increment(1.0);
        ActiveWorkerGuard { gauge }
    }

    /// Start timing one scheduling loop run.
    #[must_use = "the cycle is recorded only when finished"]
    pub fn start_scheduling_cycle(&self) -> SchedulingCycleTimer {
        SchedulingCycleTimer {
            histogram: self.scheduling_cycle_duration.clone(),
            started: Instant::now(),
        }
    }

    /// Schemas of every series in the catalog, in registration order.
    ///
    /// Emission handles are only reachable through the catalog's own methods,
    /// so the membership series stay success-only.
    #[must_use]
    pub fn specs(&self) -> Vec<SeriesSpec> {
        self.registry.specs()
    }

    /// Render every series in Prometheus text format for a scrape endpoint.
    #[must_use]
    pub fn render(&self) -> String {
        self.registry.render()
    }

    /// Structured view of the current values.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot::from_prometheus_text(&self.render())
    }
}

/// Keeps `scheduling_active_workers` incremented while alive.
pub struct ActiveWorkerGuard {
    gauge: Gauge,
}

impl Drop for ActiveWorkerGuard {
    fn drop(&mut self) {
        self.gauge.decrement(1.0);
    }
}

/// Measures one scheduling loop run.
pub struct SchedulingCycleTimer {
    histogram: HistogramVec<SchedulingOutcome>,
    started: Instant,
}

impl SchedulingCycleTimer {
    /// Time since the cycle started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Record the cycle's duration in milliseconds under its outcome.
    pub fn finish(self, outcome: SchedulingOutcome) -> Duration {
        let elapsed = self.elapsed();
        self.histogram.record(&outcome, elapsed.as_secs_f64() * 1000.0);
        elapsed
    }
}
