//! Metrics catalog for the fleet control plane.
//!
//! This crate declares every series the hub and member agents emit (cluster
//! join/leave, placement applies, the scheduler and the work applier) and
//! hands out typed handles for them. Label values come from closed
//! enumerations, so an emission cannot invent a new label combination.
//!
//! Series are recorded through the `metrics` facade into a Prometheus recorder
//! owned by the catalog. Serving the rendered text is left to the caller.
//!
//! # Usage
//!
//! ```rust,ignore
//! use fleet_metrics::{CatalogConfig, MetricsCatalog, SchedulingOutcome};
//!
//! let catalog = MetricsCatalog::new(&CatalogConfig::default())?;
//!
//! catalog.report_join_success();
//!
//! let _worker = catalog.active_scheduling_worker();
//! let cycle = catalog.start_scheduling_cycle();
//! cycle.finish(SchedulingOutcome::new(false, true));
//!
//! let body = catalog.render();
//! ```

mod catalog;
mod definitions;
mod error;
mod label_values;
mod recorder;
mod registry;
mod snapshot;

pub use {
    catalog::{ActiveWorkerGuard, MetricsCatalog, SchedulingCycleTimer},
    definitions::*,
    error::{Error, Result},
    label_values::{
        ApplyStatus, AvailabilityStatus, DetectionStatus, DiffReportingStatus, LabelSet,
        ManifestProcessingLabels, OperationResult, ResourceName, SchedulingOutcome,
        WorkProcessingLabels,
    },
    recorder::{CatalogConfig, build_recorder},
    registry::{CounterVec, GaugeVec, HistogramVec, SeriesRegistry},
    snapshot::{
        ApplierMetrics, FleetCategories, HistogramBucket, HistogramSnapshot, MembershipMetrics,
        MetricSnapshot, MetricType, MetricsSnapshot, PercentilesSnapshot, PlacementMetrics,
        SchedulingMetrics,
    },
};
