#![allow(clippy::unwrap_used, clippy::expect_used)]
use {
    fleet_metrics::{
        ApplyStatus, AvailabilityStatus, CatalogConfig, DetectionStatus, DiffReportingStatus,
        Error, ManifestProcessingLabels, MetricsCatalog, OperationResult, SERIES,
        SchedulingOutcome, SeriesRegistry, SeriesSpec, WorkProcessingLabels, applier, buckets,
        membership, placement, scheduling, work,
    },
    std::{sync::Arc, thread},
};

fn catalog() -> MetricsCatalog {
    MetricsCatalog::new(&CatalogConfig::default()).unwrap()
}

fn outcome_labels(outcome: SchedulingOutcome) -> [(&'static str, &'static str); 2] {
    let flag = |b: bool| if b { "true" } else { "false" };
    [
        ("is_failed", flag(outcome.is_failed)),
        ("needs_requeue", flag(outcome.needs_requeue)),
    ]
}

#[test]
fn join_success_reads_back_one_then_two() {
    let catalog = catalog();

    catalog.report_join_success();
    let snapshot = catalog.snapshot();
    assert_eq!(
        snapshot.counter_value(membership::JOIN_RESULT_COUNTER, &[("result", "success")]),
        Some(1.0)
    );

    catalog.report_join_success();
    let snapshot = catalog.snapshot();
    assert_eq!(
        snapshot.counter_value(membership::JOIN_RESULT_COUNTER, &[("result", "success")]),
        Some(2.0)
    );
    assert_eq!(
        snapshot
            .counter_value(membership::JOIN_RESULT_COUNTER, &[("result", "failure")])
            .unwrap_or(0.0),
        0.0
    );
    assert_eq!(snapshot.categories.membership.joins, 2);
}

#[test]
fn success_wrappers_touch_only_their_own_series() {
    let catalog = catalog();

    catalog.report_leave_success();
    let snapshot = catalog.snapshot();
    assert_eq!(
        snapshot.counter_value(membership::LEAVE_RESULT_COUNTER, &[("result", "success")]),
        Some(1.0)
    );
    assert!(
        snapshot
            .counter_value(membership::JOIN_RESULT_COUNTER, &[("result", "success")])
            .unwrap_or(0.0)
            == 0.0
    );
    for result in OperationResult::ALL {
        if *result != OperationResult::Success {
            assert!(
                snapshot
                    .find(membership::LEAVE_RESULT_COUNTER, &[("result", result.as_str())])
                    .is_none()
            );
        }
    }
}

#[test]
fn work_apply_time_buckets_are_cumulative() {
    let catalog = catalog();
    let name = "work-nginx".into();
    let samples = [0.005, 0.3, 0.3, 1.6, 45.0, 500.0];
    for sample in samples {
        catalog.work_apply_time().record(&name, sample);
    }
    catalog.work_apply_time().record(&"work-other".into(), 2.0);

    let snapshot = catalog.snapshot();
    let histogram = snapshot
        .histogram(work::APPLY_TIME_SECONDS, &[("name", "work-nginx")])
        .unwrap();

    assert_eq!(histogram.count, samples.len() as u64);
    assert_eq!(histogram.inf_bucket(), Some(samples.len() as u64));
    assert_eq!(histogram.buckets.len(), buckets::WORK_APPLY_TIME.len() + 1);
    for boundary in buckets::WORK_APPLY_TIME {
        let expected = samples.iter().filter(|v| **v <= *boundary).count() as u64;
        assert_eq!(histogram.bucket(*boundary), Some(expected), "le={boundary}");
    }
    assert!(histogram.buckets.windows(2).all(|w| w[0].count <= w[1].count));

    let other = snapshot
        .histogram(work::APPLY_TIME_SECONDS, &[("name", "work-other")])
        .unwrap();
    assert_eq!(other.count, 1);
    assert_eq!(other.inf_bucket(), Some(1));
}

#[test]
fn scheduling_outcomes_accumulate_independently() {
    let catalog = catalog();
    let failed = SchedulingOutcome::new(true, false);
    catalog.scheduling_cycle_duration().record(&failed, 75.0);
    catalog.scheduling_cycle_duration().record(&failed, 7000.0);
    catalog
        .scheduling_cycle_duration()
        .record(&SchedulingOutcome::new(false, false), 5.0);

    let snapshot = catalog.snapshot();
    let failed_histogram = snapshot
        .histogram(
            scheduling::CYCLE_DURATION_MILLISECONDS,
            &outcome_labels(failed),
        )
        .unwrap();
    assert_eq!(failed_histogram.count, 2);
    assert_eq!(failed_histogram.bucket(50.0), Some(0));
    assert_eq!(failed_histogram.bucket(100.0), Some(1));
    assert_eq!(failed_histogram.bucket(10000.0), Some(2));

    let ok_histogram = snapshot
        .histogram(
            scheduling::CYCLE_DURATION_MILLISECONDS,
            &outcome_labels(SchedulingOutcome::new(false, false)),
        )
        .unwrap();
    assert_eq!(ok_histogram.count, 1);
    assert_eq!(ok_histogram.bucket(10.0), Some(1));

    for outcome in [
        SchedulingOutcome::new(false, true),
        SchedulingOutcome::new(true, true),
    ] {
        let untouched = snapshot
            .histogram(
                scheduling::CYCLE_DURATION_MILLISECONDS,
                &outcome_labels(outcome),
            )
            .map_or(0, |h| h.count);
        assert_eq!(untouched, 0);
    }
    assert_eq!(SchedulingOutcome::ALL.len(), 4);
}

#[test]
fn placement_counters_are_per_name() {
    let catalog = catalog();
    catalog.placement_apply_succeeded().increment(&"crp-a".into());
    catalog.placement_apply_succeeded().increment_by(&"crp-b".into(), 3);
    catalog.placement_apply_failed().increment(&"crp-a".into());

    let snapshot = catalog.snapshot();
    assert_eq!(
        snapshot.counter_value(placement::APPLY_SUCCEED_COUNTER, &[("name", "crp-b")]),
        Some(3.0)
    );
    assert_eq!(
        snapshot.counter_value(placement::APPLY_FAILED_COUNTER, &[("name", "crp-a")]),
        Some(1.0)
    );
    assert_eq!(snapshot.categories.placement.applied, 4);
    assert_eq!(snapshot.categories.placement.failed, 1);
}

#[test]
fn work_and_manifest_processing_use_documented_values() {
    let catalog = catalog();
    catalog.work_processing_requests().increment(&WorkProcessingLabels {
        apply: ApplyStatus::Failed,
        availability: AvailabilityStatus::Skipped,
        diff_reporting: DiffReportingStatus::Skipped,
    });
    catalog
        .manifest_processing_requests()
        .increment(&ManifestProcessingLabels {
            apply: ApplyStatus::Applied,
            availability: AvailabilityStatus::Unavailable,
            diff_reporting: DiffReportingStatus::Reported,
            drift_detection: DetectionStatus::NotFound,
            diff_detection: DetectionStatus::Found,
        });

    let snapshot = catalog.snapshot();
    assert_eq!(
        snapshot.counter_value(applier::WORK_PROCESSING_REQUESTS_TOTAL, &[
            ("apply_status", "failed"),
            ("availability_status", "skipped"),
            ("diff_reporting_status", "skipped"),
        ]),
        Some(1.0)
    );
    assert_eq!(
        snapshot.counter_value(applier::MANIFEST_PROCESSING_REQUESTS_TOTAL, &[
            ("apply_status", "applied"),
            ("availability_status", "unavailable"),
            ("diff_reporting_status", "reported"),
            ("drift_detection_status", "not_found"),
            ("diff_detection_status", "found"),
        ]),
        Some(1.0)
    );
    assert_eq!(snapshot.categories.applier.failed_work_applies, 1);
    assert_eq!(snapshot.categories.applier.manifests_with_drift, 0);
}

#[test]
fn every_series_is_registered_once_with_its_help() {
    let catalog = catalog();
    assert_eq!(catalog.specs(), SERIES.to_vec());

    let registry = SeriesRegistry::new(&CatalogConfig::default(), SERIES).unwrap();
    for spec in SERIES {
        registry.register(*spec).unwrap();
    }
    assert_eq!(registry.specs().len(), SERIES.len());

    let divergent = SeriesSpec::histogram(
        work::APPLY_TIME_SECONDS,
        "Length of time between when a work resource is created/updated to when it is applied on the member cluster",
        &["name"],
        &[1.0, 10.0],
    );
    assert!(matches!(
        registry.register(divergent),
        Err(Error::SeriesConflict { .. })
    ));
    assert_eq!(
        registry.spec(work::APPLY_TIME_SECONDS).unwrap().buckets,
        buckets::WORK_APPLY_TIME
    );
}

#[test]
fn membership_series_only_carry_success() {
    let catalog = catalog();
    for _ in 0..3 {
        catalog.report_join_success();
        catalog.report_leave_success();
    }

    let snapshot = catalog.snapshot();
    for name in [
        membership::JOIN_RESULT_COUNTER,
        membership::LEAVE_RESULT_COUNTER,
    ] {
        let emitted: Vec<_> = snapshot
            .metrics
            .iter()
            .filter(|m| m.name == name)
            .collect();
        assert_eq!(emitted.len(), 1, "{name}");
        assert_eq!(emitted[0].labels.len(), 1);
        assert_eq!(
            emitted[0].labels.get("result").map(String::as_str),
            Some("success")
        );
        assert_eq!(emitted[0].value, Some(3.0));
    }
}

#[test]
fn global_labels_are_attached() {
    let catalog = MetricsCatalog::new(&CatalogConfig {
        enabled: true,
        global_labels: vec![("cluster".to_string(), "member-1".to_string())],
    })
    .unwrap();
    catalog.report_join_success();
    assert_eq!(
        catalog.snapshot().counter_value(membership::JOIN_RESULT_COUNTER, &[
            ("result", "success"),
            ("cluster", "member-1"),
        ]),
        Some(1.0)
    );
}

#[test]
fn global_label_shadowing_a_series_label_is_rejected() {
    let result = MetricsCatalog::new(&CatalogConfig {
        enabled: true,
        global_labels: vec![("result".to_string(), "failure".to_string())],
    });
    assert!(matches!(result, Err(Error::GlobalLabelConflict { .. })));
}

#[test]
fn concurrent_thread_increments_are_not_lost() {
    const THREADS: usize = 16;
    const PER_THREAD: usize = 250;

    let catalog = Arc::new(catalog());
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let catalog = Arc::clone(&catalog);
            thread::spawn(move || {
                for _ in 0..PER_THREAD {
                    catalog.report_join_success();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        catalog
            .snapshot()
            .counter_value(membership::JOIN_RESULT_COUNTER, &[("result", "success")]),
        Some((THREADS * PER_THREAD) as f64)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_task_increments_are_not_lost() {
    const TASKS: usize = 2000;

    let catalog = catalog();
    let labels = WorkProcessingLabels {
        apply: ApplyStatus::Applied,
        availability: AvailabilityStatus::Available,
        diff_reporting: DiffReportingStatus::Reported,
    };

    let tasks: Vec<_> = (0..TASKS)
        .map(|_| {
            let catalog = catalog.clone();
            tokio::spawn(async move {
                let _worker = catalog.active_scheduling_worker();
                catalog.work_processing_requests().increment(&labels);
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let snapshot = catalog.snapshot();
    assert_eq!(
        snapshot.counter_value(applier::WORK_PROCESSING_REQUESTS_TOTAL, &[
            ("apply_status", "applied"),
            ("availability_status", "available"),
            ("diff_reporting_status", "reported"),
        ]),
        Some(TASKS as f64)
    );
    assert_eq!(snapshot.categories.applier.work_requests, TASKS as u64);
    assert_eq!(
        snapshot.gauge_value(scheduling::ACTIVE_WORKERS, &[]),
        Some(0.0)
    );
}
