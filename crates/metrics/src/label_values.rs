//! Typed label combinations.
//!
//! Each label key of the catalog takes its values from a closed enumeration.
//! Emission goes through a [`LabelSet`], so a value outside the documented set
//! or a missing key cannot be expressed. Values are converted to their
//! documented strings only at the recorder boundary.

use {
    crate::definitions::labels,
    metrics::{Label, SharedString},
    std::fmt,
};

mod private {
    pub trait Sealed {}
}

/// A complete label combination for one series.
///
/// Sealed: only the combinations defined in this module can be emitted.
pub trait LabelSet: private::Sealed {
    /// Label keys in the order the series declares them.
    const KEYS: &'static [&'static str];

    /// Labels for this combination, one per entry of [`Self::KEYS`].
    fn to_labels(&self) -> Vec<Label>;
}

impl private::Sealed for () {}

/// Series without labels.
impl LabelSet for () {
    const KEYS: &'static [&'static str] = &[];

    fn to_labels(&self) -> Vec<Label> {
        Vec::new()
    }
}

macro_rules! label_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $value:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every value of the enumeration.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $value),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<$name> for SharedString {
            fn from(value: $name) -> Self {
                SharedString::const_str(value.as_str())
            }
        }
    };
}

label_enum! {
    /// Outcome of a join or leave operation.
    ///
    /// Only `Success` is ever emitted: failed reconciliations are retried by the
    /// controller and alerted on elsewhere, so counting them here would count
    /// them twice.
    OperationResult {
        Success => "success",
        Failure => "failure",
    }
}

label_enum! {
    /// Apply step of a work or manifest processing request.
    ApplyStatus {
        Applied => "applied",
        Failed => "failed",
        Skipped => "skipped",
    }
}

label_enum! {
    /// Availability check of a work or manifest processing request.
    AvailabilityStatus {
        Available => "available",
        Unavailable => "unavailable",
        Skipped => "skipped",
    }
}

label_enum! {
    /// Diff reporting step of a work or manifest processing request.
    DiffReportingStatus {
        Reported => "reported",
        Failed => "failed",
        Skipped => "skipped",
    }
}

label_enum! {
    /// Drift or diff detection result for a manifest.
    DetectionStatus {
        Found => "found",
        NotFound => "not_found",
    }
}

fn bool_value(value: bool) -> SharedString {
    SharedString::const_str(if value { "true" } else { "false" })
}

impl private::Sealed for OperationResult {}

impl LabelSet for OperationResult {
    const KEYS: &'static [&'static str] = &[labels::RESULT];

    fn to_labels(&self) -> Vec<Label> {
        vec![Label::new(labels::RESULT, *self)]
    }
}

/// Name of the work or placement a sample belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceName(String);

impl ResourceName {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ResourceName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl private::Sealed for ResourceName {}

impl LabelSet for ResourceName {
    const KEYS: &'static [&'static str] = &[labels::NAME];

    fn to_labels(&self) -> Vec<Label> {
        vec![Label::new(labels::NAME, self.0.clone())]
    }
}

/// How a scheduling loop run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchedulingOutcome {
    pub is_failed: bool,
    pub needs_requeue: bool,
}

impl SchedulingOutcome {
    /// The four combinations of the outcome flags.
    pub const ALL: [Self; 4] = [
        Self::new(false, false),
        Self::new(false, true),
        Self::new(true, false),
        Self::new(true, true),
    ];

    #[must_use]
    pub const fn new(is_failed: bool, needs_requeue: bool) -> Self {
        Self {
            is_failed,
            needs_requeue,
        }
    }
}

impl private::Sealed for SchedulingOutcome {}

impl LabelSet for SchedulingOutcome {
    const KEYS: &'static [&'static str] = &[labels::IS_FAILED, labels::NEEDS_REQUEUE];

    fn to_labels(&self) -> Vec<Label> {
        vec![
            Label::new(labels::IS_FAILED, bool_value(self.is_failed)),
            Label::new(labels::NEEDS_REQUEUE, bool_value(self.needs_requeue)),
        ]
    }
}

/// Result of one work object processing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkProcessingLabels {
    pub apply: ApplyStatus,
    pub availability: AvailabilityStatus,
    pub diff_reporting: DiffReportingStatus,
}

impl private::Sealed for WorkProcessingLabels {}

impl LabelSet for WorkProcessingLabels {
    const KEYS: &'static [&'static str] = &[
        labels::APPLY_STATUS,
        labels::AVAILABILITY_STATUS,
        labels::DIFF_REPORTING_STATUS,
    ];

    fn to_labels(&self) -> Vec<Label> {
        vec![
            Label::new(labels::APPLY_STATUS, self.apply),
            Label::new(labels::AVAILABILITY_STATUS, self.availability),
            Label::new(labels::DIFF_REPORTING_STATUS, self.diff_reporting),
        ]
    }
}

/// Result of one manifest processing request within a work object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ManifestProcessingLabels {
    pub apply: ApplyStatus,
    pub availability: AvailabilityStatus,
    pub diff_reporting: DiffReportingStatus,
    pub drift_detection: DetectionStatus,
    pub diff_detection: DetectionStatus,
}

impl private::Sealed for ManifestProcessingLabels {}

impl LabelSet for ManifestProcessingLabels {
    const KEYS: &'static [&'static str] = &[
        labels::APPLY_STATUS,
        labels::AVAILABILITY_STATUS,
        labels::DIFF_REPORTING_STATUS,
        labels::DRIFT_DETECTION_STATUS,
        labels::DIFF_DETECTION_STATUS,
    ];

    fn to_labels(&self) -> Vec<Label> {
        vec![
            Label::new(labels::APPLY_STATUS, self.apply),
            Label::new(labels::AVAILABILITY_STATUS, self.availability),
            Label::new(labels::DIFF_REPORTING_STATUS, self.diff_reporting),
            Label::new(labels::DRIFT_DETECTION_STATUS, self.drift_detection),
            Label::new(labels::DIFF_DETECTION_STATUS, self.diff_detection),
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn pairs<L: LabelSet>(set: &L) -> Vec<(String, String)> {
        set.to_labels()
            .iter()
            .map(|l| (l.key().to_string(), l.value().to_string()))
            .collect()
    }

    fn assert_keys_match<L: LabelSet>(set: &L) {
        let keys: Vec<_> = set.to_labels().iter().map(|l| l.key().to_string()).collect();
        assert_eq!(keys, L::KEYS);
    }

    #[test]
    fn enum_values_match_documented_strings() {
        let apply: Vec<_> = ApplyStatus::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(apply, ["applied", "failed", "skipped"]);
        let availability: Vec<_> = AvailabilityStatus::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(availability, ["available", "unavailable", "skipped"]);
        let diff: Vec<_> = DiffReportingStatus::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(diff, ["reported", "failed", "skipped"]);
        let detection: Vec<_> = DetectionStatus::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(detection, ["found", "not_found"]);
        assert_eq!(OperationResult::Failure.to_string(), "failure");
    }

    #[test]
    fn label_sets_emit_declared_keys_in_order() {
        assert_keys_match(&());
        assert_keys_match(&OperationResult::Success);
        assert_keys_match(&ResourceName::new("crp-1"));
        assert_keys_match(&SchedulingOutcome::new(true, false));
        assert_keys_match(&WorkProcessingLabels {
            apply: ApplyStatus::Applied,
            availability: AvailabilityStatus::Available,
            diff_reporting: DiffReportingStatus::Skipped,
        });
        assert_keys_match(&ManifestProcessingLabels {
            apply: ApplyStatus::Failed,
            availability: AvailabilityStatus::Skipped,
            diff_reporting: DiffReportingStatus::Failed,
            drift_detection: DetectionStatus::Found,
            diff_detection: DetectionStatus::NotFound,
        });
    }

    #[test]
    fn scheduling_outcome_serializes_booleans() {
        assert_eq!(pairs(&SchedulingOutcome::new(true, false)), vec![
            ("is_failed".to_string(), "true".to_string()),
            ("needs_requeue".to_string(), "false".to_string()),
        ]);
    }

    #[test]
    fn resource_name_is_passed_through() {
        let name: ResourceName = "work-a".into();
        assert_eq!(name.as_str(), "work-a");
        assert_eq!(pairs(&name), vec![(
            "name".to_string(),
            "work-a".to_string()
        )]);
    }
}
