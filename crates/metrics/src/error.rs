use crate::definitions::SeriesKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("series {name} is already registered with a different schema")]
    SeriesConflict { name: &'static str },
    #[error("series {name} is not registered")]
    UnknownSeries { name: String },
    #[error("series {name} is a {actual}, not a {expected}")]
    KindMismatch {
        name: &'static str,
        expected: SeriesKind,
        actual: SeriesKind,
    },
    #[error("series {name} has label keys {expected:?}, got {actual:?}")]
    LabelSchemaMismatch {
        name: &'static str,
        expected: &'static [&'static str],
        actual: &'static [&'static str],
    },
    #[error("histogram {name} was registered after its recorder was built")]
    BucketsNotConfigured { name: &'static str },
    #[error("global label {key} collides with a label of series {name}")]
    GlobalLabelConflict { key: String, name: &'static str },
    #[error(transparent)]
    Prometheus(#[from] metrics_exporter_prometheus::BuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
