//! Schema-checked series registration.
//!
//! The `metrics` recorder accepts any key with any labels. [`SeriesRegistry`]
//! sits in front of it: a series name is bound to exactly one [`SeriesSpec`],
//! and emission handles are only handed out for a [`LabelSet`] whose keys match
//! the spec.

use {
    crate::{
        definitions::{SeriesKind, SeriesSpec},
        error::{Error, Result},
        label_values::LabelSet,
        recorder::{CatalogConfig, build_recorder},
    },
    metrics::{
        Counter, Gauge, Histogram, Key, KeyName, Label, Level, Metadata, Recorder, SharedString,
    },
    metrics_exporter_prometheus::PrometheusRecorder,
    std::{
        collections::HashSet,
        marker::PhantomData,
        sync::{Arc, Mutex},
    },
    tracing::{debug, warn},
};

static METADATA: Metadata<'static> =
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

/// Registered series and the recorder they emit to.
pub struct SeriesRegistry {
    recorder: Option<Arc<PrometheusRecorder>>,
    /// Histograms whose buckets were given to the recorder at build time.
    bucketed: HashSet<&'static str>,
    /// Keys the recorder adds to every series.
    global_keys: Vec<String>,
    specs: Mutex<Vec<SeriesSpec>>,
}

fn recorder_global_keys(config: &CatalogConfig) -> Vec<String> {
    if !config.enabled {
        return Vec::new();
    }
    config.global_labels.iter().map(|(k, _)| k.clone()).collect()
}

impl SeriesRegistry {
    /// Build the recorder and register `specs` in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the recorder cannot be built or two specs share a
    /// name with different schemas.
    pub fn new(config: &CatalogConfig, specs: &[SeriesSpec]) -> Result<Self> {
        let recorder = build_recorder(config, specs)?.map(Arc::new);
        let registry = Self {
            recorder,
            bucketed: specs
                .iter()
                .filter(|s| s.kind == SeriesKind::Histogram)
                .map(|s| s.name)
                .collect(),
            global_keys: recorder_global_keys(config),
            specs: Mutex::new(Vec::with_capacity(specs.len())),
        };
        for spec in specs {
            registry.register(*spec)?;
        }
        Ok(registry)
    }

    /// Register a series.
    ///
    /// Registering a spec identical to an existing one is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SeriesConflict`] if the name is taken by a different
    /// schema, [`Error::BucketsNotConfigured`] for a histogram the recorder
    /// was not built with, and [`Error::GlobalLabelConflict`] if one of the
    /// spec's label keys is already added globally.
    pub fn register(&self, spec: SeriesSpec) -> Result<()> {
        let mut specs = self.specs.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = specs.iter().find(|s| s.name == spec.name) {
            if *existing == spec {
                debug!(series = spec.name, "series already registered");
                return Ok(());
            }
            warn!(
                series = spec.name,
                kind = %spec.kind,
                "rejecting registration that conflicts with an existing series"
            );
            return Err(Error::SeriesConflict { name: spec.name });
        }

        if spec.kind == SeriesKind::Histogram && !self.bucketed.contains(spec.name) {
            return Err(Error::BucketsNotConfigured { name: spec.name });
        }

        if let Some(key) = self
            .global_keys
            .iter()
            .find(|k| spec.label_keys.contains(&k.as_str()))
        {
            return Err(Error::GlobalLabelConflict {
                key: key.clone(),
                name: spec.name,
            });
        }

        if let Some(recorder) = &self.recorder {
            let key = KeyName::from_const_str(spec.name);
            let help = SharedString::const_str(spec.help);
            match spec.kind {
                SeriesKind::Counter => recorder.describe_counter(key, None, help),
                SeriesKind::Gauge => recorder.describe_gauge(key, None, help),
                SeriesKind::Histogram => recorder.describe_histogram(key, None, help),
            }
        }

        debug!(series = spec.name, kind = %spec.kind, labels = ?spec.label_keys, "registered series");
        specs.push(spec);
        Ok(())
    }

    /// The spec registered under `name`.
    #[must_use]
    pub fn spec(&self, name: &str) -> Option<SeriesSpec> {
        self.specs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|s| s.name == name)
            .copied()
    }

    /// All registered specs, in registration order.
    #[must_use]
    pub fn specs(&self) -> Vec<SeriesSpec> {
        self.specs.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.recorder.is_some()
    }

    /// Handle for a registered counter.
    ///
    /// # Errors
    ///
    /// Returns an error if the series is unknown, not a counter, or declares
    /// other label keys than `L`.
    pub fn counter<L: LabelSet>(&self, name: &str) -> Result<CounterVec<L>> {
        let spec = self.checked_spec::<L>(name, SeriesKind::Counter)?;
        Ok(CounterVec {
            series: self.series(spec),
            _labels: PhantomData,
        })
    }

    /// Handle for a registered gauge.
    ///
    /// # Errors
    ///
    /// See [`SeriesRegistry::counter`].
    pub fn gauge<L: LabelSet>(&self, name: &str) -> Result<GaugeVec<L>> {
        let spec = self.checked_spec::<L>(name, SeriesKind::Gauge)?;
        Ok(GaugeVec {
            series: self.series(spec),
            _labels: PhantomData,
        })
    }

    /// Handle for a registered histogram.
    ///
    /// # Errors
    ///
    /// See [`SeriesRegistry::counter`].
    pub fn histogram<L: LabelSet>(&self, name: &str) -> Result<HistogramVec<L>> {
        let spec = self.checked_spec::<L>(name, SeriesKind::Histogram)?;
        Ok(HistogramVec {
            series: self.series(spec),
            _labels: PhantomData,
        })
    }

    /// Render all series in Prometheus text format.
    ///
    /// Returns an empty string when metrics are disabled.
    #[must_use]
    pub fn render(&self) -> String {
        self.recorder
            .as_ref()
            .map(|r| r.handle().render())
            .unwrap_or_default()
    }

    fn checked_spec<L: LabelSet>(&self, name: &str, kind: SeriesKind) -> Result<SeriesSpec> {
        let spec = self.spec(name).ok_or_else(|| Error::UnknownSeries {
            name: name.to_string(),
        })?;
        if spec.kind != kind {
            return Err(Error::KindMismatch {
                name: spec.name,
                expected: kind,
                actual: spec.kind,
            });
        }
        if spec.label_keys != L::KEYS {
            return Err(Error::LabelSchemaMismatch {
                name: spec.name,
                expected: spec.label_keys,
                actual: L::KEYS,
            });
        }
        Ok(spec)
    }

    fn series(&self, spec: SeriesSpec) -> Series {
        Series {
            name: spec.name,
            recorder: self.recorder.clone(),
        }
    }
}

#[derive(Clone)]
struct Series {
    name: &'static str,
    recorder: Option<Arc<PrometheusRecorder>>,
}

impl Series {
    fn key<L: LabelSet>(&self, labels: &L) -> Key {
        let labels = labels.to_labels();
        debug_assert!(
            labels.iter().map(Label::key).eq(L::KEYS.iter().copied()),
            "labels emitted for {} do not match its declared keys",
            self.name
        );
        Key::from_parts(KeyName::from_const_str(self.name), labels)
    }
}

/// Counter series, one value per label combination `L`.
pub struct CounterVec<L> {
    series: Series,
    _labels: PhantomData<fn(&L)>,
}

impl<L: LabelSet> CounterVec<L> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.series.name
    }

    /// The counter for one label combination.
    #[must_use]
    pub fn with(&self, labels: &L) -> Counter {
        match &self.series.recorder {
            Some(recorder) => recorder.register_counter(&self.series.key(labels), &METADATA),
            None => Counter::noop(),
        }
    }

    pub fn increment(&self, labels: &L) {
        self.increment_by(labels, 1);
    }

    pub fn increment_by(&self, labels: &L, delta: u64) {
        self.with(labels).increment(delta);
    }
}

impl<L> Clone for CounterVec<L> {
    fn clone(&self) -> Self {
        Self {
            series: self.series.clone(),
            _labels: PhantomData,
        }
    }
}

/// Gauge series, one value per label combination `L`.
pub struct GaugeVec<L> {
    series: Series,
    _labels: PhantomData<fn(&L)>,
}

impl<L: LabelSet> GaugeVec<L> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.series.name
    }

    /// The gauge for one label combination.
    #[must_use]
    pub fn with(&self, labels: &L) -> Gauge {
        match &self.series.recorder {
            Some(recorder) => recorder.register_gauge(&self.series.key(labels), &METADATA),
            None => Gauge::noop(),
        }
    }

    pub fn set(&self, labels: &L, value: f64) {
        self.with(labels).set(value);
    }

    pub fn increment(&self, labels: &L, delta: f64) {
        self.with(labels).increment(delta);
    }

    pub fn decrement(&self, labels: &L, delta: f64) {
        self.with(labels).decrement(delta);
    }
}

impl<L> Clone for GaugeVec<L> {
    fn clone(&self) -> Self {
        Self {
            series: self.series.clone(),
            _labels: PhantomData,
        }
    }
}

/// Histogram series, one distribution per label combination `L`.
pub struct HistogramVec<L> {
    series: Series,
    _labels: PhantomData<fn(&L)>,
}

impl<L: LabelSet> HistogramVec<L> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.series.name
    }

    /// The histogram for one label combination.
    #[must_use]
    pub fn with(&self, labels: &L) -> Histogram {
        match &self.series.recorder {
            Some(recorder) => recorder.register_histogram(&self.series.key(labels), &METADATA),
            None => Histogram::noop(),
        }
    }

    pub fn record(&self, labels: &L, value: f64) {
        self.with(labels).record(value);
    }
}

impl<L> Clone for HistogramVec<L> {
    fn clone(&self) -> Self {
        Self {
            series: self.series.clone(),
            _labels: PhantomData,
        }
    }
}
