//! Recorder construction and configuration.

use {
    crate::{
        definitions::{SeriesKind, SeriesSpec},
        error::{Error, Result},
    },
    metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusRecorder},
    serde::Deserialize,
    tracing::{info, warn},
};

/// Configuration for the metrics catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Whether metrics collection is enabled
    pub enabled: bool,
    /// Labels added to every series at render time (e.g. the member cluster name)
    pub global_labels: Vec<(String, String)>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            global_labels: Vec::new(),
        }
    }
}

/// Build the recorder backing the catalog.
///
/// Buckets are fixed per histogram at this point; the exporter cannot change
/// them once the recorder exists. The recorder is not installed as the global
/// `metrics` recorder, the catalog owns it.
///
/// Returns `None` when metrics are disabled.
///
/// # Errors
///
/// Returns an error if a histogram spec has no buckets, or if a global label
/// key is also a label key of one of the series.
pub fn build_recorder(
    config: &CatalogConfig,
    specs: &[SeriesSpec],
) -> Result<Option<PrometheusRecorder>> {
    if !config.enabled {
        info!("Metrics collection is disabled");
        return Ok(None);
    }

    for (key, _) in &config.global_labels {
        if let Some(spec) = specs.iter().find(|s| s.label_keys.contains(&key.as_str())) {
            warn!(key = %key, series = spec.name, "Global label collides with a series label");
            return Err(Error::GlobalLabelConflict {
                key: key.clone(),
                name: spec.name,
            });
        }
    }

    let mut builder = PrometheusBuilder::new();

    for spec in specs.iter().filter(|s| s.kind == SeriesKind::Histogram) {
        builder =
            builder.set_buckets_for_metric(Matcher::Full(spec.name.to_string()), spec.buckets)?;
    }

    for (key, value) in &config.global_labels {
        builder = builder.add_global_label(key, value);
    }

    Ok(Some(builder.build_recorder()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, crate::definitions::SERIES, metrics_exporter_prometheus::BuildError};

    #[test]
    fn test_build_disabled() {
        let config = CatalogConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(build_recorder(&config, SERIES).unwrap().is_none());
    }

    #[test]
    fn test_build_enabled_renders() {
        let recorder = build_recorder(&CatalogConfig::default(), SERIES)
            .unwrap()
            .unwrap();
        // Nothing registered yet
        assert!(!recorder.handle().render().contains("join_result_counter"));
    }

    #[test]
    fn test_histogram_without_buckets_is_rejected() {
        let spec = SeriesSpec::histogram("empty_histogram", "no buckets", &[], &[]);
        let err = build_recorder(&CatalogConfig::default(), &[spec]).unwrap_err();
        assert!(matches!(
            err,
            Error::Prometheus(BuildError::EmptyBucketsOrQuantiles)
        ));
    }

    #[test]
    fn test_global_label_colliding_with_series_label_is_rejected() {
        let config = CatalogConfig {
            global_labels: vec![("name".to_string(), "hub".to_string())],
            ..Default::default()
        };
        match build_recorder(&config, SERIES).unwrap_err() {
            Error::GlobalLabelConflict { key, name } => {
                assert_eq!(key, "name");
                assert_eq!(name, "work_apply_time_seconds");
            }
            other => panic!("unexpected error: {other}"),
        }

        let config = CatalogConfig {
            global_labels: vec![("result".to_string(), "success".to_string())],
            ..Default::default()
        };
        assert!(matches!(
            build_recorder(&config, SERIES),
            Err(Error::GlobalLabelConflict { .. })
        ));

        // Disabled catalogs never build a recorder, so nothing to collide with
        let config = CatalogConfig {
            enabled: false,
            ..config
        };
        assert!(build_recorder(&config, SERIES).unwrap().is_none());
    }

    #[test]
    fn test_config_defaults_from_toml() {
        let config: CatalogConfig = toml::from_str("").unwrap();
        assert!(config.enabled);
        assert!(config.global_labels.is_empty());

        let config: CatalogConfig = toml::from_str(
            r#"
enabled = false
global_labels = [["cluster", "member-1"]]
"#,
        )
        .unwrap();
        assert!(!config.enabled);
        assert_eq!(config.global_labels, vec![(
            "cluster".to_string(),
            "member-1".to_string()
        )]);
    }
}
