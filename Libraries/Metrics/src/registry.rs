use once_cell::sync::OnceCell;
use prometheus::{Gauge, IntGauge, Opts, Registry};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use sysinfo::System;
use tracing::{debug, instrument};

use crate::error::MetricsError;
use crate::pipeline::PipelineGauges;

/// Process-wide `Metrics` instance, installed once by the binary.
static METRICS: OnceCell<Metrics> = OnceCell::new();

/// CPU and memory gauges, the segment pipeline gauges and any custom gauges,
/// all registered in one Prometheus registry.
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    common_labels: Arc<Vec<(String, String)>>,
    cpu_usage: Gauge,
    memory_usage: Gauge,
    pipeline: PipelineGauges,
    custom_gauges: Arc<Mutex<HashMap<String, IntGauge>>>,
    system: Arc<Mutex<System>>,
}

#[derive(Debug, Default)]
pub struct MetricsBuilder {
    common_labels: Vec<(String, String)>,
    custom_gauges: Vec<(String, String)>,
}

impl MetricsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a common label to be applied to all metrics.
    pub fn add_label(mut self, key: &str, value: &str) -> Self {
        self.common_labels.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a gauge by name and description.
    pub fn add_gauge(mut self, name: &str, description: &str) -> Self {
        self.custom_gauges
            .push((name.to_string(), description.to_string()));
        self
    }

    #[instrument(skip_all)]
    pub fn build(self) -> Result<Metrics, MetricsError> {
        let registry = Registry::new();
        let labels = &self.common_labels;

        let cpu_usage = Gauge::with_opts(opts_with_labels("cpu_usage", "CPU usage percentage", labels))?;
        let memory_usage = Gauge::with_opts(opts_with_labels("memory_usage", "Memory usage in bytes", labels))?;
        registry.register(Box::new(cpu_usage.clone()))?;
        registry.register(Box::new(memory_usage.clone()))?;

        let pipeline = PipelineGauges::register(&registry, labels)?;

        let mut custom_gauges = HashMap::new();
        for (name, description) in &self.custom_gauges {
            let gauge = IntGauge::with_opts(opts_with_labels(name, description, labels))?;
            registry.register(Box::new(gauge.clone()))?;
            custom_gauges.insert(name.clone(), gauge);
        }

        debug!("Metrics successfully built");

        Ok(Metrics {
            registry,
            common_labels: Arc::new(self.common_labels),
            cpu_usage,
            memory_usage,
            pipeline,
            custom_gauges: Arc::new(Mutex::new(custom_gauges)),
            system: Arc::new(Mutex::new(System::new())),
        })
    }
}

/// Install `metrics` as the process-wide instance returned by [`get_metrics`].
pub fn install_global(metrics: Metrics) -> Result<(), MetricsError> {
    METRICS
        .set(metrics)
        .map_err(|_| MetricsError::AlreadyInitialized)
}

/// The process-wide instance, if one was installed.
pub fn get_metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

impl Metrics {
    /// Refresh the CPU and memory gauges.
    #[instrument(skip_all)]
    pub fn update(&self) -> Result<(), MetricsError> {
        let mut sys = self.system.lock().map_err(|_| MetricsError::LockPoisoned)?;
        sys.refresh_all();

        self.cpu_usage.set(sys.global_cpu_usage() as f64);
        self.memory_usage.set(sys.used_memory() as f64);
        Ok(())
    }

    pub fn pipeline(&self) -> &PipelineGauges {
        &self.pipeline
    }

    /// Add or get a custom gauge by name.
    pub fn get_or_create_gauge(&self, name: &str, description: &str) -> Result<IntGauge, MetricsError> {
        let mut gauges = self
            .custom_gauges
            .lock()
            .map_err(|_| MetricsError::LockPoisoned)?;
        if let Some(gauge) = gauges.get(name) {
            return Ok(gauge.clone());
        }

        let gauge = IntGauge::with_opts(opts_with_labels(name, description, &self.common_labels))?;
        self.registry.register(Box::new(gauge.clone()))?;
        gauges.insert(name.to_string(), gauge.clone());
        Ok(gauge)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Helper to create metric options with labels.
pub(crate) fn opts_with_labels(name: &str, help: &str, labels: &[(String, String)]) -> Opts {
    let mut opts = Opts::new(name, help);
    for (key, value) in labels {
        opts = opts.const_label(key.clone(), value.clone());
    }
    opts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_gauges_are_shared_by_name() {
        let metrics = MetricsBuilder::new()
            .add_label("mode", "test")
            .add_gauge("active_sessions", "Running sessions")
            .build()
            .unwrap();

        let first = metrics.get_or_create_gauge("active_sessions", "ignored").unwrap();
        first.set(3);
        let second = metrics.get_or_create_gauge("active_sessions", "ignored").unwrap();
        assert_eq!(second.get(), 3);

        let created = metrics.get_or_create_gauge("late_gauge", "Created after build").unwrap();
        created.inc();
        let names: Vec<_> = metrics
            .registry()
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"late_gauge".to_string()));
        assert!(names.contains(&"segments_published_video".to_string()));
    }

    #[test]
    fn duplicate_custom_gauge_is_an_error() {
        let result = MetricsBuilder::new()
            .add_gauge("cpu_usage", "Clashes with the built-in gauge")
            .build();
        assert!(matches!(result, Err(MetricsError::Prometheus(_))));
    }
}
