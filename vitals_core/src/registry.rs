use crate::{
    definition::MetricDefinition,
    error::{Result, VitalsError},
    series::{SeriesHandle, TimeSeries, DEFAULT_MAX_POINTS},
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created,
    Unchanged,
}

#[derive(Debug, Clone)]
struct RegisteredMetric {
    definition: Arc<MetricDefinition>,
    series: SeriesHandle,
}

/// Owns every metric definition and the series allocated for it.
pub struct MetricRegistry {
    metrics: Arc<RwLock<HashMap<String, RegisteredMetric>>>,
    max_points: usize,
}

impl MetricRegistry {
    pub fn new(max_points: usize) -> Self {
        Self {
            metrics: Arc::new(RwLock::new(HashMap::new())),
            max_points,
        }
    }

    pub async fn register(&self, definition: MetricDefinition) -> Result<Registration> {
        definition.validate()?;

        let mut metrics = self.metrics.write().await;
        if let Some(existing) = metrics.get(&definition.name) {
            if !existing.definition.same_shape(&definition) {
                return Err(VitalsError::DuplicateName(definition.name));
            }
            if *existing.definition != definition {
                warn!(
                    "Metric '{}' re-registered with different metadata; keeping the original",
                    definition.name
                );
            }
            return Ok(Registration::Unchanged);
        }

        info!(
            "Registered {} metric '{}' ({} labels)",
            definition.kind,
            definition.name,
            definition.label_names.len()
        );

        let name = definition.name.clone();
        metrics.insert(
            name,
            RegisteredMetric {
                definition: Arc::new(definition),
                series: Arc::new(Mutex::new(TimeSeries::new(self.max_points))),
            },
        );

        Ok(Registration::Created)
    }

    pub async fn lookup(&self, name: &str) -> Result<Arc<MetricDefinition>> {
        self.metrics
            .read()
            .await
            .get(name)
            .map(|m| m.definition.clone())
            .ok_or_else(|| VitalsError::MetricNotFound(name.to_string()))
    }

    /// Definition and series for a metric that must already be registered.
    pub async fn entry(&self, name: &str) -> Result<(Arc<MetricDefinition>, SeriesHandle)> {
        self.metrics
            .read()
            .await
            .get(name)
            .map(|m| (m.definition.clone(), m.series.clone()))
            .ok_or_else(|| VitalsError::NotRegistered(name.to_string()))
    }

    pub async fn series(&self, name: &str) -> Result<SeriesHandle> {
        self.entry(name).await.map(|(_, series)| series)
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.metrics.read().await.contains_key(name)
    }

    pub async fn list_definitions(&self) -> Vec<Arc<MetricDefinition>> {
        let mut definitions: Vec<_> = self
            .metrics
            .read()
            .await
            .values()
            .map(|m| m.definition.clone())
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Every (definition, series) pair, captured under one read lock.
    pub async fn entries(&self) -> Vec<(Arc<MetricDefinition>, SeriesHandle)> {
        let mut entries: Vec<_> = self
            .metrics
            .read()
            .await
            .values()
            .map(|m| (m.definition.clone(), m.series.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        entries
    }

    pub async fn len(&self) -> usize {
        self.metrics.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.metrics.read().await.is_empty()
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POINTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::MetricKind;
    use crate::point::MetricPoint;

    #[tokio::test]
    async fn test_duplicate_registration_is_idempotent() {
        let registry = MetricRegistry::default();
        let def = MetricDefinition::gauge("queue_depth").label("queue").build();

        assert_eq!(registry.register(def.clone()).await.unwrap(), Registration::Created);
        let first = registry.series("queue_depth").await.unwrap();
        first.lock().await.push(MetricPoint::new(1, 1.0));

        assert_eq!(registry.register(def).await.unwrap(), Registration::Unchanged);
        let second = registry.series("queue_depth").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().await.len(), 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_conflicting_registration_fails_closed() {
        let registry = MetricRegistry::default();
        registry
            .register(MetricDefinition::gauge("queue_depth").build())
            .await
            .unwrap();

        let result = registry
            .register(MetricDefinition::counter("queue_depth").build())
            .await;
        assert!(matches!(result, Err(VitalsError::DuplicateName(_))));

        let relabeled = registry
            .register(MetricDefinition::gauge("queue_depth").label("queue").build())
            .await;
        assert!(relabeled.is_err());

        let kept = registry.lookup("queue_depth").await.unwrap();
        assert_eq!(kept.kind, MetricKind::Gauge);
    }

    #[tokio::test]
    async fn test_invalid_definition_is_not_stored() {
        let registry = MetricRegistry::default();
        let bad = MetricDefinition::histogram("latency").buckets([2.0, 1.0]).build();

        assert!(registry.register(bad).await.is_err());
        assert!(!registry.contains("latency").await);
    }

    #[tokio::test]
    async fn test_lookup_unknown() {
        let registry = MetricRegistry::default();
        assert!(matches!(
            registry.lookup("missing").await,
            Err(VitalsError::MetricNotFound(_))
        ));
        assert!(matches!(
            registry.entry("missing").await,
            Err(VitalsError::NotRegistered(_))
        ));
    }

    #[tokio::test]
    async fn test_series_capacity_follows_registry() {
        let registry = MetricRegistry::new(5);
        registry
            .register(MetricDefinition::counter("logins").build())
            .await
            .unwrap();

        let series = registry.series("logins").await.unwrap();
        assert_eq!(series.lock().await.capacity(), 5);
    }
}
