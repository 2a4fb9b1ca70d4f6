//! Read and refresh operations over the stream cache
//!
//! `streams` serves the cache when present and falls back to a fresh,
//! unvalidated aggregation. `resync` always aggregates, validates and
//! rewrites the cache. Writes to the cache file are serialized so two
//! overlapping refreshes cannot interleave.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::availability_prober::{AvailabilityProbe, HttpAvailabilityProber};
use super::config_store::ConfigStore;
use super::validation::{ValidationCoordinator, ValidationSummary};
use crate::config::{CacheFormat, Config};
use crate::errors::AppResult;
use crate::ingestor::Aggregator;
use crate::models::Validatable;

/// Where a served payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    /// Cached bytes served verbatim
    Cache,
    /// Fresh aggregation, not validated
    Aggregated,
    /// Fresh aggregation followed by a validation pass
    Validated,
}

impl PayloadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "hit",
            Self::Aggregated => "miss",
            Self::Validated => "refresh",
        }
    }
}

/// JSON body ready to be served, with its provenance
#[derive(Debug, Clone)]
pub struct CatalogPayload {
    pub body: String,
    pub source: PayloadSource,
    /// `Some(false)` when the cache write was attempted and failed
    pub persisted: Option<bool>,
    pub validation: Option<ValidationSummary>,
}

pub struct StreamCatalog {
    aggregator: Aggregator,
    streams_dir: PathBuf,
    store: ConfigStore,
    coordinator: ValidationCoordinator,
    format: CacheFormat,
    persist_on_miss: bool,
    write_lock: Mutex<()>,
}

impl StreamCatalog {
    pub fn new(
        streams_dir: impl Into<PathBuf>,
        store: ConfigStore,
        coordinator: ValidationCoordinator,
    ) -> Self {
        Self {
            aggregator: Aggregator::new(),
            streams_dir: streams_dir.into(),
            store,
            coordinator,
            format: CacheFormat::default(),
            persist_on_miss: false,
            write_lock: Mutex::new(()),
        }
    }

    /// Build the catalog from configuration with the HTTP prober.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let prober: Arc<dyn AvailabilityProbe> = Arc::new(HttpAvailabilityProber::new(
            config.validation.probe_timeout,
            &config.validation.user_agent,
        )?);
        Ok(Self::new(
            config.storage.streams_dir.clone(),
            ConfigStore::new(config.storage.cache_file.clone()),
            ValidationCoordinator::new(prober, config.validation.workers),
        )
        .with_format(config.cache.format)
        .with_persist_on_miss(config.cache.persist_on_miss))
    }

    pub fn with_format(mut self, format: CacheFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_persist_on_miss(mut self, persist_on_miss: bool) -> Self {
        self.persist_on_miss = persist_on_miss;
        self
    }

    pub fn streams_dir(&self) -> &std::path::Path {
        &self.streams_dir
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Serve the cache, or aggregate on a miss.
    pub async fn streams(&self) -> AppResult<CatalogPayload> {
        match self.store.read().await {
            Ok(Some(body)) => {
                return Ok(CatalogPayload {
                    body,
                    source: PayloadSource::Cache,
                    persisted: None,
                    validation: None,
                });
            }
            Ok(None) => info!("Cache miss at {:?}, aggregating", self.store.path()),
            Err(e) => warn!("Cache unreadable, aggregating instead: {}", e),
        }

        let data = self.aggregate().await?;
        let body = serde_json::to_string(&data)?;

        let persisted = if self.persist_on_miss {
            let _guard = self.write_lock.lock().await;
            // A resync may have written the cache while this miss was
            // aggregating; its validated result wins.
            if let Ok(Some(cached)) = self.store.read().await {
                debug!("Cache filled while aggregating, serving it instead");
                return Ok(CatalogPayload {
                    body: cached,
                    source: PayloadSource::Cache,
                    persisted: None,
                    validation: None,
                });
            }
            Some(self.persist(&data).await)
        } else {
            None
        };

        Ok(CatalogPayload {
            body,
            source: PayloadSource::Aggregated,
            persisted,
            validation: None,
        })
    }

    /// Aggregate, validate and overwrite the cache.
    pub async fn resync(&self) -> AppResult<CatalogPayload> {
        let _guard = self.write_lock.lock().await;
        info!("Resync requested for {:?}", self.streams_dir);

        let mut data = self.aggregate().await?;
        let summary = self.coordinator.validate(&mut data).await;
        let body = serde_json::to_string(&data)?;
        let persisted = self.persist(&data).await;

        Ok(CatalogPayload {
            body,
            source: PayloadSource::Validated,
            persisted: Some(persisted),
            validation: Some(summary),
        })
    }

    /// Run the directory walk on the blocking pool in the configured shape.
    async fn aggregate(&self) -> AppResult<Validatable> {
        let aggregator = self.aggregator.clone();
        let root = self.streams_dir.clone();
        let format = self.format;

        let data = tokio::task::spawn_blocking(move || -> Validatable {
            match format {
                CacheFormat::Grouped => aggregator.aggregate(&root).into(),
                CacheFormat::Flat => aggregator.aggregate_flat(&root).into(),
            }
        })
        .await?;
        Ok(data)
    }

    /// Soft-fail persistence: log and report, never propagate.
    async fn persist(&self, data: &Validatable) -> bool {
        match self.store.write(data).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to persist stream cache: {}", e);
                false
            }
        }
    }
}
