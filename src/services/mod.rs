//! Aggregation, validation and caching services

pub mod availability_prober;
pub mod config_store;
pub mod stream_catalog;
pub mod validation;

pub use availability_prober::{AvailabilityProbe, HttpAvailabilityProber};
pub use config_store::ConfigStore;
pub use stream_catalog::{CatalogPayload, PayloadSource, StreamCatalog};
pub use validation::{ValidationCoordinator, ValidationSummary};
