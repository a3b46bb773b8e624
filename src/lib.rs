//! Dealer Catalog - dealership vehicle inventory
//!
//! Keeps the vehicle catalog in SQLite, answers shopper queries over it and
//! imports listings from external sources without duplicating VINs.

pub mod catalog;
pub mod database;
pub mod error;
pub mod image_store;
pub mod import_source;
pub mod models;
pub mod query;
pub mod reconcile;
pub mod seed;
pub mod web;

pub use catalog::{CatalogBackend, CatalogStats, CatalogStore};
pub use database::SqliteCatalog;
pub use error::{CatalogError, Error, Result};
pub use import_source::{FileImportSource, HttpImportSource, ImportSource, SourceFilter};
pub use models::{ImportCandidate, VehicleDraft, VehiclePatch, VehicleRecord};
pub use query::{query, FilterSet, Range, SortKey};
pub use reconcile::{ImportPolicy, Reconciliation};
