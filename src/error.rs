//! Error types for dealer_catalog

use std::fmt;
use thiserror::Error;

/// Unified error type for catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    /// One or more fields of a vehicle failed validation
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),
    /// No vehicle with the given id
    #[error("Vehicle not found: {0}")]
    NotFound(String),
    /// Backing store read or write failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    /// Import source could not be reached or returned garbage
    #[error("Import source unavailable: {0}")]
    SourceUnavailable(String),
}

/// Failures of the persistence collaborator
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Backend(String),
}

/// Short alias used across the crate
pub type Error = CatalogError;

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        CatalogError::Persistence(PersistenceError::Database(err))
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Persistence(PersistenceError::Serialization(err))
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Persistence(PersistenceError::Io(err))
    }
}

impl From<ValidationErrors> for CatalogError {
    fn from(err: ValidationErrors) -> Self {
        CatalogError::Validation(err)
    }
}

/// A single rejected field with an operator-facing message
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Collected per-field validation failures
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Message for a field, if that field was rejected
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Result alias for dealer_catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;
