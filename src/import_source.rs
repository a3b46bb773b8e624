//! Import sources for external vehicle listings
//!
//! Uses async reqwest for the HTTP listing service. A source that cannot be reached
//! is reported as [`CatalogError::SourceUnavailable`]; callers that only want
//! "whatever is available" use [`fetch_candidates_or_empty`].

use crate::error::{CatalogError, Result};
use crate::models::ImportCandidate;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

/// Default request timeout for the listing service
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Which listings to ask the source for
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceFilter {
    /// Dealer listing page the service should read
    pub listing_url: String,
    pub make: Option<String>,
    pub condition: Option<String>,
}

/// Request body sent to the listing service
#[derive(Debug, Serialize)]
struct FetchRequest<'a> {
    url: &'a str,
    filters: RequestFilters<'a>,
}

#[derive(Debug, Serialize)]
struct RequestFilters<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    make: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    condition: Option<&'a str>,
}

/// Listing document: `{"vehicles": [...]}` or a bare array
///
/// Entries are kept as raw JSON so one malformed listing does not sink the batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListingDocument {
    Wrapped { vehicles: Vec<serde_json::Value> },
    Bare(Vec<serde_json::Value>),
}

impl ListingDocument {
    /// Parse each entry on its own, dropping (and logging) the ones that don't fit
    fn into_candidates(self) -> Vec<ImportCandidate> {
        let entries = match self {
            ListingDocument::Wrapped { vehicles } => vehicles,
            ListingDocument::Bare(vehicles) => vehicles,
        };

        entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                match serde_json::from_value::<ImportCandidate>(entry) {
                    Ok(candidate) => Some(candidate),
                    Err(e) => {
                        log::warn!("Dropping unreadable listing #{}: {}", index, e);
                        None
                    }
                }
            })
            .collect()
    }
}

/// Something that produces import candidates
pub trait ImportSource {
    fn fetch_candidates(
        &self,
        filter: &SourceFilter,
    ) -> impl Future<Output = Result<Vec<ImportCandidate>>> + Send;
}

/// Listing service reached over HTTP
pub struct HttpImportSource {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpImportSource {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("DealerCatalog-Import/1.0")
            .build()
            .map_err(|e| CatalogError::SourceUnavailable(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch_once(
        &self,
        body: &FetchRequest<'_>,
    ) -> std::result::Result<Vec<ImportCandidate>, Attempt> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| Attempt::Retryable(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(Attempt::Retryable(format!("Listing service returned {}", status)));
        }
        if !status.is_success() {
            return Err(Attempt::Fatal(format!("Listing service returned {}", status)));
        }

        let document = response
            .json::<ListingDocument>()
            .await
            .map_err(|e| Attempt::Fatal(format!("Invalid listing response: {}", e)))?;
        Ok(document.into_candidates())
    }
}

/// Outcome of a single request
enum Attempt {
    Retryable(String),
    Fatal(String),
}

impl ImportSource for HttpImportSource {
    /// POSTs `{"url", "filters"}`; retries once on transport failure or 5xx
    async fn fetch_candidates(&self, filter: &SourceFilter) -> Result<Vec<ImportCandidate>> {
        let body = FetchRequest {
            url: &filter.listing_url,
            filters: RequestFilters {
                make: filter.make.as_deref(),
                condition: filter.condition.as_deref(),
            },
        };

        log::debug!("Fetching listings from {} for {}", self.endpoint, filter.listing_url);

        let candidates = match self.fetch_once(&body).await {
            Ok(candidates) => candidates,
            Err(Attempt::Fatal(msg)) => return Err(CatalogError::SourceUnavailable(msg)),
            Err(Attempt::Retryable(msg)) => {
                log::warn!("{}, retrying once", msg);
                match self.fetch_once(&body).await {
                    Ok(candidates) => candidates,
                    Err(Attempt::Retryable(msg)) | Err(Attempt::Fatal(msg)) => {
                        return Err(CatalogError::SourceUnavailable(msg))
                    }
                }
            }
        };

        log::info!("Listing service returned {} candidates", candidates.len());
        Ok(candidates)
    }
}

/// Listings exported to a JSON file
pub struct FileImportSource {
    path: PathBuf,
}

impl FileImportSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ImportSource for FileImportSource {
    async fn fetch_candidates(&self, _filter: &SourceFilter) -> Result<Vec<ImportCandidate>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CatalogError::SourceUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let document: ListingDocument = serde_json::from_str(&content).map_err(|e| {
            CatalogError::SourceUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let candidates = document.into_candidates();
        log::info!("Read {} candidates from {}", candidates.len(), self.path.display());
        Ok(candidates)
    }
}

/// Fetch candidates, turning an unreachable source into an empty list plus a notice
///
/// Other errors are passed through unchanged.
pub async fn fetch_candidates_or_empty<S: ImportSource>(
    source: &S,
    filter: &SourceFilter,
) -> Result<(Vec<ImportCandidate>, Option<String>)> {
    match source.fetch_candidates(filter).await {
        Ok(candidates) => Ok((candidates, None)),
        Err(CatalogError::SourceUnavailable(msg)) => {
            log::warn!("Import source unavailable: {}", msg);
            Ok((
                Vec::new(),
                Some(format!("Import source unavailable, nothing fetched: {}", msg)),
            ))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "import_source_tests.rs"]
mod tests;
