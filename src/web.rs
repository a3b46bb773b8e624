//! Web server for the dealership catalog
//!
//! Provides the REST API used by the storefront and the admin pages, and serves
//! uploaded vehicle images from the image store directory.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::catalog::{CatalogStats, CatalogStore};
use crate::database::SqliteCatalog;
use crate::error::CatalogError;
use crate::image_store::IMAGE_URL_PREFIX;
use crate::models::{ImageRecord, VehicleDraft, VehiclePatch, VehicleRecord};
use crate::query::{makes_in_stock, query, FilterSet, Range, SortKey};

/// Catalog shared between request handlers
pub type SharedStore = Arc<Mutex<CatalogStore<SqliteCatalog>>>;

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: SharedStore,
}

/// API response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

/// Failed request: status code plus message for the `error` field
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        let status = match &err {
            CatalogError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::SourceUnavailable(_) => StatusCode::BAD_GATEWAY,
            CatalogError::Persistence(_) => {
                log::error!("Database error: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body: ApiResponse<()> = ApiResponse {
            success: false,
            data: None,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

impl AppState {
    fn lock(&self) -> Result<MutexGuard<'_, CatalogStore<SqliteCatalog>>, ApiError> {
        self.store.lock().map_err(|_| {
            log::error!("Catalog lock poisoned");
            ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Catalog unavailable".to_string(),
            }
        })
    }
}

/// Inventory listing query parameters
///
/// Enum filters accept their lowercase names; "all" or an empty value means no
/// constraint.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListParams {
    search: Option<String>,
    sort: Option<String>,
    make: Option<String>,
    condition: Option<String>,
    body_type: Option<String>,
    transmission: Option<String>,
    fuel_type: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
    min_year: Option<u16>,
    max_year: Option<u16>,
    min_mileage: Option<u32>,
    max_mileage: Option<u32>,
}

fn parse_choice<T>(field: &str, value: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: FromStr<Err = String>,
{
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("all") => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|e| ApiError::bad_request(format!("Invalid {}: {}", field, e))),
    }
}

fn range<T>(min: Option<T>, max: Option<T>) -> Option<Range<T>> {
    if min.is_none() && max.is_none() {
        None
    } else {
        Some(Range { min, max })
    }
}

impl ListParams {
    fn filters(&self) -> Result<FilterSet, ApiError> {
        Ok(FilterSet {
            make: self
                .make
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty() && !m.eq_ignore_ascii_case("all"))
                .map(str::to_string),
            condition: parse_choice("condition", self.condition.as_deref())?,
            body_type: parse_choice("body_type", self.body_type.as_deref())?,
            transmission: parse_choice("transmission", self.transmission.as_deref())?,
            fuel_type: parse_choice("fuel_type", self.fuel_type.as_deref())?,
            price: range(self.min_price, self.max_price),
            year: range(self.min_year, self.max_year),
            mileage: range(self.min_mileage, self.max_mileage),
        })
    }

    fn sort(&self) -> Result<SortKey, ApiError> {
        Ok(parse_choice("sort", self.sort.as_deref())?.unwrap_or_default())
    }
}

/// Raw image upload parameters
#[derive(Debug, Deserialize)]
struct UploadParams {
    #[serde(default = "default_file_name")]
    file_name: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    sort_order: i64,
}

fn default_file_name() -> String {
    "upload.jpg".to_string()
}

/// Body of PUT /api/images/{image_id}/order
#[derive(Debug, Deserialize)]
struct ImageOrder {
    sort_order: i64,
}

/// GET /api/vehicles?search=&sort=&make=&condition=...
async fn list_handler(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Vec<VehicleRecord>> {
    let Query(params) = params?;
    let filters = params.filters()?;
    let sort = params.sort()?;
    let search = params.search.as_deref().unwrap_or("");

    let store = state.lock()?;
    Ok(ApiResponse::ok(query(store.records(), &filters, search, sort)))
}

/// GET /api/vehicles/{id}
async fn get_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<VehicleRecord> {
    let store = state.lock()?;
    let vehicle = store.get(&id).ok_or(CatalogError::NotFound(id))?;
    Ok(ApiResponse::ok(vehicle))
}

/// POST /api/vehicles
async fn create_handler(
    State(state): State<AppState>,
    Json(draft): Json<VehicleDraft>,
) -> Result<(StatusCode, Json<ApiResponse<VehicleRecord>>), ApiError> {
    let mut store = state.lock()?;
    let vehicle = store.add(draft)?;
    Ok((StatusCode::CREATED, ApiResponse::ok(vehicle)))
}

/// PUT /api/vehicles/{id}
async fn update_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<VehiclePatch>,
) -> ApiResult<VehicleRecord> {
    let mut store = state.lock()?;
    Ok(ApiResponse::ok(store.update(&id, patch)?))
}

/// DELETE /api/vehicles/{id}
/// `data` reports whether the vehicle existed; deleting twice is not an error
async fn delete_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let mut store = state.lock()?;
    Ok(ApiResponse::ok(store.delete(&id)?))
}

/// GET /api/vehicles/{id}/images
async fn list_images_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<ImageRecord>> {
    let store = state.lock()?;
    Ok(ApiResponse::ok(store.backend().list_images(&id)?))
}

/// POST /api/vehicles/{id}/images?file_name=&primary=&sort_order=
/// Body is the raw image file
async fn upload_image_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<UploadParams>, QueryRejection>,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<ImageRecord>>), ApiError> {
    let Query(params) = params?;
    if body.is_empty() {
        return Err(ApiError::bad_request("Image body is empty"));
    }

    let mut store = state.lock()?;
    let image = store.backend_mut().upload_image(
        &id,
        &params.file_name,
        &body,
        params.primary,
        params.sort_order,
    )?;
    store.refresh(&id)?;
    Ok((StatusCode::CREATED, ApiResponse::ok(image)))
}

/// POST /api/vehicles/{id}/images/{image_id}/primary
async fn set_primary_handler(
    State(state): State<AppState>,
    Path((id, image_id)): Path<(String, String)>,
) -> ApiResult<()> {
    let mut store = state.lock()?;
    store.backend_mut().set_primary_image(&image_id, &id)?;
    store.refresh(&id)?;
    Ok(ApiResponse::ok(()))
}

/// DELETE /api/images/{image_id}
async fn delete_image_handler(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> ApiResult<()> {
    let mut store = state.lock()?;
    let image = store.backend_mut().delete_image(&image_id)?;
    store.refresh(&image.vehicle_id)?;
    Ok(ApiResponse::ok(()))
}

/// PUT /api/images/{image_id}/order
async fn image_order_handler(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    Json(order): Json<ImageOrder>,
) -> ApiResult<ImageRecord> {
    let mut store = state.lock()?;
    let image = store
        .backend_mut()
        .update_image_order(&image_id, order.sort_order)?;
    store.refresh(&image.vehicle_id)?;
    Ok(ApiResponse::ok(image))
}

/// GET /api/makes - makes currently in stock, for the filter dropdown
async fn makes_handler(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    let store = state.lock()?;
    Ok(ApiResponse::ok(makes_in_stock(store.records())))
}

/// GET /api/stats
async fn stats_handler(State(state): State<AppState>) -> ApiResult<CatalogStats> {
    let store = state.lock()?;
    Ok(ApiResponse::ok(store.stats()))
}

/// Build the web server router
///
/// The store should already be loaded; handlers read its snapshot.
pub fn create_router(store: SharedStore, image_root: &std::path::Path) -> Router {
    let state = AppState { store };

    Router::new()
        .route("/api/vehicles", get(list_handler).post(create_handler))
        .route(
            "/api/vehicles/{id}",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
        .route(
            "/api/vehicles/{id}/images",
            get(list_images_handler).post(upload_image_handler),
        )
        .route(
            "/api/vehicles/{id}/images/{image_id}/primary",
            post(set_primary_handler),
        )
        .route("/api/images/{image_id}", delete(delete_image_handler))
        .route("/api/images/{image_id}/order", put(image_order_handler))
        .route("/api/makes", get(makes_handler))
        .route("/api/stats", get(stats_handler))
        .nest_service(IMAGE_URL_PREFIX, ServeDir::new(image_root))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the web server (async)
///
/// Binds to 0.0.0.0 (all interfaces) and runs until Ctrl+C.
pub async fn serve(store: SharedStore, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let image_root = {
        let mut guard = store.lock().map_err(|_| "Catalog lock poisoned")?;
        let loaded = guard.load()?;
        log::info!("Serving catalog of {} vehicles", loaded.len());
        guard.backend().image_store().root().to_path_buf()
    };

    let app = create_router(store, &image_root);
    let addr = format!("0.0.0.0:{}", port);

    log::info!("Web API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
    }
}

#[cfg(test)]
#[path = "web_tests.rs"]
mod tests;
