//! HTTP route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ServiceState>`.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::pricing::PriceEstimationGateway;
use crate::storage::RequestStore;
use crate::types::{
    ErrandRecord, PersistenceError, PriceRange, PricingError, PricingMode, PricingResult,
    RawErrand, ValidationErrors,
};
use crate::validator::TASK_TYPES;

const DEFAULT_LIST_LIMIT: u32 = 100;
const MAX_LIST_LIMIT: u32 = 500;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ServiceState {
    pub gateway: PriceEstimationGateway,
    /// Requests are not persisted when absent.
    pub store: Option<RequestStore>,
}

impl ServiceState {
    pub fn new(gateway: PriceEstimationGateway, store: Option<RequestStore>) -> Self {
        Self { gateway, store }
    }
}

pub type AppState = Arc<ServiceState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub recommendation: PricingResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_price_range: Option<PriceRange>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTypesResponse {
    pub task_types: Vec<&'static str>,
    pub pricing_mode: PricingMode,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<ValidationErrors>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Pipeline and store failures as HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// The request body was not an errand the form could have sent.
    InvalidBody(JsonRejection),
    Pricing(PricingError),
    Persistence(PersistenceError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection)
    }
}

impl From<PricingError> for ApiError {
    fn from(err: PricingError) -> Self {
        ApiError::Pricing(err)
    }
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        ApiError::Persistence(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::InvalidBody(rejection) => rejection_body(&rejection),
            ApiError::Pricing(PricingError::Validation(errors)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    error: "validation_failed",
                    message: "Please correct the highlighted fields.".into(),
                    fields: Some(errors),
                },
            ),
            ApiError::Pricing(err @ PricingError::UpstreamUnavailable(_)) => {
                warn!(error = %err, "Pricing model unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody {
                        error: "upstream_unavailable",
                        message: "The pricing service is temporarily unavailable. Please try again."
                            .into(),
                        fields: None,
                    },
                )
            }
            ApiError::Pricing(err @ PricingError::Estimation { .. }) => (
                StatusCode::BAD_GATEWAY,
                ErrorBody {
                    error: "estimation_failed",
                    message: err.to_string(),
                    fields: None,
                },
            ),
            ApiError::Persistence(err @ PersistenceError::PermissionDenied { .. }) => {
                error!(error = %err, "Request store refused the write");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "permission_denied",
                        message: err.to_string(),
                        fields: None,
                    },
                )
            }
            ApiError::Persistence(err @ PersistenceError::Store(_)) => {
                error!(error = %err, "Request store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "store_error",
                        message: err.to_string(),
                        fields: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

fn rejection_body(rejection: &JsonRejection) -> (StatusCode, ErrorBody) {
    let text = rejection.body_text();
    debug!(status = %rejection.status(), detail = %text, "Rejected request body");

    match rejection {
        JsonRejection::JsonDataError(_) => {
            match field_error(&text).map(|(field, detail)| ValidationErrors::single(field, detail)) {
                Some(fields) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorBody {
                        error: "validation_failed",
                        message: "Please correct the highlighted fields.".into(),
                        fields: Some(fields),
                    },
                ),
                None => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorBody {
                        error: "invalid_body",
                        message: text,
                        fields: None,
                    },
                ),
            }
        }
        JsonRejection::MissingJsonContentType(_) => (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ErrorBody {
                error: "unsupported_media_type",
                message: text,
                fields: None,
            },
        ),
        _ => (
            StatusCode::BAD_REQUEST,
            ErrorBody {
                error: "invalid_body",
                message: text,
                fields: None,
            },
        ),
    }
}

/// Split a deserialization message into the offending field and the detail.
///
/// The text reads `<prefix>: <path>: <detail>`, and the path is omitted when
/// the error is at the top level.
fn field_error(text: &str) -> Option<(&str, &str)> {
    let (_, rest) = text.split_once("target type: ")?;
    let (path, detail) = rest.split_once(": ")?;
    if path.is_empty() || path.contains(char::is_whitespace) {
        return None;
    }
    Some((path, detail))
}

fn list_limit(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT)
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// POST /api/estimate: price one errand and store it.
pub async fn post_estimate(
    State(state): State<AppState>,
    payload: Result<Json<RawErrand>, JsonRejection>,
) -> Result<Json<EstimateResponse>, ApiError> {
    let Json(raw) = payload?;
    let (request, result) = state.gateway.validate_and_estimate(&raw).await?;

    let request_id = match &state.store {
        Some(store) => Some(store.insert(&request, &result).await?.id),
        None => None,
    };

    info!(
        request_id = request_id.as_deref().unwrap_or("-"),
        task_type = request.task_type(),
        range = %result.recommended_price_range,
        "Estimate served"
    );

    let parsed_price_range = result.parsed_price_range();
    Ok(Json(EstimateResponse {
        request_id,
        recommendation: result,
        parsed_price_range,
    }))
}

/// GET /api/requests: newest stored requests first.
pub async fn list_requests(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ErrandRecord>>, ApiError> {
    let Some(store) = &state.store else {
        return Ok(Json(Vec::new()));
    };
    Ok(Json(store.list_recent(list_limit(params.limit)).await?))
}

/// GET /api/task-types
pub async fn task_types(State(state): State<AppState>) -> Json<TaskTypesResponse> {
    Json(TaskTypesResponse {
        task_types: TASK_TYPES.to_vec(),
        pricing_mode: state.gateway.mode(),
    })
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
