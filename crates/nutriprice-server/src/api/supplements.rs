use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use nutriprice_core::{NewSupplement, Supplement, SupplementPatch};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState};

type Envelope<T> = Json<ApiResponse<T>>;

/// POST /api/v1/supplements: create a supplement with freshly scraped prices.
pub(super) async fn create_supplement(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<NewSupplement>, JsonRejection>,
) -> Result<(StatusCode, Envelope<Supplement>), ApiError> {
    let Json(input) = body.map_err(|e| reject_body(&req_id, &e))?;

    let created = state
        .catalog
        .create(input)
        .await
        .map_err(|e| ApiError::from_catalog(req_id.0.clone(), &e))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(req_id.0, created))))
}

/// GET /api/v1/supplements: every supplement with refreshed prices.
pub(super) async fn list_supplements(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Envelope<Vec<Supplement>>, ApiError> {
    let data = state
        .catalog
        .list_all()
        .await
        .map_err(|e| ApiError::from_catalog(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(req_id.0, data)))
}

/// GET /api/v1/supplements/type/{kind}: stored prices only, no scraping.
pub(super) async fn list_supplements_by_type(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(kind): Path<String>,
) -> Result<Envelope<Vec<Supplement>>, ApiError> {
    let data = state
        .catalog
        .list_by_type(&kind)
        .await
        .map_err(|e| ApiError::from_catalog(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(req_id.0, data)))
}

/// PUT /api/v1/supplements/{id}: partial update.
pub(super) async fn update_supplement(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    body: Result<Json<SupplementPatch>, JsonRejection>,
) -> Result<Envelope<Supplement>, ApiError> {
    let id = parse_id(&req_id, &id)?;
    let Json(patch) = body.map_err(|e| reject_body(&req_id, &e))?;

    let updated = state
        .catalog
        .update(id, patch)
        .await
        .map_err(|e| ApiError::from_catalog(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(req_id.0, updated)))
}

/// DELETE /api/v1/supplements/{id}
pub(super) async fn delete_supplement(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Envelope<serde_json::Value>, ApiError> {
    let id = parse_id(&req_id, &id)?;

    state
        .catalog
        .delete(id)
        .await
        .map_err(|e| ApiError::from_catalog(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        serde_json::json!({ "deleted": true }),
    )))
}

/// An id that is not a UUID cannot name a record, so it is a 404 rather
/// than a 400.
fn parse_id(req_id: &RequestId, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| {
        ApiError::new(
            req_id.0.clone(),
            "not_found",
            format!("supplement {raw} not found"),
        )
    })
}

fn reject_body(req_id: &RequestId, rejection: &JsonRejection) -> ApiError {
    ApiError::new(
        req_id.0.clone(),
        "validation_error",
        format!("invalid request body: {}", rejection.body_text()),
    )
}
