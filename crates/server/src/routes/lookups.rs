//! Reference data for the case form, served under `/feedback-related-data`.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::models::lookup::{
    CreateLookupItem, FeedbackRelatedData, LookupItem, LookupKind, UpdateLookupItem,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::lookup::LookupService;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::ActingUser};

#[derive(Debug, Default, Deserialize)]
pub struct LookupListQuery {
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn get_all(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<FeedbackRelatedData>>, ApiError> {
    let data = LookupService::all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(data)))
}

/// Items of one kind. Answers 404 when there are none.
pub async fn list_items(
    State(deployment): State<DeploymentImpl>,
    Path(kind): Path<LookupKind>,
    Query(query): Query<LookupListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<LookupItem>>>, ApiError> {
    let items = LookupService::list(
        &deployment.db().pool,
        kind,
        query.parent_id,
        query.include_inactive,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(items)))
}

pub async fn create_item(
    State(deployment): State<DeploymentImpl>,
    actor: ActingUser,
    Path(kind): Path<LookupKind>,
    Json(payload): Json<CreateLookupItem>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<LookupItem>>), ApiError> {
    actor.ensure_admin()?;
    let item = LookupService::create(&deployment.db().pool, kind, &payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(item))))
}

pub async fn update_item(
    State(deployment): State<DeploymentImpl>,
    actor: ActingUser,
    Path((kind, id)): Path<(LookupKind, Uuid)>,
    Json(payload): Json<UpdateLookupItem>,
) -> Result<ResponseJson<ApiResponse<LookupItem>>, ApiError> {
    actor.ensure_admin()?;
    let item = LookupService::update(&deployment.db().pool, kind, id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(item)))
}

pub async fn delete_item(
    State(deployment): State<DeploymentImpl>,
    actor: ActingUser,
    Path((kind, id)): Path<(LookupKind, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    actor.ensure_admin()?;
    LookupService::delete(&deployment.db().pool, kind, id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let inner = Router::new()
        .route("/", get(get_all))
        .route("/{kind}", get(list_items).post(create_item))
        .route("/{kind}/{id}", put(update_item).delete(delete_item));

    Router::new().nest("/feedback-related-data", inner)
}
