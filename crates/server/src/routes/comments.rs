use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{delete, get},
};
use db::models::comment::{Comment, CreateComment};
use deployment::Deployment;
use services::services::comment::CommentService;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::ActingUser};

pub async fn list_comments(
    State(deployment): State<DeploymentImpl>,
    Path(case_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Comment>>>, ApiError> {
    let comments = CommentService::list(&deployment.db().pool, case_id).await?;
    Ok(ResponseJson(ApiResponse::success(comments)))
}

pub async fn add_comment(
    State(deployment): State<DeploymentImpl>,
    actor: ActingUser,
    Path(case_id): Path<Uuid>,
    Json(payload): Json<CreateComment>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Comment>>), ApiError> {
    actor.ensure_can_edit()?;
    let comment = CommentService::add(&deployment.db().pool, case_id, actor.id(), &payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(comment))))
}

/// Authors may remove their own comments; admins may remove any.
pub async fn delete_comment(
    State(deployment): State<DeploymentImpl>,
    actor: ActingUser,
    Path((case_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    CommentService::delete(&deployment.db().pool, case_id, comment_id, actor.user()).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/cases/{case_id}/comments",
            get(list_comments).post(add_comment),
        )
        .route(
            "/cases/{case_id}/comments/{comment_id}",
            delete(delete_comment),
        )
}
