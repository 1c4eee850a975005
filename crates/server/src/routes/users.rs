use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    case::Case,
    user::{CreateUser, UpdateUser, User, UserRole},
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::{case::CaseService, user::UserService};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::ActingUser};

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    #[serde(default)]
    pub include_inactive: bool,
    pub role: Option<UserRole>,
}

pub async fn list_users(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<UserListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    let users = UserService::list(&deployment.db().pool, query.include_inactive, query.role).await?;
    Ok(ResponseJson(ApiResponse::success(users)))
}

pub async fn get_user(
    State(deployment): State<DeploymentImpl>,
    Path(user_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = UserService::get(&deployment.db().pool, user_id).await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub async fn create_user(
    State(deployment): State<DeploymentImpl>,
    actor: ActingUser,
    Json(payload): Json<CreateUser>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<User>>), ApiError> {
    actor.ensure_admin()?;
    let user = UserService::create(&deployment.db().pool, &payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(user))))
}

pub async fn update_user(
    State(deployment): State<DeploymentImpl>,
    actor: ActingUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateUser>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    actor.ensure_admin()?;
    if user_id == actor.id() && payload.is_active == Some(false) {
        return Err(ApiError::BadRequest(
            "you cannot deactivate your own account".to_string(),
        ));
    }
    let user = UserService::update(&deployment.db().pool, user_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

/// Cases currently assigned to the user.
pub async fn get_user_cases(
    State(deployment): State<DeploymentImpl>,
    Path(user_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Case>>>, ApiError> {
    let pool = &deployment.db().pool;
    UserService::get(pool, user_id).await?;
    let cases = CaseService::assigned_to_user(pool, user_id).await?;
    Ok(ResponseJson(ApiResponse::success(cases)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let user_id_router = Router::new()
        .route("/", get(get_user).put(update_user))
        .route("/cases", get(get_user_cases));

    let inner = Router::new()
        .route("/", get(list_users).post(create_user))
        .nest("/{user_id}", user_id_router);

    Router::new().nest("/users", inner)
}
