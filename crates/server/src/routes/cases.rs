//! Case routes: filing, editing, workflow and assignment.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    assignment_history::AssignmentTimelineEntry,
    case::{Case, CaseDetail, CaseFilter, CreateCase, UpdateCase},
};
use deployment::Deployment;
use services::services::case::{AssignCase, CaseService, ChangeCaseStatus, EscalateCase};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::ActingUser};

pub async fn list_cases(
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<CaseFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<Case>>>, ApiError> {
    let cases = CaseService::list(&deployment.db().pool, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(cases)))
}

pub async fn get_case(
    State(deployment): State<DeploymentImpl>,
    Path(case_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<CaseDetail>>, ApiError> {
    let detail = CaseService::detail(&deployment.db().pool, case_id).await?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

pub async fn create_case(
    State(deployment): State<DeploymentImpl>,
    actor: ActingUser,
    Json(payload): Json<CreateCase>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Case>>), ApiError> {
    actor.ensure_can_edit()?;
    let case = CaseService::create(&deployment.db().pool, &payload, Some(actor.id())).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(case))))
}

pub async fn update_case(
    State(deployment): State<DeploymentImpl>,
    actor: ActingUser,
    Path(case_id): Path<Uuid>,
    Json(payload): Json<UpdateCase>,
) -> Result<ResponseJson<ApiResponse<Case>>, ApiError> {
    actor.ensure_can_edit()?;
    let case = CaseService::update(&deployment.db().pool, case_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(case)))
}

pub async fn delete_case(
    State(deployment): State<DeploymentImpl>,
    actor: ActingUser,
    Path(case_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    actor.ensure_admin()?;
    CaseService::delete(&deployment.db().pool, case_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn change_status(
    State(deployment): State<DeploymentImpl>,
    actor: ActingUser,
    Path(case_id): Path<Uuid>,
    Json(payload): Json<ChangeCaseStatus>,
) -> Result<ResponseJson<ApiResponse<Case>>, ApiError> {
    actor.ensure_can_edit()?;
    let case =
        CaseService::change_status(&deployment.db().pool, case_id, payload.status, Some(actor.id()))
            .await?;
    Ok(ResponseJson(ApiResponse::success(case)))
}

pub async fn assign_case(
    State(deployment): State<DeploymentImpl>,
    actor: ActingUser,
    Path(case_id): Path<Uuid>,
    Json(payload): Json<AssignCase>,
) -> Result<ResponseJson<ApiResponse<Case>>, ApiError> {
    actor.ensure_can_assign()?;
    let case = CaseService::assign(&deployment.db().pool, case_id, &payload, actor.id()).await?;
    Ok(ResponseJson(ApiResponse::success(case)))
}

pub async fn escalate_case(
    State(deployment): State<DeploymentImpl>,
    actor: ActingUser,
    Path(case_id): Path<Uuid>,
    Json(payload): Json<EscalateCase>,
) -> Result<ResponseJson<ApiResponse<Case>>, ApiError> {
    actor.ensure_can_edit()?;
    // Reassigning as part of an escalation is still an assignment.
    if payload.escalate_to.is_some() {
        actor.ensure_can_assign()?;
    }
    let case =
        CaseService::escalate(&deployment.db().pool, case_id, Some(actor.id()), &payload).await?;
    Ok(ResponseJson(ApiResponse::success(case)))
}

pub async fn get_assignment_history(
    State(deployment): State<DeploymentImpl>,
    Path(case_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<AssignmentTimelineEntry>>>, ApiError> {
    let timeline = CaseService::assignment_timeline(&deployment.db().pool, case_id).await?;
    Ok(ResponseJson(ApiResponse::success(timeline)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let case_id_router = Router::new()
        .route("/", get(get_case).put(update_case).delete(delete_case))
        .route("/status", post(change_status))
        .route("/assign", post(assign_case))
        .route("/escalate", post(escalate_case))
        .route("/assignments", get(get_assignment_history));

    let inner = Router::new()
        .route("/", get(list_cases).post(create_case))
        .nest("/{case_id}", case_id_router);

    Router::new().nest("/cases", inner)
}
