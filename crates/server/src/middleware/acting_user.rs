//! Resolves the user a mutating request acts on behalf of.
//!
//! The gateway in front of the API authenticates people and forwards the
//! stored user's id in `X-User-Id`. Handlers that change data take an
//! [`ActingUser`] and check its role before calling into the services.

use axum::{extract::FromRequestParts, http::request::Parts};
use db::models::user::User;
use deployment::Deployment;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone)]
pub struct ActingUser(pub User);

impl ActingUser {
    pub fn id(&self) -> Uuid {
        self.0.id
    }

    pub fn user(&self) -> &User {
        &self.0
    }

    /// Officers, managers and admins may file and edit cases.
    pub fn ensure_can_edit(&self) -> Result<(), ApiError> {
        if self.0.role.can_edit_cases() {
            Ok(())
        } else {
            Err(self.forbidden("edit cases"))
        }
    }

    pub fn ensure_can_assign(&self) -> Result<(), ApiError> {
        if self.0.role.can_assign() {
            Ok(())
        } else {
            Err(self.forbidden("assign cases"))
        }
    }

    pub fn ensure_admin(&self) -> Result<(), ApiError> {
        if self.0.role.is_admin() {
            Ok(())
        } else {
            Err(self.forbidden("perform this action"))
        }
    }

    fn forbidden(&self, action: &str) -> ApiError {
        ApiError::Forbidden(format!("role '{}' may not {}", self.0.role, action))
    }
}

impl FromRequestParts<DeploymentImpl> for ActingUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        deployment: &DeploymentImpl,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("missing X-User-Id header".to_string()))?;
        let id = raw
            .to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .ok_or_else(|| ApiError::Unauthorized("invalid X-User-Id header".to_string()))?;

        let user = User::find_by_id(&deployment.db().pool, id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("unknown user".to_string()))?;
        if !user.is_active {
            return Err(ApiError::Forbidden("user is inactive".to_string()));
        }

        tracing::debug!(user_id = %user.id, role = %user.role, "Resolved acting user");
        Ok(ActingUser(user))
    }
}
