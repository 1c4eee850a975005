use db::models::{
    case::Case,
    comment::{Comment, CreateComment},
    user::User,
};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::case::CaseError;

pub struct CommentService;

impl CommentService {
    pub async fn list(pool: &SqlitePool, case_id: Uuid) -> Result<Vec<Comment>, CaseError> {
        ensure_case_exists(pool, case_id).await?;
        Ok(Comment::find_by_case_id(pool, case_id).await?)
    }

    pub async fn add(
        pool: &SqlitePool,
        case_id: Uuid,
        author_id: Uuid,
        data: &CreateComment,
    ) -> Result<Comment, CaseError> {
        let body = data.body.trim();
        if body.is_empty() {
            return Err(CaseError::Validation("comment body is required".to_string()));
        }
        ensure_case_exists(pool, case_id).await?;

        let comment = Comment::create(
            pool,
            Uuid::new_v4(),
            case_id,
            Some(author_id),
            body.to_string(),
            data.is_internal.unwrap_or(false),
        )
        .await?;
        info!(case_id = %case_id, comment_id = %comment.id, "Comment added");
        Ok(comment)
    }

    /// Only the author or an admin may remove a comment.
    pub async fn delete(
        pool: &SqlitePool,
        case_id: Uuid,
        comment_id: Uuid,
        actor: &User,
    ) -> Result<(), CaseError> {
        let comment = Comment::find_by_id(pool, comment_id)
            .await?
            .filter(|c| c.case_id == case_id)
            .ok_or(CaseError::CommentNotFound)?;

        if comment.author_id != Some(actor.id) && !actor.role.is_admin() {
            return Err(CaseError::Forbidden(
                "only the author or an admin can delete a comment".to_string(),
            ));
        }

        Comment::delete(pool, comment_id).await?;
        info!(case_id = %case_id, comment_id = %comment_id, actor_id = %actor.id, "Comment deleted");
        Ok(())
    }
}

async fn ensure_case_exists(pool: &SqlitePool, case_id: Uuid) -> Result<(), CaseError> {
    Case::find_by_id(pool, case_id)
        .await?
        .map(|_| ())
        .ok_or(CaseError::NotFound)
}

#[cfg(test)]
mod tests {
    use db::models::{case::CreateCase, user::UserRole};

    use super::*;
    use crate::services::{
        case::CaseService,
        test_support::{test_db, user},
    };

    fn comment(body: &str) -> CreateComment {
        CreateComment {
            body: body.to_string(),
            is_internal: None,
        }
    }

    #[tokio::test]
    async fn add_trims_and_rejects_blank_bodies() {
        let (db, _dir) = test_db().await;
        let officer = user(&db, "Officer", UserRole::Officer).await;
        let case = CaseService::create(
            &db.pool,
            &CreateCase {
                title: "Noise".to_string(),
                ..Default::default()
            },
            Some(officer.id),
        )
        .await
        .unwrap();

        let err = CommentService::add(&db.pool, case.id, officer.id, &comment("  \n"))
            .await
            .unwrap_err();
        assert!(matches!(err, CaseError::Validation(_)));

        let added = CommentService::add(&db.pool, case.id, officer.id, &comment("  Called back  "))
            .await
            .unwrap();
        assert_eq!(added.body, "Called back");
        assert_eq!(added.author_name.as_deref(), Some("Officer"));
        assert!(!added.is_internal);

        let err = CommentService::add(&db.pool, Uuid::new_v4(), officer.id, &comment("orphan"))
            .await
            .unwrap_err();
        assert!(matches!(err, CaseError::NotFound));
    }

    #[tokio::test]
    async fn delete_is_limited_to_author_or_admin() {
        let (db, _dir) = test_db().await;
        let author = user(&db, "Author", UserRole::Officer).await;
        let other = user(&db, "Other", UserRole::Manager).await;
        let admin = user(&db, "Admin", UserRole::Admin).await;
        let case = CaseService::create(
            &db.pool,
            &CreateCase {
                title: "Billing".to_string(),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
        let first = CommentService::add(&db.pool, case.id, author.id, &comment("one")).await.unwrap();
        let second = CommentService::add(&db.pool, case.id, author.id, &comment("two")).await.unwrap();

        let err = CommentService::delete(&db.pool, case.id, first.id, &other).await.unwrap_err();
        assert!(matches!(err, CaseError::Forbidden(_)));

        let err = CommentService::delete(&db.pool, Uuid::new_v4(), first.id, &author)
            .await
            .unwrap_err();
        assert!(matches!(err, CaseError::CommentNotFound));

        CommentService::delete(&db.pool, case.id, first.id, &author).await.unwrap();
        CommentService::delete(&db.pool, case.id, second.id, &admin).await.unwrap();
        assert!(CommentService::list(&db.pool, case.id).await.unwrap().is_empty());
    }
}
