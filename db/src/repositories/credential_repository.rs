use crate::models::credential_verification::{
    ActiveModel, Column, CredentialPurpose, CredentialStatus, Entity, Model, NewCredential,
};
use crate::repositories::error::StoreResult;
use crate::repositories::stores::CredentialStore;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

#[derive(Clone, Debug)]
pub struct CredentialRepository {
    db: DatabaseConnection,
}

impl CredentialRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl CredentialStore for CredentialRepository {
    async fn latest_for(&self, user_id: i64, purpose: CredentialPurpose) -> StoreResult<Option<Model>> {
        Ok(Entity::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::Purpose.eq(purpose))
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .one(&self.db)
            .await?)
    }

    async fn create(&self, input: NewCredential) -> StoreResult<Model> {
        let active_model = ActiveModel {
            user_id: Set(input.user_id),
            code: Set(input.code),
            purpose: Set(input.purpose),
            status: Set(CredentialStatus::Pending),
            attempt_count: Set(0),
            max_attempts: Set(input.max_attempts),
            expires_at: Set(input.expires_at),
            verified_at: Set(None),
            created_at: Set(input.created_at),
            updated_at: Set(input.created_at),
            ..Default::default()
        };
        Ok(active_model.insert(&self.db).await?)
    }

    async fn save_attempt(&self, record: &Model, expected_attempts: i32) -> StoreResult<bool> {
        let result = Entity::update_many()
            .col_expr(Column::Status, Expr::value(record.status))
            .col_expr(Column::AttemptCount, Expr::value(record.attempt_count))
            .col_expr(Column::VerifiedAt, Expr::value(record.verified_at))
            .col_expr(Column::UpdatedAt, Expr::value(record.updated_at))
            .filter(Column::Id.eq(record.id))
            .filter(Column::Status.eq(CredentialStatus::Pending))
            .filter(Column::AttemptCount.eq(expected_attempts))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn invalidate_pending(
        &self,
        user_id: i64,
        purpose: CredentialPurpose,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = Entity::update_many()
            .col_expr(Column::Status, Expr::value(CredentialStatus::Invalid))
            .col_expr(Column::UpdatedAt, Expr::value(at))
            .filter(Column::UserId.eq(user_id))
            .filter(Column::Purpose.eq(purpose))
            .filter(Column::Status.eq(CredentialStatus::Pending))
            .exec(&self.db)
            .await?;

        if result.rows_affected > 0 {
            tracing::debug!(user_id, %purpose, rows = result.rows_affected, "superseded pending codes");
        }
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{self, UserRole};
    use crate::test_utils::setup_test_db;
    use chrono::Duration;

    fn code(user_id: i64, code: &str, created_at: DateTime<Utc>) -> NewCredential {
        NewCredential {
            user_id,
            code: code.to_owned(),
            purpose: CredentialPurpose::DeviceBinding,
            max_attempts: 3,
            expires_at: created_at + Duration::minutes(5),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_latest_for_prefers_newest_record() {
        let db = setup_test_db().await;
        let u = user::Model::create(&db, "alice", UserRole::Student).await.unwrap();
        let repo = CredentialRepository::new(db);
        let t0 = Utc::now();

        repo.create(code(u.id, "111111", t0)).await.unwrap();
        repo.create(code(u.id, "222222", t0 + Duration::seconds(1))).await.unwrap();

        let latest = repo
            .latest_for(u.id, CredentialPurpose::DeviceBinding)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.code, "222222");
        assert!(repo.latest_for(u.id, CredentialPurpose::Registration).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_attempt_refuses_stale_reads() {
        let db = setup_test_db().await;
        let u = user::Model::create(&db, "alice", UserRole::Student).await.unwrap();
        let repo = CredentialRepository::new(db);

        let read = repo.create(code(u.id, "111111", Utc::now())).await.unwrap();

        let mut first = read.clone();
        first.attempt_count = 1;
        assert!(repo.save_attempt(&first, 0).await.unwrap());

        let mut second = read.clone();
        second.attempt_count = 1;
        assert!(!repo.save_attempt(&second, 0).await.unwrap(), "count moved on");

        let mut verified = first.clone();
        verified.attempt_count = 2;
        verified.status = CredentialStatus::Verified;
        assert!(repo.save_attempt(&verified, 1).await.unwrap());

        let mut late = verified.clone();
        late.attempt_count = 3;
        assert!(!repo.save_attempt(&late, 2).await.unwrap(), "record is no longer pending");

        let stored = repo
            .latest_for(u.id, CredentialPurpose::DeviceBinding)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, CredentialStatus::Verified);
        assert_eq!(stored.attempt_count, 2);
    }

    #[tokio::test]
    async fn test_invalidate_pending_only_touches_pending() {
        let db = setup_test_db().await;
        let u = user::Model::create(&db, "alice", UserRole::Student).await.unwrap();
        let repo = CredentialRepository::new(db);
        let t0 = Utc::now();

        let mut verified = repo.create(code(u.id, "111111", t0)).await.unwrap();
        verified.status = CredentialStatus::Verified;
        verified.attempt_count = 1;
        verified.verified_at = Some(t0);
        assert!(repo.save_attempt(&verified, 0).await.unwrap());
        let pending = repo.create(code(u.id, "222222", t0 + Duration::seconds(1))).await.unwrap();

        let touched = repo
            .invalidate_pending(u.id, CredentialPurpose::DeviceBinding, Utc::now())
            .await
            .unwrap();
        assert_eq!(touched, 1);

        let latest = repo
            .latest_for(u.id, CredentialPurpose::DeviceBinding)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, pending.id);
        assert_eq!(latest.status, CredentialStatus::Invalid);
    }
}
