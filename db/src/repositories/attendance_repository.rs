use crate::models::attendance_claim::{ActiveModel, ClaimOutcome, Column, Entity, Model, NewClaim};
use crate::repositories::error::{StoreError, StoreResult};
use crate::repositories::stores::AttendanceStore;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};

#[derive(Clone, Debug)]
pub struct AttendanceRepository {
    db: DatabaseConnection,
}

impl AttendanceRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl AttendanceStore for AttendanceRepository {
    async fn exists_for(&self, session_id: i64, student_id: i64) -> StoreResult<bool> {
        let count = Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .filter(Column::StudentId.eq(student_id))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn create(&self, input: NewClaim) -> StoreResult<Model> {
        let now = Utc::now();
        let (session_id, student_id) = (input.session_id, input.student_id);
        let active_model = ActiveModel {
            session_id: Set(input.session_id),
            student_id: Set(input.student_id),
            latitude: Set(input.latitude),
            longitude: Set(input.longitude),
            network_name: Set(input.network_name),
            network_hardware_id: Set(input.network_hardware_id),
            device_id: Set(input.device_id),
            submitted_at: Set(input.submitted_at),
            outcome: Set(ClaimOutcome::Pending),
            rejection_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        active_model.insert(&self.db).await.map_err(|e| {
            let err = StoreError::from(e);
            if err.is_unique_violation() {
                tracing::warn!(session_id, student_id, "duplicate attendance claim refused by store");
            }
            err
        })
    }

    async fn save(&self, claim: &Model) -> StoreResult<Model> {
        let mut active_model: ActiveModel = claim.clone().into();
        active_model.outcome = Set(claim.outcome);
        active_model.rejection_reason = Set(claim.rejection_reason.clone());
        active_model.updated_at = Set(Utc::now());
        Ok(active_model.update(&self.db).await?)
    }

    async fn find(&self, id: i64) -> StoreResult<Option<Model>> {
        Ok(Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn list_for_session(&self, session_id: i64) -> StoreResult<Vec<Model>> {
        Ok(Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .order_by_asc(Column::SubmittedAt)
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn list_for_student(&self, student_id: i64) -> StoreResult<Vec<Model>> {
        Ok(Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .order_by_desc(Column::SubmittedAt)
            .all(&self.db)
            .await?)
    }
}
