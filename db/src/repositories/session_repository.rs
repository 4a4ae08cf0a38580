use crate::models::attendance_session::{ActiveModel, Column, Entity, Model, NewSession, SessionStatus};
use crate::repositories::error::StoreResult;
use crate::repositories::stores::SessionStore;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

#[derive(Clone, Debug)]
pub struct SessionRepository {
    db: DatabaseConnection,
}

impl SessionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl SessionStore for SessionRepository {
    async fn get(&self, id: i64) -> StoreResult<Option<Model>> {
        Ok(Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn create(&self, input: NewSession) -> StoreResult<Model> {
        let now = Utc::now();
        let active_model = ActiveModel {
            teacher_id: Set(input.teacher_id),
            course_id: Set(input.course_id),
            academic_year: Set(input.academic_year),
            session_date: Set(input.session_date),
            start_time: Set(input.start_time),
            end_time: Set(input.end_time),
            network_name: Set(input.network_name),
            network_hardware_id: Set(input.network_hardware_id),
            latitude: Set(input.latitude),
            longitude: Set(input.longitude),
            radius_meters: Set(input.radius_meters),
            status: Set(SessionStatus::Scheduled),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let session = active_model.insert(&self.db).await?;
        tracing::debug!(session_id = session.id, teacher_id = session.teacher_id, "session scheduled");
        Ok(session)
    }

    async fn save(&self, session: &Model) -> StoreResult<Model> {
        let mut active_model: ActiveModel = session.clone().into();
        active_model.status = Set(session.status);
        active_model.start_time = Set(session.start_time);
        active_model.end_time = Set(session.end_time);
        active_model.updated_at = Set(Utc::now());
        Ok(active_model.update(&self.db).await?)
    }

    async fn list_active(&self) -> StoreResult<Vec<Model>> {
        Ok(Entity::find()
            .filter(Column::Status.eq(SessionStatus::Active))
            .order_by_asc(Column::StartTime)
            .all(&self.db)
            .await?)
    }
}
