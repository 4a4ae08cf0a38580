use crate::models::enrollment::{Column, Entity};
use crate::repositories::error::StoreResult;
use crate::repositories::stores::EnrollmentStore;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};

#[derive(Clone, Debug)]
pub struct EnrollmentRepository {
    db: DatabaseConnection,
}

impl EnrollmentRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl EnrollmentStore for EnrollmentRepository {
    async fn is_enrolled(&self, student_id: i64, course_id: i64, academic_year: i32) -> StoreResult<bool> {
        let count = Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::CourseId.eq(course_id))
            .filter(Column::AcademicYear.eq(academic_year))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }
}
