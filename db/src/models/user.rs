use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// An authenticated subject known to the attendance core.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique login / student number.
    pub username: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "user_role_type")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum UserRole {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "teacher")]
    Teacher,
    #[sea_orm(string_value = "student")]
    Student,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::enrollment::Entity")]
    Enrollments,
    #[sea_orm(has_many = "super::device_binding::Entity")]
    DeviceBindings,
}

impl Related<super::enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollments.def()
    }
}

impl Related<super::device_binding::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeviceBindings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(db: &DbConn, username: &str, role: UserRole) -> Result<Model, DbErr> {
        let now = Utc::now();

        let active_model = ActiveModel {
            username: Set(username.to_owned()),
            role: Set(role),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        active_model.insert(db).await
    }

    pub async fn find_by_username(db: &DbConn, username: &str) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::Username.eq(username))
            .one(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_db;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_create_and_find_user() {
        let db = setup_test_db().await;

        let created = Model::create(&db, "u21000001", UserRole::Student)
            .await
            .expect("Failed to create user");
        assert_eq!(created.role, UserRole::Student);

        let found = Model::find_by_username(&db, "u21000001")
            .await
            .unwrap()
            .expect("user should exist");
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn test_username_is_unique() {
        let db = setup_test_db().await;

        Model::create(&db, "lecturer", UserRole::Teacher).await.unwrap();
        let dup = Model::create(&db, "lecturer", UserRole::Admin).await;
        assert!(dup.is_err());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(UserRole::from_str("Teacher").unwrap(), UserRole::Teacher);
        assert_eq!(UserRole::Admin.to_string(), "admin");
        assert!(UserRole::from_str("janitor").is_err());
    }
}
