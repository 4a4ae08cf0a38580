use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A short-lived one-time code authorising a single sensitive action.
///
/// History is retained; the authoritative record for an `(user, purpose)` pair is
/// the most recently created one.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "credential_verifications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    #[serde(skip_serializing)]
    pub code: String,
    pub purpose: CredentialPurpose,
    pub status: CredentialStatus,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "credential_purpose")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CredentialPurpose {
    #[sea_orm(string_value = "registration")]
    Registration,
    #[sea_orm(string_value = "password_reset")]
    PasswordReset,
    #[sea_orm(string_value = "device_binding")]
    DeviceBinding,
    #[sea_orm(string_value = "email_verification")]
    EmailVerification,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "credential_status")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CredentialStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "verified")]
    Verified,
    #[sea_orm(string_value = "expired")]
    Expired,
    #[sea_orm(string_value = "invalid")]
    Invalid,
}

/// Input for a freshly issued code.
#[derive(Clone, Debug, PartialEq)]
pub struct NewCredential {
    pub user_id: i64,
    pub code: String,
    pub purpose: CredentialPurpose,
    pub max_attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
