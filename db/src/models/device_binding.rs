use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Trust link between an identity and a physical device.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "device_bindings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub device_id: String,
    pub device_name: String,
    pub device_model: String,
    pub active: bool,
    pub blacklisted: bool,
    pub bound_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a new binding. Bindings start inactive unless the caller says otherwise.
#[derive(Clone, Debug, PartialEq)]
pub struct NewBinding {
    pub user_id: i64,
    pub device_id: String,
    pub device_name: String,
    pub device_model: String,
    pub active: bool,
    pub bound_at: DateTime<Utc>,
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

impl Model {
    /// Blacklisting wins over the active flag.
    pub fn is_usable(&self) -> bool {
        self.active && !self.blacklisted
    }
}
