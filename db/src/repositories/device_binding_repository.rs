use crate::models::device_binding::{ActiveModel, Column, Entity, Model, NewBinding};
use crate::repositories::error::StoreResult;
use crate::repositories::stores::DeviceBindingStore;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};

#[derive(Clone, Debug)]
pub struct DeviceBindingRepository {
    db: DatabaseConnection,
}

impl DeviceBindingRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl DeviceBindingStore for DeviceBindingRepository {
    async fn find(&self, user_id: i64, device_id: &str) -> StoreResult<Option<Model>> {
        Ok(Entity::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::DeviceId.eq(device_id))
            .one(&self.db)
            .await?)
    }

    async fn create(&self, input: NewBinding) -> StoreResult<Model> {
        let active_model = ActiveModel {
            user_id: Set(input.user_id),
            device_id: Set(input.device_id),
            device_name: Set(input.device_name),
            device_model: Set(input.device_model),
            active: Set(input.active),
            blacklisted: Set(false),
            bound_at: Set(input.bound_at),
            last_used_at: Set(None),
            created_at: Set(input.bound_at),
            updated_at: Set(input.bound_at),
            ..Default::default()
        };
        Ok(active_model.insert(&self.db).await?)
    }

    async fn save(&self, binding: &Model) -> StoreResult<Model> {
        let mut active_model: ActiveModel = binding.clone().into();
        active_model.device_name = Set(binding.device_name.clone());
        active_model.device_model = Set(binding.device_model.clone());
        active_model.active = Set(binding.active);
        active_model.bound_at = Set(binding.bound_at);
        active_model.last_used_at = Set(binding.last_used_at);
        active_model.updated_at = Set(binding.updated_at);
        Ok(active_model.update(&self.db).await?)
    }

    async fn touch_last_used(&self, id: i64, at: DateTime<Utc>) -> StoreResult<u64> {
        let result = Entity::update_many()
            .col_expr(Column::LastUsedAt, Expr::value(at))
            .col_expr(Column::UpdatedAt, Expr::value(at))
            .filter(Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn is_blacklisted(&self, device_id: &str) -> StoreResult<bool> {
        let count = Entity::find()
            .filter(Column::DeviceId.eq(device_id))
            .filter(Column::Blacklisted.eq(true))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    /// The blacklist lives on binding rows, so a device that was never bound to
    /// anyone cannot be blacklisted; zero rows touched is logged and returned.
    async fn blacklist_device(&self, device_id: &str, at: DateTime<Utc>) -> StoreResult<u64> {
        let result = Entity::update_many()
            .col_expr(Column::Blacklisted, Expr::value(true))
            .col_expr(Column::Active, Expr::value(false))
            .col_expr(Column::UpdatedAt, Expr::value(at))
            .filter(Column::DeviceId.eq(device_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            tracing::warn!(device_id, "blacklist requested for a device with no bindings; nothing recorded");
        } else {
            tracing::warn!(device_id, rows = result.rows_affected, "device blacklisted");
        }
        Ok(result.rows_affected)
    }

    async fn clear_blacklist(&self, device_id: &str, at: DateTime<Utc>) -> StoreResult<u64> {
        let result = Entity::update_many()
            .col_expr(Column::Blacklisted, Expr::value(false))
            .col_expr(Column::UpdatedAt, Expr::value(at))
            .filter(Column::DeviceId.eq(device_id))
            .filter(Column::Blacklisted.eq(true))
            .exec(&self.db)
            .await?;

        tracing::info!(device_id, rows = result.rows_affected, "device blacklist cleared");
        Ok(result.rows_affected)
    }

    async fn list_for(&self, user_id: i64) -> StoreResult<Vec<Model>> {
        Ok(Entity::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_desc(Column::BoundAt)
            .all(&self.db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{self, UserRole};
    use crate::repositories::StoreError;
    use crate::test_utils::setup_test_db;

    fn binding(user_id: i64, device_id: &str, active: bool) -> NewBinding {
        NewBinding {
            user_id,
            device_id: device_id.to_owned(),
            device_name: "Pixel".into(),
            device_model: "Pixel 8".into(),
            active,
            bound_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_blacklist_spans_every_identity() {
        let db = setup_test_db().await;
        let alice = user::Model::create(&db, "alice", UserRole::Student).await.unwrap();
        let bob = user::Model::create(&db, "bob", UserRole::Student).await.unwrap();
        let repo = DeviceBindingRepository::new(db);

        repo.create(binding(alice.id, "dev-1", true)).await.unwrap();
        repo.create(binding(bob.id, "dev-1", true)).await.unwrap();
        repo.create(binding(bob.id, "dev-2", true)).await.unwrap();

        assert!(!repo.is_blacklisted("dev-1").await.unwrap());
        let touched = repo.blacklist_device("dev-1", Utc::now()).await.unwrap();
        assert_eq!(touched, 2);
        assert!(repo.is_blacklisted("dev-1").await.unwrap());
        assert!(!repo.is_blacklisted("dev-2").await.unwrap());

        let alice_dev = repo.find(alice.id, "dev-1").await.unwrap().unwrap();
        assert!(alice_dev.blacklisted);
        assert!(!alice_dev.active);

        let cleared = repo.clear_blacklist("dev-1", Utc::now()).await.unwrap();
        assert_eq!(cleared, 2);
        assert!(!repo.is_blacklisted("dev-1").await.unwrap());
        let bob_dev = repo.find(bob.id, "dev-1").await.unwrap().unwrap();
        assert!(!bob_dev.active, "clearing does not reactivate");
    }

    #[tokio::test]
    async fn test_blacklist_of_unbound_device_touches_nothing() {
        let db = setup_test_db().await;
        let repo = DeviceBindingRepository::new(db);

        assert_eq!(repo.blacklist_device("ghost", Utc::now()).await.unwrap(), 0);
        assert!(!repo.is_blacklisted("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_save_does_not_lift_blacklist() {
        let db = setup_test_db().await;
        let alice = user::Model::create(&db, "alice", UserRole::Student).await.unwrap();
        let repo = DeviceBindingRepository::new(db);

        let stale = repo.create(binding(alice.id, "dev-1", true)).await.unwrap();
        repo.blacklist_device("dev-1", Utc::now()).await.unwrap();

        let saved = repo.save(&stale).await.unwrap();
        assert!(saved.blacklisted);
        assert!(repo.is_blacklisted("dev-1").await.unwrap());
        assert!(!repo.find(alice.id, "dev-1").await.unwrap().unwrap().is_usable());
    }

    #[tokio::test]
    async fn test_touch_last_used_leaves_flags_alone() {
        let db = setup_test_db().await;
        let alice = user::Model::create(&db, "alice", UserRole::Student).await.unwrap();
        let repo = DeviceBindingRepository::new(db);

        let b = repo.create(binding(alice.id, "dev-1", true)).await.unwrap();
        repo.blacklist_device("dev-1", Utc::now()).await.unwrap();

        let used_at = Utc::now();
        assert_eq!(repo.touch_last_used(b.id, used_at).await.unwrap(), 1);

        let stored = repo.find(alice.id, "dev-1").await.unwrap().unwrap();
        assert!(stored.last_used_at.is_some());
        assert!(stored.blacklisted);
        assert!(!stored.active);
    }

    #[tokio::test]
    async fn test_one_row_per_identity_and_device() {
        let db = setup_test_db().await;
        let alice = user::Model::create(&db, "alice", UserRole::Student).await.unwrap();
        let repo = DeviceBindingRepository::new(db);

        repo.create(binding(alice.id, "dev-1", false)).await.unwrap();
        let err = repo.create(binding(alice.id, "dev-1", false)).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
        assert_eq!(repo.list_for(alice.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_updates_flags() {
        let db = setup_test_db().await;
        let alice = user::Model::create(&db, "alice", UserRole::Student).await.unwrap();
        let repo = DeviceBindingRepository::new(db);

        let mut b = repo.create(binding(alice.id, "dev-1", false)).await.unwrap();
        b.active = true;
        b.last_used_at = Some(Utc::now());
        repo.save(&b).await.unwrap();

        let stored = repo.find(alice.id, "dev-1").await.unwrap().unwrap();
        assert!(stored.is_usable());
        assert!(stored.last_used_at.is_some());
    }
}
