//! Device binding and revocation.
//!
//! A binding is usable only while `active && !blacklisted`. Blacklisting is keyed on
//! the physical device id and covers every identity it was ever bound to; it holds
//! until [`DeviceTrustRegistry::clear_blacklist`] is called.

use crate::clock::Clock;
use crate::credential::CredentialVerifier;
use crate::error::{Rejection, ServiceError, ServiceResult};
use common::config::Config;
use db::models::credential_verification::{self, CredentialPurpose};
use db::models::device_binding::{Model, NewBinding};
use db::repositories::{CredentialStore, DeviceBindingStore};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingPolicy {
    /// New bindings stay inactive until a `device_binding` code is confirmed.
    pub requires_otp: bool,
}

impl Default for BindingPolicy {
    fn default() -> Self {
        Self { requires_otp: true }
    }
}

impl From<&Config> for BindingPolicy {
    fn from(config: &Config) -> Self {
        Self {
            requires_otp: config.device_binding_requires_otp,
        }
    }
}

/// Result of [`DeviceTrustRegistry::bind`].
#[derive(Debug, Clone)]
pub struct PendingBinding {
    pub binding: Model,
    /// Code to deliver to the user when confirmation is required.
    pub otp: Option<credential_verification::Model>,
}

#[derive(Debug)]
pub struct DeviceTrustRegistry<D, C> {
    store: D,
    credentials: CredentialVerifier<C>,
    policy: BindingPolicy,
    clock: Arc<dyn Clock>,
}

impl<D, C> DeviceTrustRegistry<D, C>
where
    D: DeviceBindingStore,
    C: CredentialStore,
{
    pub fn new(store: D, credentials: CredentialVerifier<C>, policy: BindingPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            credentials,
            policy,
            clock,
        }
    }

    pub fn credentials(&self) -> &CredentialVerifier<C> {
        &self.credentials
    }

    pub async fn bind(
        &self,
        user_id: i64,
        device_id: &str,
        device_name: &str,
        device_model: &str,
    ) -> ServiceResult<PendingBinding> {
        if self.store.is_blacklisted(device_id).await? {
            log::warn!("user {user_id}: refused bind of blacklisted device {device_id}");
            return Err(Rejection::DeviceBlacklisted.into());
        }

        let now = self.clock.now();
        let active = !self.policy.requires_otp;

        let binding = match self.store.find(user_id, device_id).await? {
            Some(existing) if existing.active => return Err(Rejection::AlreadyBound.into()),
            Some(mut existing) => {
                existing.device_name = device_name.to_owned();
                existing.device_model = device_model.to_owned();
                existing.active = active;
                existing.bound_at = now;
                existing.updated_at = now;
                self.store.save(&existing).await?
            }
            None => {
                self.store
                    .create(NewBinding {
                        user_id,
                        device_id: device_id.to_owned(),
                        device_name: device_name.to_owned(),
                        device_model: device_model.to_owned(),
                        active,
                        bound_at: now,
                    })
                    .await?
            }
        };

        let otp = if self.policy.requires_otp {
            Some(self.credentials.issue(user_id, CredentialPurpose::DeviceBinding).await?)
        } else {
            None
        };

        log::info!("user {user_id}: bound device {device_id} (active: {})", binding.active);
        Ok(PendingBinding { binding, otp })
    }

    /// Consumes a `device_binding` code and activates the binding.
    pub async fn confirm_binding(&self, user_id: i64, device_id: &str, code: &str) -> ServiceResult<Model> {
        if self.store.find(user_id, device_id).await?.is_none() {
            return Err(Rejection::DeviceNotBound.into());
        }
        self.credentials
            .verify(user_id, CredentialPurpose::DeviceBinding, code)
            .await?;
        self.activate(user_id, device_id).await
    }

    pub async fn activate(&self, user_id: i64, device_id: &str) -> ServiceResult<Model> {
        if self.store.is_blacklisted(device_id).await? {
            return Err(Rejection::DeviceBlacklisted.into());
        }
        let Some(mut binding) = self.store.find(user_id, device_id).await? else {
            return Err(Rejection::DeviceNotBound.into());
        };
        if binding.active {
            return Ok(binding);
        }

        binding.active = true;
        binding.updated_at = self.clock.now();
        Ok(self.store.save(&binding).await?)
    }

    /// Returns the usable binding, or the specific reason there is none.
    pub async fn check(&self, user_id: i64, device_id: &str) -> ServiceResult<Model> {
        if self.store.is_blacklisted(device_id).await? {
            return Err(Rejection::DeviceBlacklisted.into());
        }
        match self.store.find(user_id, device_id).await? {
            Some(binding) if binding.blacklisted => Err(Rejection::DeviceBlacklisted.into()),
            Some(binding) if binding.active => Ok(binding),
            _ => Err(Rejection::DeviceNotBound.into()),
        }
    }

    pub async fn verify(&self, user_id: i64, device_id: &str) -> ServiceResult<bool> {
        match self.check(user_id, device_id).await {
            Ok(_) => Ok(true),
            Err(ServiceError::Rejected(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Deactivates the binding. Unknown or already inactive bindings are not an error.
    pub async fn unbind(&self, user_id: i64, device_id: &str) -> ServiceResult<()> {
        if let Some(mut binding) = self.store.find(user_id, device_id).await? {
            if binding.active {
                binding.active = false;
                binding.updated_at = self.clock.now();
                self.store.save(&binding).await?;
                log::info!("user {user_id}: unbound device {device_id}");
            }
        }
        Ok(())
    }

    pub async fn blacklist(&self, device_id: &str) -> ServiceResult<u64> {
        Ok(self.store.blacklist_device(device_id, self.clock.now()).await?)
    }

    /// Lifts a blacklist. Bindings stay inactive and must be re-activated.
    pub async fn clear_blacklist(&self, device_id: &str) -> ServiceResult<u64> {
        Ok(self.store.clear_blacklist(device_id, self.clock.now()).await?)
    }

    /// Stamps `last_used_at` without writing back the rest of a possibly stale `binding`.
    pub async fn update_last_used(&self, binding: &Model) -> ServiceResult<()> {
        self.store.touch_last_used(binding.id, self.clock.now()).await?;
        Ok(())
    }

    pub async fn list_for(&self, user_id: i64) -> ServiceResult<Vec<Model>> {
        Ok(self.store.list_for(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::credential::CredentialPolicy;
    use chrono::{TimeZone, Utc};
    use db::models::user::{self, UserRole};
    use db::repositories::{CredentialRepository, DeviceBindingRepository};
    use db::test_utils::setup_test_db;
    use sea_orm::DatabaseConnection;

    type Registry = DeviceTrustRegistry<DeviceBindingRepository, CredentialRepository>;

    fn registry(db: &DatabaseConnection, requires_otp: bool) -> Registry {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()));
        DeviceTrustRegistry::new(
            DeviceBindingRepository::new(db.clone()),
            CredentialVerifier::new(CredentialRepository::new(db.clone()), CredentialPolicy::default(), clock.clone()),
            BindingPolicy { requires_otp },
            clock,
        )
    }

    #[tokio::test]
    async fn bind_requires_confirmation() {
        let db = setup_test_db().await;
        let alice = user::Model::create(&db, "alice", UserRole::Student).await.unwrap();
        let reg = registry(&db, true);

        let pending = reg.bind(alice.id, "dev-1", "Phone", "Pixel 8").await.unwrap();
        assert!(!pending.binding.active);
        let otp = pending.otp.expect("confirmation code issued");
        assert!(!reg.verify(alice.id, "dev-1").await.unwrap());

        let err = reg.confirm_binding(alice.id, "dev-1", "not-it").await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::OtpInvalid));

        let active = reg.confirm_binding(alice.id, "dev-1", &otp.code).await.unwrap();
        assert!(active.active);
        assert!(reg.verify(alice.id, "dev-1").await.unwrap());

        let again = reg.bind(alice.id, "dev-1", "Phone", "Pixel 8").await.unwrap_err();
        assert_eq!(again.rejection(), Some(Rejection::AlreadyBound));
    }

    #[tokio::test]
    async fn unbind_is_idempotent_and_rebind_reuses_row() {
        let db = setup_test_db().await;
        let alice = user::Model::create(&db, "alice", UserRole::Student).await.unwrap();
        let reg = registry(&db, false);

        reg.bind(alice.id, "dev-1", "Phone", "Pixel 8").await.unwrap();
        assert!(reg.verify(alice.id, "dev-1").await.unwrap());

        reg.unbind(alice.id, "dev-1").await.unwrap();
        reg.unbind(alice.id, "dev-1").await.unwrap();
        reg.unbind(alice.id, "never-bound").await.unwrap();
        let err = reg.check(alice.id, "dev-1").await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::DeviceNotBound));

        let rebound = reg.bind(alice.id, "dev-1", "Phone", "Pixel 9").await.unwrap();
        assert!(rebound.binding.active);
        assert_eq!(rebound.binding.device_model, "Pixel 9");
        assert_eq!(reg.list_for(alice.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blacklist_overrides_every_identity_until_cleared() {
        let db = setup_test_db().await;
        let alice = user::Model::create(&db, "alice", UserRole::Student).await.unwrap();
        let bob = user::Model::create(&db, "bob", UserRole::Student).await.unwrap();
        let reg = registry(&db, false);

        reg.bind(alice.id, "dev-1", "Phone", "Pixel 8").await.unwrap();
        reg.blacklist("dev-1").await.unwrap();

        let err = reg.check(alice.id, "dev-1").await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::DeviceBlacklisted));

        let err = reg.bind(bob.id, "dev-1", "Phone", "Pixel 8").await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::DeviceBlacklisted));

        reg.clear_blacklist("dev-1").await.unwrap();
        let err = reg.check(alice.id, "dev-1").await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::DeviceNotBound));

        reg.activate(alice.id, "dev-1").await.unwrap();
        assert!(reg.verify(alice.id, "dev-1").await.unwrap());
    }

    #[tokio::test]
    async fn update_last_used_only_touches_audit_field() {
        let db = setup_test_db().await;
        let alice = user::Model::create(&db, "alice", UserRole::Student).await.unwrap();
        let reg = registry(&db, false);

        let bound = reg.bind(alice.id, "dev-1", "Phone", "Pixel 8").await.unwrap().binding;
        assert!(bound.last_used_at.is_none());

        reg.update_last_used(&bound).await.unwrap();
        let used = reg.check(alice.id, "dev-1").await.unwrap();
        assert!(used.last_used_at.is_some());
        assert!(used.active);
    }

    #[tokio::test]
    async fn stale_last_used_update_keeps_blacklist() {
        let db = setup_test_db().await;
        let alice = user::Model::create(&db, "alice", UserRole::Student).await.unwrap();
        let reg = registry(&db, false);

        reg.bind(alice.id, "dev-1", "Phone", "Pixel 8").await.unwrap();
        let checked = reg.check(alice.id, "dev-1").await.unwrap();

        reg.blacklist("dev-1").await.unwrap();
        assert!(!reg.verify(alice.id, "dev-1").await.unwrap());

        reg.update_last_used(&checked).await.unwrap();
        assert!(!reg.verify(alice.id, "dev-1").await.unwrap());

        // Nor does re-activating a stale binding.
        reg.activate(alice.id, "dev-1").await.unwrap_err();
        reg.unbind(alice.id, "dev-1").await.unwrap();
        assert!(!reg.verify(alice.id, "dev-1").await.unwrap());
        let stored = reg.list_for(alice.id).await.unwrap();
        assert!(stored[0].blacklisted);
    }
}
