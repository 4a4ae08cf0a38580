//! One-time code issuance and verification.
//!
//! A record moves `pending → verified | expired | invalid` and never leaves a
//! terminal state. Reissuing a code for the same `(user, purpose)` invalidates every
//! older pending code first, so at most one code is ever live.

use crate::clock::Clock;
use crate::error::{Rejection, ServiceResult};
use chrono::{DateTime, Duration, Utc};
use common::config::Config;
use db::models::credential_verification::{CredentialPurpose, CredentialStatus, Model, NewCredential};
use db::repositories::CredentialStore;
use rand::Rng;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialPolicy {
    pub code_length: usize,
    pub ttl: Duration,
    pub max_attempts: i32,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            code_length: 6,
            ttl: Duration::minutes(5),
            max_attempts: 3,
        }
    }
}

impl From<&Config> for CredentialPolicy {
    fn from(config: &Config) -> Self {
        Self {
            code_length: config.otp_length,
            ttl: Duration::minutes(config.otp_ttl_minutes),
            max_attempts: config.otp_max_attempts,
        }
    }
}

/// Digits-only code of the given length.
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Applies one verification attempt to `record` in place.
///
/// Expiry is checked before the attempt counter moves. Once the counter reaches the
/// maximum on a wrong code the record is `invalid`, so a correct code supplied
/// afterwards is refused with [`Rejection::AlreadyFinalized`].
pub fn attempt(record: &mut Model, supplied_code: &str, now: DateTime<Utc>) -> Result<(), Rejection> {
    if record.status != CredentialStatus::Pending {
        return Err(Rejection::AlreadyFinalized);
    }

    if now > record.expires_at {
        record.status = CredentialStatus::Expired;
        record.updated_at = now;
        return Err(Rejection::OtpExpired);
    }

    if record.attempt_count >= record.max_attempts {
        record.status = CredentialStatus::Invalid;
        record.updated_at = now;
        return Err(Rejection::OtpMaxAttemptsExceeded);
    }

    record.attempt_count += 1;
    record.updated_at = now;

    if supplied_code == record.code {
        record.status = CredentialStatus::Verified;
        record.verified_at = Some(now);
        return Ok(());
    }

    if record.attempt_count >= record.max_attempts {
        record.status = CredentialStatus::Invalid;
        return Err(Rejection::OtpMaxAttemptsExceeded);
    }
    Err(Rejection::OtpInvalid)
}

#[derive(Debug)]
pub struct CredentialVerifier<C> {
    store: C,
    policy: CredentialPolicy,
    clock: Arc<dyn Clock>,
}

impl<C: CredentialStore> CredentialVerifier<C> {
    pub fn new(store: C, policy: CredentialPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { store, policy, clock }
    }

    pub fn policy(&self) -> &CredentialPolicy {
        &self.policy
    }

    pub async fn issue(&self, user_id: i64, purpose: CredentialPurpose) -> ServiceResult<Model> {
        self.issue_with_ttl(user_id, purpose, self.policy.ttl).await
    }

    pub async fn issue_with_ttl(
        &self,
        user_id: i64,
        purpose: CredentialPurpose,
        ttl: Duration,
    ) -> ServiceResult<Model> {
        let now = self.clock.now();

        let superseded = self.store.invalidate_pending(user_id, purpose, now).await?;
        if superseded > 0 {
            log::debug!("user {user_id}: {superseded} pending {purpose} code(s) superseded");
        }

        let record = self
            .store
            .create(NewCredential {
                user_id,
                code: generate_code(self.policy.code_length),
                purpose,
                max_attempts: self.policy.max_attempts,
                expires_at: now + ttl,
                created_at: now,
            })
            .await?;

        log::info!("issued {purpose} code for user {user_id}, expires {}", record.expires_at);
        Ok(record)
    }

    /// Checks `code` against the latest record for `(user_id, purpose)` and persists
    /// whatever the attempt changed.
    ///
    /// The write only lands if the record is unchanged since it was read. A lost race
    /// re-reads and tries again; each loss means another attempt was stored, so the
    /// loop ends once the record leaves `pending` or the counter reaches its limit.
    pub async fn verify(&self, user_id: i64, purpose: CredentialPurpose, code: &str) -> ServiceResult<Model> {
        loop {
            let Some(mut record) = self.store.latest_for(user_id, purpose).await? else {
                return Err(Rejection::OtpInvalid.into());
            };

            let read_attempts = record.attempt_count;
            let result = attempt(&mut record, code, self.clock.now());
            if result != Err(Rejection::AlreadyFinalized) && !self.store.save_attempt(&record, read_attempts).await? {
                log::debug!("user {user_id}: {purpose} code changed during attempt, re-reading");
                continue;
            }

            return match result {
                Ok(()) => {
                    log::info!("user {user_id}: {purpose} code verified");
                    Ok(record)
                }
                Err(reason) => {
                    log::warn!("user {user_id}: {purpose} code refused ({})", reason.code());
                    Err(reason.into())
                }
            };
        }
    }
}
