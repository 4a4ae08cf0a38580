//! Collaborator contracts consumed by the attendance core.
//!
//! Every store reads and writes persisted state directly; none of them caches, so
//! a write (for example a blacklist) is visible to the next read.

use crate::models::{
    attendance_claim::{self, NewClaim},
    attendance_session::{self, NewSession},
    credential_verification::{self, CredentialPurpose, NewCredential},
    device_binding::{self, NewBinding},
};
use crate::repositories::error::StoreResult;
use chrono::{DateTime, Utc};

pub trait SessionStore: Send + Sync {
    fn get(&self, id: i64) -> impl Future<Output = StoreResult<Option<attendance_session::Model>>> + Send;
    fn create(&self, input: NewSession) -> impl Future<Output = StoreResult<attendance_session::Model>> + Send;
    fn save(
        &self,
        session: &attendance_session::Model,
    ) -> impl Future<Output = StoreResult<attendance_session::Model>> + Send;
    fn list_active(&self) -> impl Future<Output = StoreResult<Vec<attendance_session::Model>>> + Send;
}

pub trait DeviceBindingStore: Send + Sync {
    fn find(
        &self,
        user_id: i64,
        device_id: &str,
    ) -> impl Future<Output = StoreResult<Option<device_binding::Model>>> + Send;
    fn create(&self, input: NewBinding) -> impl Future<Output = StoreResult<device_binding::Model>> + Send;
    /// Writes the descriptive fields and `active`. `blacklisted` is only ever changed
    /// by [`blacklist_device`](Self::blacklist_device) and
    /// [`clear_blacklist`](Self::clear_blacklist).
    fn save(
        &self,
        binding: &device_binding::Model,
    ) -> impl Future<Output = StoreResult<device_binding::Model>> + Send;
    /// Sets `last_used_at` on one binding and nothing else. Returns rows touched.
    fn touch_last_used(&self, id: i64, at: DateTime<Utc>) -> impl Future<Output = StoreResult<u64>> + Send;
    /// True if any binding of this physical device, for any identity, is blacklisted.
    fn is_blacklisted(&self, device_id: &str) -> impl Future<Output = StoreResult<bool>> + Send;
    /// Blacklists and deactivates every binding of `device_id`. Returns rows touched.
    fn blacklist_device(
        &self,
        device_id: &str,
        at: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<u64>> + Send;
    /// Lifts the blacklist on every binding of `device_id`; bindings stay inactive.
    fn clear_blacklist(
        &self,
        device_id: &str,
        at: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<u64>> + Send;
    fn list_for(&self, user_id: i64) -> impl Future<Output = StoreResult<Vec<device_binding::Model>>> + Send;
}

pub trait AttendanceStore: Send + Sync {
    fn exists_for(&self, session_id: i64, student_id: i64) -> impl Future<Output = StoreResult<bool>> + Send;
    /// Inserts a `pending` claim. A second claim for the same `(session, student)`
    /// fails with [`StoreError::UniqueViolation`](crate::repositories::StoreError::UniqueViolation).
    fn create(&self, input: NewClaim) -> impl Future<Output = StoreResult<attendance_claim::Model>> + Send;
    fn save(
        &self,
        claim: &attendance_claim::Model,
    ) -> impl Future<Output = StoreResult<attendance_claim::Model>> + Send;
    fn find(&self, id: i64) -> impl Future<Output = StoreResult<Option<attendance_claim::Model>>> + Send;
    fn list_for_session(
        &self,
        session_id: i64,
    ) -> impl Future<Output = StoreResult<Vec<attendance_claim::Model>>> + Send;
    fn list_for_student(
        &self,
        student_id: i64,
    ) -> impl Future<Output = StoreResult<Vec<attendance_claim::Model>>> + Send;
}

pub trait CredentialStore: Send + Sync {
    /// Most recently created record for the pair, whatever its status.
    fn latest_for(
        &self,
        user_id: i64,
        purpose: CredentialPurpose,
    ) -> impl Future<Output = StoreResult<Option<credential_verification::Model>>> + Send;
    fn create(
        &self,
        input: NewCredential,
    ) -> impl Future<Output = StoreResult<credential_verification::Model>> + Send;
    /// Persists an attempt on `record` only if the stored row is still `pending` with
    /// `expected_attempts` attempts. Returns `false` when another attempt got there first.
    fn save_attempt(
        &self,
        record: &credential_verification::Model,
        expected_attempts: i32,
    ) -> impl Future<Output = StoreResult<bool>> + Send;
    /// Moves every `pending` record of the pair to `invalid`. Returns rows touched.
    fn invalidate_pending(
        &self,
        user_id: i64,
        purpose: CredentialPurpose,
        at: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<u64>> + Send;
}

pub trait EnrollmentStore: Send + Sync {
    fn is_enrolled(
        &self,
        student_id: i64,
        course_id: i64,
        academic_year: i32,
    ) -> impl Future<Output = StoreResult<bool>> + Send;
}
