use db::repositories::StoreError;
use strum::{EnumString, IntoStaticStr};
use thiserror::Error;

/// Expected, recoverable outcomes of normal operation.
///
/// Each variant has a stable snake_case code (see [`Rejection::code`]) which is what
/// gets persisted on a rejected claim and what callers map to user-facing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, IntoStaticStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Rejection {
    #[error("session not found")]
    SessionNotFound,
    #[error("session is not accepting attendance")]
    SessionNotActive,
    #[error("transition not allowed from the current session state")]
    InvalidTransition,
    #[error("student is not enrolled for this session's course and year")]
    ScopeMismatch,
    #[error("device is not bound to this identity")]
    DeviceNotBound,
    #[error("device is blacklisted")]
    DeviceBlacklisted,
    #[error("device is already bound to this identity")]
    AlreadyBound,
    #[error("claimed location is outside the allowed area")]
    OutsideGeofence,
    #[error("claimed network does not match the authorised network")]
    NetworkMismatch,
    #[error("attendance already claimed for this session")]
    DuplicateClaim,
    #[error("record is already finalized")]
    AlreadyFinalized,
    #[error("one-time code has expired")]
    OtpExpired,
    #[error("one-time code is invalid")]
    OtpInvalid,
    #[error("too many attempts for this one-time code")]
    OtpMaxAttemptsExceeded,
    #[error("only the owning teacher may change this session")]
    NotSessionOwner,
    #[error("session schedule is invalid")]
    InvalidSchedule,
}

impl Rejection {
    pub fn code(self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("validation failed: {0}")]
    Validation(String),

    /// Infrastructure fault. Callers must fail closed.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            ServiceError::Rejected(r) => Some(*r),
            _ => None,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
