//! Attendance verification and admission core.

pub mod attendance_ledger;
pub mod clock;
pub mod credential;
pub mod device_trust;
pub mod error;
pub mod geofence;
pub mod identity;
pub mod network;
pub mod orchestrator;
pub mod session_lifecycle;

pub use error::{Rejection, ServiceError, ServiceResult};
pub use orchestrator::{AdmissionDecision, AdmissionOrchestrator, ClaimRequest, DbAdmissionOrchestrator};
