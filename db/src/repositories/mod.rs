//! Store contracts the attendance core depends on, and their `sea-orm` implementations.

pub mod attendance_repository;
pub mod credential_repository;
pub mod device_binding_repository;
pub mod enrollment_repository;
pub mod error;
pub mod session_repository;
pub mod stores;

pub use attendance_repository::AttendanceRepository;
pub use credential_repository::CredentialRepository;
pub use device_binding_repository::DeviceBindingRepository;
pub use enrollment_repository::EnrollmentRepository;
pub use error::{StoreError, StoreResult};
pub use session_repository::SessionRepository;
pub use stores::{AttendanceStore, CredentialStore, DeviceBindingStore, EnrollmentStore, SessionStore};
