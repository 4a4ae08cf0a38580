pub mod attendance_claim;
pub mod attendance_session;
pub mod credential_verification;
pub mod device_binding;
pub mod enrollment;
pub mod user;

pub use attendance_claim::Entity as AttendanceClaim;
pub use attendance_session::Entity as AttendanceSession;
pub use credential_verification::Entity as CredentialVerification;
pub use device_binding::Entity as DeviceBinding;
pub use enrollment::Entity as Enrollment;
pub use user::Entity as User;
