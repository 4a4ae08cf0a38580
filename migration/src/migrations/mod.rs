pub mod m202510160001_create_users;
pub mod m202510160002_create_enrollments;
pub mod m202510160003_create_attendance_sessions;
pub mod m202510160004_create_attendance_claims;
pub mod m202510160005_create_device_bindings;
pub mod m202510160006_create_credential_verifications;
