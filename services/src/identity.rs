use db::models::user::UserRole;

/// An already-authenticated subject, as handed over by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub subject_id: i64,
    pub role: UserRole,
}

impl Identity {
    pub fn new(subject_id: i64, role: UserRole) -> Self {
        Self { subject_id, role }
    }

    pub fn student(subject_id: i64) -> Self {
        Self::new(subject_id, UserRole::Student)
    }

    pub fn teacher(subject_id: i64) -> Self {
        Self::new(subject_id, UserRole::Teacher)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}
