use crate::error::{Rejection, ServiceError, ServiceResult};
use db::models::attendance_claim::{ClaimOutcome, Model, NewClaim};
use db::repositories::{AttendanceStore, StoreError};

/// Per-session counts of claim outcomes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttendanceSummary {
    pub session_id: i64,
    pub total: usize,
    pub verified: usize,
    pub rejected: usize,
    pub pending: usize,
    /// `verified / total`, or `0.0` for a session without claims.
    pub attendance_rate: f64,
}

impl AttendanceSummary {
    fn from_claims(session_id: i64, claims: &[Model]) -> Self {
        let count = |outcome: ClaimOutcome| claims.iter().filter(|c| c.outcome == outcome).count();
        let total = claims.len();
        let verified = count(ClaimOutcome::Verified);
        let attendance_rate = if total == 0 {
            0.0
        } else {
            verified as f64 / total as f64
        };

        Self {
            session_id,
            total,
            verified,
            rejected: count(ClaimOutcome::Rejected),
            pending: count(ClaimOutcome::Pending),
            attendance_rate,
        }
    }
}

/// Append-only record of claims. At most one claim per `(session, student)`.
#[derive(Debug)]
pub struct AttendanceLedger<A> {
    store: A,
}

impl<A: AttendanceStore> AttendanceLedger<A> {
    pub fn new(store: A) -> Self {
        Self { store }
    }

    /// Records a `pending` claim.
    ///
    /// The existence check only short-circuits the common case; two racing requests
    /// are settled by the store's unique index, which surfaces here as
    /// [`Rejection::DuplicateClaim`] as well.
    pub async fn create(&self, claim: NewClaim) -> ServiceResult<Model> {
        if self.store.exists_for(claim.session_id, claim.student_id).await? {
            return Err(Rejection::DuplicateClaim.into());
        }

        match self.store.create(claim).await {
            Ok(created) => Ok(created),
            Err(StoreError::UniqueViolation(_)) => Err(Rejection::DuplicateClaim.into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Moves a `pending` claim to `verified` or `rejected`.
    pub async fn record_outcome(
        &self,
        claim_id: i64,
        outcome: ClaimOutcome,
        reason: Option<Rejection>,
    ) -> ServiceResult<Model> {
        if outcome == ClaimOutcome::Pending {
            return Err(ServiceError::Validation("pending is not a final outcome".into()));
        }

        let mut claim = self
            .store
            .find(claim_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("attendance claim {claim_id}")))?;

        if claim.outcome != ClaimOutcome::Pending {
            return Err(Rejection::AlreadyFinalized.into());
        }

        claim.outcome = outcome;
        claim.rejection_reason = reason.map(|r| r.code().to_owned());
        Ok(self.store.save(&claim).await?)
    }

    pub async fn exists_for(&self, session_id: i64, student_id: i64) -> ServiceResult<bool> {
        Ok(self.store.exists_for(session_id, student_id).await?)
    }

    pub async fn for_session(&self, session_id: i64) -> ServiceResult<Vec<Model>> {
        Ok(self.store.list_for_session(session_id).await?)
    }

    pub async fn for_student(&self, student_id: i64) -> ServiceResult<Vec<Model>> {
        Ok(self.store.list_for_student(student_id).await?)
    }

    pub async fn summary(&self, session_id: i64) -> ServiceResult<AttendanceSummary> {
        let claims = self.store.list_for_session(session_id).await?;
        Ok(AttendanceSummary::from_claims(session_id, &claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use db::models::attendance_session::NewSession;
    use db::models::user::{self, UserRole};
    use db::repositories::{AttendanceRepository, SessionRepository, SessionStore};
    use db::test_utils::setup_test_db;

    struct Fixture {
        ledger: AttendanceLedger<AttendanceRepository>,
        session_id: i64,
        students: Vec<i64>,
    }

    async fn fixture() -> Fixture {
        let db = setup_test_db().await;
        let teacher = user::Model::create(&db, "teacher", UserRole::Teacher).await.unwrap();
        let mut students = Vec::new();
        for name in ["s1", "s2", "s3"] {
            students.push(user::Model::create(&db, name, UserRole::Student).await.unwrap().id);
        }
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap();
        let session = SessionRepository::new(db.clone())
            .create(NewSession {
                teacher_id: teacher.id,
                course_id: 1,
                academic_year: 1,
                session_date: start.date_naive(),
                start_time: start,
                end_time: start + Duration::minutes(30),
                network_name: None,
                network_hardware_id: None,
                latitude: None,
                longitude: None,
                radius_meters: None,
            })
            .await
            .unwrap();

        Fixture {
            ledger: AttendanceLedger::new(AttendanceRepository::new(db)),
            session_id: session.id,
            students,
        }
    }

    fn claim(session_id: i64, student_id: i64) -> NewClaim {
        NewClaim {
            session_id,
            student_id,
            latitude: None,
            longitude: None,
            network_name: None,
            network_hardware_id: None,
            device_id: format!("dev-{student_id}"),
            submitted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_claim_is_rejected() {
        let f = fixture().await;
        let s = f.students[0];

        f.ledger.create(claim(f.session_id, s)).await.unwrap();
        let err = f.ledger.create(claim(f.session_id, s)).await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::DuplicateClaim));
        assert_eq!(f.ledger.for_session(f.session_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn outcome_is_final() {
        let f = fixture().await;
        let c = f.ledger.create(claim(f.session_id, f.students[0])).await.unwrap();

        let err = f.ledger.record_outcome(c.id, ClaimOutcome::Pending, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let rejected = f
            .ledger
            .record_outcome(c.id, ClaimOutcome::Rejected, Some(Rejection::NetworkMismatch))
            .await
            .unwrap();
        assert_eq!(rejected.rejection_reason.as_deref(), Some("network_mismatch"));

        let err = f.ledger.record_outcome(c.id, ClaimOutcome::Verified, None).await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::AlreadyFinalized));
    }

    #[tokio::test]
    async fn unknown_claim_is_a_store_error() {
        let f = fixture().await;
        let err = f.ledger.record_outcome(999, ClaimOutcome::Verified, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn summary_counts_outcomes() {
        let f = fixture().await;
        let empty = f.ledger.summary(f.session_id).await.unwrap();
        assert_eq!(empty.total, 0);
        assert_eq!(empty.attendance_rate, 0.0);

        let a = f.ledger.create(claim(f.session_id, f.students[0])).await.unwrap();
        let b = f.ledger.create(claim(f.session_id, f.students[1])).await.unwrap();
        f.ledger.create(claim(f.session_id, f.students[2])).await.unwrap();
        f.ledger.record_outcome(a.id, ClaimOutcome::Verified, None).await.unwrap();
        f.ledger
            .record_outcome(b.id, ClaimOutcome::Rejected, Some(Rejection::OutsideGeofence))
            .await
            .unwrap();

        let summary = f.ledger.summary(f.session_id).await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.verified, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.pending, 1);
        assert!((summary.attendance_rate - 1.0 / 3.0).abs() < 1e-12);

        assert_eq!(f.ledger.for_student(f.students[0]).await.unwrap().len(), 1);
    }
}
