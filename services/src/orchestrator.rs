//! The admission decision for an attendance claim.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. the session exists
//! 2. it is active and `now` falls inside its window
//! 3. the student is enrolled for the session's course and academic year
//! 4. the device is bound to the student, active and not blacklisted
//! 5. the claimed coordinate lies inside the allowed area, when one applies
//! 6. the claimed network matches the authorised one, when one applies
//!
//! Failures in 1–4 are returned without touching the ledger. Otherwise a claim is
//! stored (a duplicate is refused at this point) and immediately finalized as
//! `verified` or as `rejected` with the first evidence failure, so a rejected
//! attempt still occupies the student's single slot for the session.

use crate::attendance_ledger::AttendanceLedger;
use crate::clock::Clock;
use crate::credential::{CredentialPolicy, CredentialVerifier};
use crate::device_trust::{BindingPolicy, DeviceTrustRegistry};
use crate::error::{Rejection, ServiceError, ServiceResult};
use crate::geofence::{Coordinate, Geofence};
use crate::identity::Identity;
use crate::network::NetworkIdentity;
use crate::session_lifecycle::{is_within_window, SessionLifecycle};
use chrono::{DateTime, Utc};
use common::config::Config;
use db::models::attendance_claim::{self, ClaimOutcome, NewClaim};
use db::models::attendance_session;
use db::models::user::UserRole;
use db::repositories::{
    AttendanceRepository, AttendanceStore, CredentialRepository, CredentialStore, DeviceBindingRepository,
    DeviceBindingStore, EnrollmentRepository, EnrollmentStore, SessionRepository, SessionStore,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Campus-wide evidence used when a session carries none of its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CampusPolicy {
    pub geofence: Option<Geofence>,
    pub network: Option<NetworkIdentity>,
}

impl From<&Config> for CampusPolicy {
    fn from(config: &Config) -> Self {
        Self {
            geofence: config.campus_geofence.as_ref().map(|g| {
                Geofence::new(Coordinate::new(g.latitude, g.longitude), g.radius_meters)
            }),
            network: config
                .campus_network
                .as_ref()
                .map(|n| NetworkIdentity::new(n.name.clone(), n.hardware_id.clone())),
        }
    }
}

/// An attendance claim as submitted by an authenticated student.
#[derive(Debug, Clone)]
pub struct ClaimRequest {
    pub session_id: i64,
    pub student: Identity,
    pub coordinate: Option<Coordinate>,
    pub network: Option<NetworkIdentity>,
    pub device_id: String,
    /// Client-reported submission time. Recorded, not trusted for the window check.
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionDecision {
    Accepted(attendance_claim::Model),
    Rejected {
        reason: Rejection,
        /// The stored claim, when the rejection came from presence evidence.
        claim: Option<attendance_claim::Model>,
    },
}

impl AdmissionDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AdmissionDecision::Accepted(_))
    }

    pub fn reason(&self) -> Option<Rejection> {
        match self {
            AdmissionDecision::Accepted(_) => None,
            AdmissionDecision::Rejected { reason, .. } => Some(*reason),
        }
    }

    pub fn claim(&self) -> Option<&attendance_claim::Model> {
        match self {
            AdmissionDecision::Accepted(claim) => Some(claim),
            AdmissionDecision::Rejected { claim, .. } => claim.as_ref(),
        }
    }
}

#[derive(Debug)]
pub struct AdmissionOrchestrator<S, D, C, A, E> {
    sessions: SessionLifecycle<S>,
    devices: DeviceTrustRegistry<D, C>,
    ledger: AttendanceLedger<A>,
    enrollments: E,
    campus: CampusPolicy,
    clock: Arc<dyn Clock>,
}

/// Orchestrator wired to the `sea-orm` repositories.
pub type DbAdmissionOrchestrator = AdmissionOrchestrator<
    SessionRepository,
    DeviceBindingRepository,
    CredentialRepository,
    AttendanceRepository,
    EnrollmentRepository,
>;

impl DbAdmissionOrchestrator {
    pub fn from_connection(db: DatabaseConnection, config: &Config, clock: Arc<dyn Clock>) -> Self {
        let credentials = CredentialVerifier::new(
            CredentialRepository::new(db.clone()),
            CredentialPolicy::from(config),
            clock.clone(),
        );
        AdmissionOrchestrator::new(
            SessionLifecycle::new(SessionRepository::new(db.clone()), clock.clone()),
            DeviceTrustRegistry::new(
                DeviceBindingRepository::new(db.clone()),
                credentials,
                BindingPolicy::from(config),
                clock.clone(),
            ),
            AttendanceLedger::new(AttendanceRepository::new(db.clone())),
            EnrollmentRepository::new(db),
            CampusPolicy::from(config),
            clock,
        )
    }
}

impl<S, D, C, A, E> AdmissionOrchestrator<S, D, C, A, E>
where
    S: SessionStore,
    D: DeviceBindingStore,
    C: CredentialStore,
    A: AttendanceStore,
    E: EnrollmentStore,
{
    pub fn new(
        sessions: SessionLifecycle<S>,
        devices: DeviceTrustRegistry<D, C>,
        ledger: AttendanceLedger<A>,
        enrollments: E,
        campus: CampusPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            devices,
            ledger,
            enrollments,
            campus,
            clock,
        }
    }

    pub fn sessions(&self) -> &SessionLifecycle<S> {
        &self.sessions
    }

    pub fn devices(&self) -> &DeviceTrustRegistry<D, C> {
        &self.devices
    }

    pub fn ledger(&self) -> &AttendanceLedger<A> {
        &self.ledger
    }

    /// Decides a claim.
    ///
    /// Expected refusals come back as [`AdmissionDecision::Rejected`]. An `Err` means
    /// a collaborator failed and the claim must be treated as denied.
    pub async fn submit(&self, request: ClaimRequest) -> ServiceResult<AdmissionDecision> {
        match self.decide(&request).await {
            Ok(decision) => {
                match &decision {
                    AdmissionDecision::Accepted(claim) => log::info!(
                        "claim {} accepted: student {} session {}",
                        claim.id,
                        request.student.subject_id,
                        request.session_id
                    ),
                    AdmissionDecision::Rejected { reason, claim } => log::warn!(
                        "claim rejected ({}): student {} session {} stored={}",
                        reason.code(),
                        request.student.subject_id,
                        request.session_id,
                        claim.is_some()
                    ),
                }
                Ok(decision)
            }
            Err(e) => {
                log::error!(
                    "claim by student {} for session {} failed closed: {e}",
                    request.student.subject_id,
                    request.session_id
                );
                Err(e)
            }
        }
    }

    async fn decide(&self, request: &ClaimRequest) -> ServiceResult<AdmissionDecision> {
        let Some(session) = self.sessions.get(request.session_id).await? else {
            return Ok(rejected(Rejection::SessionNotFound));
        };

        if !is_within_window(&session, self.clock.now()) {
            return Ok(rejected(Rejection::SessionNotActive));
        }

        if !self.in_scope(&request.student, &session).await? {
            return Ok(rejected(Rejection::ScopeMismatch));
        }

        let binding = match self
            .devices
            .check(request.student.subject_id, &request.device_id)
            .await
        {
            Ok(binding) => binding,
            Err(ServiceError::Rejected(reason)) => return Ok(rejected(reason)),
            Err(e) => return Err(e),
        };

        let evidence_failure = self.check_evidence(&session, request);

        let claim = match self
            .ledger
            .create(NewClaim {
                session_id: session.id,
                student_id: request.student.subject_id,
                latitude: request.coordinate.map(|c| c.latitude),
                longitude: request.coordinate.map(|c| c.longitude),
                network_name: request.network.as_ref().map(|n| n.name.clone()),
                network_hardware_id: request.network.as_ref().map(|n| n.hardware_id.clone()),
                device_id: request.device_id.clone(),
                submitted_at: request.submitted_at,
            })
            .await
        {
            Ok(claim) => claim,
            Err(ServiceError::Rejected(reason)) => return Ok(rejected(reason)),
            Err(e) => return Err(e),
        };

        match evidence_failure {
            None => {
                let claim = self
                    .ledger
                    .record_outcome(claim.id, ClaimOutcome::Verified, None)
                    .await?;
                if let Err(e) = self.devices.update_last_used(&binding).await {
                    log::warn!("claim {} verified but device {} last-used not recorded: {e}", claim.id, binding.device_id);
                }
                Ok(AdmissionDecision::Accepted(claim))
            }
            Some(reason) => {
                let claim = self
                    .ledger
                    .record_outcome(claim.id, ClaimOutcome::Rejected, Some(reason))
                    .await?;
                Ok(AdmissionDecision::Rejected {
                    reason,
                    claim: Some(claim),
                })
            }
        }
    }

    async fn in_scope(&self, student: &Identity, session: &attendance_session::Model) -> ServiceResult<bool> {
        if student.role != UserRole::Student {
            return Ok(false);
        }
        Ok(self
            .enrollments
            .is_enrolled(student.subject_id, session.course_id, session.academic_year)
            .await?)
    }

    /// First failing presence check, if any.
    fn check_evidence(&self, session: &attendance_session::Model, request: &ClaimRequest) -> Option<Rejection> {
        let fence = session
            .allowed_area()
            .map(|(lat, lon, radius)| Geofence::new(Coordinate::new(lat, lon), radius))
            .or(self.campus.geofence);
        if let Some(fence) = fence {
            match request.coordinate {
                Some(point) if fence.contains(point) => {}
                _ => return Some(Rejection::OutsideGeofence),
            }
        }

        let network = session
            .allowed_network()
            .map(|(name, hw)| NetworkIdentity::new(name, hw))
            .or_else(|| self.campus.network.clone());
        if let Some(allowed) = network {
            match &request.network {
                Some(claimed) if claimed.matches_network(&allowed) => {}
                _ => return Some(Rejection::NetworkMismatch),
            }
        }

        None
    }
}

fn rejected(reason: Rejection) -> AdmissionDecision {
    AdmissionDecision::Rejected { reason, claim: None }
}
