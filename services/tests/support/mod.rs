#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use common::config::{CampusGeofence, CampusNetwork, Config};
use db::models::attendance_session;
use db::models::{enrollment, user};
use db::models::user::UserRole;
use db::test_utils::setup_test_db;
use sea_orm::DatabaseConnection;
use services::clock::{Clock, ManualClock};
use services::geofence::Coordinate;
use services::identity::Identity;
use services::network::NetworkIdentity;
use services::session_lifecycle::ScheduleSession;
use db::repositories::{
    AttendanceRepository, CredentialRepository, DeviceBindingStore, EnrollmentRepository, SessionRepository,
};
use services::attendance_ledger::AttendanceLedger;
use services::credential::{CredentialPolicy, CredentialVerifier};
use services::device_trust::{BindingPolicy, DeviceTrustRegistry};
use services::orchestrator::CampusPolicy;
use services::session_lifecycle::SessionLifecycle;
use services::{AdmissionOrchestrator, ClaimRequest, DbAdmissionOrchestrator};
use std::sync::Arc;

pub const COURSE: i64 = 301;
pub const YEAR: i32 = 3;

pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
}

pub fn config() -> Config {
    Config {
        project_name: "attendance-core".into(),
        log_level: "debug".into(),
        log_file: "logs/test.log".into(),
        database_url: "sqlite::memory:".into(),
        otp_length: 6,
        otp_ttl_minutes: 5,
        otp_max_attempts: 3,
        device_binding_requires_otp: false,
        campus_geofence: None,
        campus_network: None,
    }
}

pub fn config_with_campus() -> Config {
    Config {
        campus_geofence: Some(CampusGeofence {
            latitude: 0.0,
            longitude: 0.0,
            radius_meters: 100.0,
        }),
        campus_network: Some(CampusNetwork {
            name: "eduroam".into(),
            hardware_id: "00:11".into(),
        }),
        ..config()
    }
}

pub struct World {
    pub db: DatabaseConnection,
    pub clock: Arc<ManualClock>,
    pub core: DbAdmissionOrchestrator,
    pub teacher: Identity,
}

impl World {
    pub async fn new(config: Config) -> Self {
        let db = setup_test_db().await;
        let clock = Arc::new(ManualClock::new(at(9, 50)));
        let teacher = user::Model::create(&db, "teacher", UserRole::Teacher).await.unwrap();
        let core = DbAdmissionOrchestrator::from_connection(db.clone(), &config, clock.clone() as Arc<dyn Clock>);
        Self {
            db,
            clock,
            core,
            teacher: Identity::teacher(teacher.id),
        }
    }

    /// Creates an enrolled student.
    pub async fn student(&self, username: &str) -> Identity {
        let s = user::Model::create(&self.db, username, UserRole::Student).await.unwrap();
        enrollment::Model::create(&self.db, s.id, COURSE, YEAR).await.unwrap();
        Identity::student(s.id)
    }

    /// Creates a student and binds `device_id` to them, activated.
    pub async fn student_with_device(&self, username: &str, device_id: &str) -> Identity {
        let s = self.student(username).await;
        self.core
            .devices()
            .bind(s.subject_id, device_id, "Phone", "Pixel 8")
            .await
            .unwrap();
        self.core.devices().activate(s.subject_id, device_id).await.unwrap();
        s
    }

    /// Schedules and starts a 10:00–10:30 session with the given evidence, leaving
    /// the clock at 10:00.
    pub async fn active_session(
        &self,
        area: Option<(f64, f64, f64)>,
        network: Option<(&str, &str)>,
    ) -> attendance_session::Model {
        self.clock.set(at(9, 50));
        let session = self
            .core
            .sessions()
            .schedule(
                &self.teacher,
                ScheduleSession {
                    course_id: COURSE,
                    academic_year: YEAR,
                    session_date: at(10, 0).date_naive(),
                    start_time: at(10, 0),
                    end_time: at(10, 30),
                    network_name: network.map(|n| n.0.to_owned()),
                    network_hardware_id: network.map(|n| n.1.to_owned()),
                    latitude: area.map(|a| a.0),
                    longitude: area.map(|a| a.1),
                    radius_meters: area.map(|a| a.2),
                },
            )
            .await
            .unwrap();
        self.clock.set(at(10, 0));
        self.core.sessions().start(&self.teacher, session.id).await.unwrap()
    }

    /// A second orchestrator over the same database and clock, with `devices` as its
    /// binding store.
    pub fn core_with_devices<D: DeviceBindingStore>(
        &self,
        devices: D,
    ) -> AdmissionOrchestrator<SessionRepository, D, CredentialRepository, AttendanceRepository, EnrollmentRepository>
    {
        let clock = self.clock.clone() as Arc<dyn Clock>;
        AdmissionOrchestrator::new(
            SessionLifecycle::new(SessionRepository::new(self.db.clone()), clock.clone()),
            DeviceTrustRegistry::new(
                devices,
                CredentialVerifier::new(
                    CredentialRepository::new(self.db.clone()),
                    CredentialPolicy::default(),
                    clock.clone(),
                ),
                BindingPolicy { requires_otp: false },
                clock.clone(),
            ),
            AttendanceLedger::new(AttendanceRepository::new(self.db.clone())),
            EnrollmentRepository::new(self.db.clone()),
            CampusPolicy::default(),
            clock,
        )
    }

    pub async fn standard_session(&self) -> attendance_session::Model {
        self.active_session(Some((0.0, 0.0, 50.0)), Some(("CampusNet", "AA:BB"))).await
    }
}

pub fn claim(
    session_id: i64,
    student: Identity,
    device_id: &str,
    point: Option<(f64, f64)>,
    network: Option<(&str, &str)>,
    submitted_at: DateTime<Utc>,
) -> ClaimRequest {
    ClaimRequest {
        session_id,
        student,
        coordinate: point.map(|(lat, lon)| Coordinate::new(lat, lon)),
        network: network.map(|(name, hw)| NetworkIdentity::new(name, hw)),
        device_id: device_id.to_owned(),
        submitted_at,
    }
}
