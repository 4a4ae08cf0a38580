//! Scheduling and state transitions of attendance sessions.
//!
//! `scheduled → active → completed`, or `scheduled | active → cancelled`. All
//! transitions go through this module; callers never assign `status` directly.

use crate::clock::Clock;
use crate::error::{Rejection, ServiceError, ServiceResult};
use crate::identity::Identity;
use chrono::{DateTime, NaiveDate, Utc};
use common::format_validation_errors;
use db::models::attendance_session::{Model, NewSession, SessionStatus};
use db::models::user::UserRole;
use db::repositories::SessionStore;
use std::borrow::Cow;
use std::sync::Arc;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Validate)]
#[validate(schema(function = "validate_schedule"))]
pub struct ScheduleSession {
    pub course_id: i64,

    #[validate(range(min = 1, message = "Academic year must be positive"))]
    pub academic_year: i32,

    pub session_date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    #[validate(length(min = 1, message = "Network name cannot be empty"))]
    pub network_name: Option<String>,

    #[validate(length(min = 1, message = "Network hardware id cannot be empty"))]
    pub network_hardware_id: Option<String>,

    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: Option<f64>,

    #[validate(range(exclusive_min = 0.0, message = "Radius must be greater than zero"))]
    pub radius_meters: Option<f64>,
}

fn validate_schedule(input: &ScheduleSession) -> Result<(), ValidationError> {
    if input.end_time <= input.start_time {
        return Err(ValidationError::new("end_before_start")
            .with_message(Cow::from("End time must be after start time")));
    }

    let location = [
        input.latitude.is_some(),
        input.longitude.is_some(),
        input.radius_meters.is_some(),
    ];
    if location.iter().any(|&set| set) && !location.iter().all(|&set| set) {
        return Err(ValidationError::new("incomplete_location")
            .with_message(Cow::from("Latitude, longitude and radius must be given together")));
    }

    if input.network_name.is_some() != input.network_hardware_id.is_some() {
        return Err(ValidationError::new("incomplete_network")
            .with_message(Cow::from("Network name and hardware id must be given together")));
    }

    Ok(())
}

/// Whether attendance can be claimed at `instant`. Both ends are inclusive.
pub fn is_within_window(session: &Model, instant: DateTime<Utc>) -> bool {
    session.status == SessionStatus::Active && session.start_time <= instant && instant <= session.end_time
}

#[derive(Debug)]
pub struct SessionLifecycle<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: SessionStore> SessionLifecycle<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn get(&self, session_id: i64) -> ServiceResult<Option<Model>> {
        Ok(self.store.get(session_id).await?)
    }

    pub async fn list_active(&self) -> ServiceResult<Vec<Model>> {
        Ok(self.store.list_active().await?)
    }

    pub async fn schedule(&self, actor: &Identity, input: ScheduleSession) -> ServiceResult<Model> {
        if !matches!(actor.role, UserRole::Teacher | UserRole::Admin) {
            return Err(Rejection::NotSessionOwner.into());
        }
        input
            .validate()
            .map_err(|e| ServiceError::Validation(format_validation_errors(&e)))?;

        if input.end_time <= self.clock.now() {
            return Err(Rejection::InvalidSchedule.into());
        }

        let session = self
            .store
            .create(NewSession {
                teacher_id: actor.subject_id,
                course_id: input.course_id,
                academic_year: input.academic_year,
                session_date: input.session_date,
                start_time: input.start_time,
                end_time: input.end_time,
                network_name: input.network_name,
                network_hardware_id: input.network_hardware_id,
                latitude: input.latitude,
                longitude: input.longitude,
                radius_meters: input.radius_meters,
            })
            .await?;

        log::info!("session {} scheduled by teacher {}", session.id, session.teacher_id);
        Ok(session)
    }

    /// `scheduled → active`. The start time becomes now.
    pub async fn start(&self, actor: &Identity, session_id: i64) -> ServiceResult<Model> {
        let mut session = self.load_owned(actor, session_id).await?;
        let now = self.clock.now();

        if session.status != SessionStatus::Scheduled || now >= session.end_time {
            return Err(self.refuse(&session, "start"));
        }

        session.status = SessionStatus::Active;
        session.start_time = now;
        let session = self.store.save(&session).await?;
        log::info!("session {} started", session.id);
        Ok(session)
    }

    /// `active → completed`. The end time is pulled in to now if it has not passed yet.
    pub async fn end(&self, actor: &Identity, session_id: i64) -> ServiceResult<Model> {
        let mut session = self.load_owned(actor, session_id).await?;
        if session.status != SessionStatus::Active {
            return Err(self.refuse(&session, "end"));
        }

        let now = self.clock.now();
        if now < session.end_time && now > session.start_time {
            session.end_time = now;
        }
        session.status = SessionStatus::Completed;
        let session = self.store.save(&session).await?;
        log::info!("session {} completed", session.id);
        Ok(session)
    }

    /// `scheduled | active → cancelled`.
    pub async fn cancel(&self, actor: &Identity, session_id: i64) -> ServiceResult<Model> {
        let mut session = self.load_owned(actor, session_id).await?;
        if session.status.is_terminal() {
            return Err(self.refuse(&session, "cancel"));
        }

        session.status = SessionStatus::Cancelled;
        let session = self.store.save(&session).await?;
        log::info!("session {} cancelled", session.id);
        Ok(session)
    }

    async fn load_owned(&self, actor: &Identity, session_id: i64) -> ServiceResult<Model> {
        let session = self
            .store
            .get(session_id)
            .await?
            .ok_or(Rejection::SessionNotFound)?;

        if !actor.is_admin() && session.teacher_id != actor.subject_id {
            log::warn!("user {} tried to change session {session_id} they do not own", actor.subject_id);
            return Err(Rejection::NotSessionOwner.into());
        }
        Ok(session)
    }

    fn refuse(&self, session: &Model, action: &str) -> ServiceError {
        log::warn!("session {}: cannot {action} from {}", session.id, session.status);
        Rejection::InvalidTransition.into()
    }
}
