//! Runtime configuration for the attendance core.
//!
//! Values come from a `.env` file (if present) and the process environment.
//! The resulting [`Config`] is passed explicitly to whatever needs it; nothing
//! here is cached globally.

use std::env;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("{0} is only partially configured")]
    Incomplete(&'static str),
}

/// Fallback location evidence used when a session has no geofence of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct CampusGeofence {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
}

/// Fallback network evidence used when a session has no network of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampusNetwork {
    pub name: String,
    pub hardware_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub database_url: String,
    pub otp_length: usize,
    pub otp_ttl_minutes: i64,
    pub otp_max_attempts: i32,
    pub device_binding_requires_otp: bool,
    pub campus_geofence: Option<CampusGeofence>,
    pub campus_network: Option<CampusNetwork>,
}

impl Config {
    /// Loads `env_path` (ignored if missing) and then reads the environment.
    pub fn load(env_path: &str) -> Result<Self, ConfigError> {
        dotenvy::from_filename(env_path).ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let otp_length: usize = parse_or(&lookup, "OTP_LENGTH", 6)?;
        if !(4..=10).contains(&otp_length) {
            return Err(ConfigError::Invalid {
                var: "OTP_LENGTH",
                value: otp_length.to_string(),
            });
        }

        let otp_max_attempts: i32 = parse_or(&lookup, "OTP_MAX_ATTEMPTS", 3)?;
        if otp_max_attempts < 1 {
            return Err(ConfigError::Invalid {
                var: "OTP_MAX_ATTEMPTS",
                value: otp_max_attempts.to_string(),
            });
        }

        let otp_ttl_minutes: i64 = parse_or(&lookup, "OTP_TTL_MINUTES", 5)?;
        if otp_ttl_minutes < 1 {
            return Err(ConfigError::Invalid {
                var: "OTP_TTL_MINUTES",
                value: otp_ttl_minutes.to_string(),
            });
        }

        Ok(Config {
            project_name: lookup("PROJECT_NAME").unwrap_or_else(|| "attendance-core".into()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_file: lookup("LOG_FILE").unwrap_or_else(|| "logs/attendance.log".into()),
            database_url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            otp_length,
            otp_ttl_minutes,
            otp_max_attempts,
            device_binding_requires_otp: parse_or(&lookup, "DEVICE_BINDING_REQUIRES_OTP", true)?,
            campus_geofence: campus_geofence(&lookup)?,
            campus_network: campus_network(&lookup)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

fn parse_opt<F>(lookup: &F, var: &'static str) -> Result<Option<f64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => match value.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(ConfigError::Invalid { var, value }),
        },
    }
}

fn campus_geofence<F>(lookup: &F) -> Result<Option<CampusGeofence>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let latitude = parse_opt(lookup, "CAMPUS_LATITUDE")?;
    let longitude = parse_opt(lookup, "CAMPUS_LONGITUDE")?;
    let radius = parse_opt(lookup, "CAMPUS_RADIUS_METERS")?;

    match (latitude, longitude, radius) {
        (None, None, None) => Ok(None),
        (Some(latitude), Some(longitude), Some(radius_meters)) => {
            if radius_meters <= 0.0 {
                return Err(ConfigError::Invalid {
                    var: "CAMPUS_RADIUS_METERS",
                    value: radius_meters.to_string(),
                });
            }
            Ok(Some(CampusGeofence {
                latitude,
                longitude,
                radius_meters,
            }))
        }
        _ => Err(ConfigError::Incomplete("campus geofence")),
    }
}

fn campus_network<F>(lookup: &F) -> Result<Option<CampusNetwork>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let name = lookup("CAMPUS_NETWORK_NAME").filter(|s| !s.is_empty());
    let hardware_id = lookup("CAMPUS_NETWORK_HARDWARE_ID").filter(|s| !s.is_empty());

    match (name, hardware_id) {
        (None, None) => Ok(None),
        (Some(name), Some(hardware_id)) => Ok(Some(CampusNetwork { name, hardware_id })),
        _ => Err(ConfigError::Incomplete("campus network")),
    }
}
