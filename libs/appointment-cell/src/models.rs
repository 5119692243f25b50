// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use hospital_cell::models::{HospitalError, HospitalType};
use shared_models::error::AppError;

pub use hospital_cell::models::Specialty;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    /// Public lookup key handed to the patient.
    pub code: String,
    pub user_id: Option<String>,
    pub patient_name: String,
    pub hospital_id: i64,
    pub doctor_id: Option<i64>,
    pub specialty: Specialty,
    pub scheduled_at: DateTime<Utc>,
    pub queue_position: i32,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_confirmed(&self) -> bool {
        self.status == AppointmentStatus::Confirmed
    }

    pub fn estimated_wait_minutes(&self, minutes_per_position: i32) -> i32 {
        self.queue_position * minutes_per_position
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Confirmed,
    Cancelled,
    Completed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Row to insert. The store assigns `id`, sets `status = confirmed` and
/// `updated_at = created_at`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewAppointment {
    pub code: String,
    pub user_id: Option<String>,
    pub patient_name: String,
    pub hospital_id: i64,
    pub doctor_id: Option<i64>,
    pub specialty: Specialty,
    pub scheduled_at: DateTime<Utc>,
    pub queue_position: i32,
    pub created_at: DateTime<Utc>,
}

/// A (hospital, calendar day) queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub hospital_id: i64,
    pub date: NaiveDate,
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hospital {} on {}", self.hospital_id, self.date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PositionChange {
    pub appointment_id: Uuid,
    pub from: i32,
    pub to: i32,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// A booking time as sent by clients: either with an explicit offset, or a
/// bare local time in the clinic's timezone.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RequestedTime {
    Zoned(DateTime<FixedOffset>),
    Local(NaiveDateTime),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_name: String,
    #[serde(alias = "hospital_id")]
    pub hospital: i64,
    #[serde(default, alias = "doctor_id")]
    pub doctor: Option<i64>,
    pub specialty: Specialty,
    #[serde(alias = "scheduled_at")]
    pub datetime: RequestedTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeRequest {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenumberRequest {
    pub hospital_id: i64,
    pub date: NaiveDate,
}

/// What a patient sees when checking a booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentStatusView {
    pub code: String,
    pub patient_name: String,
    pub hospital_name: String,
    pub hospital_address: String,
    pub hospital_type: HospitalType,
    pub doctor_name: Option<String>,
    pub specialty: Specialty,
    pub datetime: DateTime<Utc>,
    pub queue_position: i32,
    /// Minutes.
    pub estimated_wait_time: i32,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancelResponse {
    pub message: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenumberResponse {
    pub hospital_id: i64,
    pub date: NaiveDate,
    pub changed: usize,
}

// ==============================================================================
// ERROR HANDLING
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Hospital not found")]
    HospitalNotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Appointment is already cancelled")]
    AlreadyCancelled,

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Could not generate a unique appointment code after {attempts} attempts")]
    CodeSpaceExhausted { attempts: u32 },

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<HospitalError> for AppointmentError {
    fn from(error: HospitalError) -> Self {
        match error {
            HospitalError::NotFound => AppointmentError::HospitalNotFound,
            HospitalError::DatabaseError(msg) => AppointmentError::StorageError(msg),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        let message = error.to_string();
        match error {
            AppointmentError::NotFound
            | AppointmentError::HospitalNotFound
            | AppointmentError::DoctorNotFound => AppError::NotFound(message),
            AppointmentError::InvalidRequest(msg) => AppError::BadRequest(msg),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::AlreadyCancelled => AppError::BadRequest(message),
            AppointmentError::InvalidStatusTransition(_) => AppError::Conflict(message),
            AppointmentError::CodeSpaceExhausted { .. } => AppError::Internal(message),
            AppointmentError::Unauthorized(msg) => AppError::Forbidden(msg),
            AppointmentError::StorageError(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_request_accepts_both_time_forms() {
        let local: CreateAppointmentRequest = serde_json::from_value(json!({
            "patient_name": "Ivan Ivanov",
            "hospital": 1,
            "specialty": "Терапевт",
            "datetime": "2025-01-27T10:00:00"
        }))
        .unwrap();
        assert!(matches!(local.datetime, RequestedTime::Local(_)));
        assert_eq!(local.doctor, None);
        assert_eq!(local.specialty, Specialty::Therapist);

        let zoned: CreateAppointmentRequest = serde_json::from_value(json!({
            "patient_name": "Ivan Ivanov",
            "hospital_id": 1,
            "doctor_id": 4,
            "specialty": "therapist",
            "scheduled_at": "2025-01-27T10:00:00+05:00"
        }))
        .unwrap();
        assert!(matches!(zoned.datetime, RequestedTime::Zoned(_)));
        assert_eq!(zoned.doctor, Some(4));
    }

    #[test]
    fn test_missing_code_defaults_to_empty() {
        let request: CodeRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.code.is_empty());
    }

    #[test]
    fn test_error_mapping() {
        assert!(matches!(AppError::from(AppointmentError::AlreadyCancelled), AppError::BadRequest(_)));
        assert!(matches!(
            AppError::from(AppointmentError::InvalidStatusTransition(AppointmentStatus::Completed)),
            AppError::Conflict(_)
        ));
        assert!(matches!(AppError::from(AppointmentError::NotFound), AppError::NotFound(_)));
        assert!(matches!(
            AppError::from(AppointmentError::StorageError("down".into())),
            AppError::Database(_)
        ));
    }
}
