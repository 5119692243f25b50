// libs/hospital-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

// ==============================================================================
// DIRECTORY MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HospitalType {
    #[serde(alias = "Поликлиника")]
    Polyclinic,

    #[serde(alias = "Больница")]
    Hospital,

    #[serde(alias = "Детская")]
    Children,

    #[serde(alias = "Спец. клиника")]
    SpecialtyClinic,
}

impl fmt::Display for HospitalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HospitalType::Polyclinic => write!(f, "polyclinic"),
            HospitalType::Hospital => write!(f, "hospital"),
            HospitalType::Children => write!(f, "children"),
            HospitalType::SpecialtyClinic => write!(f, "specialty_clinic"),
        }
    }
}

/// Medical specialties a patient can queue for. Declaration order is the
/// display order used when grouping doctors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Specialty {
    #[serde(alias = "Терапевт")]
    Therapist,
    #[serde(alias = "Хирург")]
    Surgeon,
    #[serde(alias = "Стоматолог")]
    Dentist,
    #[serde(alias = "Педиатр")]
    Pediatrician,
    #[serde(alias = "Кардиолог")]
    Cardiologist,
    #[serde(alias = "Невролог")]
    Neurologist,
    #[serde(alias = "Офтальмолог")]
    Ophthalmologist,
    #[serde(alias = "Дерматолог")]
    Dermatologist,
    #[serde(alias = "Эндокринолог")]
    Endocrinologist,
    #[serde(alias = "Гинеколог")]
    Gynecologist,
    #[serde(alias = "Уролог")]
    Urologist,
    #[serde(alias = "Психиатр")]
    Psychiatrist,
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Specialty::Therapist => "therapist",
            Specialty::Surgeon => "surgeon",
            Specialty::Dentist => "dentist",
            Specialty::Pediatrician => "pediatrician",
            Specialty::Cardiologist => "cardiologist",
            Specialty::Neurologist => "neurologist",
            Specialty::Ophthalmologist => "ophthalmologist",
            Specialty::Dermatologist => "dermatologist",
            Specialty::Endocrinologist => "endocrinologist",
            Specialty::Gynecologist => "gynecologist",
            Specialty::Urologist => "urologist",
            Specialty::Psychiatrist => "psychiatrist",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hospital {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub hospital_type: HospitalType,
    pub address: String,
    /// Average wait in minutes as advertised by the hospital.
    #[serde(default = "default_waiting_time")]
    pub waiting_time: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: i64,
    pub hospital_id: i64,
    pub full_name: String,
    pub specialty: Specialty,
    #[serde(default)]
    pub cabinet: String,
    #[serde(default = "default_work_days")]
    pub work_days: String,
    #[serde(default = "default_work_hours")]
    pub work_hours: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_waiting_time() -> i32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_work_days() -> String {
    "Mon-Fri".to_string()
}

fn default_work_hours() -> String {
    "08:00-18:00".to_string()
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HospitalSummary {
    #[serde(flatten)]
    pub hospital: Hospital,
    /// Confirmed appointments from now on.
    pub current_queue: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub id: i64,
    pub full_name: String,
    pub cabinet: String,
    pub work_days: String,
    pub work_hours: String,
    pub current_queue: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialtyGroup {
    pub specialty: Specialty,
    pub doctors: Vec<DoctorSummary>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum HospitalError {
    #[error("Hospital not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<HospitalError> for AppError {
    fn from(error: HospitalError) -> Self {
        match error {
            HospitalError::NotFound => AppError::NotFound("Hospital not found".to_string()),
            HospitalError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
