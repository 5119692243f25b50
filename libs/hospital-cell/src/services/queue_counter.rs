use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::HospitalError;

/// Counts confirmed appointments scheduled at or after `since`.
///
/// The directory does not own appointments; whoever does (the appointment
/// store) plugs in here so listings can show how long the queue is.
#[async_trait]
pub trait QueueCounter: Send + Sync {
    async fn upcoming_for_hospital(
        &self,
        hospital_id: i64,
        since: DateTime<Utc>,
    ) -> Result<u32, HospitalError>;

    async fn upcoming_for_doctor(
        &self,
        doctor_id: i64,
        since: DateTime<Utc>,
    ) -> Result<u32, HospitalError>;
}
