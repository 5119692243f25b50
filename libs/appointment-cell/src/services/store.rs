use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use hospital_cell::models::HospitalError;
use hospital_cell::QueueCounter;
use shared_config::AppConfig;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, NewAppointment};
use crate::services::supabase_store::SupabaseAppointmentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpcomingFilter {
    Hospital(i64),
    Doctor(i64),
}

/// Persistence seam for appointments.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, AppointmentError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<Appointment>, AppointmentError>;

    async fn code_exists(&self, code: &str) -> Result<bool, AppointmentError>;

    async fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError>;

    async fn update_queue_position(&self, id: Uuid, position: i32) -> Result<(), AppointmentError>;

    /// Appointments of one hospital with `from <= scheduled_at < to`, ordered by
    /// `scheduled_at` ascending. `status = None` returns every status.
    async fn list_in_range(
        &self,
        hospital_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// Newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Appointment>, AppointmentError>;

    /// Confirmed appointments scheduled at or after `since`.
    async fn count_upcoming(
        &self,
        filter: UpcomingFilter,
        since: DateTime<Utc>,
    ) -> Result<u32, AppointmentError>;
}

pub fn store_from_config(config: &AppConfig) -> Arc<dyn AppointmentStore> {
    if config.is_configured() {
        Arc::new(SupabaseAppointmentStore::new(config))
    } else {
        info!("Supabase not configured, appointments are kept in memory");
        Arc::new(InMemoryAppointmentStore::new())
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    rows: RwLock<Vec<Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Appointment> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, AppointmentError> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|row| row.code == appointment.code) {
            return Err(AppointmentError::StorageError(format!(
                "Conflict: code {} already exists",
                appointment.code
            )));
        }

        let row = Appointment {
            id: Uuid::new_v4(),
            code: appointment.code,
            user_id: appointment.user_id,
            patient_name: appointment.patient_name,
            hospital_id: appointment.hospital_id,
            doctor_id: appointment.doctor_id,
            specialty: appointment.specialty,
            scheduled_at: appointment.scheduled_at,
            queue_position: appointment.queue_position,
            status: AppointmentStatus::Confirmed,
            created_at: appointment.created_at,
            updated_at: appointment.created_at,
        };
        rows.push(row.clone());
        debug!("Stored appointment {} in memory", row.id);
        Ok(row)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.rows.read().await.iter().find(|row| row.code == code).cloned())
    }

    async fn code_exists(&self, code: &str) -> Result<bool, AppointmentError> {
        Ok(self.rows.read().await.iter().any(|row| row.code == code))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let mut rows = self.rows.write().await;
        let row = rows.iter_mut().find(|row| row.id == id).ok_or(AppointmentError::NotFound)?;
        row.status = status;
        row.updated_at = at;
        Ok(row.clone())
    }

    async fn update_queue_position(&self, id: Uuid, position: i32) -> Result<(), AppointmentError> {
        let mut rows = self.rows.write().await;
        let row = rows.iter_mut().find(|row| row.id == id).ok_or(AppointmentError::NotFound)?;
        row.queue_position = position;
        Ok(())
    }

    async fn list_in_range(
        &self,
        hospital_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut matching: Vec<Appointment> = self.rows.read().await
            .iter()
            .filter(|row| row.hospital_id == hospital_id)
            .filter(|row| row.scheduled_at >= from && row.scheduled_at < to)
            .filter(|row| status.map_or(true, |s| row.status == s))
            .cloned()
            .collect();
        matching.sort_by_key(|row| row.scheduled_at);
        Ok(matching)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let mut mine: Vec<Appointment> = self.rows.read().await
            .iter()
            .filter(|row| row.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mine)
    }

    async fn count_upcoming(
        &self,
        filter: UpcomingFilter,
        since: DateTime<Utc>,
    ) -> Result<u32, AppointmentError> {
        let count = self.rows.read().await
            .iter()
            .filter(|row| row.is_confirmed() && row.scheduled_at >= since)
            .filter(|row| match filter {
                UpcomingFilter::Hospital(id) => row.hospital_id == id,
                UpcomingFilter::Doctor(id) => row.doctor_id == Some(id),
            })
            .count();
        Ok(count as u32)
    }
}

// ==============================================================================
// QUEUE COUNTER ADAPTER
// ==============================================================================

/// Feeds hospital and doctor listings with live queue lengths.
pub struct StoreQueueCounter {
    store: Arc<dyn AppointmentStore>,
}

impl StoreQueueCounter {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl QueueCounter for StoreQueueCounter {
    async fn upcoming_for_hospital(
        &self,
        hospital_id: i64,
        since: DateTime<Utc>,
    ) -> Result<u32, HospitalError> {
        self.store
            .count_upcoming(UpcomingFilter::Hospital(hospital_id), since)
            .await
            .map_err(|e| HospitalError::DatabaseError(e.to_string()))
    }

    async fn upcoming_for_doctor(
        &self,
        doctor_id: i64,
        since: DateTime<Utc>,
    ) -> Result<u32, HospitalError> {
        self.store
            .count_upcoming(UpcomingFilter::Doctor(doctor_id), since)
            .await
            .map_err(|e| HospitalError::DatabaseError(e.to_string()))
    }
}
