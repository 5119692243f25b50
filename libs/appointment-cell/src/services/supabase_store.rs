use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, NewAppointment};
use crate::services::store::{AppointmentStore, UpcomingFilter};

const PAGE_SIZE: usize = 500;

/// Appointments kept in the `appointments` table behind PostgREST.
pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            None,
            None,
        ).await.map_err(|e| AppointmentError::StorageError(e.to_string()))?;

        parse_rows(result)
    }

    /// Like `fetch`, but keeps paging past the server's row cap.
    async fn fetch_all(&self, path: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let result: Vec<Value> = self.supabase
            .fetch_all(path, None, PAGE_SIZE)
            .await
            .map_err(|e| AppointmentError::StorageError(e.to_string()))?;

        parse_rows(result)
    }

    async fn patch(&self, id: Uuid, body: Value) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(body),
            Some(SupabaseClient::return_representation()),
        ).await.map_err(|e| AppointmentError::StorageError(e.to_string()))?;

        parse_rows(result)
    }
}

fn parse_rows(rows: Vec<Value>) -> Result<Vec<Appointment>, AppointmentError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<Appointment>, _>>()
        .map_err(|e| AppointmentError::StorageError(format!("Failed to parse appointment: {}", e)))
}

fn encode_time(at: DateTime<Utc>) -> String {
    urlencoding::encode(&at.to_rfc3339()).into_owned()
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, AppointmentError> {
        let body = json!({
            "id": Uuid::new_v4(),
            "code": appointment.code,
            "user_id": appointment.user_id,
            "patient_name": appointment.patient_name,
            "hospital_id": appointment.hospital_id,
            "doctor_id": appointment.doctor_id,
            "specialty": appointment.specialty,
            "scheduled_at": appointment.scheduled_at.to_rfc3339(),
            "queue_position": appointment.queue_position,
            "status": AppointmentStatus::Confirmed,
            "created_at": appointment.created_at.to_rfc3339(),
            "updated_at": appointment.created_at.to_rfc3339()
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            None,
            Some(body),
            Some(SupabaseClient::return_representation()),
        ).await.map_err(|e| AppointmentError::StorageError(e.to_string()))?;

        let created = parse_rows(result)?
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::StorageError("Failed to create appointment".to_string()))?;

        info!("Appointment {} stored with code {}", created.id, created.code);
        Ok(created)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?code=eq.{}", urlencoding::encode(code));
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn code_exists(&self, code: &str) -> Result<bool, AppointmentError> {
        let path = format!("/rest/v1/appointments?code=eq.{}&select=id&limit=1", urlencoding::encode(code));
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| AppointmentError::StorageError(e.to_string()))?;

        Ok(!result.is_empty())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Setting appointment {} to {}", id, status);
        self.patch(id, json!({ "status": status, "updated_at": at.to_rfc3339() }))
            .await?
            .into_iter()
            .next()
            .ok_or(AppointmentError::NotFound)
    }

    async fn update_queue_position(&self, id: Uuid, position: i32) -> Result<(), AppointmentError> {
        let updated = self.patch(id, json!({ "queue_position": position })).await?;
        if updated.is_empty() {
            return Err(AppointmentError::NotFound);
        }
        Ok(())
    }

    async fn list_in_range(
        &self,
        hospital_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query_parts = vec![
            format!("hospital_id=eq.{}", hospital_id),
            format!("scheduled_at=gte.{}", encode_time(from)),
            format!("scheduled_at=lt.{}", encode_time(to)),
        ];
        if let Some(status) = status {
            query_parts.push(format!("status=eq.{}", status));
        }

        let path = format!(
            "/rest/v1/appointments?{}&order=scheduled_at.asc,id.asc",
            query_parts.join("&")
        );
        self.fetch_all(&path).await
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?user_id=eq.{}&order=created_at.desc,id.asc",
            urlencoding::encode(user_id)
        );
        self.fetch_all(&path).await
    }

    async fn count_upcoming(
        &self,
        filter: UpcomingFilter,
        since: DateTime<Utc>,
    ) -> Result<u32, AppointmentError> {
        let owner = match filter {
            UpcomingFilter::Hospital(id) => format!("hospital_id=eq.{}", id),
            UpcomingFilter::Doctor(id) => format!("doctor_id=eq.{}", id),
        };
        let path = format!(
            "/rest/v1/appointments?{}&status=eq.{}&scheduled_at=gte.{}&select=id",
            owner,
            AppointmentStatus::Confirmed,
            encode_time(since)
        );

        let count = self.supabase
            .count(&path, None)
            .await
            .map_err(|e| AppointmentError::StorageError(e.to_string()))?;

        u32::try_from(count)
            .map_err(|_| AppointmentError::StorageError(format!("Queue count {} out of range", count)))
    }
}
