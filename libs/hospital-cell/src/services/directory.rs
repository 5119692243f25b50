use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Doctor, Hospital, HospitalError, HospitalType};

/// Read access to the hospital and doctor tables.
#[async_trait]
pub trait HospitalDirectory: Send + Sync {
    /// Active hospitals ordered by name.
    async fn list_active_hospitals(&self) -> Result<Vec<Hospital>, HospitalError>;

    /// Any hospital by id, active or not.
    async fn get_hospital(&self, hospital_id: i64) -> Result<Option<Hospital>, HospitalError>;

    /// Active doctors of one hospital ordered by specialty, then full name.
    async fn list_active_doctors(&self, hospital_id: i64) -> Result<Vec<Doctor>, HospitalError>;

    /// Any doctor by id, active or not.
    async fn get_doctor(&self, doctor_id: i64) -> Result<Option<Doctor>, HospitalError>;
}

pub fn directory_from_config(config: &AppConfig) -> Arc<dyn HospitalDirectory> {
    if config.is_configured() {
        Arc::new(SupabaseHospitalDirectory::new(config))
    } else {
        info!("Using seeded in-memory hospital directory");
        Arc::new(InMemoryHospitalDirectory::seeded())
    }
}

// ==============================================================================
// SUPABASE
// ==============================================================================

pub struct SupabaseHospitalDirectory {
    supabase: SupabaseClient,
}

impl SupabaseHospitalDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, HospitalError> {
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            None,
            None,
        ).await.map_err(|e| HospitalError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(|e| HospitalError::DatabaseError(format!("Failed to parse rows: {}", e)))
    }
}

#[async_trait]
impl HospitalDirectory for SupabaseHospitalDirectory {
    async fn list_active_hospitals(&self) -> Result<Vec<Hospital>, HospitalError> {
        debug!("Fetching active hospitals");
        self.fetch("/rest/v1/hospitals?is_active=eq.true&order=name.asc").await
    }

    async fn get_hospital(&self, hospital_id: i64) -> Result<Option<Hospital>, HospitalError> {
        debug!("Fetching hospital {}", hospital_id);
        let path = format!("/rest/v1/hospitals?id=eq.{}", hospital_id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn list_active_doctors(&self, hospital_id: i64) -> Result<Vec<Doctor>, HospitalError> {
        debug!("Fetching doctors for hospital {}", hospital_id);
        let path = format!(
            "/rest/v1/doctors?hospital_id=eq.{}&is_active=eq.true&order=specialty.asc,full_name.asc",
            hospital_id
        );
        let mut doctors: Vec<Doctor> = self.fetch(&path).await?;
        // the column sorts as text; the API orders by the specialty enum
        sort_doctors(&mut doctors);
        Ok(doctors)
    }

    async fn get_doctor(&self, doctor_id: i64) -> Result<Option<Doctor>, HospitalError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

#[derive(Default)]
pub struct InMemoryHospitalDirectory {
    hospitals: RwLock<Vec<Hospital>>,
    doctors: RwLock<Vec<Doctor>>,
}

impl InMemoryHospitalDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The hospitals every fresh deployment starts with.
    pub fn seeded() -> Self {
        let created_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap_or_else(Utc::now);
        let seed = [
            ("City Polyclinic No. 1", HospitalType::Polyclinic, "Abay St, 45", 12),
            ("City Polyclinic No. 2", HospitalType::Polyclinic, "Dostyk Ave, 78", 5),
            ("City Polyclinic No. 3", HospitalType::Polyclinic, "Satpayev St, 22", 20),
            ("City Polyclinic No. 5", HospitalType::Polyclinic, "Tole Bi St, 101", 7),
            ("Children's Polyclinic", HospitalType::Children, "Baizakov St, 280", 8),
            ("Regional Hospital", HospitalType::Hospital, "Zheltoksan St, 88", 28),
        ];

        let hospitals = seed
            .into_iter()
            .enumerate()
            .map(|(index, (name, hospital_type, address, waiting_time))| Hospital {
                id: index as i64 + 1,
                name: name.to_string(),
                hospital_type,
                address: address.to_string(),
                waiting_time,
                is_active: true,
                created_at,
            })
            .collect();

        Self {
            hospitals: RwLock::new(hospitals),
            doctors: RwLock::new(Vec::new()),
        }
    }

    pub async fn add_hospital(&self, hospital: Hospital) {
        self.hospitals.write().await.push(hospital);
    }

    pub async fn add_doctor(&self, doctor: Doctor) {
        self.doctors.write().await.push(doctor);
    }
}

#[async_trait]
impl HospitalDirectory for InMemoryHospitalDirectory {
    async fn list_active_hospitals(&self) -> Result<Vec<Hospital>, HospitalError> {
        let mut hospitals: Vec<Hospital> = self.hospitals.read().await
            .iter()
            .filter(|h| h.is_active)
            .cloned()
            .collect();
        hospitals.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(hospitals)
    }

    async fn get_hospital(&self, hospital_id: i64) -> Result<Option<Hospital>, HospitalError> {
        Ok(self.hospitals.read().await
            .iter()
            .find(|h| h.id == hospital_id)
            .cloned())
    }

    async fn list_active_doctors(&self, hospital_id: i64) -> Result<Vec<Doctor>, HospitalError> {
        let mut doctors: Vec<Doctor> = self.doctors.read().await
            .iter()
            .filter(|d| d.hospital_id == hospital_id && d.is_active)
            .cloned()
            .collect();
        sort_doctors(&mut doctors);
        Ok(doctors)
    }

    async fn get_doctor(&self, doctor_id: i64) -> Result<Option<Doctor>, HospitalError> {
        Ok(self.doctors.read().await
            .iter()
            .find(|d| d.id == doctor_id)
            .cloned())
    }
}

fn sort_doctors(doctors: &mut [Doctor]) {
    doctors.sort_by(|a, b| {
        a.specialty.cmp(&b.specialty)
            .then_with(|| a.full_name.cmp(&b.full_name))
    });
}
