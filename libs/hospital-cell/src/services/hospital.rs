use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use shared_utils::clock::Clock;

use crate::models::{
    Doctor, DoctorSummary, Hospital, HospitalError, HospitalSummary, Specialty, SpecialtyGroup,
};
use crate::services::directory::HospitalDirectory;
use crate::services::queue_counter::QueueCounter;

pub struct HospitalService {
    directory: Arc<dyn HospitalDirectory>,
    counter: Arc<dyn QueueCounter>,
    clock: Arc<dyn Clock>,
}

impl HospitalService {
    pub fn new(
        directory: Arc<dyn HospitalDirectory>,
        counter: Arc<dyn QueueCounter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { directory, counter, clock }
    }

    pub async fn list_hospitals(&self) -> Result<Vec<HospitalSummary>, HospitalError> {
        let hospitals = self.directory.list_active_hospitals().await?;
        let now = self.clock.now();

        let mut summaries = Vec::with_capacity(hospitals.len());
        for hospital in hospitals {
            let current_queue = self.counter.upcoming_for_hospital(hospital.id, now).await?;
            summaries.push(HospitalSummary { hospital, current_queue });
        }

        debug!("Listed {} active hospitals", summaries.len());
        Ok(summaries)
    }

    pub async fn get_hospital(&self, hospital_id: i64) -> Result<HospitalSummary, HospitalError> {
        let hospital = self.active_hospital(hospital_id).await?;
        let current_queue = self.counter
            .upcoming_for_hospital(hospital.id, self.clock.now())
            .await?;

        Ok(HospitalSummary { hospital, current_queue })
    }

    /// Inactive hospitals are treated as missing.
    pub async fn active_hospital(&self, hospital_id: i64) -> Result<Hospital, HospitalError> {
        self.directory.get_hospital(hospital_id).await?
            .filter(|hospital| hospital.is_active)
            .ok_or(HospitalError::NotFound)
    }

    /// Active doctors of a hospital grouped by specialty.
    pub async fn doctors_by_specialty(&self, hospital_id: i64) -> Result<Vec<SpecialtyGroup>, HospitalError> {
        self.active_hospital(hospital_id).await?;

        let doctors = self.directory.list_active_doctors(hospital_id).await?;
        let now = self.clock.now();

        let mut grouped: BTreeMap<Specialty, Vec<DoctorSummary>> = BTreeMap::new();
        for doctor in doctors {
            let current_queue = self.counter.upcoming_for_doctor(doctor.id, now).await?;
            grouped
                .entry(doctor.specialty)
                .or_default()
                .push(summarize(doctor, current_queue));
        }

        Ok(grouped
            .into_iter()
            .map(|(specialty, doctors)| SpecialtyGroup { specialty, doctors })
            .collect())
    }
}

fn summarize(doctor: Doctor, current_queue: u32) -> DoctorSummary {
    DoctorSummary {
        id: doctor.id,
        full_name: doctor.full_name,
        cabinet: doctor.cabinet,
        work_days: doctor.work_days,
        work_hours: doctor.work_hours,
        current_queue,
    }
}
