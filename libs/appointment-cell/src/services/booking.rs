// libs/appointment-cell/src/services/booking.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use hospital_cell::models::{Doctor, Hospital};
use hospital_cell::HospitalDirectory;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_utils::clock::Clock;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AppointmentStatusView, BucketKey,
    CancelResponse, CreateAppointmentRequest, NewAppointment, RenumberResponse,
};
use crate::services::calendar::ClinicCalendar;
use crate::services::code::{parse_code, CodeGenerator};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::locks::BucketLocks;
use crate::services::queue::QueuePositionManager;
use crate::services::store::AppointmentStore;

pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    directory: Arc<dyn HospitalDirectory>,
    clock: Arc<dyn Clock>,
    codes: CodeGenerator,
    queue: QueuePositionManager,
    lifecycle: AppointmentLifecycleService,
    locks: BucketLocks,
    minutes_per_position: i32,
}

impl AppointmentBookingService {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn AppointmentStore>,
        directory: Arc<dyn HospitalDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        if !config.serialize_bucket_writes {
            warn!("Queue bucket locking disabled, concurrent bookings may share a position");
        }

        Self {
            store,
            directory,
            clock,
            codes: CodeGenerator::new(config.code_max_attempts),
            queue: QueuePositionManager::new(ClinicCalendar::new(config.clinic_utc_offset_minutes)),
            lifecycle: AppointmentLifecycleService::new(),
            locks: BucketLocks::new(config.serialize_bucket_writes),
            minutes_per_position: config.minutes_per_queue_position,
        }
    }

    fn calendar(&self) -> &ClinicCalendar {
        self.queue.calendar()
    }

    /// Book a place at the back of the day's queue.
    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        user: Option<&User>,
    ) -> Result<AppointmentStatusView, AppointmentError> {
        let patient_name = request.patient_name.trim().to_string();
        if patient_name.is_empty() {
            return Err(AppointmentError::ValidationError("Patient name is required".to_string()));
        }

        let now = self.clock.now();
        let scheduled_at = self.calendar().resolve(request.datetime)?;
        if scheduled_at < now {
            return Err(AppointmentError::ValidationError(
                "Appointment time cannot be in the past".to_string(),
            ));
        }

        let hospital = self.directory.get_hospital(request.hospital).await?
            .filter(|h| h.is_active)
            .ok_or(AppointmentError::HospitalNotFound)?;

        let doctor = match request.doctor {
            Some(doctor_id) => {
                let doctor = self.directory.get_doctor(doctor_id).await?
                    .filter(|d| d.is_active)
                    .ok_or(AppointmentError::DoctorNotFound)?;
                validate_doctor(&doctor, &hospital, &request)?;
                Some(doctor)
            }
            None => None,
        };

        let key = BucketKey {
            hospital_id: hospital.id,
            date: self.calendar().date_of(scheduled_at),
        };
        let _guard = self.locks.acquire(key).await;

        let code = self.codes.generate_unique_code(self.store.as_ref()).await?;
        let queue_position = self.queue.next_position(self.store.as_ref(), key).await?;

        let appointment = self.store.insert(NewAppointment {
            code,
            user_id: user.map(|u| u.id.clone()),
            patient_name,
            hospital_id: hospital.id,
            doctor_id: doctor.as_ref().map(|d| d.id),
            specialty: request.specialty,
            scheduled_at,
            queue_position,
            created_at: now,
        }).await?;

        info!(
            "Appointment {} booked at {} with queue position {}",
            appointment.code, key, appointment.queue_position
        );

        Ok(self.view(&appointment, &hospital, doctor.as_ref()))
    }

    pub async fn check_status(&self, code: &str) -> Result<AppointmentStatusView, AppointmentError> {
        let appointment = self.find(code).await?;
        self.describe(&appointment).await
    }

    pub async fn cancel_appointment(&self, code: &str) -> Result<CancelResponse, AppointmentError> {
        let appointment = self.find(code).await?;
        let _guard = self.locks.acquire(self.calendar().bucket_of(&appointment)).await;

        // the row may have changed while we waited for the lock
        let current = self.find(&appointment.code).await?;
        let (cancelled, changes) = self.queue
            .on_cancel(self.store.as_ref(), &current, self.clock.now())
            .await?;

        debug!("Cancellation of {} moved {} appointments", cancelled.code, changes.len());
        Ok(CancelResponse {
            message: "Appointment cancelled successfully".to_string(),
            code: cancelled.code,
        })
    }

    /// Marks a visit as done. The queue is left as is.
    pub async fn complete_appointment(&self, code: &str) -> Result<AppointmentStatusView, AppointmentError> {
        let appointment = self.find(code).await?;
        let _guard = self.locks.acquire(self.calendar().bucket_of(&appointment)).await;

        let current = self.find(&appointment.code).await?;
        self.lifecycle
            .validate_status_transition(current.status, AppointmentStatus::Completed)?;

        let completed = self.store
            .update_status(current.id, AppointmentStatus::Completed, self.clock.now())
            .await?;
        info!("Appointment {} completed", completed.code);

        self.describe(&completed).await
    }

    pub async fn my_appointments(&self, user: &User) -> Result<Vec<AppointmentStatusView>, AppointmentError> {
        let appointments = self.store.list_for_user(&user.id).await?;
        debug!("User {} has {} appointments", user.id, appointments.len());

        let mut hospitals: HashMap<i64, Hospital> = HashMap::new();
        let mut doctors: HashMap<i64, Doctor> = HashMap::new();
        let mut views = Vec::with_capacity(appointments.len());

        for appointment in &appointments {
            if !hospitals.contains_key(&appointment.hospital_id) {
                let hospital = self.hospital_of(appointment).await?;
                hospitals.insert(hospital.id, hospital);
            }
            if let Some(doctor_id) = appointment.doctor_id {
                if !doctors.contains_key(&doctor_id) {
                    if let Some(doctor) = self.directory.get_doctor(doctor_id).await? {
                        doctors.insert(doctor_id, doctor);
                    }
                }
            }

            let hospital = hospitals
                .get(&appointment.hospital_id)
                .ok_or(AppointmentError::HospitalNotFound)?;
            let doctor = appointment.doctor_id.and_then(|id| doctors.get(&id));
            views.push(self.view(appointment, hospital, doctor));
        }

        Ok(views)
    }

    /// Re-sorts one day's queue by time. Safe to repeat.
    pub async fn renumber(&self, hospital_id: i64, date: NaiveDate) -> Result<RenumberResponse, AppointmentError> {
        self.directory.get_hospital(hospital_id).await?
            .ok_or(AppointmentError::HospitalNotFound)?;

        let key = BucketKey { hospital_id, date };
        let _guard = self.locks.acquire(key).await;
        let changes = self.queue.renumber_bucket(self.store.as_ref(), key).await?;

        Ok(RenumberResponse {
            hospital_id,
            date,
            changed: changes.len(),
        })
    }

    async fn find(&self, code: &str) -> Result<Appointment, AppointmentError> {
        let code = parse_code(code)?;
        self.store.find_by_code(&code).await?
            .ok_or(AppointmentError::NotFound)
    }

    async fn hospital_of(&self, appointment: &Appointment) -> Result<Hospital, AppointmentError> {
        self.directory.get_hospital(appointment.hospital_id).await?
            .ok_or(AppointmentError::HospitalNotFound)
    }

    async fn describe(&self, appointment: &Appointment) -> Result<AppointmentStatusView, AppointmentError> {
        let hospital = self.hospital_of(appointment).await?;
        let doctor = match appointment.doctor_id {
            Some(doctor_id) => self.directory.get_doctor(doctor_id).await?,
            None => None,
        };
        Ok(self.view(appointment, &hospital, doctor.as_ref()))
    }

    fn view(&self, appointment: &Appointment, hospital: &Hospital, doctor: Option<&Doctor>) -> AppointmentStatusView {
        AppointmentStatusView {
            code: appointment.code.clone(),
            patient_name: appointment.patient_name.clone(),
            hospital_name: hospital.name.clone(),
            hospital_address: hospital.address.clone(),
            hospital_type: hospital.hospital_type,
            doctor_name: doctor.map(|d| d.full_name.clone()),
            specialty: appointment.specialty,
            datetime: appointment.scheduled_at,
            queue_position: appointment.queue_position,
            estimated_wait_time: appointment.estimated_wait_minutes(self.minutes_per_position),
            status: appointment.status,
            created_at: appointment.created_at,
        }
    }
}

fn validate_doctor(
    doctor: &Doctor,
    hospital: &Hospital,
    request: &CreateAppointmentRequest,
) -> Result<(), AppointmentError> {
    if doctor.hospital_id != hospital.id {
        return Err(AppointmentError::ValidationError(
            "Doctor does not work at the selected hospital".to_string(),
        ));
    }
    if doctor.specialty != request.specialty {
        return Err(AppointmentError::ValidationError(format!(
            "Doctor specialty is {}, not {}",
            doctor.specialty, request.specialty
        )));
    }
    Ok(())
}
