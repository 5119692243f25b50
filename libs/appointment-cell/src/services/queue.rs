use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, BucketKey, PositionChange};
use crate::services::calendar::ClinicCalendar;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::store::AppointmentStore;

/// Keeps `queue_position` contiguous within each (hospital, day) bucket.
///
/// New bookings go to the back of the queue regardless of their time; the
/// queue is only re-sorted by time when someone leaves it.
pub struct QueuePositionManager {
    calendar: ClinicCalendar,
    lifecycle: AppointmentLifecycleService,
}

impl QueuePositionManager {
    pub fn new(calendar: ClinicCalendar) -> Self {
        Self {
            calendar,
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    pub fn calendar(&self) -> &ClinicCalendar {
        &self.calendar
    }

    /// Position for a new confirmed booking, computed over a snapshot of
    /// appointments. Rows outside the bucket are ignored.
    pub fn assign_position(
        &self,
        snapshot: &[Appointment],
        hospital_id: i64,
        date: NaiveDate,
        excluding: Option<Uuid>,
    ) -> i32 {
        let ahead = snapshot
            .iter()
            .filter(|a| a.is_confirmed())
            .filter(|a| a.hospital_id == hospital_id && self.calendar.date_of(a.scheduled_at) == date)
            .filter(|a| Some(a.id) != excluding)
            .count();
        ahead as i32 + 1
    }

    /// Which confirmed rows of a bucket need a new position so that the
    /// bucket reads 1..N by time.
    pub fn plan_renumbering(bucket: &[Appointment]) -> Vec<PositionChange> {
        let mut confirmed: Vec<&Appointment> = bucket.iter().filter(|a| a.is_confirmed()).collect();
        confirmed.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });

        confirmed
            .into_iter()
            .zip(1..)
            .filter(|(appointment, position)| appointment.queue_position != *position)
            .map(|(appointment, position)| PositionChange {
                appointment_id: appointment.id,
                from: appointment.queue_position,
                to: position,
            })
            .collect()
    }

    pub async fn bucket_snapshot(
        &self,
        store: &dyn AppointmentStore,
        key: BucketKey,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let (from, to) = self.calendar.day_bounds(key.date)?;
        store
            .list_in_range(key.hospital_id, from, to, Some(AppointmentStatus::Confirmed))
            .await
    }

    pub async fn next_position(
        &self,
        store: &dyn AppointmentStore,
        key: BucketKey,
    ) -> Result<i32, AppointmentError> {
        let snapshot = self.bucket_snapshot(store, key).await?;
        let position = self.assign_position(&snapshot, key.hospital_id, key.date, None);
        debug!("Next queue position for {} is {}", key, position);
        Ok(position)
    }

    /// Re-sorts a bucket by time and writes only the rows that moved.
    /// A failed write leaves earlier writes in place; running this again
    /// finishes the job.
    pub async fn renumber_bucket(
        &self,
        store: &dyn AppointmentStore,
        key: BucketKey,
    ) -> Result<Vec<PositionChange>, AppointmentError> {
        let snapshot = self.bucket_snapshot(store, key).await?;
        let changes = Self::plan_renumbering(&snapshot);

        for change in &changes {
            store.update_queue_position(change.appointment_id, change.to).await?;
        }

        if !changes.is_empty() {
            info!("Renumbered {} appointments for {}", changes.len(), key);
        }
        Ok(changes)
    }

    /// Cancels a confirmed appointment and closes the gap it leaves.
    pub async fn on_cancel(
        &self,
        store: &dyn AppointmentStore,
        appointment: &Appointment,
        at: DateTime<Utc>,
    ) -> Result<(Appointment, Vec<PositionChange>), AppointmentError> {
        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Cancelled)?;

        let cancelled = store
            .update_status(appointment.id, AppointmentStatus::Cancelled, at)
            .await?;
        info!("Appointment {} cancelled", cancelled.code);

        let changes = self.renumber_bucket(store, self.calendar.bucket_of(&cancelled)).await?;
        Ok((cancelled, changes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Specialty;
    use chrono::TimeZone;

    fn appointment(hour: u32, position: i32, created_minute: u32) -> Appointment {
        let created_at = Utc.with_ymd_and_hms(2025, 1, 20, 8, created_minute, 0).unwrap();
        Appointment {
            id: Uuid::new_v4(),
            code: "ABCDEF".to_string(),
            user_id: None,
            patient_name: "Patient".to_string(),
            hospital_id: 1,
            doctor_id: None,
            specialty: Specialty::Therapist,
            scheduled_at: Utc.with_ymd_and_hms(2025, 1, 27, hour, 0, 0).unwrap(),
            queue_position: position,
            status: AppointmentStatus::Confirmed,
            created_at,
            updated_at: created_at,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 27).unwrap()
    }

    #[test]
    fn test_assign_position_counts_confirmed_in_bucket() {
        let manager = QueuePositionManager::new(ClinicCalendar::utc());
        let mut other_hospital = appointment(9, 1, 0);
        other_hospital.hospital_id = 2;
        let mut cancelled = appointment(10, 2, 1);
        cancelled.status = AppointmentStatus::Cancelled;
        let mut other_day = appointment(11, 1, 2);
        other_day.scheduled_at = Utc.with_ymd_and_hms(2025, 1, 28, 11, 0, 0).unwrap();

        let snapshot = vec![appointment(8, 1, 3), other_hospital, cancelled, other_day];
        assert_eq!(manager.assign_position(&snapshot, 1, day(), None), 2);
        assert_eq!(manager.assign_position(&snapshot, 1, day(), Some(snapshot[0].id)), 1);
        assert_eq!(manager.assign_position(&[], 1, day(), None), 1);
    }

    #[test]
    fn test_plan_orders_by_time_and_skips_unchanged() {
        let a = appointment(9, 1, 0);
        let c = appointment(8, 3, 2);
        let changes = QueuePositionManager::plan_renumbering(&[a.clone(), c.clone()]);

        assert_eq!(
            changes,
            vec![
                PositionChange { appointment_id: c.id, from: 3, to: 1 },
                PositionChange { appointment_id: a.id, from: 1, to: 2 },
            ]
        );
    }

    #[test]
    fn test_plan_breaks_ties_by_creation() {
        let first = appointment(9, 2, 0);
        let second = appointment(9, 1, 5);
        let changes = QueuePositionManager::plan_renumbering(&[second.clone(), first.clone()]);

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].appointment_id, first.id);
        assert_eq!(changes[0].to, 1);
    }

    #[test]
    fn test_plan_of_sorted_bucket_is_empty() {
        let bucket = vec![appointment(8, 1, 0), appointment(9, 2, 1), appointment(10, 3, 2)];
        assert!(QueuePositionManager::plan_renumbering(&bucket).is_empty());
    }
}
