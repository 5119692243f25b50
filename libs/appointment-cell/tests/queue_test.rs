use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentError, AppointmentStatus, BucketKey, NewAppointment, Specialty,
};
use appointment_cell::services::{
    AppointmentStore, ClinicCalendar, InMemoryAppointmentStore, QueuePositionManager, UpcomingFilter,
};

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 27, hour, minute, 0).unwrap()
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 27).unwrap()
}

fn bucket() -> BucketKey {
    BucketKey { hospital_id: 1, date: day() }
}

fn booking(code: &str, scheduled_at: DateTime<Utc>, queue_position: i32) -> NewAppointment {
    NewAppointment {
        code: code.to_string(),
        user_id: None,
        patient_name: format!("Patient {}", code),
        hospital_id: 1,
        doctor_id: None,
        specialty: Specialty::Therapist,
        scheduled_at,
        queue_position,
        created_at: Utc.with_ymd_and_hms(2025, 1, 20, 12, 0, 0).unwrap(),
    }
}

async fn positions(store: &InMemoryAppointmentStore) -> Vec<(String, i32)> {
    let mut rows: Vec<(String, i32)> = store.all().await
        .into_iter()
        .filter(|a| a.is_confirmed())
        .map(|a| (a.code, a.queue_position))
        .collect();
    rows.sort_by_key(|(_, position)| *position);
    rows
}

#[tokio::test]
async fn test_cancel_renumbers_by_time() {
    let store = InMemoryAppointmentStore::new();
    let manager = QueuePositionManager::new(ClinicCalendar::utc());

    store.insert(booking("AAAAAA", at(9, 0), 1)).await.unwrap();
    let b = store.insert(booking("BBBBBB", at(10, 0), 2)).await.unwrap();
    store.insert(booking("CCCCCC", at(8, 0), 3)).await.unwrap();

    let (cancelled, changes) = manager.on_cancel(&store, &b, at(7, 0)).await.unwrap();

    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.updated_at, at(7, 0));
    assert_eq!(changes.len(), 2);
    assert_eq!(
        positions(&store).await,
        vec![("CCCCCC".to_string(), 1), ("AAAAAA".to_string(), 2)]
    );
}

#[tokio::test]
async fn test_cancel_leaves_other_buckets_alone() {
    let store = InMemoryAppointmentStore::new();
    let manager = QueuePositionManager::new(ClinicCalendar::utc());

    let first = store.insert(booking("AAAAAA", at(9, 0), 1)).await.unwrap();
    let mut other_hospital = booking("BBBBBB", at(10, 0), 2);
    other_hospital.hospital_id = 2;
    store.insert(other_hospital).await.unwrap();
    let mut next_day = booking("CCCCCC", at(8, 0), 2);
    next_day.scheduled_at = Utc.with_ymd_and_hms(2025, 1, 28, 8, 0, 0).unwrap();
    store.insert(next_day).await.unwrap();

    let (_, changes) = manager.on_cancel(&store, &first, at(7, 0)).await.unwrap();

    assert!(changes.is_empty());
    let untouched: Vec<i32> = store.all().await
        .iter()
        .filter(|a| a.code != "AAAAAA")
        .map(|a| a.queue_position)
        .collect();
    assert_eq!(untouched, vec![2, 2]);
}

#[tokio::test]
async fn test_cancelling_twice_is_rejected_without_side_effects() {
    let store = InMemoryAppointmentStore::new();
    let manager = QueuePositionManager::new(ClinicCalendar::utc());

    store.insert(booking("AAAAAA", at(9, 0), 2)).await.unwrap();
    let b = store.insert(booking("BBBBBB", at(10, 0), 1)).await.unwrap();
    let (cancelled, _) = manager.on_cancel(&store, &b, at(7, 0)).await.unwrap();

    // put the survivor out of order so any renumbering would show
    let a = store.find_by_code("AAAAAA").await.unwrap().unwrap();
    store.update_queue_position(a.id, 5).await.unwrap();

    let result = manager.on_cancel(&store, &cancelled, at(7, 30)).await;
    assert_matches!(result, Err(AppointmentError::AlreadyCancelled));

    let a = store.find_by_code("AAAAAA").await.unwrap().unwrap();
    assert_eq!(a.queue_position, 5);
    let b = store.find_by_code("BBBBBB").await.unwrap().unwrap();
    assert_eq!(b.updated_at, at(7, 0));
}

#[tokio::test]
async fn test_completed_appointment_cannot_be_cancelled() {
    let store = InMemoryAppointmentStore::new();
    let manager = QueuePositionManager::new(ClinicCalendar::utc());

    let a = store.insert(booking("AAAAAA", at(9, 0), 1)).await.unwrap();
    let completed = store.update_status(a.id, AppointmentStatus::Completed, at(9, 30)).await.unwrap();

    let result = manager.on_cancel(&store, &completed, at(10, 0)).await;
    assert_matches!(
        result,
        Err(AppointmentError::InvalidStatusTransition(AppointmentStatus::Completed))
    );
}

#[tokio::test]
async fn test_renumbering_is_idempotent() {
    let store = InMemoryAppointmentStore::new();
    let manager = QueuePositionManager::new(ClinicCalendar::utc());

    store.insert(booking("AAAAAA", at(11, 0), 1)).await.unwrap();
    store.insert(booking("BBBBBB", at(9, 0), 2)).await.unwrap();
    store.insert(booking("CCCCCC", at(10, 0), 3)).await.unwrap();

    let first = manager.renumber_bucket(&store, bucket()).await.unwrap();
    assert_eq!(first.len(), 3);
    let after_first = positions(&store).await;

    let second = manager.renumber_bucket(&store, bucket()).await.unwrap();
    assert!(second.is_empty());
    assert_eq!(positions(&store).await, after_first);
    assert_eq!(
        after_first,
        vec![
            ("BBBBBB".to_string(), 1),
            ("CCCCCC".to_string(), 2),
            ("AAAAAA".to_string(), 3),
        ]
    );
}

#[tokio::test]
async fn test_next_position_counts_only_confirmed() {
    let store = InMemoryAppointmentStore::new();
    let manager = QueuePositionManager::new(ClinicCalendar::utc());

    assert_eq!(manager.next_position(&store, bucket()).await.unwrap(), 1);

    store.insert(booking("AAAAAA", at(9, 0), 1)).await.unwrap();
    let b = store.insert(booking("BBBBBB", at(10, 0), 2)).await.unwrap();
    assert_eq!(manager.next_position(&store, bucket()).await.unwrap(), 3);

    store.update_status(b.id, AppointmentStatus::Cancelled, at(8, 0)).await.unwrap();
    assert_eq!(manager.next_position(&store, bucket()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_bucket_follows_clinic_day() {
    let store = InMemoryAppointmentStore::new();
    // UTC+5: 20:00Z on the 26th is already the 27th locally
    let manager = QueuePositionManager::new(ClinicCalendar::new(300));

    let late = booking("AAAAAA", Utc.with_ymd_and_hms(2025, 1, 26, 20, 0, 0).unwrap(), 1);
    store.insert(late).await.unwrap();

    assert_eq!(manager.next_position(&store, bucket()).await.unwrap(), 2);
    let previous_day = BucketKey { hospital_id: 1, date: NaiveDate::from_ymd_opt(2025, 1, 26).unwrap() };
    assert_eq!(manager.next_position(&store, previous_day).await.unwrap(), 1);
}

// ==============================================================================
// PARTIAL FAILURE
// ==============================================================================

/// Fails position updates once `allowed_updates` have gone through.
struct FlakyStore {
    inner: InMemoryAppointmentStore,
    allowed_updates: usize,
    updates: AtomicUsize,
    failing: AtomicBool,
}

#[async_trait]
impl AppointmentStore for FlakyStore {
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, AppointmentError> {
        self.inner.insert(appointment).await
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Appointment>, AppointmentError> {
        self.inner.find_by_code(code).await
    }

    async fn code_exists(&self, code: &str) -> Result<bool, AppointmentError> {
        self.inner.code_exists(code).await
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        self.inner.update_status(id, status, at).await
    }

    async fn update_queue_position(&self, id: Uuid, position: i32) -> Result<(), AppointmentError> {
        let done = self.updates.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) && done >= self.allowed_updates {
            return Err(AppointmentError::StorageError("connection reset".to_string()));
        }
        self.inner.update_queue_position(id, position).await
    }

    async fn list_in_range(
        &self,
        hospital_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.inner.list_in_range(hospital_id, from, to, status).await
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Appointment>, AppointmentError> {
        self.inner.list_for_user(user_id).await
    }

    async fn count_upcoming(&self, filter: UpcomingFilter, since: DateTime<Utc>) -> Result<u32, AppointmentError> {
        self.inner.count_upcoming(filter, since).await
    }
}

#[tokio::test]
async fn test_rerun_repairs_partial_renumbering() {
    let store = Arc::new(FlakyStore {
        inner: InMemoryAppointmentStore::new(),
        allowed_updates: 1,
        updates: AtomicUsize::new(0),
        failing: AtomicBool::new(true),
    });
    let manager = QueuePositionManager::new(ClinicCalendar::utc());

    store.insert(booking("XXXXXX", at(8, 0), 3)).await.unwrap();
    store.insert(booking("YYYYYY", at(9, 0), 1)).await.unwrap();
    store.insert(booking("ZZZZZZ", at(10, 0), 2)).await.unwrap();

    let result = manager.renumber_bucket(store.as_ref(), bucket()).await;
    assert_matches!(result, Err(AppointmentError::StorageError(_)));

    store.failing.store(false, Ordering::SeqCst);
    let repaired = manager.renumber_bucket(store.as_ref(), bucket()).await.unwrap();
    assert_eq!(repaired.len(), 2);

    assert_eq!(
        positions(&store.inner).await,
        vec![
            ("XXXXXX".to_string(), 1),
            ("YYYYYY".to_string(), 2),
            ("ZZZZZZ".to_string(), 3),
        ]
    );
}
