use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use appointment_cell::services::{store_from_config, AppointmentBookingService, StoreQueueCounter};
use hospital_cell::router::hospital_routes;
use hospital_cell::services::{directory_from_config, HospitalService};
use shared_config::AppConfig;
use shared_utils::clock::{Clock, SystemClock};

pub fn create_router(state: Arc<AppConfig>) -> Router {
    build_router(state, Arc::new(SystemClock))
}

/// Wires the stores and services once; every cell shares the same instances.
pub fn build_router(state: Arc<AppConfig>, clock: Arc<dyn Clock>) -> Router {
    let directory = directory_from_config(&state);
    let store = store_from_config(&state);

    let hospitals = Arc::new(HospitalService::new(
        directory.clone(),
        Arc::new(StoreQueueCounter::new(store.clone())),
        clock.clone(),
    ));
    let appointments = Arc::new(AppointmentBookingService::new(
        &state,
        store,
        directory,
        clock,
    ));

    Router::new()
        .route("/", get(|| async { "MedQueue API is running!" }))
        .nest("/api/hospitals", hospital_routes(hospitals))
        .nest("/api/appointments", appointment_routes(appointments, state))
}
