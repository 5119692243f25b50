use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use crate::handlers;
use crate::services::hospital::HospitalService;

pub fn hospital_routes(service: Arc<HospitalService>) -> Router {
    Router::new()
        .route("/", get(handlers::list_hospitals))
        .route("/{hospital_id}", get(handlers::get_hospital))
        .route("/{hospital_id}/doctors", get(handlers::get_hospital_doctors))
        .with_state(service)
}
