// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::{auth_middleware, optional_auth_middleware};

use crate::handlers;
use crate::services::booking::AppointmentBookingService;

pub fn appointment_routes(service: Arc<AppointmentBookingService>, config: Arc<AppConfig>) -> Router {
    let booking_routes = Router::new()
        .route("/", post(handlers::create_appointment))
        .layer(middleware::from_fn_with_state(config.clone(), optional_auth_middleware));

    // Lookups by code need no account
    let public_routes = Router::new()
        .route("/check/{code}", get(handlers::check_appointment))
        .route("/cancel", post(handlers::cancel_appointment));

    let protected_routes = Router::new()
        .route("/my", get(handlers::my_appointments))
        // Admin only
        .route("/complete", post(handlers::complete_appointment))
        .route("/queue/renumber", post(handlers::renumber_queue))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(booking_routes)
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(service)
}
