// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::StatusCode,
    Json,
};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_admin;

use crate::models::{
    AppointmentStatusView, CancelResponse, CodeRequest, CreateAppointmentRequest,
    RenumberRequest, RenumberResponse,
};
use crate::services::booking::AppointmentBookingService;

// ==============================================================================
// PUBLIC HANDLERS (AUTHENTICATION OPTIONAL)
// ==============================================================================

/// Anonymous bookings are allowed; a signed-in patient gets the booking
/// attached to their account.
#[axum::debug_handler]
pub async fn create_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    user: Option<Extension<User>>,
    payload: Result<Json<CreateAppointmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AppointmentStatusView>), AppError> {
    let Json(request) = payload?;
    let user = user.map(|Extension(user)| user);
    let view = service.create_appointment(request, user.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[axum::debug_handler]
pub async fn check_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    Path(code): Path<String>,
) -> Result<Json<AppointmentStatusView>, AppError> {
    let view = service.check_status(&code).await?;
    Ok(Json(view))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    payload: Result<Json<CodeRequest>, JsonRejection>,
) -> Result<Json<CancelResponse>, AppError> {
    let Json(request) = payload?;
    let response = service.cancel_appointment(&request.code).await?;
    Ok(Json(response))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn my_appointments(
    State(service): State<Arc<AppointmentBookingService>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<AppointmentStatusView>>, AppError> {
    let appointments = service.my_appointments(&user).await?;
    Ok(Json(appointments))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    Extension(user): Extension<User>,
    payload: Result<Json<CodeRequest>, JsonRejection>,
) -> Result<Json<AppointmentStatusView>, AppError> {
    require_admin(&user)?;
    let Json(request) = payload?;
    let view = service.complete_appointment(&request.code).await?;
    Ok(Json(view))
}

/// Re-sorts one day's queue by appointment time.
#[axum::debug_handler]
pub async fn renumber_queue(
    State(service): State<Arc<AppointmentBookingService>>,
    Extension(user): Extension<User>,
    payload: Result<Json<RenumberRequest>, JsonRejection>,
) -> Result<Json<RenumberResponse>, AppError> {
    require_admin(&user)?;
    let Json(request) = payload?;
    let response = service.renumber(request.hospital_id, request.date).await?;
    Ok(Json(response))
}
