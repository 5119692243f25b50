use std::sync::Arc;

use axum::{
    extract::{rejection::PathRejection, Path, State},
    Json,
};

use shared_models::error::AppError;

use crate::models::{HospitalSummary, SpecialtyGroup};
use crate::services::hospital::HospitalService;

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn list_hospitals(
    State(service): State<Arc<HospitalService>>,
) -> Result<Json<Vec<HospitalSummary>>, AppError> {
    let hospitals = service.list_hospitals().await?;
    Ok(Json(hospitals))
}

#[axum::debug_handler]
pub async fn get_hospital(
    State(service): State<Arc<HospitalService>>,
    hospital_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<HospitalSummary>, AppError> {
    let Path(hospital_id) = hospital_id?;
    let hospital = service.get_hospital(hospital_id).await?;
    Ok(Json(hospital))
}

/// Doctors of one hospital grouped by specialty.
#[axum::debug_handler]
pub async fn get_hospital_doctors(
    State(service): State<Arc<HospitalService>>,
    hospital_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<SpecialtyGroup>>, AppError> {
    let Path(hospital_id) = hospital_id?;
    let groups = service.doctors_by_specialty(hospital_id).await?;
    Ok(Json(groups))
}
