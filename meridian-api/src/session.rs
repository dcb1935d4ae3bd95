use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use meridian_inventory::booking::Booking;
use meridian_inventory::flight::Flight;
use meridian_inventory::profile::UserProfile;
use serde::Serialize;
use std::sync::atomic::Ordering;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct FlightsResponse {
    pub revision: u64,
    pub flights: Vec<Flight>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/flights", get(list_flights))
        .route("/v1/bookings", get(list_bookings))
        .route("/v1/profile", get(get_profile))
        .route("/v1/session/reset", post(reset_session))
}

async fn list_flights(State(state): State<AppState>) -> Result<Json<FlightsResponse>, AppError> {
    let session = state.session.lock().await;
    Ok(Json(FlightsResponse {
        revision: state.inventory_revision.load(Ordering::SeqCst),
        flights: session.store().list_flights().to_vec(),
    }))
}

async fn list_bookings(State(state): State<AppState>) -> Result<Json<Vec<Booking>>, AppError> {
    let session = state.session.lock().await;
    let bookings = session
        .store()
        .list_bookings()
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(bookings))
}

async fn get_profile(State(state): State<AppState>) -> Result<Json<UserProfile>, AppError> {
    let session = state.session.lock().await;
    Ok(Json(session.store().active_profile().clone()))
}

async fn reset_session(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let mut session = state.session.lock().await;
    session.reset_session();
    tracing::info!("session reset");
    Ok(Json(serde_json::json!({ "status": "reset" })))
}
