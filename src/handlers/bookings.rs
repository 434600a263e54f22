use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Booking, DraftBooking};
use crate::services::lifecycle;
use crate::state::AppState;

use super::{session_id, SESSION_HEADER};

/// Customer-facing view of a booking. Never exposes the confirmation code.
#[derive(Serialize)]
pub struct BookingView {
    id: String,
    workspace_type: String,
    date: String,
    time_slot: String,
    duration: String,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    customer_whatsapp: String,
    total_price: f64,
    status: String,
    created_at: String,
    updated_at: String,
}

impl From<Booking> for BookingView {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            workspace_type: b.workspace_type,
            date: b.date.format("%Y-%m-%d").to_string(),
            time_slot: b.time_slot,
            duration: b.duration.as_str().to_string(),
            customer_name: b.customer_name,
            customer_email: b.customer_email,
            customer_phone: b.customer_phone,
            customer_whatsapp: b.customer_whatsapp,
            total_price: b.total_price,
            status: b.status.as_str().to_string(),
            created_at: b.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            updated_at: b.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

// POST /api/bookings
#[derive(Serialize)]
pub struct CreateBookingResponse {
    booking: BookingView,
    session_id: String,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<DraftBooking>,
) -> Result<Response, AppError> {
    let booking = lifecycle::create_booking(&state, draft).await?;
    let session_id = state.sessions.create(&booking.id);

    Ok((
        StatusCode::CREATED,
        [(HeaderName::from_static(SESSION_HEADER), session_id.clone())],
        Json(CreateBookingResponse {
            booking: booking.into(),
            session_id,
        }),
    )
        .into_response())
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BookingView>, AppError> {
    let booking = lifecycle::fetch_booking(&state, &id)?;
    Ok(Json(booking.into()))
}

// POST /api/bookings/:id/code
#[derive(Deserialize, Default)]
pub struct CodeRequest {
    pub contact: Option<String>,
}

#[derive(Serialize)]
pub struct CodeResponse {
    sent: bool,
    session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

pub async fn request_code(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<CodeRequest>>,
) -> Result<Json<CodeResponse>, AppError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let session_id = session_id(&headers).ok_or(AppError::InvalidCode)?;

    let mut session = state.sessions.load(&session_id);
    let code =
        lifecycle::request_confirmation_code(&state, &mut session, &id, body.contact.as_deref())
            .await?;

    // A session confirmed, cancelled or abandoned meanwhile stays gone.
    let pending = session.pending;
    if !state.sessions.update(&session_id, |s| s.pending = pending) {
        tracing::debug!(booking_id = %id, "session ended while code was in flight");
    }

    Ok(Json(CodeResponse {
        sent: true,
        session_id,
        code: state.config.demo_mode.then_some(code),
    }))
}

// POST /api/bookings/:id/confirm
#[derive(Deserialize)]
pub struct ConfirmRequest {
    pub code: String,
}

pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ConfirmRequest>,
) -> Result<Json<BookingView>, AppError> {
    let session_id = session_id(&headers);
    let mut session = session_id
        .as_deref()
        .map(|sid| state.sessions.load(sid))
        .unwrap_or_default();

    let booking = lifecycle::confirm_booking(&state, &mut session, &id, body.code.trim()).await?;
    if let Some(sid) = session_id.filter(|_| session.owns(&id)) {
        state.sessions.remove(&sid);
    }

    Ok(Json(booking.into()))
}

// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingView>, AppError> {
    let session_id = session_id(&headers).ok_or(AppError::InvalidCode)?;
    let mut session = state.sessions.load(&session_id);

    let booking = lifecycle::cancel_booking(&state, &mut session, &id).await?;
    state.sessions.remove(&session_id);

    Ok(Json(booking.into()))
}

// DELETE /api/session
pub async fn abandon_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<serde_json::Value> {
    let removed = session_id(&headers)
        .map(|sid| state.sessions.remove(&sid))
        .unwrap_or(false);
    Json(serde_json::json!({ "ok": true, "removed": removed }))
}
