use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, BookingFilter};
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus};
use crate::services::lifecycle;
use crate::state::AppState;

use super::bookings::BookingView;
use super::check_auth;

const MAX_LIMIT: i64 = 500;

/// Public booking view plus the fields only administrators see.
#[derive(Serialize)]
pub struct AdminBookingResponse {
    #[serde(flatten)]
    booking: BookingView,
    confirmation_code: Option<String>,
    user_id: Option<String>,
}

impl From<Booking> for AdminBookingResponse {
    fn from(mut b: Booking) -> Self {
        let confirmation_code = b.confirmation_code.take();
        let user_id = b.user_id.take();
        Self {
            booking: b.into(),
            confirmation_code,
            user_id,
        }
    }
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub email: Option<String>,
    pub limit: Option<i64>,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<AdminBookingResponse>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(
            BookingStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown status: {s}")))?,
        ),
        None => None,
    };
    let filter = BookingFilter {
        status,
        customer_email: query.email.filter(|e| !e.is_empty()),
        limit: Some(query.limit.unwrap_or(50).clamp(1, MAX_LIMIT)),
    };

    let bookings = {
        let db = state.db()?;
        queries::list_bookings(&db, &filter)?
    };

    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

// POST /api/admin/bookings/:id/approve
pub async fn approve_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AdminBookingResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let booking = lifecycle::approve_booking(&state, &id).await?;
    Ok(Json(booking.into()))
}

// POST /api/admin/bookings/:id/reject
pub async fn reject_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AdminBookingResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let booking = lifecycle::reject_booking(&state, &id).await?;
    Ok(Json(booking.into()))
}
