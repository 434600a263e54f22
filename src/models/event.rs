use serde::{Deserialize, Serialize};

use super::Booking;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingAction {
    BookingCreated,
    CodeSent,
    BookingConfirmed,
    BookingApproved,
    BookingRejected,
    BookingCancelled,
}

impl BookingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingAction::BookingCreated => "booking_created",
            BookingAction::CodeSent => "code_sent",
            BookingAction::BookingConfirmed => "booking_confirmed",
            BookingAction::BookingApproved => "booking_approved",
            BookingAction::BookingRejected => "booking_rejected",
            BookingAction::BookingCancelled => "booking_cancelled",
        }
    }
}

/// Payload pushed to the notifier webhook and the admin event feed.
///
/// Never carries the confirmation code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingEvent {
    pub action: BookingAction,
    pub booking_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub customer_whatsapp: String,
    pub workspace_type: String,
    pub date: String,
    pub time_slot: String,
    pub duration: String,
    pub total_price: f64,
    pub status: String,
    pub timestamp: String,
}

impl BookingEvent {
    pub fn new(action: BookingAction, booking: &Booking) -> Self {
        Self {
            action,
            booking_id: booking.id.clone(),
            customer_name: booking.customer_name.clone(),
            customer_email: booking.customer_email.clone(),
            customer_phone: booking.customer_phone.clone(),
            customer_whatsapp: booking.customer_whatsapp.clone(),
            workspace_type: booking.workspace_type.clone(),
            date: booking.date.format("%Y-%m-%d").to_string(),
            time_slot: booking.time_slot.clone(),
            duration: booking.duration.as_str().to_string(),
            total_price: booking.total_price,
            status: booking.status.as_str().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
