use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Code dispatched to the customer and the booking it was issued for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingConfirmation {
    pub expected_code: String,
    pub booking_id: String,
    pub issued_at: NaiveDateTime,
}

/// Per-session confirmation context, passed explicitly into the lifecycle.
///
/// A session is bound to the booking it was opened for. Only that booking's
/// code can be requested, confirmed or cancelled through it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfirmationSession {
    pub booking_id: Option<String>,
    pub pending: Option<PendingConfirmation>,
}

impl ConfirmationSession {
    pub fn for_booking(booking_id: &str) -> Self {
        Self {
            booking_id: Some(booking_id.to_string()),
            pending: None,
        }
    }

    pub fn expected_code_for(&self, booking_id: &str) -> Option<&str> {
        self.pending
            .as_ref()
            .filter(|p| p.booking_id == booking_id && self.owns(booking_id))
            .map(|p| p.expected_code.as_str())
    }

    pub fn owns(&self, booking_id: &str) -> bool {
        self.booking_id.as_deref() == Some(booking_id)
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}
