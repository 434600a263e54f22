use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub workspace_type: String,
    pub date: NaiveDate,
    pub time_slot: String,
    pub duration: BookingDuration,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub customer_whatsapp: String,
    pub total_price: f64,
    pub status: BookingStatus,
    pub confirmation_code: Option<String>,
    pub user_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    /// Preferred out-of-band address for this customer: WhatsApp, then phone.
    pub fn contact_address(&self) -> &str {
        if self.customer_whatsapp.trim().is_empty() {
            &self.customer_phone
        } else {
            &self.customer_whatsapp
        }
    }
}

/// A reservation request that has not been persisted yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftBooking {
    pub workspace_type: String,
    pub date: NaiveDate,
    pub time_slot: String,
    pub duration: BookingDuration,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    #[serde(default)]
    pub customer_whatsapp: String,
    /// Client-side total, checked against the server quote when present.
    #[serde(default)]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Rejected,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Unrecognized values yield `None`; callers decide how to reject them.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "rejected" => Some(BookingStatus::Rejected),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BookingDuration {
    #[serde(rename = "1-hour")]
    OneHour,
    #[serde(rename = "half-day")]
    HalfDay,
    #[serde(rename = "full-day")]
    FullDay,
    #[serde(rename = "1-week")]
    OneWeek,
    #[serde(rename = "1-month")]
    OneMonth,
}

impl BookingDuration {
    pub const ALL: [BookingDuration; 5] = [
        BookingDuration::OneHour,
        BookingDuration::HalfDay,
        BookingDuration::FullDay,
        BookingDuration::OneWeek,
        BookingDuration::OneMonth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingDuration::OneHour => "1-hour",
            BookingDuration::HalfDay => "half-day",
            BookingDuration::FullDay => "full-day",
            BookingDuration::OneWeek => "1-week",
            BookingDuration::OneMonth => "1-month",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }

    /// Billable hours for this duration.
    pub fn multiplier(&self) -> f64 {
        match self {
            BookingDuration::OneHour => 1.0,
            BookingDuration::HalfDay => 4.0,
            BookingDuration::FullDay => 8.0,
            BookingDuration::OneWeek => 40.0,
            BookingDuration::OneMonth => 160.0,
        }
    }
}
