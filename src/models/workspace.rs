use serde::{Deserialize, Serialize};

use super::BookingDuration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceType {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub capacity: i64,
    pub price_per_hour: f64,
    pub active: bool,
}

impl WorkspaceType {
    pub fn quote(&self, duration: BookingDuration) -> f64 {
        self.price_per_hour * duration.multiplier()
    }
}
