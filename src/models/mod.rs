pub mod booking;
pub mod confirmation;
pub mod event;
pub mod workspace;

pub use booking::{Booking, BookingDuration, BookingStatus, DraftBooking};
pub use confirmation::{ConfirmationSession, PendingConfirmation};
pub use event::{BookingAction, BookingEvent};
pub use workspace::WorkspaceType;
