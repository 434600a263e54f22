use crate::models::{Booking, BookingAction, BookingEvent};
use crate::state::AppState;

/// Broadcasts a booking event to the admin feed and posts it to the notifier.
///
/// Notifier failures are logged and never returned.
pub async fn dispatch(state: &AppState, action: BookingAction, booking: &Booking) {
    let event = BookingEvent::new(action, booking);

    // No receivers is fine
    let _ = state.events_tx.send(event.clone());

    if let Err(e) = state.notifier.post_event(&event).await {
        tracing::warn!(
            error = %e,
            action = action.as_str(),
            booking_id = %booking.id,
            "failed to notify booking event"
        );
    }
}
