//! Booking lifecycle: drafting, confirmation codes and status transitions.
//!
//! Every transition out of `pending` goes through a conditional update, so of
//! several racing writers exactly one wins and the rest observe the new status.

use chrono::Utc;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Booking, BookingAction, BookingDuration, BookingStatus, ConfirmationSession, DraftBooking,
    PendingConfirmation,
};
use crate::services::code::{confirmation_message, generate_confirmation_code};
use crate::services::events;
use crate::state::AppState;

const PRICE_TOLERANCE: f64 = 0.005;

pub fn quote(
    state: &AppState,
    workspace_type: &str,
    duration: BookingDuration,
) -> Result<f64, AppError> {
    let workspace = {
        let db = state.db()?;
        queries::get_workspace_type_by_name(&db, workspace_type)?
    }
    .ok_or_else(|| AppError::Validation(format!("unknown workspace type: {workspace_type}")))?;

    Ok(workspace.quote(duration))
}

pub async fn create_booking(state: &AppState, draft: DraftBooking) -> Result<Booking, AppError> {
    validate_draft(&draft)?;

    let total_price = quote(state, &draft.workspace_type, draft.duration)?;
    if let Some(client_total) = draft.total_price {
        if (client_total - total_price).abs() > PRICE_TOLERANCE {
            return Err(AppError::Validation(format!(
                "total price {client_total} does not match quote {total_price}"
            )));
        }
    }

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        workspace_type: draft.workspace_type,
        date: draft.date,
        time_slot: draft.time_slot.trim().to_string(),
        duration: draft.duration,
        customer_name: draft.customer_name.trim().to_string(),
        customer_email: draft.customer_email.trim().to_string(),
        customer_phone: draft.customer_phone.trim().to_string(),
        customer_whatsapp: draft.customer_whatsapp.trim().to_string(),
        total_price,
        status: BookingStatus::Pending,
        confirmation_code: None,
        user_id: draft.user_id.filter(|u| !u.is_empty()),
        created_at: now,
        updated_at: now,
    };

    {
        let db = state.db()?;
        queries::insert_booking(&db, &booking)?;
    }

    tracing::info!(
        booking_id = %booking.id,
        workspace_type = %booking.workspace_type,
        total_price = booking.total_price,
        "booking created"
    );
    events::dispatch(state, BookingAction::BookingCreated, &booking).await;

    Ok(booking)
}

/// Sends a code for `booking_id` and records it in `session`.
///
/// The session must be the one opened for this booking. The code goes to one
/// of the booking's own contact addresses, the WhatsApp number by default. A
/// code already written onto the record is resent instead of a fresh one.
pub async fn request_confirmation_code(
    state: &AppState,
    session: &mut ConfirmationSession,
    booking_id: &str,
    contact: Option<&str>,
) -> Result<String, AppError> {
    let booking = fetch_booking(state, booking_id)?;
    if !session.owns(booking_id) {
        return Err(AppError::InvalidCode);
    }
    if booking.status.is_terminal() {
        return Err(AppError::InvalidState(booking.status));
    }

    let contact = resolve_contact(&booking, contact)?;

    let code = booking
        .confirmation_code
        .clone()
        .unwrap_or_else(generate_confirmation_code);
    let message = confirmation_message(&code, &booking.workspace_type);
    state
        .code_channel
        .send(contact, &message)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, booking_id = %booking.id, "confirmation code delivery failed");
            AppError::Delivery(e.to_string())
        })?;

    session.pending = Some(PendingConfirmation {
        expected_code: code.clone(),
        booking_id: booking.id.clone(),
        issued_at: Utc::now().naive_utc(),
    });

    tracing::info!(booking_id = %booking.id, "confirmation code sent");
    events::dispatch(state, BookingAction::CodeSent, &booking).await;

    Ok(code)
}

pub async fn confirm_booking(
    state: &AppState,
    session: &mut ConfirmationSession,
    booking_id: &str,
    entered_code: &str,
) -> Result<Booking, AppError> {
    let booking = fetch_booking(state, booking_id)?;
    if booking.status.is_terminal() {
        return Err(AppError::InvalidState(booking.status));
    }

    // A code written onto the record is the only one accepted once present.
    let code_matches = match booking.confirmation_code.as_deref() {
        Some(code_of_record) => entered_code == code_of_record,
        None => session.expected_code_for(booking_id) == Some(entered_code),
    };
    if !code_matches {
        tracing::info!(booking_id = %booking.id, "confirmation code mismatch");
        return Err(AppError::InvalidCode);
    }

    let confirmed = transition(state, booking_id, BookingStatus::Confirmed, Some(entered_code))?;

    tracing::info!(booking_id = %confirmed.id, "booking confirmed");
    events::dispatch(state, BookingAction::BookingConfirmed, &confirmed).await;
    session.clear();

    Ok(confirmed)
}

/// Administrator rejection. No code check.
pub async fn reject_booking(state: &AppState, booking_id: &str) -> Result<Booking, AppError> {
    let rejected = transition(state, booking_id, BookingStatus::Rejected, None)?;

    tracing::info!(booking_id = %rejected.id, "booking rejected");
    events::dispatch(state, BookingAction::BookingRejected, &rejected).await;

    Ok(rejected)
}

/// Writes a fresh administrator-issued code onto a pending booking and sends it
/// to the customer. The booking stays pending until the customer confirms.
pub async fn approve_booking(state: &AppState, booking_id: &str) -> Result<Booking, AppError> {
    let code = generate_confirmation_code();

    let approved = {
        let db = state.db()?;
        if !queries::set_code_if_pending(&db, booking_id, &code)? {
            return Err(match queries::get_booking_by_id(&db, booking_id)? {
                Some(current) => AppError::InvalidState(current.status),
                None => AppError::NotFound(format!("booking {booking_id}")),
            });
        }
        queries::get_booking_by_id(&db, booking_id)?
    }
    .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    let message = confirmation_message(&code, &approved.workspace_type);
    if let Err(e) = state
        .code_channel
        .send(approved.contact_address(), &message)
        .await
    {
        tracing::warn!(error = %e, booking_id = %approved.id, "failed to deliver approval code");
    }

    tracing::info!(booking_id = %approved.id, "booking approved, awaiting customer confirmation");
    events::dispatch(state, BookingAction::BookingApproved, &approved).await;

    Ok(approved)
}

/// Customer cancellation of a pending booking owned by `session`.
pub async fn cancel_booking(
    state: &AppState,
    session: &mut ConfirmationSession,
    booking_id: &str,
) -> Result<Booking, AppError> {
    let booking = fetch_booking(state, booking_id)?;
    if booking.status.is_terminal() {
        return Err(AppError::InvalidState(booking.status));
    }
    if !session.owns(booking_id) {
        return Err(AppError::InvalidCode);
    }

    let cancelled = transition(state, booking_id, BookingStatus::Cancelled, None)?;

    tracing::info!(booking_id = %cancelled.id, "booking cancelled by customer");
    events::dispatch(state, BookingAction::BookingCancelled, &cancelled).await;
    session.clear();

    Ok(cancelled)
}

pub fn fetch_booking(state: &AppState, booking_id: &str) -> Result<Booking, AppError> {
    let db = state.db()?;
    queries::get_booking_by_id(&db, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))
}

fn resolve_contact<'a>(
    booking: &'a Booking,
    requested: Option<&'a str>,
) -> Result<&'a str, AppError> {
    let requested = requested.map(str::trim).filter(|c| !c.is_empty());
    match requested {
        Some(c) if c == booking.customer_whatsapp || c == booking.customer_phone => Ok(c),
        Some(_) => Err(AppError::Validation(
            "contact must be the booking's phone or WhatsApp number".to_string(),
        )),
        None => {
            let fallback = booking.contact_address();
            if fallback.trim().is_empty() {
                return Err(AppError::Validation("no contact address for booking".to_string()));
            }
            Ok(fallback)
        }
    }
}

fn transition(
    state: &AppState,
    booking_id: &str,
    to: BookingStatus,
    confirmation_code: Option<&str>,
) -> Result<Booking, AppError> {
    let db = state.db()?;
    let applied = queries::transition_if_pending(&db, booking_id, to, confirmation_code)?;
    let current = queries::get_booking_by_id(&db, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    if applied {
        Ok(current)
    } else {
        Err(AppError::InvalidState(current.status))
    }
}

fn validate_draft(draft: &DraftBooking) -> Result<(), AppError> {
    let required = [
        ("workspace_type", &draft.workspace_type),
        ("time_slot", &draft.time_slot),
        ("customer_name", &draft.customer_name),
        ("customer_email", &draft.customer_email),
        ("customer_phone", &draft.customer_phone),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{field} is required")));
        }
    }

    let email = draft.customer_email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
        _ => return Err(AppError::Validation(format!("invalid email: {email}"))),
    }

    if let Some(total) = draft.total_price {
        if !total.is_finite() || total < 0.0 {
            return Err(AppError::Validation("total price must be non-negative".to_string()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;
    use crate::config::AppConfig;
    use crate::db;
    use crate::models::BookingEvent;
    use crate::services::messaging::CodeChannel;
    use crate::services::notifier::Notifier;

    #[derive(Clone, Default)]
    struct RecordingChannel {
        sent: Arc<Mutex<Vec<(String, String)>>>,
        fail: bool,
    }

    #[async_trait]
    impl CodeChannel for RecordingChannel {
        async fn send(&self, to: &str, body: &str) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("channel down");
            }
            self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        events: Arc<Mutex<Vec<BookingEvent>>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn post_event(&self, event: &BookingEvent) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(event.clone());
            if self.fail {
                anyhow::bail!("webhook unreachable");
            }
            Ok(())
        }
    }

    fn test_config() -> AppConfig {
        AppConfig {
            port: 3000,
            database_url: ":memory:".to_string(),
            admin_token: "test-token".to_string(),
            twilio_account_sid: String::new(),
            twilio_auth_token: String::new(),
            twilio_whatsapp_number: String::new(),
            notifier_url: String::new(),
            notifier_secret: String::new(),
            demo_mode: true,
            cors_origin: None,
            session_ttl_secs: 1800,
        }
    }

    fn test_state(channel: RecordingChannel, notifier: RecordingNotifier) -> AppState {
        let conn = db::init_db(":memory:").unwrap();
        AppState::new(conn, test_config(), Box::new(channel), Box::new(notifier))
    }

    fn draft() -> DraftBooking {
        DraftBooking {
            workspace_type: "Hot Desk".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
            time_slot: "09:00-10:00".to_string(),
            duration: BookingDuration::OneHour,
            customer_name: "Ada Lovelace".to_string(),
            customer_email: "ada@example.com".to_string(),
            customer_phone: "+15551234567".to_string(),
            customer_whatsapp: String::new(),
            total_price: Some(50.0),
            user_id: None,
        }
    }

    fn session_for(booking_id: &str, code: &str) -> ConfirmationSession {
        let mut session = ConfirmationSession::for_booking(booking_id);
        session.pending = Some(PendingConfirmation {
            expected_code: code.to_string(),
            booking_id: booking_id.to_string(),
            issued_at: Utc::now().naive_utc(),
        });
        session
    }

    #[tokio::test]
    async fn test_create_booking_is_pending_without_code() {
        let state = test_state(RecordingChannel::default(), RecordingNotifier::default());
        let booking = create_booking(&state, draft()).await.unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.confirmation_code.is_none());
        assert_eq!(booking.total_price, 50.0);

        let stored = fetch_booking(&state, &booking.id).unwrap();
        assert_eq!(stored.status, BookingStatus::Pending);
        assert!(stored.confirmation_code.is_none());
    }

    #[tokio::test]
    async fn test_create_booking_recomputes_price() {
        let state = test_state(RecordingChannel::default(), RecordingNotifier::default());
        let mut d = draft();
        d.duration = BookingDuration::FullDay;
        d.total_price = None;

        let booking = create_booking(&state, d).await.unwrap();
        assert_eq!(booking.total_price, 400.0);
    }

    #[tokio::test]
    async fn test_create_booking_rejects_tampered_price() {
        let state = test_state(RecordingChannel::default(), RecordingNotifier::default());
        let mut d = draft();
        d.total_price = Some(1.0);

        let err = create_booking(&state, d).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_booking_rejects_unknown_workspace() {
        let state = test_state(RecordingChannel::default(), RecordingNotifier::default());
        let mut d = draft();
        d.workspace_type = "Rooftop Hammock".to_string();

        let err = create_booking(&state, d).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_booking_validates_fields() {
        let state = test_state(RecordingChannel::default(), RecordingNotifier::default());

        let mut d = draft();
        d.customer_name = "  ".to_string();
        assert!(matches!(
            create_booking(&state, d).await.unwrap_err(),
            AppError::Validation(_)
        ));

        let mut d = draft();
        d.customer_email = "not-an-email".to_string();
        assert!(matches!(
            create_booking(&state, d).await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_full_confirmation_flow() {
        let channel = RecordingChannel::default();
        let notifier = RecordingNotifier::default();
        let state = test_state(channel.clone(), notifier.clone());

        let booking = create_booking(&state, draft()).await.unwrap();
        let mut session = ConfirmationSession::for_booking(&booking.id);
        let code = request_confirmation_code(&state, &mut session, &booking.id, Some("+15551234567"))
            .await
            .unwrap();

        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        {
            let sent = channel.sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].0, "+15551234567");
            assert!(sent[0].1.contains(&code));
        }

        let confirmed = confirm_booking(&state, &mut session, &booking.id, &code)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.confirmation_code.as_deref(), Some(code.as_str()));
        assert!(session.pending.is_none());

        let actions: Vec<BookingAction> = notifier
            .events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                BookingAction::BookingCreated,
                BookingAction::CodeSent,
                BookingAction::BookingConfirmed
            ]
        );
    }

    #[tokio::test]
    async fn test_wrong_code_leaves_booking_pending() {
        let state = test_state(RecordingChannel::default(), RecordingNotifier::default());
        let booking = create_booking(&state, draft()).await.unwrap();
        let mut session = session_for(&booking.id, "482913");

        let err = confirm_booking(&state, &mut session, &booking.id, "000000")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCode));
        assert_eq!(fetch_booking(&state, &booking.id).unwrap().status, BookingStatus::Pending);
        // retry with the right code still works
        assert!(session.pending.is_some());
        let confirmed = confirm_booking(&state, &mut session, &booking.id, "482913")
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_second_confirmation_is_invalid_state() {
        let state = test_state(RecordingChannel::default(), RecordingNotifier::default());
        let booking = create_booking(&state, draft()).await.unwrap();

        let mut session = session_for(&booking.id, "482913");
        let first = confirm_booking(&state, &mut session, &booking.id, "482913")
            .await
            .unwrap();

        let mut replay = session_for(&booking.id, "482913");
        let err = confirm_booking(&state, &mut replay, &booking.id, "482913")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(BookingStatus::Confirmed)));

        let after = fetch_booking(&state, &booking.id).unwrap();
        assert_eq!(after.status, BookingStatus::Confirmed);
        assert_eq!(after.updated_at, first.updated_at);
        assert_eq!(after.confirmation_code, first.confirmation_code);
    }

    #[tokio::test]
    async fn test_confirm_unknown_booking() {
        let state = test_state(RecordingChannel::default(), RecordingNotifier::default());
        let mut session = ConfirmationSession::default();
        let err = confirm_booking(&state, &mut session, "missing", "123456")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_session_code_for_other_booking_is_rejected() {
        let state = test_state(RecordingChannel::default(), RecordingNotifier::default());
        let a = create_booking(&state, draft()).await.unwrap();
        let b = create_booking(&state, draft()).await.unwrap();

        let mut session = session_for(&a.id, "482913");
        let err = confirm_booking(&state, &mut session, &b.id, "482913")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCode));
    }

    #[tokio::test]
    async fn test_empty_session_cannot_confirm() {
        let state = test_state(RecordingChannel::default(), RecordingNotifier::default());
        let booking = create_booking(&state, draft()).await.unwrap();
        let mut session = ConfirmationSession::default();

        let err = confirm_booking(&state, &mut session, &booking.id, "")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCode));
    }

    #[tokio::test]
    async fn test_persisted_code_overrides_session_code() {
        let channel = RecordingChannel::default();
        let state = test_state(channel.clone(), RecordingNotifier::default());
        let booking = create_booking(&state, draft()).await.unwrap();

        let approved = approve_booking(&state, &booking.id).await.unwrap();
        assert_eq!(approved.status, BookingStatus::Pending);
        let admin_code = approved.confirmation_code.clone().unwrap();
        assert_eq!(admin_code.len(), 6);
        assert!(channel.sent.lock().unwrap()[0].1.contains(&admin_code));

        // Session holds a different code; it no longer counts.
        let session_code = if admin_code == "111111" { "222222" } else { "111111" };
        let mut session = session_for(&booking.id, session_code);
        let err = confirm_booking(&state, &mut session, &booking.id, session_code)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCode));

        // The administrator's code works even without session state.
        let mut fresh = ConfirmationSession::default();
        let confirmed = confirm_booking(&state, &mut fresh, &booking.id, &admin_code)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_reject_then_confirm_is_invalid_state() {
        let state = test_state(RecordingChannel::default(), RecordingNotifier::default());
        let booking = create_booking(&state, draft()).await.unwrap();

        let rejected = reject_booking(&state, &booking.id).await.unwrap();
        assert_eq!(rejected.status, BookingStatus::Rejected);

        let mut session = session_for(&booking.id, "482913");
        let err = confirm_booking(&state, &mut session, &booking.id, "482913")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(BookingStatus::Rejected)));

        let err = reject_booking(&state, &booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(BookingStatus::Rejected)));
        let err = approve_booking(&state, &booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(BookingStatus::Rejected)));
    }

    #[tokio::test]
    async fn test_admin_paths_on_missing_booking() {
        let state = test_state(RecordingChannel::default(), RecordingNotifier::default());
        assert!(matches!(
            reject_booking(&state, "missing").await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            approve_booking(&state, "missing").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_delivery_failure_leaves_session_untouched() {
        let channel = RecordingChannel {
            fail: true,
            ..Default::default()
        };
        let state = test_state(channel, RecordingNotifier::default());
        let booking = create_booking(&state, draft()).await.unwrap();

        let mut session = ConfirmationSession::for_booking(&booking.id);
        let err = request_confirmation_code(&state, &mut session, &booking.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Delivery(_)));
        assert!(session.pending.is_none());
    }

    #[tokio::test]
    async fn test_code_defaults_to_whatsapp_contact() {
        let channel = RecordingChannel::default();
        let state = test_state(channel.clone(), RecordingNotifier::default());
        let mut d = draft();
        d.customer_whatsapp = "+15559876543".to_string();
        let booking = create_booking(&state, d).await.unwrap();

        let mut session = ConfirmationSession::for_booking(&booking.id);
        request_confirmation_code(&state, &mut session, &booking.id, Some("  "))
            .await
            .unwrap();
        assert_eq!(channel.sent.lock().unwrap()[0].0, "+15559876543");
    }

    #[tokio::test]
    async fn test_code_request_on_finalized_booking() {
        let state = test_state(RecordingChannel::default(), RecordingNotifier::default());
        let booking = create_booking(&state, draft()).await.unwrap();
        reject_booking(&state, &booking.id).await.unwrap();

        let mut session = ConfirmationSession::for_booking(&booking.id);
        let err = request_confirmation_code(&state, &mut session, &booking.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(BookingStatus::Rejected)));
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_fail_confirmation() {
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };
        let state = test_state(RecordingChannel::default(), notifier.clone());
        let booking = create_booking(&state, draft()).await.unwrap();

        let mut session = session_for(&booking.id, "482913");
        let confirmed = confirm_booking(&state, &mut session, &booking.id, "482913")
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(notifier.events.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_requires_owning_session() {
        let state = test_state(RecordingChannel::default(), RecordingNotifier::default());
        let booking = create_booking(&state, draft()).await.unwrap();

        let mut stranger = ConfirmationSession::default();
        let err = cancel_booking(&state, &mut stranger, &booking.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCode));

        let mut owner = session_for(&booking.id, "482913");
        let cancelled = cancel_booking(&state, &mut owner, &booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert!(owner.pending.is_none());

        let mut owner_again = session_for(&booking.id, "482913");
        let err = confirm_booking(&state, &mut owner_again, &booking.id, "482913")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(BookingStatus::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_before_requesting_code() {
        let state = test_state(RecordingChannel::default(), RecordingNotifier::default());
        let booking = create_booking(&state, draft()).await.unwrap();

        let mut owner = ConfirmationSession::for_booking(&booking.id);
        let cancelled = cancel_booking(&state, &mut owner, &booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_code_resend_after_approval_sends_record_code() {
        let channel = RecordingChannel::default();
        let state = test_state(channel.clone(), RecordingNotifier::default());
        let booking = create_booking(&state, draft()).await.unwrap();

        let approved = approve_booking(&state, &booking.id).await.unwrap();
        let admin_code = approved.confirmation_code.clone().unwrap();

        let mut session = ConfirmationSession::for_booking(&booking.id);
        let resent = request_confirmation_code(&state, &mut session, &booking.id, None)
            .await
            .unwrap();
        assert_eq!(resent, admin_code);
        {
            let sent = channel.sent.lock().unwrap();
            assert_eq!(sent.len(), 2);
            assert!(sent[1].1.contains(&admin_code));
        }

        let confirmed = confirm_booking(&state, &mut session, &booking.id, &resent)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_stranger_session_cannot_request_code() {
        let channel = RecordingChannel::default();
        let state = test_state(channel.clone(), RecordingNotifier::default());
        let victim = create_booking(&state, draft()).await.unwrap();
        let other = create_booking(&state, draft()).await.unwrap();

        let mut empty = ConfirmationSession::default();
        let err = request_confirmation_code(&state, &mut empty, &victim.id, Some("+19990000000"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCode));

        let mut other_owner = ConfirmationSession::for_booking(&other.id);
        let err = request_confirmation_code(&state, &mut other_owner, &victim.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCode));

        assert!(channel.sent.lock().unwrap().is_empty());
        assert!(empty.pending.is_none());
        assert!(other_owner.pending.is_none());
        assert_eq!(fetch_booking(&state, &victim.id).unwrap().status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_code_only_goes_to_booking_contacts() {
        let channel = RecordingChannel::default();
        let state = test_state(channel.clone(), RecordingNotifier::default());
        let mut d = draft();
        d.customer_whatsapp = "+15559876543".to_string();
        let booking = create_booking(&state, d).await.unwrap();
        let mut session = ConfirmationSession::for_booking(&booking.id);

        let err = request_confirmation_code(&state, &mut session, &booking.id, Some("+19990000000"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(channel.sent.lock().unwrap().is_empty());

        // Either of the booking's own numbers is accepted.
        request_confirmation_code(&state, &mut session, &booking.id, Some("+15551234567"))
            .await
            .unwrap();
        assert_eq!(channel.sent.lock().unwrap()[0].0, "+15551234567");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_confirmations_single_winner() {
        let state = Arc::new(test_state(
            RecordingChannel::default(),
            RecordingNotifier::default(),
        ));
        let booking = create_booking(&state, draft()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let state = Arc::clone(&state);
            let id = booking.id.clone();
            handles.push(tokio::spawn(async move {
                let mut session = session_for(&id, "482913");
                confirm_booking(&state, &mut session, &id, "482913").await
            }));
        }

        let mut successes = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(b) => {
                    assert_eq!(b.status, BookingStatus::Confirmed);
                    successes += 1;
                }
                Err(AppError::InvalidState(BookingStatus::Confirmed)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reject_racing_confirm_single_winner() {
        let state = Arc::new(test_state(
            RecordingChannel::default(),
            RecordingNotifier::default(),
        ));
        let booking = create_booking(&state, draft()).await.unwrap();

        let confirm = {
            let state = Arc::clone(&state);
            let id = booking.id.clone();
            tokio::spawn(async move {
                let mut session = session_for(&id, "482913");
                confirm_booking(&state, &mut session, &id, "482913").await
            })
        };
        let reject = {
            let state = Arc::clone(&state);
            let id = booking.id.clone();
            tokio::spawn(async move { reject_booking(&state, &id).await })
        };

        let confirmed = confirm.await.unwrap();
        let rejected = reject.await.unwrap();
        assert!(confirmed.is_ok() != rejected.is_ok(), "exactly one transition must win");

        let final_status = fetch_booking(&state, &booking.id).unwrap().status;
        if confirmed.is_ok() {
            assert_eq!(final_status, BookingStatus::Confirmed);
            assert!(matches!(rejected, Err(AppError::InvalidState(BookingStatus::Confirmed))));
        } else {
            assert_eq!(final_status, BookingStatus::Rejected);
            assert!(matches!(confirmed, Err(AppError::InvalidState(BookingStatus::Rejected))));
        }
    }
}
