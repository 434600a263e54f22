use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Booking, BookingDuration, BookingStatus, WorkspaceType};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

const BOOKING_COLUMNS: &str = "id, workspace_type, date, time_slot, duration, customer_name, \
     customer_email, customer_phone, customer_whatsapp, total_price, status, confirmation_code, \
     user_id, created_at, updated_at";

// ── Workspace Types ──

pub fn list_workspace_types(conn: &Connection) -> rusqlite::Result<Vec<WorkspaceType>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, capacity, price_per_hour, active
         FROM workspace_types WHERE active = 1 ORDER BY price_per_hour ASC, id ASC",
    )?;
    let rows = stmt.query_map([], parse_workspace_row)?;
    rows.collect()
}

pub fn get_workspace_type_by_name(
    conn: &Connection,
    name: &str,
) -> rusqlite::Result<Option<WorkspaceType>> {
    conn.query_row(
        "SELECT id, name, description, capacity, price_per_hour, active
         FROM workspace_types WHERE name = ?1 AND active = 1",
        params![name],
        parse_workspace_row,
    )
    .optional()
}

fn parse_workspace_row(row: &rusqlite::Row) -> rusqlite::Result<WorkspaceType> {
    Ok(WorkspaceType {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        capacity: row.get(3)?,
        price_per_hour: row.get(4)?,
        active: row.get::<_, i32>(5)? != 0,
    })
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &Booking) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        params![
            booking.id,
            booking.workspace_type,
            booking.date.format(DATE_FORMAT).to_string(),
            booking.time_slot,
            booking.duration.as_str(),
            booking.customer_name,
            booking.customer_email,
            booking.customer_phone,
            booking.customer_whatsapp,
            booking.total_price,
            booking.status.as_str(),
            booking.confirmation_code,
            booking.user_id,
            booking.created_at.format(TIMESTAMP_FORMAT).to_string(),
            booking.updated_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Booking>> {
    conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        parse_booking_row,
    )
    .optional()
}

#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub customer_email: Option<String>,
    pub limit: Option<i64>,
}

/// Bookings matching `filter`, newest first.
pub fn list_bookings(conn: &Connection, filter: &BookingFilter) -> rusqlite::Result<Vec<Booking>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(status) = filter.status {
        values.push(Box::new(status.as_str()));
        clauses.push("status = ?");
    }
    if let Some(email) = &filter.customer_email {
        values.push(Box::new(email.clone()));
        clauses.push("customer_email = ?");
    }

    let mut sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT ?");
    values.push(Box::new(filter.limit.unwrap_or(50)));

    let mut stmt = conn.prepare(&sql)?;
    let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let rows = stmt.query_map(refs.as_slice(), parse_booking_row)?;
    rows.collect()
}

/// Moves a booking out of `pending`. Returns `false` when no pending row matched,
/// so exactly one of several racing writers observes `true`.
pub fn transition_if_pending(
    conn: &Connection,
    id: &str,
    to: BookingStatus,
    confirmation_code: Option<&str>,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings
         SET status = ?1, confirmation_code = COALESCE(?2, confirmation_code), updated_at = ?3
         WHERE id = ?4 AND status = 'pending'",
        params![to.as_str(), confirmation_code, now_timestamp(), id],
    )?;
    Ok(count > 0)
}

/// Writes an administrator-issued code onto a booking that is still pending.
pub fn set_code_if_pending(conn: &Connection, id: &str, code: &str) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET confirmation_code = ?1, updated_at = ?2
         WHERE id = ?3 AND status = 'pending'",
        params![code, now_timestamp(), id],
    )?;
    Ok(count > 0)
}

fn now_timestamp() -> String {
    Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

fn parse_booking_row(row: &rusqlite::Row) -> rusqlite::Result<Booking> {
    let date_str: String = row.get(2)?;
    let duration_str: String = row.get(4)?;
    let status_str: String = row.get(10)?;
    let created_at_str: String = row.get(13)?;
    let updated_at_str: String = row.get(14)?;

    let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
        .map_err(|e| conversion_error(2, format!("invalid date {date_str:?}: {e}")))?;
    let duration = BookingDuration::parse(&duration_str)
        .ok_or_else(|| conversion_error(4, format!("unknown duration {duration_str:?}")))?;
    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| conversion_error(10, format!("unknown status {status_str:?}")))?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, TIMESTAMP_FORMAT)
        .map_err(|e| conversion_error(13, format!("invalid created_at: {e}")))?;
    let updated_at = NaiveDateTime::parse_from_str(&updated_at_str, TIMESTAMP_FORMAT)
        .map_err(|e| conversion_error(14, format!("invalid updated_at: {e}")))?;

    Ok(Booking {
        id: row.get(0)?,
        workspace_type: row.get(1)?,
        date,
        time_slot: row.get(3)?,
        duration,
        customer_name: row.get(5)?,
        customer_email: row.get(6)?,
        customer_phone: row.get(7)?,
        customer_whatsapp: row.get(8)?,
        total_price: row.get(9)?,
        status,
        confirmation_code: row.get(11)?,
        user_id: row.get(12)?,
        created_at,
        updated_at,
    })
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}
