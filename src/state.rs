use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::BookingEvent;
use crate::services::messaging::CodeChannel;
use crate::services::notifier::Notifier;
use crate::services::sessions::SessionStore;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub code_channel: Box<dyn CodeChannel>,
    pub notifier: Box<dyn Notifier>,
    pub sessions: SessionStore,
    pub events_tx: broadcast::Sender<BookingEvent>,
}

impl AppState {
    pub fn new(
        conn: Connection,
        config: AppConfig,
        code_channel: Box<dyn CodeChannel>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        let sessions = SessionStore::new(chrono::Duration::seconds(config.session_ttl_secs));
        Self {
            db: Arc::new(Mutex::new(conn)),
            config,
            code_channel,
            notifier,
            sessions,
            events_tx,
        }
    }

    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal("database lock poisoned".to_string()))
    }
}
