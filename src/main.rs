use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use deskbook::config::AppConfig;
use deskbook::db;
use deskbook::routes::build_router;
use deskbook::services::messaging::log::LogChannel;
use deskbook::services::messaging::twilio::TwilioWhatsAppChannel;
use deskbook::services::messaging::CodeChannel;
use deskbook::services::notifier::{LogNotifier, Notifier, WebhookNotifier};
use deskbook::state::AppState;

const SESSION_SWEEP_SECS: u64 = 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let code_channel: Box<dyn CodeChannel> = if config.twilio_configured() {
        anyhow::ensure!(
            !config.twilio_whatsapp_number.is_empty(),
            "TWILIO_WHATSAPP_NUMBER must be set when Twilio credentials are configured"
        );
        tracing::info!("using Twilio WhatsApp code channel (from: {})", config.twilio_whatsapp_number);
        Box::new(TwilioWhatsAppChannel::new(
            config.twilio_account_sid.clone(),
            config.twilio_auth_token.clone(),
            config.twilio_whatsapp_number.clone(),
        ))
    } else {
        tracing::warn!("Twilio not configured, confirmation codes will only be logged");
        Box::new(LogChannel)
    };

    let notifier: Box<dyn Notifier> = if config.notifier_url.is_empty() {
        tracing::info!("NOTIFIER_URL not set, booking events will not be posted");
        Box::new(LogNotifier)
    } else {
        tracing::info!("posting booking events to {}", config.notifier_url);
        Box::new(WebhookNotifier::new(
            config.notifier_url.clone(),
            config.notifier_secret.clone(),
        ))
    };

    if config.demo_mode {
        tracing::warn!("DEMO_MODE enabled: confirmation codes are returned to clients");
    }

    let state = Arc::new(AppState::new(conn, config.clone(), code_channel, notifier));
    tokio::spawn(sweep_sessions(Arc::clone(&state)));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn sweep_sessions(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(SESSION_SWEEP_SECS));
    loop {
        interval.tick().await;
        let evicted = state.sessions.evict_expired();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted idle confirmation sessions");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
