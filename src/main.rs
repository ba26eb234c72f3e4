//! mailbridge server
//!
//! Sign in with an emailed code, connect Gmail, read synced threads,
//! send mail through the transactional provider.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mailbridge::{
    routes, AppState, Config, ConsoleMailer, GoogleClient, Mailer, SmtpMailer, SqliteStore,
    UserStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailbridge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(port = config.port, app_url = %config.app_url, "Loaded configuration");

    // Open storage
    let store = Arc::new(
        SqliteStore::open(&config.database_path)
            .map_err(|e| anyhow::anyhow!("Failed to open database: {}", e))?,
    );

    // Drop sign-in codes already past their expiry
    if let Ok(removed) = store.cleanup_expired_verifications() {
        if removed > 0 {
            tracing::info!(removed, "Removed expired sign-in codes");
        }
    }

    // Pick the mailer: SMTP when configured, console otherwise
    let mailer: Box<dyn Mailer> = match config.smtp.clone() {
        Some(smtp) => Box::new(
            SmtpMailer::new(smtp).map_err(|e| anyhow::anyhow!("SMTP setup failed: {}", e))?,
        ),
        None => {
            tracing::warn!("RESEND_KEY/MAIL_FROM not set; emails go to the console");
            Box::new(ConsoleMailer::new())
        }
    };

    let gmail = GoogleClient::new(config.google.clone());

    // Create app state; the SQLite store backs both users and threads
    let state = Arc::new(AppState::new(
        config.clone(),
        store.clone(),
        store,
        mailer,
        gmail,
    ));

    // Create router
    let app = routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("mailbridge listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
