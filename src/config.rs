//! Service configuration

/// Runtime configuration, loaded from the environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// Secret the session cookie key is derived from
    pub session_secret: String,

    /// Base URL this deployment is reachable at (OAuth redirects point here)
    pub app_url: String,

    /// Path to the SQLite database
    pub database_path: String,

    /// Google OAuth client credentials
    pub google: GoogleConfig,

    /// SMTP configuration; `None` selects the console mailer
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Full redirect URI registered with Google
    pub redirect_uri: String,
}

/// Configuration for sending mail through an SMTP relay
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// SMTP password; for Resend this is the API key
    pub password: String,
    pub from_email: String,
    pub from_name: Option<String>,
}

/// Helper to get a non-empty env var
fn get_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Required:
    /// - SESSION_SECRET
    /// - GOOGLE_CLIENT_ID
    /// - GOOGLE_CLIENT_SECRET
    ///
    /// Optional:
    /// - PORT (default: 3000)
    /// - DATABASE_PATH (default: mailbridge.db)
    /// - APP_URL, or DEPLOY_ENV + PRODUCTION_URL / PREVIEW_URL
    /// - RESEND_KEY + MAIL_FROM (selects the SMTP mailer)
    pub fn from_env() -> anyhow::Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let session_secret = get_env("SESSION_SECRET")
            .ok_or_else(|| anyhow::anyhow!("SESSION_SECRET is not set"))?;

        let app_url = resolve_app_url(port);

        let google = GoogleConfig {
            client_id: get_env("GOOGLE_CLIENT_ID")
                .ok_or_else(|| anyhow::anyhow!("GOOGLE_CLIENT_ID is not set"))?,
            client_secret: get_env("GOOGLE_CLIENT_SECRET")
                .ok_or_else(|| anyhow::anyhow!("GOOGLE_CLIENT_SECRET is not set"))?,
            redirect_uri: format!("{}/api/google-auth/callback", app_url),
        };

        Ok(Self {
            port,
            session_secret,
            app_url,
            database_path: get_env("DATABASE_PATH").unwrap_or_else(|| "mailbridge.db".into()),
            google,
            smtp: SmtpConfig::from_env(),
        })
    }
}

/// Pick the base URL for this deployment environment
///
/// APP_URL wins when set; otherwise DEPLOY_ENV selects between the
/// production and preview URLs, falling back to localhost.
fn resolve_app_url(port: u16) -> String {
    if let Some(url) = get_env("APP_URL") {
        return url;
    }
    match get_env("DEPLOY_ENV").as_deref() {
        Some("production") => get_env("PRODUCTION_URL"),
        Some("preview") => get_env("PREVIEW_URL"),
        _ => None,
    }
    .unwrap_or_else(|| format!("http://localhost:{}", port))
}

impl SmtpConfig {
    /// Build SMTP settings from the environment
    ///
    /// RESEND_KEY and MAIL_FROM are required; host, port, and username
    /// default to Resend's SMTP relay.
    pub fn from_env() -> Option<Self> {
        let password = get_env("RESEND_KEY")?;
        let from_email = get_env("MAIL_FROM")?;

        let port = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(465);

        Some(Self {
            host: get_env("SMTP_HOST").unwrap_or_else(|| "smtp.resend.com".into()),
            port,
            username: get_env("SMTP_USERNAME").unwrap_or_else(|| "resend".into()),
            password,
            from_email,
            from_name: get_env("MAIL_FROM_NAME"),
        })
    }
}
