//! Common test utilities for integration tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use axum_test::TestServer;
use serde_json::json;

use mailbridge::email::OutgoingMessage;
use mailbridge::gmail::{RemoteMessage, TokenResponse};
use mailbridge::{
    routes, AppError, AppState, Config, GmailApi, GoogleConfig, InMemoryThreadStore,
    InMemoryUserStore, Mailer, UserStore,
};

/// Mock mailer that captures everything it is asked to send
#[derive(Default, Clone)]
pub struct MockMailer {
    /// Captured (email, code) pairs
    pub codes: Arc<RwLock<Vec<(String, String)>>>,
    /// Captured (to, subject, html_body) triples
    pub sent: Arc<RwLock<Vec<(String, String, String)>>>,
    fail: Arc<AtomicBool>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the last sign-in code sent to an email
    pub fn get_code(&self, email: &str) -> Option<String> {
        self.codes
            .read()
            .unwrap()
            .iter()
            .rev()
            .find(|(e, _)| e == email)
            .map(|(_, c)| c.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.read().unwrap().len()
    }

    /// Make every subsequent send fail
    pub fn fail_sends(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl Mailer for MockMailer {
    fn send_verification(&self, email: &str, code: &str) -> Result<(), String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("mailer down".to_string());
        }
        self.codes
            .write()
            .unwrap()
            .push((email.to_string(), code.to_string()));
        Ok(())
    }

    fn send_message(&self, message: &OutgoingMessage<'_>) -> Result<(), String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("mailer down".to_string());
        }
        self.sent.write().unwrap().push((
            message.to.to_string(),
            message.subject.to_string(),
            message.html_body.to_string(),
        ));
        Ok(())
    }
}

/// Mock Gmail API with canned remote messages
#[derive(Default, Clone)]
pub struct MockGmail {
    pub messages: Arc<RwLock<Vec<RemoteMessage>>>,
    pub refresh_calls: Arc<AtomicUsize>,
}

impl MockGmail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&self, message: RemoteMessage) {
        self.messages.write().unwrap().push(message);
    }
}

#[async_trait]
impl GmailApi for MockGmail {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        if code == "bad-code" {
            return Err(AppError::Provider("invalid_grant".into()));
        }
        Ok(TokenResponse {
            access_token: "access-initial".into(),
            refresh_token: Some("refresh-initial".into()),
            scope: Some("https://www.googleapis.com/auth/gmail.readonly".into()),
            token_type: Some("Bearer".into()),
            expires_in: Some(3600),
        })
    }

    async fn refresh_access_token(&self, _refresh_token: &str) -> Result<TokenResponse, AppError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        // Google omits the refresh token on refresh responses
        Ok(TokenResponse {
            access_token: "access-refreshed".into(),
            refresh_token: None,
            scope: None,
            token_type: Some("Bearer".into()),
            expires_in: Some(3600),
        })
    }

    async fn list_message_ids(
        &self,
        _access_token: &str,
        _query: &str,
        max_results: u32,
    ) -> Result<Vec<String>, AppError> {
        Ok(self
            .messages
            .read()
            .unwrap()
            .iter()
            .take(max_results as usize)
            .map(|m| m.id.clone())
            .collect())
    }

    async fn get_message(&self, _access_token: &str, id: &str) -> Result<RemoteMessage, AppError> {
        self.messages
            .read()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| AppError::Provider(format!("No such message: {}", id)))
    }
}

/// A test server plus handles to its collaborators
pub struct TestApp {
    pub server: TestServer,
    pub mailer: MockMailer,
    pub gmail: MockGmail,
    pub users: Arc<InMemoryUserStore>,
    pub threads: Arc<InMemoryThreadStore>,
}

fn test_config() -> Config {
    Config {
        port: 0,
        session_secret: "integration-test-secret".into(),
        app_url: "http://localhost:3000".into(),
        database_path: "unused".into(),
        google: GoogleConfig {
            client_id: "test-client-id".into(),
            client_secret: "test-client-secret".into(),
            redirect_uri: "http://localhost:3000/api/google-auth/callback".into(),
        },
        smtp: None,
    }
}

/// Create a test server with mock mailer and Gmail API
pub fn create_test_server() -> TestApp {
    let mailer = MockMailer::new();
    let gmail = MockGmail::new();
    let users = Arc::new(InMemoryUserStore::new());
    let threads = Arc::new(InMemoryThreadStore::new());

    let state = Arc::new(AppState::new(
        test_config(),
        users.clone(),
        threads.clone(),
        mailer.clone(),
        gmail.clone(),
    ));

    let app = routes::create_router(state);
    let mut server = TestServer::new(app).expect("Failed to create test server");
    server.save_cookies();

    TestApp {
        server,
        mailer,
        gmail,
        users,
        threads,
    }
}

/// Create a user and sign them in; the session cookie is retained by
/// the server's cookie jar.
pub async fn sign_in(app: &TestApp, email: &str, first_name: &str, last_name: &str) {
    app.users
        .create_user(email, first_name, last_name)
        .expect("create user");

    let response = app
        .server
        .post("/api/auth/request-code")
        .json(&json!({ "email": email }))
        .await;
    assert_eq!(response.status_code(), 200);

    let code = app.mailer.get_code(email).expect("No sign-in code sent");

    let response = app
        .server
        .post("/api/auth/verify")
        .json(&json!({ "code": code }))
        .await;
    assert_eq!(response.status_code(), 200);
}
