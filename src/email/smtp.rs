//! SMTP-based mailer for production
//!
//! Speaks to the transactional provider over its SMTP relay; for Resend
//! the username is literally "resend" and the password is the API key.

use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};

use super::{verification_body, Mailer, OutgoingMessage};
use crate::config::SmtpConfig;

/// SMTP mailer for production use
pub struct SmtpMailer {
    transport: SmtpTransport,
    from_email: String,
    from_name: Option<String>,
}

impl SmtpMailer {
    /// Create a new SMTP mailer
    pub fn new(config: SmtpConfig) -> Result<Self, String> {
        let creds = Credentials::new(config.username, config.password);

        let transport = SmtpTransport::relay(&config.host)
            .map_err(|e| format!("Failed to create SMTP transport: {}", e))?
            .port(config.port)
            .credentials(creds)
            .build();

        // Test the connection
        transport
            .test_connection()
            .map_err(|e| format!("SMTP connection test failed: {}", e))?;

        tracing::info!(host = %config.host, port = config.port, "SMTP connection established");

        Ok(Self {
            transport,
            from_email: config.from_email,
            from_name: config.from_name,
        })
    }

    fn service_address(&self) -> String {
        match &self.from_name {
            Some(name) => format!("{} <{}>", name, self.from_email),
            None => self.from_email.clone(),
        }
    }

    fn send_html(&self, from: &str, to: &str, subject: &str, body: &str) -> Result<(), String> {
        let from = from
            .parse()
            .map_err(|e| format!("Invalid from address: {}", e))?;

        let to_addr = to
            .parse()
            .map_err(|e| format!("Invalid to address: {}", e))?;

        let email = Message::builder()
            .from(from)
            .to(to_addr)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())
            .map_err(|e| format!("Failed to build email: {}", e))?;

        self.transport
            .send(&email)
            .map_err(|e| format!("Failed to send email: {}", e))?;

        Ok(())
    }
}

impl Mailer for SmtpMailer {
    fn send_verification(&self, email: &str, code: &str) -> Result<(), String> {
        self.send_html(
            &self.service_address(),
            email,
            "Your sign-in code",
            &verification_body(code),
        )?;
        tracing::info!(email = %email, "Verification email sent");
        Ok(())
    }

    fn send_message(&self, message: &OutgoingMessage<'_>) -> Result<(), String> {
        let from = format!("{} <{}>", message.from_name, message.from_email);
        self.send_html(&from, message.to, message.subject, message.html_body)?;
        tracing::info!(to = %message.to, "Email dispatched");
        Ok(())
    }
}
