//! Console-based mailer for development

use super::{Mailer, OutgoingMessage};

/// Mailer that logs to console (for development)
pub struct ConsoleMailer;

impl ConsoleMailer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleMailer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailer for ConsoleMailer {
    fn send_verification(&self, email: &str, code: &str) -> Result<(), String> {
        println!();
        println!("========================================");
        println!("  SIGN-IN CODE FOR: {}", email);
        println!("  CODE: {}", code);
        println!("========================================");
        println!();

        tracing::info!(email = %email, code = %code, "Sign-in code sent");

        Ok(())
    }

    fn send_message(&self, message: &OutgoingMessage<'_>) -> Result<(), String> {
        println!();
        println!("========================================");
        println!("  EMAIL TO: {}", message.to);
        println!("  FROM: {} <{}>", message.from_name, message.from_email);
        println!("  SUBJECT: {}", message.subject);
        println!("  {}", message.html_body);
        println!("========================================");
        println!();

        tracing::info!(to = %message.to, subject = %message.subject, "Email sent");

        Ok(())
    }
}
