//! Email sending abstractions

pub mod console;
pub mod smtp;

pub use console::ConsoleMailer;
pub use smtp::SmtpMailer;

/// An outbound message, ready for the provider
#[derive(Debug, Clone)]
pub struct OutgoingMessage<'a> {
    pub from_name: &'a str,
    pub from_email: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    /// Sanitized HTML body
    pub html_body: &'a str,
}

/// Trait for dispatching mail through the transactional provider
pub trait Mailer: Send + Sync {
    /// Send a sign-in code to an email address
    fn send_verification(&self, email: &str, code: &str) -> Result<(), String>;

    /// Send a composed message
    fn send_message(&self, message: &OutgoingMessage<'_>) -> Result<(), String>;
}

/// Allow using Box<dyn Mailer> as a Mailer
impl Mailer for Box<dyn Mailer> {
    fn send_verification(&self, email: &str, code: &str) -> Result<(), String> {
        (**self).send_verification(email, code)
    }

    fn send_message(&self, message: &OutgoingMessage<'_>) -> Result<(), String> {
        (**self).send_message(message)
    }
}

/// Render an outbound body as HTML safe to hand to the provider
pub fn sanitize_body(message: &str) -> String {
    ammonia::clean(message)
}

/// Body of the verification email
pub fn verification_body(code: &str) -> String {
    format!(
        "<p>Copy the code below to sign in to your account:</p><p>{}</p>",
        code
    )
}
