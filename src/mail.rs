use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::Mailbox,
    transport::smtp::authentication::Credentials,
};
use std::sync::{Arc, Mutex};

use crate::config::{AppConfig, Env};

/// MailError
///
/// Failures raised by the mail gateway. Surfaced to signup callers as a 400
/// via `ApiError::Mail`; the user record created before the send is never
/// rolled back.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("mail gateway failure: {0}")]
    Gateway(String),
}

// 1. Mailer Contract
/// Mailer
///
/// Abstract contract for the outbound mail gateway. The handlers only ever
/// see this trait, so the concrete SMTP client (SmtpMailer) can be swapped
/// for the in-memory MockMailer in tests.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers the confirmation code to `to`.
    async fn send_confirmation_code(
        &self,
        to: &str,
        username: &str,
        code: &str,
    ) -> Result<(), MailError>;
}

/// MailerState
///
/// The concrete type used to share the mail gateway across the application state.
pub type MailerState = Arc<dyn Mailer>;

// 2. The Real Implementation (SMTP)
/// SmtpMailer
///
/// SMTP client built on lettre's async tokio transport. In `Env::Local` it
/// speaks plaintext to a development sink (Mailpit/MailHog); in production
/// it uses a TLS relay with the configured credentials.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Constructs the transport from the injected configuration.
    pub fn new(config: &AppConfig) -> Result<Self, MailError> {
        let mut builder = match config.env {
            Env::Production => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?,
            // Plaintext transport for the local development sink.
            Env::Local => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            }
        };
        builder = builder.port(config.smtp_port);
        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: config.mail_from.parse()?,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_confirmation_code(
        &self,
        to: &str,
        username: &str,
        code: &str,
    ) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject("Your confirmation code")
            .body(format!(
                "Hello {username}! Your confirmation code is {code}."
            ))?;

        self.transport.send(message).await?;
        Ok(())
    }
}

// 3. The Mock Implementation (For Tests)
/// MockMailer
///
/// In-memory mailer used by unit and integration tests. Records every send
/// so tests can assert on the delivered code, and can simulate a gateway
/// failure to exercise the persist-despite-send-failure signup path.
#[derive(Default)]
pub struct MockMailer {
    /// When true, every send returns a simulated gateway failure.
    pub should_fail: bool,
    /// (recipient, code) pairs in send order.
    pub sent: Mutex<Vec<(String, String)>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_confirmation_code(
        &self,
        to: &str,
        _username: &str,
        code: &str,
    ) -> Result<(), MailError> {
        if self.should_fail {
            return Err(MailError::Gateway("simulated gateway failure".to_string()));
        }
        self.sent
            .lock()
            .expect("mail log poisoned")
            .push((to.to_string(), code.to_string()));
        Ok(())
    }
}
