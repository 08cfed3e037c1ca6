pub mod templates;

use async_trait::async_trait;
use log::{info, warn};

use crate::core::config::EmailConfig;

/// Result of one delivery attempt. Transport failures are reported here,
/// never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn sent() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> SendOutcome;
}

#[cfg(feature = "mail")]
pub use smtp::SmtpEmailSender;

#[cfg(feature = "mail")]
mod smtp {
    use super::*;
    use lettre::{
        message::{Message, MultiPart},
        transport::smtp::authentication::Credentials,
        SmtpTransport, Transport,
    };

    #[derive(Debug, Clone)]
    pub struct SmtpEmailSender {
        config: EmailConfig,
    }

    impl SmtpEmailSender {
        pub fn new(config: EmailConfig) -> Self {
            Self { config }
        }

        fn deliver(config: &EmailConfig, to: &str, subject: &str, html: &str) -> Result<(), String> {
            let from = if config.from.is_empty() {
                &config.username
            } else {
                &config.from
            };
            let email = Message::builder()
                .from(from.parse().map_err(|e| format!("Invalid from address: {e}"))?)
                .to(to.parse().map_err(|e| format!("Invalid to address: {e}"))?)
                .subject(subject)
                .multipart(MultiPart::alternative_plain_html(
                    templates::strip_tags(html),
                    html.to_string(),
                ))
                .map_err(|e| format!("Failed to build email: {e}"))?;

            let creds = Credentials::new(config.username.clone(), config.password.clone());
            let mailer = SmtpTransport::starttls_relay(&config.smtp_server)
                .map_err(|e| format!("SMTP relay error: {e}"))?
                .port(config.smtp_port)
                .credentials(creds)
                .build();

            mailer
                .send(&email)
                .map(|_| ())
                .map_err(|e| format!("Failed to send email: {e}"))
        }
    }

    #[async_trait]
    impl EmailSender for SmtpEmailSender {
        async fn send(&self, to: &str, subject: &str, html: &str) -> SendOutcome {
            if !self.config.has_credentials() {
                info!("Email to {to} skipped - No SMTP configuration");
                return SendOutcome::failed("No SMTP configuration");
            }

            let config = self.config.clone();
            let (to, subject, html) = (to.to_string(), subject.to_string(), html.to_string());
            let result = tokio::task::spawn_blocking(move || {
                Self::deliver(&config, &to, &subject, &html).map(|()| to)
            })
            .await;

            match result {
                Ok(Ok(to)) => {
                    info!("Email sent to {to}");
                    SendOutcome::sent()
                }
                Ok(Err(e)) => {
                    warn!("{e}");
                    SendOutcome::failed(e)
                }
                Err(e) => {
                    warn!("Email task failed: {e}");
                    SendOutcome::failed(e.to_string())
                }
            }
        }
    }
}

/// Sender used when the binary is built without SMTP support.
#[derive(Debug, Clone, Default)]
pub struct DisabledEmailSender;

#[async_trait]
impl EmailSender for DisabledEmailSender {
    async fn send(&self, to: &str, _subject: &str, _html: &str) -> SendOutcome {
        info!("Email to {to} skipped - mail support disabled");
        SendOutcome::failed("Mail support disabled")
    }
}

/// Picks the SMTP sender when compiled in.
pub fn sender_from_config(config: &EmailConfig) -> std::sync::Arc<dyn EmailSender> {
    #[cfg(feature = "mail")]
    {
        std::sync::Arc::new(SmtpEmailSender::new(config.clone()))
    }
    #[cfg(not(feature = "mail"))]
    {
        let _ = config;
        warn!("Built without the mail feature; notifications will not be delivered");
        std::sync::Arc::new(DisabledEmailSender)
    }
}
