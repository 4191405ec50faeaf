//! Order confirmation delivery.
//!
//! Checkout treats notification as best-effort: callers log failures and move on.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use thiserror::Error;

use crate::{config::SmtpConfig, models::Order};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn order_confirmation(&self, order: &Order) -> Result<(), NotifyError>;
}

pub fn confirmation_subject(order: &Order) -> String {
    format!("Order confirmation #{}", order.order_number)
}

pub fn confirmation_body(order: &Order) -> String {
    let mut body = format!(
        "Hello {},\n\nYour order #{} has been received.\n\n",
        order.customer_info.name, order.order_number
    );
    for item in &order.items {
        body.push_str(&format!(
            "- {} x{}: {}\n",
            item.name,
            item.quantity,
            item.line_total()
        ));
    }
    body.push_str(&format!("\nTotal: {}\n", order.total));
    body
}

#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpNotifier {
    /// STARTTLS unless the relay is explicitly marked insecure.
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let mut builder = if config.insecure {
            tracing::warn!(host = %config.host, "smtp relay configured without TLS");
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        }
        .port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn order_confirmation(&self, order: &Order) -> Result<(), NotifyError> {
        let to = &order.customer_info.email;
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| NotifyError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| NotifyError::InvalidAddress(to.clone()))?)
            .subject(confirmation_subject(order))
            .header(ContentType::TEXT_PLAIN)
            .body(confirmation_body(order))?;

        self.mailer.send(email).await?;
        tracing::info!(order_id = %order.id, "order confirmation sent");
        Ok(())
    }
}

/// Used when no SMTP host is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn order_confirmation(&self, order: &Order) -> Result<(), NotifyError> {
        tracing::info!(
            order_id = %order.id,
            to = %order.customer_info.email,
            subject = %confirmation_subject(order),
            "order confirmation (smtp disabled)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp_config(insecure: bool) -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: Some("mailer".into()),
            password: Some("secret".into()),
            from_address: "noreply@example.com".into(),
            insecure,
        }
    }

    #[tokio::test]
    async fn relay_builds_with_starttls() {
        assert!(SmtpNotifier::new(&smtp_config(false)).is_ok());
    }

    #[tokio::test]
    async fn insecure_relay_is_opt_in() {
        assert!(SmtpNotifier::new(&smtp_config(true)).is_ok());
    }
}
