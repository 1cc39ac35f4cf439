//! Outgoing e-mail. Services receive an `Arc<dyn EmailSender>` built once
//! at startup by [`email_sender_from`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::config::Settings;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("email relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("email relay rejected message with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), EmailError>;
}

/// Writes mails to the log instead of delivering them.
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, email: &Email) -> Result<(), EmailError> {
        info!(to = %email.to, subject = %email.subject, "email (log only)");
        Ok(())
    }
}

/// Posts mails as JSON to an HTTP relay.
pub struct RelayEmailSender {
    client: reqwest::Client,
    url: String,
}

impl RelayEmailSender {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl EmailSender for RelayEmailSender {
    async fn send(&self, email: &Email) -> Result<(), EmailError> {
        let res = self.client.post(&self.url).json(email).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(EmailError::Rejected(status.as_u16()));
        }
        info!(to = %email.to, "email handed to relay");
        Ok(())
    }
}

pub fn email_sender_from(settings: &Settings) -> Arc<dyn EmailSender> {
    match settings.email_relay_url.as_deref() {
        Some(url) if !url.trim().is_empty() => Arc::new(RelayEmailSender::new(url)),
        _ => Arc::new(LogEmailSender),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn mail() -> Email {
        Email {
            from: "no-reply@exams.local".into(),
            to: "student@example.com".into(),
            subject: "Password reset".into(),
            body: "Your code is 123456".into(),
        }
    }

    #[tokio::test]
    async fn relay_posts_json() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/send")
                    .json_body_partial(r#"{"to":"student@example.com"}"#);
                then.status(202);
            })
            .await;

        let sender = RelayEmailSender::new(server.url("/send"));
        sender.send(&mail()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn relay_rejection_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/send");
                then.status(500);
            })
            .await;

        let err = RelayEmailSender::new(server.url("/send"))
            .send(&mail())
            .await
            .unwrap_err();
        assert!(matches!(err, EmailError::Rejected(500)));
    }

    #[tokio::test]
    async fn log_sender_is_default() {
        let sender = email_sender_from(&Settings::default());
        assert!(sender.send(&mail()).await.is_ok());
    }
}
