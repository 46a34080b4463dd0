use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{Notification, Notifier};
use crate::config::EmailSettings;
use crate::error::NotificationError;

const TIMEOUT_SECS: u64 = 10;

/// Weekly report delivery through an HTTP email API (Resend-compatible)
pub struct EmailNotifier {
    client: Client,
    endpoint: String,
    api_key: String,
    from: String,
    to: String,
}

#[derive(Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

impl EmailNotifier {
    pub fn new(settings: &EmailSettings) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            from: settings.from.clone(),
            to: settings.to.clone(),
        })
    }

    pub async fn send_email(&self, subject: &str, html: &str) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmailRequest {
                from: &self.from,
                to: [self.to.as_str()],
                subject,
                html,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(to = %self.to, subject, "Email sent");
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    fn accepts(&self, notification: &Notification) -> bool {
        matches!(notification, Notification::WeeklyReport(_))
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        match notification {
            Notification::WeeklyReport(report) => {
                self.send_email(&report.subject(), &report.html_body()).await
            }
            _ => Ok(()),
        }
    }
}
