use std::sync::Arc;

use serde::Serialize;

use crate::config::IntegrationsConfig;
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Outbound email collaborator.
#[async_trait::async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), ApiError>;
}

/// Transactional email over a JSON HTTP API with a bearer key.
pub struct HttpEmailSender {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    sender: String,
}

#[derive(Serialize)]
struct SendBody<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

impl HttpEmailSender {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        HttpEmailSender {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            sender: sender.into(),
        }
    }
}

#[async_trait::async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), ApiError> {
        let res = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&SendBody {
                from: &self.sender,
                to: [&message.to],
                subject: &message.subject,
                html: &message.html,
            })
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("Email API unreachable: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let payload = res.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), payload = %payload, "email API rejected message");
            return Err(ApiError::Upstream(format!("Email API returned {}", status)));
        }
        Ok(())
    }
}

/// Writes messages to the log instead of sending them (development).
pub struct LogEmailSender;

#[async_trait::async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), ApiError> {
        tracing::info!(to = %message.to, subject = %message.subject, "email (not sent)");
        tracing::debug!(html = %message.html, "email body");
        Ok(())
    }
}

pub fn from_config(config: &IntegrationsConfig) -> Arc<dyn EmailSender> {
    match (&config.email_api_url, &config.email_api_key) {
        (Some(url), Some(key)) => Arc::new(HttpEmailSender::new(url, key, &config.email_sender)),
        _ => {
            tracing::warn!("email API not configured; messages will only be logged");
            Arc::new(LogEmailSender)
        }
    }
}

/// Send without waiting. Failures are logged and never reach the caller.
pub fn send_in_background(sender: Arc<dyn EmailSender>, message: EmailMessage) {
    tokio::spawn(async move {
        let to = message.to.clone();
        let subject = message.subject.clone();
        if let Err(e) = sender.send(message).await {
            tracing::warn!(to = %to, subject = %subject, "email delivery failed: {}", e);
        }
    });
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!doctype html><html><body style=\"font-family:sans-serif;max-width:560px;margin:auto\">\
         <h2>{}</h2>{}<p style=\"color:#888;font-size:12px\">You received this email because \
         you have an account on our course platform.</p></body></html>",
        escape(title),
        body
    )
}

pub fn password_reset(to: &str, code: &str, valid_minutes: i64) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Your password reset code".to_string(),
        html: layout(
            "Reset your password",
            &format!(
                "<p>Use this code to choose a new password:</p>\
                 <p style=\"font-size:28px;letter-spacing:6px\"><b>{}</b></p>\
                 <p>The code expires in {} minutes. If you did not ask for it, ignore this email.</p>",
                escape(code),
                valid_minutes
            ),
        ),
    }
}

pub fn welcome(to: &str, name: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Welcome aboard".to_string(),
        html: layout(
            &format!("Welcome, {}", name),
            "<p>Your account is ready. Browse the catalog and start learning.</p>",
        ),
    }
}

pub fn payment_confirmation(to: &str, course_title: &str, amount: i64, currency: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("Enrollment confirmed: {}", course_title),
        html: layout(
            "Payment received",
            &format!(
                "<p>You are now enrolled in <b>{}</b>.</p><p>Amount paid: {}.{:02} {}</p>",
                escape(course_title),
                amount / 100,
                amount % 100,
                escape(currency)
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_escape_user_text() {
        let msg = welcome("a@x.com", "<b>Eve</b>");
        assert!(msg.html.contains("&lt;b&gt;Eve&lt;/b&gt;"));
        let msg = payment_confirmation("a@x.com", "Options", 49_950, "INR");
        assert!(msg.html.contains("499.50 INR"));
        let msg = password_reset("a@x.com", "042917", 15);
        assert!(msg.html.contains("042917"));
        assert!(msg.html.contains("15 minutes"));
    }
}
