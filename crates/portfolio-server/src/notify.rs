//! Chat notifications for new contact messages and emails.
//!
//! Notifications are best-effort: callers persist first, then notify, and
//! report whether the notification went out. A [`Notifier`] is optional
//! in [`crate::AppState`]; without credentials nothing is sent.

use std::fmt;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;

use portfolio_core::{NewContact, NewEmail};

use crate::config::TelegramConfig;

/// Characters of the email body included in a notification.
pub const EMAIL_PREVIEW_CHARS: usize = 200;

/// A message to deliver to the site owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Contact {
        fullname: String,
        email: String,
        message: String,
    },
    Email {
        id: String,
        from: String,
        to: String,
        subject: String,
        received: String,
        preview: String,
    },
}

impl Notification {
    pub fn contact(contact: &NewContact) -> Self {
        Self::Contact {
            fullname: contact.fullname.clone(),
            email: contact.email.clone(),
            message: contact.message.clone(),
        }
    }

    /// Notification for a stored email with id `id`.
    pub fn email(id: &str, email: &NewEmail, received: DateTime<Utc>) -> Self {
        Self::Email {
            id: id.to_string(),
            from: email.from.clone(),
            to: email.to.clone(),
            subject: email.subject.clone(),
            received: received.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            preview: preview(&email.body),
        }
    }

    /// Render as chat text with HTML special characters escaped.
    pub fn render(&self) -> String {
        match self {
            Self::Contact {
                fullname,
                email,
                message,
            } => format!(
                "New Contact Form Submission\n\nName: {}\nEmail: {}\nMessage:\n{}",
                escape_html(fullname),
                escape_html(email),
                escape_html(message),
            ),
            Self::Email {
                id,
                from,
                to,
                subject,
                received,
                preview,
            } => format!(
                "New Email Received\n\nFrom: {}\nTo: {}\nSubject: {}\nID: {}\nTime: {}\n\nPreview: {}",
                escape_html(from),
                escape_html(to),
                escape_html(subject),
                escape_html(id),
                received,
                escape_html(preview),
            ),
        }
    }
}

/// First [`EMAIL_PREVIEW_CHARS`] characters, with `...` when cut.
fn preview(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(EMAIL_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Notification delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The request could not be sent.
    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The chat API answered with a non-success status.
    #[error("chat api returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Delivers notifications somewhere the owner will see them.
pub trait Notifier: Send + Sync + fmt::Debug {
    fn notify<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), NotifyError>>;
}

// ============================================================================
// Telegram
// ============================================================================

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
}

/// Sends notifications through the Telegram bot API.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base, self.config.bot_token
        )
    }
}

impl fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Notifier for TelegramNotifier {
    fn notify<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            let body = SendMessage {
                chat_id: &self.config.chat_id,
                text: notification.render(),
                parse_mode: "HTML",
            };
            let response = self.client.post(self.endpoint()).json(&body).send().await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(NotifyError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            tracing::debug!("Chat notification delivered");
            Ok(())
        })
    }
}
