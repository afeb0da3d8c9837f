//! Reminder delivery.
//!
//! A `Notifier` sends one text message to the single configured recipient.
//! The Telegram implementation talks to the Bot API `sendMessage` method.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ReminderError, ReminderResult};
use crate::event::CalendarEvent;

const SEND_TIMEOUT: Duration = Duration::from_secs(20);

/// Telegram rejects `sendMessage` text longer than this.
pub const MAX_MESSAGE_CHARS: usize = 4096;
const MAX_TITLE_CHARS: usize = 256;
const ELLIPSIS: char = '…';

pub trait Notifier {
    fn send(&self, text: &str) -> impl Future<Output = ReminderResult<()>> + Send;
}

/// Build the reminder text for an event.
///
/// Header, blank line, title, start time, blank line, body. The header is
/// bold in Telegram's legacy Markdown; event text is escaped so it renders
/// literally. Long titles and bodies are cut with an ellipsis so the message
/// never exceeds `MAX_MESSAGE_CHARS`.
pub fn format_reminder(event: &CalendarEvent) -> ReminderResult<String> {
    let start = event.start.display()?;

    let head = format!(
        "📚 *Calendar reminder*\n\n📝 {}\n📅 {}\n\n",
        escape_markdown(&event.title, MAX_TITLE_CHARS),
        start
    );
    let room = MAX_MESSAGE_CHARS.saturating_sub(head.chars().count());
    let body = escape_markdown(event.body.trim_end(), room);

    let text = head + &body;
    Ok(text.trim_end().to_string())
}

fn needs_escape(c: char) -> bool {
    matches!(c, '_' | '*' | '`' | '[')
}

/// Escape `text` for legacy Markdown in at most `limit` characters.
///
/// When the escaped text does not fit, it is cut at a character boundary
/// of the input and ends in an ellipsis. An escape pair is never split.
fn escape_markdown(text: &str, limit: usize) -> String {
    let escaped_len: usize = text.chars().map(|c| if needs_escape(c) { 2 } else { 1 }).sum();
    let fits = escaped_len <= limit;
    if !fits && limit == 0 {
        return String::new();
    }

    let budget = if fits { limit } else { limit - 1 };
    let mut out = String::with_capacity(text.len());
    let mut used = 0;

    for c in text.chars() {
        let width = if needs_escape(c) { 2 } else { 1 };
        if used + width > budget {
            break;
        }
        if width == 2 {
            out.push('\\');
        }
        out.push(c);
        used += width;
    }

    if !fits {
        out.push(ELLIPSIS);
    }
    out
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(api_url: &str, token: &str, chat_id: &str) -> ReminderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| ReminderError::Delivery(e.to_string()))?;

        Ok(TelegramNotifier {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_url.trim_end_matches('/'), token),
            chat_id: chat_id.to_string(),
        })
    }
}

impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> ReminderResult<()> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "Markdown",
        };

        // The endpoint embeds the bot token; keep it out of error messages.
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ReminderError::Delivery(e.without_url().to_string()))?;

        let status = response.status();
        let api: Option<ApiResponse> = response.json().await.ok();

        match api {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => {
                debug!(chat_id = %self.chat_id, "Telegram accepted message");
                Ok(())
            }
            Some(ApiResponse { description, .. }) => Err(ReminderError::Delivery(format!(
                "Telegram API returned {}: {}",
                status,
                description.unwrap_or_else(|| "no description".to_string())
            ))),
            None => Err(ReminderError::Delivery(format!(
                "Telegram API returned {} with an unreadable body",
                status
            ))),
        }
    }
}
