//! The subset of the Telegram Bot API payloads we use.

use serde::{Deserialize, Serialize};


/// Envelope of every Bot API response: `{"ok": true, "result": ...}` or
/// `{"ok": false, "description": "..."}`.
#[derive(Debug, Deserialize)]
pub(crate) struct TgResponse<T> {
    pub(crate) ok: bool,
    pub(crate) result: Option<T>,
    pub(crate) description: Option<String>,
    pub(crate) error_code: Option<i32>,
}

impl<T> TgResponse<T> {
    /// Turns the envelope into the result, or an error with the description
    /// Telegram gave.
    pub(crate) fn into_result(self) -> anyhow::Result<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(anyhow::anyhow!("Telegram response is missing 'result'")),
            (false, _) => Err(anyhow::anyhow!(
                "Telegram API error{}: {}",
                self.error_code.map(|c| format!(" {c}")).unwrap_or_default(),
                self.description.as_deref().unwrap_or("<no description>"),
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Update {
    pub(crate) update_id: i64,
    pub(crate) message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Message {
    pub(crate) chat: Chat,
    pub(crate) text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Chat {
    pub(crate) id: i64,
}

/// The bot itself, as returned by `getMe`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BotUser {
    pub(crate) id: i64,
    pub(crate) username: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendMessage<'a> {
    pub(crate) chat_id: i64,
    pub(crate) text: &'a str,
}
