// Response envelope shared by every storefront endpoint

use serde::Deserialize;

/// `{ success, data, message }` wrapper around every response body
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<MessageField>,
}

/// Error and message fields are either a single string or a list of strings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MessageField {
    One(String),
    Many(Vec<String>),
}

impl MessageField {
    /// Render for display: trimmed, first letter capitalised, one entry per line
    pub fn display(&self) -> String {
        match self {
            MessageField::One(msg) => clean_message(msg),
            MessageField::Many(msgs) => msgs
                .iter()
                .map(|m| clean_message(m))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Error body returned with non-2xx statuses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "statusCode")]
    pub status_code: Option<u16>,
    pub error: Option<MessageField>,
    pub message: Option<MessageField>,
    pub timestamp: Option<String>,
    pub path: Option<String>,
}

impl ApiErrorBody {
    /// `error` takes precedence over `message`
    pub fn display_message(&self) -> Option<String> {
        self.error
            .as_ref()
            .or(self.message.as_ref())
            .map(MessageField::display)
            .filter(|m| !m.is_empty())
    }
}

fn clean_message(msg: &str) -> String {
    let trimmed = msg.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
