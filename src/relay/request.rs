use serde::{Deserialize, Serialize};

use crate::gemini::Role;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TextPart {
    #[serde(default)]
    pub text: String,
}

/// A prior turn as the client sends it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HistoryTurn {
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<TextPart>,
}

impl HistoryTurn {
    pub fn new(role: Role, text: &str) -> Self {
        Self {
            role,
            parts: vec![TextPart {
                text: text.to_string(),
            }],
        }
    }

    pub fn text(&self) -> String {
        self.parts.iter().map(|p| p.text.as_str()).collect()
    }
}

/// Body of `POST /api/chat`. Every field is optional on the wire so a
/// missing message is reported by the relay instead of the extractor.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatRequest {
    pub fn new(message: &str) -> Self {
        Self {
            message: Some(message.to_string()),
            ..Default::default()
        }
    }
}
