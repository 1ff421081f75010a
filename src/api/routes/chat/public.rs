//! Public types for the chat API
pub use crate::gemini::Role;
pub use crate::relay::{ChatRequest, ErrorBody, HistoryTurn, TextPart};
pub use crate::stream::StreamEvent;
