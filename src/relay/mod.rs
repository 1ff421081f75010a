//! Server side of a chat turn: validates it, streams it through the
//! upstream provider and frames the output as `StreamEvent`s.

mod error;
pub mod rate_limit;
mod request;
mod service;

pub use error::{ErrorBody, RelayError};
pub use request::{ChatRequest, HistoryTurn, TextPart};
pub use service::{EventStream, Relay, unsupported_family};
