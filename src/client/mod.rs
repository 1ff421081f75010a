//! Client side of the chat: owns the transcript and the lifecycle of
//! every request made against the relay.

mod controller;
pub mod notice;
mod transcript;
mod transport;

pub use controller::{Controller, ExchangeState, Snapshot};
pub use transcript::{ChatTurn, RequestId, Transcript};
pub use transport::{ByteStream, ChatTransport, HttpTransport, RelayResponse, TransportError};
