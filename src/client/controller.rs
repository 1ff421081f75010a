use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::notice;
use super::transcript::{ChatTurn, RequestId, Transcript};
use super::transport::{ChatTransport, RelayResponse};
use crate::relay::ChatRequest;
use crate::stream::{FrameDecoder, StreamEvent};

pub type Snapshot = Arc<Vec<ChatTurn>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeState {
    Pending,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

// Sent by an exchange task. Every task sends exactly one of the
// terminal variants last.
#[derive(Debug)]
enum Progress {
    Streaming,
    Delta(String),
    Completed,
    Failed(String),
    Aborted,
}

type Update = (RequestId, Progress);

/// Owns the transcript and every exchange started from it.
///
/// Exchanges run as spawned tasks that only report progress back over a
/// channel. Nothing changes in the transcript until the owner drives the
/// controller with [`Controller::step`] or [`Controller::settle`], so
/// there is a single writer. Readers can follow along through
/// [`Controller::subscribe`].
///
/// `submit` spawns onto the current tokio runtime.
pub struct Controller {
    transport: Arc<dyn ChatTransport>,
    transcript: Transcript,
    model: Option<String>,
    next_id: u64,
    active: Option<(RequestId, CancellationToken)>,
    // Cancelled exchanges whose notice is added when their task stops
    awaiting_notice: HashSet<RequestId>,
    states: HashMap<RequestId, ExchangeState>,
    in_flight: HashSet<RequestId>,
    updates_tx: mpsc::UnboundedSender<Update>,
    updates_rx: mpsc::UnboundedReceiver<Update>,
    snapshot_tx: watch::Sender<Snapshot>,
}

impl Controller {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            transport,
            transcript: Transcript::default(),
            model: None,
            next_id: 0,
            active: None,
            awaiting_notice: HashSet::new(),
            states: HashMap::new(),
            in_flight: HashSet::new(),
            updates_tx,
            updates_rx,
            snapshot_tx,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Starts an exchange for `text`. Blank input is ignored.
    pub fn submit(&mut self, text: &str) -> Option<RequestId> {
        if text.trim().is_empty() {
            return None;
        }

        if let Some((previous, token)) = self.active.take() {
            tracing::debug!("Exchange {} superseded", previous);
            token.cancel();
            self.awaiting_notice.insert(previous);
        }

        self.next_id += 1;
        let id = RequestId::new(self.next_id);

        // Prior turns only, taken before the new ones are appended
        let request = ChatRequest {
            message: Some(text.to_string()),
            history: self.transcript.history(),
            model: self.model.clone(),
        };
        self.transcript.push_exchange(id, text);

        let token = CancellationToken::new();
        self.active = Some((id, token.clone()));
        self.states.insert(id, ExchangeState::Pending);
        self.in_flight.insert(id);

        tokio::spawn(drive_exchange(
            Arc::clone(&self.transport),
            request,
            id,
            token,
            self.updates_tx.clone(),
        ));

        self.publish();
        Some(id)
    }

    /// Cancels the active exchange. Output already received stays in the
    /// transcript and the notice is added once the task has stopped.
    pub fn cancel(&mut self) {
        let Some((id, token)) = self.active.take() else {
            return;
        };
        tracing::debug!("Cancelling exchange {}", id);
        token.cancel();
        self.awaiting_notice.insert(id);
    }

    /// Cancels the active exchange and discards the transcript.
    pub fn reset(&mut self) {
        if let Some((_, token)) = self.active.take() {
            token.cancel();
        }
        self.awaiting_notice.clear();
        // Exchanges still running get their final state when they stop
        let in_flight = &self.in_flight;
        self.states.retain(|id, _| in_flight.contains(id));
        self.transcript.clear();
        self.publish();
    }

    /// Applies the next update from a running exchange. Returns the
    /// exchange it belonged to, or `None` when nothing is in flight.
    ///
    /// Cancel safe: an update is never lost if the future is dropped.
    pub async fn step(&mut self) -> Option<RequestId> {
        if self.in_flight.is_empty() {
            return None;
        }
        let (id, progress) = self.updates_rx.recv().await?;
        self.apply(id, progress);
        Some(id)
    }

    /// Drives updates until every exchange task has finished.
    pub async fn settle(&mut self) {
        while self.step().await.is_some() {}
    }

    pub fn turns(&self) -> &[ChatTurn] {
        self.transcript.turns()
    }

    /// Response turn of an exchange, while it is still in the transcript.
    pub fn reply(&self, id: RequestId) -> Option<&ChatTurn> {
        self.transcript.slot(id)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn state(&self, id: RequestId) -> Option<ExchangeState> {
        self.states.get(&id).copied()
    }

    pub fn active(&self) -> Option<RequestId> {
        self.active.as_ref().map(|(id, _)| *id)
    }

    pub fn is_in_flight(&self, id: RequestId) -> bool {
        self.in_flight.contains(&id)
    }

    fn apply(&mut self, id: RequestId, progress: Progress) {
        let is_active = self.active() == Some(id);

        match progress {
            Progress::Streaming => {
                if is_active {
                    self.states.insert(id, ExchangeState::Streaming);
                }
                return;
            }
            Progress::Delta(text) => {
                if !is_active {
                    tracing::trace!("Dropping delta for lapsed exchange {}", id);
                    return;
                }
                self.transcript.append(id, &text);
            }
            terminal if is_active => {
                self.in_flight.remove(&id);
                self.active = None;
                let state = match terminal {
                    Progress::Completed => ExchangeState::Completed,
                    Progress::Failed(content) => {
                        self.transcript.replace(id, content);
                        ExchangeState::Failed
                    }
                    _ => ExchangeState::Cancelled,
                };
                self.states.insert(id, state);
            }
            // Whatever a lapsed exchange ended with, it was cancelled
            _ => {
                self.in_flight.remove(&id);
                if self.awaiting_notice.remove(&id) {
                    let partial = self
                        .transcript
                        .slot(id)
                        .map(|turn| turn.content.clone())
                        .unwrap_or_default();
                    self.transcript.replace(id, notice::cancelled(&partial));
                }
                self.states.insert(id, ExchangeState::Cancelled);
            }
        }

        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx
            .send_replace(Arc::new(self.transcript.turns().to_vec()));
    }
}

async fn drive_exchange(
    transport: Arc<dyn ChatTransport>,
    request: ChatRequest,
    id: RequestId,
    token: CancellationToken,
    updates: mpsc::UnboundedSender<Update>,
) {
    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => Progress::Aborted,
        outcome = run_exchange(transport.as_ref(), request, id, &updates) => outcome,
    };
    // The controller is gone when this fails
    let _ = updates.send((id, outcome));
}

async fn run_exchange(
    transport: &dyn ChatTransport,
    request: ChatRequest,
    id: RequestId,
    updates: &mpsc::UnboundedSender<Update>,
) -> Progress {
    let mut body = match transport.send(request).await {
        Ok(RelayResponse::Stream(body)) => body,
        Ok(RelayResponse::Rejected { status, body }) => {
            tracing::warn!("Exchange {} rejected with {}: {}", id, status, body.error);
            let code = body.code.or(Some(status));
            return Progress::Failed(notice::failure(&body.error, code, body.retry_after));
        }
        Err(e) => {
            tracing::warn!("Exchange {} could not reach the relay: {}", id, e);
            return Progress::Failed(notice::CONNECTIVITY_FAILURE.to_string());
        }
    };
    let _ = updates.send((id, Progress::Streaming));

    let mut decoder = FrameDecoder::default();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Exchange {} failed reading the body: {}", id, e);
                return Progress::Failed(notice::CONNECTIVITY_FAILURE.to_string());
            }
        };

        for payload in decoder.push(&chunk) {
            match StreamEvent::from_payload(&payload) {
                Ok(StreamEvent::Delta { text }) => {
                    let _ = updates.send((id, Progress::Delta(text)));
                }
                Ok(StreamEvent::Done) => return Progress::Completed,
                Ok(StreamEvent::Error {
                    message,
                    code,
                    retry_after,
                }) => return Progress::Failed(notice::failure(&message, code, retry_after)),
                Err(e) => tracing::warn!("Skipping malformed frame {}: {}", payload, e),
            }
        }
    }

    tracing::warn!("Exchange {} ended without a terminal event", id);
    Progress::Failed(notice::CONNECTIVITY_FAILURE.to_string())
}
