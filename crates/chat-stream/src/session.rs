use std::sync::Arc;

use futures::StreamExt as _;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::api::{ChatStore, Role};
use crate::cancel::{CancelHandle, CancelToken};
use crate::decoder::FrameStream;
use crate::errors::StreamError;
use crate::event::{ChatEvent, parse_frame};

/// Shown when the request could not be issued.
pub const RETRY_PROMPT: &str = "Failed to get response. Please try again.";
/// Shown when the body broke off mid-stream.
pub const RECEIVE_ERROR_PROMPT: &str = "Error receiving response. Please try again.";

/// Lifecycle of one streaming exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SessionState {
    Idle,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl SessionState {
    /// Whether the session has reached its single terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// UI-facing consumer of session events.
///
/// Called only from the session's own task, in arrival order.
pub trait RenderSink: Send + 'static {
    /// Appends a chunk of assistant text.
    fn append_text(&mut self, text: &str);
    /// Shows a failure message in place of the response.
    fn show_error(&mut self, message: &str);
    /// Shows the informational notice that generation was stopped.
    fn show_cancelled(&mut self);
}

/// Final result of a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOutcome {
    pub session_id: uuid::Uuid,
    pub chat_id: String,
    /// One of the terminal states.
    pub state: SessionState,
    /// Text accumulated before the terminal transition.
    pub text: String,
    /// Whether the assistant message was stored.
    pub persisted: bool,
    /// Set for `SessionState::Failed`.
    pub error: Option<StreamError>,
}

/// Handle returned by `ChatClient::start` for one running session.
pub struct SessionHandle {
    session_id: uuid::Uuid,
    chat_id: String,
    cancel: CancelHandle,
    state_rx: watch::Receiver<SessionState>,
    outcome_rx: oneshot::Receiver<SessionOutcome>,
}

impl SessionHandle {
    pub fn session_id(&self) -> uuid::Uuid {
        self.session_id
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Returns a handle that can stop this session from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Requests cancellation. Idempotent, and a no-op once the session is
    /// terminal. Returns whether this call fired the cancel signal.
    pub fn cancel(&self) -> bool {
        if self.state().is_terminal() {
            return false;
        }
        self.cancel.cancel()
    }

    /// Waits for the terminal transition.
    ///
    /// Cancellation is reported through `SessionOutcome::state`, not as an
    /// error; `Err` means the session task died without an outcome.
    pub async fn wait(self) -> Result<SessionOutcome, StreamError> {
        self.outcome_rx.await.map_err(|_| {
            StreamError::protocol(format!(
                "session {} ended without an outcome",
                self.session_id
            ))
        })
    }
}

enum Termination {
    Completed,
    Cancelled,
    Failed(StreamError),
}

/// Read loop of one session. Owned by its spawned task.
pub(crate) struct StreamSession<S> {
    session_id: uuid::Uuid,
    user_id: String,
    chat_id: String,
    accumulated_text: String,
    seq: u64,
    sink: S,
    token: CancelToken,
    store: Arc<dyn ChatStore>,
    state_tx: watch::Sender<SessionState>,
}

impl<S: RenderSink> StreamSession<S> {
    /// Binds a session that has already issued its request.
    pub(crate) fn new(
        session_id: uuid::Uuid,
        user_id: String,
        chat_id: String,
        sink: S,
        token: CancelToken,
        store: Arc<dyn ChatStore>,
        state_tx: watch::Sender<SessionState>,
    ) -> Self {
        state_tx.send_replace(SessionState::Streaming);
        Self {
            session_id,
            user_id,
            chat_id,
            accumulated_text: String::new(),
            seq: 0,
            sink,
            token,
            store,
            state_tx,
        }
    }

    /// Spawns the read loop and returns the caller's handle.
    pub(crate) fn spawn(self, frames: FrameStream) -> SessionHandle {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let handle = SessionHandle {
            session_id: self.session_id,
            chat_id: self.chat_id.clone(),
            cancel: self.token.handle(),
            state_rx: self.state_tx.subscribe(),
            outcome_rx,
        };
        tokio::spawn(async move {
            let outcome = self.run(frames).await;
            let _ = outcome_tx.send(outcome);
        });
        handle
    }

    pub(crate) async fn run(mut self, frames: FrameStream) -> SessionOutcome {
        let termination = self.drive(frames).await;
        self.finish(termination).await
    }

    async fn drive(&mut self, mut frames: FrameStream) -> Termination {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Termination::Cancelled,
                next = frames.next() => next,
            };
            let frame = match next {
                Some(Ok(frame)) => frame,
                Some(Err(err)) => return Termination::Failed(err),
                None => {
                    debug!(session_id = %self.session_id, "stream ended without done marker");
                    return Termination::Completed;
                }
            };
            for event in parse_frame(&frame) {
                if self.token.is_cancelled() {
                    return Termination::Cancelled;
                }
                match event {
                    ChatEvent::ContentDelta { text } => self.apply_delta(&text),
                    ChatEvent::Done => return Termination::Completed,
                    ChatEvent::ServerError { message } => {
                        return Termination::Failed(StreamError::server(message));
                    }
                }
            }
            // Keep other tasks (rendering) responsive during a burst of frames.
            tokio::task::yield_now().await;
        }
    }

    fn apply_delta(&mut self, text: &str) {
        debug!(session_id = %self.session_id, chat_id = %self.chat_id, seq = self.seq, "content delta");
        self.accumulated_text.push_str(text);
        self.sink.append_text(text);
        self.seq = self.seq.saturating_add(1);
    }

    /// Performs the single terminal transition. Consumes the session.
    async fn finish(mut self, termination: Termination) -> SessionOutcome {
        let (state, error) = match termination {
            Termination::Completed => (SessionState::Completed, None),
            Termination::Cancelled => {
                self.sink.show_cancelled();
                (SessionState::Cancelled, None)
            }
            Termination::Failed(err) => {
                match &err {
                    StreamError::Server { message } => self.sink.show_error(message),
                    _ => self.sink.show_error(RECEIVE_ERROR_PROMPT),
                }
                (SessionState::Failed, Some(err))
            }
        };

        // Published before persisting so a late cancel sees the session as finished.
        self.state_tx.send_replace(state);
        let persisted = match state {
            SessionState::Completed | SessionState::Cancelled => self.persist().await,
            _ => false,
        };
        match &error {
            Some(err) => {
                warn!(session_id = %self.session_id, chat_id = %self.chat_id, error = %err, "session failed");
            }
            None => {
                info!(
                    session_id = %self.session_id,
                    chat_id = %self.chat_id,
                    state = ?state,
                    chars = self.accumulated_text.chars().count(),
                    persisted,
                    "session finished"
                );
            }
        }

        SessionOutcome {
            session_id: self.session_id,
            chat_id: self.chat_id,
            state,
            text: self.accumulated_text,
            persisted,
            error,
        }
    }

    async fn persist(&mut self) -> bool {
        match self
            .store
            .save_message(&self.user_id, &self.chat_id, Role::Assistant, &self.accumulated_text)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!(session_id = %self.session_id, chat_id = %self.chat_id, error = %err, "failed to save assistant message");
                false
            }
        }
    }
}
