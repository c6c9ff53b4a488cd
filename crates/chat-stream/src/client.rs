use std::sync::Arc;

use futures::stream;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::api::{ChatStore, HttpChatApi};
use crate::cancel::CancelToken;
use crate::config::ClientConfig;
use crate::context::ChatContext;
use crate::decoder::frame_stream;
use crate::errors::StreamError;
use crate::session::{RETRY_PROMPT, RenderSink, SessionHandle, SessionState, StreamSession};
use crate::transport::{ChatRequest, ChatTransport, HttpTransport};

/// Entry point for starting streaming sessions.
#[derive(Clone)]
pub struct ChatClient {
    transport: Arc<dyn ChatTransport>,
    store: Arc<dyn ChatStore>,
}

impl ChatClient {
    /// Starts a builder for wiring a transport and a message store.
    pub fn builder() -> ChatClientBuilder {
        ChatClientBuilder::default()
    }

    /// Builds a client talking HTTP to the configured chat server.
    pub fn from_config(config: ClientConfig) -> Result<Self, StreamError> {
        Self::builder()
            .transport(Arc::new(HttpTransport::new(config.clone())?))
            .store(Arc::new(HttpChatApi::new(config)?))
            .build()
    }

    /// Store used for chat creation and message persistence.
    pub fn store(&self) -> Arc<dyn ChatStore> {
        self.store.clone()
    }

    /// Sends `message` and streams the reply into `sink`.
    ///
    /// See `start_with_token` for the failure modes.
    pub async fn start<S: RenderSink>(
        &self,
        ctx: &mut ChatContext,
        message: &str,
        sink: S,
    ) -> Result<SessionHandle, StreamError> {
        self.start_with_token(ctx, message, sink, CancelToken::new())
            .await
    }

    /// Like `start`, but bound to a caller-created token so the session can be
    /// cancelled while the request is still being issued.
    ///
    /// The chat id is resolved first (created on first use). Fails with
    /// `Validation` for a blank message, `Network` when the request cannot be
    /// issued, and `Protocol` when the response has no event-stream body; the
    /// latter two are also shown on the sink as a retry prompt. Nothing is
    /// persisted in those cases.
    pub async fn start_with_token<S: RenderSink>(
        &self,
        ctx: &mut ChatContext,
        message: &str,
        mut sink: S,
        mut token: CancelToken,
    ) -> Result<SessionHandle, StreamError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(StreamError::Validation("message must not be empty".into()));
        }

        let chat_id = ctx.ensure_chat_id(self.store.as_ref(), message).await;
        let session_id = uuid::Uuid::new_v4();
        let (state_tx, _state_rx) = watch::channel(SessionState::Idle);
        let request = ChatRequest {
            user_id: ctx.user_id().to_string(),
            chat_id: chat_id.clone(),
            message: message.to_string(),
        };
        debug!(session_id = %session_id, chat_id = %chat_id, "issuing chat request");

        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            opened = self.transport.open(&request) => Some(opened),
        };
        let frames = match opened {
            Some(Ok(bytes)) => frame_stream(bytes),
            Some(Err(err)) => {
                sink.show_error(RETRY_PROMPT);
                state_tx.send_replace(SessionState::Failed);
                info!(session_id = %session_id, chat_id = %chat_id, error = %err, "chat request failed");
                return Err(err);
            }
            // Cancelled before the response arrived; the session ends at once.
            None => frame_stream(Box::pin(stream::empty())),
        };

        let session = StreamSession::new(
            session_id,
            request.user_id,
            chat_id,
            sink,
            token,
            self.store.clone(),
            state_tx,
        );
        Ok(session.spawn(frames))
    }
}

/// Builder used to wire collaborators before creating a `ChatClient`.
#[derive(Default)]
pub struct ChatClientBuilder {
    transport: Option<Arc<dyn ChatTransport>>,
    store: Option<Arc<dyn ChatStore>>,
}

impl ChatClientBuilder {
    /// Sets the streaming transport.
    pub fn transport(mut self, transport: Arc<dyn ChatTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the message store.
    pub fn store(mut self, store: Arc<dyn ChatStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Builds the client; both collaborators are required.
    pub fn build(self) -> Result<ChatClient, StreamError> {
        let transport = self
            .transport
            .ok_or_else(|| StreamError::Config("a chat transport is required".into()))?;
        let store = self
            .store
            .ok_or_else(|| StreamError::Config("a chat store is required".into()))?;
        Ok(ChatClient { transport, store })
    }
}
