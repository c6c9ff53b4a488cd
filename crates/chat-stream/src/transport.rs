use std::pin::Pin;

use futures::StreamExt as _;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::StreamError;

const EVENT_STREAM_MIME: &str = "text/event-stream";

/// Raw response body chunks of one streaming request.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, StreamError>> + Send + 'static>>;

/// Body of a chat completion request.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub chat_id: String,
    pub message: String,
}

/// Issues a streaming chat request and hands back its raw body.
///
/// Implementations fail with `StreamError::Network` when the request cannot
/// be issued and `StreamError::Protocol` when the response has no readable
/// event-stream body.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, StreamError>;
}

/// `ChatTransport` posting to `{base_url}/api/chat` with reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// Creates a transport from explicit client configuration.
    pub fn new(config: ClientConfig) -> Result<Self, StreamError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StreamError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait::async_trait]
impl ChatTransport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, StreamError> {
        debug!(chat_id = %request.chat_id, user_id = %request.user_id, "opening chat stream");
        let response = self
            .client
            .post(self.config.chat_stream_url())
            .header(ACCEPT, EVENT_STREAM_MIME)
            .header(CACHE_CONTROL, "no-cache")
            .json(request)
            .send()
            .await
            .map_err(|e| StreamError::network(format!("chat request failed: {e}"), None))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StreamError::network(
                format!("chat request failed with status {status}: {body}"),
                Some(status.as_u16()),
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        if let Some(content_type) = content_type
            && !content_type.starts_with(EVENT_STREAM_MIME)
        {
            return Err(StreamError::protocol(format!(
                "expected an event-stream body, got {content_type}"
            )));
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| StreamError::network(format!("stream read failed: {e}"), None)));
        Ok(Box::pin(bytes))
    }
}
