//! Streaming chat client: sends a message to a chat server, decodes the
//! event-stream reply incrementally, renders deltas as they arrive and
//! persists the assistant message once the exchange ends.
//!
//! Every exchange is a session with a single terminal transition
//! (`Completed`, `Cancelled` or `Failed`) that can be cancelled at any point.
//!
//! # Streaming a reply
//!
//! ```no_run
//! use chat_stream::prelude::*;
//!
//! struct Stdout;
//!
//! impl RenderSink for Stdout {
//!     fn append_text(&mut self, text: &str) {
//!         print!("{text}");
//!     }
//!     fn show_error(&mut self, message: &str) {
//!         eprintln!("{message}");
//!     }
//!     fn show_cancelled(&mut self) {
//!         eprintln!("Response generation was stopped.");
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), StreamError> {
//! let config = ClientConfig::from_env()?;
//! let mut ctx = ChatContext::new(config.user_id.clone());
//! let client = ChatClient::from_config(config)?;
//!
//! let handle = client.start(&mut ctx, "Plan a light dinner", Stdout).await?;
//! let outcome = handle.wait().await?;
//! println!("\n[{:?}] saved={}", outcome.state, outcome.persisted);
//! # Ok(())
//! # }
//! ```

/// Chat metadata, profile and prompt endpoints plus the persistence seam.
pub mod api;
/// Cancellation token shared by a session and its controller.
pub mod cancel;
/// Session entry point and builder.
pub mod client;
/// Client configuration and environment loading.
pub mod config;
/// Per-conversation chat identity.
pub mod context;
/// Incremental event-stream frame decoding.
pub mod decoder;
/// Public error types.
pub mod errors;
/// Frame payload interpretation.
pub mod event;
/// Process-wide logging setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// User profile model.
pub mod profile;
/// Session state machine and render seam.
pub mod session;
/// Streaming request transport.
pub mod transport;

pub use api::{ChatMessage, ChatStore, ChatSummary, HttpChatApi, Role};
pub use cancel::{CancelHandle, CancelToken};
pub use client::{ChatClient, ChatClientBuilder};
pub use config::ClientConfig;
pub use context::ChatContext;
pub use decoder::{FrameDecoder, FrameStream, frame_stream};
pub use errors::{ApiError, DecodeError, StreamError};
pub use event::{ChatEvent, parse_frame};
pub use observability::{LogSettings, init_observability, init_with};
pub use profile::UserProfile;
pub use session::{
    RECEIVE_ERROR_PROMPT, RETRY_PROMPT, RenderSink, SessionHandle, SessionOutcome, SessionState,
};
pub use transport::{ByteStream, ChatRequest, ChatTransport, HttpTransport};
