//! Common imports for typical client usage.
pub use crate::{
    CancelHandle, CancelToken, ChatClient, ChatContext, ChatEvent, ClientConfig, HttpChatApi,
    RenderSink, SessionHandle, SessionOutcome, SessionState, StreamError,
};
