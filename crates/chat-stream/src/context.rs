use tracing::warn;

use crate::api::{ChatStore, chat_title_hint, local_chat_id};

/// Per-conversation state passed to `ChatClient::start`.
///
/// Holds the user identity and the chat the next message belongs to. The chat
/// id is resolved lazily by `ensure_chat_id` before the first request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatContext {
    user_id: String,
    chat_id: Option<String>,
    title: Option<String>,
}

impl ChatContext {
    /// Starts a context with no chat yet.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            chat_id: None,
            title: None,
        }
    }

    /// Continues an existing chat.
    pub fn with_chat(user_id: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            chat_id: Some(chat_id.into()),
            title: None,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    /// Title sent when the chat was created here, if any.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Records a rename done elsewhere.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Forgets the current chat so the next message opens a new one.
    pub fn reset(&mut self) {
        self.chat_id = None;
        self.title = None;
    }

    /// Returns the chat id, creating the chat on first use.
    ///
    /// Calling this again returns the same id without contacting the store.
    /// When creation fails a locally generated id is used instead.
    pub async fn ensure_chat_id(&mut self, store: &dyn ChatStore, first_message: &str) -> String {
        if let Some(chat_id) = &self.chat_id {
            return chat_id.clone();
        }
        let title = chat_title_hint(first_message);
        let chat_id = match store.create_chat(&self.user_id, &title).await {
            Ok(chat_id) => chat_id,
            Err(err) => {
                let fallback = local_chat_id();
                warn!(error = %err, chat_id = %fallback, "chat creation failed, using local id");
                fallback
            }
        };
        self.chat_id = Some(chat_id.clone());
        self.title = Some(title);
        chat_id
    }
}
