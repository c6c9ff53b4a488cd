use std::time::Duration;

use crate::errors::StreamError;

/// Chat server used when `CHAT_STREAM_BASE_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration shared by the streaming transport and the chat API client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the chat server (no trailing `/api`).
    pub base_url: String,
    /// Identity sent with every request.
    pub user_id: String,
    /// HTTP timeout for a whole request, including a streamed body.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Creates a config for `base_url` with a freshly generated user id.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_id: generate_user_id(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Builds a config from `CHAT_STREAM_BASE_URL`, `CHAT_STREAM_USER_ID` and
    /// `CHAT_STREAM_TIMEOUT_SECS`, falling back to defaults for unset keys.
    pub fn from_env() -> Result<Self, StreamError> {
        let base_url = non_blank_env("CHAT_STREAM_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut config = Self::new(base_url);
        if let Some(user_id) = non_blank_env("CHAT_STREAM_USER_ID") {
            config.user_id = user_id;
        }
        if let Some(raw) = non_blank_env("CHAT_STREAM_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                StreamError::Config(format!("CHAT_STREAM_TIMEOUT_SECS is not a number: {raw}"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the server base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the user id.
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Overrides the HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), StreamError> {
        if self.base_url.trim().is_empty() {
            return Err(StreamError::Config("base_url must not be empty".into()));
        }
        if self.user_id.trim().is_empty() {
            return Err(StreamError::Config("user_id must not be empty".into()));
        }
        if self.timeout.is_zero() {
            return Err(StreamError::Config("timeout must be greater than 0".into()));
        }
        Ok(())
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn chat_stream_url(&self) -> String {
        self.api_url("chat")
    }

    pub(crate) fn chats_url(&self) -> String {
        self.api_url("chats")
    }

    pub(crate) fn chat_url(&self, chat_id: &str) -> String {
        self.api_url(&format!("chats/{chat_id}"))
    }

    pub(crate) fn profile_url(&self) -> String {
        self.api_url("profile")
    }

    pub(crate) fn prompts_url(&self) -> String {
        self.api_url("prompts")
    }
}

/// Generates a local identity of the form `user_xxxxxxxxx`.
pub fn generate_user_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("user_{}", &id[..9])
}

fn non_blank_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_ignore_trailing_slash() {
        let config = ClientConfig::new("http://chat.local:5000/");
        assert_eq!(config.chat_stream_url(), "http://chat.local:5000/api/chat");
        assert_eq!(config.chat_url("c1"), "http://chat.local:5000/api/chats/c1");
        assert_eq!(config.profile_url(), "http://chat.local:5000/api/profile");
    }

    #[test]
    fn generated_user_ids_are_prefixed_and_short() {
        let id = generate_user_id();
        assert!(id.starts_with("user_"));
        assert_eq!(id.len(), 14);
        assert_ne!(id, generate_user_id());
    }

    #[test]
    fn validate_rejects_blank_fields() {
        let config = ClientConfig::new(" ");
        assert!(matches!(config.validate(), Err(StreamError::Config(_))));
        let config = ClientConfig::new(DEFAULT_BASE_URL).user_id("");
        assert!(matches!(config.validate(), Err(StreamError::Config(_))));
        let config = ClientConfig::new(DEFAULT_BASE_URL).timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(StreamError::Config(_))));
    }
}
