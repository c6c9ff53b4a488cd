use std::collections::HashMap;

use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::errors::{ApiError, StreamError};
use crate::profile::UserProfile;

const TITLE_MAX_CHARS: usize = 30;
const UNTITLED_CHAT: &str = "Untitled Chat";

/// Author of a stored chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One stored message of a chat.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// A chat as listed for the sidebar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub message_count: usize,
}

#[derive(Debug, serde::Deserialize)]
struct ChatRecord {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

#[derive(Debug, serde::Deserialize)]
struct CreatedChat {
    #[serde(default)]
    chat_id: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    error: String,
}

/// Persistence collaborator used by stream sessions.
#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    /// Creates a chat and returns its identifier.
    async fn create_chat(&self, user_id: &str, title: &str) -> Result<String, ApiError>;

    /// Stores one message of a chat.
    async fn save_message(
        &self,
        user_id: &str,
        chat_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), ApiError>;
}

/// Title sent with a new chat: the message itself, or its first 27
/// characters followed by `...` when longer than 30.
pub fn chat_title_hint(message: &str) -> String {
    let message = message.trim();
    if message.is_empty() {
        return "New Chat".to_string();
    }
    if message.chars().count() <= TITLE_MAX_CHARS {
        return message.to_string();
    }
    let head: String = message.chars().take(TITLE_MAX_CHARS - 3).collect();
    format!("{head}...")
}

/// Identifier used when the server cannot create a chat.
pub fn local_chat_id() -> String {
    format!("new-chat-{}", uuid::Uuid::new_v4())
}

/// Turns `meal_planner` into `Meal Planner`.
pub fn format_category_name(category: &str) -> String {
    category
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Client for the chat metadata, profile and prompt endpoints.
#[derive(Clone)]
pub struct HttpChatApi {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpChatApi {
    /// Creates an API client from explicit configuration.
    pub fn new(config: ClientConfig) -> Result<Self, StreamError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StreamError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Lists a user's chats, most recently updated first.
    pub async fn list_chats(&self, user_id: &str) -> Result<Vec<ChatSummary>, ApiError> {
        let records = self.chat_records(user_id).await?;
        let mut chats: Vec<ChatSummary> = records
            .into_iter()
            .map(|(id, record)| ChatSummary {
                id,
                title: record
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| UNTITLED_CHAT.to_string()),
                created_at: record.created_at,
                updated_at: record.updated_at,
                message_count: record.messages.len(),
            })
            .collect();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(chats)
    }

    /// Returns the stored messages of one chat, or `None` if it does not exist.
    pub async fn chat_messages(
        &self,
        user_id: &str,
        chat_id: &str,
    ) -> Result<Option<Vec<ChatMessage>>, ApiError> {
        let mut records = self.chat_records(user_id).await?;
        Ok(records.remove(chat_id).map(|record| record.messages))
    }

    /// Renames a chat. The title is trimmed and must not be blank.
    pub async fn rename_chat(
        &self,
        user_id: &str,
        chat_id: &str,
        title: &str,
    ) -> Result<String, ApiError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ApiError::Validation("title must not be empty".into()));
        }
        let response = self
            .client
            .put(format!("{}/title", self.config.chat_url(chat_id)))
            .json(&serde_json::json!({ "user_id": user_id, "title": title }))
            .send()
            .await?;
        check_status(response).await?;
        info!(chat_id, title, "chat renamed");
        Ok(title.to_string())
    }

    /// Deletes one chat.
    pub async fn delete_chat(&self, user_id: &str, chat_id: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.config.chat_url(chat_id))
            .query(&[("user_id", user_id)])
            .send()
            .await?;
        check_status(response).await?;
        info!(chat_id, "chat deleted");
        Ok(())
    }

    /// Deletes every chat of a user.
    pub async fn delete_all_chats(&self, user_id: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.config.chats_url())
            .query(&[("user_id", user_id)])
            .send()
            .await?;
        check_status(response).await?;
        info!(user_id, "all chats deleted");
        Ok(())
    }

    /// Fetches the user's profile; an empty object means no profile.
    pub async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, ApiError> {
        let response = self
            .client
            .get(self.config.profile_url())
            .query(&[("user_id", user_id)])
            .send()
            .await?;
        let value: serde_json::Value = check_status(response).await?.json().await?;
        match value {
            serde_json::Value::Object(map) if map.is_empty() => Ok(None),
            serde_json::Value::Object(_) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| ApiError::Decode(format!("invalid profile: {e}"))),
            serde_json::Value::Null => Ok(None),
            _ => Err(ApiError::Decode("profile is not a JSON object".into())),
        }
    }

    /// Validates and stores the profile, creating it on first save.
    pub async fn save_profile(
        &self,
        user_id: &str,
        profile: &UserProfile,
    ) -> Result<UserProfile, ApiError> {
        profile.validate()?;
        let exists = self.get_profile(user_id).await?.is_some();
        let request = if exists {
            self.client.put(self.config.profile_url())
        } else {
            self.client.post(self.config.profile_url())
        };
        let response = request
            .query(&[("user_id", user_id)])
            .json(profile)
            .send()
            .await?;
        let saved = check_status(response).await?.json().await?;
        info!(user_id, created = !exists, "profile saved");
        Ok(saved)
    }

    /// Lists prompt suggestion categories.
    pub async fn prompt_categories(&self) -> Result<Vec<String>, ApiError> {
        let response = self
            .client
            .get(format!("{}/categories", self.config.prompts_url()))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Lists prompt suggestions of one category.
    pub async fn prompts(&self, category: &str) -> Result<Vec<String>, ApiError> {
        let response = self
            .client
            .get(self.config.prompts_url())
            .query(&[("category", category)])
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn chat_records(&self, user_id: &str) -> Result<HashMap<String, ChatRecord>, ApiError> {
        let response = self
            .client
            .get(self.config.chats_url())
            .query(&[("user_id", user_id)])
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }
}

#[async_trait::async_trait]
impl ChatStore for HttpChatApi {
    async fn create_chat(&self, user_id: &str, title: &str) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.config.chats_url())
            .json(&serde_json::json!({ "user_id": user_id, "title": title }))
            .send()
            .await?;
        let created: CreatedChat = check_status(response).await?.json().await?;
        let chat_id = created
            .chat_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ApiError::Decode("create chat response has no chat_id".into()))?;
        debug!(chat_id = %chat_id, "chat created");
        Ok(chat_id)
    }

    async fn save_message(
        &self,
        user_id: &str,
        chat_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), ApiError> {
        let response = self
            .client
            .post(format!("{}/messages", self.config.chat_url(chat_id)))
            .json(&serde_json::json!({
                "user_id": user_id,
                "role": role,
                "content": content,
            }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body
            }
        });
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}
