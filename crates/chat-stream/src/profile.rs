use serde::{Deserialize, Deserializer};

use crate::errors::ApiError;

/// Tones the server knows how to turn into response instructions.
pub const AI_TONES: &[&str] = &[
    "professional",
    "friendly",
    "casual",
    "humorous",
    "motivational",
    "empathetic",
    "concise",
    "detailed",
];

/// User profile used by the server to personalise responses.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub age: String,
    #[serde(default, deserialize_with = "list_or_csv")]
    pub goals: Vec<String>,
    #[serde(default)]
    pub dietary_preferences: String,
    #[serde(default)]
    pub fitness_level: String,
    #[serde(default, deserialize_with = "list_or_csv")]
    pub interests: Vec<String>,
    #[serde(default = "default_tone")]
    pub ai_tone: String,
    #[serde(default, skip_serializing)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<String>,
    /// Fields this model does not know, sent back unchanged on save.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_tone() -> String {
    "professional".to_string()
}

impl UserProfile {
    /// Checks that every profile field is filled in.
    pub fn validate(&self) -> Result<(), ApiError> {
        let text_fields = [
            ("name", &self.name),
            ("age", &self.age),
            ("dietary_preferences", &self.dietary_preferences),
            ("fitness_level", &self.fitness_level),
            ("ai_tone", &self.ai_tone),
        ];
        for (field, value) in text_fields {
            if value.trim().is_empty() {
                return Err(ApiError::Validation(format!("profile field `{field}` is required")));
            }
        }
        if self.goals.is_empty() {
            return Err(ApiError::Validation("profile needs at least one goal".into()));
        }
        if self.interests.is_empty() {
            return Err(ApiError::Validation("profile needs at least one interest".into()));
        }
        if !AI_TONES.contains(&self.ai_tone.as_str()) {
            return Err(ApiError::Validation(format!("unknown ai_tone: {}", self.ai_tone)));
        }
        Ok(())
    }
}

/// Splits comma-separated form input into trimmed, non-empty entries.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s.trim().to_string()),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|item| !item.is_empty())
            .collect()),
        serde_json::Value::String(raw) => Ok(split_list(&raw)),
        _ => Ok(Vec::new()),
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        _ => Ok(String::new()),
    }
}
