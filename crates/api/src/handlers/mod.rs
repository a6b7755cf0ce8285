//! HTTP handlers and their request DTOs.

pub mod callbacks;
pub mod dashscope;
pub mod kling;
pub mod sora2;
pub mod video;
pub mod volcengine;

use mediagen_core::channels::{Owner, OwnerKind};
use serde::{Deserialize, Deserializer};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Identity fields every generation body carries.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Caller {
    #[validate(length(min = 1, max = 128, message = "user_id must be 1-128 characters"))]
    pub user_id: String,
    #[serde(default = "default_user_type")]
    pub user_type: OwnerKind,
}

fn default_user_type() -> OwnerKind {
    OwnerKind::User
}

impl Caller {
    pub fn owner(&self) -> AppResult<Owner> {
        self.validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        Ok(Owner::new(self.user_id.trim(), self.user_type))
    }
}

/// Body of every task query route.
#[derive(Debug, Deserialize)]
pub struct TaskQueryRequest {
    #[serde(flatten)]
    pub caller: Caller,
    pub task_id: String,
}

/// Durations arrive as `5` or `"5"` depending on the provider's own schema.
pub(crate) fn deserialize_duration<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid duration '{s}'"))),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct WithDuration {
        #[serde(default, deserialize_with = "deserialize_duration")]
        duration: Option<u32>,
    }

    #[test]
    fn duration_accepts_number_or_string() {
        let number: WithDuration = serde_json::from_value(json!({ "duration": 10 })).unwrap();
        let text: WithDuration = serde_json::from_value(json!({ "duration": "5" })).unwrap();
        let missing: WithDuration = serde_json::from_value(json!({})).unwrap();
        assert_eq!(number.duration, Some(10));
        assert_eq!(text.duration, Some(5));
        assert_eq!(missing.duration, None);
        assert!(serde_json::from_value::<WithDuration>(json!({ "duration": "five" })).is_err());
    }

    #[test]
    fn caller_defaults_to_user() {
        let caller: Caller = serde_json::from_value(json!({ "user_id": "u1" })).unwrap();
        assert_eq!(caller.owner().unwrap(), Owner::new("u1", OwnerKind::User));
    }

    #[test]
    fn empty_user_id_is_rejected() {
        let caller: Caller =
            serde_json::from_value(json!({ "user_id": "", "user_type": "admin" })).unwrap();
        assert_matches!(caller.owner(), Err(AppError::BadRequest(_)));
    }
}
