//! Channel, media type, owner kind, and canonical status enums.
//!
//! These are the shared vocabulary of the generation subsystem. The
//! database stores the `name()` form of each enum as TEXT.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// External AI provider a generation task is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Kling,
    Volcengine,
    Dashscope,
    Sora2,
}

impl Channel {
    /// Every supported channel, in registration order.
    pub const ALL: [Channel; 4] = [
        Channel::Kling,
        Channel::Volcengine,
        Channel::Dashscope,
        Channel::Sora2,
    ];

    /// Parse from the database / URL `name` form.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "kling" => Ok(Self::Kling),
            "volcengine" => Ok(Self::Volcengine),
            "dashscope" => Ok(Self::Dashscope),
            "sora2" => Ok(Self::Sora2),
            other => Err(CoreError::Validation(format!("Unknown channel '{other}'"))),
        }
    }

    /// Database name value.
    pub fn name(self) -> &'static str {
        match self {
            Self::Kling => "kling",
            Self::Volcengine => "volcengine",
            Self::Dashscope => "dashscope",
            Self::Sora2 => "sora2",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Media type
// ---------------------------------------------------------------------------

/// Kind of media a task produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Image,
    Chat,
}

impl MediaType {
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "video" => Ok(Self::Video),
            "image" => Ok(Self::Image),
            "chat" => Ok(Self::Chat),
            other => Err(CoreError::Validation(format!("Unknown media type '{other}'"))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
            Self::Chat => "chat",
        }
    }
}

// ---------------------------------------------------------------------------
// Owner kind
// ---------------------------------------------------------------------------

/// Who submitted a task. Only end users are billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    /// End user with a points balance.
    User,
    /// Internal / admin caller; never billed.
    Admin,
}

impl OwnerKind {
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(CoreError::Validation(format!("Unknown owner kind '{other}'"))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    /// Whether submissions by this owner touch the points balance.
    pub fn is_billable(self) -> bool {
        matches!(self, Self::User)
    }
}

/// The owner of a generation task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub kind: OwnerKind,
}

impl Owner {
    pub fn new(id: impl Into<String>, kind: OwnerKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical status
// ---------------------------------------------------------------------------

/// Provider-independent task status every native vocabulary maps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanonicalStatus {
    Submitted,
    InProgress,
    Success,
    Failure,
}

impl CanonicalStatus {
    /// `Success` and `Failure` end a task; the others are ignored by reconciliation.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }

    /// Synthesized progress percentage shown to callers.
    pub fn progress(self) -> &'static str {
        match self {
            Self::Submitted => "0%",
            Self::InProgress => "50%",
            Self::Success => "100%",
            Self::Failure => "0%",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
