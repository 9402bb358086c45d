use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::{Display, EnumString};
use validator::Validate;

/// Kind of attachment a message carries
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AttachmentType {
    Image,
    File,
    Link,
}

/// A single post within a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique identifier
    #[validate(length(min = 1))]
    pub id: String,

    /// Owning conversation; not enforced by the index
    #[validate(length(min = 1))]
    pub conversation_id: String,

    /// Author identity
    pub username: String,
    pub handle: String,

    /// Body text
    pub text: String,

    #[serde(with = "crate::models::time::serde_millis")]
    pub date: DateTime<Utc>,

    /// Handles referenced by the message
    #[serde(default)]
    pub mentions: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_type: Option<AttachmentType>,

    #[serde(default)]
    pub pinned: bool,
}

/// A message as returned by search, with the engine's highlight fragment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageHit {
    #[serde(flatten)]
    pub message: Message,

    /// Matched span of `text` wrapped in highlight markers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlighted: Option<String>,
}
