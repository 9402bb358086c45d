use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// One identity taking part in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct Participant {
    #[validate(length(min = 1))]
    pub username: String,

    #[validate(length(min = 1))]
    pub handle: String,
}

impl Participant {
    pub fn new(username: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            handle: handle.into(),
        }
    }
}

/// A thread, denormalized with a snapshot of its latest message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_owner_participates"))]
pub struct Conversation {
    /// Unique identifier
    #[validate(length(min = 1))]
    pub id: String,

    /// Nominal owner of the thread
    pub username: String,
    pub handle: String,

    /// Text of the latest message
    pub last_message: String,

    /// Time of the latest activity
    #[serde(with = "crate::models::time::serde_millis")]
    pub date: DateTime<Utc>,

    /// Owner first by convention, then everyone else
    #[validate(length(min = 2), nested)]
    pub participants: Vec<Participant>,
}

impl Conversation {
    /// Whether the thread owner is listed among the participants
    pub fn owner_participates(&self) -> bool {
        self.participants.iter().any(|p| p.handle == self.handle)
    }
}

fn validate_owner_participates(conversation: &Conversation) -> Result<(), ValidationError> {
    if conversation.owner_participates() {
        Ok(())
    } else {
        let mut err = ValidationError::new("owner_not_participant");
        err.message = Some(
            format!(
                "conversation {} does not list its owner '{}' as a participant",
                conversation.id, conversation.handle
            )
            .into(),
        );
        Err(err)
    }
}
