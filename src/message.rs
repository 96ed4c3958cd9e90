use std::fmt;

use serde::{Deserialize, Serialize};

/// Sender of a conversation message. Closed set: anything outside these three
/// roles has no meaning to the prompt assembler or the wire format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in a conversation session's history.
///
/// Messages are immutable once appended; the pipeline only ever appends the
/// user's query and, on a successful exchange, the fully assembled assistant
/// answer (never individual fragments).
///
/// # Examples
/// ```
/// use docket_rag::message::{Message, Role};
///
/// let question = Message::user("When is the filing deadline?");
/// assert_eq!(question.role, Role::User);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: &str) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: &str) -> Self {
        Self::new(Role::System, content)
    }
}
