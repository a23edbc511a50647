//! Opaque identifier newtypes shared across the coordinator.
//!
//! Each identifier is a thin wrapper around `String` rather than a bare `String` parameter, so a
//! channel id can never be mistaken for an account id at a call site.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(ChannelId, "A chat channel, shared by every agent that participates in it.");
opaque_id!(AccountId, "An agent's own account identifier.");
opaque_id!(BotUserId, "The chat-platform identity used for mention matching and self-exclusion.");
opaque_id!(MessageId, "Identifies the message that opened a round's collection window.");

/// The author of a `ConversationMessage`: either the human who triggered the conversation, or
/// one of the registered agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Author {
    Human,
    Agent(AccountId),
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Author::Human => f.write_str("human"),
            Author::Agent(id) => f.write_str(id.as_str()),
        }
    }
}
