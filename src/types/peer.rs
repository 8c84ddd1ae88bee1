use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque user identifier as issued by the message store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The other participant of the open conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub full_name: String,
    /// Profile picture reference
    #[serde(
        default,
        rename = "profilePic",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar: Option<String>,
}

impl Peer {
    pub fn new(id: impl Into<UserId>, full_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            avatar: None,
        }
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    /// Avatar reference, treating an empty string as absent.
    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref().filter(|a| !a.is_empty())
    }

    /// Name for the conversation header, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.full_name.is_empty() {
            self.id.as_str()
        } else {
            &self.full_name
        }
    }
}

/// The signed-in user viewing the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalUser {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub full_name: String,
    #[serde(
        default,
        rename = "profilePic",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar: Option<String>,
}

impl LocalUser {
    pub fn new(id: impl Into<UserId>, full_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            avatar: None,
        }
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    /// Avatar reference, treating an empty string as absent.
    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref().filter(|a| !a.is_empty())
    }
}
