use serde::{Deserialize, Serialize};
use std::fmt;

// item attribute names shared by both tables
pub const ID: &str = "Id";
pub const PASSWORD: &str = "Password";
pub const SESSION_ID: &str = "SessionId";
pub const USER_ID: &str = "UserId";
pub const CONTENT: &str = "Content";

/// Opaque proof of login, held as the `SessionId` attribute of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-assigned todo identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(String);

impl TodoId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TodoId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    pub userid: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub userid: String,
    pub sessionid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub sessionid: SessionToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoRequest {
    #[serde(flatten)]
    pub session: SessionRequest,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoCreated {
    pub todoid: TodoId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub todoid: TodoId,
    pub content: String,
}
