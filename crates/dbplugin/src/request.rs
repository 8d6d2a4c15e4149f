//! Request and response envelopes exchanged with the host
//!
//! The host owns these structures; adapters read only the fields they need
//! and persist none of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::SecretString;

/// Raw configuration map as supplied by the host
pub type ConfigMap = Map<String, Value>;

/// Initialize request: configuration plus the verify flag
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitializeRequest {
    /// Raw configuration map
    #[serde(default)]
    pub config: ConfigMap,

    /// Establish and probe the administrative connection before returning
    #[serde(default)]
    pub verify_connection: bool,
}

/// Initialize response: the configuration the host should store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InitializeResponse {
    /// Echoed (possibly normalized) configuration
    pub config: ConfigMap,
}

/// Metadata the username template is rendered with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernameMetadata {
    /// Display name of the requesting entity
    #[serde(default)]
    pub display_name: String,

    /// Role the credential is issued for
    #[serde(default)]
    pub role_name: String,
}

impl UsernameMetadata {
    /// Build metadata from a display name and role name
    pub fn new(display_name: impl Into<String>, role_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            role_name: role_name.into(),
        }
    }
}

/// Ordered adapter-specific statements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statements {
    /// Statements in the order the host supplied them
    #[serde(default)]
    pub commands: Vec<String>,
}

impl Statements {
    /// Wrap a list of statements
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
        }
    }

    /// True when no statement was supplied
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// The first statement, if any
    pub fn first(&self) -> Option<&str> {
        self.commands.first().map(String::as_str)
    }
}

/// Request to create a new account
#[derive(Debug, Clone, Deserialize)]
pub struct NewUserRequest {
    /// Metadata for username rendering
    #[serde(default)]
    pub username_config: UsernameMetadata,

    /// Creation statements
    #[serde(default)]
    pub statements: Statements,

    /// Statements to run if creation fails (unused by adapters without rollback)
    #[serde(default)]
    pub rollback_statements: Statements,

    /// Password for the new account
    pub password: SecretString,

    /// When the host will revoke the account
    pub expiration: DateTime<Utc>,
}

/// Response carrying the rendered username
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewUserResponse {
    /// Name of the created account
    pub username: String,
}

/// A password change requested through UpdateUser
#[derive(Debug, Clone, Deserialize)]
pub struct ChangePassword {
    /// The new password
    pub new_password: SecretString,

    /// Statements to apply alongside the change
    #[serde(default)]
    pub statements: Statements,
}

/// An expiration change requested through UpdateUser
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeExpiration {
    /// The new expiration time
    pub new_expiration: DateTime<Utc>,

    /// Statements to apply alongside the change
    #[serde(default)]
    pub statements: Statements,
}

/// Request to rotate or otherwise update an account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    /// Account to update
    pub username: String,

    /// Password rotation, if requested
    #[serde(default)]
    pub password: Option<ChangePassword>,

    /// Expiration change, if requested
    #[serde(default)]
    pub expiration: Option<ChangeExpiration>,
}

/// Empty response for UpdateUser
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateUserResponse {}

/// Request to remove an account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteUserRequest {
    /// Account to remove
    pub username: String,

    /// Revocation statements
    #[serde(default)]
    pub statements: Statements,
}

/// Empty response for DeleteUser
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteUserResponse {}
