//! Declarative grant model
//!
//! A creation statement is a single JSON document:
//!
//! ```json
//! {"database_grants":   [{"db": "db1", "access": "ro"}],
//!  "collection_grants": [{"db": "db1", "collection": "orders", "access": "rw"}]}
//! ```
//!
//! Both arrays keep their input order, which is the order grants are applied.

use std::fmt;

use dbplugin::{Error, Result};
use serde::{Deserialize, Serialize};

/// Access level bound to a database or collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessLevel {
    /// No access
    #[serde(rename = "none")]
    None,
    /// Read-only
    #[serde(rename = "ro")]
    ReadOnly,
    /// Read-write
    #[serde(rename = "rw")]
    ReadWrite,
    /// Administrative
    #[serde(rename = "admin")]
    Admin,
}

impl AccessLevel {
    /// Wire representation
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ReadOnly => "ro",
            Self::ReadWrite => "rw",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access on a whole database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseGrant {
    /// Database name
    pub db: String,
    /// Level to grant
    pub access: AccessLevel,
}

/// Access on a collection, or the default collection access of a database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionGrant {
    /// Database name
    pub db: String,
    /// Collection name; absent or empty means the database default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// Level to grant
    pub access: AccessLevel,
}

/// What a [`CollectionGrant`] applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionTarget<'a> {
    /// Default collection access for the database
    DatabaseDefault,
    /// A named collection
    Named(&'a str),
}

impl CollectionGrant {
    /// Resolve the target, treating an empty name as the database default
    pub fn target(&self) -> CollectionTarget<'_> {
        match self.collection.as_deref() {
            None | Some("") => CollectionTarget::DatabaseDefault,
            Some(name) => CollectionTarget::Named(name),
        }
    }
}

/// Parsed creation statement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSpec {
    /// Database grants in application order
    #[serde(default)]
    pub database_grants: Vec<DatabaseGrant>,
    /// Collection grants in application order, applied after database grants
    #[serde(default)]
    pub collection_grants: Vec<CollectionGrant>,
}

impl GrantSpec {
    /// Parse a creation statement.
    ///
    /// An empty or whitespace-only statement is a valid request for zero
    /// grants. Malformed JSON, unknown fields on a grant entry, and access
    /// levels outside `none|ro|rw|admin` are rejected with [`Error::Parse`].
    pub fn parse(statement: &str) -> Result<Self> {
        if statement.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(statement).map_err(|e| Error::parse(e.to_string()))
    }

    /// Parse an optional statement; `None` yields an empty spec
    pub fn parse_optional(statement: Option<&str>) -> Result<Self> {
        statement.map_or_else(|| Ok(Self::default()), Self::parse)
    }

    /// Total number of grants
    pub fn len(&self) -> usize {
        self.database_grants.len() + self.collection_grants.len()
    }

    /// True when no grant would be applied
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
