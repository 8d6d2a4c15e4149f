//! Boundary with the database wire client
//!
//! The lifecycle code only talks to [`ArangoClient`]; how requests reach the
//! server is the implementation's business. Lookups return small reference
//! values proving the object existed at lookup time.

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::{HttpClient, HttpConnector};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dbplugin::{Result, SecretString};

use crate::config::ConnectionConfig;
use crate::grant::AccessLevel;

/// Result of the server identity probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerVersion {
    /// Server product name, normally "arango"
    pub server: String,
    /// Server version string
    pub version: String,
    /// License flavour when reported
    pub license: Option<String>,
}

/// An existing database account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    /// Account name
    pub name: String,
    /// Whether the account can log in
    pub active: bool,
}

/// An existing database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseRef {
    /// Database name
    pub name: String,
}

/// An existing collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRef {
    /// Owning database
    pub database: String,
    /// Collection name
    pub name: String,
}

/// Where collection-level access is set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTarget<'a> {
    /// Default access for every collection of a database
    DatabaseDefault(&'a DatabaseRef),
    /// One collection
    Collection(&'a CollectionRef),
}

impl AccessTarget<'_> {
    /// Database the target lives in
    pub fn database(&self) -> &str {
        match self {
            Self::DatabaseDefault(db) => &db.name,
            Self::Collection(collection) => &collection.database,
        }
    }

    /// Collection name, `None` for the database default
    pub fn collection(&self) -> Option<&str> {
        match self {
            Self::DatabaseDefault(_) => None,
            Self::Collection(collection) => Some(&collection.name),
        }
    }
}

/// Administrative client handle.
///
/// Every method is one round trip to the server. Implementations apply no
/// timeout and no retry; callers cancel by dropping the future.
#[async_trait]
pub trait ArangoClient: Send + Sync + fmt::Debug {
    /// Lightweight server identity probe
    async fn version(&self) -> Result<ServerVersion>;

    /// Create an active account with the given password
    async fn create_user(&self, name: &str, password: &SecretString) -> Result<UserRef>;

    /// Look up an account; `NotFound` if absent
    async fn user(&self, name: &str) -> Result<UserRef>;

    /// Remove an account; `NotFound` if it is already gone
    async fn remove_user(&self, user: &UserRef) -> Result<()>;

    /// Replace an account's password
    async fn replace_password(&self, user: &UserRef, password: &SecretString) -> Result<()>;

    /// Look up a database; `NotFound` if absent
    async fn database(&self, name: &str) -> Result<DatabaseRef>;

    /// Look up a collection in a database; `NotFound` if absent
    async fn collection(&self, database: &DatabaseRef, name: &str) -> Result<CollectionRef>;

    /// Set database-level access for an account
    async fn set_database_access(
        &self,
        user: &UserRef,
        database: &DatabaseRef,
        access: AccessLevel,
    ) -> Result<()>;

    /// Set collection-level access for an account
    async fn set_collection_access(
        &self,
        user: &UserRef,
        target: AccessTarget<'_>,
        access: AccessLevel,
    ) -> Result<()>;
}

/// Establishes administrative client handles
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    /// Build a client for the given configuration
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn ArangoClient>>;
}
