//! # arangodb-dbplugin
//!
//! Issues short-lived ArangoDB accounts for a secrets-management host.
//!
//! The host drives the [`dbplugin::Database`] lifecycle; this crate supplies
//! the adapter behind it:
//!
//! - [`grant`] - the declarative grant statement (`database_grants`,
//!   `collection_grants`)
//! - [`config`] - decoding of the host's raw configuration map
//! - [`client`] - the administrative client boundary and its HTTP
//!   implementation
//! - [`connection`] - the lazily established, cached admin connection
//! - [`username`] - username templates
//! - [`lifecycle`] - [`ArangoDb`], which ties the above together
//!
//! ## Quick start
//!
//! ```no_run
//! use arangodb_dbplugin::dbplugin::{Database, InitializeRequest};
//! use serde_json::json;
//!
//! # async fn example() -> arangodb_dbplugin::dbplugin::Result<()> {
//! let db = arangodb_dbplugin::new();
//! let config = json!({
//!     "connection_url": "http://localhost:8529",
//!     "username": "root",
//!     "password": "secret",
//! });
//! db.initialize(InitializeRequest {
//!     config: config.as_object().cloned().unwrap_or_default(),
//!     verify_connection: true,
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod connection;
pub mod grant;
pub mod lifecycle;
pub mod username;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use dbplugin;

pub use connection::ConnectionProducer;
pub use grant::{AccessLevel, CollectionGrant, DatabaseGrant, GrantSpec};
pub use lifecycle::{ArangoDb, ArangoDbBuilder, NoConnector, StatementPolicy, TYPE_NAME};
pub use username::{
    DEFAULT_MAX_USERNAME_LENGTH, DEFAULT_USERNAME_TEMPLATE, Entropy, SystemEntropy,
    UsernameProducer,
};

/// The adapter a host serves: HTTP client, default settings, and outbound
/// errors scrubbed of the admin password.
#[cfg(feature = "http")]
pub fn new() -> dbplugin::ErrorSanitizer<ArangoDb> {
    dbplugin::ErrorSanitizer::new(ArangoDb::http())
}
