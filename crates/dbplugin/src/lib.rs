//! Database plugin contract
//!
//! The boundary between a secrets-management host and the adapters that
//! issue short-lived database accounts for it.
//!
//! # Lifecycle
//!
//! ```text
//! host ──► initialize ──► new_user ──► update_user ──► delete_user
//!               │              │             │              │
//!               └──────────────┴─────────────┴──────────────┘
//!                         ErrorSanitizer (scrubs secrets)
//!                                    │
//!                               adapter (Database)
//! ```
//!
//! - [`Database`] is the trait every adapter implements.
//! - [`ErrorSanitizer`] wraps an adapter and rewrites outbound errors with
//!   the values reported by [`SecretValues`].
//! - [`Error`] is the shared error taxonomy.
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod database;
mod error;
mod request;
mod sanitizer;
mod secret;

pub use database::{Database, SecretValues};
pub use error::{Error, ObjectKind, REDACTED, Result};
pub use request::{
    ChangeExpiration, ChangePassword, ConfigMap, DeleteUserRequest, DeleteUserResponse,
    InitializeRequest, InitializeResponse, NewUserRequest, NewUserResponse, Statements,
    UpdateUserRequest, UpdateUserResponse, UsernameMetadata,
};
pub use sanitizer::ErrorSanitizer;
pub use secret::SecretString;

// Re-export so adapters and hosts agree on the timestamp type
pub use chrono::{DateTime, Utc};
