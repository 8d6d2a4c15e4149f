//! Error taxonomy shared by the host contract and database adapters
use std::fmt;

use thiserror::Error;

/// Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, Error>;

/// Placeholder written over secret values by [`Error::redact`].
pub const REDACTED: &str = "[REDACTED]";

/// The kind of upstream object a [`Error::NotFound`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A database account
    User,
    /// A database
    Database,
    /// A collection inside a database
    Collection,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Database => "database",
            Self::Collection => "collection",
        })
    }
}

/// Errors surfaced by lifecycle operations.
///
/// Every variant carries plain text only, so [`Error::redact`] can rewrite
/// the whole error before it leaves the adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Configuration is malformed or a required field is missing
    #[error("invalid configuration: {message}")]
    Config {
        /// What is wrong with the configuration
        message: String,
    },

    /// An operation ran before a successful Initialize
    #[error("connection producer is not initialized")]
    NotInitialized,

    /// Username template failed to compile or render
    #[error("invalid username template: {message}")]
    Template {
        /// The template engine's message
        message: String,
    },

    /// Grant statement is not valid JSON or names an unknown access level
    #[error("invalid grant statement: {message}")]
    Parse {
        /// The decoder's message
        message: String,
    },

    /// Administrative connection could not be established or verified
    #[error("{context}: {message}")]
    Connection {
        /// Which step failed (e.g. "failed to verify connection")
        context: String,
        /// The underlying cause
        message: String,
    },

    /// A referenced user, database, or collection does not exist
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// What was looked up
        kind: ObjectKind,
        /// The name that was looked up
        name: String,
    },

    /// The requested lifecycle path is not supported
    #[error("not implemented: {operation}")]
    NotImplemented {
        /// The unsupported operation
        operation: String,
    },

    /// No creation statement supplied under a strict statement policy
    #[error("empty creation statements")]
    EmptyStatement,

    /// Any other failure reported by the database
    #[error("{operation} failed: {message}")]
    Upstream {
        /// The operation that failed
        operation: String,
        /// HTTP status (or equivalent) when the client reports one
        status: Option<u16>,
        /// The database's message
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create a grant parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a connection error, keeping the cause's text
    pub fn connection(context: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::Connection {
            context: context.into(),
            message: cause.to_string(),
        }
    }

    /// Create a not-found error
    pub fn not_found(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Create a not-implemented error
    pub fn not_implemented(operation: impl Into<String>) -> Self {
        Self::NotImplemented {
            operation: operation.into(),
        }
    }

    /// Create an upstream error
    pub fn upstream(
        operation: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Upstream {
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }

    /// True for [`Error::NotFound`] of any kind
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True for [`Error::NotInitialized`]
    #[must_use]
    pub fn is_not_initialized(&self) -> bool {
        matches!(self, Self::NotInitialized)
    }

    /// Replace every occurrence of each secret with [`REDACTED`].
    ///
    /// Empty secrets are skipped. The variant is preserved, so callers can
    /// still match on the kind of failure after redaction.
    #[must_use]
    pub fn redact<S: AsRef<str>>(self, secrets: &[S]) -> Self {
        let scrub = |mut text: String| {
            for secret in secrets.iter().map(AsRef::as_ref) {
                if !secret.is_empty() && text.contains(secret) {
                    text = text.replace(secret, REDACTED);
                }
            }
            text
        };

        match self {
            Self::Config { message } => Self::Config {
                message: scrub(message),
            },
            Self::NotInitialized => Self::NotInitialized,
            Self::Template { message } => Self::Template {
                message: scrub(message),
            },
            Self::Parse { message } => Self::Parse {
                message: scrub(message),
            },
            Self::Connection { context, message } => Self::Connection {
                context: scrub(context),
                message: scrub(message),
            },
            Self::NotFound { kind, name } => Self::NotFound {
                kind,
                name: scrub(name),
            },
            Self::NotImplemented { operation } => Self::NotImplemented {
                operation: scrub(operation),
            },
            Self::EmptyStatement => Self::EmptyStatement,
            Self::Upstream {
                operation,
                status,
                message,
            } => Self::Upstream {
                operation: scrub(operation),
                status,
                message: scrub(message),
            },
        }
    }
}
