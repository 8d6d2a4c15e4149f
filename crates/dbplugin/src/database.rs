//! The lifecycle contract a host drives

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::{
    DeleteUserRequest, DeleteUserResponse, InitializeRequest, InitializeResponse, NewUserRequest,
    NewUserResponse, Result, UpdateUserRequest, UpdateUserResponse,
};

/// A database credential adapter.
///
/// The host calls [`Database::initialize`] once (or again to replace the
/// configuration) and then any number of create/update/delete calls. The
/// host owns lease timing; adapters only create and revoke accounts.
#[async_trait]
pub trait Database: Send + Sync {
    /// Apply configuration and optionally verify connectivity
    async fn initialize(&self, req: InitializeRequest) -> Result<InitializeResponse>;

    /// Create an account and apply its grants
    async fn new_user(&self, req: NewUserRequest) -> Result<NewUserResponse>;

    /// Rotate an account's password
    async fn update_user(&self, req: UpdateUserRequest) -> Result<UpdateUserResponse>;

    /// Remove an account
    async fn delete_user(&self, req: DeleteUserRequest) -> Result<DeleteUserResponse>;

    /// Fixed adapter identity string
    fn type_name(&self) -> &'static str;

    /// Drop any cached connection; never fails for well-behaved adapters
    async fn close(&self) -> Result<()>;
}

/// Source of the literal secret values that must never leave the adapter
#[async_trait]
pub trait SecretValues: Send + Sync {
    /// Secret values currently held by the adapter
    async fn secret_values(&self) -> BTreeSet<String>;
}
