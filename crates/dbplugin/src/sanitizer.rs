//! Middleware that scrubs secret values from outbound errors

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    Database, DeleteUserRequest, DeleteUserResponse, Error, InitializeRequest, InitializeResponse,
    NewUserRequest, NewUserResponse, Result, SecretValues, UpdateUserRequest, UpdateUserResponse,
};

/// Wraps a [`Database`] and redacts its secrets from every returned error.
///
/// Secrets are read after the wrapped call returns, so a failed Initialize
/// is scrubbed with the values that call just stored.
#[derive(Debug)]
pub struct ErrorSanitizer<D> {
    inner: D,
}

impl<D> ErrorSanitizer<D>
where
    D: Database + SecretValues,
{
    /// Wrap an adapter
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    /// The wrapped adapter
    pub fn inner(&self) -> &D {
        &self.inner
    }

    async fn sanitize<T>(&self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                let secrets = self.inner.secret_values().await;
                debug!(secret_count = secrets.len(), "Sanitizing lifecycle error");
                Err(redact_with(err, &secrets))
            }
        }
    }
}

#[async_trait]
impl<D> Database for ErrorSanitizer<D>
where
    D: Database + SecretValues,
{
    async fn initialize(&self, req: InitializeRequest) -> Result<InitializeResponse> {
        let result = self.inner.initialize(req).await;
        self.sanitize(result).await
    }

    async fn new_user(&self, req: NewUserRequest) -> Result<NewUserResponse> {
        let result = self.inner.new_user(req).await;
        self.sanitize(result).await
    }

    async fn update_user(&self, req: UpdateUserRequest) -> Result<UpdateUserResponse> {
        let result = self.inner.update_user(req).await;
        self.sanitize(result).await
    }

    async fn delete_user(&self, req: DeleteUserRequest) -> Result<DeleteUserResponse> {
        let result = self.inner.delete_user(req).await;
        self.sanitize(result).await
    }

    fn type_name(&self) -> &'static str {
        self.inner.type_name()
    }

    async fn close(&self) -> Result<()> {
        let result = self.inner.close().await;
        self.sanitize(result).await
    }
}

#[async_trait]
impl<D> SecretValues for ErrorSanitizer<D>
where
    D: Database + SecretValues,
{
    async fn secret_values(&self) -> BTreeSet<String> {
        self.inner.secret_values().await
    }
}

impl<D> From<D> for ErrorSanitizer<D>
where
    D: Database + SecretValues,
{
    fn from(inner: D) -> Self {
        Self::new(inner)
    }
}

fn redact_with(err: Error, secrets: &BTreeSet<String>) -> Error {
    let secrets: Vec<&str> = secrets.iter().map(String::as_str).collect();
    err.redact(&secrets)
}
