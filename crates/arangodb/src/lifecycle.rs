//! Credential lifecycle manager
//!
//! [`ArangoDb`] composes the connection producer, the username producer and
//! the grant model into the four lifecycle operations a host drives. One
//! `tokio::sync::Mutex` covers the whole body of every operation, so calls
//! against one instance never interleave, even for unrelated accounts.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use dbplugin::{
    Database, DeleteUserRequest, DeleteUserResponse, Error, InitializeRequest, InitializeResponse,
    NewUserRequest, NewUserResponse, Result, SecretValues, UpdateUserRequest, UpdateUserResponse,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::{AccessTarget, ArangoClient, Connector, UserRef};
use crate::config;
use crate::connection::ConnectionProducer;
use crate::grant::{CollectionTarget, GrantSpec};
use crate::username::{DEFAULT_MAX_USERNAME_LENGTH, Entropy, SystemEntropy, UsernameProducer};

/// Adapter identity reported to the host
pub const TYPE_NAME: &str = "arangodb";

/// How NewUser treats a request without creation statements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatementPolicy {
    /// Create the account with no grants
    #[default]
    Permissive,
    /// Reject the request with [`Error::EmptyStatement`]
    Strict,
}

#[derive(Debug)]
struct State {
    producer: ConnectionProducer,
    usernames: Option<UsernameProducer>,
}

/// ArangoDB credential adapter
#[derive(Debug)]
pub struct ArangoDb {
    state: Mutex<State>,
    entropy: Arc<dyn Entropy>,
    max_username_length: usize,
    statement_policy: StatementPolicy,
}

impl ArangoDb {
    /// Adapter with default settings using `connector` for the admin client
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self::builder().connector(connector).build()
    }

    /// Adapter speaking the ArangoDB HTTP API
    #[cfg(feature = "http")]
    pub fn http() -> Self {
        Self::new(Arc::new(crate::client::HttpConnector::new()))
    }

    /// Builder for a customised adapter
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use arangodb_dbplugin::{ArangoDb, StatementPolicy, client::HttpConnector};
    ///
    /// let db = ArangoDb::builder()
    ///     .connector(Arc::new(HttpConnector::new()))
    ///     .max_username_length(64)
    ///     .statement_policy(StatementPolicy::Strict)
    ///     .build();
    /// ```
    pub fn builder() -> ArangoDbBuilder<NoConnector> {
        ArangoDbBuilder::new()
    }

    /// Administrative client, established on first use
    pub async fn connection(&self) -> Result<Arc<dyn ArangoClient>> {
        self.state.lock().await.producer.connection().await
    }

    /// How requests without creation statements are treated
    pub fn statement_policy(&self) -> StatementPolicy {
        self.statement_policy
    }
}

#[async_trait]
impl Database for ArangoDb {
    async fn initialize(&self, req: InitializeRequest) -> Result<InitializeResponse> {
        let mut state = self.state.lock().await;

        let entropy = Arc::clone(&self.entropy);
        let usernames = match config::username_template(&req.config)? {
            Some(template) => UsernameProducer::new(&template, self.max_username_length, entropy),
            None => UsernameProducer::default_template(self.max_username_length, entropy),
        }?;

        let response = state.producer.configure(&req.config)?;
        state.usernames = Some(usernames);

        if req.verify_connection {
            state.producer.verify().await?;
        }

        info!(verify_connection = req.verify_connection, "Initialized adapter");
        Ok(response)
    }

    async fn new_user(&self, req: NewUserRequest) -> Result<NewUserResponse> {
        let mut state = self.state.lock().await;

        if self.statement_policy == StatementPolicy::Strict && req.statements.is_empty() {
            return Err(Error::EmptyStatement);
        }

        let username = state
            .usernames
            .as_ref()
            .ok_or(Error::NotInitialized)?
            .render(&req.username_config)?;

        // Statements past the first are ignored
        let spec = GrantSpec::parse_optional(req.statements.first())?;

        let client = state.producer.connection().await?;
        let user = client.create_user(&username, &req.password).await?;
        info!(
            username = %user.name,
            grants = spec.len(),
            expiration = %req.expiration,
            "Created user"
        );

        let mut grants = GrantApplication::new(client.as_ref(), &user);
        let outcome = grants.apply(&spec).await;
        if let Err(err) = outcome {
            warn!(
                username = %user.name,
                applied = grants.applied,
                total = spec.len(),
                error = %err,
                "Grant failed, user left with partial grants"
            );
            return Err(err);
        }

        Ok(NewUserResponse { username })
    }

    async fn update_user(&self, req: UpdateUserRequest) -> Result<UpdateUserResponse> {
        let mut state = self.state.lock().await;

        let Some(change) = req.password else {
            debug!(username = %req.username, "No password change requested");
            return Ok(UpdateUserResponse {});
        };
        if !change.statements.is_empty() {
            return Err(Error::not_implemented(
                "changing grants through password rotation",
            ));
        }

        let client = state.producer.connection().await?;
        let user = client.user(&req.username).await?;
        client.replace_password(&user, &change.new_password).await?;

        info!(username = %user.name, "Rotated password");
        Ok(UpdateUserResponse {})
    }

    async fn delete_user(&self, req: DeleteUserRequest) -> Result<DeleteUserResponse> {
        let mut state = self.state.lock().await;

        let client = state.producer.connection().await?;
        let user = client.user(&req.username).await?;
        client.remove_user(&user).await?;

        info!(username = %user.name, "Removed user");
        Ok(DeleteUserResponse {})
    }

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().await.producer.close();
        Ok(())
    }
}

#[async_trait]
impl SecretValues for ArangoDb {
    async fn secret_values(&self) -> BTreeSet<String> {
        self.state.lock().await.producer.redacted_secrets()
    }
}

/// Applies a [`GrantSpec`] to one freshly created account
struct GrantApplication<'a> {
    client: &'a dyn ArangoClient,
    user: &'a UserRef,
    applied: usize,
}

impl<'a> GrantApplication<'a> {
    fn new(client: &'a dyn ArangoClient, user: &'a UserRef) -> Self {
        Self {
            client,
            user,
            applied: 0,
        }
    }

    /// Database grants first, then collection grants, each in input order.
    /// Stops at the first failure; nothing already applied is undone.
    async fn apply(&mut self, spec: &GrantSpec) -> Result<()> {
        for grant in &spec.database_grants {
            let db = self.client.database(&grant.db).await?;
            self.client
                .set_database_access(self.user, &db, grant.access)
                .await?;
            self.applied += 1;
            debug!(
                username = %self.user.name,
                db = %grant.db,
                access = %grant.access,
                grant_index = self.applied,
                "Applied database grant"
            );
        }

        for grant in &spec.collection_grants {
            let db = self.client.database(&grant.db).await?;
            match grant.target() {
                CollectionTarget::DatabaseDefault => {
                    self.client
                        .set_collection_access(
                            self.user,
                            AccessTarget::DatabaseDefault(&db),
                            grant.access,
                        )
                        .await?;
                }
                CollectionTarget::Named(name) => {
                    let collection = self.client.collection(&db, name).await?;
                    self.client
                        .set_collection_access(
                            self.user,
                            AccessTarget::Collection(&collection),
                            grant.access,
                        )
                        .await?;
                }
            }
            self.applied += 1;
            debug!(
                username = %self.user.name,
                db = %grant.db,
                collection = grant.collection.as_deref().unwrap_or("*"),
                access = %grant.access,
                grant_index = self.applied,
                "Applied collection grant"
            );
        }

        Ok(())
    }
}

/// Builder state before a connector is supplied
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConnector;

/// Builder for [`ArangoDb`]; `build` is available once a connector is set
#[derive(Debug)]
pub struct ArangoDbBuilder<C> {
    connector: C,
    entropy: Arc<dyn Entropy>,
    max_username_length: usize,
    statement_policy: StatementPolicy,
}

impl ArangoDbBuilder<NoConnector> {
    /// Builder with default settings
    pub fn new() -> Self {
        Self {
            connector: NoConnector,
            entropy: Arc::new(SystemEntropy),
            max_username_length: DEFAULT_MAX_USERNAME_LENGTH,
            statement_policy: StatementPolicy::default(),
        }
    }

    /// Set the connector (required)
    pub fn connector(self, connector: Arc<dyn Connector>) -> ArangoDbBuilder<Arc<dyn Connector>> {
        ArangoDbBuilder {
            connector,
            entropy: self.entropy,
            max_username_length: self.max_username_length,
            statement_policy: self.statement_policy,
        }
    }
}

impl Default for ArangoDbBuilder<NoConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> ArangoDbBuilder<C> {
    /// Source of random and time components for usernames
    pub fn entropy(mut self, entropy: Arc<dyn Entropy>) -> Self {
        self.entropy = entropy;
        self
    }

    /// Longest username accepted, in bytes
    pub fn max_username_length(mut self, max: usize) -> Self {
        self.max_username_length = max;
        self
    }

    /// How requests without creation statements are treated
    pub fn statement_policy(mut self, policy: StatementPolicy) -> Self {
        self.statement_policy = policy;
        self
    }

    /// Shorthand for [`StatementPolicy::Strict`] when `required`
    pub fn require_statements(self, required: bool) -> Self {
        self.statement_policy(if required {
            StatementPolicy::Strict
        } else {
            StatementPolicy::Permissive
        })
    }
}

impl ArangoDbBuilder<Arc<dyn Connector>> {
    /// Build the adapter
    pub fn build(self) -> ArangoDb {
        ArangoDb {
            state: Mutex::new(State {
                producer: ConnectionProducer::new(self.connector),
                usernames: None,
            }),
            entropy: self.entropy,
            max_username_length: self.max_username_length,
            statement_policy: self.statement_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ClientCall, FixedEntropy, MockConnector};
    use dbplugin::{Statements, UsernameMetadata, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn adapter(connector: &Arc<MockConnector>) -> ArangoDb {
        ArangoDb::builder()
            .connector(connector.clone())
            .entropy(Arc::new(FixedEntropy::default()))
            .build()
    }

    fn init_request() -> InitializeRequest {
        InitializeRequest {
            config: json!({
                "connection_url": "http://db:8529",
                "username": "root",
                "password": "root"
            })
            .as_object()
            .cloned()
            .unwrap(),
            verify_connection: false,
        }
    }

    fn new_user_request(statements: &[&str]) -> NewUserRequest {
        NewUserRequest {
            username_config: UsernameMetadata::new("token", "reader"),
            statements: Statements::new(statements.iter().copied()),
            rollback_statements: Statements::default(),
            password: "p@ss".into(),
            expiration: Utc::now(),
        }
    }

    #[test]
    fn type_name_is_fixed() {
        let db = ArangoDb::new(Arc::new(MockConnector::default()));
        assert_eq!(db.type_name(), "arangodb");
        assert_eq!(db.statement_policy(), StatementPolicy::Permissive);
    }

    #[tokio::test]
    async fn new_user_before_initialize_fails() {
        let connector = Arc::new(MockConnector::default());
        let db = adapter(&connector);

        let err = db.new_user(new_user_request(&[])).await.unwrap_err();

        assert!(err.is_not_initialized());
        assert!(connector.client().calls().is_empty());
    }

    #[tokio::test]
    async fn bad_template_fails_initialize_before_config_is_stored() {
        let connector = Arc::new(MockConnector::default());
        let db = adapter(&connector);
        let mut req = init_request();
        req.config
            .insert("username_template".into(), json!("{{ nope() }}"));

        let err = db.initialize(req).await.unwrap_err();

        assert!(matches!(err, Error::Template { .. }));
        assert!(db.connection().await.unwrap_err().is_not_initialized());
    }

    #[tokio::test]
    async fn failed_verification_still_allows_new_user() {
        let connector = Arc::new(MockConnector::default());
        let db = adapter(&connector);
        connector.fail_next_connect();
        let mut req = init_request();
        req.verify_connection = true;

        assert!(matches!(
            db.initialize(req).await.unwrap_err(),
            Error::Connection { .. }
        ));

        db.new_user(new_user_request(&[])).await.unwrap();
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn update_with_grant_statements_is_not_implemented() {
        let connector = Arc::new(MockConnector::default());
        let db = adapter(&connector);
        db.initialize(init_request()).await.unwrap();

        let err = db
            .update_user(UpdateUserRequest {
                username: "someone".into(),
                password: Some(dbplugin::ChangePassword {
                    new_password: "next".into(),
                    statements: Statements::new([r#"{"database_grants":[]}"#]),
                }),
                expiration: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotImplemented { .. }));
        assert!(connector.client().calls().is_empty());
    }

    #[tokio::test]
    async fn close_keeps_adapter_usable() {
        let connector = Arc::new(MockConnector::default());
        let db = adapter(&connector);
        db.initialize(init_request()).await.unwrap();
        let created = db.new_user(new_user_request(&[])).await.unwrap();

        db.close().await.unwrap();
        db.close().await.unwrap();
        db.delete_user(DeleteUserRequest {
            username: created.username.clone(),
            ..DeleteUserRequest::default()
        })
        .await
        .unwrap();

        assert_eq!(connector.connect_count(), 2);
        assert_eq!(
            connector.client().calls().last(),
            Some(&ClientCall::RemoveUser {
                name: created.username
            })
        );
    }

    #[tokio::test]
    async fn secret_values_expose_admin_password() {
        let connector = Arc::new(MockConnector::default());
        let db = adapter(&connector);
        assert!(db.secret_values().await.is_empty());

        db.initialize(init_request()).await.unwrap();

        assert_eq!(
            db.secret_values().await,
            BTreeSet::from(["root".to_string()])
        );
    }
}
