//! In-memory doubles for the client boundary
//!
//! [`MockArangoClient`] keeps users, databases and grants in memory and
//! records every call, so tests can assert both the resulting state and the
//! exact order of upstream operations. [`FixedEntropy`] pins the random
//! and time components of rendered usernames.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dbplugin::{Error, ObjectKind, Result, SecretString};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::client::{
    AccessTarget, ArangoClient, CollectionRef, Connector, DatabaseRef, ServerVersion, UserRef,
};
use crate::config::ConnectionConfig;
use crate::grant::AccessLevel;
use crate::username::Entropy;

/// One recorded upstream call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClientCall {
    /// `version()`
    Version,
    /// `create_user(name, _)`
    CreateUser {
        /// Account name
        name: String,
    },
    /// `user(name)`
    User {
        /// Account name
        name: String,
    },
    /// `remove_user(user)`
    RemoveUser {
        /// Account name
        name: String,
    },
    /// `replace_password(user, _)`
    ReplacePassword {
        /// Account name
        name: String,
    },
    /// `database(name)`
    Database {
        /// Database name
        name: String,
    },
    /// `collection(db, name)`
    Collection {
        /// Database name
        database: String,
        /// Collection name
        name: String,
    },
    /// `set_database_access(user, db, access)`
    SetDatabaseAccess {
        /// Account name
        user: String,
        /// Database name
        database: String,
        /// Level set
        access: AccessLevel,
    },
    /// `set_collection_access(user, target, access)`
    SetCollectionAccess {
        /// Account name
        user: String,
        /// Database name
        database: String,
        /// Collection name, `None` for the database default
        collection: Option<String>,
        /// Level set
        access: AccessLevel,
    },
}

impl ClientCall {
    /// True for the access-setting calls
    pub fn is_grant(&self) -> bool {
        matches!(
            self,
            Self::SetDatabaseAccess { .. } | Self::SetCollectionAccess { .. }
        )
    }
}

/// State of one account held by the mock
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockUser {
    /// Current password
    pub password: String,
    /// Database-level grants
    pub database_access: BTreeMap<String, AccessLevel>,
    /// Collection-level grants keyed by (database, collection or "*")
    pub collection_access: BTreeMap<(String, String), AccessLevel>,
}

#[derive(Debug, Default)]
struct MockState {
    users: HashMap<String, MockUser>,
    databases: HashMap<String, HashSet<String>>,
}

/// In-memory ArangoDB stand-in
#[derive(Debug, Default)]
pub struct MockArangoClient {
    state: Mutex<MockState>,
    calls: Mutex<Vec<ClientCall>>,
    failures: Mutex<Vec<(ClientCall, Error)>>,
}

impl MockArangoClient {
    /// Empty server
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a database with the given collections
    pub fn with_database<I, S>(self, name: &str, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().databases.insert(
            name.to_string(),
            collections.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Add an account directly, bypassing call recording
    pub fn insert_user(&self, name: &str, password: &str) {
        self.state.lock().users.insert(
            name.to_string(),
            MockUser {
                password: password.to_string(),
                ..MockUser::default()
            },
        );
    }

    /// Fail the first call equal to `call` with `error`
    pub fn fail_when(&self, call: ClientCall, error: Error) {
        self.failures.lock().push((call, error));
    }

    /// Snapshot of an account
    pub fn user_state(&self, name: &str) -> Option<MockUser> {
        self.state.lock().users.get(name).cloned()
    }

    /// Names of all accounts
    pub fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().users.keys().cloned().collect();
        names.sort();
        names
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<ClientCall> {
        self.calls.lock().clone()
    }

    /// Only the access-setting calls, in order
    pub fn grant_calls(&self) -> Vec<ClientCall> {
        self.calls().into_iter().filter(ClientCall::is_grant).collect()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: ClientCall) -> Result<()> {
        self.calls.lock().push(call.clone());
        let mut failures = self.failures.lock();
        if let Some(index) = failures.iter().position(|(expected, _)| *expected == call) {
            let (_, error) = failures.remove(index);
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl ArangoClient for MockArangoClient {
    async fn version(&self) -> Result<ServerVersion> {
        self.record(ClientCall::Version)?;
        Ok(ServerVersion {
            server: "arango".into(),
            version: "3.11.0".into(),
            license: Some("community".into()),
        })
    }

    async fn create_user(&self, name: &str, password: &SecretString) -> Result<UserRef> {
        self.record(ClientCall::CreateUser {
            name: name.to_string(),
        })?;
        let mut state = self.state.lock();
        if state.users.contains_key(name) {
            return Err(Error::upstream("create user", Some(409), "duplicate user"));
        }
        let user = MockUser {
            password: password.expose_secret(str::to_string),
            ..MockUser::default()
        };
        state.users.insert(name.to_string(), user);
        Ok(UserRef {
            name: name.to_string(),
            active: true,
        })
    }

    async fn user(&self, name: &str) -> Result<UserRef> {
        self.record(ClientCall::User {
            name: name.to_string(),
        })?;
        if self.state.lock().users.contains_key(name) {
            Ok(UserRef {
                name: name.to_string(),
                active: true,
            })
        } else {
            Err(Error::not_found(ObjectKind::User, name))
        }
    }

    async fn remove_user(&self, user: &UserRef) -> Result<()> {
        self.record(ClientCall::RemoveUser {
            name: user.name.clone(),
        })?;
        self.state
            .lock()
            .users
            .remove(&user.name)
            .map(drop)
            .ok_or_else(|| Error::not_found(ObjectKind::User, &user.name))
    }

    async fn replace_password(&self, user: &UserRef, password: &SecretString) -> Result<()> {
        self.record(ClientCall::ReplacePassword {
            name: user.name.clone(),
        })?;
        let mut state = self.state.lock();
        let account = state
            .users
            .get_mut(&user.name)
            .ok_or_else(|| Error::not_found(ObjectKind::User, &user.name))?;
        account.password = password.expose_secret(str::to_string);
        Ok(())
    }

    async fn database(&self, name: &str) -> Result<DatabaseRef> {
        self.record(ClientCall::Database {
            name: name.to_string(),
        })?;
        if self.state.lock().databases.contains_key(name) {
            Ok(DatabaseRef {
                name: name.to_string(),
            })
        } else {
            Err(Error::not_found(ObjectKind::Database, name))
        }
    }

    async fn collection(&self, database: &DatabaseRef, name: &str) -> Result<CollectionRef> {
        self.record(ClientCall::Collection {
            database: database.name.clone(),
            name: name.to_string(),
        })?;
        let exists = self
            .state
            .lock()
            .databases
            .get(&database.name)
            .is_some_and(|collections| collections.contains(name));
        if exists {
            Ok(CollectionRef {
                database: database.name.clone(),
                name: name.to_string(),
            })
        } else {
            Err(Error::not_found(ObjectKind::Collection, name))
        }
    }

    async fn set_database_access(
        &self,
        user: &UserRef,
        database: &DatabaseRef,
        access: AccessLevel,
    ) -> Result<()> {
        self.record(ClientCall::SetDatabaseAccess {
            user: user.name.clone(),
            database: database.name.clone(),
            access,
        })?;
        let mut state = self.state.lock();
        let account = state
            .users
            .get_mut(&user.name)
            .ok_or_else(|| Error::not_found(ObjectKind::User, &user.name))?;
        account
            .database_access
            .insert(database.name.clone(), access);
        Ok(())
    }

    async fn set_collection_access(
        &self,
        user: &UserRef,
        target: AccessTarget<'_>,
        access: AccessLevel,
    ) -> Result<()> {
        self.record(ClientCall::SetCollectionAccess {
            user: user.name.clone(),
            database: target.database().to_string(),
            collection: target.collection().map(str::to_string),
            access,
        })?;
        let mut state = self.state.lock();
        let account = state
            .users
            .get_mut(&user.name)
            .ok_or_else(|| Error::not_found(ObjectKind::User, &user.name))?;
        let key = (
            target.database().to_string(),
            target.collection().unwrap_or("*").to_string(),
        );
        account.collection_access.insert(key, access);
        Ok(())
    }
}

/// Connector handing out one shared [`MockArangoClient`]
#[derive(Debug)]
pub struct MockConnector {
    client: Arc<MockArangoClient>,
    connect_count: AtomicU32,
    fail_on_connect: AtomicBool,
    last_endpoint: Mutex<Option<String>>,
}

impl MockConnector {
    /// Connector for the given client
    pub fn new(client: Arc<MockArangoClient>) -> Self {
        Self {
            client,
            connect_count: AtomicU32::new(0),
            fail_on_connect: AtomicBool::new(false),
            last_endpoint: Mutex::new(None),
        }
    }

    /// The shared client
    pub fn client(&self) -> Arc<MockArangoClient> {
        Arc::clone(&self.client)
    }

    /// Number of successful connects
    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// Make the next connect fail
    pub fn fail_next_connect(&self) {
        self.fail_on_connect.store(true, Ordering::SeqCst);
    }

    /// Endpoint of the most recent connect
    pub fn last_endpoint(&self) -> Option<String> {
        self.last_endpoint.lock().clone()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new(Arc::new(MockArangoClient::new()))
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn ArangoClient>> {
        if self.fail_on_connect.swap(false, Ordering::SeqCst) {
            return Err(Error::connection(
                "failed to connect",
                format!("{} refused the connection", config.connection_url),
            ));
        }
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        *self.last_endpoint.lock() = Some(config.connection_url.to_string());
        let client: Arc<dyn ArangoClient> = self.client();
        Ok(client)
    }
}

/// Entropy returning the same token, instant and UUID every time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedEntropy {
    /// Characters cycled to produce random strings
    pub token: String,
    /// Reported current time
    pub now: DateTime<Utc>,
    /// Reported UUID
    pub uuid: Uuid,
}

impl Default for FixedEntropy {
    fn default() -> Self {
        Self {
            token: "abcdefghijklmnopqrstuvwxyz0123456789".into(),
            now: DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default(),
            uuid: Uuid::from_u128(0x6f9619ff_8b86_d011_b42d_00cf4fc964ff),
        }
    }
}

impl Entropy for FixedEntropy {
    fn random_alphanumeric(&self, len: usize) -> String {
        self.token.chars().cycle().take(len).collect()
    }

    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }
}
