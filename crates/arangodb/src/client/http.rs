//! ArangoDB REST client built on `reqwest`

use std::sync::Arc;

use async_trait::async_trait;
use dbplugin::{Error, ObjectKind, Result, SecretString};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{
    AccessTarget, ArangoClient, CollectionRef, Connector, DatabaseRef, ServerVersion, UserRef,
};
use crate::config::ConnectionConfig;
use crate::grant::AccessLevel;

/// Collection segment ArangoDB uses for database-default collection access
const ALL_COLLECTIONS: &str = "*";

/// Builds [`HttpClient`]s, optionally sharing one `reqwest::Client`
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    http: Option<reqwest::Client>,
}

impl HttpConnector {
    /// Connector that builds a fresh `reqwest::Client` per connect
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector that reuses a caller-configured `reqwest::Client`
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http: Some(http) }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn ArangoClient>> {
        let http = match &self.http {
            Some(http) => http.clone(),
            None => reqwest::Client::builder()
                .build()
                .map_err(|e| Error::connection("failed to build HTTP client", e))?,
        };
        debug!(endpoint = %config.connection_url, "Created ArangoDB HTTP client");
        let client: Arc<dyn ArangoClient> = Arc::new(HttpClient::new(http, config));
        Ok(client)
    }
}

/// Administrative client speaking the ArangoDB HTTP API
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    endpoint: Url,
    /// Admin account sent as basic auth, if one is configured
    credentials: Option<(String, SecretString)>,
}

#[derive(Deserialize)]
struct ArangoErrorBody {
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct VersionBody {
    server: String,
    version: String,
    #[serde(default)]
    license: Option<String>,
}

#[derive(Deserialize)]
struct UserBody {
    user: String,
    #[serde(default = "active_default")]
    active: bool,
}

fn active_default() -> bool {
    true
}

#[derive(Serialize)]
struct CreateUserBody<'a> {
    user: &'a str,
    passwd: &'a str,
    active: bool,
}

#[derive(Serialize)]
struct PasswordBody<'a> {
    passwd: &'a str,
}

#[derive(Serialize)]
struct GrantBody {
    grant: &'static str,
}

impl HttpClient {
    /// Client for `config.connection_url` authenticating as the admin account
    pub fn new(http: reqwest::Client, config: &ConnectionConfig) -> Self {
        Self {
            http,
            endpoint: config.connection_url.clone(),
            credentials: config
                .has_credentials()
                .then(|| (config.username.clone(), config.password.clone())),
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| {
                Error::config(format!("{} cannot be used as a base URL", self.endpoint))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.http.request(method, url);
        match &self.credentials {
            Some((username, password)) => {
                password.expose_secret(|password| request.basic_auth(username, Some(password)))
            }
            None => request,
        }
    }

    async fn send(
        &self,
        operation: &str,
        request: RequestBuilder,
        not_found: Option<(ObjectKind, &str)>,
    ) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::upstream(operation, None, e.without_url().to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            if let Some((kind, name)) = not_found {
                return Err(Error::not_found(kind, name));
            }
        }

        let message = response
            .json::<ArangoErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error_message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected response status")
                    .to_string()
            });
        Err(Error::upstream(operation, Some(status.as_u16()), message))
    }

    async fn decode<T: DeserializeOwned>(operation: &str, response: Response) -> Result<T> {
        let status = response.status().as_u16();
        response
            .json::<T>()
            .await
            .map_err(|e| Error::upstream(operation, Some(status), e.without_url().to_string()))
    }
}

#[async_trait]
impl ArangoClient for HttpClient {
    async fn version(&self) -> Result<ServerVersion> {
        const OP: &str = "version probe";
        let url = self.url(&["_api", "version"])?;
        let response = self.send(OP, self.request(Method::GET, url), None).await?;
        let body: VersionBody = Self::decode(OP, response).await?;
        Ok(ServerVersion {
            server: body.server,
            version: body.version,
            license: body.license,
        })
    }

    async fn create_user(&self, name: &str, password: &SecretString) -> Result<UserRef> {
        const OP: &str = "create user";
        let url = self.url(&["_api", "user"])?;
        let request = password.expose_secret(|passwd| {
            self.request(Method::POST, url).json(&CreateUserBody {
                user: name,
                passwd,
                active: true,
            })
        });
        let response = self.send(OP, request, None).await?;
        let body: UserBody = Self::decode(OP, response).await?;
        Ok(UserRef {
            name: body.user,
            active: body.active,
        })
    }

    async fn user(&self, name: &str) -> Result<UserRef> {
        const OP: &str = "look up user";
        let url = self.url(&["_api", "user", name])?;
        let response = self
            .send(OP, self.request(Method::GET, url), Some((ObjectKind::User, name)))
            .await?;
        let body: UserBody = Self::decode(OP, response).await?;
        Ok(UserRef {
            name: body.user,
            active: body.active,
        })
    }

    async fn remove_user(&self, user: &UserRef) -> Result<()> {
        let url = self.url(&["_api", "user", user.name.as_str()])?;
        self.send(
            "remove user",
            self.request(Method::DELETE, url),
            Some((ObjectKind::User, user.name.as_str())),
        )
        .await?;
        Ok(())
    }

    async fn replace_password(&self, user: &UserRef, password: &SecretString) -> Result<()> {
        let url = self.url(&["_api", "user", user.name.as_str()])?;
        let request = password.expose_secret(|passwd| {
            self.request(Method::PATCH, url)
                .json(&PasswordBody { passwd })
        });
        self.send(
            "update password",
            request,
            Some((ObjectKind::User, user.name.as_str())),
        )
        .await?;
        Ok(())
    }

    async fn database(&self, name: &str) -> Result<DatabaseRef> {
        let url = self.url(&["_db", name, "_api", "database", "current"])?;
        self.send(
            "look up database",
            self.request(Method::GET, url),
            Some((ObjectKind::Database, name)),
        )
        .await?;
        Ok(DatabaseRef {
            name: name.to_string(),
        })
    }

    async fn collection(&self, database: &DatabaseRef, name: &str) -> Result<CollectionRef> {
        let url = self.url(&["_db", database.name.as_str(), "_api", "collection", name])?;
        self.send(
            "look up collection",
            self.request(Method::GET, url),
            Some((ObjectKind::Collection, name)),
        )
        .await?;
        Ok(CollectionRef {
            database: database.name.clone(),
            name: name.to_string(),
        })
    }

    async fn set_database_access(
        &self,
        user: &UserRef,
        database: &DatabaseRef,
        access: AccessLevel,
    ) -> Result<()> {
        let url = self.url(&[
            "_api",
            "user",
            user.name.as_str(),
            "database",
            database.name.as_str(),
        ])?;
        let request = self.request(Method::PUT, url).json(&GrantBody {
            grant: access.as_str(),
        });
        self.send(
            &format!("set database access on '{}'", database.name),
            request,
            None,
        )
        .await?;
        Ok(())
    }

    async fn set_collection_access(
        &self,
        user: &UserRef,
        target: AccessTarget<'_>,
        access: AccessLevel,
    ) -> Result<()> {
        let collection = target.collection().unwrap_or(ALL_COLLECTIONS);
        let url = self.url(&[
            "_api",
            "user",
            user.name.as_str(),
            "database",
            target.database(),
            collection,
        ])?;
        let request = self.request(Method::PUT, url).json(&GrantBody {
            grant: access.as_str(),
        });
        self.send(
            &format!(
                "set collection access on '{}/{collection}'",
                target.database()
            ),
            request,
            None,
        )
        .await?;
        Ok(())
    }
}
