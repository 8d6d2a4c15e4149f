//! Lazily established administrative connection
//!
//! [`ConnectionProducer`] owns the decoded configuration and the cached
//! client handle. Its mutating methods take `&mut self`; the adapter keeps it
//! behind the single lifecycle lock, so no two operations touch the cache at
//! once.
//!
//! ```text
//!   uninitialized ──initialize──► initialized ──connection──► initialized + client
//!                                      ▲                              │
//!                                      └────────────close─────────────┘
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use dbplugin::{ConfigMap, Error, InitializeResponse, Result};
use tracing::{debug, info, warn};

use crate::client::{ArangoClient, Connector, ServerVersion};
use crate::config::ConnectionConfig;

/// Context attached to failures of the verification step
const VERIFY_CONTEXT: &str = "failed to verify connection";

/// Owner of the administrative configuration and cached client
#[derive(Debug)]
pub struct ConnectionProducer {
    connector: Arc<dyn Connector>,
    config: Option<ConnectionConfig>,
    raw_config: ConfigMap,
    initialized: bool,
    client: Option<Arc<dyn ArangoClient>>,
}

impl ConnectionProducer {
    /// Uninitialized producer using `connector` to build clients
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            config: None,
            raw_config: ConfigMap::new(),
            initialized: false,
            client: None,
        }
    }

    /// Decode `config` and optionally verify connectivity.
    ///
    /// Equivalent to [`Self::configure`] followed, when `verify_connection`
    /// is set, by [`Self::verify`].
    pub async fn initialize(
        &mut self,
        config: &ConfigMap,
        verify_connection: bool,
    ) -> Result<InitializeResponse> {
        let response = self.configure(config)?;
        if verify_connection {
            self.verify().await?;
        }
        Ok(response)
    }

    /// Decode and store `config`.
    ///
    /// A decode failure leaves the previous state untouched. A successful
    /// decode replaces the configuration wholesale, drops any cached client
    /// and marks the producer initialized, so a later verification failure
    /// can be retried with a bare [`Self::connection`] call.
    pub fn configure(&mut self, config: &ConfigMap) -> Result<InitializeResponse> {
        let decoded = ConnectionConfig::from_map(config)?;
        info!(
            endpoint = %decoded.connection_url,
            admin = %decoded.username,
            "Configured connection producer"
        );

        if self.client.take().is_some() {
            debug!("Dropped cached client on re-initialization");
        }
        self.config = Some(decoded);
        self.raw_config = config.clone();
        self.initialized = true;

        Ok(InitializeResponse {
            config: config.clone(),
        })
    }

    /// Connect and run the server identity probe.
    ///
    /// Failures are wrapped as [`Error::Connection`]; `initialized` is left
    /// as it was.
    pub async fn verify(&mut self) -> Result<ServerVersion> {
        let client = self
            .connection()
            .await
            .map_err(|e| Error::connection(VERIFY_CONTEXT, e))?;
        let version = client
            .version()
            .await
            .map_err(|e| Error::connection(VERIFY_CONTEXT, e))?;
        info!(
            server = %version.server,
            version = %version.version,
            "Verified administrative connection"
        );
        Ok(version)
    }

    /// Return the cached client, establishing it on first use.
    ///
    /// A cached client is returned as-is without re-validation; a broken
    /// handle surfaces as an error on the next upstream call.
    pub async fn connection(&mut self) -> Result<Arc<dyn ArangoClient>> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }

        if let Some(client) = &self.client {
            debug!("Reusing cached administrative client");
            return Ok(Arc::clone(client));
        }

        let config = self.config.as_ref().ok_or(Error::NotInitialized)?;
        let client = self.connector.connect(config).await.inspect_err(|e| {
            warn!(endpoint = %config.connection_url, error = %e, "Connect failed");
        })?;
        debug!(endpoint = %config.connection_url, "Established administrative client");

        self.client = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Drop the cached client. Configuration and `initialized` are kept.
    pub fn close(&mut self) {
        if self.client.take().is_some() {
            debug!("Closed administrative client");
        }
    }

    /// Literal secret values to scrub from outbound errors
    pub fn redacted_secrets(&self) -> BTreeSet<String> {
        self.config
            .iter()
            .map(|config| config.password.expose_secret(str::to_string))
            .filter(|secret| !secret.is_empty())
            .collect()
    }

    /// True after a successful configuration decode
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// True while a client handle is cached
    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// Decoded configuration, if initialized
    pub fn config(&self) -> Option<&ConnectionConfig> {
        self.config.as_ref()
    }

    /// Raw configuration as last supplied
    pub fn raw_config(&self) -> &ConfigMap {
        &self.raw_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ClientCall, MockConnector};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn config() -> ConfigMap {
        json!({
            "connection_url": "http://db:8529",
            "username": "root",
            "password": "rootpw"
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    fn producer() -> (ConnectionProducer, Arc<MockConnector>) {
        let connector = Arc::new(MockConnector::default());
        let producer = ConnectionProducer::new(connector.clone());
        (producer, connector)
    }

    #[tokio::test]
    async fn connection_before_initialize_fails() {
        let (mut producer, connector) = producer();

        let err = producer.connection().await.unwrap_err();

        assert!(err.is_not_initialized());
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn initialize_without_verify_is_lazy() {
        let (mut producer, connector) = producer();

        let resp = producer.initialize(&config(), false).await.unwrap();

        assert_eq!(resp.config, config());
        assert!(producer.is_initialized());
        assert!(!producer.has_client());
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn verify_connects_once_and_caches() {
        let (mut producer, connector) = producer();

        producer.initialize(&config(), true).await.unwrap();
        producer.connection().await.unwrap();
        producer.connection().await.unwrap();

        assert_eq!(connector.connect_count(), 1);
        assert_eq!(connector.client().calls(), vec![ClientCall::Version]);
        assert_eq!(
            connector.last_endpoint().as_deref(),
            Some("http://db:8529/")
        );
    }

    #[tokio::test]
    async fn failed_verification_keeps_initialized() {
        let (mut producer, connector) = producer();
        connector.fail_next_connect();

        let err = producer.initialize(&config(), true).await.unwrap_err();

        assert!(matches!(err, Error::Connection { ref context, .. } if context == VERIFY_CONTEXT));
        assert!(producer.is_initialized());
        producer.connection().await.unwrap();
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn failed_version_probe_is_a_connection_error() {
        let (mut producer, connector) = producer();
        connector
            .client()
            .fail_when(ClientCall::Version, Error::upstream("version probe", Some(503), "down"));

        let err = producer.initialize(&config(), true).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "failed to verify connection: version probe failed: down"
        );
        assert!(producer.is_initialized());
    }

    #[tokio::test]
    async fn verify_reports_server_version() {
        let (mut producer, _connector) = producer();
        producer.configure(&config()).unwrap();

        let version = producer.verify().await.unwrap();

        assert_eq!(version.server, "arango");
        assert!(producer.has_client());
    }

    #[tokio::test]
    async fn close_drops_client_but_keeps_state() {
        let (mut producer, connector) = producer();
        producer.initialize(&config(), true).await.unwrap();

        producer.close();
        producer.close();

        assert!(producer.is_initialized());
        assert!(!producer.has_client());
        producer.connection().await.unwrap();
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test]
    async fn reinitialize_replaces_config_and_drops_client() {
        let (mut producer, connector) = producer();
        producer.initialize(&config(), true).await.unwrap();

        let mut next = config();
        next.insert("connection_url".into(), json!("https://other:8530"));
        producer.initialize(&next, false).await.unwrap();

        assert!(!producer.has_client());
        assert_eq!(
            producer.config().unwrap().connection_url.as_str(),
            "https://other:8530/"
        );
        producer.connection().await.unwrap();
        assert_eq!(
            connector.last_endpoint().as_deref(),
            Some("https://other:8530/")
        );
    }

    #[tokio::test]
    async fn bad_config_leaves_previous_state() {
        let (mut producer, _connector) = producer();
        producer.initialize(&config(), false).await.unwrap();

        let err = producer
            .initialize(&ConfigMap::new(), false)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Config { .. }));
        assert_eq!(producer.raw_config(), &config());
    }

    #[tokio::test]
    async fn redacted_secrets_lists_admin_password() {
        let (mut producer, _connector) = producer();
        assert!(producer.redacted_secrets().is_empty());

        producer.initialize(&config(), false).await.unwrap();

        assert_eq!(
            producer.redacted_secrets(),
            BTreeSet::from(["rootpw".to_string()])
        );
    }
}
