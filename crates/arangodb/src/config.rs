//! Connection configuration decoded from the host's raw config map

use dbplugin::{ConfigMap, Error, Result, SecretString};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use url::Url;

/// Key of the required connection URL
pub const CONNECTION_URL: &str = "connection_url";
/// Key of the administrative account name
pub const USERNAME: &str = "username";
/// Key of the administrative account secret
pub const PASSWORD: &str = "password";
/// Key of the optional username template
pub const USERNAME_TEMPLATE: &str = "username_template";

/// Administrative connection settings
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server endpoint, e.g. `http://db:8529`
    pub connection_url: Url,
    /// Administrative account name; empty disables authentication
    pub username: String,
    /// Administrative account secret
    pub password: SecretString,
}

#[derive(Deserialize)]
struct RawConnectionConfig {
    #[serde(default, deserialize_with = "weak_string")]
    connection_url: Option<String>,
    #[serde(default, deserialize_with = "weak_string")]
    username: Option<String>,
    #[serde(default, deserialize_with = "weak_string")]
    password: Option<String>,
}

impl ConnectionConfig {
    /// Decode from the host's config map.
    ///
    /// Unknown keys are ignored and scalar values are accepted for string
    /// fields. `connection_url` must be present and parse as an http(s) URL.
    pub fn from_map(map: &ConfigMap) -> Result<Self> {
        let raw: RawConnectionConfig = serde_json::from_value(Value::Object(map.clone()))
            .map_err(|e| Error::config(e.to_string()))?;

        let url = raw
            .connection_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| Error::config(format!("{CONNECTION_URL} is required")))?;

        let config = Self {
            connection_url: parse_url(&url)?,
            username: raw.username.unwrap_or_default(),
            password: SecretString::new(raw.password.unwrap_or_default()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() && !self.password.is_empty() {
            return Err(Error::config(format!(
                "{PASSWORD} is set but {USERNAME} is empty"
            )));
        }
        Ok(())
    }

    /// True when requests should carry basic authentication
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::config(format!("{CONNECTION_URL} is not a valid URL: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::config(format!(
            "{CONNECTION_URL} must use http or https, got '{other}'"
        ))),
    }
}

/// Read the optional `username_template` option.
///
/// Present-but-not-a-string is an error; absent, null, or empty yields `None`.
pub fn username_template(map: &ConfigMap) -> Result<Option<String>> {
    match map.get(USERNAME_TEMPLATE) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Error::config(format!(
            "failed to retrieve {USERNAME_TEMPLATE}: expected a string, got {other}"
        ))),
    }
}

fn weak_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected a string, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn map(value: Value) -> ConfigMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn decodes_full_config() {
        let config = ConnectionConfig::from_map(&map(json!({
            "connection_url": "http://db:8529",
            "username": "root",
            "password": "root",
            "username_template": "{{ role_name }}",
            "max_open_connections": 4
        })))
        .unwrap();

        assert_eq!(config.connection_url.as_str(), "http://db:8529/");
        assert_eq!(config.username, "root");
        config.password.expose_secret(|p| assert_eq!(p, "root"));
        assert!(config.has_credentials());
    }

    #[test]
    fn scalar_values_are_weakly_decoded() {
        let config = ConnectionConfig::from_map(&map(json!({
            "connection_url": "https://db:8529",
            "username": "admin",
            "password": 12345
        })))
        .unwrap();
        config.password.expose_secret(|p| assert_eq!(p, "12345"));
    }

    #[test]
    fn missing_url_is_a_config_error() {
        let err = ConnectionConfig::from_map(&map(json!({"username": "root"}))).unwrap_err();
        assert_eq!(err, Error::config("connection_url is required"));
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let err =
            ConnectionConfig::from_map(&map(json!({"connection_url": "tcp://db:8529"})))
                .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn password_without_username_is_rejected() {
        let err = ConnectionConfig::from_map(&map(json!({
            "connection_url": "http://db:8529",
            "password": "orphan"
        })))
        .unwrap_err();
        assert!(!err.to_string().contains("orphan"));
    }

    #[test]
    fn username_template_option() {
        assert_eq!(username_template(&map(json!({}))).unwrap(), None);
        assert_eq!(
            username_template(&map(json!({"username_template": ""}))).unwrap(),
            None
        );
        assert_eq!(
            username_template(&map(json!({"username_template": "x-{{ role_name }}"}))).unwrap(),
            Some("x-{{ role_name }}".to_string())
        );
        assert!(username_template(&map(json!({"username_template": 7}))).is_err());
    }
}
