//! Secret string type with automatic zeroization
//!
//! Administrative and generated passwords travel through the adapter as
//! [`SecretString`], so they never end up in `Debug`, `Display`, or
//! serialized output by accident.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secret string with automatic memory zeroization
///
/// The value is only reachable inside a closure passed to
/// [`SecretString::expose_secret`]. Memory is zeroed on drop.
///
/// # Examples
///
/// ```
/// use dbplugin::SecretString;
///
/// let secret = SecretString::new("p@ss");
/// assert_eq!(secret.expose_secret(str::len), 4);
/// assert_eq!(format!("{secret:?}"), "[REDACTED]");
/// ```
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecretString {
    inner: String,
}

impl SecretString {
    /// Creates a new secret from any string-like value
    pub fn new<S: Into<String>>(s: S) -> Self {
        Self { inner: s.into() }
    }

    /// Accesses the secret value within a closure scope
    pub fn expose_secret<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        f(&self.inner)
    }

    /// Returns the length without exposing content
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Checks if empty without exposing content
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(crate::REDACTED)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(crate::REDACTED)
    }
}

// Serialized form is always redacted
impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(crate::REDACTED)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expose_secret_yields_value() {
        let secret = SecretString::new("root");
        secret.expose_secret(|s| assert_eq!(s, "root"));
    }

    #[test]
    fn debug_and_display_are_redacted() {
        let secret = SecretString::new("super_secret_password");
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(format!("{secret}"), "[REDACTED]");
    }

    #[test]
    fn serialize_is_redacted() {
        let secret = SecretString::new("should_be_redacted");
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, "\"[REDACTED]\"");
    }

    #[test]
    fn deserialize_from_string() {
        let secret: SecretString = serde_json::from_str("\"from-json\"").unwrap();
        secret.expose_secret(|s| assert_eq!(s, "from-json"));
    }

    #[test]
    fn len_and_is_empty() {
        assert!(SecretString::default().is_empty());
        assert_eq!(SecretString::from("12345").len(), 5);
    }
}
