//! Username rendering
//!
//! A [`UsernameProducer`] compiles one Tera template and renders it per
//! request with the caller's [`UsernameMetadata`]. Besides the built-in Tera
//! filters the template can call:
//!
//! | function                 | output                                   |
//! |--------------------------|------------------------------------------|
//! | `random(length=N)`       | `N` alphanumeric characters              |
//! | `unix_time()`            | seconds since the epoch                  |
//! | `unix_time_millis()`     | milliseconds since the epoch             |
//! | `timestamp(format="…")`  | strftime-formatted time, RFC 3339 if omitted |
//! | `uuid()`                 | a v4 UUID                                |
//!
//! Randomness and time come from an [`Entropy`] source so rendering can be
//! pinned in tests.

use std::collections::HashMap;
use std::error::Error as _;
use std::fmt;
use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use dbplugin::{Error, Result, UsernameMetadata};
use rand::Rng;
use rand::distr::Alphanumeric;
use tera::{Context, Tera, Value};
use uuid::Uuid;

/// Template used when the configuration does not supply one
///
/// Tera's `truncate` counts characters, so multibyte metadata can still render
/// past the byte limit; a producer built from this template cuts the result
/// down to its maximum instead of rejecting it.
pub const DEFAULT_USERNAME_TEMPLATE: &str = concat!(
    r#"{% filter truncate(length=100, end="") %}"#,
    r#"v-{{ display_name | truncate(length=15, end="") }}"#,
    r#"-{{ role_name | truncate(length=15, end="") }}"#,
    "-{{ random(length=20) }}",
    "-{{ unix_time() }}",
    "{% endfilter %}",
);

/// Longest username accepted by default, in bytes
pub const DEFAULT_MAX_USERNAME_LENGTH: usize = 100;

/// Upper bound on `random(length=N)`
const MAX_RANDOM_LENGTH: u64 = 256;

const TEMPLATE_NAME: &str = "username";

/// Source of the random and time components of a username
pub trait Entropy: Send + Sync + fmt::Debug {
    /// `len` alphanumeric characters
    fn random_alphanumeric(&self, len: usize) -> String;

    /// Current time
    fn now(&self) -> DateTime<Utc>;

    /// A fresh UUID
    fn uuid(&self) -> Uuid;
}

/// Thread-local RNG and the system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEntropy;

impl Entropy for SystemEntropy {
    fn random_alphanumeric(&self, len: usize) -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn uuid(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Compiled username template
pub struct UsernameProducer {
    tera: Tera,
    source: String,
    max_length: usize,
    overflow: Overflow,
}

/// What [`UsernameProducer::render`] does with output past `max_length`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Overflow {
    /// Cut at the last char boundary within the limit
    Truncate,
    /// Fail with a template error
    Reject,
}

impl fmt::Debug for UsernameProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsernameProducer")
            .field("template", &self.source)
            .field("max_length", &self.max_length)
            .field("overflow", &self.overflow)
            .finish()
    }
}

impl UsernameProducer {
    /// Compile `template` and validate it with one render of empty metadata.
    ///
    /// Syntax errors, unknown functions or variables, and a validation render
    /// longer than `max_length` all fail here rather than on first use.
    pub fn new(template: &str, max_length: usize, entropy: Arc<dyn Entropy>) -> Result<Self> {
        Self::compile(template, max_length, Overflow::Reject, &entropy)
    }

    /// Producer for [`DEFAULT_USERNAME_TEMPLATE`] with a custom byte limit.
    ///
    /// Renders longer than `max_length` are truncated, never rejected.
    pub fn default_template(max_length: usize, entropy: Arc<dyn Entropy>) -> Result<Self> {
        Self::compile(
            DEFAULT_USERNAME_TEMPLATE,
            max_length,
            Overflow::Truncate,
            &entropy,
        )
    }

    /// Producer for [`DEFAULT_USERNAME_TEMPLATE`]
    pub fn with_defaults(entropy: Arc<dyn Entropy>) -> Result<Self> {
        Self::default_template(DEFAULT_MAX_USERNAME_LENGTH, entropy)
    }

    fn compile(
        template: &str,
        max_length: usize,
        overflow: Overflow,
        entropy: &Arc<dyn Entropy>,
    ) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, template)
            .map_err(|e| Error::template(flatten(&e)))?;
        register_functions(&mut tera, entropy);

        let producer = Self {
            tera,
            source: template.to_string(),
            max_length,
            overflow,
        };
        producer.render(&UsernameMetadata::default())?;
        Ok(producer)
    }

    /// Render a username for `metadata`
    pub fn render(&self, metadata: &UsernameMetadata) -> Result<String> {
        let mut context = Context::new();
        context.insert("display_name", &metadata.display_name);
        context.insert("role_name", &metadata.role_name);

        let mut username = self
            .tera
            .render(TEMPLATE_NAME, &context)
            .map_err(|e| Error::template(flatten(&e)))?;

        if username.len() > self.max_length {
            match self.overflow {
                Overflow::Truncate => {
                    let mut end = self.max_length;
                    while !username.is_char_boundary(end) {
                        end -= 1;
                    }
                    username.truncate(end);
                }
                Overflow::Reject => {
                    return Err(Error::template(format!(
                        "rendered username is {} bytes, longer than the maximum of {}",
                        username.len(),
                        self.max_length
                    )));
                }
            }
        }
        Ok(username)
    }

    /// Template source
    pub fn template(&self) -> &str {
        &self.source
    }

    /// Maximum accepted username length in bytes
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

fn register_functions(tera: &mut Tera, entropy: &Arc<dyn Entropy>) {
    let source = Arc::clone(entropy);
    tera.register_function("random", move |args: &HashMap<String, Value>| {
        let length = args
            .get("length")
            .and_then(Value::as_u64)
            .ok_or_else(|| tera::Error::msg("random() requires an integer `length`"))?;
        if length == 0 || length > MAX_RANDOM_LENGTH {
            return Err(tera::Error::msg(format!(
                "random() length must be between 1 and {MAX_RANDOM_LENGTH}"
            )));
        }
        let length = usize::try_from(length).map_err(tera::Error::msg)?;
        Ok(Value::String(source.random_alphanumeric(length)))
    });

    let source = Arc::clone(entropy);
    tera.register_function("unix_time", move |_: &HashMap<String, Value>| {
        Ok(Value::from(source.now().timestamp()))
    });

    let source = Arc::clone(entropy);
    tera.register_function("unix_time_millis", move |_: &HashMap<String, Value>| {
        Ok(Value::from(source.now().timestamp_millis()))
    });

    let source = Arc::clone(entropy);
    tera.register_function("timestamp", move |args: &HashMap<String, Value>| {
        let now = source.now();
        match args.get("format") {
            None => Ok(Value::String(now.to_rfc3339())),
            Some(Value::String(format)) => {
                if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                    return Err(tera::Error::msg(format!(
                        "timestamp() format '{format}' is not a valid strftime string"
                    )));
                }
                Ok(Value::String(now.format(format).to_string()))
            }
            Some(other) => Err(tera::Error::msg(format!(
                "timestamp() `format` must be a string, got {other}"
            ))),
        }
    });

    let source = Arc::clone(entropy);
    tera.register_function("uuid", move |_: &HashMap<String, Value>| {
        Ok(Value::String(source.uuid().to_string()))
    });
}

/// Join a Tera error with its causes; the top-level message alone only names
/// the template.
fn flatten(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
