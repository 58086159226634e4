//! Secret store adapter
//!
//! The reconciliation core reads and writes flat field maps under logical
//! keys (`account`, `key`, `certificates/<domain>`). Backends apply their own
//! prefix and transport. Three outcomes of a read matter and are kept
//! distinct: the key is absent, the key holds the expected fields, or the key
//! holds something else.
//!
//! # Backends
//!
//! - [`VaultStore`] - HashiCorp Vault KV v2 over HTTP
//! - [`FileStore`] - one JSON file per key, for development
//! - [`MemoryStore`] - in-process map, for tests

mod file;
mod memory;
mod vault;

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use certsteward_common::StoreKey;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use vault::VaultStore;

/// Fields stored under one key
pub type FieldMap = BTreeMap<String, Value>;

/// Errors talking to a secret store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Request could not be sent or the response could not be read
    #[error("secret store request for '{key}' failed: {message}")]
    Transport { key: String, message: String },

    /// Login was rejected or returned no token
    #[error("secret store authentication failed: {0}")]
    Auth(String),

    /// Backend answered with an unexpected HTTP status
    #[error("secret store returned HTTP {status} for '{key}'")]
    Status { key: String, status: u16 },

    /// Filesystem error in the file backend
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored bytes are not a JSON object
    #[error("record '{key}' is not a JSON object: {message}")]
    Encoding { key: String, message: String },
}

/// Path-addressed key/value secret store
///
/// Writes replace the whole record; nothing relies on field merging.
#[async_trait]
pub trait SecretStore: Send + Sync + Debug {
    /// Read the record under `key`, `None` when nothing was ever written
    async fn read(&self, key: &StoreKey) -> Result<Option<FieldMap>, StoreError>;

    /// Replace the record under `key`
    async fn write(&self, key: &StoreKey, fields: &FieldMap) -> Result<(), StoreError>;
}

/// Result of decoding fields out of a stored record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T> {
    /// Record present with the expected shape
    Found(T),
    /// Record present but unusable; the string says why
    Malformed(String),
    /// No record under the key
    NotFound,
}

impl<T> Decoded<T> {
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Decoded<U> {
        match self {
            Decoded::Found(value) => Decoded::Found(f(value)),
            Decoded::Malformed(reason) => Decoded::Malformed(reason),
            Decoded::NotFound => Decoded::NotFound,
        }
    }
}

/// Decode one string field from a record
pub fn decode_field(record: Option<&FieldMap>, field: &str) -> Decoded<String> {
    decode_fields(record, &[field]).map(|mut values| values.remove(0))
}

/// Decode several string fields, in the order given
///
/// Every field must be present and hold a string.
pub fn decode_fields(record: Option<&FieldMap>, fields: &[&str]) -> Decoded<Vec<String>> {
    let Some(record) = record else {
        return Decoded::NotFound;
    };

    let mut values = Vec::with_capacity(fields.len());
    for field in fields {
        match record.get(*field) {
            Some(Value::String(value)) => values.push(value.clone()),
            Some(other) => {
                return Decoded::Malformed(format!(
                    "field '{}' should be a string, found {}",
                    field,
                    json_kind(other)
                ))
            }
            None => return Decoded::Malformed(format!("field '{}' is missing", field)),
        }
    }

    Decoded::Found(values)
}

/// Build a record from string fields
pub fn string_fields<I, K, V>(pairs: I) -> FieldMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), Value::String(v.into())))
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
