//! Type-safe identifier newtypes for certsteward.
//!
//! These types keep domain groups and secret-store keys from being passed
//! around as bare strings, so a canonical domain cannot be confused with a
//! full store path.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when parsing a domain group.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainGroupError {
    /// The group string contained no domain names.
    #[error("domain group '{0}' contains no domain names")]
    Empty(String),
}

/// An ordered set of DNS names that share one certificate.
///
/// Parsed from a comma-joined string such as `"a.com,www.a.com"`. The first
/// entry is the canonical domain and names the certificate in the secret
/// store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainGroup {
    domains: Vec<String>,
}

impl DomainGroup {
    /// Build a group from already-split domain names.
    pub fn new<I, S>(domains: I) -> Result<Self, DomainGroupError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let domains: Vec<String> = domains
            .into_iter()
            .map(Into::into)
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();

        if domains.is_empty() {
            return Err(DomainGroupError::Empty(String::new()));
        }

        Ok(Self { domains })
    }

    /// The canonical (first) domain of the group.
    pub fn canonical(&self) -> &str {
        &self.domains[0]
    }

    /// All domains in configured order, canonical first.
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Always false; a parsed group holds at least one domain.
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl FromStr for DomainGroup {
    type Err = DomainGroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.split(',')).map_err(|_| DomainGroupError::Empty(s.to_string()))
    }
}

impl fmt::Display for DomainGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.domains.join(","))
    }
}

impl Serialize for DomainGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DomainGroup {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Logical secret-store key.
///
/// The store adapter prepends its environment-specific prefix; the
/// reconciliation core only ever deals in these relative keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreKey(String);

impl StoreKey {
    /// Key holding the serialized ACME account identity.
    pub fn account() -> Self {
        Self("account".to_string())
    }

    /// Key holding the PEM-encoded account signing key.
    pub fn key() -> Self {
        Self("key".to_string())
    }

    /// Key holding the certificate bundle for a canonical domain.
    pub fn certificate(canonical_domain: &str) -> Self {
        Self(format!("certificates/{}", canonical_domain))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_group_parse() {
        let group: DomainGroup = "a.com, www.a.com ,,extra.a.com".parse().unwrap();
        assert_eq!(group.canonical(), "a.com");
        assert_eq!(group.domains(), &["a.com", "www.a.com", "extra.a.com"]);
        assert_eq!(group.to_string(), "a.com,www.a.com,extra.a.com");
    }

    #[test]
    fn test_domain_group_single() {
        let group: DomainGroup = "example.com".parse().unwrap();
        assert_eq!(group.canonical(), "example.com");
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_domain_group_empty() {
        assert_eq!(
            " , ".parse::<DomainGroup>(),
            Err(DomainGroupError::Empty(" , ".to_string()))
        );
    }

    #[test]
    fn test_domain_group_serde() {
        let group: DomainGroup = serde_json::from_str("\"a.com,b.a.com\"").unwrap();
        assert_eq!(group.domains(), &["a.com", "b.a.com"]);
        assert_eq!(serde_json::to_string(&group).unwrap(), "\"a.com,b.a.com\"");
    }

    #[test]
    fn test_store_keys() {
        assert_eq!(StoreKey::account().as_str(), "account");
        assert_eq!(StoreKey::key().as_str(), "key");
        assert_eq!(
            StoreKey::certificate("example.com").to_string(),
            "certificates/example.com"
        );
    }
}
