//! ACME error types

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

use super::dns::DnsProviderError;

const ACCOUNT_DOES_NOT_EXIST: &str = "urn:ietf:params:acme:error:accountDoesNotExist";

/// RFC 7807 problem document returned by an ACME server
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Problem {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub detail: String,
}

impl Problem {
    pub fn is_account_does_not_exist(&self) -> bool {
        self.kind == ACCOUNT_DOES_NOT_EXIST
    }

    pub fn is_bad_nonce(&self) -> bool {
        self.kind.ends_with(":badNonce")
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind.is_empty(), self.detail.is_empty()) {
            (true, true) => write!(f, "no problem details"),
            (false, true) => write!(f, "{}", self.kind),
            (true, false) => write!(f, "{}", self.detail),
            (false, false) => write!(f, "{} ({})", self.detail, self.kind),
        }
    }
}

/// Errors that can occur during ACME operations
#[derive(Debug, Error)]
pub enum AcmeError {
    /// Request could not be sent or its response read
    #[error("HTTP request to ACME server failed: {0}")]
    Http(String),

    /// Directory document missing or unusable
    #[error("ACME directory at '{url}' is unusable: {message}")]
    Directory { url: String, message: String },

    /// Server failed or answered without a problem document
    #[error("ACME server at '{url}' is unavailable: HTTP {status}")]
    Unavailable { url: String, status: u16 },

    /// Server answered with a problem document
    #[error("ACME server rejected request to '{url}' with HTTP {status}: {problem}")]
    Rejected {
        url: String,
        status: u16,
        problem: Problem,
    },

    /// No account on the server is bound to the presented key
    #[error("no ACME account exists for this key")]
    AccountDoesNotExist,

    /// Account exists but is deactivated or revoked
    #[error("ACME account '{uri}' has status '{status}'")]
    AccountNotValid { uri: String, status: String },

    /// Identity carries no registration reference
    #[error("ACME account identity has no registration")]
    NoRegistration,

    /// Account key could not be generated, parsed or used
    #[error("account key error: {0}")]
    Key(String),

    /// Domain validation failed
    #[error("challenge failed for domain '{domain}': {message}")]
    Challenge { domain: String, message: String },

    /// Order or finalization failed
    #[error("certificate issuance failed: {0}")]
    Issuance(String),

    /// DNS provider operation failed
    #[error("DNS provider error: {0}")]
    Dns(#[from] DnsProviderError),

    /// Order polling deadline passed
    #[error("operation timed out: {0}")]
    Timeout(String),
}

impl AcmeError {
    /// Whether the authority positively refused the account
    ///
    /// Transport failures and server outages are not refusals; the account
    /// may be fine.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AcmeError::Rejected { .. }
                | AcmeError::AccountDoesNotExist
                | AcmeError::AccountNotValid { .. }
                | AcmeError::NoRegistration
        )
    }
}

impl From<reqwest::Error> for AcmeError {
    fn from(e: reqwest::Error) -> Self {
        AcmeError::Http(e.to_string())
    }
}

impl From<instant_acme::Error> for AcmeError {
    fn from(e: instant_acme::Error) -> Self {
        AcmeError::Issuance(e.to_string())
    }
}
