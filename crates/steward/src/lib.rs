//! Certsteward library
//!
//! Renews TLS certificates for a list of domain groups using an ACME
//! certificate authority, keeping the account and the certificates in a
//! secret store.
//!
//! - **Reconciliation**: account consistency and renewal decisions
//!   ([`reconcile`])
//! - **ACME**: account operations, DNS-01 orders and challenge providers
//!   ([`acme`])
//! - **Secret storage**: Vault KV v2, local files, in-memory ([`store`])
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use certsteward::{AccountReconciler, DirectoryClient, MemoryStore};
//!
//! let store = Arc::new(MemoryStore::new());
//! let client = Arc::new(DirectoryClient::new(directory_url)?);
//! let account = AccountReconciler::new(store, client, "ops@example.com", true)
//!     .ensure_account()
//!     .await?;
//! ```

pub mod acme;
pub mod logging;
pub mod reconcile;
pub mod store;

pub use acme::{AcmeClient, AcmeError, DirectoryClient, IssuedCertificate, ObtainRequest};
pub use reconcile::{
    AccountError, AccountReconciler, ChallengeSettings, ReadyAccount, RenewalDriver,
    RenewalError, RenewalPolicy, RunReport,
};
pub use store::{FileStore, MemoryStore, SecretStore, StoreError, VaultStore};
