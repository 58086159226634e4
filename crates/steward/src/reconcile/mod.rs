//! Certificate lifecycle reconciliation
//!
//! - [`account`] keeps the stored ACME account consistent with the authority
//! - [`decision`] decides whether a stored certificate must be reissued
//! - [`driver`] applies the decision to every configured domain group

pub mod account;
pub mod certificate;
pub mod decision;
pub mod driver;

pub use account::{
    plan_recovery, AccountError, AccountReconciler, AccountState, ReadyAccount, Transition,
};
pub use certificate::{
    load_certificate, store_certificate, CertificateError, CertificateRecord, CertificateView,
    StoredCertificate,
};
pub use decision::{decide, days_remaining, ReissueReason, RenewalPolicy, Verdict};
pub use driver::{ChallengeSettings, RenewalDriver, RenewalError, RunReport};
