//! Certificate orders through instant-acme

use std::time::Duration;

use instant_acme::{
    Account, AccountCredentials, AuthorizationStatus, ChallengeType, Identifier, NewOrder, Order,
    OrderStatus,
};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::account::AccountIdentity;
use super::dns::{self, ChallengeSolver, Dns01Challenge, PropagationChecker};
use super::error::AcmeError;
use super::{IssuedCertificate, ObtainRequest};

const ORDER_READY_TIMEOUT: Duration = Duration::from_secs(300);
const CERTIFICATE_TIMEOUT: Duration = Duration::from_secs(120);
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const END_CERTIFICATE: &str = "-----END CERTIFICATE-----";

pub(super) async fn obtain(
    directory_url: &str,
    identity: &AccountIdentity,
    request: &ObtainRequest,
) -> Result<IssuedCertificate, AcmeError> {
    let provider = dns::create_provider(&request.challenge_provider)?;
    let propagation = if request.propagation_required {
        Some(PropagationChecker::for_address(&request.dns_resolver).await?)
    } else {
        None
    };
    let solver = ChallengeSolver::new(provider, propagation);

    let credentials: AccountCredentials =
        serde_json::from_value(identity.order_credentials(directory_url)?)
            .map_err(|e| AcmeError::Key(format!("failed to restore account credentials: {}", e)))?;
    let account = Account::from_credentials(credentials).await?;

    info!(domains = ?request.domains, "Creating certificate order");
    let identifiers: Vec<Identifier> = request
        .domains
        .iter()
        .map(|d| Identifier::Dns(d.clone()))
        .collect();
    let mut order = account
        .new_order(&NewOrder {
            identifiers: &identifiers,
        })
        .await?;

    let mut challenges = pending_challenges(&mut order).await?;
    let outcome = complete_order(&mut order, &solver, &mut challenges, &request.domains).await;

    for challenge in &challenges {
        solver.cleanup(challenge).await;
    }

    outcome
}

/// DNS-01 challenges for every authorization that still needs one
async fn pending_challenges(order: &mut Order) -> Result<Vec<Dns01Challenge>, AcmeError> {
    let authorizations = order.authorizations().await?;
    let mut challenges = Vec::with_capacity(authorizations.len());

    for authorization in &authorizations {
        let domain = match &authorization.identifier {
            Identifier::Dns(domain) => domain.clone(),
            #[allow(unreachable_patterns)]
            _ => continue,
        };

        match &authorization.status {
            AuthorizationStatus::Pending => {}
            AuthorizationStatus::Valid => {
                debug!(domain = %domain, "Authorization already valid");
                continue;
            }
            status => {
                return Err(AcmeError::Challenge {
                    domain,
                    message: format!("authorization is {:?}", status),
                })
            }
        }

        let challenge = authorization
            .challenges
            .iter()
            .find(|c| c.r#type == ChallengeType::Dns01)
            .ok_or_else(|| AcmeError::Challenge {
                domain: domain.clone(),
                message: "server offered no dns-01 challenge".to_string(),
            })?;

        let key_authorization = order.key_authorization(challenge);
        challenges.push(Dns01Challenge::new(
            &domain,
            key_authorization.as_str(),
            &challenge.url,
        ));
    }

    Ok(challenges)
}

async fn complete_order(
    order: &mut Order,
    solver: &ChallengeSolver,
    challenges: &mut [Dns01Challenge],
    domains: &[String],
) -> Result<IssuedCertificate, AcmeError> {
    for challenge in challenges.iter_mut() {
        solver.present(challenge).await?;
    }
    for challenge in challenges.iter() {
        solver.wait_visible(challenge).await?;
    }
    for challenge in challenges.iter() {
        order
            .set_challenge_ready(&challenge.url)
            .await
            .map_err(|e| AcmeError::Challenge {
                domain: challenge.domain.clone(),
                message: e.to_string(),
            })?;
    }

    wait_for_ready(order, domains).await?;

    let (csr, private_key) = certificate_request(domains)?;
    order.finalize(&csr).await?;
    let certificate = wait_for_certificate(order).await?;
    let issuer_certificate = issuer_chain(&certificate)?;

    info!(domains = ?domains, "Certificate issued");
    Ok(IssuedCertificate {
        domains: domains.to_vec(),
        certificate,
        issuer_certificate,
        private_key,
    })
}

async fn wait_for_ready(order: &mut Order, domains: &[String]) -> Result<(), AcmeError> {
    let deadline = Instant::now() + ORDER_READY_TIMEOUT;

    loop {
        let state = order.refresh().await?;
        match state.status {
            OrderStatus::Ready | OrderStatus::Valid => return Ok(()),
            OrderStatus::Invalid => {
                return Err(AcmeError::Challenge {
                    domain: domains.join(","),
                    message: "order became invalid during validation".to_string(),
                })
            }
            OrderStatus::Pending | OrderStatus::Processing => {}
        }

        if Instant::now() >= deadline {
            return Err(AcmeError::Timeout(format!(
                "order for {} not ready after {}s",
                domains.join(","),
                ORDER_READY_TIMEOUT.as_secs()
            )));
        }
        sleep(POLL_INTERVAL).await;
    }
}

async fn wait_for_certificate(order: &mut Order) -> Result<String, AcmeError> {
    let deadline = Instant::now() + CERTIFICATE_TIMEOUT;

    loop {
        if let Some(chain) = order.certificate().await? {
            return Ok(chain);
        }
        if order.state().status == OrderStatus::Invalid {
            return Err(AcmeError::Issuance(
                "order became invalid after finalization".to_string(),
            ));
        }
        if Instant::now() >= deadline {
            return Err(AcmeError::Timeout(format!(
                "certificate not available after {}s",
                CERTIFICATE_TIMEOUT.as_secs()
            )));
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// CSR in DER plus the PEM private key it was generated with
fn certificate_request(domains: &[String]) -> Result<(Vec<u8>, String), AcmeError> {
    let key = KeyPair::generate()
        .map_err(|e| AcmeError::Issuance(format!("failed to generate certificate key: {}", e)))?;

    let mut params = CertificateParams::new(domains.to_vec())
        .map_err(|e| AcmeError::Issuance(format!("invalid certificate names: {}", e)))?;
    let mut name = DistinguishedName::new();
    if let Some(canonical) = domains.first() {
        name.push(DnType::CommonName, canonical.clone());
    }
    params.distinguished_name = name;

    let csr = params
        .serialize_request(&key)
        .map_err(|e| AcmeError::Issuance(format!("failed to create CSR: {}", e)))?;

    Ok((csr.der().to_vec(), key.serialize_pem()))
}

/// Everything after the leaf certificate in a PEM chain
fn issuer_chain(chain: &str) -> Result<String, AcmeError> {
    let end = chain.find(END_CERTIFICATE).ok_or_else(|| {
        AcmeError::Issuance("downloaded chain contains no certificate".to_string())
    })?;

    let issuer = chain[end + END_CERTIFICATE.len()..].trim_start();
    if issuer.is_empty() {
        warn!("Downloaded chain has no issuer certificate");
    }
    Ok(issuer.to_string())
}
