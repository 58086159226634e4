//! External program DNS provider
//!
//! Runs `<program> present <fqdn> <value>` to publish a record and
//! `<program> cleanup <fqdn> <value>` to remove it. The FQDN is passed with a
//! trailing dot. A non-zero exit status is an error.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::acme::dns::provider::{DnsProvider, DnsProviderError, DnsResult, TxtRecord};

/// Provider delegating record changes to an external program
#[derive(Debug)]
pub struct ExecProvider {
    program: PathBuf,
}

impl ExecProvider {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, action: &str, record: &TxtRecord) -> Result<(), String> {
        let fqdn = format!("{}.", record.fqdn.trim_end_matches('.'));

        debug!(
            program = %self.program.display(),
            action = %action,
            record = %fqdn,
            "Running DNS exec provider"
        );

        let output = Command::new(&self.program)
            .arg(action)
            .arg(&fqdn)
            .arg(&record.value)
            .output()
            .await
            .map_err(|e| format!("failed to run '{}': {}", self.program.display(), e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(format!(
                "'{}' exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }
}

#[async_trait]
impl DnsProvider for ExecProvider {
    fn name(&self) -> &'static str {
        "exec"
    }

    async fn create_txt_record(&self, record: &TxtRecord) -> DnsResult<String> {
        self.run("present", record)
            .await
            .map_err(|message| DnsProviderError::RecordCreation {
                fqdn: record.fqdn.clone(),
                message,
            })?;
        Ok(record.fqdn.clone())
    }

    async fn delete_txt_record(&self, record: &TxtRecord, _record_id: &str) -> DnsResult<()> {
        self.run("cleanup", record)
            .await
            .map_err(|message| DnsProviderError::RecordDeletion {
                fqdn: record.fqdn.clone(),
                message,
            })
    }
}
