//! Certsteward - Main entry point
//!
//! Reconciles the ACME account, then renews every configured domain group
//! whose certificate is missing, changed or close to expiry.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use certsteward::{
    logging, AccountReconciler, AcmeClient, ChallengeSettings, DirectoryClient, FileStore,
    RenewalDriver, RenewalPolicy, SecretStore, VaultStore,
};
use certsteward_config::{Config, StoreBackend};

/// Certsteward - ACME certificate renewal into a secret store
#[derive(Parser, Debug)]
#[command(name = "certsteward")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile the account and renew certificates (default)
    Run,
    /// Validate configuration and exit
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Check => check_config(),
        Commands::Run => run(cli.verbose),
    }
}

/// Load and validate configuration, printing every finding
fn check_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let result = config.validate();

    for warning in &result.warnings {
        println!("warning: {}", warning);
    }
    for error in &result.errors {
        println!("error: {}", error);
    }

    if !result.is_valid() {
        bail!("configuration has {} error(s)", result.errors.len());
    }

    println!(
        "certsteward: configuration is valid ({} domain group(s))",
        config.domains.len()
    );
    Ok(())
}

fn run(verbose: bool) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    logging::init(&config.log, verbose)?;

    let result = config.validate();
    for warning in &result.warnings {
        warn!(warning = %warning, "Configuration warning");
    }
    if !result.is_valid() {
        let errors: Vec<String> = result.errors.iter().map(ToString::to_string).collect();
        bail!("Invalid configuration: {}", errors.join("; "));
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;

    runtime.block_on(reconcile(config))
}

async fn reconcile(config: Config) -> Result<()> {
    let store = open_store(&config).await?;
    let client: Arc<dyn AcmeClient> = Arc::new(
        DirectoryClient::new(&config.acme.server_url).context("Failed to create ACME client")?,
    );

    info!(
        server = %config.acme.server_url,
        email = %config.acme.account_email,
        "Reconciling ACME account"
    );
    let account = AccountReconciler::new(
        Arc::clone(&store),
        client,
        &config.acme.account_email,
        config.acme.reregister_account,
    )
    .ensure_account()
    .await
    .context("Failed to reconcile ACME account")?;

    let driver = RenewalDriver::new(
        store,
        account,
        RenewalPolicy::new(config.renew_before_days),
        ChallengeSettings {
            provider: config.acme.dns_challenge_provider.clone(),
            propagation_required: config.acme.dns_propagation_requirement,
            dns_resolver: config.dns_address.clone(),
        },
    );

    let report = driver.run(&config.domains).await;
    report.into_result()?;
    Ok(())
}

async fn open_store(config: &Config) -> Result<Arc<dyn SecretStore>> {
    Ok(match config.store.backend {
        StoreBackend::Vault => {
            info!(address = %config.vault.address, "Using Vault secret store");
            Arc::new(
                VaultStore::login(&config.vault, config.is_dev())
                    .await
                    .context("Failed to log in to Vault")?,
            )
        }
        StoreBackend::File => {
            info!(path = %config.store.file_path.display(), "Using file secret store");
            Arc::new(
                FileStore::new(&config.store.file_path)
                    .await
                    .context("Failed to open file secret store")?,
            )
        }
    })
}
