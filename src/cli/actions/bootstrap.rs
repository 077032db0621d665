use anyhow::{bail, Context, Result};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

use crate::{
    identity::{
        bootstrap::create_initial_accounts, credential::Argon2Hasher,
        provisioner::AccountProvisioner, resolver::IdentityResolver,
    },
    settings::Settings,
    store::{memory::MemoryStore, postgres::PostgresStore, AccountStore},
};

#[derive(Debug)]
pub struct Args {
    pub settings: Settings,
}

/// Find or create every configured administrator and manager.
///
/// # Errors
/// Returns an error if the default account type cannot be resolved, the
/// database is unreachable, or any entry failed.
pub async fn execute(args: Args) -> Result<()> {
    let settings = args.settings;
    let registry = super::registry(&settings)?;
    let descriptor = IdentityResolver::new(registry, &settings)
        .resolve_default_type()
        .context("failed to resolve default account type")?;

    if settings.admins.is_empty() && settings.managers.is_empty() {
        warn!("no administrators or managers configured, nothing to bootstrap");
        return Ok(());
    }

    let store: Arc<dyn AccountStore> = match &settings.dsn {
        Some(dsn) => {
            info!(dsn = %redact_dsn(dsn.expose_secret()), "connecting to database");
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(120))
                .test_before_acquire(true)
                .connect(dsn.expose_secret())
                .await
                .context("Failed to connect to database")?;
            Arc::new(PostgresStore::new(pool))
        }
        None => {
            warn!("no DSN configured, accounts are only created in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let provisioner = AccountProvisioner::new(descriptor, store, Arc::new(Argon2Hasher::new()));
    let mut stdout = std::io::stdout();
    let report = create_initial_accounts(
        &provisioner,
        &settings.admins,
        &settings.managers,
        &mut stdout,
    )
    .await
    .context("failed to write bootstrap report")?;

    if report.has_failures() {
        bail!(
            "{} of {} bootstrap entries failed",
            report.failed.len(),
            settings.admins.len() + settings.managers.len()
        );
    }
    Ok(())
}

/// DSN with the password masked, for logging.
fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut url) => {
            if url.password().is_some() && url.set_password(Some("****")).is_err() {
                return "<unprintable dsn>".to_string();
            }
            url.to_string()
        }
        Err(_) => "<unprintable dsn>".to_string(),
    }
}
