//! Bootstrap of the configured administrator and manager accounts.

use serde::Serialize;
use std::{collections::HashSet, io::Write};
use tracing::{error, info, warn};

use super::{attributes::Attributes, error::ProvisionError, provisioner::AccountProvisioner};
use crate::settings::Contact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Administrator,
    Manager,
}

impl Role {
    /// Base flags granted to accounts bootstrapped with this role.
    #[must_use]
    pub fn attributes(self, contact: &Contact) -> Attributes {
        let attributes = Attributes::new()
            .with("name", contact.name.as_str())
            .with("email", contact.email.as_str())
            .with("is_staff", true);
        match self {
            Self::Administrator => attributes.with("is_superuser", true),
            Self::Manager => attributes,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
    /// Entries repeating a contact address or identity already handled in this run.
    pub skipped: Vec<String>,
    /// `(identity or contact, error message)`.
    pub failed: Vec<(String, String)>,
}

impl BootstrapReport {
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Provision every administrator, then every manager.
///
/// Entries whose contact address (case-insensitive) or identity was already
/// handled earlier in the run are skipped, so someone listed as both
/// administrator and manager keeps administrator flags. A failing entry is
/// logged and recorded; later entries still run.
///
/// # Errors
/// Only fails when the report cannot be written to `out`.
pub async fn create_initial_accounts<W>(
    provisioner: &AccountProvisioner,
    admins: &[Contact],
    managers: &[Contact],
    out: &mut W,
) -> std::io::Result<BootstrapReport>
where
    W: Write + ?Sized,
{
    let mut report = BootstrapReport::default();
    let mut seen_contacts: HashSet<String> = HashSet::new();
    let mut seen: HashSet<String> = HashSet::new();
    let identity_match = provisioner.descriptor().identity_match();

    let entries = admins
        .iter()
        .map(|contact| (Role::Administrator, contact))
        .chain(managers.iter().map(|contact| (Role::Manager, contact)));

    for (role, contact) in entries {
        if !seen_contacts.insert(contact.email.to_lowercase()) {
            warn!(contact = %contact, ?role, "skipping duplicate bootstrap contact");
            report.skipped.push(contact.email.clone());
            continue;
        }

        let prepared = match provisioner.prepare(role.attributes(contact)).await {
            Ok(prepared) => prepared,
            Err(err) => {
                error!(contact = %contact, ?role, "failed to prepare account: {err}");
                report.failed.push((contact.to_string(), err.to_string()));
                continue;
            }
        };

        let identity = prepared.identity_value().to_string();
        if !seen.insert(identity_match.canonical(&identity)) {
            warn!(identity = %identity, ?role, "skipping duplicate bootstrap entry");
            report.skipped.push(identity);
            continue;
        }

        match provisioner.try_create_prepared(prepared, out).await {
            Ok((account, true)) => {
                let identity = account.identity_value().unwrap_or(identity);
                report.created.push(identity);
            }
            Ok((account, false)) => {
                let identity = account.identity_value().unwrap_or(identity);
                info!(identity = %identity, ?role, "bootstrap account already exists");
                report.existing.push(identity);
            }
            Err(ProvisionError::Output(err)) => return Err(err),
            Err(err) => {
                error!(identity = %identity, ?role, "failed to create account: {err}");
                report.failed.push((identity, err.to_string()));
            }
        }
    }

    info!(
        created = report.created.len(),
        existing = report.existing.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "bootstrap finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        identity::{
            credential::Argon2Hasher,
            derive::NameParts,
            descriptor::{AccountTypeDescriptor, IdentityMatch, TypeKey},
        },
        store::{memory::MemoryStore, AccountStore},
    };
    use std::sync::Arc;

    fn contact(name: &str, email: &str) -> Contact {
        Contact {
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    fn provisioner() -> (AccountProvisioner, Arc<MemoryStore>) {
        let descriptor = Arc::new(
            AccountTypeDescriptor::new(
                TypeKey::new("polyauth_email", "EmailUser"),
                "e::EmailUser",
                "email",
            )
            .with_identity_match(IdentityMatch::CaseInsensitive)
            .with_required_fields(&["first_name", "last_name"])
            .with_derivation(Arc::new(NameParts)),
        );
        let store = Arc::new(MemoryStore::new());
        (
            AccountProvisioner::new(descriptor, store.clone(), Arc::new(Argon2Hasher::new())),
            store,
        )
    }

    #[tokio::test]
    async fn admins_and_managers_get_flags() {
        let (provisioner, store) = provisioner();
        let mut out = Vec::new();
        let report = create_initial_accounts(
            &provisioner,
            &[contact("Ada Admin", "ada@example.com")],
            &[contact("Max Manager", "max@example.com")],
            &mut out,
        )
        .await
        .expect("bootstrap");

        assert_eq!(report.created, vec!["ada@example.com", "max@example.com"]);
        let descriptor = provisioner.descriptor();
        let ada = store
            .find_by_identity(descriptor, "ada@example.com")
            .await
            .expect("find")
            .expect("ada");
        assert!(ada.base.is_staff && ada.base.is_superuser);
        let max = store
            .find_by_identity(descriptor, "max@example.com")
            .await
            .expect("find")
            .expect("max");
        assert!(max.base.is_staff && !max.base.is_superuser);

        let output = String::from_utf8_lossy(&out);
        assert_eq!(output.matches("Created user account:").count(), 2);
    }

    #[tokio::test]
    async fn duplicate_entries_are_skipped() {
        let (provisioner, store) = provisioner();
        let mut out = Vec::new();
        let report = create_initial_accounts(
            &provisioner,
            &[contact("Ada Admin", "ada@example.com")],
            &[contact("Ada Again", "ADA@example.com")],
            &mut out,
        )
        .await
        .expect("bootstrap");

        assert_eq!(report.created.len(), 1);
        assert_eq!(report.skipped, vec!["ADA@example.com"]);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn second_run_is_idempotent() {
        let (provisioner, store) = provisioner();
        let admins = [contact("Ada Admin", "ada@example.com")];
        create_initial_accounts(&provisioner, &admins, &[], &mut Vec::new())
            .await
            .expect("first");

        let mut out = Vec::new();
        let report = create_initial_accounts(&provisioner, &admins, &[], &mut out)
            .await
            .expect("second");
        assert_eq!(report.existing, vec!["ada@example.com"]);
        assert!(out.is_empty());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn failures_do_not_stop_later_entries() {
        let (provisioner, _store) = provisioner();
        let report = create_initial_accounts(
            &provisioner,
            &[contact("Bad Address", "not-an-email")],
            &[contact("Max Manager", "max@example.com")],
            &mut Vec::new(),
        )
        .await
        .expect("bootstrap");

        assert!(report.has_failures());
        assert_eq!(report.failed[0].0, "not-an-email");
        assert_eq!(report.created, vec!["max@example.com"]);
    }

    #[tokio::test]
    async fn id_accounts_bootstrap_once() {
        let store = Arc::new(MemoryStore::new());
        let provisioner = AccountProvisioner::new(
            Arc::new(crate::usertypes::id::descriptor()),
            store.clone(),
            Arc::new(Argon2Hasher::new()),
        );
        let managers = [
            contact("Max", "max@example.com"),
            contact("Max", "max@example.com"),
        ];

        let mut out = Vec::new();
        let first = create_initial_accounts(&provisioner, &[], &managers, &mut out)
            .await
            .expect("first");
        assert_eq!(first.created, vec!["1"]);
        assert_eq!(first.skipped, vec!["max@example.com"]);
        assert_eq!(
            String::from_utf8_lossy(&out)
                .matches("Created user account:")
                .count(),
            1
        );

        let mut out = Vec::new();
        let second = create_initial_accounts(&provisioner, &[], &managers, &mut out)
            .await
            .expect("second");
        assert!(second.created.is_empty());
        assert_eq!(second.existing, vec!["1"]);
        assert!(out.is_empty());
        assert_eq!(store.len().await, 1);

        let max = store
            .find_by_id(provisioner.descriptor(), 1)
            .await
            .expect("find")
            .expect("max");
        assert_eq!(max.email(), Some("max@example.com"));
        assert!(max.base.is_staff);
    }
}
