//! Idempotent find-or-create provisioning of accounts.
//!
//! `try_create` never mutates an existing account. When it creates one it
//! writes a short report to the supplied writer:
//!
//! ```text
//! Created user account:
//!   email: jane@example.com
//!   password: <generated or supplied credential>
//!   is_staff: true
//! ```
//!
//! `create_user` and `create_superuser` are the plain creation paths: no
//! lookup, no report, staff and superuser flags forced.

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::{io::Write, sync::Arc};
use tracing::{debug, info, instrument};

use super::{
    attributes::{AttrValue, Attributes},
    base::Account,
    credential::{generate_credential, SecretHasher},
    descriptor::{AccountTypeDescriptor, BASE_FLAGS, ID_FIELD},
    error::{ProvisionError, ValidationError},
};
use crate::store::AccountStore;

/// Attribute carrying a caller-chosen credential.
pub const PASSWORD_ATTRIBUTE: &str = "password";

/// Attributes after derivation, with the identity value split out.
#[derive(Debug, Clone)]
pub struct Prepared {
    identity_value: String,
    attributes: Attributes,
}

impl Prepared {
    #[must_use]
    pub fn identity_value(&self) -> &str {
        &self.identity_value
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

#[derive(Clone)]
pub struct AccountProvisioner {
    descriptor: Arc<AccountTypeDescriptor>,
    store: Arc<dyn AccountStore>,
    hasher: Arc<dyn SecretHasher>,
}

impl AccountProvisioner {
    #[must_use]
    pub fn new(
        descriptor: Arc<AccountTypeDescriptor>,
        store: Arc<dyn AccountStore>,
        hasher: Arc<dyn SecretHasher>,
    ) -> Self {
        Self {
            descriptor,
            store,
            hasher,
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> &Arc<AccountTypeDescriptor> {
        &self.descriptor
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    /// Run the descriptor's derivations in order, then split off the identity value.
    ///
    /// # Errors
    /// `ValidationError::MissingField` when no identity value is present after
    /// derivation, `InvalidField` when it is empty; derivation failures otherwise.
    pub async fn prepare(&self, mut attributes: Attributes) -> Result<Prepared, ProvisionError> {
        let descriptor = self.descriptor.as_ref();
        for derivation in descriptor.derivations() {
            derivation
                .derive(descriptor, &mut attributes, self.store.as_ref())
                .await?;
        }

        let field = descriptor.identity_field();
        let identity_value = match attributes.take(field) {
            None => return Err(ValidationError::missing(field).into()),
            Some(AttrValue::Flag(_)) => {
                return Err(ValidationError::invalid(field, "expected text, got a flag").into())
            }
            Some(value) => value.to_string(),
        };
        if identity_value.trim().is_empty() {
            return Err(ValidationError::invalid(field, "must not be empty").into());
        }
        Ok(Prepared {
            identity_value,
            attributes,
        })
    }

    /// Find the account identified by `attributes`, or create it.
    ///
    /// Returns the account and `true` when it was created.
    ///
    /// # Errors
    /// Validation errors before any write, store errors (including
    /// `StoreError::Integrity`) unchanged, hashing or output failures.
    pub async fn try_create<W>(
        &self,
        attributes: Attributes,
        out: &mut W,
    ) -> Result<(Account, bool), ProvisionError>
    where
        W: Write + ?Sized,
    {
        let prepared = self.prepare(attributes).await?;
        self.try_create_prepared(prepared, out).await
    }

    /// [`AccountProvisioner::try_create`] for attributes already run through
    /// [`AccountProvisioner::prepare`].
    ///
    /// # Errors
    /// Same as [`AccountProvisioner::try_create`].
    #[instrument(
        skip(self, prepared, out),
        fields(account_type = %self.descriptor.key(), identity = %prepared.identity_value)
    )]
    pub async fn try_create_prepared<W>(
        &self,
        prepared: Prepared,
        out: &mut W,
    ) -> Result<(Account, bool), ProvisionError>
    where
        W: Write + ?Sized,
    {
        let Prepared {
            identity_value,
            mut attributes,
        } = prepared;

        let credential = match attributes.take(PASSWORD_ATTRIBUTE) {
            Some(value) => SecretString::from(value.to_string()),
            None => generate_credential(),
        };

        if let Some(existing) = self.find_existing(&identity_value, &attributes).await? {
            debug!(id = ?existing.id(), "account already exists");
            return Ok((existing, false));
        }

        let (account, applied) = self
            .persist_new(&identity_value, &attributes, &credential)
            .await?;

        let mut report = vec![
            "Created user account:".to_string(),
            format!(
                "  {}: {}",
                self.descriptor.identity_field(),
                account.identity_value().unwrap_or_default()
            ),
            format!("  password: {}", credential.expose_secret()),
        ];
        report.extend(
            applied
                .iter()
                .map(|(key, value)| format!("  {key}: {value}")),
        );
        writeln!(out, "{}", report.join("\n"))?;

        info!(id = ?account.id(), "created account");
        Ok((account, true))
    }

    /// Create a regular account. `is_staff` and `is_superuser` are forced off.
    ///
    /// Unlike [`AccountProvisioner::try_create`] this never looks for an
    /// existing account: a taken identity is a `StoreError::Integrity`.
    ///
    /// # Errors
    /// Validation, store and hashing errors.
    pub async fn create_user(
        &self,
        password: &SecretString,
        attributes: Attributes,
    ) -> Result<Account, ProvisionError> {
        self.create_with_flags(password, attributes, false).await
    }

    /// Create an account with `is_staff` and `is_superuser` forced on.
    ///
    /// # Errors
    /// Same as [`AccountProvisioner::create_user`].
    pub async fn create_superuser(
        &self,
        password: &SecretString,
        attributes: Attributes,
    ) -> Result<Account, ProvisionError> {
        self.create_with_flags(password, attributes, true).await
    }

    #[instrument(skip(self, password, attributes), fields(account_type = %self.descriptor.key()))]
    async fn create_with_flags(
        &self,
        password: &SecretString,
        mut attributes: Attributes,
        privileged: bool,
    ) -> Result<Account, ProvisionError> {
        let _ = attributes.take(PASSWORD_ATTRIBUTE);
        attributes.set("is_staff", privileged);
        attributes.set("is_superuser", privileged);

        let Prepared {
            identity_value,
            attributes,
        } = self.prepare(attributes).await?;
        let (account, _) = self
            .persist_new(&identity_value, &attributes, password)
            .await?;

        info!(id = ?account.id(), privileged, "created account");
        Ok(account)
    }

    /// Existing account by identity value, then by the descriptor's natural key.
    async fn find_existing(
        &self,
        identity_value: &str,
        attributes: &Attributes,
    ) -> Result<Option<Account>, ProvisionError> {
        let descriptor = self.descriptor.as_ref();
        if let Some(existing) = self
            .store
            .find_by_identity(descriptor, identity_value)
            .await?
        {
            return Ok(Some(existing));
        }

        let Some((field, mode)) = descriptor.natural_key() else {
            return Ok(None);
        };
        let Some(value) = attributes
            .get_text(field)
            .filter(|value| !value.trim().is_empty())
        else {
            return Ok(None);
        };
        Ok(self
            .store
            .find_by_field(descriptor, field, value, mode)
            .await?)
    }

    /// Validate, build, hash and persist a new account.
    ///
    /// Returns the stored account and the applied `(attribute, value)` pairs
    /// in input order.
    async fn persist_new(
        &self,
        identity_value: &str,
        attributes: &Attributes,
        credential: &SecretString,
    ) -> Result<(Account, Vec<(String, String)>), ProvisionError> {
        let descriptor = self.descriptor.as_ref();
        validate(descriptor, identity_value, attributes)?;

        let mut account = Account::new(descriptor);
        if descriptor.identity_is_surrogate() {
            account.base.id = identity_value.trim().parse().ok();
        } else {
            account.fields.insert(
                descriptor.identity_field().to_string(),
                identity_value.to_string(),
            );
        }

        let mut applied: Vec<(String, String)> = Vec::new();
        for (key, value) in attributes.iter() {
            if !descriptor.knows_field(key) {
                debug!(attribute = key, "ignoring attribute unknown to account type");
                continue;
            }
            match (key, value) {
                ("is_active", AttrValue::Flag(flag)) => account.base.is_active = *flag,
                ("is_staff", AttrValue::Flag(flag)) => account.base.is_staff = *flag,
                ("is_superuser", AttrValue::Flag(flag)) => account.base.is_superuser = *flag,
                _ => {
                    account.fields.insert(key.to_string(), value.to_string());
                }
            }
            applied.push((key.to_string(), value.to_string()));
        }

        account.base.set_secret(self.hasher.as_ref(), credential)?;
        let account = self.store.insert(descriptor, account).await?;
        Ok((account, applied))
    }
}

/// Required fields and field formats, checked before anything is written.
fn validate(
    descriptor: &AccountTypeDescriptor,
    identity_value: &str,
    attributes: &Attributes,
) -> Result<(), ValidationError> {
    if descriptor.identity_is_surrogate() && identity_value.trim().parse::<i64>().is_err() {
        return Err(ValidationError::invalid(ID_FIELD, "must be an integer"));
    }

    for field in descriptor.required_fields() {
        if field != descriptor.identity_field() && !attributes.contains(field) {
            return Err(ValidationError::missing(field));
        }
    }

    for (key, value) in attributes.iter() {
        if !descriptor.knows_field(key) {
            continue;
        }
        if BASE_FLAGS.contains(&key) {
            if value.as_flag().is_none() {
                return Err(ValidationError::invalid(key, "expected a boolean"));
            }
        } else if value.as_flag().is_some() {
            return Err(ValidationError::invalid(key, "expected text, got a flag"));
        }
    }

    let field_value = |name: &str| -> Option<String> {
        if name == descriptor.identity_field() {
            Some(identity_value.to_string())
        } else {
            attributes.get(name).map(ToString::to_string)
        }
    };

    if descriptor.knows_field("email") {
        if let Some(email) = field_value("email") {
            if !is_valid_email(&email) {
                return Err(ValidationError::invalid("email", "enter a valid email address"));
            }
        }
    }
    if descriptor.knows_field("username") {
        if let Some(username) = field_value("username") {
            if !is_valid_username(&username) {
                return Err(ValidationError::invalid(
                    "username",
                    "may contain only letters, digits and @/./+/-/_ characters",
                ));
            }
        }
    }
    Ok(())
}

#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

#[must_use]
pub fn is_valid_username(username: &str) -> bool {
    Regex::new(r"^[\w.@+-]+$").is_ok_and(|re| re.is_match(username))
}
