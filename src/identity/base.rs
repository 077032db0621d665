//! The polymorphic base identity shared by every concrete account type.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::{collections::BTreeMap, fmt};

use super::{
    credential::{HashError, SecretHasher},
    descriptor::{AccountTypeDescriptor, Capability, TypeKey, ID_FIELD},
};
use crate::email::{EmailMessage, EmailSender};

/// Columns of the base identity row.
#[derive(Debug, Clone)]
pub struct BaseIdentity {
    /// Surrogate key, `None` until the store has persisted the row.
    pub id: Option<i64>,
    pub secret: SecretString,
    pub last_login: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    created_at: DateTime<Utc>,
}

impl BaseIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: None,
            secret: SecretString::default(),
            last_login: None,
            is_active: true,
            is_staff: false,
            is_superuser: false,
            created_at: Utc::now(),
        }
    }

    /// Rebuild a persisted row; used by store implementations.
    #[must_use]
    pub fn restore(id: i64, secret: SecretString, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Some(id),
            secret,
            created_at,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Replace the stored secret with the hash of `raw`.
    ///
    /// # Errors
    /// Returns `HashError` if the hasher fails.
    pub fn set_secret(
        &mut self,
        hasher: &dyn SecretHasher,
        raw: &SecretString,
    ) -> Result<(), HashError> {
        self.secret = hasher.set_secret(raw)?;
        Ok(())
    }

    #[must_use]
    pub fn check_secret(&self, hasher: &dyn SecretHasher, raw: &SecretString) -> bool {
        hasher.verify_secret(raw, &self.secret)
    }

    pub fn record_login(&mut self, at: DateTime<Utc>) {
        self.last_login = Some(at);
    }
}

impl Default for BaseIdentity {
    fn default() -> Self {
        Self::new()
    }
}

/// A base identity row joined with exactly one extension row.
///
/// `account_type` is the stored discriminator selecting the extension.
#[derive(Debug, Clone)]
pub struct Account {
    pub base: BaseIdentity,
    pub account_type: TypeKey,
    identity_field: String,
    pub fields: BTreeMap<String, String>,
}

impl Account {
    #[must_use]
    pub fn new(descriptor: &AccountTypeDescriptor) -> Self {
        Self::from_parts(BaseIdentity::new(), descriptor, BTreeMap::new())
    }

    #[must_use]
    pub fn from_parts(
        base: BaseIdentity,
        descriptor: &AccountTypeDescriptor,
        fields: BTreeMap<String, String>,
    ) -> Self {
        Self {
            base,
            account_type: descriptor.key().clone(),
            identity_field: descriptor.identity_field().to_string(),
            fields,
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<i64> {
        self.base.id
    }

    #[must_use]
    pub fn identity_field(&self) -> &str {
        &self.identity_field
    }

    /// Value of the identity field, the login name of this account.
    #[must_use]
    pub fn identity_value(&self) -> Option<String> {
        if self.identity_field == ID_FIELD {
            self.base.id.map(|id| id.to_string())
        } else {
            self.fields.get(&self.identity_field).cloned()
        }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.field("email")
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.field("username")
    }

    /// First and last name separated by a space, or the identity value when
    /// the account carries no names.
    #[must_use]
    pub fn full_name(&self) -> String {
        let first = self.field("first_name").unwrap_or_default();
        let last = self.field("last_name").unwrap_or_default();
        let full = format!("{first} {last}").trim().to_string();
        if full.is_empty() {
            self.identity_value().unwrap_or_default()
        } else {
            full
        }
    }

    #[must_use]
    pub fn short_name(&self) -> String {
        match self.field("first_name") {
            Some(first) if !first.is_empty() => first.to_string(),
            _ => self.identity_value().unwrap_or_default(),
        }
    }

    /// Send an email to this account's address.
    ///
    /// # Errors
    /// Returns an error if the account type has no email capability, the
    /// account has no address, or the sender fails.
    pub fn email_user(
        &self,
        descriptor: &AccountTypeDescriptor,
        sender: &dyn EmailSender,
        subject: &str,
        body: &str,
        from_email: Option<&str>,
    ) -> Result<()> {
        if !descriptor.has(Capability::Email) {
            return Err(anyhow!(
                "{} accounts have no email address",
                descriptor.key()
            ));
        }
        let to_email = self
            .email()
            .filter(|email| !email.is_empty())
            .ok_or_else(|| anyhow!("account has no email address"))?;
        sender.send(&EmailMessage {
            to_email: to_email.to_string(),
            from_email: from_email.map(ToString::to_string),
            subject: subject.to_string(),
            body: body.to_string(),
        })
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity_value().unwrap_or_default())
    }
}
