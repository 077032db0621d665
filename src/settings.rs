//! Process settings, read once at startup.

use secrecy::SecretString;
use std::{fmt, str::FromStr};
use thiserror::Error;

use crate::usertypes::DEFAULT_INSTALLED;

pub const DEFAULT_ACCOUNT_TYPE: &str = "polyauth_email.EmailUser";

/// Separator between contacts in `POLYAUTH_ADMINS` / `POLYAUTH_MANAGERS`.
pub const CONTACT_DELIMITER: char = ';';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid contact '{0}', expected 'Display Name <address>' or 'address'")]
pub struct ContactParseError(pub String);

impl FromStr for Contact {
    type Err = ContactParseError;

    /// `Display Name <address>` or a bare `address`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let invalid = || ContactParseError(raw.to_string());
        if raw.is_empty() {
            return Err(invalid());
        }

        let (name, email) = match raw.split_once('<') {
            Some((name, rest)) => {
                let email = rest.strip_suffix('>').ok_or_else(invalid)?;
                (name.trim(), email.trim())
            }
            None => ("", raw),
        };
        if email.is_empty() || email.contains(['<', '>']) || email.split_whitespace().count() != 1 {
            return Err(invalid());
        }
        Ok(Self {
            name: name.to_string(),
            email: email.to_string(),
        })
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            f.write_str(&self.email)
        } else {
            write!(f, "{} <{}>", self.name, self.email)
        }
    }
}

/// Parse a `;`-separated contact list, skipping blank entries.
///
/// # Errors
/// Returns the first entry that is not a valid contact.
pub fn parse_contacts(raw: &str) -> Result<Vec<Contact>, ContactParseError> {
    raw.split(CONTACT_DELIMITER)
        .filter(|entry| !entry.trim().is_empty())
        .map(str::parse)
        .collect()
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// `app_label.Model` (or module path) of the default account type.
    pub default_account_type: String,
    pub admins: Vec<Contact>,
    pub managers: Vec<Contact>,
    /// Installed account-type modules.
    pub usertypes: Vec<String>,
    pub dsn: Option<SecretString>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_account_type: DEFAULT_ACCOUNT_TYPE.to_string(),
            admins: Vec::new(),
            managers: Vec::new(),
            usertypes: DEFAULT_INSTALLED
                .split(',')
                .map(ToString::to_string)
                .collect(),
            dsn: None,
        }
    }
}
