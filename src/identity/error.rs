use thiserror::Error;

/// A type reference could not be turned into a registered account type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("empty account type reference")]
    Empty,
    #[error("account type reference '{0}' does not match any registered account type")]
    Unresolved(String),
}

/// The configured default account type cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("default account type must be of the form 'app_label.ModelName', got '{0}'")]
    Malformed(String),
    #[error("default account type refers to '{0}' which has not been installed")]
    NotInstalled(String),
    #[error("unknown account type module '{0}'")]
    UnknownModule(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {field}")]
    MissingField { field: String },
    #[error("invalid value for field {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

impl ValidationError {
    pub(crate) fn missing(field: &str) -> Self {
        Self::MissingField {
            field: field.to_string(),
        }
    }

    pub(crate) fn invalid(field: &str, reason: &str) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Errors reported by an [`crate::store::AccountStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("integrity error: {field} '{value}' matches existing users")]
    Integrity { field: String, value: String },
    #[error("account {0} not found")]
    NotFound(i64),
    #[error("account type {0} is not supported by this store")]
    UnsupportedType(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("credential error: {0}")]
    Credential(#[from] super::credential::HashError),
    #[error("failed to write provisioning output")]
    Output(#[from] std::io::Error),
}

impl ProvisionError {
    /// True when the failure is a duplicate identity rejected by the store.
    #[must_use]
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Store(StoreError::Integrity { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_message_names_field_and_value() {
        let err = StoreError::Integrity {
            field: "email".to_string(),
            value: "Superuser@test.com".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "integrity error: email 'Superuser@test.com' matches existing users"
        );
        assert!(ProvisionError::from(err).is_integrity());
    }

    #[test]
    fn validation_helpers() {
        assert_eq!(
            ValidationError::missing("first_name"),
            ValidationError::MissingField {
                field: "first_name".to_string()
            }
        );
        assert_eq!(
            ValidationError::invalid("email", "bad").to_string(),
            "invalid value for field email: bad"
        );
    }
}
