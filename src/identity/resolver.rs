//! Resolution of the configured default account type.

use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    base::Account,
    descriptor::{AccountTypeDescriptor, TypeKey},
    error::{ConfigurationError, StoreError},
    registry::Registry,
};
use crate::{settings::Settings, store::AccountStore};

#[derive(Debug, Clone)]
pub struct IdentityResolver {
    registry: Arc<Registry>,
    default_account_type: String,
}

impl IdentityResolver {
    #[must_use]
    pub fn new(registry: Arc<Registry>, settings: &Settings) -> Self {
        Self::with_default(registry, &settings.default_account_type)
    }

    #[must_use]
    pub fn with_default(registry: Arc<Registry>, default_account_type: &str) -> Self {
        Self {
            registry,
            default_account_type: default_account_type.to_string(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub fn default_account_type(&self) -> &str {
        &self.default_account_type
    }

    /// Descriptor of the configured default account type.
    ///
    /// # Errors
    /// `ConfigurationError::Malformed` when the setting is neither an
    /// `app_label.Model` reference nor a module path, `ConfigurationError::NotInstalled` when it
    /// names no registered account type.
    #[instrument(skip(self), fields(default_account_type = %self.default_account_type))]
    pub fn resolve_default_type(&self) -> Result<Arc<AccountTypeDescriptor>, ConfigurationError> {
        let reference = self.default_account_type.trim();
        if reference.is_empty() || !(reference.contains('.') || reference.contains("::")) {
            return Err(ConfigurationError::Malformed(reference.to_string()));
        }
        self.registry
            .resolve_reference(reference)
            .inspect(|descriptor| {
                debug!(account_type = %descriptor.key(), "resolved default account type");
            })
            .map_err(|_| ConfigurationError::NotInstalled(reference.to_string()))
    }

    /// Load an account by base id through its stored discriminator, whatever
    /// its concrete type.
    ///
    /// # Errors
    /// `StoreError::UnsupportedType` when the discriminator names a type that
    /// is not registered; store failures otherwise.
    pub async fn load_account(
        &self,
        store: &dyn AccountStore,
        id: i64,
    ) -> Result<Option<Account>, StoreError> {
        let Some(account_type) = store.account_type_of(id).await? else {
            return Ok(None);
        };
        let descriptor = self.descriptor_for(&account_type)?;
        store.find_by_id(&descriptor, id).await
    }

    fn descriptor_for(&self, key: &TypeKey) -> Result<Arc<AccountTypeDescriptor>, StoreError> {
        self.registry
            .get(key)
            .map(|registration| Arc::clone(registration.descriptor()))
            .ok_or_else(|| StoreError::UnsupportedType(key.to_string()))
    }
}
