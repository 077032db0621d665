//! Credential check against the default account type.

use chrono::Utc;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    base::Account, credential::SecretHasher, descriptor::AccountTypeDescriptor, error::StoreError,
};
use crate::store::AccountStore;

pub struct Authenticator {
    descriptor: Arc<AccountTypeDescriptor>,
    store: Arc<dyn AccountStore>,
    hasher: Arc<dyn SecretHasher>,
}

impl Authenticator {
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

    /// Look up an active account by identity value and check its secret.
    /// Records the login time on success.
    ///
    /// Returns `Ok(None)` for unknown identities, inactive accounts and wrong
    /// secrets alike.
    ///
    /// # Errors
    /// Store failures.
    #[instrument(skip(self, secret), fields(account_type = %self.descriptor.key()))]
    pub async fn authenticate(
        &self,
        identity: &str,
        secret: &SecretString,
    ) -> Result<Option<Account>, StoreError> {
        let Some(mut account) = self
            .store
            .find_by_identity(&self.descriptor, identity)
            .await?
        else {
            debug!("unknown identity");
            return Ok(None);
        };
        if !account.base.is_active || !account.base.check_secret(self.hasher.as_ref(), secret) {
            debug!("rejected credentials");
            return Ok(None);
        }
        account.base.record_login(Utc::now());
        self.store.update(&self.descriptor, &account).await?;
        Ok(Some(account))
    }
}
