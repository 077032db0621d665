//! In-memory account store used by tests and dry runs.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::AccountStore;
use crate::identity::{
    base::Account,
    descriptor::{AccountTypeDescriptor, IdentityMatch, TypeKey, ID_FIELD},
    error::StoreError,
};

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<i64, Account>,
    /// Canonical identity value -> owning account id, across every type.
    identities: BTreeMap<String, i64>,
}

impl State {
    fn next_id(&self) -> i64 {
        self.accounts.keys().next_back().map_or(1, |max| max + 1)
    }

    fn claim_identity(
        &self,
        descriptor: &AccountTypeDescriptor,
        account: &Account,
        owner: Option<i64>,
    ) -> Result<Option<String>, StoreError> {
        if descriptor.identity_is_surrogate() {
            return Ok(None);
        }
        let value = account.identity_value().unwrap_or_default();
        let canonical = descriptor.identity_match().canonical(&value);
        match self.identities.get(&canonical) {
            Some(existing) if Some(*existing) != owner => Err(StoreError::Integrity {
                field: descriptor.identity_field().to_string(),
                value,
            }),
            _ => Ok(Some(canonical)),
        }
    }

    fn release_identity(&mut self, id: i64) {
        self.identities.retain(|_, owner| *owner != id);
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of accounts across every type.
    pub async fn len(&self) -> usize {
        self.state.read().await.accounts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.accounts.is_empty()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_by_identity(
        &self,
        descriptor: &AccountTypeDescriptor,
        value: &str,
    ) -> Result<Option<Account>, StoreError> {
        if descriptor.identity_is_surrogate() {
            return match value.trim().parse::<i64>() {
                Ok(id) => self.find_by_id(descriptor, id).await,
                Err(_) => Ok(None),
            };
        }
        self.find_by_field(
            descriptor,
            descriptor.identity_field(),
            value,
            descriptor.identity_match(),
        )
        .await
    }

    async fn find_by_field(
        &self,
        descriptor: &AccountTypeDescriptor,
        field: &str,
        value: &str,
        mode: IdentityMatch,
    ) -> Result<Option<Account>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .filter(|account| &account.account_type == descriptor.key())
            .find(|account| {
                account
                    .field(field)
                    .is_some_and(|existing| mode.equals(existing, value))
            })
            .cloned())
    }

    async fn find_by_id(
        &self,
        descriptor: &AccountTypeDescriptor,
        id: i64,
    ) -> Result<Option<Account>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .get(&id)
            .filter(|account| &account.account_type == descriptor.key())
            .cloned())
    }

    async fn account_type_of(&self, id: i64) -> Result<Option<TypeKey>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .get(&id)
            .map(|account| account.account_type.clone()))
    }

    async fn insert(
        &self,
        descriptor: &AccountTypeDescriptor,
        mut account: Account,
    ) -> Result<Account, StoreError> {
        let mut state = self.state.write().await;
        let canonical = state.claim_identity(descriptor, &account, None)?;

        let id = match account.base.id {
            Some(id) if state.accounts.contains_key(&id) => {
                return Err(StoreError::Integrity {
                    field: ID_FIELD.to_string(),
                    value: id.to_string(),
                });
            }
            Some(id) => id,
            None => state.next_id(),
        };
        account.base.id = Some(id);
        account.account_type = descriptor.key().clone();

        if let Some(canonical) = canonical {
            state.identities.insert(canonical, id);
        }
        state.accounts.insert(id, account.clone());
        debug!(id, account_type = %descriptor.key(), "stored account in memory");
        Ok(account)
    }

    async fn update(
        &self,
        descriptor: &AccountTypeDescriptor,
        account: &Account,
    ) -> Result<(), StoreError> {
        let id = account.id().ok_or(StoreError::NotFound(0))?;
        let mut state = self.state.write().await;
        if !state.accounts.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        let canonical = state.claim_identity(descriptor, account, Some(id))?;
        state.release_identity(id);
        if let Some(canonical) = canonical {
            state.identities.insert(canonical, id);
        }
        state.accounts.insert(id, account.clone());
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        state.release_identity(id);
        Ok(state.accounts.remove(&id).is_some())
    }

    async fn next_id(&self) -> Result<i64, StoreError> {
        Ok(self.state.read().await.next_id())
    }

    async fn list(&self, descriptor: &AccountTypeDescriptor) -> Result<Vec<Account>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .filter(|account| &account.account_type == descriptor.key())
            .cloned()
            .collect())
    }
}
