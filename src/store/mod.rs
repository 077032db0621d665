//! Account persistence collaborator.
//!
//! Stores hold one base identity row per account plus one extension row in the
//! table of the account's type. Identity values are unique across all accounts
//! sharing the base identity; the store, not the registry, enforces this.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::identity::{
    base::Account,
    descriptor::{AccountTypeDescriptor, IdentityMatch, TypeKey},
    error::StoreError,
};

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Find an account of `descriptor`'s type whose identity field equals
    /// `value`, compared per the descriptor's identity match mode.
    async fn find_by_identity(
        &self,
        descriptor: &AccountTypeDescriptor,
        value: &str,
    ) -> Result<Option<Account>, StoreError>;

    /// First account of `descriptor`'s type whose extension field `field`
    /// equals `value` under `mode`.
    async fn find_by_field(
        &self,
        descriptor: &AccountTypeDescriptor,
        field: &str,
        value: &str,
        mode: IdentityMatch,
    ) -> Result<Option<Account>, StoreError>;

    async fn find_by_id(
        &self,
        descriptor: &AccountTypeDescriptor,
        id: i64,
    ) -> Result<Option<Account>, StoreError>;

    /// Stored discriminator for the base row `id`.
    async fn account_type_of(&self, id: i64) -> Result<Option<TypeKey>, StoreError>;

    /// Persist a new account. Assigns `base.id` when unset.
    ///
    /// # Errors
    /// `StoreError::Integrity` when the identity value is already taken.
    async fn insert(
        &self,
        descriptor: &AccountTypeDescriptor,
        account: Account,
    ) -> Result<Account, StoreError>;

    async fn update(
        &self,
        descriptor: &AccountTypeDescriptor,
        account: &Account,
    ) -> Result<(), StoreError>;

    /// Remove the base row and its extension row. Returns false when absent.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;

    /// Next unused base identity id.
    async fn next_id(&self) -> Result<i64, StoreError>;

    async fn list(&self, descriptor: &AccountTypeDescriptor) -> Result<Vec<Account>, StoreError>;
}
