//! Field derivation hooks declared by account types.

use async_trait::async_trait;

use super::{
    attributes::Attributes,
    descriptor::{AccountTypeDescriptor, FieldDerivation, ID_FIELD},
    error::ProvisionError,
};
use crate::store::AccountStore;

/// Attribute carrying a free-form display name. Consumed by derivations only.
pub const NAME_ATTRIBUTE: &str = "name";

/// Split `name` into `first_name` (first word) and `last_name` (the rest).
#[derive(Debug, Clone, Copy, Default)]
pub struct NameParts;

#[async_trait]
impl FieldDerivation for NameParts {
    fn name(&self) -> &'static str {
        "name_parts"
    }

    async fn derive(
        &self,
        _descriptor: &AccountTypeDescriptor,
        attributes: &mut Attributes,
        _store: &dyn AccountStore,
    ) -> Result<(), ProvisionError> {
        let Some(name) = attributes.get_text(NAME_ATTRIBUTE).map(ToString::to_string) else {
            return Ok(());
        };
        let (first, last) = split_name(&name);
        attributes.set_default("first_name", first);
        attributes.set_default("last_name", last);
        Ok(())
    }
}

/// Default `username` to `name` lowercased with everything outside `a-z` dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsernameFromName;

#[async_trait]
impl FieldDerivation for UsernameFromName {
    fn name(&self) -> &'static str {
        "username_from_name"
    }

    async fn derive(
        &self,
        _descriptor: &AccountTypeDescriptor,
        attributes: &mut Attributes,
        _store: &dyn AccountStore,
    ) -> Result<(), ProvisionError> {
        if let Some(name) = attributes.get_text(NAME_ATTRIBUTE) {
            let username = username_from(name);
            attributes.set_default("username", username);
        }
        Ok(())
    }
}

/// Default `id` to the next unused integer from the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct NextSequence;

#[async_trait]
impl FieldDerivation for NextSequence {
    fn name(&self) -> &'static str {
        "next_sequence"
    }

    async fn derive(
        &self,
        descriptor: &AccountTypeDescriptor,
        attributes: &mut Attributes,
        store: &dyn AccountStore,
    ) -> Result<(), ProvisionError> {
        if attributes.contains(ID_FIELD) {
            return Ok(());
        }
        let next = store.next_id().await?;
        tracing::debug!(account_type = %descriptor.key(), next, "derived sequential id");
        attributes.set_default(ID_FIELD, next);
        Ok(())
    }
}

/// `"Jane Q Doe"` -> `("Jane", "Q Doe")`.
#[must_use]
pub fn split_name(name: &str) -> (String, String) {
    let mut words = name.split_whitespace();
    let first = words.next().unwrap_or_default().to_string();
    let last = words.collect::<Vec<_>>().join(" ");
    (first, last)
}

#[must_use]
pub fn username_from(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(char::is_ascii_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        identity::descriptor::TypeKey,
        store::{memory::MemoryStore, AccountStore},
    };

    fn descriptor() -> AccountTypeDescriptor {
        AccountTypeDescriptor::new(TypeKey::new("t", "T"), "t::T", "username")
    }

    #[test]
    fn split_name_words() {
        assert_eq!(
            split_name("Jane Q  Doe"),
            ("Jane".to_string(), "Q Doe".to_string())
        );
        assert_eq!(split_name("Cher"), ("Cher".to_string(), String::new()));
        assert_eq!(split_name("   "), (String::new(), String::new()));
    }

    #[test]
    fn username_strips_non_letters() {
        assert_eq!(username_from("Sir Test-2"), "sirtest");
        assert_eq!(username_from("José O'Neil"), "josoneil");
    }

    #[tokio::test]
    async fn name_parts_only_fills_missing() {
        let store = MemoryStore::new();
        let mut attrs = Attributes::new()
            .with("name", "Sir Test")
            .with("last_name", "Given");
        NameParts
            .derive(&descriptor(), &mut attrs, &store)
            .await
            .expect("derive");
        assert_eq!(attrs.get_text("first_name"), Some("Sir"));
        assert_eq!(attrs.get_text("last_name"), Some("Given"));
    }

    #[tokio::test]
    async fn username_from_name_is_deterministic() {
        let store = MemoryStore::new();
        let mut a = Attributes::new().with("name", "Sir Test");
        let mut b = Attributes::new().with("name", "Sir Test");
        UsernameFromName
            .derive(&descriptor(), &mut a, &store)
            .await
            .expect("a");
        UsernameFromName
            .derive(&descriptor(), &mut b, &store)
            .await
            .expect("b");
        assert_eq!(a.get_text("username"), Some("sirtest"));
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn derivations_skip_without_name() {
        let store = MemoryStore::new();
        let mut attrs = Attributes::new().with("email", "x@example.com");
        NameParts
            .derive(&descriptor(), &mut attrs, &store)
            .await
            .expect("names");
        UsernameFromName
            .derive(&descriptor(), &mut attrs, &store)
            .await
            .expect("username");
        assert_eq!(attrs.len(), 1);
    }

    #[tokio::test]
    async fn next_sequence_uses_store() {
        let store = MemoryStore::new();
        let mut attrs = Attributes::new();
        NextSequence
            .derive(&descriptor(), &mut attrs, &store)
            .await
            .expect("derive");
        assert_eq!(attrs.get(ID_FIELD).and_then(|v| v.as_integer()), Some(1));
        assert_eq!(store.next_id().await.expect("next"), 1);

        let mut given = Attributes::new().with(ID_FIELD, 42_i64);
        NextSequence
            .derive(&descriptor(), &mut given, &store)
            .await
            .expect("derive");
        assert_eq!(given.get(ID_FIELD).and_then(|v| v.as_integer()), Some(42));
    }
}
