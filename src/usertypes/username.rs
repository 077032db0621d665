//! Accounts that log in with a username, derived from the display name when
//! none is given.

use std::sync::Arc;

use crate::identity::{
    derive::{NameParts, UsernameFromName},
    descriptor::{AccountTypeDescriptor, Capability, TypeKey},
    registry::{AdminPresentation, Registry},
};

pub const APP_LABEL: &str = "polyauth_username";
pub const MODEL: &str = "UsernameUser";

#[must_use]
pub fn descriptor() -> AccountTypeDescriptor {
    AccountTypeDescriptor::new(
        TypeKey::new(APP_LABEL, MODEL),
        concat!(module_path!(), "::UsernameUser"),
        "username",
    )
    .with_label("user with username login", "users with username login")
    .with_required_fields(&["email", "first_name", "last_name"])
    .with_capability(Capability::Email)
    .with_capability(Capability::Username)
    .with_capability(Capability::PersonName)
    .with_capability(Capability::DerivesIdentity)
    .with_derivation(Arc::new(NameParts))
    .with_derivation(Arc::new(UsernameFromName))
}

pub fn register(registry: &mut Registry) {
    let descriptor = descriptor();
    let mut admin = AdminPresentation::for_descriptor(&descriptor);
    admin.search_fields.insert(0, "username".to_string());
    registry.register(descriptor, Some(admin));
}
