//! Accounts addressed by their sequential base id.

use std::sync::Arc;

use crate::identity::{
    derive::{NameParts, NextSequence},
    descriptor::{AccountTypeDescriptor, Capability, IdentityMatch, TypeKey, ID_FIELD},
    registry::{AdminPresentation, Registry},
};

pub const APP_LABEL: &str = "polyauth";
pub const MODEL: &str = "User";

#[must_use]
pub fn descriptor() -> AccountTypeDescriptor {
    AccountTypeDescriptor::new(
        TypeKey::new(APP_LABEL, MODEL),
        concat!(module_path!(), "::User"),
        ID_FIELD,
    )
    .with_label("user with ID login", "users with ID login")
    .with_required_fields(&["first_name", "last_name"])
    .with_optional_fields(&["email"])
    .with_natural_key("email", IdentityMatch::CaseInsensitive)
    .with_table("polyauth_user")
    .with_capability(Capability::PersonName)
    .with_capability(Capability::Email)
    .with_capability(Capability::DerivesIdentity)
    .with_derivation(Arc::new(NameParts))
    .with_derivation(Arc::new(NextSequence))
}

pub fn register(registry: &mut Registry) {
    let descriptor = descriptor();
    let admin = AdminPresentation::for_descriptor(&descriptor);
    registry.register(descriptor, Some(admin));
}
