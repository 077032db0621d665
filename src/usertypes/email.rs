//! Accounts that log in with a case-insensitively unique email address.

use std::sync::Arc;

use crate::identity::{
    derive::NameParts,
    descriptor::{AccountTypeDescriptor, Capability, IdentityMatch, TypeKey},
    registry::{AdminPresentation, Registry},
};

pub const APP_LABEL: &str = "polyauth_email";
pub const MODEL: &str = "EmailUser";

#[must_use]
pub fn descriptor() -> AccountTypeDescriptor {
    AccountTypeDescriptor::new(
        TypeKey::new(APP_LABEL, MODEL),
        concat!(module_path!(), "::EmailUser"),
        "email",
    )
    .with_label("user with email login", "users with email login")
    .with_identity_match(IdentityMatch::CaseInsensitive)
    .with_required_fields(&["first_name", "last_name"])
    .with_capability(Capability::Email)
    .with_capability(Capability::PersonName)
    .with_derivation(Arc::new(NameParts))
}

pub fn register(registry: &mut Registry) {
    let descriptor = descriptor();
    let admin = AdminPresentation::for_descriptor(&descriptor);
    registry.register(descriptor, Some(admin));
}
