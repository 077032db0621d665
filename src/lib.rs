//! # polyauth (Polymorphic User Accounts)
//!
//! `polyauth` represents a single "user" identity as one of several concrete
//! account types that share a common base identity row.
//!
//! ## Account Types
//!
//! Each account type is described by an `AccountTypeDescriptor`: which field
//! identifies it (`id`, `email`, `username`, ...), which fields it requires,
//! and which derivation hooks fill fields the caller left out. Types register
//! themselves in a `Registry` at startup; the core never names them directly.
//!
//! - **Identity uniqueness:** identity values are unique across every account
//!   sharing the base identity. Email identities compare case-insensitively.
//! - **Default type:** `POLYAUTH_DEFAULT_ACCOUNT_TYPE` selects the type used
//!   when the application asks for "the user model".
//!
//! ## Bootstrap
//!
//! `polyauth bootstrap` finds or creates the configured administrators and
//! managers. Creation prints the generated credential once; running it again
//! changes nothing.

pub mod cli;
pub mod email;
pub mod identity;
pub mod settings;
pub mod store;
pub mod usertypes;

pub use identity::{
    attributes::{AttrValue, Attributes},
    base::{Account, BaseIdentity},
    descriptor::{AccountTypeDescriptor, Capability, TypeKey},
    provisioner::AccountProvisioner,
    registry::{ListOrder, Registry, TypeRef},
    resolver::IdentityResolver,
};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
