//! Polymorphic account identities.
//!
//! Flow Overview:
//! 1) Account-type modules register descriptors in a [`registry::Registry`].
//! 2) [`resolver::IdentityResolver`] picks the configured default type.
//! 3) [`provisioner::AccountProvisioner`] finds or creates accounts of that
//!    type; [`bootstrap`] drives it for the configured administrators and
//!    managers.

pub mod attributes;
pub mod authenticate;
pub mod base;
pub mod bootstrap;
pub mod credential;
pub mod derive;
pub mod descriptor;
pub mod error;
pub mod provisioner;
pub mod registry;
pub mod resolver;
