//! Account type plugin registry.
//!
//! Flow Overview:
//! 1) At startup each installed account-type module calls `Registry::register`.
//! 2) The registry is then shared read-only; `unregister` is the only mutation.
//! 3) Lookups go through `resolve_reference`, which accepts `app_label.Model`
//!    first and falls back to the fully qualified module path.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::{
    descriptor::{AccountTypeDescriptor, Capability, TypeKey},
    error::ResolutionError,
};

/// Admin listing metadata attached to a registration. Never rendered here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdminPresentation {
    pub list_display: Vec<String>,
    pub list_filter: Vec<String>,
    pub search_fields: Vec<String>,
    pub ordering: Vec<String>,
}

/// Fieldsets shared by every account type's change view.
pub const BASE_FIELDSETS: &[(&str, &[&str])] = &[
    ("Meta", &["last_login"]),
    ("Permissions", &["is_active", "is_staff", "is_superuser"]),
];

impl AdminPresentation {
    /// Default listing for a descriptor: identity, names, flags, created.
    #[must_use]
    pub fn for_descriptor(descriptor: &AccountTypeDescriptor) -> Self {
        let identity = descriptor.identity_field().to_string();
        let mut list_display = vec![identity.clone()];
        let mut search_fields = Vec::new();
        if descriptor.has(Capability::PersonName) {
            list_display.extend(["first_name".to_string(), "last_name".to_string()]);
            search_fields.extend(["first_name".to_string(), "last_name".to_string()]);
        }
        if descriptor.has(Capability::Email) {
            search_fields.push("email".to_string());
        }
        let flags = ["is_active", "is_staff", "is_superuser", "created"].map(String::from);
        list_display.extend(flags.iter().cloned());
        Self {
            list_display,
            list_filter: flags.to_vec(),
            search_fields,
            ordering: vec![identity],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    descriptor: Arc<AccountTypeDescriptor>,
    admin: Option<AdminPresentation>,
}

impl Registration {
    #[must_use]
    pub fn descriptor(&self) -> &Arc<AccountTypeDescriptor> {
        &self.descriptor
    }

    #[must_use]
    pub fn admin(&self) -> Option<&AdminPresentation> {
        self.admin.as_ref()
    }

    #[must_use]
    pub fn key(&self) -> &TypeKey {
        self.descriptor.key()
    }
}

/// Reference to an account type, either already resolved or a string to
/// resolve when used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Resolved(TypeKey),
    Deferred(String),
}

impl From<TypeKey> for TypeRef {
    fn from(key: TypeKey) -> Self {
        Self::Resolved(key)
    }
}

impl From<&str> for TypeRef {
    fn from(reference: &str) -> Self {
        Self::Deferred(reference.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListOrder {
    #[default]
    Insertion,
    /// Case-insensitive by label, ties keep insertion order.
    Label,
}

#[derive(Debug, Default, Clone)]
pub struct Registry {
    registrations: Vec<Registration>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a registration, replacing any existing one for the same type in place.
    pub fn register(
        &mut self,
        descriptor: impl Into<Arc<AccountTypeDescriptor>>,
        admin: Option<AdminPresentation>,
    ) -> Arc<AccountTypeDescriptor> {
        let descriptor = descriptor.into();
        let registration = Registration {
            descriptor: Arc::clone(&descriptor),
            admin,
        };
        if let Some(existing) = self
            .registrations
            .iter_mut()
            .find(|r| r.key() == descriptor.key())
        {
            debug!(account_type = %descriptor.key(), "replacing account type registration");
            *existing = registration;
        } else {
            debug!(account_type = %descriptor.key(), "registering account type");
            self.registrations.push(registration);
        }
        descriptor
    }

    /// Remove every registration matching `type_ref`. A deferred reference that
    /// resolves to nothing removes nothing. Returns the number removed.
    pub fn unregister(&mut self, type_ref: &TypeRef) -> usize {
        let key = match type_ref {
            TypeRef::Resolved(key) => key.clone(),
            TypeRef::Deferred(reference) => match self.resolve_reference(reference) {
                Ok(descriptor) => descriptor.key().clone(),
                Err(err) => {
                    debug!("unregister skipped: {err}");
                    return 0;
                }
            },
        };
        let before = self.registrations.len();
        self.registrations.retain(|r| r.key() != &key);
        let removed = before - self.registrations.len();
        if removed > 0 {
            debug!(account_type = %key, "unregistered account type");
        }
        removed
    }

    #[must_use]
    pub fn list(&self, order: ListOrder) -> Vec<&Registration> {
        let mut registrations: Vec<&Registration> = self.registrations.iter().collect();
        if order == ListOrder::Label {
            registrations.sort_by_cached_key(|r| r.descriptor.label().to_lowercase());
        }
        registrations
    }

    #[must_use]
    pub fn get(&self, key: &TypeKey) -> Option<&Registration> {
        self.registrations.iter().find(|r| r.key() == key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Resolve `app_label.Model`, falling back to the fully qualified module
    /// path (`::` or `.` separated).
    ///
    /// # Errors
    /// Returns `ResolutionError` when neither form names a registered type.
    pub fn resolve_reference(
        &self,
        reference: &str,
    ) -> Result<Arc<AccountTypeDescriptor>, ResolutionError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ResolutionError::Empty);
        }

        if let Some(key) = TypeKey::parse(reference) {
            if let Some(registration) = self.registrations.iter().find(|r| r.key().matches(&key)) {
                return Ok(Arc::clone(&registration.descriptor));
            }
        }

        let wanted = normalize_path(reference);
        self.registrations
            .iter()
            .find(|r| normalize_path(r.descriptor.module_path()) == wanted)
            .map(|r| Arc::clone(&r.descriptor))
            .ok_or_else(|| ResolutionError::Unresolved(reference.to_string()))
    }
}

fn normalize_path(path: &str) -> String {
    path.trim().replace("::", ".")
}
