//! Account type descriptors.
//!
//! A descriptor is the static metadata for one concrete account kind: how it is
//! addressed (`TypeKey`, module path), which field identifies it, which fields
//! it requires or accepts, and which capabilities and derivation hooks it
//! declares. The provisioner only ever talks to account types through this
//! value.

use async_trait::async_trait;
use serde::Serialize;
use std::{fmt, sync::Arc};

use super::{attributes::Attributes, error::ProvisionError};
use crate::store::AccountStore;

/// Identity field name used by account types addressed by their surrogate key.
pub const ID_FIELD: &str = "id";

/// Base identity flags every account type accepts as attributes.
pub const BASE_FLAGS: [&str; 3] = ["is_active", "is_staff", "is_superuser"];

/// Stable `app_label.Model` identifier of an account type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeKey {
    app_label: String,
    model: String,
}

impl TypeKey {
    #[must_use]
    pub fn new(app_label: &str, model: &str) -> Self {
        Self {
            app_label: app_label.to_string(),
            model: model.to_string(),
        }
    }

    /// Parse the dotted `app_label.Model` form. Exactly one `.` with non-empty
    /// segments on both sides.
    #[must_use]
    pub fn parse(reference: &str) -> Option<Self> {
        let (app_label, model) = reference.trim().split_once('.')?;
        if app_label.is_empty() || model.is_empty() || model.contains('.') {
            return None;
        }
        if app_label.contains(':') || model.contains(':') {
            return None;
        }
        Some(Self::new(app_label, model))
    }

    #[must_use]
    pub fn app_label(&self) -> &str {
        &self.app_label
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// App labels compare exactly, model names ignore ASCII case.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.app_label == other.app_label && self.model.eq_ignore_ascii_case(&other.model)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app_label, self.model)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMatch {
    Exact,
    CaseInsensitive,
}

impl IdentityMatch {
    #[must_use]
    pub fn equals(self, a: &str, b: &str) -> bool {
        match self {
            Self::Exact => a == b,
            Self::CaseInsensitive => a.to_lowercase() == b.to_lowercase(),
        }
    }

    /// Canonical form used to detect duplicates.
    #[must_use]
    pub fn canonical(self, value: &str) -> String {
        match self {
            Self::Exact => value.to_string(),
            Self::CaseInsensitive => value.to_lowercase(),
        }
    }
}

/// Optional capabilities an account type declares and callers may query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Carries a deliverable `email` field.
    Email,
    /// Carries a `username` field.
    Username,
    /// Carries `first_name` / `last_name`.
    PersonName,
    /// Synthesizes its identity field instead of requiring it.
    DerivesIdentity,
}

/// Type-specific hook run before the identity field is read.
///
/// Hooks only fill fields the caller did not supply.
#[async_trait]
pub trait FieldDerivation: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// # Errors
    /// Returns an error if the store cannot be queried or the derived value is invalid.
    async fn derive(
        &self,
        descriptor: &AccountTypeDescriptor,
        attributes: &mut Attributes,
        store: &dyn AccountStore,
    ) -> Result<(), ProvisionError>;
}

#[derive(Debug, Clone)]
pub struct AccountTypeDescriptor {
    key: TypeKey,
    module_path: String,
    identity_field: String,
    identity_match: IdentityMatch,
    required_fields: Vec<String>,
    optional_fields: Vec<String>,
    label: String,
    label_plural: String,
    table: String,
    capabilities: Vec<Capability>,
    derivations: Vec<Arc<dyn FieldDerivation>>,
    natural_key: Option<(String, IdentityMatch)>,
}

impl AccountTypeDescriptor {
    #[must_use]
    pub fn new(key: TypeKey, module_path: &str, identity_field: &str) -> Self {
        let label = format!("user with {identity_field} login");
        let table = format!("{}_{}", key.app_label(), key.model().to_lowercase());
        Self {
            key,
            module_path: module_path.to_string(),
            identity_field: identity_field.to_string(),
            identity_match: IdentityMatch::Exact,
            required_fields: Vec::new(),
            optional_fields: Vec::new(),
            label_plural: format!("users with {identity_field} login"),
            label,
            table,
            capabilities: Vec::new(),
            derivations: Vec::new(),
            natural_key: None,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: &str, label_plural: &str) -> Self {
        self.label = label.to_string();
        self.label_plural = label_plural.to_string();
        self
    }

    #[must_use]
    pub fn with_identity_match(mut self, identity_match: IdentityMatch) -> Self {
        self.identity_match = identity_match;
        self
    }

    #[must_use]
    pub fn with_required_fields(mut self, fields: &[&str]) -> Self {
        self.required_fields = dedup(fields);
        self
    }

    #[must_use]
    pub fn with_optional_fields(mut self, fields: &[&str]) -> Self {
        self.optional_fields = dedup(fields);
        self
    }

    #[must_use]
    pub fn with_table(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    #[must_use]
    pub fn with_derivation(mut self, derivation: Arc<dyn FieldDerivation>) -> Self {
        self.derivations.push(derivation);
        self
    }

    /// Field that identifies an existing account when the identity itself is
    /// derived from the store.
    #[must_use]
    pub fn with_natural_key(mut self, field: &str, identity_match: IdentityMatch) -> Self {
        self.natural_key = Some((field.to_string(), identity_match));
        self
    }

    #[must_use]
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    #[must_use]
    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    #[must_use]
    pub fn identity_field(&self) -> &str {
        &self.identity_field
    }

    #[must_use]
    pub fn identity_match(&self) -> IdentityMatch {
        self.identity_match
    }

    #[must_use]
    pub fn required_fields(&self) -> &[String] {
        &self.required_fields
    }

    #[must_use]
    pub fn optional_fields(&self) -> &[String] {
        &self.optional_fields
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn label_plural(&self) -> &str {
        &self.label_plural
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    #[must_use]
    pub fn derivations(&self) -> &[Arc<dyn FieldDerivation>] {
        &self.derivations
    }

    #[must_use]
    pub fn natural_key(&self) -> Option<(&str, IdentityMatch)> {
        self.natural_key
            .as_ref()
            .map(|(field, identity_match)| (field.as_str(), *identity_match))
    }

    #[must_use]
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Identity is the base surrogate key rather than an extension field.
    #[must_use]
    pub fn identity_is_surrogate(&self) -> bool {
        self.identity_field == ID_FIELD
    }

    /// Fields stored in this type's extension table, identity first.
    #[must_use]
    pub fn extension_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        if !self.identity_is_surrogate() {
            fields.push(&self.identity_field);
        }
        for field in self.required_fields.iter().chain(&self.optional_fields) {
            if field != ID_FIELD && !fields.contains(&field.as_str()) {
                fields.push(field);
            }
        }
        fields
    }

    /// True when an attribute named `name` maps onto this account type.
    #[must_use]
    pub fn knows_field(&self, name: &str) -> bool {
        name == self.identity_field
            || BASE_FLAGS.contains(&name)
            || self.required_fields.iter().any(|f| f == name)
            || self.optional_fields.iter().any(|f| f == name)
    }

    #[must_use]
    pub fn summary(&self) -> DescriptorSummary {
        DescriptorSummary {
            key: self.key.to_string(),
            module_path: self.module_path.clone(),
            identity_field: self.identity_field.clone(),
            identity_match: self.identity_match,
            required_fields: self.required_fields.clone(),
            optional_fields: self.optional_fields.clone(),
            label: self.label.clone(),
            table: self.table.clone(),
            capabilities: self.capabilities.clone(),
            derivations: self.derivations.iter().map(|d| d.name()).collect(),
            natural_key: self.natural_key.as_ref().map(|(field, _)| field.clone()),
        }
    }
}

/// Serializable view of a descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct DescriptorSummary {
    pub key: String,
    pub module_path: String,
    pub identity_field: String,
    pub identity_match: IdentityMatch,
    pub required_fields: Vec<String>,
    pub optional_fields: Vec<String>,
    pub label: String,
    pub table: String,
    pub capabilities: Vec<Capability>,
    pub derivations: Vec<&'static str>,
    pub natural_key: Option<String>,
}

fn dedup(fields: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(fields.len());
    for field in fields {
        if !out.iter().any(|f| f == field) {
            out.push((*field).to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn username_like() -> AccountTypeDescriptor {
        AccountTypeDescriptor::new(
            TypeKey::new("polyauth_username", "UsernameUser"),
            "polyauth::usertypes::username::UsernameUser",
            "username",
        )
        .with_required_fields(&["email", "first_name", "last_name", "email"])
        .with_optional_fields(&["nickname"])
        .with_capability(Capability::Username)
        .with_capability(Capability::Username)
    }

    #[test]
    fn type_key_parse() {
        let key = TypeKey::parse("polyauth_email.EmailUser").expect("key");
        assert_eq!(key.app_label(), "polyauth_email");
        assert_eq!(key.model(), "EmailUser");
        assert_eq!(key.to_string(), "polyauth_email.EmailUser");

        assert!(TypeKey::parse("EmailUser").is_none());
        assert!(TypeKey::parse("a.b.C").is_none());
        assert!(TypeKey::parse(".C").is_none());
        assert!(TypeKey::parse("a.").is_none());
        assert!(TypeKey::parse("a::b.C").is_none());
    }

    #[test]
    fn type_key_match_ignores_model_case() {
        let key = TypeKey::new("polyauth_email", "EmailUser");
        assert!(key.matches(&TypeKey::new("polyauth_email", "emailuser")));
        assert!(!key.matches(&TypeKey::new("Polyauth_email", "EmailUser")));
    }

    #[test]
    fn defaults_from_key() {
        let descriptor = username_like();
        assert_eq!(descriptor.table(), "polyauth_username_usernameuser");
        assert_eq!(descriptor.label(), "user with username login");
        assert_eq!(
            descriptor.required_fields(),
            ["email", "first_name", "last_name"]
        );
        assert_eq!(descriptor.capabilities(), [Capability::Username]);
    }

    #[test]
    fn extension_fields_identity_first() {
        let descriptor = username_like();
        assert_eq!(
            descriptor.extension_fields(),
            vec!["username", "email", "first_name", "last_name", "nickname"]
        );
        assert!(!descriptor.identity_is_surrogate());
    }

    #[test]
    fn knows_field() {
        let descriptor = username_like();
        assert!(descriptor.knows_field("username"));
        assert!(descriptor.knows_field("is_staff"));
        assert!(descriptor.knows_field("nickname"));
        assert!(!descriptor.knows_field("name"));
        assert!(!descriptor.knows_field("password"));
    }

    #[test]
    fn identity_match_modes() {
        assert!(IdentityMatch::CaseInsensitive.equals("A@x.com", "a@X.com"));
        assert!(!IdentityMatch::Exact.equals("A@x.com", "a@X.com"));
        assert_eq!(
            IdentityMatch::CaseInsensitive.canonical("Jane@X.com"),
            "jane@x.com"
        );
    }

    #[test]
    fn summary_serializes() {
        let value = serde_json::to_value(username_like().summary()).expect("json");
        assert_eq!(value["key"], "polyauth_username.UsernameUser");
        assert_eq!(value["identity_match"], "exact");
        assert_eq!(value["capabilities"][0], "username");
        assert!(value["natural_key"].is_null());
    }

    #[test]
    fn natural_key() {
        let descriptor =
            AccountTypeDescriptor::new(TypeKey::new("polyauth", "User"), "p::User", ID_FIELD)
                .with_optional_fields(&["email"])
                .with_natural_key("email", IdentityMatch::CaseInsensitive);
        assert_eq!(
            descriptor.natural_key(),
            Some(("email", IdentityMatch::CaseInsensitive))
        );
        assert_eq!(descriptor.summary().natural_key.as_deref(), Some("email"));
        assert!(username_like().natural_key().is_none());
    }
}
