//! Built-in account types.
//!
//! Each module exposes `descriptor()` and `register(&mut Registry)`.
//! [`discover`] runs `register` for every installed module, in table order.

pub mod email;
pub mod id;
pub mod username;

use tracing::debug;

use crate::identity::{error::ConfigurationError, registry::Registry};

type RegisterFn = fn(&mut Registry);

/// Built-in account-type modules by installable name.
pub const BUILTIN: &[(&str, RegisterFn)] = &[
    ("id", id::register),
    ("email", email::register),
    ("username", username::register),
];

/// Modules installed when nothing else is configured.
pub const DEFAULT_INSTALLED: &str = "id,email,username";

/// Register every module named in `installed`.
///
/// Modules are registered in `BUILTIN` order regardless of the order given.
/// Returns the number of modules registered.
///
/// # Errors
/// `ConfigurationError::UnknownModule` for a name that is not a built-in module.
pub fn discover(
    registry: &mut Registry,
    installed: &[String],
) -> Result<usize, ConfigurationError> {
    let wanted: Vec<&str> = installed
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .collect();

    if let Some(unknown) = wanted
        .iter()
        .find(|name| !BUILTIN.iter().any(|(module, _)| module == *name))
    {
        return Err(ConfigurationError::UnknownModule((*unknown).to_string()));
    }

    let mut registered = 0;
    for (module, register) in BUILTIN {
        if wanted.contains(module) {
            debug!(module, "registering account type module");
            register(registry);
            registered += 1;
        }
    }
    Ok(registered)
}
