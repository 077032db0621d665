pub mod bootstrap;
pub mod resolve;
pub mod types;

// Internal "interpreter" for `Action`.
mod run;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::{identity::registry::Registry, settings::Settings, usertypes};

#[derive(Debug)]
pub enum Action {
    Bootstrap(bootstrap::Args),
    Types(types::Args),
    Resolve(resolve::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}

/// Registry holding every installed account-type module.
pub(crate) fn registry(settings: &Settings) -> Result<Arc<Registry>> {
    let mut registry = Registry::new();
    usertypes::discover(&mut registry, &settings.usertypes)
        .context("failed to register account types")?;
    Ok(Arc::new(registry))
}
