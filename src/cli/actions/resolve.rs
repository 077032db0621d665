use anyhow::{Context, Result};

use crate::{identity::resolver::IdentityResolver, settings::Settings};

#[derive(Debug)]
pub struct Args {
    pub settings: Settings,
}

/// Print the account type "the user model" resolves to.
///
/// # Errors
/// Returns an error if the default account type is malformed or not installed.
pub fn execute(args: &Args) -> Result<()> {
    let registry = super::registry(&args.settings)?;
    let descriptor = IdentityResolver::new(registry, &args.settings)
        .resolve_default_type()
        .context("failed to resolve default account type")?;

    println!("{}", descriptor.key());
    println!("  module:   {}", descriptor.module_path());
    println!("  label:    {}", descriptor.label());
    println!("  identity: {}", descriptor.identity_field());
    println!("  table:    {}", descriptor.table());
    Ok(())
}
