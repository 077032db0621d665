use crate::cli::actions::{bootstrap, resolve, types, Action};
use anyhow::Result;

/// Execute the provided action.
// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Bootstrap(args) => bootstrap::execute(args).await,
        Action::Types(args) => types::execute(args),
        Action::Resolve(args) => resolve::execute(&args),
    }
}
