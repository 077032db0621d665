use anyhow::{Context, Result};
use serde::Serialize;

use crate::{
    identity::{
        descriptor::DescriptorSummary,
        registry::{AdminPresentation, ListOrder, Registration},
        resolver::IdentityResolver,
    },
    settings::Settings,
};

#[derive(Debug)]
pub struct Args {
    pub settings: Settings,
    pub order: ListOrder,
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct Listing {
    #[serde(flatten)]
    descriptor: DescriptorSummary,
    admin: Option<AdminPresentation>,
    default: bool,
}

/// Print the registered account types.
///
/// # Errors
/// Returns an error if an installed module is unknown or JSON encoding fails.
pub fn execute(args: Args) -> Result<()> {
    let registry = super::registry(&args.settings)?;
    let default = IdentityResolver::new(registry.clone(), &args.settings)
        .resolve_default_type()
        .ok()
        .map(|descriptor| descriptor.key().clone());

    let listings: Vec<Listing> = registry
        .list(args.order)
        .into_iter()
        .map(|registration| {
            let is_default = default.as_ref() == Some(registration.key());
            listing(registration, is_default)
        })
        .collect();

    if args.json {
        let json =
            serde_json::to_string_pretty(&listings).context("failed to encode account types")?;
        println!("{json}");
    } else {
        for line in render(&listings) {
            println!("{line}");
        }
    }
    Ok(())
}

fn listing(registration: &Registration, default: bool) -> Listing {
    Listing {
        descriptor: registration.descriptor().summary(),
        admin: registration.admin().cloned(),
        default,
    }
}

fn render(listings: &[Listing]) -> Vec<String> {
    let width = listings
        .iter()
        .map(|l| l.descriptor.key.len())
        .max()
        .unwrap_or(0);
    listings
        .iter()
        .map(|l| {
            format!(
                "{} {:<width$}  {} (identity: {})",
                if l.default { '*' } else { ' ' },
                l.descriptor.key,
                l.descriptor.label,
                l.descriptor.identity_field,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listings(order: ListOrder) -> Vec<Listing> {
        let settings = Settings::default();
        let registry = super::super::registry(&settings).unwrap();
        registry
            .list(order)
            .into_iter()
            .map(|r| listing(r, r.key().to_string() == settings.default_account_type))
            .collect()
    }

    #[test]
    fn test_render_marks_default() {
        let lines = render(&listings(ListOrder::Insertion));
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("  polyauth.User"));
        assert!(lines[1].starts_with("* polyauth_email.EmailUser"));
        assert!(lines[2].contains("(identity: username)"));
    }

    #[test]
    fn test_json_listing() {
        let json = serde_json::to_value(listings(ListOrder::Insertion)).unwrap();
        let entries = json.as_array().unwrap();
        assert_eq!(entries[1]["key"], "polyauth_email.EmailUser");
        assert_eq!(entries[1]["identity_field"], "email");
        assert_eq!(entries[1]["default"], true);
        assert!(entries[1]["admin"]["list_display"].is_array());
    }

    #[test]
    fn test_execute() {
        let args = Args {
            settings: Settings::default(),
            order: ListOrder::Label,
            json: true,
        };
        assert!(execute(args).is_ok());
    }

    #[test]
    fn test_execute_unknown_module() {
        let args = Args {
            settings: Settings {
                usertypes: vec!["ldap".to_string()],
                ..Settings::default()
            },
            order: ListOrder::Label,
            json: false,
        };
        assert!(execute(args).is_err());
    }
}
