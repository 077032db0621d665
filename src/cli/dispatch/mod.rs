use crate::{
    cli::{
        actions::{bootstrap, resolve, types, Action},
        commands::{
            ARG_ADMIN, ARG_DEFAULT_ACCOUNT_TYPE, ARG_DSN, ARG_JSON, ARG_MANAGER, ARG_SORT,
            ARG_USERTYPES,
        },
    },
    identity::registry::ListOrder,
    settings::{Contact, Settings},
};
use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing or a contact is malformed.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let mut settings = settings(matches)?;

    match matches.subcommand() {
        Some(("bootstrap", sub_m)) => {
            settings.dsn = sub_m
                .get_one::<String>(ARG_DSN)
                .filter(|dsn| !dsn.trim().is_empty())
                .map(|dsn| SecretString::from(dsn.clone()));
            settings.admins = contacts(sub_m, ARG_ADMIN)?;
            settings.managers = contacts(sub_m, ARG_MANAGER)?;
            Ok(Action::Bootstrap(bootstrap::Args { settings }))
        }
        Some(("types", sub_m)) => {
            let order = match sub_m.get_one::<String>(ARG_SORT).map(String::as_str) {
                Some("insertion") => ListOrder::Insertion,
                _ => ListOrder::Label,
            };
            Ok(Action::Types(types::Args {
                settings,
                order,
                json: sub_m.get_flag(ARG_JSON),
            }))
        }
        Some(("resolve", _)) => Ok(Action::Resolve(resolve::Args { settings })),
        Some((name, _)) => Err(anyhow!("unknown subcommand: {name}")),
        None => Err(anyhow!("missing subcommand")),
    }
}

fn settings(matches: &ArgMatches) -> Result<Settings> {
    let default_account_type = matches
        .get_one::<String>(ARG_DEFAULT_ACCOUNT_TYPE)
        .cloned()
        .context("missing required argument: --default-account-type")?;

    let usertypes = matches
        .get_one::<String>(ARG_USERTYPES)
        .context("missing required argument: --usertypes")?
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToString::to_string)
        .collect();

    Ok(Settings {
        default_account_type,
        usertypes,
        ..Settings::default()
    })
}

fn contacts(matches: &ArgMatches, id: &str) -> Result<Vec<Contact>> {
    matches
        .get_many::<String>(id)
        .into_iter()
        .flatten()
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| {
            raw.parse::<Contact>()
                .with_context(|| format!("invalid --{id} value"))
        })
        .collect()
}
