pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};

use crate::{
    settings::{CONTACT_DELIMITER, DEFAULT_ACCOUNT_TYPE},
    usertypes::DEFAULT_INSTALLED,
};

pub const ARG_DEFAULT_ACCOUNT_TYPE: &str = "default-account-type";
pub const ARG_USERTYPES: &str = "usertypes";
pub const ARG_DSN: &str = "dsn";
pub const ARG_ADMIN: &str = "admin";
pub const ARG_MANAGER: &str = "manager";
pub const ARG_SORT: &str = "sort";
pub const ARG_JSON: &str = "json";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("polyauth")
        .about("Polymorphic user accounts")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new(ARG_DEFAULT_ACCOUNT_TYPE)
                .long("default-account-type")
                .help("Default account type, 'app_label.ModelName' or module path")
                .env("POLYAUTH_DEFAULT_ACCOUNT_TYPE")
                .default_value(DEFAULT_ACCOUNT_TYPE)
                .global(true),
        )
        .arg(
            Arg::new(ARG_USERTYPES)
                .long("usertypes")
                .help("Installed account type modules, comma separated")
                .env("POLYAUTH_USERTYPES")
                .default_value(DEFAULT_INSTALLED)
                .global(true),
        )
        .subcommand(bootstrap())
        .subcommand(
            Command::new("types")
                .about("List registered account types")
                .arg(
                    Arg::new(ARG_SORT)
                        .long("sort")
                        .help("Listing order")
                        .value_parser(["label", "insertion"])
                        .default_value("label"),
                )
                .arg(
                    Arg::new(ARG_JSON)
                        .long("json")
                        .help("Print descriptors as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("resolve").about("Resolve the default account type"),
        );

    logging::with_args(command)
}

fn bootstrap() -> Command {
    Command::new("bootstrap")
        .about("Create the configured administrator and manager accounts")
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long("dsn")
                .help("Database connection string, without it accounts are created in memory")
                .env("POLYAUTH_DSN"),
        )
        .arg(
            Arg::new(ARG_ADMIN)
                .long("admin")
                .help("Administrator contact, 'Display Name <address>'")
                .env("POLYAUTH_ADMINS")
                .value_delimiter(CONTACT_DELIMITER)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new(ARG_MANAGER)
                .long("manager")
                .help("Manager contact, 'Display Name <address>'")
                .env("POLYAUTH_MANAGERS")
                .value_delimiter(CONTACT_DELIMITER)
                .action(ArgAction::Append),
        )
}
