use clap::{builder::ValueParser, Arg, ArgAction, Command};

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ENV_LOG_LEVEL: &str = "POLYAUTH_LOG_LEVEL";

/// Level names accepted by `--verbose` and `POLYAUTH_LOG_LEVEL`, quietest first.
pub const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Accepts a level name or a number up to 5.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            return if parsed <= 5 {
                Ok(parsed)
            } else {
                Err(format!("log level {parsed} is above 5"))
            };
        }

        LEVEL_NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(level.trim()))
            .and_then(|index| u8::try_from(index).ok())
            .ok_or_else(|| {
                format!(
                    "invalid log level '{level}', expected one of {}",
                    LEVEL_NAMES.join(", ")
                )
            })
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help(
                "Log level for polyauth: error, warn, info, debug, trace or 0-5; \
                 repeat -v to raise it (default: error)",
            )
            .env(ENV_LOG_LEVEL)
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_env() {
        let command = with_args(Command::new("polyauth"));
        for (index, &level) in LEVEL_NAMES.iter().enumerate() {
            temp_env::with_vars([(ENV_LOG_LEVEL, Some(level))], || {
                let matches = command.clone().get_matches_from(vec!["polyauth"]);
                assert_eq!(
                    matches.get_one::<u8>(ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }

        temp_env::with_vars([(ENV_LOG_LEVEL, Some("5"))], || {
            let matches = command.clone().get_matches_from(vec!["polyauth"]);
            assert_eq!(matches.get_one::<u8>(ARG_VERBOSITY).copied(), Some(5));
        });
    }

    #[test]
    fn test_invalid_log_level() {
        for level in ["loud", "6"] {
            temp_env::with_vars([(ENV_LOG_LEVEL, Some(level))], || {
                let result =
                    with_args(Command::new("polyauth")).try_get_matches_from(vec!["polyauth"]);
                assert!(result.is_err());
            });
        }
    }

    #[test]
    fn test_help_names_levels() {
        let command = with_args(Command::new("polyauth"));
        let arg = command
            .get_arguments()
            .find(|arg| arg.get_id() == ARG_VERBOSITY)
            .unwrap();
        let help = arg.get_help().unwrap().to_string();
        for name in LEVEL_NAMES {
            assert!(help.contains(name));
        }
        assert!(help.contains("default: error"));
    }
}
