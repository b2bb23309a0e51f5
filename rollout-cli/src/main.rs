mod config;
mod store;

use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rollout_lib::{AtomicStore, Identify, Rollout};
use tracing_subscriber::EnvFilter;

use crate::config::RolloutConfig;

#[derive(Parser, Debug)]
#[command(name = "rollout")]
#[command(version)]
#[command(about = "Gradual feature rollouts backed by a key-value store", long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short = 'c', long = "config", default_value = "rollout.toml", env = "ROLLOUT_CONFIG")]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Turn a feature on for everyone
    Activate { feature: String },
    /// Clear every rule of a feature
    Deactivate { feature: String },
    /// Turn a feature fully on or off
    Set {
        feature: String,
        #[arg(action = clap::ArgAction::Set)]
        active: bool,
    },
    ActivateUser { feature: String, user: String },
    DeactivateUser { feature: String, user: String },
    ActivateGroup { feature: String, group: String },
    DeactivateGroup { feature: String, group: String },
    ActivateLocale {
        feature: String,
        locale: String,
        #[arg(default_value_t = 0, allow_negative_numbers = true)]
        percentage: i64,
    },
    DeactivateLocale { feature: String, locale: String },
    ActivatePercentage {
        feature: String,
        #[arg(allow_negative_numbers = true)]
        percentage: i64,
    },
    DeactivatePercentage { feature: String },
    /// Check whether a feature is on, exits with 1 when it is off
    Active {
        feature: String,
        /// User identity, omit to check the feature without a user
        user: Option<String>,
        /// Locale of the user, matched against the configured locales
        #[arg(short = 'l', long = "locale")]
        locale: Option<String>,
    },
    /// Print the rules of a feature as JSON
    Get { feature: String },
    /// List every known feature
    List,
    /// Remove every feature
    Clear,
}

/// User as seen from the command line.
#[derive(Debug, Clone)]
struct CliUser {
    id: String,
    locale: Option<String>,
}

impl CliUser {
    fn new(id: &str) -> Self {
        CliUser {
            id: id.to_string(),
            locale: None,
        }
    }
}

impl Identify for CliUser {
    fn identify(&self) -> String {
        self.id.clone()
    }
}

type CliRollout = Rollout<Arc<dyn AtomicStore>, CliUser>;

fn build_rollout(config: &RolloutConfig) -> Result<CliRollout, String> {
    let storage = store::open(&config.storage)?;
    let mut rollout: CliRollout = Rollout::builder(storage)
        .options(config.options.clone())
        .build();

    for (group, members) in &config.groups {
        let members = members.clone();
        rollout.define_group(group, move |user: &CliUser| members.contains(&user.id));
    }
    for locale in &config.locales {
        let name = locale.clone();
        rollout.define_locale(locale, move |user: &CliUser| user.locale.as_deref() == Some(name.as_str()));
    }
    Ok(rollout)
}

fn run(rollout: &CliRollout, cmd: Command) -> Result<bool, rollout_lib::Error> {
    match cmd {
        Command::Activate { feature } => rollout.activate(&feature)?,
        Command::Deactivate { feature } => rollout.deactivate(&feature)?,
        Command::Set { feature, active } => rollout.set(&feature, active)?,
        Command::ActivateUser { feature, user } => rollout.activate_user(&feature, &CliUser::new(&user))?,
        Command::DeactivateUser { feature, user } => {
            rollout.deactivate_user(&feature, &CliUser::new(&user))?
        }
        Command::ActivateGroup { feature, group } => rollout.activate_group(&feature, &group)?,
        Command::DeactivateGroup { feature, group } => rollout.deactivate_group(&feature, &group)?,
        Command::ActivateLocale {
            feature,
            locale,
            percentage,
        } => rollout.activate_locale(&feature, &locale, percentage)?,
        Command::DeactivateLocale { feature, locale } => rollout.deactivate_locale(&feature, &locale)?,
        Command::ActivatePercentage { feature, percentage } => {
            rollout.activate_percentage(&feature, percentage)?
        }
        Command::DeactivatePercentage { feature } => rollout.deactivate_percentage(&feature)?,
        Command::Active {
            feature,
            user,
            locale,
        } => {
            let user = user.map(|id| CliUser {
                id,
                locale,
            });
            let active = rollout.is_active(&feature, user.as_ref())?;
            println!("{}", active);
            return Ok(active);
        }
        Command::Get { feature } => {
            let info = rollout.info(&feature)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::List => {
            for name in rollout.features()? {
                println!("{}", name);
            }
        }
        Command::Clear => rollout.clear()?,
    }
    Ok(true)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match RolloutConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };
    config.apply_env_overrides();

    let rollout = match build_rollout(&config) {
        Ok(rollout) => rollout,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    match run(&rollout, args.cmd) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;

    fn memory_rollout(toml: &str) -> CliRollout {
        let mut config = RolloutConfig::parse(toml).unwrap();
        config.storage.backend = StorageBackend::Memory;
        build_rollout(&config).unwrap()
    }

    #[test]
    fn test_configured_groups() {
        let rollout = memory_rollout("[groups]\nbeta = [\"alice\"]");
        run(
            &rollout,
            Command::ActivateGroup {
                feature: "chat".into(),
                group: "beta".into(),
            },
        )
        .unwrap();
        assert!(rollout.is_active("chat", Some(&CliUser::new("alice"))).unwrap());
        assert!(!rollout.is_active("chat", Some(&CliUser::new("bob"))).unwrap());
    }

    #[test]
    fn test_configured_locales() {
        let rollout = memory_rollout("locales = [\"fr\"]");
        rollout.activate_locale("chat", "fr", 100).unwrap();
        let active = run(
            &rollout,
            Command::Active {
                feature: "chat".into(),
                user: Some("alice".into()),
                locale: Some("fr".into()),
            },
        )
        .unwrap();
        assert!(active);

        let active = run(
            &rollout,
            Command::Active {
                feature: "chat".into(),
                user: Some("alice".into()),
                locale: Some("de".into()),
            },
        )
        .unwrap();
        assert!(!active);
    }

    #[test]
    fn test_active_without_user() {
        let rollout = memory_rollout("");
        run(&rollout, Command::Activate { feature: "chat".into() }).unwrap();
        let active = run(
            &rollout,
            Command::Active {
                feature: "chat".into(),
                user: None,
                locale: None,
            },
        )
        .unwrap();
        assert!(active);
    }

    #[test]
    fn test_clear() {
        let rollout = memory_rollout("");
        run(
            &rollout,
            Command::ActivateUser {
                feature: "chat".into(),
                user: "alice".into(),
            },
        )
        .unwrap();
        assert_eq!(rollout.features().unwrap(), vec!["chat"]);
        run(&rollout, Command::Clear).unwrap();
        assert!(rollout.features().unwrap().is_empty());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["rollout", "activate-locale", "chat", "fr", "20"]).unwrap();
        assert!(matches!(
            args.cmd,
            Command::ActivateLocale { ref locale, percentage: 20, .. } if locale == "fr"
        ));
        assert_eq!(args.config, "rollout.toml");

        let args = Args::try_parse_from(["rollout", "set", "chat", "false"]).unwrap();
        assert!(matches!(args.cmd, Command::Set { active: false, .. }));
    }
}
