//! CLI command handling
//!
//! Resolves the configuration once, then runs the requested command.

use std::path::Path;

use crate::api::ApiClient;
use crate::commands::{Commands, RunTestsArgs};
use crate::common::{Error, Result};
use crate::config::{resolve_config, ConfigSources, EnvSnapshot, RunTestsConfig};
use crate::run::{self, Strictness};

/// Merge defaults, config file, environment, and CLI flags
pub fn load_config(env: &EnvSnapshot, args: RunTestsArgs) -> Result<RunTestsConfig> {
    let sources = ConfigSources::load(env, args.into_layer()?)?;
    Ok(resolve_config(RunTestsConfig::default(), sources))
}

/// Dispatch a CLI command, returning the process exit code
pub async fn dispatch(command: Commands, env: &EnvSnapshot) -> Result<i32> {
    match command {
        Commands::RunTests(args) => {
            let config = load_config(env, args)?;
            if config.api_key.is_empty() || config.app_key.is_empty() {
                return Err(Error::Config(
                    "Missing API or application key. Set DATADOG_API_KEY and DATADOG_APP_KEY, or pass --api-key and --app-key".to_string(),
                ));
            }

            let client = ApiClient::new(&config)?;
            let root = std::env::current_dir()?;
            let outcome = run::run_tests(&client, &config, &root).await?;

            run::print_outcome(&config, &outcome);
            if let Some(path) = &config.json_report {
                run::write_json_report(Path::new(path), &outcome)?;
            }
            Ok(outcome.exit_code(Strictness::from(&config)))
        }

        Commands::Config(args) => {
            let config = load_config(env, args)?;
            println!("{}", serde_json::to_string_pretty(&config.redacted())?);
            Ok(run::EXIT_OK)
        }
    }
}
