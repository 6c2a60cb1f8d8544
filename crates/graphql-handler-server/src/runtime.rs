//! Runtime utilites
//!
//! This module is only used by the binaries and provides helper code related to runtime
//! configuration.

mod config;
mod fixtures;
mod logging;

use std::path::Path;

pub use config::Config;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
pub use fixtures::load_fixtures;
pub use logging::setup_logging;

/// Prefix for environment variables read into the config
const ENV_PREFIX: &str = "GRAPHQL_HANDLER_";

/// Separator to use when drilling down into nested options in the env figment
const ENV_NESTED_SEPARATOR: &str = "__";

/// Read configuration from environment variables only (when no config file is provided)
#[allow(clippy::result_large_err)]
pub fn read_config_from_env() -> Result<Config, figment::Error> {
    Figment::new()
        .join(Env::prefixed(ENV_PREFIX).split(ENV_NESTED_SEPARATOR))
        .extract()
}

/// Read in a config from a YAML file, filling in any missing values from the environment
#[allow(clippy::result_large_err)]
pub fn read_config(yaml_path: impl AsRef<Path>) -> Result<Config, figment::Error> {
    Figment::new()
        .join(Env::prefixed(ENV_PREFIX).split(ENV_NESTED_SEPARATOR))
        .join(Yaml::file(yaml_path))
        .extract()
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use super::{read_config, read_config_from_env};

    #[test]
    fn it_prioritizes_env_vars() {
        let config = r#"
            schema: schema.graphql
            port: 4000
        "#;

        figment::Jail::expect_with(move |jail| {
            let path = "config.yaml";

            jail.create_file(path, config)?;
            jail.set_env("GRAPHQL_HANDLER_PORT", "8080");

            let config = read_config(path)?;

            assert_eq!(config.port, 8080);
            Ok(())
        });
    }

    #[test]
    fn it_extracts_nested_env() {
        let config = r#"
            schema: schema.graphql
            cors:
                origin: https://from_file.example.com
        "#;

        figment::Jail::expect_with(move |jail| {
            let path = "config.yaml";

            jail.create_file(path, config)?;
            jail.set_env("GRAPHQL_HANDLER_CORS__OPTIONS_SUCCESS_STATUS", "200");

            let config = read_config(path)?;

            let cors = config.cors.unwrap_or_default();
            assert_eq!(cors.origin, "https://from_file.example.com");
            assert_eq!(cors.options_success_status, 200);
            Ok(())
        });
    }

    #[test]
    fn it_merges_env_and_file() {
        let config = "
            schema: schema.graphql
            path: /api/graphql
        ";

        figment::Jail::expect_with(move |jail| {
            let path = "config.yaml";

            jail.create_file(path, config)?;
            jail.set_env("GRAPHQL_HANDLER_LOG", "true");

            let config = read_config(path)?;

            assert_eq!(config.path, "/api/graphql");
            assert!(config.log);
            Ok(())
        });
    }

    #[test]
    fn it_reads_env_without_a_file() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("GRAPHQL_HANDLER_SCHEMA", "from_env.graphql");
            jail.set_env("GRAPHQL_HANDLER_OPERATION_NAME", "Dashboard");

            let config = read_config_from_env()?;

            assert_eq!(config.schema, PathBuf::from("from_env.graphql"));
            assert_eq!(config.operation_name.as_deref(), Some("Dashboard"));
            Ok(())
        });
    }

    #[test]
    fn it_requires_a_schema() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "port: 4000")?;

            assert!(read_config("config.yaml").is_err());
            Ok(())
        });
    }
}
