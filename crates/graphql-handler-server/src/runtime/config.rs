use std::{
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
};

use graphql_handler::CorsPolicy;
use schemars::JsonSchema;
use serde::Deserialize;

use super::logging::Logging;

/// Configuration for the GraphQL server
#[derive(Debug, Deserialize, JsonSchema)]
pub struct Config {
    /// Path to the schema definition language file
    pub schema: PathBuf,

    /// Path to a JSON file of root field values, keyed by root type then field
    #[serde(default)]
    pub fixtures: Option<PathBuf>,

    /// The IP address to bind to
    #[serde(default = "defaults::address")]
    pub address: IpAddr,

    /// The port to bind to
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// The path the handler is mounted at
    #[serde(default = "defaults::path")]
    pub path: String,

    /// Cross origin policy; no CORS headers are sent when absent
    #[serde(default)]
    pub cors: Option<CorsPolicy>,

    /// Echo each incoming operation to the log
    #[serde(default)]
    pub log: bool,

    /// Operation to run, overriding the request's `operationName`
    #[serde(default)]
    pub operation_name: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: Logging,
}

mod defaults {
    use super::*;

    pub(super) const fn address() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    pub(super) const fn port() -> u16 {
        4000
    }

    pub(super) fn path() -> String {
        "/graphql".into()
    }
}
