use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context as _;
use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use graphql_handler::{HandlerConfig, Resolvers, create_handler};
use runtime::Config;
use tower_http::trace::TraceLayer;
use tracing::info;

mod runtime;

/// Clap styling
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Arguments to the GraphQL server
#[derive(Debug, clap::Parser)]
#[command(
    version,
    styles = STYLES,
    about = "Serve a GraphQL schema over HTTP",
)]
struct Args {
    /// Path to the config file
    #[arg(env = "GRAPHQL_HANDLER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config: Config = match Args::parse().config {
        Some(path) => runtime::read_config(path)?,
        None => runtime::read_config_from_env()?,
    };

    let _guard = runtime::setup_logging(&config.logging)?;

    info!(
        "GraphQL Handler Server v{}",
        std::env!("CARGO_PKG_VERSION")
    );

    let type_defs = std::fs::read_to_string(&config.schema)
        .with_context(|| format!("Could not read schema from {}", config.schema.display()))?;
    let resolvers = match &config.fixtures {
        Some(path) => runtime::load_fixtures(path)?,
        None => Resolvers::new(),
    };

    let handler = create_handler(
        HandlerConfig::builder()
            .type_defs(type_defs)
            .resolvers(resolvers)
            .maybe_cors(config.cors)
            .log(config.log)
            .maybe_operation_name(config.operation_name)
            .build(),
    )?;

    let router = handler
        .router(&config.path)
        .layer(TraceLayer::new_for_http());

    let address = SocketAddr::new(config.address, config.port);
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("Serving GraphQL at http://{address}{}", config.path);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down");
}
