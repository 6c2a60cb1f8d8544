//! Serve a GraphQL schema, built from SDL and resolver maps, behind a single HTTP handler
//!
//! ```no_run
//! use graphql_handler::{BoxError, HandlerConfig, ResolveParams, Resolvers, create_handler};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let handler = create_handler(
//!     HandlerConfig::builder()
//!         .type_defs("type Query { hello: String }")
//!         .resolvers(Resolvers::new().field("Query", "hello", |_params: ResolveParams| async {
//!             Ok::<_, BoxError>(json!("world"))
//!         }))
//!         .build(),
//! )?;
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:4000").await?;
//! axum::serve(listener, handler.router("/graphql")).await?;
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod cors;
pub mod errors;
mod handler;
pub mod logging;
pub mod request;
pub mod resolvers;
pub mod schema;

pub use context::{ContextProvider, ContextValues, ExecutionContext, ResponseHandle};
pub use cors::CorsPolicy;
pub use errors::{BoxError, HandlerError, SchemaError, SetupError};
pub use handler::{
    DEFAULT_BODY_LIMIT, GraphQLHandler, HandlerConfig, create_handler, graphql_endpoint,
};
pub use logging::{ErrorLogger, ErrorLogging};
pub use request::{ErrorContext, GraphQLOperation, HttpRequest};
pub use resolvers::{
    DirectiveParams, DirectiveResolver, DirectiveResolvers, Next, ResolveInfo, ResolveParams,
    Resolver, Resolvers,
};
pub use schema::ExecutableSchema;
