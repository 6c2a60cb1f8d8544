//! Error and operation logging

use std::sync::Arc;

use tracing::{error, info};

use crate::{
    errors::HandlerError,
    request::{ErrorContext, GraphQLOperation},
};

/// Callback receiving request failures and the first GraphQL error of each response
pub type ErrorLogger = Arc<dyn Fn(&HandlerError, &ErrorContext) + Send + Sync>;

/// Where errors are reported, chosen once when the handler is created
#[derive(Clone)]
pub enum ErrorLogging {
    Custom(ErrorLogger),

    /// One `tracing` error event per failure
    Default,
}

impl ErrorLogging {
    pub fn new(logger: Option<ErrorLogger>) -> Self {
        logger.map(Self::Custom).unwrap_or(Self::Default)
    }

    pub fn log(&self, error: &HandlerError, context: &ErrorContext) {
        match self {
            Self::Custom(logger) => logger(error, context),
            Self::Default => {
                let context = serde_json::to_string(context).unwrap_or_default();
                error!(error = %error, context = %context, "GraphQL request failed");
            }
        }
    }
}

impl std::fmt::Debug for ErrorLogging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Custom(_) => f.write_str("Custom"),
            Self::Default => f.write_str("Default"),
        }
    }
}

/// Echo an incoming operation: a blank line, a `GRAPHQL` marker, the query, then its variables
/// when there are any
pub(crate) fn log_operation(operation: &GraphQLOperation) {
    info!(target: "graphql_handler::operation", "");
    info!(target: "graphql_handler::operation", "GRAPHQL");
    info!(
        target: "graphql_handler::operation",
        "{}",
        operation.query.as_deref().unwrap_or_default()
    );
    if operation.has_variables() {
        let variables = operation
            .variables
            .as_ref()
            .map(serde_json::Value::to_string)
            .unwrap_or_default();
        info!(target: "graphql_handler::operation", "variables: {variables}");
    }
}
