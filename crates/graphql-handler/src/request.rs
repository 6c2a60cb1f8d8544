//! Inbound request snapshot and the pieces extracted from it

use std::collections::BTreeMap;

use axum::body::Bytes;
use http::{HeaderMap, Method, request::Parts};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::HandlerError;

/// An owned snapshot of an inbound HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,

    /// Path and query string
    pub url: String,

    pub headers: HeaderMap,

    /// Parsed query-string parameters (not the GraphQL query)
    pub query_params: BTreeMap<String, String>,

    pub body: Bytes,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>, headers: HeaderMap, body: Bytes) -> Self {
        let url = url.into();
        let query_params = url
            .split_once('?')
            .map(|(_, query)| parse_query_string(query))
            .unwrap_or_default();

        Self {
            method,
            url,
            headers,
            query_params,
            body,
        }
    }

    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        let url = parts
            .uri
            .path_and_query()
            .map(|path_and_query| path_and_query.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());
        Self::new(parts.method, url, parts.headers, body)
    }

    /// Get a header value as a string, if it is present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// The body as JSON, falling back to a string for non-JSON payloads
    fn body_for_diagnostics(&self) -> Value {
        if self.body.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&self.body).into_owned()))
    }
}

fn parse_query_string(query: &str) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

/// The GraphQL fields of a request body
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLOperation {
    #[serde(default)]
    pub query: Option<String>,

    #[serde(default)]
    pub variables: Option<Value>,

    #[serde(default)]
    pub operation_name: Option<String>,
}

impl GraphQLOperation {
    /// Read the operation from a JSON request body
    ///
    /// An empty body yields an empty operation, which the executor then rejects with a GraphQL
    /// error. A body that is not a JSON object carrying these fields is a request failure.
    pub fn from_body(body: &[u8]) -> Result<Self, HandlerError> {
        if body.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(HandlerError::InvalidBody)
    }

    /// Apply the configured operation name, which takes precedence over the one in the body
    pub(crate) fn with_operation_name(mut self, operation_name: Option<&str>) -> Self {
        if let Some(name) = operation_name {
            self.operation_name = Some(name.to_string());
        }
        self
    }

    pub(crate) fn has_variables(&self) -> bool {
        self.variables
            .as_ref()
            .is_some_and(|variables| !variables.is_null())
    }
}

/// Diagnostic record for a request, handed to the error logger on failure
#[derive(Debug, Clone, Serialize)]
pub struct ErrorContext {
    pub operation: OperationDiagnostics,
    pub transport: TransportDiagnostics,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDiagnostics {
    pub query: Option<String>,
    pub variables: Option<Value>,
    pub operation_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransportDiagnostics {
    pub method: String,
    pub query: BTreeMap<String, String>,
    pub body: Value,
    pub headers: BTreeMap<String, String>,
    pub url: String,
}

impl ErrorContext {
    pub fn new(operation: Option<&GraphQLOperation>, request: &HttpRequest) -> Self {
        Self {
            operation: OperationDiagnostics {
                query: operation.and_then(|operation| operation.query.clone()),
                variables: operation.and_then(|operation| operation.variables.clone()),
                operation_name: operation.and_then(|operation| operation.operation_name.clone()),
            },
            transport: TransportDiagnostics {
                method: request.method.to_string(),
                query: request.query_params.clone(),
                body: request.body_for_diagnostics(),
                headers: request
                    .headers
                    .iter()
                    .map(|(name, value)| {
                        (
                            name.to_string(),
                            String::from_utf8_lossy(value.as_bytes()).into_owned(),
                        )
                    })
                    .collect(),
                url: request.url.clone(),
            },
        }
    }
}
