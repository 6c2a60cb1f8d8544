//! Cross Origin Resource Sharing (CORS) policy for the GraphQL handler
//!
//! # Default Behavior
//!
//! When no policy is configured, no CORS headers are added and `OPTIONS` requests are handled
//! like any other request. When a policy is configured with default settings:
//! - **Origin:** `*`
//! - **Headers:** `*`
//! - **Preflight status:** `204`
//!
//! Every response then carries `Access-Control-Allow-Origin`, `Access-Control-Allow-Methods`
//! (always `POST, OPTIONS`) and `Access-Control-Allow-Headers`, and `OPTIONS` requests are
//! answered with an empty body and the preflight status.

use http::{
    HeaderMap, HeaderValue, StatusCode,
    header::{
        ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    },
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::SetupError;

/// Methods advertised in `Access-Control-Allow-Methods`
pub const ALLOWED_METHODS: &str = "POST, OPTIONS";

/// Cross origin request policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
#[serde(default)]
pub struct CorsPolicy {
    /// Value of `Access-Control-Allow-Origin`. Defaults to `*`.
    pub origin: String,

    /// Value of `Access-Control-Allow-Headers`. Defaults to `*`.
    pub headers: String,

    /// Status code sent in response to `OPTIONS` requests. Defaults to 204.
    pub options_success_status: u16,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            headers: default_headers(),
            options_success_status: default_options_success_status(),
        }
    }
}

fn default_origin() -> String {
    "*".into()
}

fn default_headers() -> String {
    "*".into()
}

const fn default_options_success_status() -> u16 {
    204
}

/// A [`CorsPolicy`] whose values have been checked and converted to header values
#[derive(Debug, Clone)]
pub(crate) struct ValidCorsPolicy {
    origin: HeaderValue,
    headers: HeaderValue,
    options_success_status: StatusCode,
}

impl CorsPolicy {
    pub(crate) fn validate(self) -> Result<ValidCorsPolicy, SetupError> {
        let origin = HeaderValue::from_str(&self.origin).map_err(|_| {
            SetupError::Cors(format!(
                "origin '{}' is not valid: failed to parse header value",
                self.origin
            ))
        })?;

        let headers = HeaderValue::from_str(&self.headers).map_err(|_| {
            SetupError::Cors(format!(
                "allowed headers '{}' are not valid: failed to parse header value",
                self.headers
            ))
        })?;

        let options_success_status = StatusCode::from_u16(self.options_success_status)
            .map_err(|_| {
                SetupError::Cors(format!(
                    "options success status {} is not a valid HTTP status code",
                    self.options_success_status
                ))
            })?;

        Ok(ValidCorsPolicy {
            origin,
            headers,
            options_success_status,
        })
    }
}

impl ValidCorsPolicy {
    pub(crate) fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.origin.clone());
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, self.headers.clone());
    }

    pub(crate) fn options_success_status(&self) -> StatusCode {
        self.options_success_status
    }
}
