//! Per-request execution context handed to resolvers

use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue};
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::{errors::BoxError, request::HttpRequest};

/// Key under which the request handle is exposed
pub const REQUEST_KEY: &str = "req";

/// Key under which the response handle is exposed
pub const RESPONSE_KEY: &str = "res";

/// Values contributed by a [`ContextProvider`]
pub type ContextValues = Map<String, Value>;

/// Supplies per-request values to merge into the execution context
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn context(&self, request: &HttpRequest) -> Result<ContextValues, BoxError>;
}

#[async_trait]
impl<F, Fut> ContextProvider for F
where
    F: Fn(&HttpRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ContextValues, BoxError>> + Send + 'static,
{
    async fn context(&self, request: &HttpRequest) -> Result<ContextValues, BoxError> {
        (self)(request).await
    }
}

/// Handle onto the outgoing response
///
/// Resolvers can use it to add headers; they are copied onto the response before the handler
/// sets its own.
#[derive(Debug, Clone, Default)]
pub struct ResponseHandle {
    headers: Arc<Mutex<HeaderMap>>,
}

impl ResponseHandle {
    /// Set a response header, replacing earlier values of the same name
    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        self.headers.lock().insert(name, value);
    }

    /// Add a response header, keeping earlier values of the same name
    pub fn append_header(&self, name: HeaderName, value: HeaderValue) {
        self.headers.lock().append(name, value);
    }

    pub(crate) fn take_headers(&self) -> HeaderMap {
        std::mem::take(&mut *self.headers.lock())
    }
}

/// A single entry of the execution context
#[derive(Debug, Clone, Copy)]
pub enum ContextEntry<'a> {
    Value(&'a Value),
    Request(&'a HttpRequest),
    Response(&'a ResponseHandle),
}

#[derive(Debug)]
struct Inner {
    values: ContextValues,
    request: Arc<HttpRequest>,
    response: ResponseHandle,
}

/// The context a request executes with
///
/// Built by overlaying the request and response handles onto the provider's values, so `req`
/// and `res` shadow same-named provider keys.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    inner: Arc<Inner>,
}

impl ExecutionContext {
    pub fn merge(base: ContextValues, request: Arc<HttpRequest>, response: ResponseHandle) -> Self {
        let mut values = base;
        for key in [REQUEST_KEY, RESPONSE_KEY] {
            values.remove(key);
        }

        Self {
            inner: Arc::new(Inner {
                values,
                request,
                response,
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<ContextEntry<'_>> {
        match key {
            REQUEST_KEY => Some(ContextEntry::Request(&self.inner.request)),
            RESPONSE_KEY => Some(ContextEntry::Response(&self.inner.response)),
            _ => self.inner.values.get(key).map(ContextEntry::Value),
        }
    }

    /// A provider value by key
    pub fn value(&self, key: &str) -> Option<&Value> {
        match self.get(key) {
            Some(ContextEntry::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.inner.request
    }

    pub fn response(&self) -> &ResponseHandle {
        &self.inner.response
    }

    /// Every key resolvers can look up, provider values first
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner
            .values
            .keys()
            .map(String::as_str)
            .chain([REQUEST_KEY, RESPONSE_KEY])
    }
}
