//! The GraphQL request handler and its factory

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{Request, State},
    response::Response,
    routing::any,
};
use bon::Builder;
use http::{HeaderMap, HeaderValue, Method, StatusCode, header::CONTENT_TYPE};
use serde_json::json;
use tracing::debug;

use crate::{
    context::{ContextProvider, ContextValues, ExecutionContext, ResponseHandle},
    cors::{CorsPolicy, ValidCorsPolicy},
    errors::{HandlerError, SetupError},
    logging::{ErrorLogger, ErrorLogging, log_operation},
    request::{ErrorContext, GraphQLOperation, HttpRequest},
    resolvers::{DirectiveResolvers, Resolvers},
    schema::ExecutableSchema,
};

/// Largest request body read by [`graphql_endpoint`] unless configured otherwise
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Configuration captured when a handler is created
#[derive(Builder)]
pub struct HandlerConfig {
    /// The schema definition language source
    #[builder(into)]
    type_defs: String,

    #[builder(default)]
    resolvers: Resolvers,

    /// Resolvers for directives applied to fields in `type_defs`
    #[builder(default)]
    directives: DirectiveResolvers,

    cors: Option<CorsPolicy>,

    /// Echo each incoming operation to the log
    #[builder(default)]
    log: bool,

    /// Operation to run, overriding any `operationName` in the request body
    #[builder(into)]
    operation_name: Option<String>,

    error_logger: Option<ErrorLogger>,

    context: Option<Arc<dyn ContextProvider>>,

    #[builder(default = DEFAULT_BODY_LIMIT)]
    body_limit: usize,
}

/// Build the schema and return a handler bound to it
pub fn create_handler(config: HandlerConfig) -> Result<GraphQLHandler, SetupError> {
    let schema = ExecutableSchema::build(&config.type_defs, &config.resolvers, &config.directives)?;
    let cors = config.cors.map(CorsPolicy::validate).transpose()?;

    Ok(GraphQLHandler {
        inner: Arc::new(Inner {
            schema,
            cors,
            log: config.log,
            operation_name: config.operation_name,
            error_logging: ErrorLogging::new(config.error_logger),
            context: config.context,
            body_limit: config.body_limit,
        }),
    })
}

struct Inner {
    schema: ExecutableSchema,
    cors: Option<ValidCorsPolicy>,
    log: bool,
    operation_name: Option<String>,
    error_logging: ErrorLogging,
    context: Option<Arc<dyn ContextProvider>>,
    body_limit: usize,
}

/// Handles GraphQL requests against a schema built once at creation
///
/// Cloning is cheap; every clone shares the same schema.
#[derive(Clone)]
pub struct GraphQLHandler {
    inner: Arc<Inner>,
}

impl GraphQLHandler {
    /// Run one request through the handler
    ///
    /// Never fails: request failures are logged and turned into a 401 response carrying the
    /// error message.
    pub async fn handle(&self, request: HttpRequest) -> Response {
        let request = Arc::new(request);
        let operation = GraphQLOperation::from_body(&request.body)
            .map(|operation| operation.with_operation_name(self.inner.operation_name.as_deref()));
        let error_context = ErrorContext::new(operation.as_ref().ok(), &request);

        match self.process(request, operation, &error_context).await {
            Ok(response) => response,
            Err(error) => self.fail(&error, &error_context),
        }
    }

    async fn process(
        &self,
        request: Arc<HttpRequest>,
        operation: Result<GraphQLOperation, HandlerError>,
        error_context: &ErrorContext,
    ) -> Result<Response, HandlerError> {
        let operation = operation?;
        if self.inner.log {
            log_operation(&operation);
        }

        let values = match &self.inner.context {
            Some(provider) => provider
                .context(&request)
                .await
                .map_err(HandlerError::Context)?,
            None => ContextValues::new(),
        };
        let response_handle = ResponseHandle::default();
        let context = ExecutionContext::merge(values, request.clone(), response_handle.clone());

        let result = self.inner.schema.execute(&operation, context).await;

        let mut headers = response_handle.take_headers();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(cors) = &self.inner.cors {
            cors.apply(&mut headers);
            if request.method == Method::OPTIONS {
                debug!("Answering CORS preflight");
                return Ok(build_response(
                    cors.options_success_status(),
                    headers,
                    Body::empty(),
                ));
            }
        }

        if let Some(first) = result.errors.first() {
            self.inner
                .error_logging
                .log(&HandlerError::GraphQL(first.clone()), error_context);
        }

        let body = serde_json::to_vec(&result).map_err(HandlerError::Serialize)?;
        Ok(build_response(StatusCode::OK, headers, Body::from(body)))
    }

    /// Log a request failure and build the 401 envelope for it
    fn fail(&self, error: &HandlerError, error_context: &ErrorContext) -> Response {
        self.inner.error_logging.log(error, error_context);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let body = json!({ "errors": [error.to_string()] }).to_string();
        build_response(StatusCode::UNAUTHORIZED, headers, Body::from(body))
    }

    /// Mount the handler at `path` for every method
    pub fn router(self, path: &str) -> Router {
        Router::new()
            .route(path, any(graphql_endpoint))
            .with_state(self)
    }

    /// The schema every request executes against
    pub fn schema(&self) -> &ExecutableSchema {
        &self.inner.schema
    }
}

/// Axum handler reading the whole body before handing the request to [`GraphQLHandler::handle`]
pub async fn graphql_endpoint(
    State(handler): State<GraphQLHandler>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    match axum::body::to_bytes(body, handler.inner.body_limit).await {
        Ok(bytes) => handler.handle(HttpRequest::from_parts(parts, bytes)).await,
        Err(error) => {
            let request = HttpRequest::from_parts(parts, Bytes::new());
            let error_context = ErrorContext::new(None, &request);
            handler.fail(&HandlerError::ReadBody(error.to_string()), &error_context)
        }
    }
}

fn build_response(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use http::header::{
        ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    };
    use serde_json::Value;
    use tower::ServiceExt as _;
    use tracing_test::traced_test;

    use super::*;
    use crate::{
        errors::BoxError,
        resolvers::{ResolveParams, Resolvers},
    };

    fn hello_resolvers() -> Resolvers {
        Resolvers::new().field("Query", "hello", |_params: ResolveParams| async {
            Ok::<_, BoxError>(json!("world"))
        })
    }

    fn request(method: Method, body: &str) -> HttpRequest {
        HttpRequest::new(
            method,
            "/graphql",
            HeaderMap::new(),
            Bytes::from(body.to_string()),
        )
    }

    async fn body_of(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn counting_logger() -> (ErrorLogger, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let logger: ErrorLogger = Arc::new(move |_error: &HandlerError, _context: &ErrorContext| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (logger, calls)
    }

    #[tokio::test]
    async fn it_answers_queries_with_200() {
        let handler = create_handler(
            HandlerConfig::builder()
                .type_defs("type Query { hello: String }")
                .resolvers(hello_resolvers())
                .build(),
        )
        .unwrap();

        let response = handler
            .handle(request(Method::POST, r#"{"query":"{ hello }"}"#))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert_eq!(body_of(response).await, r#"{"data":{"hello":"world"}}"#);
    }

    #[tokio::test]
    async fn graphql_errors_are_logged_once_and_keep_200() {
        let (logger, calls) = counting_logger();
        let handler = create_handler(
            HandlerConfig::builder()
                .type_defs("type Query { hello: String }")
                .resolvers(hello_resolvers())
                .error_logger(logger)
                .build(),
        )
        .unwrap();

        let response = handler
            .handle(request(Method::POST, r#"{"query":"{ bogus }"}"#))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_of(response).await).unwrap();
        let errors = body["errors"].as_array().unwrap();
        assert!(!errors.is_empty());
        assert!(errors[0]["message"].as_str().unwrap().contains("bogus"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_context_is_a_401() {
        let (logger, calls) = counting_logger();
        let provider = |_request: &HttpRequest| async {
            Err::<ContextValues, BoxError>("missing credentials".into())
        };
        let handler = create_handler(
            HandlerConfig::builder()
                .type_defs("type Query { hello: String }")
                .resolvers(hello_resolvers())
                .error_logger(logger)
                .context(Arc::new(provider) as Arc<dyn ContextProvider>)
                .build(),
        )
        .unwrap();

        let response = handler
            .handle(request(Method::POST, r#"{"query":"{ hello }"}"#))
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_of(response).await,
            r#"{"errors":["missing credentials"]}"#
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_json_is_a_401() {
        let (logger, calls) = counting_logger();
        let handler = create_handler(
            HandlerConfig::builder()
                .type_defs("type Query { hello: String }")
                .error_logger(logger)
                .build(),
        )
        .unwrap();

        let response = handler.handle(request(Method::POST, "{nope")).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: Value = serde_json::from_str(&body_of(response).await).unwrap();
        assert!(
            body["errors"][0]
                .as_str()
                .unwrap()
                .starts_with("Invalid JSON body")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn options_requests_short_circuit_with_cors() {
        let (logger, calls) = counting_logger();
        let handler = create_handler(
            HandlerConfig::builder()
                .type_defs("type Query { hello: String }")
                .resolvers(hello_resolvers())
                .cors(CorsPolicy::default())
                .error_logger(logger)
                .build(),
        )
        .unwrap();

        let response = handler.handle(request(Method::OPTIONS, "")).await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            "POST, OPTIONS"
        );
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
            "*"
        );
        assert_eq!(body_of(response).await, "");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn options_without_cors_runs_the_operation() {
        let handler = create_handler(
            HandlerConfig::builder()
                .type_defs("type Query { hello: String }")
                .resolvers(hello_resolvers())
                .build(),
        )
        .unwrap();

        let response = handler
            .handle(request(Method::OPTIONS, r#"{"query":"{ hello }"}"#))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, r#"{"data":{"hello":"world"}}"#);
    }

    #[tokio::test]
    async fn configured_operation_name_is_used() {
        let handler = create_handler(
            HandlerConfig::builder()
                .type_defs("type Query { hello: String answer: Int }")
                .resolvers(hello_resolvers())
                .operation_name("Hello")
                .build(),
        )
        .unwrap();

        let response = handler
            .handle(request(
                Method::POST,
                r#"{"query":"query Answer { answer } query Hello { hello }","operationName":"Answer"}"#,
            ))
            .await;

        assert_eq!(body_of(response).await, r#"{"data":{"hello":"world"}}"#);
    }

    #[tokio::test]
    async fn resolvers_can_set_response_headers() {
        let resolvers = Resolvers::new().field("Query", "hello", |params: ResolveParams| async move {
            params.context.response().insert_header(
                http::HeaderName::from_static("x-request-url"),
                HeaderValue::from_str(&params.context.request().url)?,
            );
            Ok::<_, BoxError>(json!("world"))
        });
        let handler = create_handler(
            HandlerConfig::builder()
                .type_defs("type Query { hello: String }")
                .resolvers(resolvers)
                .build(),
        )
        .unwrap();

        let response = handler
            .handle(request(Method::POST, r#"{"query":"{ hello }"}"#))
            .await;

        assert_eq!(
            response.headers().get("x-request-url").unwrap(),
            "/graphql"
        );
    }

    #[tokio::test]
    async fn repeated_queries_return_identical_data() {
        let handler = create_handler(
            HandlerConfig::builder()
                .type_defs("type Query { hello: String }")
                .resolvers(hello_resolvers())
                .build(),
        )
        .unwrap();

        let first = body_of(
            handler
                .handle(request(Method::POST, r#"{"query":"{ hello }"}"#))
                .await,
        )
        .await;
        let second = body_of(
            handler
                .handle(request(Method::POST, r#"{"query":"{ hello }"}"#))
                .await,
        )
        .await;

        assert_eq!(first, second);
    }

    #[test]
    fn schema_errors_surface_from_the_factory() {
        let result = create_handler(HandlerConfig::builder().type_defs("type Query {").build());
        assert!(matches!(result, Err(SetupError::Schema(_))));
    }

    #[test]
    fn invalid_cors_policies_surface_from_the_factory() {
        let result = create_handler(
            HandlerConfig::builder()
                .type_defs("type Query { hello: String }")
                .cors(CorsPolicy {
                    options_success_status: 1000,
                    ..Default::default()
                })
                .build(),
        );
        assert!(matches!(result, Err(SetupError::Cors(_))));
    }

    #[traced_test]
    #[tokio::test]
    async fn default_sink_gets_one_record_per_failure() {
        let provider = |_request: &HttpRequest| async {
            Err::<ContextValues, BoxError>("no session".into())
        };
        let handler = create_handler(
            HandlerConfig::builder()
                .type_defs("type Query { hello: String }")
                .resolvers(hello_resolvers())
                .context(Arc::new(provider) as Arc<dyn ContextProvider>)
                .build(),
        )
        .unwrap();

        let response = handler
            .handle(request(Method::POST, r#"{"query":"{ hello }"}"#))
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .filter(|line| line.contains("GraphQL request failed"))
                .count()
            {
                1 => Ok(()),
                n => Err(format!("expected one failure record, found {n}")),
            }
        });
    }

    #[traced_test]
    #[tokio::test]
    async fn default_sink_gets_one_record_per_graphql_error() {
        let handler = create_handler(
            HandlerConfig::builder()
                .type_defs("type Query { hello: String }")
                .resolvers(hello_resolvers())
                .build(),
        )
        .unwrap();

        let response = handler
            .handle(request(Method::POST, r#"{"query":"{ bogus }"}"#))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .filter(|line| line.contains("GraphQL request failed"))
                .count()
            {
                1 => Ok(()),
                n => Err(format!("expected one failure record, found {n}")),
            }
        });
    }

    #[traced_test]
    #[tokio::test]
    async fn oversized_bodies_are_reported_once() {
        let router = create_handler(
            HandlerConfig::builder()
                .type_defs("type Query { hello: String }")
                .resolvers(hello_resolvers())
                .body_limit(4)
                .build(),
        )
        .unwrap()
        .router("/graphql");

        let response = router
            .oneshot(
                http::Request::builder()
                    .method(Method::POST)
                    .uri("/graphql")
                    .body(Body::from(r#"{"query":"{ hello }"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .filter(|line| line.contains("WARN") || line.contains("ERROR"))
                .count()
            {
                1 => Ok(()),
                n => Err(format!("expected one record, found {n}")),
            }
        });
    }

    #[test]
    fn the_schema_is_exposed_for_inspection() {
        let handler = create_handler(
            HandlerConfig::builder()
                .type_defs("type Query { hello: String }")
                .build(),
        )
        .unwrap();

        assert!(handler.schema().sdl().contains("hello: String"));
    }

    #[traced_test]
    #[tokio::test]
    async fn logging_flag_echoes_the_operation() {
        let handler = create_handler(
            HandlerConfig::builder()
                .type_defs("type Query { hello: String }")
                .resolvers(hello_resolvers())
                .log(true)
                .build(),
        )
        .unwrap();

        handler
            .handle(request(
                Method::POST,
                r#"{"query":"{ hello }","variables":{"x":1}}"#,
            ))
            .await;

        assert!(logs_contain("GRAPHQL"));
        assert!(logs_contain(r#"variables: {"x":1}"#));
    }
}
