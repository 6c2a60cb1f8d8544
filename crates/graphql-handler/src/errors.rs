use apollo_compiler::{Schema, validation::WithErrors};

/// Boxed error returned by resolvers and context providers
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error while building the executable schema
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Could not parse GraphQL schema: {0}")]
    Sdl(Box<WithErrors<Schema>>),

    #[error("GraphQL schema has no query root type")]
    MissingQueryRoot,

    #[error("{type_name}.{field_name} defined in resolvers, but not in schema")]
    UnknownResolver {
        type_name: String,
        field_name: String,
    },

    #[error("Directive @{0} defined in directive resolvers, but not in schema")]
    UnknownDirective(String),

    /// A literal in the SDL that has no JSON representation
    #[error("Literal {0} in GraphQL schema is out of range")]
    InvalidLiteral(String),

    #[error("Could not build executable schema: {0}")]
    Executor(#[from] async_graphql::dynamic::SchemaError),
}

/// An error in handler construction
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Invalid CORS policy: {0}")]
    Cors(String),
}

/// An error raised while handling a single request
///
/// Every variant other than [`HandlerError::GraphQL`] aborts the request with a 401 response
/// whose body carries the error's `Display` output.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The first error reported by the executor; the response is still sent with status 200
    #[error("{}", .0.message)]
    GraphQL(async_graphql::ServerError),

    #[error("Invalid JSON body: {0}")]
    InvalidBody(serde_json::Error),

    #[error("Could not read request body: {0}")]
    ReadBody(String),

    /// The context provider rejected the request
    #[error("{0}")]
    Context(BoxError),

    #[error("Could not serialize response: {0}")]
    Serialize(serde_json::Error),
}
