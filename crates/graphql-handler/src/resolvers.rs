//! Resolver and directive-resolver maps

use std::{collections::HashMap, future::Future, sync::Arc};

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::{context::ExecutionContext, errors::BoxError};

/// Where a field is being resolved
#[derive(Debug, Clone)]
pub struct ResolveInfo {
    pub parent_type: String,
    pub field_name: String,
}

/// Everything a resolver sees for one field
#[derive(Debug, Clone)]
pub struct ResolveParams {
    /// The value the parent field resolved to; `{}` for root fields
    pub parent: Value,
    pub args: Map<String, Value>,
    pub context: ExecutionContext,
    pub info: ResolveInfo,
}

/// Resolves a single schema field
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, params: ResolveParams) -> Result<Value, BoxError>;
}

#[async_trait]
impl<F, Fut> Resolver for F
where
    F: Fn(ResolveParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
    async fn resolve(&self, params: ResolveParams) -> Result<Value, BoxError> {
        (self)(params).await
    }
}

/// Resolvers keyed by type name, then field name
#[derive(Clone, Default)]
pub struct Resolvers {
    types: HashMap<String, HashMap<String, Arc<dyn Resolver>>>,
}

impl Resolvers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver for `type_name.field_name`, replacing any previous one
    pub fn field(
        mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        resolver: impl Resolver + 'static,
    ) -> Self {
        self.insert(type_name, field_name, Arc::new(resolver));
        self
    }

    pub fn insert(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        resolver: Arc<dyn Resolver>,
    ) {
        self.types
            .entry(type_name.into())
            .or_default()
            .insert(field_name.into(), resolver);
    }

    pub fn get(&self, type_name: &str, field_name: &str) -> Option<Arc<dyn Resolver>> {
        self.types
            .get(type_name)
            .and_then(|fields| fields.get(field_name))
            .cloned()
    }

    /// Every registered `(type, field)` pair
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.types.iter().flat_map(|(type_name, fields)| {
            fields
                .keys()
                .map(move |field_name| (type_name.as_str(), field_name.as_str()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.types.values().all(HashMap::is_empty)
    }
}

impl std::fmt::Debug for Resolvers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut fields: Vec<_> = self
            .fields()
            .map(|(type_name, field_name)| format!("{type_name}.{field_name}"))
            .collect();
        fields.sort();
        f.debug_struct("Resolvers").field("fields", &fields).finish()
    }
}

/// The wrapped field resolution; awaiting it runs the field's resolver
pub type Next = BoxFuture<'static, Result<Value, BoxError>>;

/// Inputs to a directive resolver
#[derive(Debug, Clone)]
pub struct DirectiveParams {
    /// Arguments given to the directive where it is applied in the SDL
    pub directive_args: Map<String, Value>,
    pub field: ResolveParams,
}

/// Wraps the resolution of fields annotated with a directive
#[async_trait]
pub trait DirectiveResolver: Send + Sync {
    async fn resolve(&self, next: Next, params: DirectiveParams) -> Result<Value, BoxError>;
}

#[async_trait]
impl<F, Fut> DirectiveResolver for F
where
    F: Fn(Next, DirectiveParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
    async fn resolve(&self, next: Next, params: DirectiveParams) -> Result<Value, BoxError> {
        (self)(next, params).await
    }
}

/// Directive resolvers keyed by directive name (without the `@`)
#[derive(Clone, Default)]
pub struct DirectiveResolvers {
    directives: HashMap<String, Arc<dyn DirectiveResolver>>,
}

impl DirectiveResolvers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directive(
        mut self,
        name: impl Into<String>,
        resolver: impl DirectiveResolver + 'static,
    ) -> Self {
        self.directives.insert(name.into(), Arc::new(resolver));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DirectiveResolver>> {
        self.directives.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.directives.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for DirectiveResolvers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("DirectiveResolvers")
            .field("directives", &names)
            .finish()
    }
}
