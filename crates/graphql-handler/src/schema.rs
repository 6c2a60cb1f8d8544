//! Build an executable schema from SDL, resolvers and directive resolvers
//!
//! The SDL is parsed and validated with `apollo-compiler`, then every type it defines is
//! registered with the `async-graphql` dynamic executor. Fields are bound to their resolver from
//! [`Resolvers`], or to the default resolver that reads the field from the parent value.

use std::sync::Arc;

use apollo_compiler::{
    Schema, ast,
    ast::OperationType,
    schema::{
        EnumType, ExtendedType, FieldDefinition, InputObjectType, InputValueDefinition,
        InterfaceType, ObjectType, UnionType,
    },
};
use async_graphql::{
    Name, Value as ConstValue, Variables,
    dynamic::{
        Enum, EnumItem, Field, FieldFuture, FieldValue, InputObject, InputValue, Interface,
        InterfaceField, Object, ResolverContext, Scalar, TypeRef, Union,
    },
};
use futures::FutureExt as _;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    context::ExecutionContext,
    errors::{BoxError, SchemaError},
    request::GraphQLOperation,
    resolvers::{
        DirectiveParams, DirectiveResolver, DirectiveResolvers, Next, ResolveInfo, ResolveParams,
        Resolver, Resolvers,
    },
};

/// A schema with every field bound to a resolver, shared read-only by all requests
#[derive(Clone)]
pub struct ExecutableSchema {
    schema: async_graphql::dynamic::Schema,
}

impl std::fmt::Debug for ExecutableSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutableSchema").finish_non_exhaustive()
    }
}

impl ExecutableSchema {
    pub fn build(
        type_defs: &str,
        resolvers: &Resolvers,
        directives: &DirectiveResolvers,
    ) -> Result<Self, SchemaError> {
        let sdl = Schema::parse_and_validate(type_defs, "schema.graphql")
            .map_err(|errors| SchemaError::Sdl(Box::new(errors)))?;

        let query_root = sdl
            .root_operation(OperationType::Query)
            .ok_or(SchemaError::MissingQueryRoot)?;
        let mutation_root = sdl.root_operation(OperationType::Mutation);

        check_resolvers(&sdl, resolvers)?;
        check_directives(&sdl, directives)?;

        let mut builder = async_graphql::dynamic::Schema::build(
            query_root.as_str(),
            mutation_root.map(|name| name.as_str()),
            None,
        );

        let binder = Binder {
            sdl: &sdl,
            resolvers,
            directives,
        };
        for (name, ty) in &sdl.types {
            if ty.is_built_in() {
                continue;
            }
            builder = match ty {
                ExtendedType::Scalar(scalar) => {
                    let mut registered = Scalar::new(name.as_str());
                    if let Some(description) = &scalar.description {
                        registered = registered.description(description.to_string());
                    }
                    builder.register(registered)
                }
                ExtendedType::Object(object) => builder.register(binder.object(object)?),
                ExtendedType::Interface(interface) => builder.register(interface_type(interface)?),
                ExtendedType::Union(union) => builder.register(union_type(union)),
                ExtendedType::Enum(enum_type) => builder.register(enum_type_of(enum_type)),
                ExtendedType::InputObject(input) => builder.register(input_object(input)?),
            };
        }

        let schema = builder.finish()?;
        debug!(
            query = %query_root,
            mutation = ?mutation_root.map(|name| name.as_str()),
            "Built executable schema"
        );

        Ok(Self { schema })
    }

    /// Execute an operation with an empty root value
    pub async fn execute(
        &self,
        operation: &GraphQLOperation,
        context: ExecutionContext,
    ) -> async_graphql::Response {
        let mut request =
            async_graphql::Request::new(operation.query.clone().unwrap_or_default())
                .variables(Variables::from_json(
                    operation.variables.clone().unwrap_or(Value::Null),
                ))
                .data(context);
        if let Some(operation_name) = &operation.operation_name {
            request = request.operation_name(operation_name.clone());
        }

        self.schema.execute(request).await
    }

    /// The schema rendered back to SDL
    pub fn sdl(&self) -> String {
        self.schema.sdl()
    }
}

fn check_resolvers(sdl: &Schema, resolvers: &Resolvers) -> Result<(), SchemaError> {
    for (type_name, field_name) in resolvers.fields() {
        let defined = match sdl.types.get(type_name) {
            Some(ExtendedType::Object(object)) => object.fields.contains_key(field_name),
            _ => false,
        };
        if !defined {
            return Err(SchemaError::UnknownResolver {
                type_name: type_name.to_string(),
                field_name: field_name.to_string(),
            });
        }
    }
    Ok(())
}

fn check_directives(sdl: &Schema, directives: &DirectiveResolvers) -> Result<(), SchemaError> {
    match directives
        .names()
        .find(|name| !sdl.directive_definitions.contains_key(*name))
    {
        Some(name) => Err(SchemaError::UnknownDirective(name.to_string())),
        None => Ok(()),
    }
}

/// How a resolved JSON value has to be handed to the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputKind {
    Leaf,
    Enum,
    Object,
    Abstract,
}

impl OutputKind {
    fn of(sdl: &Schema, type_name: &str) -> Self {
        match sdl.types.get(type_name) {
            Some(ExtendedType::Object(_)) => Self::Object,
            Some(ExtendedType::Interface(_) | ExtendedType::Union(_)) => Self::Abstract,
            Some(ExtendedType::Enum(_)) => Self::Enum,
            _ => Self::Leaf,
        }
    }
}

struct Binder<'a> {
    sdl: &'a Schema,
    resolvers: &'a Resolvers,
    directives: &'a DirectiveResolvers,
}

impl Binder<'_> {
    fn object(&self, object: &ObjectType) -> Result<Object, SchemaError> {
        let mut registered = Object::new(object.name.as_str());
        if let Some(description) = &object.description {
            registered = registered.description(description.to_string());
        }
        for interface in &object.implements_interfaces {
            registered = registered.implement(interface.as_str());
        }
        for field in object.fields.values() {
            registered = registered.field(self.field(object.name.as_str(), field)?);
        }
        Ok(registered)
    }

    fn field(&self, parent_type: &str, field: &FieldDefinition) -> Result<Field, SchemaError> {
        let directives = field
            .directives
            .iter()
            .filter_map(|directive| {
                self.directives.get(directive.name.as_str()).map(|resolver| {
                    Ok::<_, SchemaError>((resolver, arguments_json(&directive.arguments)?))
                })
            })
            .collect::<Result<_, SchemaError>>()?;

        let binding = Arc::new(FieldBinding {
            info: ResolveInfo {
                parent_type: parent_type.to_string(),
                field_name: field.name.to_string(),
            },
            resolver: self.resolvers.get(parent_type, field.name.as_str()),
            directives,
            ty: field.ty.clone(),
            output: OutputKind::of(self.sdl, field.ty.inner_named_type().as_str()),
        });

        let mut registered = Field::new(field.name.as_str(), type_ref(&field.ty), move |ctx| {
            Arc::clone(&binding).resolve(ctx)
        });
        if let Some(description) = &field.description {
            registered = registered.description(description.to_string());
        }
        for argument in &field.arguments {
            registered = registered.argument(input_value(argument)?);
        }
        Ok(registered)
    }
}

/// Everything needed to resolve one field at request time
struct FieldBinding {
    info: ResolveInfo,
    resolver: Option<Arc<dyn Resolver>>,
    directives: Vec<(Arc<dyn DirectiveResolver>, Map<String, Value>)>,
    ty: ast::Type,
    output: OutputKind,
}

impl FieldBinding {
    fn resolve<'a>(self: Arc<Self>, ctx: ResolverContext<'a>) -> FieldFuture<'a> {
        FieldFuture::new(async move {
            let parent = parent_json(ctx.parent_value)?;

            let value = if self.resolver.is_none() && self.directives.is_empty() {
                default_resolve(&parent, &self.info.field_name)
            } else {
                let params = ResolveParams {
                    parent,
                    args: arguments_from_context(&ctx)?,
                    context: ctx.data::<ExecutionContext>()?.clone(),
                    info: self.info.clone(),
                };
                self.run(params)
                    .await
                    .map_err(|error| async_graphql::Error::new(error.to_string()))?
            };

            into_field_value(value, &self.ty, self.output)
        })
    }

    /// Run the resolver, wrapped by each directive resolver in declaration order
    async fn run(&self, params: ResolveParams) -> Result<Value, BoxError> {
        let resolver = self.resolver.clone();
        let field_params = params.clone();
        let mut next: Next = async move {
            match resolver {
                Some(resolver) => resolver.resolve(field_params).await,
                None => Ok(default_resolve(
                    &field_params.parent,
                    &field_params.info.field_name,
                )),
            }
        }
        .boxed();

        for (directive, directive_args) in &self.directives {
            let directive = Arc::clone(directive);
            let directive_params = DirectiveParams {
                directive_args: directive_args.clone(),
                field: params.clone(),
            };
            let inner = next;
            next = async move { directive.resolve(inner, directive_params).await }.boxed();
        }

        next.await
    }
}

fn default_resolve(parent: &Value, field_name: &str) -> Value {
    parent.get(field_name).cloned().unwrap_or(Value::Null)
}

fn parent_json(parent: &FieldValue<'_>) -> async_graphql::Result<Value> {
    if let Some(value) = parent.downcast_ref::<Value>() {
        return Ok(value.clone());
    }
    match parent.as_value() {
        None | Some(ConstValue::Null) => Ok(Value::Object(Map::new())),
        Some(value) => Ok(value.clone().into_json()?),
    }
}

fn arguments_from_context(ctx: &ResolverContext<'_>) -> async_graphql::Result<Map<String, Value>> {
    ctx.args
        .iter()
        .map(|(name, value)| Ok((name.to_string(), value.as_value().clone().into_json()?)))
        .collect()
}

/// Convert a resolver's JSON result into something the executor can continue with
///
/// Lists are taken from the declared field type, so a scalar may itself hold a JSON array.
/// Objects stay JSON so that their fields can be read by child resolvers; values for interface
/// and union fields name their concrete type through `__typename`.
fn into_field_value<'a>(
    value: Value,
    ty: &ast::Type,
    output: OutputKind,
) -> async_graphql::Result<Option<FieldValue<'a>>> {
    if value.is_null() {
        return Ok(None);
    }

    let field_value = match ty {
        ast::Type::List(item_ty) | ast::Type::NonNullList(item_ty) => {
            let Value::Array(items) = value else {
                return Err(async_graphql::Error::new(format!(
                    "Expected a list for `{ty}`"
                )));
            };
            FieldValue::list(
                items
                    .into_iter()
                    .map(|item| {
                        Ok::<_, async_graphql::Error>(
                            into_field_value(item, item_ty, output)?.unwrap_or(FieldValue::NULL),
                        )
                    })
                    .collect::<async_graphql::Result<Vec<_>>>()?,
            )
        }
        ast::Type::Named(_) | ast::Type::NonNullNamed(_) => match (output, value) {
            (OutputKind::Leaf, value) => FieldValue::value(ConstValue::from_json(value)?),
            (_, Value::Array(_)) => {
                return Err(async_graphql::Error::new(format!(
                    "Expected a single `{ty}` value, not a list"
                )));
            }
            (OutputKind::Enum, Value::String(item)) => {
                FieldValue::value(ConstValue::Enum(Name::new(item)))
            }
            (OutputKind::Enum, other) => FieldValue::value(ConstValue::from_json(other)?),
            (OutputKind::Object, value) => FieldValue::owned_any(value),
            (OutputKind::Abstract, value) => {
                let type_name = value
                    .get("__typename")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .ok_or_else(|| {
                        async_graphql::Error::new(
                            "Abstract type values must name their concrete type in `__typename`",
                        )
                    })?;
                FieldValue::owned_any(value).with_type(type_name)
            }
        },
    };
    Ok(Some(field_value))
}

fn type_ref(ty: &ast::Type) -> TypeRef {
    match ty {
        ast::Type::Named(name) => TypeRef::named(name.as_str()),
        ast::Type::NonNullNamed(name) => TypeRef::named_nn(name.as_str()),
        ast::Type::List(inner) => TypeRef::List(Box::new(type_ref(inner))),
        ast::Type::NonNullList(inner) => {
            TypeRef::NonNull(Box::new(TypeRef::List(Box::new(type_ref(inner)))))
        }
    }
}

fn interface_type(interface: &InterfaceType) -> Result<Interface, SchemaError> {
    let mut registered = Interface::new(interface.name.as_str());
    if let Some(description) = &interface.description {
        registered = registered.description(description.to_string());
    }
    for implemented in &interface.implements_interfaces {
        registered = registered.implement(implemented.as_str());
    }
    for field in interface.fields.values() {
        let mut interface_field = InterfaceField::new(field.name.as_str(), type_ref(&field.ty));
        if let Some(description) = &field.description {
            interface_field = interface_field.description(description.to_string());
        }
        for argument in &field.arguments {
            interface_field = interface_field.argument(input_value(argument)?);
        }
        registered = registered.field(interface_field);
    }
    Ok(registered)
}

fn union_type(union: &UnionType) -> Union {
    let mut registered = Union::new(union.name.as_str());
    if let Some(description) = &union.description {
        registered = registered.description(description.to_string());
    }
    for member in &union.members {
        registered = registered.possible_type(member.as_str());
    }
    registered
}

fn enum_type_of(enum_type: &EnumType) -> Enum {
    let mut registered = Enum::new(enum_type.name.as_str());
    if let Some(description) = &enum_type.description {
        registered = registered.description(description.to_string());
    }
    for value in enum_type.values.values() {
        let mut item = EnumItem::new(value.value.as_str());
        if let Some(description) = &value.description {
            item = item.description(description.to_string());
        }
        registered = registered.item(item);
    }
    registered
}

fn input_object(input: &InputObjectType) -> Result<InputObject, SchemaError> {
    let mut registered = InputObject::new(input.name.as_str());
    if let Some(description) = &input.description {
        registered = registered.description(description.to_string());
    }
    for field in input.fields.values() {
        registered = registered.field(input_value(field)?);
    }
    Ok(registered)
}

fn input_value(definition: &InputValueDefinition) -> Result<InputValue, SchemaError> {
    let mut registered = InputValue::new(definition.name.as_str(), type_ref(&definition.ty));
    if let Some(description) = &definition.description {
        registered = registered.description(description.to_string());
    }
    if let Some(default) = definition.default_value.as_ref()
        && let Some(default) = const_value(default)?
    {
        registered = registered.default_value(default);
    }
    Ok(registered)
}

/// Convert an SDL literal into an executor value; variables have no constant value
fn const_value(value: &ast::Value) -> Result<Option<ConstValue>, SchemaError> {
    Ok(match value {
        ast::Value::Variable(_) => None,
        ast::Value::Enum(name) => Some(ConstValue::Enum(Name::new(name.as_str()))),
        other => ConstValue::from_json(json_value(other)?).ok(),
    })
}

fn json_value(value: &ast::Value) -> Result<Value, SchemaError> {
    Ok(match value {
        ast::Value::Null | ast::Value::Variable(_) => Value::Null,
        ast::Value::Enum(name) => Value::String(name.to_string()),
        ast::Value::String(string) => Value::String(string.clone()),
        ast::Value::Float(float) => float
            .try_to_f64()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| SchemaError::InvalidLiteral(float.to_string()))?,
        ast::Value::Int(int) => {
            let literal = int.as_str();
            literal
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| literal.parse::<u64>().map(Value::from))
                .map_err(|_| SchemaError::InvalidLiteral(literal.to_string()))?
        }
        ast::Value::Boolean(boolean) => Value::Bool(*boolean),
        ast::Value::List(items) => Value::Array(
            items
                .iter()
                .map(|item| json_value(item))
                .collect::<Result<_, _>>()?,
        ),
        ast::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| {
                    Ok::<_, SchemaError>((name.to_string(), json_value(value)?))
                })
                .collect::<Result<_, SchemaError>>()?,
        ),
    })
}

fn arguments_json(
    arguments: &[apollo_compiler::Node<ast::Argument>],
) -> Result<Map<String, Value>, SchemaError> {
    arguments
        .iter()
        .map(|argument| {
            Ok::<_, SchemaError>((argument.name.to_string(), json_value(&argument.value)?))
        })
        .collect()
}
