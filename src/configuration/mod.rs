//! Server configuration.
//!
//! A [`Configuration`] is an immutable bundle of the schema handle, the
//! execution engine, feature flags and the pluggable policy hooks. It is
//! built once, then shared read-only across every operation of a batch and
//! across concurrent requests.

use std::fmt;
use std::sync::Arc;

use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::validation::Valid;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::Value;
use tower::BoxError;

use crate::context::Context;
use crate::engine::ExecutionEngine;
use crate::engine::FieldResolver;
use crate::engine::OperationKind;
use crate::engine::ValidationRule;
use crate::error::ConfigurationError;
use crate::graphql;
use crate::json_ext::Object;
use crate::persisted_queries::PersistedQueryLoader;

/// Batching configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Batching {
    /// Whether query batching is enabled.
    pub enabled: bool,

    /// Upper bound on the number of operations in one batch.
    pub maximum_size: Option<usize>,
}

impl Batching {
    /// Check if a batch is greater than the maximum size
    pub fn exceeds_batch_size<T>(&self, batch: &[T]) -> bool {
        self.maximum_size
            .map(|size| batch.len() > size)
            .unwrap_or(false)
    }
}

/// How batch members are driven to completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
    /// Fan batch members out concurrently; results are still reassembled in
    /// request order.
    #[default]
    Parallel,
    /// Resolve each member eagerly, in order, before starting the next.
    Serial,
}

/// Bitmask gating how much error detail reaches clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugFlags {
    /// Keep the `debugMessage` extension on formatted errors.
    pub include_debug_message: bool,
    /// Keep the `trace` extension on formatted errors.
    pub include_trace: bool,
}

/// Resolver callback shared by the configurable hooks: invoked once per
/// operation with the descriptor, the parsed document and the operation kind.
pub type HookResolver<T> = Arc<
    dyn Fn(&graphql::Request, &ast::Document, OperationKind) -> Result<T, BoxError>
        + Send
        + Sync,
>;

/// The root value handed to the engine: a fixed value or a per-operation
/// resolver.
#[derive(Clone)]
pub enum RootValue {
    Fixed(Value),
    Resolve(HookResolver<Value>),
}

impl Default for RootValue {
    fn default() -> Self {
        RootValue::Fixed(Value::Null)
    }
}

impl RootValue {
    pub(crate) fn resolve(
        &self,
        request: &graphql::Request,
        document: &ast::Document,
        kind: OperationKind,
    ) -> Result<Value, ConfigurationError> {
        match self {
            RootValue::Fixed(value) => Ok(value.clone()),
            RootValue::Resolve(resolver) => resolver(request, document, kind).map_err(|err| {
                ConfigurationError::HookResolution {
                    hook: "root value",
                    reason: err.to_string(),
                }
            }),
        }
    }
}

/// Overrides the context passed to `execute` when configured.
#[derive(Clone)]
pub enum ContextValue {
    Fixed(Context),
    Resolve(HookResolver<Context>),
}

impl ContextValue {
    pub(crate) fn resolve(
        &self,
        request: &graphql::Request,
        document: &ast::Document,
        kind: OperationKind,
    ) -> Result<Context, ConfigurationError> {
        match self {
            ContextValue::Fixed(context) => Ok(context.clone()),
            ContextValue::Resolve(resolver) => resolver(request, document, kind).map_err(|err| {
                ConfigurationError::HookResolution {
                    hook: "context value",
                    reason: err.to_string(),
                }
            }),
        }
    }
}

/// Which validation rules the engine applies: its defaults, a fixed list, or
/// a per-operation resolver (returning `None` to fall back to the defaults).
#[derive(Clone, Default)]
pub enum ValidationRules {
    #[default]
    EngineDefault,
    Fixed(Vec<Arc<dyn ValidationRule>>),
    Resolve(HookResolver<Option<Vec<Arc<dyn ValidationRule>>>>),
}

impl ValidationRules {
    pub(crate) fn resolve(
        &self,
        request: &graphql::Request,
        document: &ast::Document,
        kind: OperationKind,
    ) -> Result<Option<Vec<Arc<dyn ValidationRule>>>, ConfigurationError> {
        match self {
            ValidationRules::EngineDefault => Ok(None),
            ValidationRules::Fixed(rules) => Ok(Some(rules.clone())),
            ValidationRules::Resolve(resolver) => {
                resolver(request, document, kind).map_err(|err| {
                    ConfigurationError::HookResolution {
                        hook: "validation rules",
                        reason: err.to_string(),
                    }
                })
            }
        }
    }
}

/// Controls the JSON shape of one formatted error.
pub type ErrorFormatter = Arc<dyn Fn(&graphql::Error, DebugFlags) -> Value + Send + Sync>;

/// Controls filtering/mapping of the whole error list. Receives the errors
/// and the configured formatter.
pub type ErrorsHandler =
    Arc<dyn Fn(&[graphql::Error], &dyn Fn(&graphql::Error) -> Value) -> Vec<Value> + Send + Sync>;

/// Error-formatting policy attached to every produced response.
#[derive(Clone)]
pub struct ErrorPolicy {
    pub formatter: ErrorFormatter,
    pub handler: ErrorsHandler,
    pub debug: DebugFlags,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            formatter: Arc::new(default_error_formatter),
            handler: Arc::new(default_errors_handler),
            debug: DebugFlags::default(),
        }
    }
}

impl fmt::Debug for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorPolicy")
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

impl ErrorPolicy {
    /// Apply the handler and formatter to an error list. The underlying
    /// errors are not mutated.
    pub fn format_errors(&self, errors: &[graphql::Error]) -> Vec<Value> {
        let debug = self.debug;
        let formatter = Arc::clone(&self.formatter);
        (self.handler)(errors, &move |error| formatter(error, debug))
    }
}

/// The standard per-error shape: `message`, plus `locations`, `path` and
/// `extensions` when present. `debugMessage` and `trace` extensions are
/// stripped unless the corresponding debug flag is set.
pub fn default_error_formatter(error: &graphql::Error, debug: DebugFlags) -> Value {
    let mut object = Object::new();
    object.insert("message", Value::String(error.message.as_str().into()));
    if !error.locations.is_empty() {
        object.insert(
            "locations",
            serde_json_bytes::to_value(&error.locations).expect("locations are serializable"),
        );
    }
    if let Some(path) = &error.path {
        object.insert(
            "path",
            serde_json_bytes::to_value(path).expect("paths are serializable"),
        );
    }
    let mut extensions = error.extensions.clone();
    if !debug.include_debug_message {
        extensions.remove("debugMessage");
    }
    if !debug.include_trace {
        extensions.remove("trace");
    }
    if !extensions.is_empty() {
        object.insert("extensions", Value::Object(extensions));
    }
    Value::Object(object)
}

fn default_errors_handler(
    errors: &[graphql::Error],
    formatter: &dyn Fn(&graphql::Error) -> Value,
) -> Vec<Value> {
    errors.iter().map(formatter).collect()
}

/// The main configuration bundle for a server instance.
#[derive(Clone)]
pub struct Configuration {
    pub(crate) schema: Option<Arc<Valid<Schema>>>,
    pub(crate) engine: Arc<dyn ExecutionEngine>,
    pub(crate) batching: Batching,
    pub(crate) concurrency: ConcurrencyMode,
    pub(crate) root_value: RootValue,
    pub(crate) context: Option<ContextValue>,
    pub(crate) validation_rules: ValidationRules,
    pub(crate) persisted_query_loader: Option<Arc<dyn PersistedQueryLoader>>,
    pub(crate) field_resolver: Option<Arc<dyn FieldResolver>>,
    pub(crate) error_policy: Arc<ErrorPolicy>,
}

#[buildstructor::buildstructor]
impl Configuration {
    /// Returns a builder that builds a [`Configuration`].
    ///
    /// `engine` is the only required component. A configuration without a
    /// `schema` builds, but every execution against it fails with
    /// [`ConfigurationError::MissingSchema`] — the absence of a schema is a
    /// deployment bug, not a per-request error.
    #[builder(visibility = "pub")]
    fn new(
        engine: Arc<dyn ExecutionEngine>,
        schema: Option<Arc<Valid<Schema>>>,
        batching: Option<Batching>,
        concurrency: Option<ConcurrencyMode>,
        root_value: Option<RootValue>,
        context: Option<ContextValue>,
        validation_rules: Option<ValidationRules>,
        persisted_query_loader: Option<Arc<dyn PersistedQueryLoader>>,
        field_resolver: Option<Arc<dyn FieldResolver>>,
        error_formatter: Option<ErrorFormatter>,
        errors_handler: Option<ErrorsHandler>,
        debug: Option<DebugFlags>,
    ) -> Self {
        let defaults = ErrorPolicy::default();
        let error_policy = Arc::new(ErrorPolicy {
            formatter: error_formatter.unwrap_or(defaults.formatter),
            handler: errors_handler.unwrap_or(defaults.handler),
            debug: debug.unwrap_or_default(),
        });
        Self {
            schema,
            engine,
            batching: batching.unwrap_or_default(),
            concurrency: concurrency.unwrap_or_default(),
            root_value: root_value.unwrap_or_default(),
            context,
            validation_rules: validation_rules.unwrap_or_default(),
            persisted_query_loader,
            field_resolver,
            error_policy,
        }
    }

    pub fn batching(&self) -> &Batching {
        &self.batching
    }

    pub fn error_policy(&self) -> Arc<ErrorPolicy> {
        Arc::clone(&self.error_policy)
    }
}
