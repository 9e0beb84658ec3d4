//! The operator: orchestrates execution of canonical operation descriptors.
//!
//! Each operation runs a small pipeline: structural validation, document
//! resolution (inline source or persisted query), operation-kind resolution,
//! read-only enforcement, policy-hook resolution, engine invocation and
//! finally error-policy decoration. Batches fan the pipeline out per member
//! and reassemble results in request order.
//!
//! Expected failures are folded into synthetic responses inside the
//! pipeline; only [`ConfigurationError`]s cross this boundary as `Err`.

mod validation;

use std::sync::Arc;

use apollo_compiler::ast;
use futures::future::join_all;

use crate::configuration::Configuration;
use crate::configuration::ContextValue;
use crate::context::Context;
use crate::engine;
use crate::engine::ExecutionRequest;
use crate::engine::OperationKind;
use crate::error::ConfigurationError;
use crate::graphql;
use crate::graphql::DecoratedResponse;
use crate::graphql::IntoGraphQLErrors;
use crate::graphql::Response;
use crate::persisted_queries::PersistedQueryError;

/// Outcome of one pipeline step: carry on with the produced state, or stop
/// with the errors to fold into a synthetic response.
enum StepOutcome<T> {
    Continue(T),
    Failed(Vec<graphql::Error>),
}

/// Executes operations against a [`Configuration`].
///
/// The operator holds no mutable state; it is cheap to clone and safe to
/// share across concurrent requests.
#[derive(Clone)]
pub struct Operator {
    configuration: Arc<Configuration>,
}

impl Operator {
    pub fn new(configuration: Arc<Configuration>) -> Self {
        Self { configuration }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Execute a single operation.
    pub async fn execute(
        &self,
        context: &Context,
        request: graphql::Request,
    ) -> Result<DecoratedResponse, ConfigurationError> {
        self.execute_operation(context, request, false).await
    }

    /// Execute an ordered batch of operations.
    ///
    /// Result `i` always corresponds to request `i`, regardless of the order
    /// in which members complete. Members are isolated: one member's failure
    /// produces its own error response and never cancels its siblings. The
    /// batch resolves only once every member has resolved.
    pub async fn execute_batch(
        &self,
        context: &Context,
        requests: Vec<graphql::Request>,
    ) -> Result<Vec<DecoratedResponse>, ConfigurationError> {
        use crate::configuration::ConcurrencyMode;

        match self.configuration.concurrency {
            ConcurrencyMode::Parallel => {
                // join_all awaits every member and preserves request order,
                // reassembling by index rather than completion time.
                let futures = requests
                    .into_iter()
                    .map(|request| self.execute_operation(context, request, true));
                join_all(futures).await.into_iter().collect()
            }
            ConcurrencyMode::Serial => {
                let mut results = Vec::with_capacity(requests.len());
                for request in requests {
                    results.push(self.execute_operation(context, request, true).await?);
                }
                Ok(results)
            }
        }
    }

    /// Execute a single operation, draining the composed future before
    /// returning. For callers wanting synchronous semantics; must not be
    /// called from within an async runtime.
    pub fn execute_blocking(
        &self,
        context: &Context,
        request: graphql::Request,
    ) -> Result<DecoratedResponse, ConfigurationError> {
        futures::executor::block_on(self.execute(context, request))
    }

    /// Blocking variant of [`Operator::execute_batch`].
    pub fn execute_batch_blocking(
        &self,
        context: &Context,
        requests: Vec<graphql::Request>,
    ) -> Result<Vec<DecoratedResponse>, ConfigurationError> {
        futures::executor::block_on(self.execute_batch(context, requests))
    }

    async fn execute_operation(
        &self,
        context: &Context,
        request: graphql::Request,
        in_batch: bool,
    ) -> Result<DecoratedResponse, ConfigurationError> {
        let response = self.run_pipeline(context, &request, in_batch).await?;
        // Decoration is unconditional: synthetic failures flow through the
        // same error policy as engine-produced responses.
        Ok(response.decorate(self.configuration.error_policy()))
    }

    async fn run_pipeline(
        &self,
        context: &Context,
        request: &graphql::Request,
        in_batch: bool,
    ) -> Result<Response, ConfigurationError> {
        let schema = self
            .configuration
            .schema
            .clone()
            .ok_or(ConfigurationError::MissingSchema)?;

        // Batch policy runs before validation; a disabled-batching response
        // reports nothing about the member's own shape.
        if in_batch && !self.configuration.batching.enabled {
            return Ok(Response::from_errors(vec![
                graphql::Error::builder()
                    .message("Batched queries are not supported")
                    .extension_code("BATCHING_NOT_ENABLED")
                    .build(),
            ]));
        }

        let errors = validation::validate(request);
        if !errors.is_empty() {
            tracing::debug!(
                error_count = errors.len(),
                "request failed structural validation"
            );
            return Ok(Response::from_errors(errors));
        }

        let document = match self.resolve_document(request).await? {
            StepOutcome::Continue(document) => document,
            StepOutcome::Failed(errors) => return Ok(Response::from_errors(errors)),
        };

        let operation_kind =
            match engine::operation_kind(&document, request.operation_name_str()) {
                Some(kind) => kind,
                None => {
                    return Ok(Response::from_errors(vec![
                        graphql::Error::builder()
                            .message("Failed to determine operation type")
                            .extension_code("OPERATION_TYPE_UNDETERMINED")
                            .build(),
                    ]));
                }
            };

        if request.read_only && operation_kind != OperationKind::Query {
            return Ok(Response::from_errors(vec![
                graphql::Error::builder()
                    .message("GET supports only query operation")
                    .extension_code("OPERATION_NOT_ALLOWED")
                    .build(),
            ]));
        }

        let root_value = self
            .configuration
            .root_value
            .resolve(request, &document, operation_kind)?;
        let context = match &self.configuration.context {
            Some(ContextValue::Fixed(fixed)) => fixed.clone(),
            Some(resolver @ ContextValue::Resolve(_)) => {
                resolver.resolve(request, &document, operation_kind)?
            }
            None => context.clone(),
        };
        let validation_rules = self
            .configuration
            .validation_rules
            .resolve(request, &document, operation_kind)?;

        let execution_request = ExecutionRequest {
            schema,
            document,
            operation_name: request.operation_name_str().map(str::to_string),
            operation_kind,
            root_value,
            context,
            variables: request.variables_object().cloned().unwrap_or_default(),
            field_resolver: self.configuration.field_resolver.clone(),
            validation_rules,
        };

        match self.configuration.engine.execute(execution_request).await {
            Ok(response) => Ok(response),
            Err(engine_error) => {
                tracing::debug!(%engine_error, "engine reported a failed execution");
                Ok(Response::from_errors(engine_error.into_graphql_errors()))
            }
        }
    }

    /// Resolve the descriptor to a parsed document: inline source text, or a
    /// persisted query looked up through the configured loader.
    async fn resolve_document(
        &self,
        request: &graphql::Request,
    ) -> Result<StepOutcome<Arc<ast::Document>>, ConfigurationError> {
        if let Some(query_id) = request.query_id_str() {
            let loader = match &self.configuration.persisted_query_loader {
                Some(loader) => loader,
                None => {
                    return Ok(StepOutcome::Failed(vec![
                        graphql::Error::builder()
                            .message("Persisted queries are not supported")
                            .extension_code("PERSISTED_QUERY_NOT_SUPPORTED")
                            .build(),
                    ]));
                }
            };

            return match loader.load(query_id, request).await {
                Ok(persisted) => {
                    tracing::trace!(query_id, "persisted query resolved");
                    Ok(parse_persisted(persisted))
                }
                Err(not_found @ PersistedQueryError::NotFound(_)) => {
                    tracing::debug!(query_id, "persisted query not found");
                    Ok(StepOutcome::Failed(vec![
                        graphql::Error::builder()
                            .message(not_found.to_string())
                            .extension_code("PERSISTED_QUERY_NOT_FOUND")
                            .build(),
                    ]))
                }
                // A failing loader is a broken extension point, not bad input.
                Err(PersistedQueryError::Internal(reason)) => {
                    Err(ConfigurationError::PersistedQueryLoader { reason })
                }
            };
        }

        // Validation guarantees a non-empty string query at this point.
        let source = request.query_str().unwrap_or_default();
        match engine::parse_document(source) {
            Ok(document) => Ok(StepOutcome::Continue(document)),
            Err(parse_error) => Ok(StepOutcome::Failed(parse_error.into_graphql_errors())),
        }
    }
}

fn parse_persisted(
    persisted: crate::persisted_queries::PersistedDocument,
) -> StepOutcome<Arc<ast::Document>> {
    use crate::persisted_queries::PersistedDocument;

    match persisted {
        PersistedDocument::Parsed(document) => StepOutcome::Continue(document),
        PersistedDocument::Source(source) => match engine::parse_document(&source) {
            Ok(document) => StepOutcome::Continue(document),
            Err(parse_error) => StepOutcome::Failed(parse_error.into_graphql_errors()),
        },
    }
}
