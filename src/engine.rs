//! The execution engine boundary.
//!
//! The operator does not execute documents itself: it parses the source,
//! determines the operation kind, and hands everything to an
//! [`ExecutionEngine`] supplied by the caller. The engine owns the type
//! system, validation-rule evaluation and field resolution.

use std::fmt;
use std::sync::Arc;

use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::validation::Valid;
use apollo_compiler::validation::WithErrors;
use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::Value;

use crate::context::Context;
use crate::error::EngineError;
use crate::error::ParseErrors;
use crate::graphql;
use crate::json_ext::Object;

/// The kind of a GraphQL operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl From<ast::OperationType> for OperationKind {
    fn from(operation_type: ast::OperationType) -> Self {
        match operation_type {
            ast::OperationType::Query => OperationKind::Query,
            ast::OperationType::Mutation => OperationKind::Mutation,
            ast::OperationType::Subscription => OperationKind::Subscription,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Query => write!(f, "query"),
            OperationKind::Mutation => write!(f, "mutation"),
            OperationKind::Subscription => write!(f, "subscription"),
        }
    }
}

/// A validation rule evaluated by the engine before execution.
///
/// Rules are opaque to the operator; it only resolves which rules apply
/// (via the configured hook) and passes them through.
pub trait ValidationRule: Send + Sync {
    /// Check the parsed document, returning any violations.
    fn validate(&self, schema: &Valid<Schema>, document: &ast::Document) -> Vec<graphql::Error>;
}

/// Fallback resolver for fields without an explicit resolver, passed through
/// opaquely to the engine.
pub trait FieldResolver: Send + Sync {
    fn resolve_field(&self, parent: &Value, field_name: &str, arguments: &Object) -> Value;
}

/// Everything the engine needs to execute one operation.
pub struct ExecutionRequest {
    pub schema: Arc<Valid<Schema>>,
    pub document: Arc<ast::Document>,
    pub operation_name: Option<String>,
    pub operation_kind: OperationKind,
    pub root_value: Value,
    pub context: Context,
    pub variables: Object,
    pub field_resolver: Option<Arc<dyn FieldResolver>>,
    /// `None` means the engine's default rule set applies.
    pub validation_rules: Option<Vec<Arc<dyn ValidationRule>>>,
}

/// The query-execution engine consumed by the operator.
///
/// Execution is an opaque deferred operation: the operator awaits the
/// returned future without assuming anything about when it resolves.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn execute(&self, request: ExecutionRequest) -> Result<graphql::Response, EngineError>;
}

/// Parse request source text into a document.
pub(crate) fn parse_document(source: &str) -> Result<Arc<ast::Document>, EngineError> {
    ast::Document::parse(source.to_string(), "request.graphql")
        .map(Arc::new)
        .map_err(|WithErrors { errors, .. }| EngineError::ParseFailure(ParseErrors { errors }))
}

/// Find the named (or sole) operation in a document and return its kind.
///
/// Returns `None` when the document contains no matching operation, or
/// several operations but no name to select one.
pub(crate) fn operation_kind(
    document: &ast::Document,
    operation_name: Option<&str>,
) -> Option<OperationKind> {
    let mut operations = document.definitions.iter().filter_map(|definition| {
        if let ast::Definition::OperationDefinition(operation) = definition {
            Some(operation)
        } else {
            None
        }
    });

    match operation_name {
        Some(name) => operations
            .find(|operation| {
                operation
                    .name
                    .as_ref()
                    .is_some_and(|candidate| candidate.as_str() == name)
            })
            .map(|operation| operation.operation_type.into()),
        None => match (operations.next(), operations.next()) {
            (Some(operation), None) => Some(operation.operation_type.into()),
            // zero operations, or several with no name to pick one
            _ => None,
        },
    }
}
