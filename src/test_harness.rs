//! Test utilities.
//!
//! [`StaticEngine`] is a canned [`ExecutionEngine`] for exercising the
//! orchestration layer without a real executor: it serves fixed data, can be
//! slowed down per operation to probe ordering, records what it saw, and can
//! be made to fail.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use apollo_compiler::Schema;
use apollo_compiler::validation::Valid;
use async_trait::async_trait;
use serde_json_bytes::Value;
use serde_json_bytes::json;

use crate::context::Context;
use crate::engine::ExecutionEngine;
use crate::engine::ExecutionRequest;
use crate::engine::OperationKind;
use crate::error::EngineError;
use crate::graphql;
use crate::json_ext::Object;

/// A small schema covering all three operation types.
pub fn test_schema() -> Arc<Valid<Schema>> {
    let sdl = r#"
        schema {
            query: Query
            mutation: Mutation
            subscription: Subscription
        }

        type Query {
            hello: String
            echo(value: String): String
        }

        type Mutation {
            bump: Int
        }

        type Subscription {
            ticks: Int
        }
    "#;
    Arc::new(Schema::parse_and_validate(sdl, "schema.graphql").expect("test schema is valid"))
}

/// What the engine observed for one executed operation.
#[derive(Clone, Debug)]
pub struct SeenOperation {
    pub operation_name: Option<String>,
    pub operation_kind: OperationKind,
    pub root_value: Value,
    pub context: Context,
    pub variables: Object,
}

/// An [`ExecutionEngine`] returning canned data.
///
/// Responses are selected by operation name, falling back to the default
/// data. Validation rules handed down by the caller are honored so that
/// rule plumbing can be asserted end to end.
#[derive(Clone)]
pub struct StaticEngine {
    data: Value,
    responses: HashMap<String, Value>,
    delays: HashMap<String, Duration>,
    failures: Vec<graphql::Error>,
    seen: Arc<Mutex<Vec<SeenOperation>>>,
    completions: Arc<Mutex<Vec<String>>>,
}

#[buildstructor::buildstructor]
impl StaticEngine {
    #[builder(visibility = "pub")]
    fn new(
        data: Option<Value>,
        responses: HashMap<String, Value>,
        delays: HashMap<String, Duration>,
        failures: Vec<graphql::Error>,
    ) -> Self {
        Self {
            data: data.unwrap_or_else(|| json!({ "hello": "world" })),
            responses,
            delays,
            failures,
            seen: Default::default(),
            completions: Default::default(),
        }
    }

    /// Operations observed by the engine, in arrival order.
    pub fn seen(&self) -> Vec<SeenOperation> {
        self.seen.lock().expect("seen lock").clone()
    }

    /// Operation names in the order execution completed, which under
    /// concurrency may differ from request order.
    pub fn completion_order(&self) -> Vec<String> {
        self.completions.lock().expect("completions lock").clone()
    }
}

#[async_trait]
impl ExecutionEngine for StaticEngine {
    async fn execute(&self, request: ExecutionRequest) -> Result<graphql::Response, EngineError> {
        if let Some(rules) = &request.validation_rules {
            let violations: Vec<graphql::Error> = rules
                .iter()
                .flat_map(|rule| rule.validate(&request.schema, &request.document))
                .collect();
            if !violations.is_empty() {
                return Ok(graphql::Response::from_errors(violations));
            }
        }

        if !self.failures.is_empty() {
            return Err(EngineError::ExecutionFailure(self.failures.clone()));
        }

        let name = request.operation_name.clone().unwrap_or_default();
        self.seen.lock().expect("seen lock").push(SeenOperation {
            operation_name: request.operation_name.clone(),
            operation_kind: request.operation_kind,
            root_value: request.root_value.clone(),
            context: request.context.clone(),
            variables: request.variables.clone(),
        });

        if let Some(delay) = self.delays.get(&name) {
            tokio::time::sleep(*delay).await;
        }

        self.completions
            .lock()
            .expect("completions lock")
            .push(name.clone());

        let data = self.responses.get(&name).unwrap_or(&self.data).clone();
        Ok(graphql::Response::builder().data(data).build())
    }
}
