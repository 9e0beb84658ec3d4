//! End-to-end tests over the axum HTTP surface.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use graphql_operator::Configuration;
use graphql_operator::HttpService;
use graphql_operator::Operator;
use graphql_operator::configuration::Batching;
use graphql_operator::configuration::DebugFlags;
use graphql_operator::engine::ExecutionEngine;
use graphql_operator::graphql;
use graphql_operator::persisted_queries::PersistedDocument;
use graphql_operator::persisted_queries::PersistedQueryError;
use graphql_operator::persisted_queries::PersistedQueryLoader;
use graphql_operator::test_harness::StaticEngine;
use graphql_operator::test_harness::test_schema;
use http::Method;
use http::StatusCode;
use http::header::CONTENT_TYPE;
use serde_json_bytes::json;
use tower::ServiceExt;

fn app(configuration: Configuration) -> Router {
    graphql_operator::axum_factory::router(HttpService::new(Operator::new(Arc::new(
        configuration,
    ))))
}

fn default_app() -> Router {
    app(Configuration::builder()
        .engine(Arc::new(StaticEngine::builder().build()) as Arc<dyn ExecutionEngine>)
        .schema(test_schema())
        .build())
}

fn post(body: &str) -> http::Request<Body> {
    http::Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> http::Request<Body> {
    http::Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    serde_json::from_slice(&bytes).expect("valid JSON body")
}

#[tokio::test]
async fn single_post_query() {
    let response = default_app()
        .oneshot(post(r#"{"query":"{ hello }"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    insta::assert_json_snapshot!(body_json(response).await, @r###"
    {
      "data": {
        "hello": "world"
      }
    }
    "###);
}

#[tokio::test]
async fn structural_errors_name_both_source_parameters() {
    let response = default_app().oneshot(post("{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    insta::assert_json_snapshot!(body_json(response).await, @r###"
    {
      "errors": [
        {
          "message": "GraphQL Request must include at least one of those two parameters: \"query\" or \"queryId\"",
          "extensions": {
            "code": "INVALID_GRAPHQL_REQUEST"
          }
        }
      ]
    }
    "###);
}

#[tokio::test]
async fn array_variables_accumulate_with_other_violations() {
    let response = default_app()
        .oneshot(post(r#"{"query":"{ hello }","variables":[1,2],"operationName":7}"#))
        .await
        .unwrap();
    let body = body_json(response).await;
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    let messages: Vec<&str> = errors
        .iter()
        .map(|error| error["message"].as_str().unwrap())
        .collect();
    assert!(messages.iter().any(|m| m.contains("\"variables\" must be object")));
    assert!(messages.iter().any(|m| m.contains("\"operationName\" must be string")));
}

#[tokio::test]
async fn batch_responses_follow_request_order_not_completion_order() {
    // The first member is delayed past the others; the response array must
    // still match the request array slot for slot.
    let engine = StaticEngine::builder()
        .responses(HashMap::from([
            ("A".to_string(), json!({ "member": "a" })),
            ("B".to_string(), json!({ "member": "b" })),
            ("C".to_string(), json!({ "member": "c" })),
        ]))
        .delays(HashMap::from([(
            "A".to_string(),
            Duration::from_millis(50),
        )]))
        .build();
    let probe = engine.clone();
    let app = app(Configuration::builder()
        .engine(Arc::new(engine) as Arc<dyn ExecutionEngine>)
        .schema(test_schema())
        .batching(Batching {
            enabled: true,
            maximum_size: None,
        })
        .build());

    let response = app
        .oneshot(post(
            r#"[{"query":"query A { hello }"},{"query":"query B { hello }"},{"query":"query C { hello }"}]"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!([
            { "data": { "member": "a" } },
            { "data": { "member": "b" } },
            { "data": { "member": "c" } },
        ])
    );
    assert_eq!(probe.completion_order().last(), Some(&"A".to_string()));
}

#[tokio::test]
async fn disabled_batching_yields_one_synthetic_error_per_member() {
    let response = default_app()
        .oneshot(post(r#"[{"query":"{ hello }"},{"query":"{ hello }"}]"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let members = body.as_array().unwrap();
    assert_eq!(members.len(), 2);
    for member in members {
        assert_eq!(
            member["errors"][0]["message"],
            serde_json::json!("Batched queries are not supported")
        );
    }
}

#[tokio::test]
async fn get_mutation_is_rejected() {
    let response = default_app()
        .oneshot(get("/?query=mutation%20%7B%20bump%20%7D"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    insta::assert_json_snapshot!(body_json(response).await, @r###"
    {
      "errors": [
        {
          "message": "GET supports only query operation",
          "extensions": {
            "code": "OPERATION_NOT_ALLOWED"
          }
        }
      ]
    }
    "###);
}

#[tokio::test]
async fn query_id_without_a_loader() {
    let response = default_app()
        .oneshot(get("/?queryId=stored-1"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(
        body["errors"][0]["message"],
        serde_json::json!("Persisted queries are not supported")
    );
}

struct OneQueryLoader;

#[async_trait]
impl PersistedQueryLoader for OneQueryLoader {
    async fn load(
        &self,
        query_id: &str,
        _request: &graphql::Request,
    ) -> Result<PersistedDocument, PersistedQueryError> {
        if query_id == "stored-1" {
            Ok(PersistedDocument::from("{ hello }"))
        } else {
            Err(PersistedQueryError::NotFound(query_id.to_string()))
        }
    }
}

#[tokio::test]
async fn persisted_query_over_get() {
    let app = app(Configuration::builder()
        .engine(Arc::new(StaticEngine::builder().build()) as Arc<dyn ExecutionEngine>)
        .schema(test_schema())
        .persisted_query_loader(Arc::new(OneQueryLoader) as Arc<dyn PersistedQueryLoader>)
        .build());
    let response = app.oneshot(get("/?queryId=stored-1")).await.unwrap();
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "data": { "hello": "world" } })
    );
}

#[tokio::test]
async fn custom_formatter_decorates_synthetic_errors_too() {
    // The formatter applies to every produced result, including structural
    // failures that never reached the engine.
    let app = app(Configuration::builder()
        .engine(Arc::new(StaticEngine::builder().build()) as Arc<dyn ExecutionEngine>)
        .schema(test_schema())
        .error_formatter(Arc::new(|error: &graphql::Error, _debug: DebugFlags| {
            json!({ "message": error.message.as_str(), "tag": "formatted" })
        }) as graphql_operator::configuration::ErrorFormatter)
        .build());
    let response = app.oneshot(post("{}")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["errors"][0]["tag"], serde_json::json!("formatted"));
}

#[tokio::test]
async fn debug_message_requires_the_debug_flag() {
    let engine_errors = vec![
        graphql::Error::builder()
            .message("internal failure")
            .extension("debugMessage", json!("resolver panicked at line 42"))
            .build(),
    ];

    let quiet = app(Configuration::builder()
        .engine(Arc::new(StaticEngine::builder().failures(engine_errors.clone()).build())
            as Arc<dyn ExecutionEngine>)
        .schema(test_schema())
        .build());
    let body = body_json(
        quiet
            .oneshot(post(r#"{"query":"{ hello }"}"#))
            .await
            .unwrap(),
    )
    .await;
    assert!(body["errors"][0]["extensions"].get("debugMessage").is_none());

    let verbose = app(Configuration::builder()
        .engine(Arc::new(StaticEngine::builder().failures(engine_errors).build())
            as Arc<dyn ExecutionEngine>)
        .schema(test_schema())
        .debug(DebugFlags {
            include_debug_message: true,
            include_trace: false,
        })
        .build());
    let body = body_json(
        verbose
            .oneshot(post(r#"{"query":"{ hello }"}"#))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(
        body["errors"][0]["extensions"]["debugMessage"],
        serde_json::json!("resolver panicked at line 42")
    );
}

#[tokio::test]
async fn parse_errors_carry_source_locations() {
    let response = default_app()
        .oneshot(post(r#"{"query":"query {"}"#))
        .await
        .unwrap();
    let body = body_json(response).await;
    let error = &body["errors"][0];
    assert_eq!(
        error["extensions"]["code"],
        serde_json::json!("GRAPHQL_PARSING_FAILED")
    );
    assert!(error["locations"][0]["line"].is_number());
    assert!(error["locations"][0]["column"].is_number());
}
