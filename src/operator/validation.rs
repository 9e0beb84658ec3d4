//! Structural validation of operation descriptors.
//!
//! Every rule is checked independently and every violation is reported; the
//! pipeline treats any violation as fatal for the operation but not for its
//! batch.

use serde_json_bytes::Value;

use crate::graphql;

const INVALID_GRAPHQL_REQUEST: &str = "INVALID_GRAPHQL_REQUEST";

/// Check an operation descriptor against the baseline structural rules,
/// accumulating all violations.
pub(crate) fn validate(request: &graphql::Request) -> Vec<graphql::Error> {
    let mut errors = Vec::new();

    if !is_present(&request.query) && !is_present(&request.query_id) {
        errors.push(structural_error(
            "GraphQL Request must include at least one of those two parameters: \"query\" or \"queryId\"".to_string(),
        ));
    }

    if let Some(query) = &request.query {
        if !query.is_string() {
            errors.push(structural_error(format!(
                "GraphQL Request parameter \"query\" must be string, but got {}",
                render(query)
            )));
        }
    }

    if let Some(query_id) = &request.query_id {
        if !query_id.is_string() {
            errors.push(structural_error(format!(
                "GraphQL Request parameter \"queryId\" must be string, but got {}",
                render(query_id)
            )));
        }
    }

    if let Some(operation_name) = &request.operation_name {
        if !operation_name.is_string() {
            errors.push(structural_error(format!(
                "GraphQL Request parameter \"operationName\" must be string, but got {}",
                render(operation_name)
            )));
        }
    }

    if let Some(variables) = &request.variables {
        if !variables.is_object() {
            errors.push(structural_error(format!(
                "GraphQL Request parameter \"variables\" must be object or JSON string parsed to object, but got {}",
                render(variables)
            )));
        }
    }

    errors
}

// A field counts as present when it holds anything but an empty string.
// Wrong-typed values are present; their type violation is reported
// separately.
fn is_present(value: &Option<Value>) -> bool {
    match value {
        None => false,
        Some(Value::String(s)) => !s.as_str().is_empty(),
        Some(_) => true,
    }
}

fn render(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "<unserializable>".to_string())
}

fn structural_error(message: String) -> graphql::Error {
    graphql::Error::builder()
        .message(message)
        .extension_code(INVALID_GRAPHQL_REQUEST)
        .build()
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;
    use crate::graphql::Request;
    use crate::json_ext::Object;

    fn request_from(value: serde_json_bytes::Value) -> Request {
        Request::from_object(value.as_object().cloned().unwrap_or_default(), false)
    }

    #[test]
    fn missing_query_and_query_id_is_one_error_naming_both() {
        let errors = validate(&Request::from_object(Object::new(), false));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("\"query\""));
        assert!(errors[0].message.contains("\"queryId\""));
    }

    #[test]
    fn empty_query_string_counts_as_absent() {
        let errors = validate(&request_from(json!({ "query": "" })));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("at least one"));
    }

    #[test]
    fn non_string_query_is_reported_with_its_value() {
        let errors = validate(&request_from(json!({ "query": { "a": "b" } })));
        assert_eq!(errors.len(), 1);
        assert!(
            errors[0]
                .message
                .contains("\"query\" must be string, but got {\"a\":\"b\"}")
        );
    }

    #[test]
    fn array_variables_are_rejected() {
        let errors = validate(&request_from(json!({
            "query": "{ me }",
            "variables": [1, 2, 3],
        })));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("\"variables\" must be object"));
    }

    #[test]
    fn violations_accumulate_without_short_circuiting() {
        let errors = validate(&request_from(json!({
            "queryId": 5,
            "operationName": 1.5,
            "variables": "nope",
        })));
        // queryId is present (wrong-typed), so the at-least-one rule passes;
        // the three type violations are all reported.
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn valid_request_produces_no_errors() {
        let errors = validate(&request_from(json!({
            "query": "query Me { me }",
            "operationName": "Me",
            "variables": { "a": 1 },
        })));
        assert!(errors.is_empty());
    }
}
