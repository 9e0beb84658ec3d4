use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;
use serde::ser::SerializeMap;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;

use super::Error;
use crate::configuration::ErrorPolicy;
use crate::json_ext::Object;

/// A GraphQL execution result.
///
/// Produced either by the execution engine or synthetically by the operator
/// for structural failures. Either way it passes through the same
/// [decoration step](DecoratedResponse) before being returned to the caller.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// The response data. Absent when execution failed before reaching the
    /// engine.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,

    /// The GraphQL errors encountered.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<Error>,

    /// The optional GraphQL extensions.
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl Response {
    /// Returns a builder that builds a GraphQL [`Response`].
    #[builder(visibility = "pub")]
    fn new(
        data: Option<Value>,
        errors: Vec<Error>,
        // Skip the `Object` type alias in order to use buildstructor's map special-casing
        extensions: JsonMap<ByteString, Value>,
    ) -> Self {
        Self {
            data,
            errors,
            extensions,
        }
    }

    /// A response with no data and the given errors, as produced for
    /// failures that never reach the engine.
    pub fn from_errors(errors: Vec<Error>) -> Self {
        Self {
            data: None,
            errors,
            extensions: Object::new(),
        }
    }

    /// Attach an error-formatting policy, producing the canonical output of
    /// one operation.
    pub fn decorate(self, policy: Arc<ErrorPolicy>) -> DecoratedResponse {
        DecoratedResponse {
            response: self,
            policy,
        }
    }
}

/// A [`Response`] carrying the configured error formatter and errors handler.
///
/// The policy is applied at serialization time; the underlying errors are
/// never mutated. Every response returned by the operator, including
/// synthetic structural-error responses, is decorated with the same policy.
#[derive(Clone)]
pub struct DecoratedResponse {
    pub response: Response,
    policy: Arc<ErrorPolicy>,
}

impl DecoratedResponse {
    pub fn into_response(self) -> Response {
        self.response
    }

    /// The serialized form, with the error policy applied.
    pub fn to_json(&self) -> Value {
        let mut object = Object::new();
        if let Some(data) = &self.response.data {
            object.insert("data", data.clone());
        }
        if !self.response.errors.is_empty() {
            object.insert(
                "errors",
                Value::Array(self.policy.format_errors(&self.response.errors)),
            );
        }
        if !self.response.extensions.is_empty() {
            object.insert("extensions", Value::Object(self.response.extensions.clone()));
        }
        Value::Object(object)
    }
}

impl std::fmt::Debug for DecoratedResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoratedResponse")
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

impl Serialize for DecoratedResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.to_json() {
            Value::Object(object) => {
                let mut map = serializer.serialize_map(Some(object.len()))?;
                for (key, value) in object.iter() {
                    map.serialize_entry(key.as_str(), value)?;
                }
                map.end()
            }
            // to_json always produces an object
            _ => unreachable!(),
        }
    }
}
