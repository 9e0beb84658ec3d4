use bytes::Bytes;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::de::Error as _;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;

use crate::json_ext::Object;

/// A canonical GraphQL operation descriptor.
///
/// The `query`, `queryId`, `operationName` and `variables` fields are kept
/// loosely typed on purpose: a request carrying e.g. a number where a string
/// is expected must reach structural validation (which accumulates every
/// violation into the response) instead of failing JSON deserialization with
/// a single opaque error. Use the `*_str` accessors once validation has
/// passed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// The GraphQL operation (e.g., query, mutation) source text.
    ///
    /// For historical purposes, the term "query" is commonly used to refer to
    /// *any* GraphQL operation which might be, e.g., a `mutation`.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "none_if_null"
    )]
    pub query: Option<Value>,

    /// Identifier of a persisted query, mutually substitutable with `query`.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        alias = "documentId",
        deserialize_with = "none_if_null"
    )]
    pub query_id: Option<Value>,

    /// The (optional) operation name. When specified, this name must match
    /// the name of an operation in the document; when excluded, the document
    /// must contain a single operation.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "none_if_null"
    )]
    pub operation_name: Option<Value>,

    /// The (optional) variables in the form of a JSON object.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "none_if_null"
    )]
    pub variables: Option<Value>,

    /// The (optional) GraphQL `extensions` of the request.
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub extensions: Object,

    /// True when the descriptor was derived from an HTTP method that permits
    /// only read operations (GET).
    #[serde(skip)]
    pub read_only: bool,

    /// Immutable snapshot of the unparsed source fields, retained for
    /// diagnostic messages.
    #[serde(skip)]
    pub original: Object,
}

// NOTE: this deserialize helper is used to transform `null` to a missing field
fn none_if_null<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.filter(|value| !value.is_null()))
}

#[buildstructor::buildstructor]
impl Request {
    /// This is the constructor (or builder) to use when constructing a
    /// GraphQL `Request`.
    #[builder(visibility = "pub")]
    fn new(
        query: Option<String>,
        query_id: Option<String>,
        operation_name: Option<String>,
        variables: Option<Value>,
        // Skip the `Object` type alias in order to use buildstructor's map special-casing
        extensions: JsonMap<ByteString, Value>,
        read_only: Option<bool>,
    ) -> Self {
        Self {
            query: query.map(|q| Value::String(q.into())),
            query_id: query_id.map(|id| Value::String(id.into())),
            operation_name: operation_name.map(|name| Value::String(name.into())),
            variables,
            extensions,
            read_only: read_only.unwrap_or_default(),
            original: Object::new(),
        }
    }

    /// Build a request from an already-decoded JSON object, snapshotting the
    /// source fields for diagnostics.
    pub fn from_object(object: Object, read_only: bool) -> Self {
        let original = object.clone();
        let mut object = object;
        let query = object.remove("query").filter(|v| !v.is_null());
        let query_id = object
            .remove("queryId")
            .or_else(|| object.remove("documentId"))
            .filter(|v| !v.is_null());
        let operation_name = object.remove("operationName").filter(|v| !v.is_null());
        let variables = object.remove("variables").filter(|v| !v.is_null());
        let extensions = match object.remove("extensions") {
            Some(Value::Object(extensions)) => extensions,
            _ => Object::new(),
        };

        Self {
            query,
            query_id,
            operation_name,
            variables,
            extensions,
            read_only,
            original,
        }
    }

    /// Decode a single request from a JSON body.
    pub fn deserialize_from_bytes(
        bytes: Bytes,
        read_only: bool,
    ) -> Result<Request, serde_json::Error> {
        match Value::from_bytes(bytes)? {
            Value::Object(object) => Ok(Self::from_object(object, read_only)),
            _ => Err(serde_json::Error::custom("expected a JSON object")),
        }
    }

    /// Decode an ordered batch of requests from a JSON array body.
    pub fn batch_from_bytes(bytes: Bytes) -> Result<Vec<Request>, serde_json::Error> {
        let array = match Value::from_bytes(bytes)? {
            Value::Array(array) => array,
            _ => return Err(serde_json::Error::custom("expected a JSON array")),
        };

        array
            .into_iter()
            .enumerate()
            .map(|(index, value)| match value {
                Value::Object(object) => Ok(Self::from_object(object, false)),
                _ => Err(serde_json::Error::custom(format!(
                    "expected a JSON object at batch index {index}"
                ))),
            })
            .collect()
    }

    /// Convert encoded URL query string parameters (also known as "search
    /// params") into a GraphQL [`Request`].
    ///
    /// The resulting descriptor is marked read-only since it was derived
    /// from a GET request. `variables` and `extensions` arrive as JSON
    /// strings; a `variables` value that does not parse is kept verbatim so
    /// that structural validation reports its shape.
    pub fn from_urlencoded_query(url_encoded_query: &str) -> Result<Request, serde_json::Error> {
        let urldecoded: serde_json::Value =
            serde_urlencoded::from_str(url_encoded_query).map_err(serde_json::Error::custom)?;

        let mut object = Object::new();
        for key in ["query", "queryId", "documentId", "operationName"] {
            if let Some(serde_json::Value::String(value)) = urldecoded.get(key) {
                object.insert(key, Value::String(value.as_str().into()));
            }
        }
        for key in ["variables", "extensions"] {
            if let Some(serde_json::Value::String(raw)) = urldecoded.get(key) {
                match serde_json::from_str::<Value>(raw) {
                    Ok(parsed) => {
                        object.insert(key, parsed);
                    }
                    Err(_) => {
                        object.insert(key, Value::String(raw.as_str().into()));
                    }
                }
            }
        }

        Ok(Self::from_object(object, true))
    }

    /// The query source, when present and string-typed.
    pub fn query_str(&self) -> Option<&str> {
        self.query.as_ref().and_then(|v| v.as_str())
    }

    /// The persisted query id, when present and string-typed.
    pub fn query_id_str(&self) -> Option<&str> {
        self.query_id.as_ref().and_then(|v| v.as_str())
    }

    /// The operation name, when present and string-typed.
    pub fn operation_name_str(&self) -> Option<&str> {
        self.operation_name.as_ref().and_then(|v| v.as_str())
    }

    /// The variables, when present and object-shaped.
    pub fn variables_object(&self) -> Option<&Object> {
        self.variables.as_ref().and_then(|v| v.as_object())
    }
}
