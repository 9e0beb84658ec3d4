//! HTTP transport.
//!
//! [`HttpService`] is a tower service translating `http::Request<Bytes>` into
//! operation descriptors for the operator, and operator output back into HTTP
//! responses. The transport decides only HTTP-level questions (method,
//! content type, body shape, batch reassembly); everything about the
//! operations themselves is the operator's business.

use std::sync::Arc;
use std::task::Context as TaskContext;
use std::task::Poll;

use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;
use futures::future::BoxFuture;
use http::Method;
use http::StatusCode;
use http::header::ALLOW;
use http::header::CONTENT_TYPE;
use http::request::Parts;
use mime::APPLICATION_JSON;
use tower::BoxError;
use tower::Service;

use crate::configuration::ErrorPolicy;
use crate::context::Context;
use crate::error::ConfigurationError;
use crate::graphql;
use crate::operator::Operator;

const GRAPHQL_RESPONSE_JSON: &str = "application/graphql-response+json";

/// The HTTP frontend for an [`Operator`].
#[derive(Clone)]
pub struct HttpService {
    operator: Operator,
}

impl HttpService {
    pub fn new(operator: Operator) -> Self {
        Self { operator }
    }

    async fn call_inner(self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>, BoxError> {
        let (parts, body) = req.into_parts();

        let translated = if parts.method == Method::GET {
            self.translate_query_request(&parts)
        } else if parts.method == Method::POST {
            check_content_type(&parts).and_then(|()| self.translate_bytes_request(&body))
        } else {
            tracing::debug!(method = %parts.method, "rejecting unsupported method");
            return method_not_allowed(self.operator.configuration().error_policy());
        };

        let (requests, is_batch) = match translated {
            Ok(translated) => translated,
            Err(err) => {
                tracing::debug!(
                    code = err.extension_code,
                    details = err.extension_details,
                    "failed to translate the request"
                );
                return err.into_response(self.operator.configuration().error_policy());
            }
        };

        let context = Context::new();

        if is_batch {
            let responses = match self.operator.execute_batch(&context, requests).await {
                Ok(responses) => responses,
                Err(err) => return server_error(err),
            };

            // Reassemble the batch body in request order, member by member.
            let mut bytes = BytesMut::new();
            bytes.put_u8(b'[');
            for (index, response) in responses.iter().enumerate() {
                if index > 0 {
                    bytes.put(&b", "[..]);
                }
                bytes.extend_from_slice(&serde_json::to_vec(response)?);
            }
            bytes.put_u8(b']');

            json_response(StatusCode::OK, bytes.freeze())
        } else {
            let request = requests.into_iter().next().expect("one translated request");
            let response = match self.operator.execute(&context, request).await {
                Ok(response) => response,
                Err(err) => return server_error(err),
            };
            json_response(StatusCode::OK, Bytes::from(serde_json::to_vec(&response)?))
        }
    }

    /// Decode a GET request from its URL query string. The descriptor is
    /// always read-only, never a batch.
    fn translate_query_request(
        &self,
        parts: &Parts,
    ) -> Result<(Vec<graphql::Request>, bool), TranslateError> {
        parts
            .uri
            .query()
            .map(|query| match graphql::Request::from_urlencoded_query(query) {
                Ok(request) => Ok((vec![request], false)),
                Err(err) => Err(TranslateError {
                    status: StatusCode::BAD_REQUEST,
                    extension_code: "INVALID_GRAPHQL_REQUEST".to_string(),
                    extension_details: format!(
                        "failed to decode a valid GraphQL request from path {err}"
                    ),
                }),
            })
            .unwrap_or_else(|| {
                Err(TranslateError {
                    status: StatusCode::BAD_REQUEST,
                    extension_code: "INVALID_GRAPHQL_REQUEST".to_string(),
                    extension_details: "There was no GraphQL operation to execute. Use the `query` parameter to send an operation, using either GET or POST.".to_string(),
                })
            })
    }

    /// Decode a POST body: a single JSON object, or a JSON array of objects
    /// for a batch.
    ///
    /// An array body is decoded as a batch even when batching is disabled:
    /// the operator's batch policy then produces one synthetic error per
    /// member, so the client still receives N results.
    fn translate_bytes_request(
        &self,
        bytes: &Bytes,
    ) -> Result<(Vec<graphql::Request>, bool), TranslateError> {
        let batching = self.operator.configuration().batching();

        if bytes.first() == Some(&b'[') {
            let requests =
                graphql::Request::batch_from_bytes(bytes.clone()).map_err(|err| TranslateError {
                    status: StatusCode::BAD_REQUEST,
                    extension_code: "INVALID_GRAPHQL_REQUEST".to_string(),
                    extension_details: format!(
                        "failed to deserialize the request body into JSON: {err}"
                    ),
                })?;
            if requests.is_empty() {
                return Err(TranslateError {
                    status: StatusCode::BAD_REQUEST,
                    extension_code: "INVALID_GRAPHQL_REQUEST".to_string(),
                    extension_details: "batch body must not be an empty array".to_string(),
                });
            }
            if batching.exceeds_batch_size(&requests) {
                return Err(TranslateError {
                    status: StatusCode::UNPROCESSABLE_ENTITY,
                    extension_code: "BATCH_LIMIT_EXCEEDED".to_string(),
                    extension_details: format!(
                        "Batch limits exceeded: you provided a batch with {} entries, but the configured maximum batch size is {}",
                        requests.len(),
                        batching.maximum_size.unwrap_or_default()
                    ),
                });
            }
            return Ok((requests, true));
        }

        let request = graphql::Request::deserialize_from_bytes(bytes.clone(), false).map_err(
            |err| TranslateError {
                status: StatusCode::BAD_REQUEST,
                extension_code: "INVALID_GRAPHQL_REQUEST".to_string(),
                extension_details: format!(
                    "failed to deserialize the request body into JSON: {err}"
                ),
            },
        )?;
        Ok((vec![request], false))
    }
}

impl Service<http::Request<Bytes>> for HttpService {
    type Response = http::Response<Bytes>;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<Bytes>) -> Self::Future {
        let service = self.clone();
        Box::pin(service.call_inner(req))
    }
}

/// An HTTP-level translation failure: carries the status to respond with and
/// the extension material for the GraphQL-shaped error body.
struct TranslateError {
    status: StatusCode,
    extension_code: String,
    extension_details: String,
}

impl TranslateError {
    fn into_response(
        self,
        policy: Arc<ErrorPolicy>,
    ) -> Result<http::Response<Bytes>, BoxError> {
        let response = graphql::Response::from_errors(vec![
            graphql::Error::builder()
                .message("Invalid GraphQL request")
                .extension_code(self.extension_code)
                .extension("details", self.extension_details)
                .build(),
        ])
        .decorate(policy);
        json_response(self.status, Bytes::from(serde_json::to_vec(&response)?))
    }
}

fn check_content_type(parts: &Parts) -> Result<(), TranslateError> {
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok());

    let supported = content_type.is_some_and(|mime| {
        mime.essence_str() == APPLICATION_JSON.essence_str()
            || mime.essence_str() == GRAPHQL_RESPONSE_JSON
    });

    if supported {
        Ok(())
    } else {
        Err(TranslateError {
            status: StatusCode::UNSUPPORTED_MEDIA_TYPE,
            extension_code: "INVALID_CONTENT_TYPE".to_string(),
            extension_details: format!(
                "'content-type' header must be one of: {:?} or {:?}",
                APPLICATION_JSON.essence_str(),
                GRAPHQL_RESPONSE_JSON,
            ),
        })
    }
}

fn method_not_allowed(policy: Arc<ErrorPolicy>) -> Result<http::Response<Bytes>, BoxError> {
    let body = graphql::Response::from_errors(vec![
        graphql::Error::builder()
            .message("Invalid GraphQL request")
            .extension_code("METHOD_NOT_ALLOWED")
            .extension("details", "HTTP method must be GET or POST".to_string())
            .build(),
    ])
    .decorate(policy);
    let response = http::Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header(ALLOW, "GET, POST")
        .header(CONTENT_TYPE, APPLICATION_JSON.essence_str())
        .body(Bytes::from(serde_json::to_vec(&body)?))?;
    Ok(response)
}

// Configuration errors indicate a broken deployment; they carry no GraphQL
// body.
fn server_error(err: ConfigurationError) -> Result<http::Response<Bytes>, BoxError> {
    tracing::error!(%err, "request aborted by a configuration error");
    Ok(http::Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .body(Bytes::new())?)
}

fn json_response(status: StatusCode, body: Bytes) -> Result<http::Response<Bytes>, BoxError> {
    Ok(http::Response::builder()
        .status(status)
        .header(CONTENT_TYPE, APPLICATION_JSON.essence_str())
        .body(body)?)
}
