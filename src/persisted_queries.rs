//! Persisted query resolution.
//!
//! A request may reference a server-side stored document by `queryId`
//! instead of carrying inline source text. Lookup is delegated to a
//! caller-supplied [`PersistedQueryLoader`]; when none is configured, such
//! requests fail with a structural error.

use std::sync::Arc;

use apollo_compiler::ast;
use async_trait::async_trait;
use displaydoc::Display;
use thiserror::Error;

use crate::graphql;

/// A stored document as returned by a [`PersistedQueryLoader`]: either raw
/// source text still to be parsed, or an already-parsed document.
#[derive(Clone, Debug)]
pub enum PersistedDocument {
    Source(String),
    Parsed(Arc<ast::Document>),
}

impl From<String> for PersistedDocument {
    fn from(source: String) -> Self {
        PersistedDocument::Source(source)
    }
}

impl From<&str> for PersistedDocument {
    fn from(source: &str) -> Self {
        PersistedDocument::Source(source.to_string())
    }
}

impl From<Arc<ast::Document>> for PersistedDocument {
    fn from(document: Arc<ast::Document>) -> Self {
        PersistedDocument::Parsed(document)
    }
}

/// Loader failures.
///
/// `NotFound` is a per-request problem and becomes a structural error in the
/// response. `Internal` indicates a broken loader (a misimplemented
/// extension point) and is escalated to a fatal configuration error.
#[derive(Debug, Error, Display)]
pub enum PersistedQueryError {
    /// persisted query '{0}' not found
    NotFound(String),
    /// {0}
    Internal(String),
}

/// Caller-supplied lookup for persisted queries.
#[async_trait]
pub trait PersistedQueryLoader: Send + Sync {
    /// Resolve a query id to a stored document. The full request is
    /// available for loaders that key on more than the id.
    async fn load(
        &self,
        query_id: &str,
        request: &graphql::Request,
    ) -> Result<PersistedDocument, PersistedQueryError>;
}
