//! Error types for the operator and its transport.
//!
//! Expected failures (malformed requests, engine-reported errors) are folded
//! into GraphQL [`Response`](crate::graphql::Response)s and never escape as
//! `Err`. Only configuration/invariant errors, which indicate a misconfigured
//! server rather than a bad request, propagate out of the operator.

use apollo_compiler::validation::DiagnosticList;
use displaydoc::Display;
use thiserror::Error;

use crate::graphql;
use crate::graphql::IntoGraphQLErrors;
use crate::graphql::Location;

/// A fatal server-side error.
///
/// These abort the request before any GraphQL response is produced; the
/// transport maps them to a bare 500.
#[derive(Debug, Error, Display)]
pub enum ConfigurationError {
    /// no schema has been configured on the server
    MissingSchema,
    /// persisted query loader failed: {reason}
    PersistedQueryLoader { reason: String },
    /// {hook} hook failed to resolve: {reason}
    HookResolution {
        hook: &'static str,
        reason: String,
    },
}

/// Errors surfaced by the execution engine, already shaped as output errors.
///
/// The operator folds these into a response instead of propagating them.
#[derive(Debug, Error, Display)]
pub enum EngineError {
    /// the request document failed to parse
    ParseFailure(ParseErrors),
    /// execution failed
    ExecutionFailure(Vec<graphql::Error>),
}

impl IntoGraphQLErrors for EngineError {
    fn into_graphql_errors(self) -> Vec<graphql::Error> {
        match self {
            EngineError::ParseFailure(errors) => errors.into_graphql_errors(),
            EngineError::ExecutionFailure(errors) => errors,
        }
    }
}

/// Parse diagnostics produced by the document parser.
#[derive(Debug)]
pub struct ParseErrors {
    pub(crate) errors: DiagnosticList,
}

impl std::fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut errors = self.errors.iter();
        for (i, error) in errors.by_ref().take(5).enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{error}")?;
        }
        let remaining = errors.count();
        if remaining > 0 {
            write!(f, "\n...and {remaining} other errors")?;
        }
        Ok(())
    }
}

impl IntoGraphQLErrors for ParseErrors {
    fn into_graphql_errors(self) -> Vec<graphql::Error> {
        self.errors
            .iter()
            .map(|diagnostic| {
                graphql::Error::builder()
                    .message(diagnostic.error.to_string())
                    .locations(
                        diagnostic
                            .line_column_range()
                            .map(|range| range.start)
                            .map(|location| {
                                vec![Location {
                                    line: location.line as u32,
                                    column: location.column as u32,
                                }]
                            })
                            .unwrap_or_default(),
                    )
                    .extension_code("GRAPHQL_PARSING_FAILED")
                    .build()
            })
            .collect()
    }
}
