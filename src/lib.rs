//! A GraphQL HTTP transport and execution orchestrator.
//!
//! This crate sits between incoming HTTP traffic and a query-execution
//! engine it does not implement. It normalizes heterogeneous request shapes
//! (single and batch, GET and POST) into canonical operation descriptors,
//! validates them structurally, dispatches them to a pluggable asynchronous
//! [`ExecutionEngine`](engine::ExecutionEngine), and normalizes engine
//! outcomes back into HTTP responses under a uniform error-formatting
//! policy.
//!
//! The pieces compose bottom-up:
//!
//! * [`graphql`] holds the wire types (`Request`, `Response`, `Error`).
//! * [`Operator`] runs the per-operation pipeline and the order-preserving
//!   batch fan-out.
//! * [`services::HttpService`] translates HTTP to operations and back.
//! * [`axum_factory::router`] mounts the service on an axum router.
//!
//! A minimal server wires them together from a [`Configuration`]:
//!
//! ```ignore
//! let configuration = Arc::new(
//!     Configuration::builder()
//!         .engine(my_engine)
//!         .schema(my_schema)
//!         .build(),
//! );
//! let app = axum_factory::router(HttpService::new(Operator::new(configuration)));
//! ```

pub mod axum_factory;
pub mod configuration;
pub mod context;
pub mod engine;
pub mod error;
pub mod graphql;
pub mod json_ext;
pub mod operator;
pub mod persisted_queries;
pub mod services;
pub mod test_harness;

pub use crate::configuration::Configuration;
pub use crate::context::Context;
pub use crate::operator::Operator;
pub use crate::services::HttpService;
