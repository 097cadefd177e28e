//! # workherd
//!
//! A bounded worker-pool engine. A host supplies a processing function,
//! submits work items, and reads completed items off a result stream.
//!
//! Provides bounded retries through a dedicated retry queue, a shutdown that
//! waits for in-flight retries to drain, runtime resizing of the pool, and an
//! HTTP control surface (axum) plus OpenTelemetry observability.

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod queue;
pub mod server;
pub mod telemetry;

pub use engine::{Herd, HerdBuilder, HerdControl, Resize, Results};
pub use model::{Outcome, Status, WorkId, WorkItem};
