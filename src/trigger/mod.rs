//! Ingestion front-ends: the HTTP webhook receiver and the polling trigger.
//! Both route through [`crate::router`] and launch the matching composite
//! workflow binary.

pub mod poller;
pub mod webhook;
