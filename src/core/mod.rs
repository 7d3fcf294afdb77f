//! Core engine module - host-agnostic query handling.
//!
//! - [`query`] - triggers, query modes and dispatch
//! - [`handler`] - the evaluator trait and the multi-handler orchestrator
//! - [`present`] - result items and the empty-result placeholder
//! - [`engine`] - everything above wired to the configured services

pub mod engine;
pub mod handler;
pub mod present;
pub mod query;

pub use engine::Engine;
pub use handler::{HandlerKind, MultiHandler, QueryHandler, QueryResult};
pub use present::{placeholder, present, Action, Item};
pub use query::{dispatch, Query, QueryMode, Trigger};
