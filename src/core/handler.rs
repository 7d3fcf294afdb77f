//! Handler protocol and the multi-handler orchestrator.

use std::path::PathBuf;

use tracing::debug;

use super::query::Query;

/// A single evaluator output.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub name: String,
    pub description: String,
    pub icon: Option<PathBuf>,
    pub clipboard: Option<String>,
}

impl QueryResult {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            icon: None,
            clipboard: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<PathBuf>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_clipboard(mut self, payload: impl Into<String>) -> Self {
        self.clipboard = Some(payload.into());
        self
    }
}

/// Identifies one of the built-in evaluators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Units,
    Calculator,
    Percentages,
    Time,
    Base10,
    Base2,
    Base8,
    Base16,
}

/// An evaluator that parses a query under its own grammar.
///
/// Input the handler does not understand yields an empty vec, never an error.
pub trait QueryHandler: Send + Sync {
    /// Keyword identifying this handler in logs and icons.
    fn keyword(&self) -> &'static str;

    fn handle(&self, query: &Query) -> Vec<QueryResult>;
}

/// Runs several handlers against one query.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultiHandler;

impl MultiHandler {
    pub fn new() -> Self {
        Self
    }

    /// Concatenate handler outputs in declaration order.
    pub fn handle(&self, query: &Query, handlers: &[&dyn QueryHandler]) -> Vec<QueryResult> {
        let mut results = Vec::new();
        for handler in handlers {
            let produced = handler.handle(query);
            debug!(
                handler = handler.keyword(),
                mode = %query.mode,
                count = produced.len(),
                "Handler finished"
            );
            results.extend(produced);
        }
        results
    }
}
