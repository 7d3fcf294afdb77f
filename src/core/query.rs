//! Trigger dispatch: classifying raw input into a query mode.
//!
//! A trigger is a literal keyword such as `=` or `hex`. Input selects a trigger
//! when it starts with the keyword followed by a single space; the first
//! trigger in configuration order wins.

use std::fmt;

use crate::core::handler::HandlerKind;

/// The classified query type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMode {
    Calculator,
    Time,
    Base10,
    Base2,
    Base8,
    Base16,
}

impl QueryMode {
    /// Handlers run for this mode, in result order.
    pub fn handlers(self) -> &'static [HandlerKind] {
        match self {
            QueryMode::Calculator => &[
                HandlerKind::Units,
                HandlerKind::Calculator,
                HandlerKind::Percentages,
            ],
            QueryMode::Time => &[HandlerKind::Time],
            QueryMode::Base10 => &[HandlerKind::Base10],
            QueryMode::Base2 => &[HandlerKind::Base2],
            QueryMode::Base8 => &[HandlerKind::Base8],
            QueryMode::Base16 => &[HandlerKind::Base16],
        }
    }

    /// Name used in localization keys (`no-result-<name>-description`).
    pub fn name(self) -> &'static str {
        match self {
            QueryMode::Calculator => "calculator",
            QueryMode::Time => "time",
            QueryMode::Base10 => "dec",
            QueryMode::Base2 => "bin",
            QueryMode::Base8 => "oct",
            QueryMode::Base16 => "hex",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A configured prefix that selects a query mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub keyword: String,
    pub mode: QueryMode,
}

impl Trigger {
    pub fn new(keyword: impl Into<String>, mode: QueryMode) -> Self {
        Self {
            keyword: keyword.into(),
            mode,
        }
    }

    /// Build a trigger from a configured keyword.
    ///
    /// `time`, `dec`, `bin`, `oct` and `hex` select their dedicated modes;
    /// every other keyword is a calculator trigger.
    pub fn from_keyword(keyword: &str) -> Self {
        let mode = match keyword.to_lowercase().as_str() {
            "time" => QueryMode::Time,
            "dec" => QueryMode::Base10,
            "bin" => QueryMode::Base2,
            "oct" => QueryMode::Base8,
            "hex" => QueryMode::Base16,
            _ => QueryMode::Calculator,
        };
        Self::new(keyword, mode)
    }

    /// Build the ordered trigger list from configured keywords.
    pub fn from_keywords<S: AsRef<str>>(keywords: &[S]) -> Vec<Trigger> {
        keywords
            .iter()
            .map(|k| Trigger::from_keyword(k.as_ref()))
            .collect()
    }
}

/// A classified query, alive for one keystroke or submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub raw_input: String,
    pub matched_trigger: Option<Trigger>,
    pub mode: QueryMode,
    pub argument: String,
}

impl Query {
    /// A calculator query that bypasses trigger matching.
    pub fn calculator(argument: impl Into<String>) -> Self {
        Self::with_mode(QueryMode::Calculator, argument)
    }

    /// A query in the given mode with no trigger attached.
    pub fn with_mode(mode: QueryMode, argument: impl Into<String>) -> Self {
        let argument = argument.into();
        Self {
            raw_input: argument.clone(),
            matched_trigger: None,
            mode,
            argument,
        }
    }
}

/// Classify `raw_input` against the ordered trigger list.
///
/// Returns `None` when triggers are configured and none of them matches.
pub fn dispatch(raw_input: &str, triggers: &[Trigger]) -> Option<Query> {
    if triggers.is_empty() {
        return Some(Query::calculator(raw_input));
    }

    triggers.iter().find_map(|trigger| {
        let rest = raw_input
            .strip_prefix(trigger.keyword.as_str())?
            .strip_prefix(' ')?;
        Some(Query {
            raw_input: raw_input.to_string(),
            matched_trigger: Some(trigger.clone()),
            mode: trigger.mode,
            argument: rest.trim().to_string(),
        })
    })
}
