//! Mapping handler results to host items.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::handler::QueryResult;
use super::query::QueryMode;
use crate::services::lang::Translator;

const ITEM_ID_PREFIX: &str = "calculate_anything";
const DEFAULT_ICON: &str = "icon.svg";

/// An action the host can run for an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Action {
    CopyToClipboard(String),
}

/// A user-facing result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: String,
    pub text: String,
    pub subtext: String,
    pub icon: PathBuf,
    pub actions: Vec<Action>,
}

/// Convert results to items, keeping their order.
pub fn present(results: Vec<QueryResult>, icon_dir: &Path) -> Vec<Item> {
    results
        .into_iter()
        .enumerate()
        .map(|(idx, result)| {
            let icon = result.icon.unwrap_or_else(|| PathBuf::from(DEFAULT_ICON));
            Item {
                id: format!("{}_{}", ITEM_ID_PREFIX, idx),
                text: result.name,
                subtext: result.description,
                icon: icon_dir.join(icon),
                actions: result
                    .clipboard
                    .map(Action::CopyToClipboard)
                    .into_iter()
                    .collect(),
            }
        })
        .collect()
}

/// The "no result" item for `mode`, localized through `translator`.
pub fn placeholder(mode: QueryMode, translator: &dyn Translator, icon_dir: &Path) -> Item {
    let description_key = format!("no-result-{}-description", mode.name());
    Item {
        id: format!("{}_no_result", ITEM_ID_PREFIX),
        text: translator
            .translate("no-result", "misc")
            .unwrap_or_else(|| "No result".to_string()),
        subtext: translator
            .translate(&description_key, "misc")
            .unwrap_or_default(),
        icon: icon_dir.join(DEFAULT_ICON),
        actions: Vec::new(),
    }
}
