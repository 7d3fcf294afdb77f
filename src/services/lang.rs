//! Translation tables.
//!
//! A language is a TOML file of namespaced strings:
//!
//! ```toml
//! [misc]
//! no-result = "No result"
//! ```
//!
//! Lookups fall back to the built-in `en_US` table when the selected
//! language lacks a key.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::error::CalcResult;

pub const DEFAULT_LANGUAGE: &str = "en_US";

type Table = HashMap<String, HashMap<String, String>>;

static BUILTIN_EN_US: Lazy<Table> = Lazy::new(|| {
    toml::from_str(include_str!("../../data/lang/en_US.toml")).unwrap_or_else(|e| {
        warn!("Built-in en_US table is invalid: {}", e);
        Table::new()
    })
});

/// Looks up localized strings.
pub trait Translator: Send + Sync {
    /// Text for `key` in `namespace`, or `None` if no table has it.
    fn translate(&self, key: &str, namespace: &str) -> Option<String>;
}

/// Translator backed by TOML tables.
#[derive(Debug, Clone)]
pub struct LanguageService {
    language: String,
    table: Table,
}

impl Default for LanguageService {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            table: Table::new(),
        }
    }
}

impl LanguageService {
    /// Load `language`, reading `<data_dir>/lang/<language>.toml` when a data
    /// directory is given. Unknown languages fall back to `en_US`.
    pub fn load(language: &str, data_dir: Option<&Path>) -> Self {
        if let Some(dir) = data_dir {
            let path = dir.join("lang").join(format!("{}.toml", language));
            if path.exists() {
                match Self::load_file(language, &path) {
                    Ok(service) => return service,
                    Err(e) => warn!(path = %path.display(), "Failed to load language: {}", e),
                }
            }
        }
        if language != DEFAULT_LANGUAGE {
            warn!(language, "Unknown language, falling back to {}", DEFAULT_LANGUAGE);
        }
        Self::default()
    }

    pub fn load_file(language: &str, path: &Path) -> CalcResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(language, &content)
    }

    pub fn from_toml_str(language: &str, content: &str) -> CalcResult<Self> {
        let table: Table = toml::from_str(content)?;
        debug!(language, namespaces = table.len(), "Loaded language table");
        Ok(Self {
            language: language.to_string(),
            table,
        })
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

impl Translator for LanguageService {
    fn translate(&self, key: &str, namespace: &str) -> Option<String> {
        [&self.table, &*BUILTIN_EN_US]
            .into_iter()
            .find_map(|table| table.get(namespace)?.get(key))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table() {
        let lang = LanguageService::default();
        assert_eq!(lang.language(), "en_US");
        assert_eq!(lang.translate("no-result", "misc").as_deref(), Some("No result"));
        assert!(lang
            .translate("no-result-hex-description", "misc")
            .unwrap()
            .contains("hexadecimal"));
    }

    #[test]
    fn test_unknown_key_and_namespace() {
        let lang = LanguageService::default();
        assert_eq!(lang.translate("nope", "misc"), None);
        assert_eq!(lang.translate("no-result", "nope"), None);
    }

    #[test]
    fn test_unknown_language_falls_back() {
        let lang = LanguageService::load("xx_XX", None);
        assert_eq!(lang.language(), "en_US");
        assert_eq!(lang.translate("no-result", "misc").as_deref(), Some("No result"));
    }

    #[test]
    fn test_file_overrides_with_fallback() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("lang")).unwrap();
        fs::write(
            dir.path().join("lang").join("es_ES.toml"),
            "[misc]\nno-result = \"Sin resultado\"\n",
        )
        .unwrap();

        let lang = LanguageService::load("es_ES", Some(dir.path()));
        assert_eq!(lang.language(), "es_ES");
        assert_eq!(lang.translate("no-result", "misc").as_deref(), Some("Sin resultado"));
        assert_eq!(lang.translate("hexadecimal", "base").as_deref(), Some("Hexadecimal"));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        assert!(LanguageService::from_toml_str("bad", "[misc\n").is_err());
    }
}
