use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CalcError, CalcResult};
use crate::services::time::parse_timezone;

/// Keywords used when no triggers are configured explicitly.
pub const DEFAULT_TRIGGERS: [&str; 6] = ["=", "time", "dec", "bin", "hex", "oct"];

/// Upper bound for the currency refresh interval (one week).
const MAX_CACHE_INTERVAL: u64 = 604_800;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub units: UnitsConfig,
    pub currency: CurrencyConfig,
    pub time: TimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Ordered trigger keywords. An empty list makes every input a calculator query.
    pub triggers: Vec<String>,
    pub show_empty_placeholder: bool,
    pub language: String,
    pub icon_dir: PathBuf,
}

/// Whether unit conversions may cross dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionMode {
    #[default]
    Normal,
    Crazy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitsConfig {
    pub mode: ConversionMode,
    /// Directory holding `units.txt`, `currency.txt` and the alias tables.
    /// The built-in tables are used when unset.
    pub definitions_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyProviderKind {
    /// European Central Bank reference rates.
    #[default]
    #[serde(alias = "ecb")]
    Internal,
    Fixerio,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    pub provider: CurrencyProviderKind,
    pub api_key: String,
    /// Override for the provider endpoint.
    pub base_url: Option<String>,
    /// Seconds between rate refreshes. Zero fetches once at startup only.
    pub cache_interval: u64,
    pub default_currencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityConfig {
    pub name: String,
    /// IANA timezone name such as `America/New_York`.
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    pub cities: Vec<CityConfig>,
}

#[allow(clippy::derivable_impls)]
impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            units: UnitsConfig::default(),
            currency: CurrencyConfig::default(),
            time: TimeConfig::default(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            triggers: DEFAULT_TRIGGERS.iter().map(|t| t.to_string()).collect(),
            show_empty_placeholder: false,
            language: "en_US".to_string(),
            icon_dir: PathBuf::from("images"),
        }
    }
}

#[allow(clippy::derivable_impls)]
impl Default for UnitsConfig {
    fn default() -> Self {
        Self {
            mode: ConversionMode::Normal,
            definitions_dir: None,
        }
    }
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            provider: CurrencyProviderKind::Internal,
            api_key: String::new(),
            base_url: None,
            cache_interval: 86_400,
            default_currencies: ["USD", "EUR", "GBP", "CAD"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

impl Default for TimeConfig {
    fn default() -> Self {
        let city = |name: &str, timezone: &str| CityConfig {
            name: name.to_string(),
            timezone: timezone.to_string(),
        };
        Self {
            cities: vec![
                city("New York City", "America/New_York"),
                city("London", "Europe/London"),
                city("Madrid", "Europe/Madrid"),
                city("Vancouver", "America/Vancouver"),
                city("Athens", "Europe/Athens"),
            ],
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|h| h.join(".config"))
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
            })
            .join("anycalc")
            .join("config.toml")
    }

    /// Load config from the default path, or return defaults if not found
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to load config: {}", e);
                Self::default()
            }
        }
    }

    /// Load and validate config from an explicit path
    pub fn load_from(path: &Path) -> CalcResult<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.validate();
        Ok(config)
    }

    /// Normalize user-entered lists and clamp values to acceptable ranges
    fn validate(&mut self) {
        self.general.triggers = self
            .general
            .triggers
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        self.currency.cache_interval = self.currency.cache_interval.min(MAX_CACHE_INTERVAL);
        self.currency.default_currencies = self
            .currency
            .default_currencies
            .iter()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .collect();

        self.time.cities.retain(|city| {
            let ok = parse_timezone(&city.timezone).is_some();
            if !ok {
                tracing::warn!(city = %city.name, timezone = %city.timezone, "Ignoring city with unknown timezone");
            }
            ok
        });
    }

    /// Save config to file
    pub fn save_to(&self, path: &Path) -> CalcResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CalcError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)?;
        Ok(())
    }

    /// Save config to the default path
    pub fn save(&self) -> CalcResult<()> {
        self.save_to(&Self::config_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.general.triggers, DEFAULT_TRIGGERS.to_vec());
        assert!(!config.general.show_empty_placeholder);
        assert_eq!(config.units.mode, ConversionMode::Normal);
        assert_eq!(config.currency.provider, CurrencyProviderKind::Internal);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[general]
triggers = [" = ", "", "hex"]
show_empty_placeholder = true

[units]
mode = "crazy"

[currency]
provider = "ecb"
cache_interval = 99999999
default_currencies = [" usd", "gbp "]

[[time.cities]]
name = "Nowhere"
timezone = "banana"

[[time.cities]]
name = "Elsewhere"
timezone = "+1é1"

[[time.cities]]
name = "Tokyo"
timezone = "Asia/Tokyo"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.general.triggers, vec!["=", "hex"]);
        assert!(config.general.show_empty_placeholder);
        assert_eq!(config.general.language, "en_US");
        assert_eq!(config.units.mode, ConversionMode::Crazy);
        assert_eq!(config.currency.provider, CurrencyProviderKind::Internal);
        assert_eq!(config.currency.cache_interval, MAX_CACHE_INTERVAL);
        assert_eq!(config.currency.default_currencies, vec!["USD", "GBP"]);
        assert_eq!(config.time.cities.len(), 1);
        assert_eq!(config.time.cities[0].name, "Tokyo");
    }

    #[test]
    fn test_save_roundtrip_keeps_triggers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.general.triggers = vec!["calc".to_string()];
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.general.triggers, vec!["calc"]);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[general\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(CalcError::TomlParse(_))
        ));
    }
}
