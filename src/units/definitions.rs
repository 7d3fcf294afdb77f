//! Loader for the on-disk unit and currency tables.
//!
//! Definition tables (`LoadMode::Define`) hold one unit per line:
//!
//! ```text
//! meter = [length] | m, meters
//! kilometer = 1000 meter | km
//! degree_celsius = 1 kelvin; offset: 273.15 | °C, celsius
//! currency_USD = nan currency_EUR | USD
//! ```
//!
//! The first alias after `|` becomes the display name. Alias tables
//! (`LoadMode::Alias`) only add names to known symbols: `currency_USD = $, dollar`.

use std::fs;
use std::path::{Path, PathBuf};

use super::registry::{UnitRegistry, CURRENCY_PREFIX};
use crate::error::{CalcError, CalcResult};

/// How a table's lines are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Define,
    Alias,
}

/// One table loaded at service start, in load order.
#[derive(Debug, Clone, Copy)]
pub struct DefinitionFile {
    pub relative_path: &'static str,
    pub mode: LoadMode,
    pub is_currency: bool,
    builtin: &'static str,
}

pub const DEFINITION_FILES: [DefinitionFile; 4] = [
    DefinitionFile {
        relative_path: "definitions/currency.txt",
        mode: LoadMode::Define,
        is_currency: true,
        builtin: include_str!("../../data/definitions/currency.txt"),
    },
    DefinitionFile {
        relative_path: "lang/currency.txt",
        mode: LoadMode::Alias,
        is_currency: true,
        builtin: include_str!("../../data/lang/currency.txt"),
    },
    DefinitionFile {
        relative_path: "definitions/units.txt",
        mode: LoadMode::Define,
        is_currency: false,
        builtin: include_str!("../../data/definitions/units.txt"),
    },
    DefinitionFile {
        relative_path: "lang/units.txt",
        mode: LoadMode::Alias,
        is_currency: false,
        builtin: include_str!("../../data/lang/units.txt"),
    },
];

/// Where the definition tables come from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DefinitionSource {
    /// Tables compiled into the binary.
    #[default]
    Builtin,
    /// A directory laid out like `data/`.
    Directory(PathBuf),
}

impl DefinitionSource {
    pub fn from_dir(dir: Option<PathBuf>) -> Self {
        dir.map(DefinitionSource::Directory).unwrap_or_default()
    }

    /// Load every table into `registry`, returning the number of lines applied.
    pub fn load_into(&self, registry: &mut UnitRegistry) -> CalcResult<usize> {
        let mut applied = 0;
        for file in DEFINITION_FILES.iter() {
            applied += match self {
                DefinitionSource::Builtin => load_str(
                    registry,
                    file.builtin,
                    Path::new(file.relative_path),
                    file.mode,
                    file.is_currency,
                )?,
                DefinitionSource::Directory(dir) => load_definitions(
                    registry,
                    &dir.join(file.relative_path),
                    file.mode,
                    file.is_currency,
                )?,
            };
        }
        Ok(applied)
    }
}

/// Load one table from disk.
pub fn load_definitions(
    registry: &mut UnitRegistry,
    path: &Path,
    mode: LoadMode,
    is_currency: bool,
) -> CalcResult<usize> {
    let source = fs::read_to_string(path)?;
    load_str(registry, &source, path, mode, is_currency)
}

/// Load one table from a string; `origin` is only used in error messages.
pub fn load_str(
    registry: &mut UnitRegistry,
    source: &str,
    origin: &Path,
    mode: LoadMode,
    is_currency: bool,
) -> CalcResult<usize> {
    let mut applied = 0;
    for (index, raw) in source.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fail = |message: String| CalcError::Definition {
            path: origin.to_path_buf(),
            line: index + 1,
            message,
        };
        match mode {
            LoadMode::Define => define_line(registry, line, is_currency).map_err(fail)?,
            LoadMode::Alias => alias_line(registry, line, is_currency).map_err(fail)?,
        }
        applied += 1;
    }
    tracing::debug!(origin = %origin.display(), applied, "Loaded unit definitions");
    Ok(applied)
}

fn split_assignment(line: &str) -> Result<(&str, &str), String> {
    let (symbol, rest) = line
        .split_once('=')
        .ok_or_else(|| format!("expected '<symbol> = ...', got '{}'", line))?;
    let symbol = symbol.trim();
    if symbol.is_empty() || symbol.contains(char::is_whitespace) {
        return Err(format!("invalid symbol '{}'", symbol));
    }
    Ok((symbol, rest.trim()))
}

fn split_aliases(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|a| !a.is_empty())
}

fn currency_code(symbol: &str) -> Result<&str, String> {
    symbol
        .strip_prefix(CURRENCY_PREFIX)
        .filter(|code| !code.is_empty())
        .ok_or_else(|| format!("currency symbol '{}' must start with '{}'", symbol, CURRENCY_PREFIX))
}

fn define_line(registry: &mut UnitRegistry, line: &str, is_currency: bool) -> Result<(), String> {
    let (head, aliases) = match line.split_once('|') {
        Some((head, aliases)) => (head, Some(aliases)),
        None => (line, None),
    };
    let (symbol, rhs) = split_assignment(head)?;

    let id = if is_currency {
        let code = currency_code(symbol)?;
        let id = registry.define_currency(code);
        if let Some(((magnitude, _), _)) = parse_reference(rhs)? {
            if magnitude.is_finite() {
                registry.redefine_rate(code, magnitude);
            }
        }
        id
    } else if symbol.starts_with(CURRENCY_PREFIX) {
        return Err(format!("'{}' is reserved for currencies", symbol));
    } else if let Some(dimension) = rhs.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        registry.define_root(symbol, dimension.trim())
    } else {
        let (factor, reference, offset) = match parse_reference(rhs)? {
            Some(((factor, reference), offset)) => (factor, reference, offset),
            None => return Err(format!("expected a factor and reference unit in '{}'", rhs)),
        };
        if !factor.is_finite() {
            return Err(format!("factor for '{}' must be finite", symbol));
        }
        let reference_id = registry
            .resolve(reference)
            .ok_or_else(|| format!("unknown reference unit '{}'", reference))?;
        if registry.is_currency(reference_id) {
            return Err(format!("'{}' cannot be derived from a currency", symbol));
        }
        registry.define_derived(symbol, factor, reference_id, offset)
    };

    if let Some(aliases) = aliases {
        let mut aliases = split_aliases(aliases).peekable();
        if let Some(display) = aliases.peek() {
            registry.set_display(id, display);
        }
        for alias in aliases {
            registry.add_alias(id, alias);
        }
    }
    Ok(())
}

/// Parse `<factor> <reference>[; offset: <value>]`. Dimension roots yield `None`.
#[allow(clippy::type_complexity)]
fn parse_reference(rhs: &str) -> Result<Option<((f64, &str), f64)>, String> {
    if rhs.starts_with('[') {
        return Ok(None);
    }
    let (relation, offset) = match rhs.split_once(';') {
        Some((relation, modifier)) => {
            let value = modifier
                .trim()
                .strip_prefix("offset:")
                .ok_or_else(|| format!("unknown modifier '{}'", modifier.trim()))?;
            let offset = value
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("invalid offset '{}'", value.trim()))?;
            (relation.trim(), offset)
        }
        None => (rhs, 0.0),
    };
    let (factor, reference) = relation
        .split_once(char::is_whitespace)
        .ok_or_else(|| format!("expected '<factor> <unit>', got '{}'", relation))?;
    let factor = match factor.to_lowercase().as_str() {
        "nan" => f64::NAN,
        other => other
            .parse::<f64>()
            .map_err(|_| format!("invalid factor '{}'", factor))?,
    };
    Ok(Some(((factor, reference.trim()), offset)))
}

fn alias_line(registry: &mut UnitRegistry, line: &str, is_currency: bool) -> Result<(), String> {
    let (symbol, aliases) = split_assignment(line)?;
    let id = match registry.resolve(symbol) {
        Some(id) if registry.is_currency(id) == is_currency => id,
        Some(_) => return Err(format!("'{}' is not a {} unit", symbol, kind(is_currency))),
        None if is_currency => registry.define_currency(currency_code(symbol)?),
        None => return Err(format!("unknown unit '{}'", symbol)),
    };
    for alias in split_aliases(aliases) {
        registry.add_alias(id, alias);
    }
    Ok(())
}

fn kind(is_currency: bool) -> &'static str {
    if is_currency {
        "currency"
    } else {
        "physical"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionMode;

    fn builtin() -> UnitRegistry {
        let mut registry = UnitRegistry::new(1);
        DefinitionSource::Builtin.load_into(&mut registry).unwrap();
        registry
    }

    #[test]
    fn test_builtin_tables_load() {
        let registry = builtin();
        let km = registry.resolve("km").unwrap();
        let mi = registry.resolve("miles").unwrap();
        let value = registry.convert(10.0, km, mi, ConversionMode::Normal).unwrap();
        assert!((value - 6.21371).abs() < 0.001);
        assert_eq!(registry.unit(km).display, "km");
    }

    #[test]
    fn test_builtin_currency_aliases() {
        let registry = builtin();
        let usd = registry.resolve("dollars").unwrap();
        assert_eq!(registry.unit(usd).symbol, "currency_USD");
        assert_eq!(registry.resolve("usd"), Some(usd));
        assert!(registry.rate_factor("USD").is_none());
        // Aliases for currencies missing from the definition table are upserted.
        assert!(registry.contains_symbol("currency_BTC"));
    }

    #[test]
    fn test_temperature_from_tables() {
        let registry = builtin();
        let f = registry.resolve("f").unwrap();
        let c = registry.resolve("celsius").unwrap();
        let value = registry.convert(32.0, f, c, ConversionMode::Normal).unwrap();
        assert!(value.abs() < 1e-9);
    }

    #[test]
    fn test_static_currency_rate() {
        let mut registry = UnitRegistry::new(1);
        load_str(
            &mut registry,
            "currency_XYZ = 2 currency_EUR | XYZ",
            Path::new("inline"),
            LoadMode::Define,
            true,
        )
        .unwrap();
        assert_eq!(registry.rate_factor("XYZ"), Some(2.0));
    }

    #[test]
    fn test_unknown_reference_reports_line() {
        let mut registry = UnitRegistry::new(1);
        let err = load_str(
            &mut registry,
            "# header\nfurlong = 201.168 meter\n",
            Path::new("inline.txt"),
            LoadMode::Define,
            false,
        )
        .unwrap_err();
        match err {
            CalcError::Definition { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.contains("meter"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_currency_table_requires_prefix() {
        let mut registry = UnitRegistry::new(1);
        assert!(load_str(
            &mut registry,
            "USD = nan currency_EUR",
            Path::new("inline"),
            LoadMode::Define,
            true,
        )
        .is_err());
    }

    #[test]
    fn test_alias_for_unknown_physical_unit_fails() {
        let mut registry = UnitRegistry::new(1);
        assert!(load_str(
            &mut registry,
            "parsec = pc",
            Path::new("inline"),
            LoadMode::Alias,
            false,
        )
        .is_err());
    }

    #[test]
    fn test_directory_source() {
        let dir = tempfile::tempdir().unwrap();
        for file in DEFINITION_FILES.iter() {
            let path = dir.path().join(file.relative_path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, file.builtin).unwrap();
        }
        let mut registry = UnitRegistry::new(1);
        let applied = DefinitionSource::Directory(dir.path().to_path_buf())
            .load_into(&mut registry)
            .unwrap();
        assert!(applied > 50);
        assert!(registry.resolve("kg").is_some());
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let mut registry = UnitRegistry::new(1);
        let err = DefinitionSource::Directory(PathBuf::from("/nonexistent/anycalc"))
            .load_into(&mut registry)
            .unwrap_err();
        assert!(matches!(err, CalcError::Io(_)));
    }
}
