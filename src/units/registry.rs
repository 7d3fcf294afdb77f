//! In-memory unit table and the currency conversion context.

use std::collections::HashMap;

use crate::config::ConversionMode;

/// Reference currency against which every currency rule is expressed.
pub const BASE_CURRENCY: &str = "EUR";

/// Prefix that keeps currency symbols apart from physical units.
pub const CURRENCY_PREFIX: &str = "currency_";

const CURRENCY_DIMENSION: &str = "currency";

/// Grams of water per liter, used by crazy-mode mass/volume conversions.
const WATER_GRAMS_PER_LITER: f64 = 1000.0;

/// Handle to a unit inside one registry instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId(usize);

/// A named unit.
///
/// A value converts to its dimension root as `value * factor + offset`.
/// Currency units keep their factor in the [`ConversionContext`] instead.
#[derive(Debug, Clone)]
pub struct UnitDef {
    pub symbol: String,
    pub display: String,
    pub dimension: String,
    pub factor: f64,
    pub offset: f64,
}

impl UnitDef {
    pub fn is_currency(&self) -> bool {
        self.dimension == CURRENCY_DIMENSION
    }

    /// ISO code for currency units.
    pub fn currency_code(&self) -> Option<&str> {
        self.symbol.strip_prefix(CURRENCY_PREFIX)
    }
}

/// Currency rules: how many base-currency units one unit of a code is worth.
///
/// A NaN factor marks a currency that is known but has no rate yet.
#[derive(Debug, Clone, Default)]
pub struct ConversionContext {
    rules: HashMap<String, f64>,
}

impl ConversionContext {
    pub fn factor(&self, code: &str) -> Option<f64> {
        self.rules.get(code).copied().filter(|f| f.is_finite())
    }

    pub fn redefine(&mut self, code: &str, factor: f64) {
        self.rules.insert(code.to_string(), factor);
    }

    fn define_unresolved(&mut self, code: &str) {
        self.rules.entry(code.to_string()).or_insert(f64::NAN);
    }
}

/// The table of known units for one service run.
#[derive(Debug, Clone)]
pub struct UnitRegistry {
    generation: u64,
    units: Vec<UnitDef>,
    symbols: HashMap<String, UnitId>,
    aliases: HashMap<String, UnitId>,
    context: ConversionContext,
    base_currency: UnitId,
}

/// Build the symbol of a currency code.
pub fn currency_symbol(code: &str) -> String {
    format!("{}{}", CURRENCY_PREFIX, code.to_uppercase())
}

impl UnitRegistry {
    /// Create a registry holding only the base currency.
    pub fn new(generation: u64) -> Self {
        let mut registry = Self {
            generation,
            units: Vec::new(),
            symbols: HashMap::new(),
            aliases: HashMap::new(),
            context: ConversionContext::default(),
            base_currency: UnitId(0),
        };
        let base = registry.insert(UnitDef {
            symbol: currency_symbol(BASE_CURRENCY),
            display: BASE_CURRENCY.to_string(),
            dimension: CURRENCY_DIMENSION.to_string(),
            factor: 1.0,
            offset: 0.0,
        });
        registry.add_alias(base, BASE_CURRENCY);
        registry.context.redefine(BASE_CURRENCY, 1.0);
        registry.base_currency = base;
        registry
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn base_currency(&self) -> UnitId {
        self.base_currency
    }

    pub fn context(&self) -> &ConversionContext {
        &self.context
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn contains_symbol(&self, symbol: &str) -> bool {
        self.symbols.contains_key(symbol)
    }

    pub fn unit(&self, id: UnitId) -> &UnitDef {
        &self.units[id.0]
    }

    fn insert(&mut self, def: UnitDef) -> UnitId {
        let id = UnitId(self.units.len());
        self.aliases.entry(def.symbol.to_lowercase()).or_insert(id);
        self.symbols.insert(def.symbol.clone(), id);
        self.units.push(def);
        id
    }

    /// Define a dimension root such as `meter = [length]`.
    pub fn define_root(&mut self, symbol: &str, dimension: &str) -> UnitId {
        if let Some(id) = self.symbols.get(symbol) {
            return *id;
        }
        self.insert(UnitDef {
            symbol: symbol.to_string(),
            display: symbol.to_string(),
            dimension: dimension.to_string(),
            factor: 1.0,
            offset: 0.0,
        })
    }

    /// Define a unit whose value in `reference` units is `value * factor + offset`.
    ///
    /// Re-defining a known symbol is a no-op.
    pub fn define_derived(
        &mut self,
        symbol: &str,
        factor: f64,
        reference: UnitId,
        offset: f64,
    ) -> UnitId {
        if let Some(id) = self.symbols.get(symbol) {
            return *id;
        }
        let reference = self.unit(reference).clone();
        self.insert(UnitDef {
            symbol: symbol.to_string(),
            display: symbol.to_string(),
            dimension: reference.dimension,
            factor: factor * reference.factor,
            offset: offset * reference.factor + reference.offset,
        })
    }

    /// Upsert a currency unit with an unresolved magnitude.
    ///
    /// Idempotent: an already-known code returns its existing id.
    pub fn define_currency(&mut self, code: &str) -> UnitId {
        let code = code.to_uppercase();
        let symbol = currency_symbol(&code);
        if let Some(id) = self.symbols.get(&symbol) {
            return *id;
        }
        let id = self.insert(UnitDef {
            symbol,
            display: code.clone(),
            dimension: CURRENCY_DIMENSION.to_string(),
            factor: f64::NAN,
            offset: 0.0,
        });
        self.add_alias(id, &code);
        self.context.define_unresolved(&code);
        id
    }

    /// Set how many base-currency units one unit of `code` is worth.
    ///
    /// Returns false for the base currency, whose factor is fixed at 1.
    pub fn redefine_rate(&mut self, code: &str, factor: f64) -> bool {
        let id = self.define_currency(code);
        if id == self.base_currency {
            return false;
        }
        let code = code.to_uppercase();
        self.context.redefine(&code, factor);
        true
    }

    /// Current factor for a currency code, if a rate has been received.
    pub fn rate_factor(&self, code: &str) -> Option<f64> {
        self.context.factor(&code.to_uppercase())
    }

    /// Register a case-insensitive alias. The first unit to claim an alias keeps it.
    pub fn add_alias(&mut self, id: UnitId, alias: &str) -> bool {
        let key = alias.trim().to_lowercase();
        if key.is_empty() {
            return false;
        }
        match self.aliases.get(&key) {
            Some(existing) if *existing != id => {
                tracing::debug!(alias = %key, "Alias already taken, skipping");
                false
            }
            Some(_) => true,
            None => {
                self.aliases.insert(key, id);
                true
            }
        }
    }

    /// Set the display name shown for a unit in results.
    pub fn set_display(&mut self, id: UnitId, display: &str) {
        self.units[id.0].display = display.to_string();
    }

    /// Resolve a symbol or alias to a unit.
    pub fn resolve(&self, name: &str) -> Option<UnitId> {
        let name = name.trim();
        self.symbols
            .get(name)
            .or_else(|| self.aliases.get(&name.to_lowercase()))
            .copied()
    }

    pub fn is_currency(&self, id: UnitId) -> bool {
        self.unit(id).is_currency()
    }

    /// Convert `value` between two units.
    ///
    /// Returns `None` for incompatible dimensions or currencies without a rate.
    pub fn convert(&self, value: f64, from: UnitId, to: UnitId, mode: ConversionMode) -> Option<f64> {
        let source = self.unit(from);
        let target = self.unit(to);

        if source.is_currency() || target.is_currency() {
            if !(source.is_currency() && target.is_currency()) {
                return None;
            }
            let from_factor = self.context.factor(source.currency_code()?)?;
            let to_factor = self.context.factor(target.currency_code()?)?;
            return finite(value * from_factor / to_factor);
        }

        let root_value = value * source.factor + source.offset;
        let root_value = if source.dimension == target.dimension {
            root_value
        } else {
            match mode {
                ConversionMode::Normal => return None,
                ConversionMode::Crazy => crazy_bridge(source, target, root_value)?,
            }
        };

        finite((root_value - target.offset) / target.factor)
    }
}

/// Cross-dimension conversions allowed in crazy mode.
fn crazy_bridge(source: &UnitDef, target: &UnitDef, root_value: f64) -> Option<f64> {
    if source.offset != 0.0 || target.offset != 0.0 {
        return None;
    }
    match (source.dimension.as_str(), target.dimension.as_str()) {
        ("mass", "volume") => Some(root_value / WATER_GRAMS_PER_LITER),
        ("volume", "mass") => Some(root_value * WATER_GRAMS_PER_LITER),
        _ => None,
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn length_registry() -> (UnitRegistry, UnitId, UnitId) {
        let mut reg = UnitRegistry::new(1);
        let meter = reg.define_root("meter", "length");
        let km = reg.define_derived("kilometer", 1000.0, meter, 0.0);
        reg.add_alias(km, "km");
        (reg, meter, km)
    }

    #[test]
    fn test_base_currency_present() {
        let reg = UnitRegistry::new(7);
        let base = reg.base_currency();
        assert_eq!(reg.unit(base).symbol, "currency_EUR");
        assert_eq!(reg.rate_factor("EUR"), Some(1.0));
        assert_eq!(reg.resolve("eur"), Some(base));
        assert_eq!(reg.generation(), 7);
    }

    #[test]
    fn test_derived_conversion() {
        let (reg, meter, km) = length_registry();
        assert_eq!(reg.resolve("KM"), Some(km));
        assert_eq!(reg.convert(2.5, km, meter, ConversionMode::Normal), Some(2500.0));
    }

    #[test]
    fn test_offset_conversion() {
        let mut reg = UnitRegistry::new(1);
        let kelvin = reg.define_root("kelvin", "temperature");
        let celsius = reg.define_derived("degree_celsius", 1.0, kelvin, 273.15);
        let fahrenheit = reg.define_derived("degree_fahrenheit", 5.0 / 9.0, kelvin, 255.37222222222223);

        let c = reg.convert(212.0, fahrenheit, celsius, ConversionMode::Normal).unwrap();
        assert!((c - 100.0).abs() < 1e-9);
        let k = reg.convert(0.0, celsius, kelvin, ConversionMode::Normal).unwrap();
        assert!((k - 273.15).abs() < 1e-9);
    }

    #[test]
    fn test_define_currency_is_idempotent() {
        let mut reg = UnitRegistry::new(1);
        let before = reg.len();
        let first = reg.define_currency("usd");
        let second = reg.define_currency("USD");
        assert_eq!(first, second);
        assert_eq!(reg.len(), before + 1);
        assert!(reg.rate_factor("USD").is_none());
    }

    #[test]
    fn test_unresolved_currency_does_not_convert() {
        let mut reg = UnitRegistry::new(1);
        let usd = reg.define_currency("USD");
        let eur = reg.base_currency();
        assert!(reg.convert(10.0, usd, eur, ConversionMode::Normal).is_none());
    }

    #[test]
    fn test_redefine_rate_last_write_wins() {
        let mut reg = UnitRegistry::new(1);
        let usd = reg.define_currency("USD");
        let eur = reg.base_currency();

        assert!(reg.redefine_rate("USD", 1.0 / 1.10));
        assert!(reg.redefine_rate("USD", 1.0 / 1.20));
        let usd_per_eur = reg.convert(1.0, eur, usd, ConversionMode::Normal).unwrap();
        assert!((usd_per_eur - 1.20).abs() < 1e-9);
    }

    #[test]
    fn test_base_rate_is_never_redefined() {
        let mut reg = UnitRegistry::new(1);
        assert!(!reg.redefine_rate("eur", 0.5));
        assert_eq!(reg.rate_factor("EUR"), Some(1.0));
    }

    #[test]
    fn test_currency_and_physical_do_not_mix() {
        let (mut reg, meter, _) = length_registry();
        let usd = reg.define_currency("USD");
        reg.redefine_rate("USD", 0.9);
        assert!(reg.convert(1.0, usd, meter, ConversionMode::Crazy).is_none());
    }

    #[test]
    fn test_crazy_mode_mass_to_volume() {
        let mut reg = UnitRegistry::new(1);
        let gram = reg.define_root("gram", "mass");
        let kg = reg.define_derived("kilogram", 1000.0, gram, 0.0);
        let liter = reg.define_root("liter", "volume");

        assert!(reg.convert(1.0, kg, liter, ConversionMode::Normal).is_none());
        assert_eq!(reg.convert(2.0, kg, liter, ConversionMode::Crazy), Some(2.0));
        assert_eq!(reg.convert(1.0, liter, gram, ConversionMode::Crazy), Some(1000.0));
    }

    #[test]
    fn test_alias_first_claim_wins() {
        let (mut reg, meter, km) = length_registry();
        assert!(!reg.add_alias(meter, "km"));
        assert_eq!(reg.resolve("km"), Some(km));
        assert!(!reg.add_alias(meter, "   "));
    }
}
