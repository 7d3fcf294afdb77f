//! Measurement units and currencies.
//!
//! - [`registry`] - the unit table and currency conversion context
//! - [`definitions`] - loader for the symbol and alias tables
//! - [`service`] - lifecycle of the shared registry and live rate updates

pub mod definitions;
pub mod registry;
pub mod service;

pub use definitions::{load_definitions, DefinitionSource, LoadMode};
pub use registry::{
    currency_symbol, ConversionContext, UnitDef, UnitId, UnitRegistry, BASE_CURRENCY,
    CURRENCY_PREFIX,
};
pub use service::{ServiceState, UnitsService};
