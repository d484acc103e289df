//! Pricing value types

pub mod model;

pub use model::{CalculationLineItem, CalculationResult, EffectiveWindow};
