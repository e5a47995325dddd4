//! Scalar values as they come out of the warehouse.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A numeric cell in whatever representation the source produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Null,
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
}

impl Numeric {
    /// Plain floating-point value; fixed-point decimals never leave this function.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Numeric::Null => None,
            Numeric::Int(v) => Some(*v as f64),
            Numeric::Float(v) => Some(*v),
            Numeric::Decimal(d) => d.to_f64(),
            Numeric::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

impl From<Decimal> for Numeric {
    fn from(value: Decimal) -> Self {
        Numeric::Decimal(value)
    }
}

impl From<Option<Decimal>> for Numeric {
    fn from(value: Option<Decimal>) -> Self {
        value.map(Numeric::Decimal).unwrap_or(Numeric::Null)
    }
}

impl From<f64> for Numeric {
    fn from(value: f64) -> Self {
        Numeric::Float(value)
    }
}

impl From<i64> for Numeric {
    fn from(value: i64) -> Self {
        Numeric::Int(value)
    }
}
