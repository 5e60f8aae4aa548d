use serde::{Deserialize, Serialize};
use std::fmt;

use super::traits::ModelError;

/// One hyperparameter setting. `UInt` only holds values above `i64::MAX`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::UInt(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for ParamValue {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(Self::UInt(v), Self::Int)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// A single point of a [`ParamGrid`], in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params(pub Vec<(String, ParamValue)>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    /// Fails on any parameter name outside `known`.
    pub fn reject_unknown(&self, known: &[&str]) -> Result<(), ModelError> {
        match self.0.iter().find(|(key, _)| !known.contains(&key.as_str())) {
            Some((key, _)) => Err(ModelError::UnknownParam(key.clone())),
            None => Ok(()),
        }
    }

    /// A strictly positive count.
    pub fn count(&self, name: &str, default: usize) -> Result<usize, ModelError> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Int(v)) if *v > 0 => usize::try_from(*v)
                .map_err(|_| ModelError::invalid(name, format!("{} is too large", v))),
            Some(ParamValue::UInt(v)) => usize::try_from(*v)
                .map_err(|_| ModelError::invalid(name, format!("{} is too large", v))),
            Some(other) => Err(ModelError::invalid(name, format!("{} is not a positive integer", other))),
        }
    }

    pub fn seed(&self, name: &str, default: u64) -> Result<u64, ModelError> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Int(v)) if *v >= 0 => Ok(*v as u64),
            Some(ParamValue::UInt(v)) => Ok(*v),
            Some(other) => Err(ModelError::invalid(name, format!("{} is not a valid seed", other))),
        }
    }

    /// A finite float greater than zero. Integers are accepted.
    pub fn positive(&self, name: &str, default: f64) -> Result<f64, ModelError> {
        let value = match self.get(name) {
            None => return Ok(default),
            Some(ParamValue::Float(v)) => *v,
            Some(ParamValue::Int(v)) => *v as f64,
            Some(ParamValue::UInt(v)) => *v as f64,
            Some(other) => return Err(ModelError::invalid(name, format!("{} is not a number", other))),
        };
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(ModelError::invalid(name, format!("{} is not positive", value)))
        }
    }

    pub fn text<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str, ModelError> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Text(v)) => Ok(v.as_str()),
            Some(other) => Err(ModelError::invalid(name, format!("{} is not text", other))),
        }
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (key, value)) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        write!(f, "}}")
    }
}

/// Discrete hyperparameter search space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    entries: Vec<(String, Vec<ParamValue>)>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<V, I>(mut self, name: &str, values: I) -> Self
    where
        V: Into<ParamValue>,
        I: IntoIterator<Item = V>,
    {
        self.entries
            .push((name.to_string(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// True when the grid spans no point: no parameters, or a parameter with
    /// no candidate values.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() || self.entries.iter().any(|(_, values)| values.is_empty())
    }

    /// Cartesian product in declaration order, last parameter varying fastest.
    pub fn combinations(&self) -> Vec<Params> {
        if self.is_empty() {
            return Vec::new();
        }
        let mut combos = vec![Params::default()];
        for (name, values) in &self.entries {
            combos = combos
                .into_iter()
                .flat_map(|prefix| {
                    values.iter().map(move |value| {
                        let mut next = prefix.clone();
                        next.0.push((name.clone(), value.clone()));
                        next
                    })
                })
                .collect();
        }
        combos
    }
}
