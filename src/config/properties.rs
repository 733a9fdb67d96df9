//! The configuration dictionary consumed by activation, masking and sweeps.
use crate::store::error::ConfigError;
use crate::store::types::ReleaseRange;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Graph-mode point count for the row driver.
pub const GRAPH_POINTS: &str = "graphXValues";
/// Whether sweeps evaluate prescriptions.
pub const TABLE_SHADING: &str = "tableShading";

const DEFAULT_GRAPH_POINTS: i64 = 11;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub value: PropertyValue,
    #[serde(default)]
    pub release: ReleaseRange,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties {
    entries: BTreeMap<String, Property>,
}

impl Properties {
    pub fn new() -> Self { Self::default() }

    /// Built-in keys the engine itself reads.
    pub fn with_defaults() -> Self {
        let mut props = Self::new();
        props.insert(GRAPH_POINTS, PropertyValue::Int(DEFAULT_GRAPH_POINTS), ReleaseRange::ALWAYS);
        props.insert(TABLE_SHADING, PropertyValue::Bool(true), ReleaseRange::ALWAYS);
        props
    }

    pub fn insert(&mut self, key: &str, value: PropertyValue, release: ReleaseRange) {
        self.entries.insert(key.to_string(), Property { value, release });
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn contains(&self, key: &str) -> bool { self.entries.contains_key(key) }

    pub fn get(&self, key: &str) -> Result<&Property, ConfigError> {
        self.entries.get(key).ok_or_else(|| ConfigError::UnknownProperty(key.to_string()))
    }

    /// True if the key exists and is valid for `release`.
    pub fn is_valid(&self, key: &str, release: u32) -> bool {
        self.entries.get(key).map_or(false, |p| p.release.contains(release))
    }

    pub fn boolean(&self, key: &str) -> Result<bool, ConfigError> {
        match &self.get(key)?.value {
            PropertyValue::Bool(b) => Ok(*b),
            _ => Err(ConfigError::PropertyType { key: key.to_string(), expected: "boolean" }),
        }
    }

    pub fn integer(&self, key: &str) -> Result<i64, ConfigError> {
        match &self.get(key)?.value {
            PropertyValue::Int(i) => Ok(*i),
            _ => Err(ConfigError::PropertyType { key: key.to_string(), expected: "integer" }),
        }
    }

    pub fn string(&self, key: &str) -> Result<&str, ConfigError> {
        match &self.get(key)?.value {
            PropertyValue::Str(s) => Ok(s),
            _ => Err(ConfigError::PropertyType { key: key.to_string(), expected: "string" }),
        }
    }

    /// Overwrites the value of an existing key, keeping its release range.
    pub fn set(&mut self, key: &str, value: PropertyValue) -> Result<(), ConfigError> {
        let prop = self.entries.get_mut(key).ok_or_else(|| ConfigError::UnknownProperty(key.to_string()))?;
        if std::mem::discriminant(&prop.value) != std::mem::discriminant(&value) {
            let expected = match prop.value {
                PropertyValue::Bool(_) => "boolean",
                PropertyValue::Int(_) => "integer",
                PropertyValue::Str(_) => "string",
            };
            return Err(ConfigError::PropertyType { key: key.to_string(), expected });
        }
        prop.value = value;
        Ok(())
    }

    pub fn set_bool(&mut self, key: &str, value: bool) -> Result<(), ConfigError> {
        self.set(key, PropertyValue::Bool(value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merges `other` into `self`; keys in `other` win.
    pub fn merge(&mut self, other: Properties) {
        self.entries.extend(other.entries);
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let text = self.to_json().map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, text)
    }
}
