//! A small predicate language over configuration properties and input stores.
//!
//! Activation rules only see properties and the release; masking rules may
//! also look at the current content of input stores.
use crate::config::properties::{Properties, PropertyValue};
use crate::store::error::ConfigError;
use crate::store::Tree;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Condition {
    #[default]
    Always,
    /// Boolean property is true.
    Flag(String),
    /// Boolean property is false.
    NotFlag(String),
    /// String or integer property equals the given text.
    Equals(String, String),
    /// Some token in the variable's store is a non-zero number.
    StoreNonZero(String),
    /// Some token in the variable's store names one of the items.
    StoreHasItem(String, Vec<String>),
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    /// Evaluates against properties and, if given, the tree's stores.
    ///
    /// Properties not valid for `release` read as false. Store predicates
    /// without a tree read as false.
    pub fn evaluate(&self, properties: &Properties, release: u32, tree: Option<&Tree>) -> Result<bool, ConfigError> {
        Ok(match self {
            Condition::Always => true,
            Condition::Flag(key) => Self::flag(properties, key, release)?,
            Condition::NotFlag(key) => !Self::flag(properties, key, release)?,
            Condition::Equals(key, expected) => {
                let prop = properties.get(key)?;
                let matches = match &prop.value {
                    PropertyValue::Str(s) => s == expected,
                    PropertyValue::Int(i) => i.to_string() == *expected,
                    PropertyValue::Bool(b) => b.to_string() == *expected,
                };
                prop.release.contains(release) && matches
            }
            Condition::StoreNonZero(name) => match tree {
                Some(tree) => {
                    let var = tree.variable(name)?;
                    match tree.parser().parse(&var.store) {
                        Ok(tokens) => tokens.iter().any(|(_, t)| t.parse::<f64>().map_or(false, |x| x != 0.0)),
                        Err(_) => false,
                    }
                }
                None => false,
            },
            Condition::StoreHasItem(name, items) => match tree {
                Some(tree) => {
                    let var = tree.variable(name)?;
                    let list = match var.discrete() {
                        Some(d) => &d.items,
                        None => return Err(ConfigError::KindMismatch { variable: name.clone(), expected: "discrete" }),
                    };
                    match tree.parser().parse(&var.store) {
                        Ok(tokens) => tokens.iter().any(|(_, t)| {
                            var.resolve_item(t)
                                .and_then(|pos| list.get(pos))
                                .map_or(false, |item| items.iter().any(|n| *n == item.name))
                        }),
                        Err(_) => false,
                    }
                }
                None => false,
            },
            Condition::All(all) => {
                for c in all {
                    if !c.evaluate(properties, release, tree)? {
                        return Ok(false);
                    }
                }
                true
            }
            Condition::Any(any) => {
                for c in any {
                    if c.evaluate(properties, release, tree)? {
                        return Ok(true);
                    }
                }
                false
            }
            Condition::Not(inner) => !inner.evaluate(properties, release, tree)?,
        })
    }

    fn flag(properties: &Properties, key: &str, release: u32) -> Result<bool, ConfigError> {
        if !properties.contains(key) {
            return Err(ConfigError::UnknownProperty(key.to_string()));
        }
        if !properties.is_valid(key, release) {
            return Ok(false);
        }
        properties.boolean(key)
    }

    /// Variables whose stores this condition reads.
    pub fn store_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_store_names(&mut names);
        names
    }

    fn collect_store_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::StoreNonZero(name) | Condition::StoreHasItem(name, _) => out.push(name),
            Condition::All(cs) | Condition::Any(cs) => cs.iter().for_each(|c| c.collect_store_names(out)),
            Condition::Not(inner) => inner.collect_store_names(out),
            _ => {}
        }
    }
}
