//! The shared master catalog every `Tree` is instantiated from.
//!
//! Variables and equations are declared here once by the domain layer;
//! `Tree::instantiate` deep-copies them so independent trees can diverge.
use super::equation::{Calc, Computation};
use super::error::ConfigError;
use super::items::ItemList;
use super::types::ReleaseRange;
use super::variable::{Continuous, Discrete, VarKind, Variable};
use crate::analysis::units::{conversion, Conversion};
use crate::compute::error::ComputationError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Declaration of a continuous variable.
#[derive(Debug, Clone)]
pub struct ContinuousDef {
    pub units: String,
    pub decimals: usize,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub english: (String, usize),
    pub metric: (String, usize),
    pub wrap: bool,
}

impl ContinuousDef {
    /// English and metric units default to the native ones.
    pub fn new(units: &str, decimals: usize, min: f64, max: f64) -> Self {
        Self {
            units: units.to_string(),
            decimals,
            min,
            max,
            default: min,
            english: (units.to_string(), decimals),
            metric: (units.to_string(), decimals),
            wrap: false,
        }
    }

    pub fn english(mut self, units: &str, decimals: usize) -> Self {
        self.english = (units.to_string(), decimals);
        self
    }

    pub fn metric(mut self, units: &str, decimals: usize) -> Self {
        self.metric = (units.to_string(), decimals);
        self
    }

    pub fn default_value(mut self, value: f64) -> Self {
        self.default = value;
        self
    }

    pub fn wrapping(mut self) -> Self {
        self.wrap = true;
        self
    }
}

#[derive(Clone)]
pub struct EquationDef {
    pub name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub release: ReleaseRange,
    pub(crate) compute: Computation,
}

#[derive(Clone, Default)]
pub struct Catalog {
    pub(crate) variables: Vec<Variable>,
    pub(crate) equations: Vec<EquationDef>,
    var_names: HashMap<String, usize>,
    eq_names: HashSet<String>,
    item_lists: HashMap<String, Arc<ItemList>>,
    /// Names from earlier document versions, accepted and ignored on load.
    pub(crate) retired: HashSet<String>,
}

impl Catalog {
    pub fn new() -> Self { Self::default() }

    pub fn variable_count(&self) -> usize { self.variables.len() }
    pub fn equation_count(&self) -> usize { self.equations.len() }

    pub fn add_item_list(&mut self, list: ItemList) -> Result<Arc<ItemList>, ConfigError> {
        if self.item_lists.contains_key(&list.name) {
            return Err(ConfigError::DuplicateName { what: "item list", name: list.name });
        }
        let list = Arc::new(list);
        self.item_lists.insert(list.name.clone(), list.clone());
        Ok(list)
    }

    fn push_variable(&mut self, mut var: Variable) -> Result<&mut Variable, ConfigError> {
        if self.var_names.contains_key(&var.name) {
            return Err(ConfigError::DuplicateName { what: "variable", name: var.name });
        }
        let idx = self.variables.len();
        var.input_order = idx;
        var.output_order = idx;
        self.var_names.insert(var.name.clone(), idx);
        self.variables.push(var);
        Ok(&mut self.variables[idx])
    }

    pub fn add_continuous(&mut self, name: &str, def: ContinuousDef) -> Result<&mut Variable, ConfigError> {
        for (units, _) in [&def.english, &def.metric] {
            conversion(&def.units, units).map_err(|e| ConfigError::BadUnits {
                variable: name.to_string(),
                unit: units.clone(),
                reason: e.to_string(),
            })?;
        }
        let kind = VarKind::Continuous(Continuous {
            native_units: def.units.clone(),
            native_decimals: def.decimals,
            english_units: def.english.0,
            english_decimals: def.english.1,
            metric_units: def.metric.0,
            metric_decimals: def.metric.1,
            native_min: def.min,
            native_max: def.max,
            default_value: def.default,
            value: def.default,
            display_value: def.default,
            display_min: def.min,
            display_max: def.max,
            display_decimals: def.decimals,
            display_units: def.units,
            conversion: Conversion::IDENTITY,
            wrap: def.wrap,
        });
        self.push_variable(Variable::new(name, kind))
    }

    /// Declares a discrete variable over a previously added item list.
    pub fn add_discrete(&mut self, name: &str, item_list: &str) -> Result<&mut Variable, ConfigError> {
        let items = self
            .item_lists
            .get(item_list)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownItemList(item_list.to_string()))?;
        self.push_variable(Variable::new(name, VarKind::Discrete(Discrete { items, active: 0 })))
    }

    pub fn add_text(&mut self, name: &str) -> Result<&mut Variable, ConfigError> {
        self.push_variable(Variable::new(name, VarKind::Text(String::new())))
    }

    /// Declares an equation. Names are resolved when a tree is instantiated.
    pub fn add_equation<F>(&mut self, name: &str, inputs: &[&str], outputs: &[&str], compute: F) -> Result<&mut EquationDef, ConfigError>
    where
        F: Fn(&mut Calc<'_>) -> Result<(), ComputationError> + Send + Sync + 'static,
    {
        if !self.eq_names.insert(name.to_string()) {
            return Err(ConfigError::DuplicateName { what: "equation", name: name.to_string() });
        }
        self.equations.push(EquationDef {
            name: name.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            release: ReleaseRange::ALWAYS,
            compute: Arc::new(compute),
        });
        let idx = self.equations.len() - 1;
        Ok(&mut self.equations[idx])
    }

    pub fn variable_mut(&mut self, name: &str) -> Result<&mut Variable, ConfigError> {
        let idx = *self.var_names.get(name).ok_or_else(|| ConfigError::UnknownVariable(name.to_string()))?;
        Ok(&mut self.variables[idx])
    }

    /// Marks a name from an earlier document version as known-but-ignored.
    pub fn retire(&mut self, name: &str) {
        self.retired.insert(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_names_rejected() {
        let mut catalog = Catalog::new();
        catalog.add_continuous("vA", ContinuousDef::new("ft", 1, 0.0, 1.0)).unwrap();
        assert!(matches!(catalog.add_text("vA"), Err(ConfigError::DuplicateName { what: "variable", .. })));

        catalog.add_equation("EqA", &[], &["vA"], |_| Ok(())).unwrap();
        assert!(catalog.add_equation("EqA", &[], &["vA"], |_| Ok(())).is_err());
    }

    #[test]
    fn test_unit_sets_must_convert() {
        let mut catalog = Catalog::new();
        let err = catalog.add_continuous("vA", ContinuousDef::new("ft", 1, 0.0, 1.0).english("lb", 1)).unwrap_err();
        assert!(matches!(err, ConfigError::BadUnits { ref unit, .. } if unit == "lb"));
    }

    #[test]
    fn test_discrete_needs_known_item_list() {
        let mut catalog = Catalog::new();
        assert_eq!(catalog.add_discrete("vModel", "Nope").unwrap_err(), ConfigError::UnknownItemList("Nope".into()));

        catalog.add_item_list(ItemList::new("Models").with_item("1", "gr1", "")).unwrap();
        let var = catalog.add_discrete("vModel", "Models").unwrap();
        assert!(var.is_discrete());
        assert_eq!(catalog.variable_count(), 1);
    }
}
