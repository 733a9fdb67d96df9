//! The per-session equation tree: an arena of variables and equations.
//!
//! Cross references (producers, consumers, equation inputs and outputs) are
//! arena indices, never pointers, so a `Tree` is `Clone` and `Send`.
use super::catalog::Catalog;
use super::equation::Equation;
use super::error::ConfigError;
use super::types::{EqId, UnitsSet, VarId};
use super::variable::{VarKind, Variable};
use crate::analysis::tokens::TokenParser;
use crate::compute::error::ComputationError;
use crate::config::properties::Properties;
use crate::model::masking::MaskRules;
use crate::validation::error::InputError;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const MAX_CONSUMERS: usize = 128;
pub const MAX_PRODUCERS: usize = 16;

#[derive(Debug, Clone)]
pub struct Tree {
    pub(crate) vars: Vec<Variable>,
    pub(crate) eqs: Vec<Equation>,
    var_index: HashMap<String, VarId>,
    eq_index: HashMap<String, EqId>,

    pub(crate) leaves: Vec<VarId>,
    pub(crate) roots: Vec<VarId>,
    pub(crate) range_vars: SmallVec<[VarId; 2]>,

    pub properties: Properties,
    pub(crate) release: u32,

    pub(crate) mask_rules: Option<Arc<MaskRules>>,
    pub(crate) mask_triggers: HashSet<VarId>,
    pub(crate) retired: Arc<HashSet<String>>,
    pub(crate) parser: TokenParser,
    pub(crate) invocations: u64,
}

impl Tree {
    /// Deep-copies the catalog and wires producers and consumers.
    ///
    /// Any failure here means the catalog itself is inconsistent.
    pub fn instantiate(catalog: &Catalog) -> Result<Self, ConfigError> {
        let mut vars = catalog.variables.clone();
        let mut var_index = HashMap::with_capacity(vars.len());
        for (i, var) in vars.iter_mut().enumerate() {
            var.producers.clear();
            var.consumers.clear();
            var.active_producer = None;
            var_index.insert(var.name.clone(), VarId::new(i));
        }

        // Masters must name real variables.
        for var in &vars {
            if let Some(master) = &var.master {
                if !var_index.contains_key(master) {
                    return Err(ConfigError::UnknownVariable(master.clone()));
                }
            }
        }

        let mut eqs = Vec::with_capacity(catalog.equations.len());
        let mut eq_index = HashMap::with_capacity(catalog.equations.len());
        for (i, def) in catalog.equations.iter().enumerate() {
            let id = EqId::new(i);
            let resolve = |name: &String| {
                var_index.get(name).copied().ok_or_else(|| ConfigError::UnresolvedVariable {
                    equation: def.name.clone(),
                    variable: name.clone(),
                })
            };

            // 1. Inputs register this equation as a consumer.
            let mut inputs = SmallVec::with_capacity(def.inputs.len());
            for name in &def.inputs {
                let vid = resolve(name)?;
                let var = &mut vars[vid.index()];
                if !var.consumers.contains(&id) {
                    if var.consumers.len() >= MAX_CONSUMERS {
                        return Err(ConfigError::ConsumerOverflow { variable: var.name.clone(), limit: MAX_CONSUMERS });
                    }
                    var.consumers.push(id);
                }
                inputs.push(vid);
            }

            // 2. Outputs register it as a producer candidate.
            let mut outputs = SmallVec::with_capacity(def.outputs.len());
            for name in &def.outputs {
                let vid = resolve(name)?;
                let var = &mut vars[vid.index()];
                if var.producers.len() >= MAX_PRODUCERS {
                    return Err(ConfigError::ProducerOverflow { variable: var.name.clone(), limit: MAX_PRODUCERS });
                }
                var.producers.push(id);
                outputs.push(vid);
            }

            eq_index.insert(def.name.clone(), id);
            eqs.push(Equation::new(def.name.clone(), inputs, outputs, def.release, def.compute.clone()));
        }

        tracing::debug!(variables = vars.len(), equations = eqs.len(), "instantiated equation tree");

        Ok(Self {
            vars,
            eqs,
            var_index,
            eq_index,
            leaves: Vec::new(),
            roots: Vec::new(),
            range_vars: SmallVec::new(),
            properties: Properties::with_defaults(),
            release: 0,
            mask_rules: None,
            mask_triggers: HashSet::new(),
            retired: Arc::new(catalog.retired.clone()),
            parser: TokenParser::default(),
            invocations: 0,
        })
    }

    // --- Lookups ---

    pub fn var_id(&self, name: &str) -> Result<VarId, ConfigError> {
        self.var_index.get(name).copied().ok_or_else(|| ConfigError::UnknownVariable(name.to_string()))
    }

    pub fn eq_id(&self, name: &str) -> Result<EqId, ConfigError> {
        self.eq_index.get(name).copied().ok_or_else(|| ConfigError::UnknownEquation(name.to_string()))
    }

    pub fn has_variable(&self, name: &str) -> bool { self.var_index.contains_key(name) }
    pub fn is_retired(&self, name: &str) -> bool { self.retired.contains(name) }

    #[inline(always)]
    pub fn var(&self, id: VarId) -> &Variable { &self.vars[id.index()] }

    #[inline(always)]
    pub fn equation(&self, id: EqId) -> &Equation { &self.eqs[id.index()] }

    pub fn variable(&self, name: &str) -> Result<&Variable, ConfigError> {
        Ok(self.var(self.var_id(name)?))
    }

    pub fn variables(&self) -> impl Iterator<Item = (VarId, &Variable)> {
        self.vars.iter().enumerate().map(|(i, v)| (VarId::new(i), v))
    }

    pub fn equations(&self) -> impl Iterator<Item = (EqId, &Equation)> {
        self.eqs.iter().enumerate().map(|(i, e)| (EqId::new(i), e))
    }

    pub fn var_count(&self) -> usize { self.vars.len() }
    pub fn eq_count(&self) -> usize { self.eqs.len() }

    /// Required inputs for the current configuration, in declared input order.
    pub fn leaves(&self) -> &[VarId] { &self.leaves }
    /// Requested outputs for the current configuration, in declared output order.
    pub fn roots(&self) -> &[VarId] { &self.roots }
    /// The 0-2 multi-valued leaves driving the sweep; row driver first.
    pub fn range_vars(&self) -> &[VarId] { &self.range_vars }
    pub fn release(&self) -> u32 { self.release }
    pub fn parser(&self) -> &TokenParser { &self.parser }
    /// Total equation invocations since instantiation.
    pub fn invocations(&self) -> u64 { self.invocations }

    pub fn set_release(&mut self, release: u32) { self.release = release; }

    // --- Value mutators. Each marks everything downstream dirty. ---

    fn continuous_mut(&mut self, id: VarId) -> Result<&mut super::variable::Continuous, ConfigError> {
        let var = &mut self.vars[id.index()];
        let name = var.name.clone();
        var.continuous_mut().ok_or(ConfigError::KindMismatch { variable: name, expected: "continuous" })
    }

    /// Stores a display-unit value and recomputes the native value.
    pub fn set_display_value(&mut self, id: VarId, display: f64) -> Result<(), ConfigError> {
        self.continuous_mut(id)?.set_display_value(display);
        self.propagate_dirty(id);
        Ok(())
    }

    pub fn set_native_value(&mut self, id: VarId, native: f64) -> Result<(), ConfigError> {
        self.continuous_mut(id)?.set_native_value(native);
        self.propagate_dirty(id);
        Ok(())
    }

    /// Activates a discrete item by name, or by sort key where enabled.
    pub fn set_item_name(&mut self, id: VarId, item: &str) -> Result<(), ComputationError> {
        let var = &mut self.vars[id.index()];
        if !var.is_discrete() {
            return Err(ConfigError::KindMismatch { variable: var.name.clone(), expected: "discrete" }.into());
        }
        let pos = var
            .resolve_item(item)
            .ok_or_else(|| InputError::UnknownItem { variable: var.name.clone(), item: item.to_string() })?;
        if let Some(d) = var.discrete_mut() {
            d.active = pos;
        }
        self.propagate_dirty(id);
        Ok(())
    }

    /// Activates a discrete item by its data index.
    pub fn set_item_index(&mut self, id: VarId, index: usize) -> Result<(), ComputationError> {
        let var = &mut self.vars[id.index()];
        let name = var.name.clone();
        let d = var.discrete_mut().ok_or_else(|| ConfigError::KindMismatch { variable: name.clone(), expected: "discrete" })?;
        let pos = d
            .items
            .position_by_index(index)
            .ok_or_else(|| InputError::UnknownItem { variable: name, item: index.to_string() })?;
        d.active = pos;
        self.propagate_dirty(id);
        Ok(())
    }

    pub fn set_text(&mut self, id: VarId, text: &str) -> Result<(), ConfigError> {
        let var = &mut self.vars[id.index()];
        match &mut var.kind {
            VarKind::Text(t) => *t = text.to_string(),
            _ => return Err(ConfigError::KindMismatch { variable: var.name.clone(), expected: "text" }),
        }
        self.propagate_dirty(id);
        Ok(())
    }

    /// Replaces a variable's store and token count. Masking is re-run when
    /// the variable feeds a mask rule.
    pub fn set_store(&mut self, id: VarId, text: &str) -> Result<usize, ComputationError> {
        let count = {
            let var = &self.vars[id.index()];
            if var.is_text() {
                usize::from(!text.trim().is_empty())
            } else {
                self.parser.count(text).map_err(|e| InputError::from_token(&var.name, e))?
            }
        };
        let var = &mut self.vars[id.index()];
        var.store = text.to_string();
        var.tokens = count;
        if self.mask_triggers.contains(&id) {
            self.mask_inputs()?;
        }
        Ok(count)
    }

    /// Switches one continuous variable's display units (store re-encoding
    /// included). Native values do not change, so nothing becomes dirty.
    pub fn set_display_units(&mut self, id: VarId, units: &str, decimals: usize) -> Result<bool, InputError> {
        let parser = &self.parser;
        self.vars[id.index()].set_display_units(units, decimals, parser)
    }

    /// Applies a units set to every continuous variable.
    pub fn apply_units_set(&mut self, set: UnitsSet) -> Result<(), InputError> {
        let parser = &self.parser;
        for var in self.vars.iter_mut() {
            let (units, decimals) = match var.continuous() {
                Some(c) => {
                    let (u, d) = c.units_for(set);
                    (u.to_string(), d)
                }
                None => continue,
            };
            var.set_display_units(&units, decimals, parser)?;
        }
        tracing::debug!(?set, "applied units set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::store::catalog::{Catalog, ContinuousDef};

    #[test]
    fn test_wiring_resolves_producers_and_consumers() {
        let tree = fixtures::tree();
        let depth = tree.var_id("vSurfaceFuelBedDepth").unwrap();
        let model = tree.var_id("vSurfaceFuelBedModel").unwrap();

        assert_eq!(tree.var(depth).producers().len(), 1);
        let eq = tree.var(depth).producers()[0];
        assert_eq!(tree.equation(eq).name, "EqFuelBedDepth");
        assert!(tree.var(model).consumers().contains(&eq));
        assert!(tree.var(model).producers().is_empty());

        let head = tree.var_id("vSurfaceFireSpreadAtHead").unwrap();
        assert_eq!(tree.var(head).producers().len(), 2);
    }

    #[test]
    fn test_unresolved_name_is_fatal() {
        let mut catalog = Catalog::new();
        catalog.add_continuous("vA", ContinuousDef::new("ft", 1, 0.0, 1.0)).unwrap();
        catalog.add_equation("EqBroken", &["vA", "vMissing"], &["vA"], |_| Ok(())).unwrap();

        let err = Tree::instantiate(&catalog).unwrap_err();
        assert_eq!(err, ConfigError::UnresolvedVariable { equation: "EqBroken".into(), variable: "vMissing".into() });
    }

    #[test]
    fn test_producer_overflow_is_fatal() {
        let mut catalog = Catalog::new();
        catalog.add_continuous("vA", ContinuousDef::new("ft", 1, 0.0, 1.0)).unwrap();
        for i in 0..=MAX_PRODUCERS {
            catalog.add_equation(&format!("Eq{}", i), &[], &["vA"], |_| Ok(())).unwrap();
        }
        assert!(matches!(Tree::instantiate(&catalog), Err(ConfigError::ProducerOverflow { .. })));
    }

    #[test]
    fn test_consumer_overflow_is_fatal() {
        let mut catalog = Catalog::new();
        catalog.add_continuous("vA", ContinuousDef::new("ft", 1, 0.0, 1.0)).unwrap();
        for i in 0..MAX_CONSUMERS {
            catalog.add_equation(&format!("Eq{}", i), &["vA"], &[], |_| Ok(())).unwrap();
        }
        assert!(Tree::instantiate(&catalog).is_ok());

        catalog.add_equation("EqOneTooMany", &["vA"], &[], |_| Ok(())).unwrap();
        let err = Tree::instantiate(&catalog).unwrap_err();
        assert_eq!(err, ConfigError::ConsumerOverflow { variable: "vA".into(), limit: MAX_CONSUMERS });
    }

    #[test]
    fn test_unknown_lookup_is_an_error() {
        let tree = fixtures::tree();
        assert!(matches!(tree.var_id("vNope"), Err(ConfigError::UnknownVariable(_))));
        assert!(matches!(tree.eq_id("EqNope"), Err(ConfigError::UnknownEquation(_))));
    }

    #[test]
    fn test_trees_from_one_catalog_diverge() {
        let catalog = fixtures::catalog();
        let mut a = Tree::instantiate(&catalog).unwrap();
        let b = Tree::instantiate(&catalog).unwrap();
        let wind = a.var_id("vWindSpeedAtMidflame").unwrap();

        a.set_display_value(wind, 440.0).unwrap();
        assert_eq!(a.var(wind).continuous().unwrap().value, 440.0);
        assert_eq!(b.var(wind).continuous().unwrap().value, 0.0);
    }

    #[test]
    fn test_item_name_with_sort_key_fallback() {
        let mut tree = fixtures::tree();
        let model = tree.var_id("vSurfaceFuelBedModel").unwrap();

        tree.set_item_name(model, "sh1").unwrap();
        assert_eq!(tree.var(model).current_text(), "sh1");

        // Reserved fuel bed variables also accept the sort key.
        tree.set_item_name(model, "102").unwrap();
        assert_eq!(tree.var(model).current_text(), "gr2");

        let err = tree.set_item_name(model, "zz9").unwrap_err();
        assert!(matches!(err, ComputationError::Input(InputError::UnknownItem { .. })));

        // Other discrete variables do not.
        let phase = tree.var_id("vSurfaceFirePhase").unwrap();
        assert!(tree.set_item_name(phase, "1").is_err());
    }

    #[test]
    fn test_units_set_switches_every_continuous_variable() {
        let mut tree = fixtures::tree();
        let wind = tree.var_id("vWindSpeedAtMidflame").unwrap();
        tree.set_store(wind, "88 176").unwrap();
        tree.set_display_value(wind, 88.0).unwrap();

        tree.apply_units_set(UnitsSet::English).unwrap();
        let c = tree.var(wind).continuous().unwrap();
        assert_eq!(c.display_units, "mi/h");
        assert!((c.display_value - 1.0).abs() < 1e-9);
        assert_eq!(tree.var(wind).store, "1 2");

        tree.apply_units_set(UnitsSet::Native).unwrap();
        assert_eq!(tree.var(wind).store, "88 176");
    }
}
