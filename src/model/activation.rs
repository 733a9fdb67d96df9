//! Reconfiguration: choosing which equations are active.
//!
//! An [`Activator`] maps (properties, release) to an [`ActivationPlan`]; the
//! tree then resets its flags, applies the plan and re-derives its roots and
//! leaves. The same inputs always produce the same active graph.
use crate::analysis::topology;
use crate::config::properties::Properties;
use crate::model::condition::Condition;
use crate::store::error::ConfigError;
use crate::store::Tree;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationPlan {
    /// Equations to activate; each becomes the active producer of its outputs.
    #[serde(default)]
    pub equations: Vec<String>,
    /// Variables the user asked to see.
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Variables fixed by the configuration rather than entered by the user.
    #[serde(default)]
    pub constants: Vec<String>,
}

impl ActivationPlan {
    pub fn extend(&mut self, other: &ActivationPlan) {
        self.equations.extend(other.equations.iter().cloned());
        self.outputs.extend(other.outputs.iter().cloned());
        self.constants.extend(other.constants.iter().cloned());
    }
}

/// Domain rules deciding the active graph.
pub trait Activator: Send + Sync {
    fn plan(&self, properties: &Properties, release: u32) -> Result<ActivationPlan, ConfigError>;
}

impl<F> Activator for F
where
    F: Fn(&Properties, u32) -> Result<ActivationPlan, ConfigError> + Send + Sync,
{
    fn plan(&self, properties: &Properties, release: u32) -> Result<ActivationPlan, ConfigError> {
        self(properties, release)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivationRule {
    #[serde(default)]
    pub when: Condition,
    #[serde(flatten)]
    pub plan: ActivationPlan,
}

/// A declarative [`Activator`]: every rule whose condition holds
/// contributes its plan, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivationRules {
    pub rules: Vec<ActivationRule>,
}

impl ActivationRules {
    pub fn new() -> Self { Self::default() }

    pub fn rule(mut self, when: Condition, plan: ActivationPlan) -> Self {
        self.rules.push(ActivationRule { when, plan });
        self
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

impl Activator for ActivationRules {
    fn plan(&self, properties: &Properties, release: u32) -> Result<ActivationPlan, ConfigError> {
        let mut plan = ActivationPlan::default();
        for rule in &self.rules {
            if rule.when.evaluate(properties, release, None)? {
                plan.extend(&rule.plan);
            }
        }
        Ok(plan)
    }
}

impl Tree {
    /// Re-derives the active graph for `release` from the tree's properties.
    pub fn reconfigure(&mut self, release: u32, activator: &dyn Activator) -> Result<(), ConfigError> {
        let plan = activator.plan(&self.properties, release)?;
        self.apply_plan(release, &plan)
    }

    /// Resets every flag and dirty bit, then installs `plan`.
    pub fn apply_plan(&mut self, release: u32, plan: &ActivationPlan) -> Result<(), ConfigError> {
        // 1. Reset.
        for var in self.vars.iter_mut() {
            var.is_user_input = false;
            var.is_user_output = false;
            var.is_constant = false;
            var.active_producer = None;
        }
        for eq in self.eqs.iter_mut() {
            eq.active = false;
            eq.reset();
        }
        self.roots.clear();
        self.leaves.clear();
        self.range_vars.clear();
        self.release = release;

        // 2. Activate equations; a variable takes exactly one active producer.
        for name in &plan.equations {
            let id = self.eq_id(name)?;
            if !self.eqs[id.index()].release.contains(release) {
                tracing::debug!(equation = %name, release, "equation not valid for release, skipped");
                continue;
            }
            self.eqs[id.index()].active = true;
            for i in 0..self.eqs[id.index()].outputs.len() {
                let out = self.eqs[id.index()].outputs[i];
                match self.vars[out.index()].active_producer {
                    Some(prev) if prev != id => {
                        return Err(ConfigError::ConflictingProducers {
                            variable: self.vars[out.index()].name.clone(),
                            first: self.eqs[prev.index()].name.clone(),
                            second: name.clone(),
                        })
                    }
                    _ => self.vars[out.index()].active_producer = Some(id),
                }
            }
        }

        // 3. Outputs and constants.
        for name in &plan.outputs {
            let id = self.var_id(name)?;
            self.vars[id.index()].is_user_output = true;
        }
        for name in &plan.constants {
            let id = self.var_id(name)?;
            self.vars[id.index()].is_constant = true;
        }

        // 4. Derive roots and leaves from the active graph.
        topology::check_acyclic(self)?;
        self.roots = topology::roots(self);
        self.leaves = topology::leaves(self, &self.roots);
        for i in 0..self.leaves.len() {
            let leaf = self.leaves[i];
            self.vars[leaf.index()].is_user_input = true;
        }

        self.mask_inputs()?;

        tracing::debug!(
            release,
            equations = self.eqs.iter().filter(|e| e.active).count(),
            roots = self.roots.len(),
            leaves = self.leaves.len(),
            "reconfigured"
        );
        Ok(())
    }
}
