//! Input masking: which leaves are relevant given the current input values.
//!
//! Masking starts from everything masked and lets each rule whose condition
//! holds unmask its variables. Masked inputs may be left empty.
use crate::model::condition::Condition;
use crate::store::error::ConfigError;
use crate::store::types::VarId;
use crate::store::Tree;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaskRule {
    #[serde(default)]
    pub when: Condition,
    pub unmask: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaskRules {
    pub rules: Vec<MaskRule>,
}

impl MaskRules {
    pub fn new() -> Self { Self::default() }

    pub fn rule(mut self, when: Condition, unmask: &[&str]) -> Self {
        self.rules.push(MaskRule { when, unmask: unmask.iter().map(|s| s.to_string()).collect() });
        self
    }

    /// Variables whose store changes can flip a mask.
    pub fn triggers(&self) -> HashSet<&str> {
        self.rules.iter().flat_map(|r| r.when.store_names()).collect()
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

impl Tree {
    /// Installs mask rules and applies them once.
    pub fn set_mask_rules(&mut self, rules: MaskRules) -> Result<(), ConfigError> {
        let mut triggers = HashSet::new();
        for name in rules.triggers() {
            triggers.insert(self.var_id(name)?);
        }
        for rule in &rules.rules {
            for name in &rule.unmask {
                self.var_id(name)?;
            }
        }
        self.mask_triggers = triggers;
        self.mask_rules = Some(Arc::new(rules));
        self.mask_inputs()
    }

    /// Recomputes every variable's mask. Without rules nothing is masked.
    pub fn mask_inputs(&mut self) -> Result<(), ConfigError> {
        let Some(rules) = self.mask_rules.clone() else {
            self.vars.iter_mut().for_each(|v| v.is_masked = false);
            return Ok(());
        };

        let mut unmasked = HashSet::new();
        for rule in &rules.rules {
            if rule.when.evaluate(&self.properties, self.release, Some(self))? {
                for name in &rule.unmask {
                    unmasked.insert(self.var_id(name)?);
                }
            }
        }

        for (i, var) in self.vars.iter_mut().enumerate() {
            var.is_masked = !unmasked.contains(&VarId::new(i));
        }
        tracing::trace!(unmasked = unmasked.len(), "masked inputs");
        Ok(())
    }
}
