//! Equations: named computations over ordered input and output variables.
use super::items::Item;
use super::types::{EqId, ReleaseRange, VarId};
use super::variable::{VarKind, Variable};
use crate::compute::error::ComputationError;
use crate::validation::error::InputError;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// The bound body of an equation. It reads inputs and writes outputs
/// through a [`Calc`] view of the tree's current values.
pub type Computation = Arc<dyn Fn(&mut Calc<'_>) -> Result<(), ComputationError> + Send + Sync>;

#[derive(Clone)]
pub struct Equation {
    pub name: String,
    pub inputs: SmallVec<[VarId; 8]>,
    pub outputs: SmallVec<[VarId; 4]>,
    /// One bit per input slot; set means that input may have changed.
    pub(crate) dirty: SmallVec<[bool; 8]>,
    pub active: bool,
    /// Set until the first invocation after a reset; zero-input equations
    /// have no dirty bit to trigger them.
    pub(crate) fresh: bool,
    pub release: ReleaseRange,
    pub(crate) compute: Computation,
}

impl fmt::Debug for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Equation")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("dirty", &self.dirty)
            .field("active", &self.active)
            .field("release", &self.release)
            .finish_non_exhaustive()
    }
}

impl Equation {
    pub(crate) fn new(name: String, inputs: SmallVec<[VarId; 8]>, outputs: SmallVec<[VarId; 4]>, release: ReleaseRange, compute: Computation) -> Self {
        let dirty = SmallVec::from_elem(true, inputs.len());
        Self { name, inputs, outputs, dirty, active: false, fresh: true, release, compute }
    }

    pub fn is_dirty(&self) -> bool { self.fresh || self.dirty.iter().any(|&d| d) }

    pub fn dirty_slots(&self) -> &[bool] { &self.dirty }

    /// Input slot index of `var`, if it is an input.
    pub fn slot_of(&self, var: VarId) -> Option<usize> {
        self.inputs.iter().position(|&v| v == var)
    }

    /// Marks every input slot dirty.
    pub(crate) fn reset(&mut self) {
        self.dirty.iter_mut().for_each(|d| *d = true);
        self.fresh = true;
    }
}

/// What an equation body sees: its own inputs and outputs, by slot.
pub struct Calc<'a> {
    pub(crate) equation: &'a str,
    pub(crate) id: EqId,
    pub(crate) inputs: &'a [VarId],
    pub(crate) outputs: &'a [VarId],
    pub(crate) vars: &'a mut [Variable],
}

impl<'a> Calc<'a> {
    pub fn equation(&self) -> &str { self.equation }
    pub fn id(&self) -> EqId { self.id }
    pub fn input_count(&self) -> usize { self.inputs.len() }
    pub fn output_count(&self) -> usize { self.outputs.len() }

    /// Native value of a continuous input, data index of a discrete one.
    pub fn input(&self, slot: usize) -> f64 {
        let var = &self.vars[self.inputs[slot].index()];
        match &var.kind {
            VarKind::Continuous(c) => c.value,
            VarKind::Discrete(d) => d.active_item().map_or(0.0, |it| it.index as f64),
            VarKind::Text(_) => 0.0,
        }
    }

    pub fn input_item(&self, slot: usize) -> Option<&Item> {
        self.vars[self.inputs[slot].index()].discrete()?.active_item()
    }

    pub fn input_text(&self, slot: usize) -> &str {
        let var = &self.vars[self.inputs[slot].index()];
        match &var.kind {
            VarKind::Text(t) => t,
            _ => &var.store,
        }
    }

    /// Current native value of an output slot.
    pub fn output(&self, slot: usize) -> f64 {
        self.vars[self.outputs[slot].index()].continuous().map_or(0.0, |c| c.value)
    }

    /// Writes a native value into a continuous output.
    pub fn set_output(&mut self, slot: usize, native: f64) {
        if let Some(c) = self.vars[self.outputs[slot].index()].continuous_mut() {
            c.set_native_value(native);
        }
    }

    /// Activates the discrete output item with this data index.
    pub fn set_output_index(&mut self, slot: usize, index: usize) -> Result<(), ComputationError> {
        let var = &mut self.vars[self.outputs[slot].index()];
        let name = var.name.clone();
        let d = var.discrete_mut().ok_or_else(|| ComputationError::equation(self.equation, format!("'{}' is not discrete", name)))?;
        let pos = d.items.position_by_index(index).ok_or_else(|| InputError::UnknownItem { variable: name, item: index.to_string() })?;
        d.active = pos;
        Ok(())
    }

    /// Activates the discrete output item with this name.
    pub fn set_output_item(&mut self, slot: usize, item: &str) -> Result<(), ComputationError> {
        let var = &mut self.vars[self.outputs[slot].index()];
        let pos = var.resolve_item(item).ok_or_else(|| InputError::UnknownItem { variable: var.name.clone(), item: item.to_string() })?;
        if let Some(d) = var.discrete_mut() {
            d.active = pos;
        }
        Ok(())
    }

    pub fn set_output_text(&mut self, slot: usize, text: &str) {
        if let VarKind::Text(t) = &mut self.vars[self.outputs[slot].index()].kind {
            *t = text.to_string();
        }
    }
}
