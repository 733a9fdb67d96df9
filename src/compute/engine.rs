//! Demand-driven recomputation over the equation tree.
//!
//! A value change marks the affected input slots dirty downstream; asking for
//! a variable walks upstream through dirty slots only, so an equation runs at
//! most once per change set and clean branches are never touched.
use crate::compute::error::ComputationError;
use crate::store::equation::Calc;
use crate::store::types::{EqId, VarId};
use crate::store::Tree;

impl Tree {
    /// Brings `var` up to date.
    ///
    /// Leaves and variables without an active producer hold caller-supplied
    /// values and are returned as-is. A failing equation leaves its dirty
    /// bits set so the next call retries it.
    pub fn calculate_variable(&mut self, var: VarId) -> Result<(), ComputationError> {
        let Some(eq) = self.vars[var.index()].active_producer else {
            return Ok(());
        };

        let mut run = self.eqs[eq.index()].fresh;
        for slot in 0..self.eqs[eq.index()].inputs.len() {
            if !self.eqs[eq.index()].dirty[slot] {
                continue;
            }
            let input = self.eqs[eq.index()].inputs[slot];
            self.calculate_variable(input)?;
            self.eqs[eq.index()].dirty[slot] = false;
            run = true;
        }

        if run {
            if let Err(e) = self.invoke(eq) {
                self.eqs[eq.index()].reset();
                return Err(e);
            }
        }
        Ok(())
    }

    /// Brings every root up to date.
    pub fn calculate_roots(&mut self) -> Result<(), ComputationError> {
        for i in 0..self.roots.len() {
            let root = self.roots[i];
            self.calculate_variable(root)?;
        }
        Ok(())
    }

    fn invoke(&mut self, id: EqId) -> Result<(), ComputationError> {
        self.invocations += 1;
        let eq = &mut self.eqs[id.index()];
        eq.fresh = false;
        let eq = &self.eqs[id.index()];
        tracing::trace!(equation = %eq.name, "invoke");

        let mut calc = Calc {
            equation: &eq.name,
            id,
            inputs: &eq.inputs,
            outputs: &eq.outputs,
            vars: &mut self.vars,
        };
        (eq.compute)(&mut calc)
    }

    /// Marks every consumer slot fed by `var` dirty, then recurses through
    /// the consumers' outputs. A slot that is already dirty stops the walk;
    /// everything past it was marked when it became dirty.
    pub fn propagate_dirty(&mut self, var: VarId) {
        let consumers = self.vars[var.index()].consumers.clone();
        for eq in consumers {
            let e = &mut self.eqs[eq.index()];
            let mut marked = false;
            for slot in 0..e.inputs.len() {
                if e.inputs[slot] == var && !e.dirty[slot] {
                    e.dirty[slot] = true;
                    marked = true;
                }
            }
            if marked {
                let outputs = e.outputs.clone();
                for out in outputs {
                    self.propagate_dirty(out);
                }
            }
        }
    }

    /// Equations with at least one dirty input slot.
    pub fn dirty_equations(&self) -> Vec<EqId> {
        self.equations()
            .filter(|(_, e)| e.dirty_slots().iter().any(|&d| d))
            .map(|(id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::topology;
    use crate::fixtures;
    use std::collections::HashSet;

    #[test]
    fn test_recompute_matches_hand_calculation() {
        let mut tree = fixtures::configured_tree(&[]);
        fixtures::set_inputs(&mut tree);
        tree.calculate_roots().unwrap();

        let head = tree.variable("vSurfaceFireSpreadAtHead").unwrap();
        // 1000 * 1.0 * (1 - 0.5) / 1.0 = 500; 500 / 100 = 5; 5 * (1 + 88/88 + 0.5) = 12.5
        assert!((head.continuous().unwrap().value - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_second_recompute_invokes_nothing() {
        let mut tree = fixtures::configured_tree(&[]);
        fixtures::set_inputs(&mut tree);
        tree.calculate_roots().unwrap();

        let before = tree.invocations();
        tree.calculate_roots().unwrap();
        assert_eq!(tree.invocations(), before);
        // Inactive alternates keep their bits from instantiation.
        assert!(tree.dirty_equations().iter().all(|&eq| !tree.equation(eq).active));
    }

    #[test]
    fn test_dirty_marks_exactly_the_consumer_closure() {
        let mut tree = fixtures::configured_tree(&[]);
        fixtures::set_inputs(&mut tree);
        tree.calculate_roots().unwrap();

        let wind = tree.var_id("vWindSpeedAtMidflame").unwrap();
        tree.set_display_value(wind, 176.0).unwrap();

        // Inactive equations never ran, so their bits are still set from instantiation.
        let active = |eq: &crate::store::types::EqId| tree.equation(*eq).active;
        let dirty: HashSet<_> = tree.dirty_equations().into_iter().filter(active).collect();
        let expected: HashSet<_> = topology::consumer_closure(&tree, &[wind]).into_iter().filter(active).collect();
        assert_eq!(dirty, expected);
        assert!(dirty.contains(&tree.eq_id("EqFlameLength").unwrap()));
        assert!(!dirty.contains(&tree.eq_id("EqFuelBedDepth").unwrap()));
    }

    #[test]
    fn test_each_equation_runs_at_most_once_per_change() {
        let mut tree = fixtures::configured_tree(&[]);
        fixtures::set_inputs(&mut tree);
        tree.calculate_roots().unwrap();

        // The reaction intensity feeds both spread and flame length.
        let load = tree.var_id("vSurfaceFuelLoadHerb").unwrap();
        tree.set_display_value(load, 2.0).unwrap();
        let expected = topology::consumer_closure(&tree, &[load])
            .into_iter()
            .filter(|&eq| tree.equation(eq).active)
            .count() as u64;

        let before = tree.invocations();
        tree.calculate_roots().unwrap();
        assert_eq!(tree.invocations() - before, expected);
    }

    #[test]
    fn test_zero_input_equation_runs_once() {
        let mut tree = fixtures::configured_tree(&[]);
        fixtures::set_inputs(&mut tree);
        let notes = tree.var_id("vDocNotes").unwrap();

        tree.calculate_variable(notes).unwrap();
        assert_eq!(tree.var(notes).current_text(), "surface fire");
        let before = tree.invocations();
        tree.calculate_variable(notes).unwrap();
        assert_eq!(tree.invocations(), before);
    }

    #[test]
    fn test_failed_equation_is_retried() {
        let mut tree = fixtures::configured_tree(&[]);
        fixtures::set_inputs(&mut tree);
        let head = tree.var_id("vSurfaceFireSpreadAtHead").unwrap();

        // A zero fuel bed depth is rejected by the reaction intensity equation.
        let model = tree.var_id("vSurfaceFuelBedModel").unwrap();
        tree.set_item_name(model, "zero").unwrap();
        assert!(tree.calculate_variable(head).is_err());

        tree.set_item_name(model, "gr2").unwrap();
        tree.calculate_variable(head).unwrap();
        assert!(tree.var(head).continuous().unwrap().value > 0.0);
    }
}
