//! Prescriptions: acceptable ranges and choices for output variables.
//!
//! A sweep cell is "in prescription" when every active entry attached to a
//! requested output accepts that output's current value.
use crate::analysis::units::{conversion, Conversion};
use crate::store::types::VarId;
use crate::store::variable::VarKind;
use crate::store::Tree;
use crate::validation::error::InputError;

#[derive(Debug, Clone, PartialEq)]
pub enum RxBounds {
    Continuous {
        native_min: f64,
        native_max: f64,
        display_min: f64,
        display_max: f64,
        display_units: String,
        decimals: usize,
        /// native -> display
        conversion: Conversion,
    },
    /// Acceptance bits indexed by item data index.
    Discrete { accept: Vec<bool> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RxVar {
    pub var: VarId,
    pub name: String,
    pub active: bool,
    pub bounds: RxBounds,
}

impl RxVar {
    /// Inactive entries accept everything.
    pub fn in_range(&self, tree: &Tree) -> bool {
        if !self.active {
            return true;
        }
        let var = tree.var(self.var);
        match (&self.bounds, &var.kind) {
            (RxBounds::Continuous { native_min, native_max, .. }, VarKind::Continuous(c)) => {
                c.value >= *native_min && c.value <= *native_max
            }
            (RxBounds::Discrete { accept }, VarKind::Discrete(d)) => d
                .active_item()
                .and_then(|item| accept.get(item.index).copied())
                .unwrap_or(false),
            _ => true,
        }
    }

    /// Sets bounds in the entry's display units.
    pub fn set_display_range(&mut self, min: f64, max: f64) -> Result<(), InputError> {
        let name = self.name.clone();
        match &mut self.bounds {
            RxBounds::Continuous { native_min, native_max, display_min, display_max, conversion, .. } => {
                check_bounds(&name, min, max)?;
                *display_min = min;
                *display_max = max;
                *native_min = conversion.invert(min);
                *native_max = conversion.invert(max);
                Ok(())
            }
            RxBounds::Discrete { .. } => Err(InputError::InvalidRxBound { variable: name, token: format!("{} {}", min, max) }),
        }
    }

    /// Sets bounds in native units.
    pub fn set_native_range(&mut self, min: f64, max: f64) -> Result<(), InputError> {
        let name = self.name.clone();
        match &mut self.bounds {
            RxBounds::Continuous { native_min, native_max, display_min, display_max, conversion, .. } => {
                check_bounds(&name, min, max)?;
                *native_min = min;
                *native_max = max;
                *display_min = conversion.apply(min);
                *display_max = conversion.apply(max);
                Ok(())
            }
            RxBounds::Discrete { .. } => Err(InputError::InvalidRxBound { variable: name, token: format!("{} {}", min, max) }),
        }
    }

    /// Marks the item with data index `index` as accepted or not.
    pub fn set_accepted(&mut self, index: usize, accepted: bool) -> Result<(), InputError> {
        match &mut self.bounds {
            RxBounds::Discrete { accept } if index < accept.len() => {
                accept[index] = accepted;
                Ok(())
            }
            _ => Err(InputError::InvalidRxBound { variable: self.name.clone(), token: index.to_string() }),
        }
    }

    /// Switches the display units the bounds are expressed in, keeping the
    /// display bounds and recomputing the native ones.
    pub fn set_units(&mut self, native_units: &str, units: &str, decimals_in: usize) -> Result<(), InputError> {
        let name = self.name.clone();
        if let RxBounds::Continuous { native_min, native_max, display_min, display_max, display_units, decimals, conversion: conv } = &mut self.bounds {
            let c = conversion(native_units, units).map_err(|e| InputError::IncompatibleUnits {
                variable: name,
                units: units.to_string(),
                reason: e.to_string(),
            })?;
            *conv = c;
            *display_units = units.to_string();
            *decimals = decimals_in;
            *native_min = c.invert(*display_min);
            *native_max = c.invert(*display_max);
        }
        Ok(())
    }
}

fn check_bounds(variable: &str, min: f64, max: f64) -> Result<(), InputError> {
    if !min.is_finite() || !max.is_finite() || min > max {
        return Err(InputError::InvalidRxBound { variable: variable.to_string(), token: format!("{} {}", min, max) });
    }
    Ok(())
}

/// One prescription entry per output-capable variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RxVarList {
    entries: Vec<RxVar>,
}

impl RxVarList {
    /// Builds inactive entries for every produced continuous or discrete
    /// variable, bounded by the variable's own range.
    pub fn from_tree(tree: &Tree) -> Self {
        let entries = tree
            .variables()
            .filter(|(_, v)| !v.producers().is_empty())
            .filter_map(|(id, v)| {
                let bounds = match &v.kind {
                    VarKind::Continuous(c) => RxBounds::Continuous {
                        native_min: c.native_min,
                        native_max: c.native_max,
                        display_min: c.display_min,
                        display_max: c.display_max,
                        display_units: c.display_units.clone(),
                        decimals: c.display_decimals,
                        conversion: c.conversion,
                    },
                    VarKind::Discrete(d) => {
                        RxBounds::Discrete { accept: vec![true; d.items.max_index().map_or(0, |m| m + 1)] }
                    }
                    VarKind::Text(_) => return None,
                };
                Some(RxVar { var: id, name: v.name.clone(), active: false, bounds })
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = &RxVar> { self.entries.iter() }

    pub fn get(&self, name: &str) -> Option<&RxVar> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut RxVar> {
        self.entries.iter_mut().find(|e| e.name == name)
    }

    /// True if every active entry on a requested output accepts its value.
    pub fn all_in_range(&self, tree: &Tree) -> bool {
        self.entries
            .iter()
            .filter(|e| e.active && tree.var(e.var).is_user_output)
            .all(|e| e.in_range(tree))
    }

    /// Re-expresses every continuous entry in its variable's current display
    /// units. Native bounds are recomputed from the stored display bounds.
    pub fn apply_units_set(&mut self, tree: &Tree) -> Result<(), InputError> {
        for entry in self.entries.iter_mut() {
            let Some(c) = tree.var(entry.var).continuous() else { continue };
            entry.set_units(&c.native_units, &c.display_units, c.display_decimals)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::store::types::UnitsSet;
    use rstest::rstest;

    #[rstest]
    #[case(true, 4.0, true)]
    #[case(true, 7.0, false)]
    #[case(true, 2.0, true)]
    #[case(true, 6.0, true)]
    #[case(false, 7.0, true)]
    fn test_continuous_in_range(#[case] active: bool, #[case] value: f64, #[case] expected: bool) {
        let mut tree = fixtures::configured_tree(&[]);
        let mut rx = RxVarList::from_tree(&tree);
        let head = tree.var_id("vSurfaceFireSpreadAtHead").unwrap();

        let entry = rx.get_mut("vSurfaceFireSpreadAtHead").unwrap();
        entry.active = active;
        entry.set_native_range(2.0, 6.0).unwrap();
        tree.set_native_value(head, value).unwrap();

        assert_eq!(rx.get("vSurfaceFireSpreadAtHead").unwrap().in_range(&tree), expected);
    }

    #[test]
    fn test_discrete_uses_data_index() {
        let mut tree = fixtures::configured_tree(&[]);
        let mut rx = RxVarList::from_tree(&tree);
        let phase = tree.var_id("vSurfaceFirePhase").unwrap();

        // "crown" sits at catalog position 1 but carries data index 3.
        let entry = rx.get_mut("vSurfaceFirePhase").unwrap();
        entry.active = true;
        entry.set_accepted(1, false).unwrap();

        tree.set_item_name(phase, "crown").unwrap();
        assert!(rx.get("vSurfaceFirePhase").unwrap().in_range(&tree));

        rx.get_mut("vSurfaceFirePhase").unwrap().set_accepted(3, false).unwrap();
        assert!(!rx.get("vSurfaceFirePhase").unwrap().in_range(&tree));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let tree = fixtures::configured_tree(&[]);
        let mut rx = RxVarList::from_tree(&tree);
        let entry = rx.get_mut("vSurfaceFireSpreadAtHead").unwrap();
        assert!(matches!(entry.set_display_range(6.0, 2.0), Err(InputError::InvalidRxBound { .. })));
    }

    #[test]
    fn test_units_set_keeps_display_bounds() {
        let mut tree = fixtures::configured_tree(&[]);
        let mut rx = RxVarList::from_tree(&tree);
        rx.get_mut("vSurfaceFireSpreadAtHead").unwrap().set_display_range(11.0, 22.0).unwrap();

        tree.apply_units_set(UnitsSet::English).unwrap();
        rx.apply_units_set(&tree).unwrap();

        match &rx.get("vSurfaceFireSpreadAtHead").unwrap().bounds {
            RxBounds::Continuous { display_min, native_min, display_units, .. } => {
                assert_eq!(display_units, "ch/h");
                assert_eq!(*display_min, 11.0);
                // 11 ch/h is 12.1 ft/min
                assert!((native_min - 12.1).abs() < 1e-9);
            }
            other => panic!("unexpected bounds {:?}", other),
        }
    }

    #[test]
    fn test_only_requested_outputs_count() {
        let mut tree = fixtures::configured_tree(&[]);
        let mut rx = RxVarList::from_tree(&tree);
        let depth = tree.var_id("vSurfaceFuelBedDepth").unwrap();
        let entry = rx.get_mut("vSurfaceFuelBedDepth").unwrap();
        entry.active = true;
        entry.set_native_range(5.0, 6.0).unwrap();

        tree.set_native_value(depth, 1.0).unwrap();
        assert!(!tree.var(depth).is_user_output);
        assert!(rx.all_in_range(&tree));
    }
}
