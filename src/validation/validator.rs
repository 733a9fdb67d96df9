//! Validation of leaf stores ahead of a sweep.
use super::error::InputError;
use crate::compute::error::ComputationError;
use crate::store::types::VarId;
use crate::store::variable::VarKind;
use crate::store::Tree;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Shape of the sweep implied by the multi-valued leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RangeCase {
    /// No range variables: a single point.
    Point,
    OneContinuous,
    OneDiscrete,
    TwoContinuous,
    TwoDiscrete,
    /// One continuous and one discrete.
    Mixed,
}

impl RangeCase {
    /// Classifies by the discreteness of each range variable.
    pub fn classify(discrete: &[bool]) -> Self {
        match discrete {
            [] => RangeCase::Point,
            [false] => RangeCase::OneContinuous,
            [true] => RangeCase::OneDiscrete,
            [false, false] => RangeCase::TwoContinuous,
            [true, true] => RangeCase::TwoDiscrete,
            _ => RangeCase::Mixed,
        }
    }

    /// The conventional 1-6 case number.
    pub fn number(&self) -> u8 {
        match self {
            RangeCase::Point => 1,
            RangeCase::OneContinuous => 2,
            RangeCase::OneDiscrete => 3,
            RangeCase::TwoContinuous => 4,
            RangeCase::TwoDiscrete => 5,
            RangeCase::Mixed => 6,
        }
    }
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub tokens: Vec<(VarId, usize)>,
    /// Row driver first.
    pub range_vars: SmallVec<[VarId; 2]>,
    pub case: RangeCase,
}

/// Checks every leaf's store and selects the range variables.
///
/// Like a linter, it collects every problem it can find rather than stopping
/// at the first.
pub struct Validator<'a> {
    tree: &'a Tree,
}

impl<'a> Validator<'a> {
    pub fn new(tree: &'a Tree) -> Self {
        Self { tree }
    }

    pub fn validate(&self) -> Result<Validated, Vec<InputError>> {
        let mut errors = Vec::new();
        let mut tokens = Vec::with_capacity(self.tree.leaves().len());

        // 1. Per-leaf token checks.
        for &leaf in self.tree.leaves() {
            match self.check_leaf(leaf) {
                Ok(count) => tokens.push((leaf, count)),
                Err(mut errs) => errors.append(&mut errs),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        // 2. Master/slave token counts.
        let count_of = |id: VarId| tokens.iter().find(|(v, _)| *v == id).map(|(_, n)| *n);
        let mut slaves = Vec::new();
        for &(leaf, count) in &tokens {
            let var = self.tree.var(leaf);
            let Some(master_name) = &var.master else { continue };
            let Ok(master) = self.tree.var_id(master_name) else { continue };
            let master_count = count_of(master).unwrap_or(self.tree.var(master).tokens);
            if count > 1 && master_count > 1 {
                if count != master_count {
                    errors.push(InputError::MasterMismatch {
                        variable: var.name.clone(),
                        master: master_name.clone(),
                        tokens: count,
                        master_tokens: master_count,
                    });
                } else {
                    slaves.push(leaf);
                }
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        // 3. Range variables, then the case.
        let mut range: Vec<VarId> = tokens
            .iter()
            .filter(|(v, n)| *n > 1 && !slaves.contains(v))
            .map(|(v, _)| *v)
            .collect();
        if range.len() > 2 {
            let names = range.iter().map(|v| self.tree.var(*v).name.clone()).collect();
            return Err(vec![InputError::TooManyRangeVariables { names }]);
        }
        // A continuous driver takes the rows when paired with a discrete one.
        if range.len() == 2 && self.tree.var(range[0]).is_discrete() && !self.tree.var(range[1]).is_discrete() {
            range.swap(0, 1);
        }
        let discrete: Vec<bool> = range.iter().map(|v| self.tree.var(*v).is_discrete()).collect();

        Ok(Validated { tokens, range_vars: range.into_iter().collect(), case: RangeCase::classify(&discrete) })
    }

    fn check_leaf(&self, leaf: VarId) -> Result<usize, Vec<InputError>> {
        let var = self.tree.var(leaf);
        if let VarKind::Text(_) = var.kind {
            let count = usize::from(!var.store.trim().is_empty());
            if count == 0 && !var.is_masked {
                return Err(vec![InputError::MissingValue { variable: var.name.clone() }]);
            }
            return Ok(count);
        }

        let tokens = self.tree.parser().parse(&var.store).map_err(|e| vec![InputError::from_token(&var.name, e)])?;
        if tokens.is_empty() {
            if var.is_masked {
                return Ok(0);
            }
            return Err(vec![InputError::MissingValue { variable: var.name.clone() }]);
        }

        let mut errors = Vec::new();
        for (span, token) in tokens.iter() {
            match &var.kind {
                VarKind::Continuous(c) => match token.parse::<f64>() {
                    Ok(x) if x.is_finite() => {
                        if !c.accepts(x) {
                            errors.push(InputError::OutOfRange {
                                variable: var.name.clone(),
                                token: token.to_string(),
                                offset: span.offset,
                                len: span.len,
                                min: c.display_min,
                                max: c.display_max,
                            });
                        }
                    }
                    _ => errors.push(InputError::InvalidNumber {
                        variable: var.name.clone(),
                        token: token.to_string(),
                        offset: span.offset,
                        len: span.len,
                    }),
                },
                VarKind::Discrete(_) => {
                    if var.resolve_item(token).is_none() {
                        errors.push(InputError::InvalidChoice {
                            variable: var.name.clone(),
                            token: token.to_string(),
                            offset: span.offset,
                            len: span.len,
                        });
                    }
                }
                VarKind::Text(_) => {}
            }
        }

        if errors.is_empty() { Ok(tokens.len()) } else { Err(errors) }
    }
}

impl Tree {
    /// Validates every leaf, records token counts and selects the range
    /// variables for the next sweep.
    pub fn validate_inputs(&mut self) -> Result<RangeCase, Vec<InputError>> {
        let validated = Validator::new(self).validate()?;
        for (var, count) in validated.tokens {
            self.vars[var.index()].tokens = count;
        }
        self.range_vars = validated.range_vars;
        tracing::debug!(case = validated.case.number(), range_vars = self.range_vars.len(), "validated inputs");
        Ok(validated.case)
    }

    /// Sets every leaf's current value from the first token of its store.
    /// Leaves with an empty store keep their current value.
    pub fn load_leaf_values(&mut self) -> Result<(), ComputationError> {
        for i in 0..self.leaves.len() {
            let leaf = self.leaves[i];
            let first = {
                let var = &self.vars[leaf.index()];
                if var.is_text() {
                    let text = var.store.clone();
                    self.set_text(leaf, &text)?;
                    continue;
                }
                let tokens = self.parser.parse(&var.store).map_err(|e| InputError::from_token(&var.name, e))?;
                match tokens.get(0) {
                    Some(t) => t.to_string(),
                    None => continue,
                }
            };
            self.set_leaf_token(leaf, &first)?;
        }
        Ok(())
    }

    /// Sets a leaf from one store token: item name for discrete variables,
    /// display value for continuous ones.
    pub(crate) fn set_leaf_token(&mut self, var: VarId, token: &str) -> Result<(), ComputationError> {
        let v = &self.vars[var.index()];
        if v.is_discrete() {
            return self.set_item_name(var, token);
        }
        if v.is_text() {
            return Ok(self.set_text(var, token)?);
        }
        let x = token.parse::<f64>().map_err(|_| InputError::InvalidNumber {
            variable: v.name.clone(),
            token: token.to_string(),
            offset: 0,
            len: token.len(),
        })?;
        Ok(self.set_display_value(var, x)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use rstest::rstest;

    #[rstest]
    #[case(&[], 1)]
    #[case(&[false], 2)]
    #[case(&[true], 3)]
    #[case(&[false, false], 4)]
    #[case(&[true, true], 5)]
    #[case(&[false, true], 6)]
    #[case(&[true, false], 6)]
    fn test_classify(#[case] discrete: &[bool], #[case] expected: u8) {
        assert_eq!(RangeCase::classify(discrete).number(), expected);
    }

    #[rstest]
    #[case("gr1", "1", "88", "0.5", 1)]
    #[case("gr1", "1 2 3", "88", "0.5", 2)]
    #[case("gr1 gr2", "1", "88", "0.5", 3)]
    #[case("gr1", "1 2", "88 176", "0.5", 4)]
    #[case("gr1 sh1", "1 2", "88", "0.5", 6)]
    fn test_range_case_from_stores(#[case] model: &str, #[case] load: &str, #[case] wind: &str, #[case] slope: &str, #[case] expected: u8) {
        let mut tree = fixtures::configured_tree(&[]);
        fixtures::set_stores(&mut tree, &[
            ("vSurfaceFuelBedModel", model),
            ("vSurfaceFuelLoadHerb", load),
            ("vSurfaceFuelMoisLiveHerb", "0.5"),
            ("vWindSpeedAtMidflame", wind),
            ("vSiteSlopeFraction", slope),
        ]);
        assert_eq!(tree.validate_inputs().unwrap().number(), expected);
    }

    #[test]
    fn test_mixed_case_puts_continuous_on_rows() {
        let mut tree = fixtures::configured_tree(&[]);
        fixtures::set_stores(&mut tree, &[
            ("vSurfaceFuelBedModel", "gr1 sh1"),
            ("vSurfaceFuelLoadHerb", "1 2"),
            ("vSurfaceFuelMoisLiveHerb", "0.5"),
            ("vWindSpeedAtMidflame", "88"),
            ("vSiteSlopeFraction", "0"),
        ]);
        tree.validate_inputs().unwrap();
        let rows = tree.range_vars()[0];
        assert_eq!(tree.var(rows).name, "vSurfaceFuelLoadHerb");
    }

    #[test]
    fn test_three_range_variables_rejected() {
        let mut tree = fixtures::configured_tree(&[]);
        fixtures::set_stores(&mut tree, &[
            ("vSurfaceFuelBedModel", "gr1 sh1"),
            ("vSurfaceFuelLoadHerb", "1 2"),
            ("vSurfaceFuelMoisLiveHerb", "0.5"),
            ("vWindSpeedAtMidflame", "88 176"),
            ("vSiteSlopeFraction", "0"),
        ]);
        let errs = tree.validate_inputs().unwrap_err();
        assert!(matches!(&errs[0], InputError::TooManyRangeVariables { names } if names.len() == 3));
    }

    #[test]
    fn test_slave_follows_master_or_fails() {
        let mut tree = fixtures::configured_tree(&[]);
        fixtures::set_stores(&mut tree, &[
            ("vSurfaceFuelBedModel", "gr1"),
            ("vSurfaceFuelLoadHerb", "1 2"),
            ("vSurfaceFuelMoisLiveHerb", "0.5 0.25"),
            ("vWindSpeedAtMidflame", "88"),
            ("vSiteSlopeFraction", "0"),
        ]);
        assert_eq!(tree.validate_inputs().unwrap(), RangeCase::OneContinuous);
        assert_eq!(tree.range_vars().len(), 1);

        let mois = tree.var_id("vSurfaceFuelMoisLiveHerb").unwrap();
        tree.set_store(mois, "0.5 0.25 0.1").unwrap();
        let errs = tree.validate_inputs().unwrap_err();
        assert!(matches!(&errs[0], InputError::MasterMismatch { tokens: 3, master_tokens: 2, .. }));
    }

    #[test]
    fn test_token_errors_carry_spans() {
        let mut tree = fixtures::configured_tree(&[]);
        fixtures::set_stores(&mut tree, &[
            ("vSurfaceFuelBedModel", "gr1 zz9"),
            ("vSurfaceFuelLoadHerb", "1 abc"),
            ("vSurfaceFuelMoisLiveHerb", "0.5"),
            ("vWindSpeedAtMidflame", "88 99999999"),
            ("vSiteSlopeFraction", "0"),
        ]);
        let errs = tree.validate_inputs().unwrap_err();
        assert_eq!(errs.len(), 3);
        assert_eq!(errs[0], InputError::InvalidChoice { variable: "vSurfaceFuelBedModel".into(), token: "zz9".into(), offset: 4, len: 3 });
        assert!(matches!(&errs[1], InputError::InvalidNumber { token, offset: 2, len: 3, .. } if token == "abc"));
        assert!(matches!(&errs[2], InputError::OutOfRange { offset: 3, .. }));
    }

    #[test]
    fn test_masked_leaf_may_be_empty() {
        let mut tree = fixtures::configured_tree(&[]);
        fixtures::set_stores(&mut tree, &[
            ("vSurfaceFuelBedModel", "gr1"),
            ("vSurfaceFuelLoadHerb", "0"),
            ("vSurfaceFuelMoisLiveHerb", ""),
            ("vWindSpeedAtMidflame", "88"),
            ("vSiteSlopeFraction", "0"),
        ]);
        assert!(tree.validate_inputs().is_ok());

        // A non-zero load unmasks the moisture, which now needs a value.
        let herb = tree.var_id("vSurfaceFuelLoadHerb").unwrap();
        tree.set_store(herb, "0.5").unwrap();
        let errs = tree.validate_inputs().unwrap_err();
        assert_eq!(errs, vec![InputError::MissingValue { variable: "vSurfaceFuelMoisLiveHerb".into() }]);
    }

    #[test]
    fn test_unclosed_quote_reported() {
        let mut tree = fixtures::configured_tree(&[]);
        fixtures::set_stores(&mut tree, &fixtures::POINT);
        let model = tree.var_id("vSurfaceFuelBedModel").unwrap();

        // The store setter refuses the text outright.
        let err = tree.set_store(model, "\"gr1").unwrap_err();
        assert_eq!(err, ComputationError::Input(InputError::UnclosedQuote { variable: "vSurfaceFuelBedModel".into(), position: 1 }));

        // A store written behind its back is caught by validation.
        tree.vars[model.index()].store = "\"gr1".into();
        let errs = tree.validate_inputs().unwrap_err();
        assert_eq!(errs, vec![InputError::UnclosedQuote { variable: "vSurfaceFuelBedModel".into(), position: 1 }]);
    }
}
