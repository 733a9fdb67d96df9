//! Variables: the nodes of the equation tree.
use super::items::{Item, ItemList};
use super::types::{EqId, ReleaseRange, UnitsSet};
use crate::analysis::tokens::TokenParser;
use crate::analysis::units::{conversion, Conversion};
use crate::validation::error::InputError;
use smallvec::SmallVec;
use std::sync::Arc;

/// Variables whose discrete items may also be addressed by sort key, a
/// fallback kept for worksheets written before fuel models were named.
pub const SORT_KEY_FALLBACK_VARIABLES: [&str; 3] =
    ["vSurfaceFuelBedModel", "vSurfaceFuelBedModel1", "vSurfaceFuelBedModel2"];

#[derive(Debug, Clone, PartialEq)]
pub struct Continuous {
    pub native_units: String,
    pub native_decimals: usize,
    pub english_units: String,
    pub english_decimals: usize,
    pub metric_units: String,
    pub metric_decimals: usize,
    pub native_min: f64,
    pub native_max: f64,
    pub default_value: f64,
    /// Current value in native units.
    pub value: f64,
    pub display_value: f64,
    pub display_min: f64,
    pub display_max: f64,
    pub display_decimals: usize,
    pub display_units: String,
    /// native -> display
    pub conversion: Conversion,
    /// Cyclic domain such as compass degrees.
    pub wrap: bool,
}

impl Continuous {
    pub fn set_native_value(&mut self, value: f64) {
        self.value = value;
        self.display_value = self.conversion.apply(value);
    }

    pub fn set_display_value(&mut self, display: f64) {
        self.display_value = display;
        self.value = self.conversion.invert(display);
    }

    /// Tolerance applied to range checks when display units differ from
    /// native units; absorbs rounding introduced by the conversion.
    pub fn slop(&self) -> f64 {
        if self.display_units == self.native_units {
            0.0
        } else {
            10f64.powi(-(self.display_decimals as i32))
        }
    }

    /// Range check of a display-unit value.
    pub fn accepts(&self, display: f64) -> bool {
        let slop = self.slop();
        display >= self.display_min - slop && display <= self.display_max + slop
    }

    pub fn units_for(&self, set: UnitsSet) -> (&str, usize) {
        match set {
            UnitsSet::Native => (&self.native_units, self.native_decimals),
            UnitsSet::English => (&self.english_units, self.english_decimals),
            UnitsSet::Metric => (&self.metric_units, self.metric_decimals),
        }
    }

    pub fn format(&self, display: f64) -> String {
        format_decimals(display, self.display_decimals)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Discrete {
    pub items: Arc<ItemList>,
    /// Catalog position of the active item.
    pub active: usize,
}

impl Discrete {
    pub fn active_item(&self) -> Option<&Item> { self.items.get(self.active) }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VarKind {
    Continuous(Continuous),
    Discrete(Discrete),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
    /// Serialized multi-value content, the sweep generator's source.
    pub store: String,
    pub tokens: usize,
    pub release: ReleaseRange,
    /// Declaration order used to sort the leaf list.
    pub input_order: usize,
    /// Declaration order used to sort the root list.
    pub output_order: usize,
    pub is_user_input: bool,
    pub is_user_output: bool,
    pub is_constant: bool,
    pub is_masked: bool,
    pub master: Option<String>,
    pub sort_key_fallback: bool,
    pub(crate) producers: SmallVec<[EqId; 2]>,
    pub(crate) active_producer: Option<EqId>,
    pub(crate) consumers: SmallVec<[EqId; 4]>,
}

impl Variable {
    pub fn new(name: impl Into<String>, kind: VarKind) -> Self {
        let name = name.into();
        let sort_key_fallback = SORT_KEY_FALLBACK_VARIABLES.contains(&name.as_str());
        Self {
            name,
            kind,
            store: String::new(),
            tokens: 0,
            release: ReleaseRange::ALWAYS,
            input_order: 0,
            output_order: 0,
            is_user_input: false,
            is_user_output: false,
            is_constant: false,
            is_masked: false,
            master: None,
            sort_key_fallback,
            producers: SmallVec::new(),
            active_producer: None,
            consumers: SmallVec::new(),
        }
    }

    pub fn is_continuous(&self) -> bool { matches!(self.kind, VarKind::Continuous(_)) }
    pub fn is_discrete(&self) -> bool { matches!(self.kind, VarKind::Discrete(_)) }
    pub fn is_text(&self) -> bool { matches!(self.kind, VarKind::Text(_)) }

    pub fn continuous(&self) -> Option<&Continuous> {
        match &self.kind { VarKind::Continuous(c) => Some(c), _ => None }
    }
    pub fn continuous_mut(&mut self) -> Option<&mut Continuous> {
        match &mut self.kind { VarKind::Continuous(c) => Some(c), _ => None }
    }
    pub fn discrete(&self) -> Option<&Discrete> {
        match &self.kind { VarKind::Discrete(d) => Some(d), _ => None }
    }
    pub fn discrete_mut(&mut self) -> Option<&mut Discrete> {
        match &mut self.kind { VarKind::Discrete(d) => Some(d), _ => None }
    }

    pub fn producers(&self) -> &[EqId] { &self.producers }
    pub fn consumers(&self) -> &[EqId] { &self.consumers }
    pub fn active_producer(&self) -> Option<EqId> { self.active_producer }

    /// A leaf has no active producer and must be supplied by the caller.
    pub fn is_leaf(&self) -> bool { self.active_producer.is_none() }

    /// Catalog position of `token`, by item name or, where enabled, sort key.
    pub fn resolve_item(&self, token: &str) -> Option<usize> {
        let d = self.discrete()?;
        d.items.position_by_name(token).or_else(|| {
            if self.sort_key_fallback { d.items.position_by_sort(token) } else { None }
        })
    }

    /// The current value as a display number: display value for continuous
    /// variables, item data index for discrete ones.
    pub fn current_number(&self) -> f64 {
        match &self.kind {
            VarKind::Continuous(c) => c.display_value,
            VarKind::Discrete(d) => d.active_item().map_or(0.0, |it| it.index as f64),
            VarKind::Text(_) => 0.0,
        }
    }

    /// The current value rendered for humans.
    pub fn current_text(&self) -> String {
        match &self.kind {
            VarKind::Continuous(c) => c.format(c.display_value),
            VarKind::Discrete(d) => d.active_item().map_or_else(String::new, |it| it.name.clone()),
            VarKind::Text(t) => t.clone(),
        }
    }

    /// Display units, empty for non-continuous variables.
    pub fn display_units(&self) -> &str {
        self.continuous().map_or("", |c| c.display_units.as_str())
    }

    /// Switches display units and decimals, re-encoding the store.
    ///
    /// Returns `false` if nothing changed.
    pub fn set_display_units(&mut self, units: &str, decimals: usize, parser: &TokenParser) -> Result<bool, InputError> {
        let name = self.name.clone();
        let c = match &mut self.kind {
            VarKind::Continuous(c) => c,
            _ => {
                return Err(InputError::IncompatibleUnits {
                    variable: name,
                    units: units.to_string(),
                    reason: "variable is not continuous".into(),
                })
            }
        };
        if c.display_units == units && c.display_decimals == decimals {
            return Ok(false);
        }
        let new_conv = conversion(&c.native_units, units).map_err(|e| InputError::IncompatibleUnits {
            variable: name.clone(),
            units: units.to_string(),
            reason: e.to_string(),
        })?;
        let tokens = parser.parse(&self.store).map_err(|e| InputError::from_token(&name, e))?;

        // 1. Store into native units at full precision.
        let native: Vec<Result<f64, String>> = tokens
            .iter()
            .map(|(_, t)| t.parse::<f64>().map(|x| c.conversion.invert(x)).map_err(|_| t.to_string()))
            .collect();

        // 2. Install the new display pair.
        c.display_units = units.to_string();
        c.display_decimals = decimals;
        c.conversion = new_conv;

        // 3. Display value and bounds follow the native ones.
        c.display_value = new_conv.apply(c.value);
        c.display_min = new_conv.apply(c.native_min);
        c.display_max = new_conv.apply(c.native_max);

        // 4. Store back out in the new display units.
        let encoded: Vec<String> = native
            .into_iter()
            .map(|t| match t {
                Ok(n) => format_decimals(new_conv.apply(n), decimals),
                Err(raw) => quote_if_needed(&raw),
            })
            .collect();
        self.store = encoded.join(" ");
        Ok(true)
    }
}

/// Fixed-decimal rendering with trailing zeros (and a bare point) trimmed.
pub fn format_decimals(x: f64, decimals: usize) -> String {
    let mut s = format!("{:.*}", decimals, x);
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

/// Wraps a token in double quotes if it would otherwise split.
pub fn quote_if_needed(token: &str) -> String {
    if token.is_empty() || token.contains(|c: char| c.is_whitespace() || c == ',') {
        format!("\"{}\"", token)
    } else {
        token.to_string()
    }
}
