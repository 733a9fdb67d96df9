//! Plain-data records exchanged with the document layer, and the JSON
//! worksheet that bundles them.
use crate::analysis::units::conversion;
use crate::compute::error::ComputationError;
use crate::config::properties::Properties;
use crate::rx::prescription::{RxBounds, RxVarList};
use crate::store::types::VarId;
use crate::store::variable::{format_decimals, VarKind};
use crate::store::Tree;
use crate::validation::error::InputError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unit string for variables without native units.
pub const NO_UNITS: &str = "none";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VariableRecord {
    Continuous { name: String, decimals: usize, units: String, value: String },
    /// Comma or space separated item names.
    Discrete { name: String, codes: String },
    Text { name: String, text: String },
}

impl VariableRecord {
    pub fn name(&self) -> &str {
        match self {
            VariableRecord::Continuous { name, .. } | VariableRecord::Discrete { name, .. } | VariableRecord::Text { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PrescriptionRecord {
    Continuous { name: String, active: bool, min: String, max: String, units: String },
    /// `accept` is a comma-joined 0/1 list indexed by item data index.
    Discrete { name: String, active: bool, accept: String },
}

impl PrescriptionRecord {
    pub fn name(&self) -> &str {
        match self {
            PrescriptionRecord::Continuous { name, .. } | PrescriptionRecord::Discrete { name, .. } => name,
        }
    }
}

/// What happened to a record on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Applied,
    /// A retired name from an earlier document version; ignored.
    Retired,
}

/// Resolves a record's unit string. `"none"` stands for empty native units
/// and is rejected on any other variable.
fn record_units(variable: &str, native: &str, units: &str) -> Result<String, InputError> {
    if units != NO_UNITS {
        return Ok(units.to_string());
    }
    if !native.is_empty() {
        return Err(InputError::IncompatibleUnits {
            variable: variable.to_string(),
            units: units.to_string(),
            reason: format!("native units are '{}'", native),
        });
    }
    Ok(String::new())
}

impl Tree {
    /// Resolves a record name, accepting retired names as a no-op.
    fn record_target(&self, name: &str) -> Result<Option<VarId>, InputError> {
        match self.var_id(name) {
            Ok(id) => Ok(Some(id)),
            Err(_) if self.is_retired(name) => Ok(None),
            Err(_) => Err(InputError::UnknownName(name.to_string())),
        }
    }

    pub fn variable_record(&self, id: VarId) -> VariableRecord {
        let var = self.var(id);
        let name = var.name.clone();
        match &var.kind {
            VarKind::Continuous(c) => VariableRecord::Continuous {
                name,
                decimals: c.display_decimals,
                units: if c.display_units.is_empty() { NO_UNITS.to_string() } else { c.display_units.clone() },
                value: var.store.clone(),
            },
            VarKind::Discrete(_) => VariableRecord::Discrete { name, codes: var.store.clone() },
            VarKind::Text(_) => VariableRecord::Text { name, text: var.store.clone() },
        }
    }

    /// Applies one record: units first, then the store.
    pub fn apply_variable_record(&mut self, record: &VariableRecord) -> Result<RecordOutcome, ComputationError> {
        let Some(id) = self.record_target(record.name())? else {
            tracing::debug!(name = record.name(), "ignoring retired variable");
            return Ok(RecordOutcome::Retired);
        };
        let var = self.var(id);
        let expected = match record {
            VariableRecord::Continuous { .. } => "continuous",
            VariableRecord::Discrete { .. } => "discrete",
            VariableRecord::Text { .. } => "text",
        };
        let matches = match record {
            VariableRecord::Continuous { .. } => var.is_continuous(),
            VariableRecord::Discrete { .. } => var.is_discrete(),
            VariableRecord::Text { .. } => var.is_text(),
        };
        if !matches {
            return Err(InputError::RecordKind { variable: var.name.clone(), expected }.into());
        }

        let store = match record {
            VariableRecord::Continuous { decimals, units, value, .. } => {
                let native = var.continuous().map(|c| c.native_units.as_str()).unwrap_or_default();
                let units = record_units(&var.name, native, units)?;
                self.set_display_units(id, &units, *decimals)?;
                value
            }
            VariableRecord::Discrete { codes, .. } => codes,
            VariableRecord::Text { text, .. } => {
                self.set_text(id, text)?;
                text
            }
        };
        self.set_store(id, store)?;
        Ok(RecordOutcome::Applied)
    }

    /// Records for every user input, then every requested output.
    pub fn variable_records(&self) -> Vec<VariableRecord> {
        let mut ids: Vec<VarId> = self.leaves().to_vec();
        let outputs: Vec<VarId> = self.roots().iter().copied().filter(|r| !ids.contains(r)).collect();
        ids.extend(outputs);
        ids.into_iter().map(|id| self.variable_record(id)).collect()
    }

    pub fn to_worksheet(&self, rx: Option<&RxVarList>) -> Worksheet {
        Worksheet {
            release: self.release(),
            properties: self.properties.clone(),
            variables: self.variable_records(),
            prescriptions: rx.map(|rx| rx.records()).unwrap_or_default(),
        }
    }

    /// Merges the worksheet's properties and applies its variable records.
    /// The caller reconfigures afterwards.
    pub fn load_worksheet(&mut self, sheet: &Worksheet) -> Result<Vec<RecordOutcome>, ComputationError> {
        self.properties.merge(sheet.properties.clone());
        self.set_release(sheet.release);
        sheet.variables.iter().map(|r| self.apply_variable_record(r)).collect()
    }
}

impl RxVarList {
    pub fn records(&self) -> Vec<PrescriptionRecord> {
        self.iter()
            .map(|e| match &e.bounds {
                RxBounds::Continuous { display_min, display_max, display_units, decimals, .. } => PrescriptionRecord::Continuous {
                    name: e.name.clone(),
                    active: e.active,
                    min: format_decimals(*display_min, *decimals),
                    max: format_decimals(*display_max, *decimals),
                    units: if display_units.is_empty() { NO_UNITS.to_string() } else { display_units.clone() },
                },
                RxBounds::Discrete { accept } => PrescriptionRecord::Discrete {
                    name: e.name.clone(),
                    active: e.active,
                    accept: accept.iter().map(|&a| if a { "1" } else { "0" }).collect::<Vec<_>>().join(","),
                },
            })
            .collect()
    }

    pub fn apply_record(&mut self, tree: &Tree, record: &PrescriptionRecord) -> Result<RecordOutcome, InputError> {
        let name = record.name();
        let Some(id) = tree.record_target(name)? else {
            return Ok(RecordOutcome::Retired);
        };
        let entry = self.get_mut(name).ok_or_else(|| InputError::UnknownName(name.to_string()))?;
        let bad = |token: &str| InputError::InvalidRxBound { variable: name.to_string(), token: token.to_string() };

        let mismatch = || InputError::RecordKind { variable: name.to_string(), expected: "matching prescription" };

        match record {
            PrescriptionRecord::Continuous { active, min, max, units, .. } => {
                if !matches!(entry.bounds, RxBounds::Continuous { .. }) {
                    return Err(mismatch());
                }
                let lo = min.trim().parse::<f64>().map_err(|_| bad(min))?;
                let hi = max.trim().parse::<f64>().map_err(|_| bad(max))?;
                let native = tree.var(id).continuous().map(|c| c.native_units.clone()).unwrap_or_default();
                let units = record_units(name, &native, units)?;
                conversion(&native, &units).map_err(|e| InputError::IncompatibleUnits {
                    variable: name.to_string(),
                    units: units.clone(),
                    reason: e.to_string(),
                })?;
                let decimals = tree.var(id).continuous().map_or(0, |c| c.display_decimals);
                entry.set_units(&native, &units, decimals)?;
                entry.set_display_range(lo, hi)?;
                entry.active = *active;
            }
            PrescriptionRecord::Discrete { active, accept, .. } => {
                let RxBounds::Discrete { accept: bits } = &mut entry.bounds else {
                    return Err(mismatch());
                };
                let tokens = tree.parser().parse(accept).map_err(|e| InputError::from_token(name, e))?;
                let mut parsed = Vec::with_capacity(tokens.len());
                for (_, t) in tokens.iter() {
                    parsed.push(match t {
                        "1" => true,
                        "0" => false,
                        other => return Err(bad(other)),
                    });
                }
                if parsed.len() > bits.len() {
                    return Err(bad(accept));
                }
                bits.iter_mut().for_each(|b| *b = false);
                bits[..parsed.len()].copy_from_slice(&parsed);
                entry.active = *active;
            }
        }
        Ok(RecordOutcome::Applied)
    }
}

/// A saved session: release, configuration, inputs and prescriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worksheet {
    pub release: u32,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub variables: Vec<VariableRecord>,
    #[serde(default)]
    pub prescriptions: Vec<PrescriptionRecord>,
}

impl Worksheet {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let text = self.to_json().map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, text)
    }
}
