//! The range-sweep table generator.
//!
//! Up to two range variables drive the rows and columns; every non-text root
//! is recomputed per cell and recorded in a flat `rows x cols x vars` array.
use super::error::SweepError;
use super::trace::SweepTrace;
use crate::compute::error::ComputationError;
use crate::config::properties::{GRAPH_POINTS, TABLE_SHADING};
use crate::rx::prescription::RxVarList;
use crate::store::types::VarId;
use crate::store::variable::VarKind;
use crate::store::Tree;
use crate::validation::error::InputError;
use crate::validation::validator::RangeCase;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SweepMode {
    /// Row values are the row driver's tokens.
    #[default]
    Table,
    /// Row values are equidistant points from the first to the last token.
    Graph,
}

#[derive(Debug, Clone, Default)]
pub struct SweepOptions {
    pub mode: SweepMode,
    pub trace_path: Option<PathBuf>,
    pub results_path: Option<PathBuf>,
    /// Checked between cells.
    pub cancel: Option<Arc<AtomicBool>>,
    pub timeout: Option<Duration>,
    /// Evaluate rows on the rayon pool. Ignored when a stream is requested.
    pub parallel: bool,
}

/// One row or column heading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisValue {
    pub label: String,
    /// Display value, or item data index for discrete drivers.
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub case: RangeCase,
    pub row_var: Option<String>,
    pub col_var: Option<String>,
    pub rows: Vec<AxisValue>,
    pub cols: Vec<AxisValue>,
    pub outputs: Vec<String>,
    pub units: Vec<String>,
    /// Addressed as `var + col * vars + row * cols * vars`.
    pub values: Vec<f64>,
    /// One flag per cell, addressed as `col + row * cols`.
    pub in_rx: Vec<bool>,
}

impl Table {
    pub fn row_count(&self) -> usize { self.rows.len() }
    pub fn col_count(&self) -> usize { self.cols.len() }
    pub fn var_count(&self) -> usize { self.outputs.len() }

    #[inline(always)]
    pub fn index(&self, row: usize, col: usize, var: usize) -> usize {
        var + col * self.var_count() + row * self.col_count() * self.var_count()
    }

    pub fn value(&self, row: usize, col: usize, var: usize) -> f64 {
        self.values[self.index(row, col, var)]
    }

    pub fn in_prescription(&self, row: usize, col: usize) -> bool {
        self.in_rx[col + row * self.col_count()]
    }

    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|o| o == name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// A driver plus any slaves moving in lockstep with it.
#[derive(Debug, Clone)]
struct Axis {
    var: VarId,
    values: Vec<AxisValue>,
    slaves: Vec<(VarId, Vec<AxisValue>)>,
}

struct Plan {
    row: Option<Axis>,
    col: Option<Axis>,
    outputs: Vec<VarId>,
    rows: usize,
    cols: usize,
    shading: bool,
}

struct Clock {
    deadline: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Clock {
    fn check(&self, row: usize, col: usize) -> Result<(), SweepError> {
        if self.cancel.as_ref().map_or(false, |c| c.load(Ordering::Relaxed)) {
            return Err(SweepError::Cancelled { row, col });
        }
        if self.deadline.map_or(false, |d| Instant::now() >= d) {
            return Err(SweepError::TimedOut { row, col });
        }
        Ok(())
    }
}

type RowResult = (Vec<f64>, Vec<bool>);

impl Tree {
    /// Validates the inputs, then fills a table over the range variables.
    pub fn run_table(&mut self, options: &SweepOptions, rx: Option<&RxVarList>) -> Result<Table, SweepError> {
        // 1. Validate and load every leaf's first value.
        let case = self.validate_inputs().map_err(SweepError::Invalid)?;
        self.load_leaf_values()?;

        // 2. Axes and outputs.
        let row = match self.range_vars.first() {
            Some(&v) => Some(self.build_axis(v, options.mode)?),
            None => None,
        };
        let col = match self.range_vars.get(1) {
            Some(&v) => Some(self.build_axis(v, SweepMode::Table)?),
            None => None,
        };
        let outputs: Vec<VarId> = self.roots.iter().copied().filter(|v| !self.var(*v).is_text()).collect();
        let shading = rx.is_some() && (!self.properties.contains(TABLE_SHADING) || self.properties.boolean(TABLE_SHADING)?);
        let plan = Plan {
            rows: row.as_ref().map_or(1, |a| a.values.len()),
            cols: col.as_ref().map_or(1, |a| a.values.len()),
            row,
            col,
            outputs,
            shading,
        };

        // 3. Streams open before any cell is computed.
        let mut trace = SweepTrace::open(options.trace_path.as_deref(), options.results_path.as_deref())?;
        let clock = Clock { deadline: options.timeout.map(|t| Instant::now() + t), cancel: options.cancel.clone() };

        tracing::info!(case = case.number(), rows = plan.rows, cols = plan.cols, vars = plan.outputs.len(), "sweep started");
        trace.begin_table(plan.rows, plan.cols, plan.outputs.len())?;

        // 4. Cells.
        let parallel = options.parallel && plan.rows > 1;
        if parallel && trace.is_enabled() {
            tracing::warn!("sweep streams requested, evaluating rows sequentially");
        }
        let chunks: Vec<RowResult> = if parallel && !trace.is_enabled() {
            // Each row runs on its own copy of the tree.
            let base: &Tree = self;
            let rows: Result<Vec<RowResult>, SweepError> = (0..plan.rows)
                .into_par_iter()
                .map(|r| base.clone().sweep_row(&plan, r, rx, &mut SweepTrace::disabled(), &clock))
                .collect();
            rows?
        } else {
            let mut chunks = Vec::with_capacity(plan.rows);
            for r in 0..plan.rows {
                chunks.push(self.sweep_row(&plan, r, rx, &mut trace, &clock)?);
            }
            chunks
        };

        trace.end_table()?;
        trace.finish()?;

        let mut values = Vec::with_capacity(plan.rows * plan.cols * plan.outputs.len());
        let mut in_rx = Vec::with_capacity(plan.rows * plan.cols);
        for (v, f) in chunks {
            values.extend(v);
            in_rx.extend(f);
        }
        tracing::info!(cells = in_rx.len(), "sweep finished");

        let name = |a: &Option<Axis>| a.as_ref().map(|a| self.var(a.var).name.clone());
        Ok(Table {
            case,
            row_var: name(&plan.row),
            col_var: name(&plan.col),
            rows: plan.row.as_ref().map_or_else(|| vec![point()], |a| a.values.clone()),
            cols: plan.col.as_ref().map_or_else(|| vec![point()], |a| a.values.clone()),
            outputs: plan.outputs.iter().map(|v| self.var(*v).name.clone()).collect(),
            units: plan.outputs.iter().map(|v| self.var(*v).display_units().to_string()).collect(),
            values,
            in_rx,
        })
    }

    fn sweep_row(&mut self, plan: &Plan, r: usize, rx: Option<&RxVarList>, trace: &mut SweepTrace, clock: &Clock) -> Result<RowResult, SweepError> {
        let mut values = Vec::with_capacity(plan.cols * plan.outputs.len());
        let mut in_rx = Vec::with_capacity(plan.cols);

        if let Some(axis) = &plan.row {
            self.apply_axis(axis, r)?;
        }
        trace.begin_row(r, axis_name(self, &plan.row), axis_label(&plan.row, r))?;

        for c in 0..plan.cols {
            clock.check(r, c)?;
            if let Some(axis) = &plan.col {
                self.apply_axis(axis, c)?;
            }
            trace.begin_col(c, axis_name(self, &plan.col), axis_label(&plan.col, c))?;

            for &out in &plan.outputs {
                trace.begin_output(&self.var(out).name)?;
                self.calculate_variable(out)?;
                let var = self.var(out);
                values.push(var.current_number());
                trace.end_output(&var.name, &var.current_text())?;
                trace.result(r, c, self, out)?;
            }

            in_rx.push(match rx {
                Some(rx) if plan.shading => rx.all_in_range(self),
                _ => true,
            });
            trace.end_col(c)?;
        }

        trace.end_row(r)?;
        Ok((values, in_rx))
    }

    fn apply_axis(&mut self, axis: &Axis, i: usize) -> Result<(), ComputationError> {
        self.set_axis_value(axis.var, &axis.values[i])?;
        for (slave, values) in &axis.slaves {
            if let Some(v) = values.get(i) {
                self.set_axis_value(*slave, v)?;
            }
        }
        Ok(())
    }

    fn set_axis_value(&mut self, var: VarId, value: &AxisValue) -> Result<(), ComputationError> {
        let v = self.var(var);
        if v.is_discrete() {
            return self.set_item_name(var, &value.label);
        }
        if v.is_text() {
            return Ok(self.set_text(var, &value.label)?);
        }
        Ok(self.set_display_value(var, value.value)?)
    }

    fn build_axis(&self, var: VarId, mode: SweepMode) -> Result<Axis, SweepError> {
        let points = match mode {
            SweepMode::Graph => {
                let n = self.properties.integer(GRAPH_POINTS)?;
                if n < 2 {
                    return Err(InputError::GraphPoints(n).into());
                }
                Some(n as usize)
            }
            SweepMode::Table => None,
        };
        let values = self.axis_values(var, points, false)?;

        let name = &self.var(var).name;
        let mut slaves = Vec::new();
        for &leaf in &self.leaves {
            let v = self.var(leaf);
            if v.master.as_deref() == Some(name.as_str()) && v.tokens > 1 {
                slaves.push((leaf, self.axis_values(leaf, points, true)?));
            }
        }
        Ok(Axis { var, values, slaves })
    }

    /// Store tokens as axis values, or `points` interpolated values for a
    /// continuous variable in graph mode.
    ///
    /// A slave follows its master point for point, so it runs from its first
    /// to its last token in either direction.
    fn axis_values(&self, var: VarId, points: Option<usize>, slave: bool) -> Result<Vec<AxisValue>, InputError> {
        let v = self.var(var);
        let tokens = self.parser.parse(&v.store).map_err(|e| InputError::from_token(&v.name, e))?;
        let mut values = Vec::with_capacity(tokens.len());
        for (span, t) in tokens.iter() {
            values.push(match &v.kind {
                VarKind::Continuous(_) => {
                    let x = t.parse::<f64>().map_err(|_| InputError::InvalidNumber {
                        variable: v.name.clone(),
                        token: t.to_string(),
                        offset: span.offset,
                        len: span.len,
                    })?;
                    AxisValue { label: t.to_string(), value: x }
                }
                VarKind::Discrete(d) => {
                    let item = v.resolve_item(t).and_then(|p| d.items.get(p)).ok_or_else(|| InputError::InvalidChoice {
                        variable: v.name.clone(),
                        token: t.to_string(),
                        offset: span.offset,
                        len: span.len,
                    })?;
                    AxisValue { label: item.name.clone(), value: item.index as f64 }
                }
                VarKind::Text(_) => AxisValue { label: t.to_string(), value: 0.0 },
            });
        }

        let (Some(points), Some(c)) = (points, v.continuous()) else {
            return Ok(values);
        };
        if values.is_empty() {
            return Ok(values);
        }
        let (from, mut thru) = (values[0].value, values[values.len() - 1].value);
        let period = c.display_max - c.display_min;
        let wrapped = !slave && from > thru;
        if wrapped {
            if !c.wrap {
                return Err(InputError::InvertedRange { variable: v.name.clone(), from, thru });
            }
            thru += period;
        }

        let step = (thru - from) / (points - 1) as f64;
        Ok((0..points)
            .map(|i| {
                let mut x = from + step * i as f64;
                if wrapped && x >= c.display_max {
                    x -= period;
                }
                AxisValue { label: c.format(x), value: x }
            })
            .collect())
    }
}

fn point() -> AxisValue {
    AxisValue { label: String::new(), value: 0.0 }
}

fn axis_name<'t>(tree: &'t Tree, axis: &Option<Axis>) -> Option<&'t str> {
    axis.as_ref().map(|a| tree.var(a.var).name.as_str())
}

fn axis_label(axis: &Option<Axis>, i: usize) -> &str {
    axis.as_ref().and_then(|a| a.values.get(i)).map_or("", |v| v.label.as_str())
}
