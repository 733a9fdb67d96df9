//! Line-oriented trace and results streams for offline debugging and
//! golden-file comparisons. Each stream is only opened when a path is given.
use super::error::SweepError;
use crate::store::types::VarId;
use crate::store::Tree;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct SweepTrace {
    trace: Option<BufWriter<File>>,
    results: Option<BufWriter<File>>,
}

impl SweepTrace {
    /// Opens the requested streams. Failing to open either is reported
    /// before any cell is computed.
    pub fn open(trace: Option<&Path>, results: Option<&Path>) -> Result<Self, SweepError> {
        let open = |path: &Path| {
            File::create(path)
                .map(BufWriter::new)
                .map_err(|source| SweepError::StreamOpen { path: path.to_path_buf(), source })
        };
        Ok(Self { trace: trace.map(open).transpose()?, results: results.map(open).transpose()? })
    }

    pub fn disabled() -> Self {
        Self { trace: None, results: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.trace.is_some() || self.results.is_some()
    }

    fn line(&mut self, text: std::fmt::Arguments<'_>) -> Result<(), SweepError> {
        if let Some(w) = self.trace.as_mut() {
            w.write_fmt(text).and_then(|_| w.write_all(b"\n")).map_err(SweepError::StreamWrite)?;
        }
        Ok(())
    }

    pub fn begin_table(&mut self, rows: usize, cols: usize, vars: usize) -> Result<(), SweepError> {
        self.line(format_args!("Begin Table rows={} cols={} vars={}", rows, cols, vars))
    }

    pub fn end_table(&mut self) -> Result<(), SweepError> {
        self.line(format_args!("End Table"))
    }

    pub fn begin_row(&mut self, row: usize, var: Option<&str>, value: &str) -> Result<(), SweepError> {
        self.line(format_args!("  Begin Row {} {}={}", row, var.unwrap_or("-"), value))
    }

    pub fn end_row(&mut self, row: usize) -> Result<(), SweepError> {
        self.line(format_args!("  End Row {}", row))
    }

    pub fn begin_col(&mut self, col: usize, var: Option<&str>, value: &str) -> Result<(), SweepError> {
        self.line(format_args!("    Begin Col {} {}={}", col, var.unwrap_or("-"), value))
    }

    pub fn end_col(&mut self, col: usize) -> Result<(), SweepError> {
        self.line(format_args!("    End Col {}", col))
    }

    pub fn begin_output(&mut self, name: &str) -> Result<(), SweepError> {
        self.line(format_args!("      Begin Output {}", name))
    }

    pub fn end_output(&mut self, name: &str, value: &str) -> Result<(), SweepError> {
        self.line(format_args!("      End Output {} = {}", name, value))
    }

    /// One results line: row, column, variable, value and units.
    pub fn result(&mut self, row: usize, col: usize, tree: &Tree, var: VarId) -> Result<(), SweepError> {
        if let Some(w) = self.results.as_mut() {
            let v = tree.var(var);
            writeln!(w, "{} {} {} {} {}", row, col, v.name, v.current_text(), v.display_units()).map_err(SweepError::StreamWrite)?;
        }
        Ok(())
    }

    pub fn finish(&mut self) -> Result<(), SweepError> {
        for w in [self.trace.as_mut(), self.results.as_mut()].into_iter().flatten() {
            w.flush().map_err(SweepError::StreamWrite)?;
        }
        Ok(())
    }
}
