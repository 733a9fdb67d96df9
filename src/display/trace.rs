use crate::store::types::VarId;
use crate::store::variable::VarKind;
use crate::store::Tree;
use std::collections::HashMap;
use std::fmt::Write;

/// Renders the active dependency tree below `target` with current values.
///
/// Shared sub-trees are printed once; later visits refer back to the level
/// where they first appeared.
pub fn format_trace(tree: &Tree, target: VarId) -> String {
    let mut tracer = Tracer { tree, visited_at_level: HashMap::new(), output: String::new() };

    if target.index() < tree.var_count() {
        let name = &tree.var(target).name;
        let _ = writeln!(tracer.output, "AUDIT TRACE for variable '{}':", name);
        let _ = writeln!(tracer.output, "--------------------------------------------------");
        tracer.trace_var(target, 1, "");
    } else {
        let _ = writeln!(tracer.output, "Error: Invalid variable id {:?}", target);
    }
    tracer.output
}

struct Tracer<'a> {
    tree: &'a Tree,
    visited_at_level: HashMap<VarId, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_var(&mut self, var_id: VarId, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(&var_id) {
            let _ = writeln!(self.output, "{}-> (Ref to L{})", prefix, first_seen);
            return;
        }
        self.visited_at_level.insert(var_id, level);

        let var = self.tree.var(var_id);
        let line_header = format!("[L{}] {}{}", level, var.name, self.format_value(var_id));

        match var.active_producer() {
            None => {
                let tag = if var.is_constant { "Const" } else if var.is_masked { "Masked" } else { "Input" };
                let _ = writeln!(self.output, "{}{} -> {}", prefix, line_header, tag);
            }
            Some(eq_id) => {
                let eq = self.tree.equation(eq_id);
                let args: Vec<&str> = eq.inputs.iter().map(|v| self.tree.var(*v).name.as_str()).collect();
                let _ = writeln!(self.output, "{}{} = {}({})", prefix, line_header, eq.name, args.join(", "));
                let inputs = eq.inputs.clone();
                self.recurse_children(prefix, &inputs, level);
            }
        }
    }

    fn recurse_children(&mut self, prefix: &str, children: &[VarId], level: usize) {
        let stem = self.build_child_stem(prefix);
        for (i, &child) in children.iter().enumerate() {
            let connector = if i == children.len() - 1 { "`--" } else { "|--" };
            let full_prefix = format!("{}{}", stem, connector);
            self.trace_var(child, level + 1, &full_prefix);
        }
    }

    fn format_value(&self, id: VarId) -> String {
        let var = self.tree.var(id);
        match &var.kind {
            VarKind::Continuous(c) if c.display_units.is_empty() => format!("[{}]", var.current_text()),
            VarKind::Continuous(c) => format!("[{} {}]", var.current_text(), c.display_units),
            VarKind::Discrete(_) | VarKind::Text(_) => format!("[{}]", var.current_text()),
        }
    }

    fn build_child_stem(&self, current_prefix: &str) -> String {
        current_prefix.replace("`--", "   ").replace("|--", "|  ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_trace_shows_producers_and_inputs() {
        let mut tree = fixtures::configured_tree(&[]);
        fixtures::set_inputs(&mut tree);
        tree.calculate_roots().unwrap();

        let head = tree.var_id("vSurfaceFireSpreadAtHead").unwrap();
        let out = format_trace(&tree, head);

        assert!(out.starts_with("AUDIT TRACE for variable 'vSurfaceFireSpreadAtHead':"));
        assert!(out.contains("[L1] vSurfaceFireSpreadAtHead[12.5 ft/min] = EqSpreadAtHead("));
        assert!(out.contains("vWindSpeedAtMidflame[88 ft/min] -> Input"));
        assert!(out.contains("vSurfaceFuelBedModel[gr2] -> Input"));
    }

    #[test]
    fn test_shared_inputs_print_once() {
        let mut tree = fixtures::configured_tree(&[]);
        fixtures::set_inputs(&mut tree);
        tree.calculate_roots().unwrap();

        // Flame length reads reaction intensity directly and through spread.
        let flame = tree.var_id("vSurfaceFireFlameLeng").unwrap();
        let out = format_trace(&tree, flame);
        assert_eq!(out.matches("= EqReactionInt(").count(), 1);
        assert!(out.contains("-> (Ref to L"));
    }
}
