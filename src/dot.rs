//! Bayesian network to DOT (Graphviz) conversion.
//!
//! Renders the parent DAG for visual inspection: one box per variable,
//! labeled with its name and domain size, and one edge per parent relation.
//! Render with e.g. `dot -Tpng network.dot -o network.png`.

use std::fmt::Write as FmtWrite;

use crate::network::BayesianNetwork;

impl BayesianNetwork {
    /// Converts the network DAG to DOT format.
    pub fn to_dot(&self) -> String {
        let mut output = String::new();

        writeln!(output, "digraph {{").unwrap();
        writeln!(output, "  rankdir=TB;").unwrap();
        writeln!(output, "  node [shape=box];").unwrap();

        for (id, var) in self.variables() {
            writeln!(
                output,
                "  n{} [label=\"{}\\n({} values)\"];",
                id.id(),
                var.name(),
                var.domain_size()
            )
            .unwrap();
        }

        for (id, var) in self.variables() {
            for &parent in var.parents() {
                writeln!(output, "  n{} -> n{};", parent.id(), id.id()).unwrap();
            }
        }

        writeln!(output, "}}").unwrap();
        output
    }
}

#[cfg(test)]
mod tests {
    use crate::generate::{generate, LayeredShape};

    #[test]
    fn test_dot_output() {
        let generated = generate(&LayeredShape::new(2, 2, 2, 100).with_seed(5)).unwrap();
        let dot = generated.network.to_dot();
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("label=\"T1\\n(2 values)\""));
        assert!(dot.contains("label=\"B2\\n(2 values)\""));
        // Dense shape: every top variable feeds every bottom variable.
        assert!(dot.contains("n0 -> n2;"));
        assert!(dot.contains("n1 -> n3;"));
        assert!(dot.trim_end().ends_with('}'));
    }
}
