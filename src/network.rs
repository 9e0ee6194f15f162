//! In-memory model of a discrete Bayesian network.
//!
//! The network is an arena of [`Variable`]s indexed by [`VarId`]; parent sets
//! are index lists, so the shared acyclic parent graph has no per-edge
//! ownership. Networks are built through [`NetworkBuilder`], which validates
//! the full structure once on [`NetworkBuilder::finish`]; after that the
//! network is immutable and the encoder only reads it.
//!
//! A CPT is stored as an explicit row list rather than a dense tensor. The
//! row list is canonical (lexicographic by parent value indices, then by own
//! value) for generated and loaded networks, but the representation can also
//! express *aliased* rows --- two distinct entries with the same parent
//! context and own value --- which some circuit families must reject.

use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::cmp::Reverse;

use crate::error::{Error, Result};
use crate::types::VarId;

/// Tolerance for checking that a CPT row group sums to 1.
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// One CPT entry: a parent context, an own-domain value, and a probability.
#[derive(Debug, Clone, PartialEq)]
pub struct CptRow {
    /// One value index per parent, in parent-list order.
    pub context: Vec<usize>,
    /// Value index in the owning variable's domain.
    pub value: usize,
    /// Probability of `value` given `context`.
    pub probability: f64,
}

impl CptRow {
    pub fn new(context: Vec<usize>, value: usize, probability: f64) -> Self {
        Self {
            context,
            value,
            probability,
        }
    }
}

/// A conditional probability table, owned by exactly one [`Variable`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cpt {
    rows: Vec<CptRow>,
}

impl Cpt {
    pub fn new(rows: Vec<CptRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[CptRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows with nonzero probability. Only these rows are
    /// represented by parameter variables in an encoding.
    pub fn num_nonzero_rows(&self) -> usize {
        self.rows.iter().filter(|row| row.probability != 0.0).count()
    }
}

/// A named discrete random variable with an ordered domain and parent list.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    values: Vec<String>,
    parents: Vec<VarId>,
    cpt: Cpt,
}

impl Variable {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The ordered domain of labeled values.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn domain_size(&self) -> usize {
        self.values.len()
    }

    /// Position of a value label in the domain, if present.
    pub fn value_index(&self, label: &str) -> Option<usize> {
        self.values.iter().position(|v| v == label)
    }

    pub fn parents(&self) -> &[VarId] {
        &self.parents
    }

    pub fn cpt(&self) -> &Cpt {
        &self.cpt
    }
}

/// Iterator over all parent contexts of a variable, in canonical
/// (lexicographic, first parent most significant) order.
///
/// A variable with no parents has exactly one context: the empty one.
pub struct ContextIter {
    sizes: Vec<usize>,
    current: Vec<usize>,
    done: bool,
}

impl ContextIter {
    fn new(sizes: Vec<usize>) -> Self {
        let current = vec![0; sizes.len()];
        Self {
            sizes,
            current,
            done: false,
        }
    }
}

impl Iterator for ContextIter {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.current.clone();

        // Odometer increment, least significant position last.
        self.done = true;
        for i in (0..self.sizes.len()).rev() {
            self.current[i] += 1;
            if self.current[i] < self.sizes[i] {
                self.done = false;
                break;
            }
            self.current[i] = 0;
        }

        Some(item)
    }
}

/// A discrete Bayesian network: an arena of variables plus a fixed
/// topological order consistent with the parent relation.
///
/// Instances are only obtainable from [`NetworkBuilder::finish`] (or the BIF
/// loader, which goes through the builder), so a `BayesianNetwork` in hand
/// has already passed structural validation.
#[derive(Debug, Clone, PartialEq)]
pub struct BayesianNetwork {
    name: String,
    variables: Vec<Variable>,
    order: Vec<VarId>,
}

impl BayesianNetwork {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id.index()]
    }

    /// Iterates over `(id, variable)` pairs in arena order.
    pub fn variables(&self) -> impl Iterator<Item = (VarId, &Variable)> {
        self.variables
            .iter()
            .enumerate()
            .map(|(i, v)| (VarId::new(i as u32), v))
    }

    /// The fixed topological order: every variable appears after all of its
    /// parents. Ties are broken by arena index, so the order is deterministic.
    pub fn topological_order(&self) -> &[VarId] {
        &self.order
    }

    /// Domain sizes of a variable's parents, in parent-list order.
    pub fn parent_domain_sizes(&self, id: VarId) -> Vec<usize> {
        self.variable(id)
            .parents()
            .iter()
            .map(|&p| self.variable(p).domain_size())
            .collect()
    }

    /// All parent contexts of a variable, in canonical order.
    pub fn contexts(&self, id: VarId) -> ContextIter {
        ContextIter::new(self.parent_domain_sizes(id))
    }

    /// Renders a parent context with value labels, e.g. `(v1, v2)`.
    /// Used in error messages and the BIF writer.
    pub fn context_label(&self, id: VarId, context: &[usize]) -> String {
        let labels: Vec<&str> = self
            .variable(id)
            .parents()
            .iter()
            .zip(context.iter())
            .map(|(&p, &k)| self.variable(p).values()[k].as_str())
            .collect();
        format!("({})", labels.join(", "))
    }

    /// Re-runs the full structural validation. Builder-produced networks have
    /// already passed it; the encoder calls this again defensively before
    /// doing any work.
    pub fn validate(&self) -> Result<()> {
        validate_variables(&self.variables)?;
        topological_sort(&self.variables)?;
        Ok(())
    }
}

/// Deterministic Kahn sort; fails on a cyclic parent graph.
fn topological_sort(variables: &[Variable]) -> Result<Vec<VarId>> {
    let n = variables.len();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree = vec![0usize; n];

    for (i, var) in variables.iter().enumerate() {
        in_degree[i] = var.parents().len();
        for &p in var.parents() {
            children[p.index()].push(i);
        }
    }

    // Min-heap over arena indices keeps the order stable.
    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&i| in_degree[i] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(n);

    while let Some(Reverse(i)) = ready.pop() {
        order.push(VarId::new(i as u32));
        for &c in &children[i] {
            in_degree[c] -= 1;
            if in_degree[c] == 0 {
                ready.push(Reverse(c));
            }
        }
    }

    if order.len() != n {
        let stuck: Vec<&str> = (0..n)
            .filter(|&i| in_degree[i] > 0)
            .map(|i| variables[i].name())
            .collect();
        return Err(Error::Network(format!(
            "parent graph has a cycle involving: {}",
            stuck.join(", ")
        )));
    }

    Ok(order)
}

fn validate_variables(variables: &[Variable]) -> Result<()> {
    let n = variables.len();

    for (i, var) in variables.iter().enumerate() {
        if var.domain_size() < 2 {
            return Err(Error::Network(format!(
                "variable {} has a domain of size {}, need at least 2",
                var.name(),
                var.domain_size()
            )));
        }

        let mut seen_parents = Vec::new();
        for &p in var.parents() {
            if p.index() >= n {
                return Err(Error::Network(format!(
                    "variable {} references unknown parent {}",
                    var.name(),
                    p
                )));
            }
            if p.index() == i {
                return Err(Error::Network(format!(
                    "variable {} lists itself as a parent",
                    var.name()
                )));
            }
            if seen_parents.contains(&p) {
                return Err(Error::Network(format!(
                    "variable {} lists parent {} twice",
                    var.name(),
                    variables[p.index()].name()
                )));
            }
            seen_parents.push(p);
        }

        let parent_sizes: Vec<usize> = var
            .parents()
            .iter()
            .map(|&p| variables[p.index()].domain_size())
            .collect();

        for (r, row) in var.cpt().rows().iter().enumerate() {
            if row.context.len() != var.parents().len() {
                return Err(Error::Network(format!(
                    "variable {}, row {}: context has {} entries, expected {}",
                    var.name(),
                    r,
                    row.context.len(),
                    var.parents().len()
                )));
            }
            for (k, (&c, &size)) in row.context.iter().zip(parent_sizes.iter()).enumerate() {
                if c >= size {
                    return Err(Error::Network(format!(
                        "variable {}, row {}: parent {} value index {} out of range (domain size {})",
                        var.name(),
                        r,
                        variables[var.parents()[k].index()].name(),
                        c,
                        size
                    )));
                }
            }
            if row.value >= var.domain_size() {
                return Err(Error::Network(format!(
                    "variable {}, row {}: value index {} out of range (domain size {})",
                    var.name(),
                    r,
                    row.value,
                    var.domain_size()
                )));
            }
            if !row.probability.is_finite() || row.probability < 0.0 || row.probability > 1.0 {
                return Err(Error::Network(format!(
                    "variable {}, row {}: probability {} outside [0, 1]",
                    var.name(),
                    r,
                    row.probability
                )));
            }
        }

        // Every context of the parent cross-product must be covered and its
        // rows must sum to 1.
        let expected_contexts: u128 = parent_sizes.iter().map(|&s| s as u128).product();
        let mut sums: BTreeMap<&[usize], f64> = BTreeMap::new();
        for row in var.cpt().rows() {
            *sums.entry(row.context.as_slice()).or_insert(0.0) += row.probability;
        }
        if sums.len() as u128 != expected_contexts {
            return Err(Error::Network(format!(
                "variable {}: CPT covers {} parent contexts, expected {}",
                var.name(),
                sums.len(),
                expected_contexts
            )));
        }
        for (context, sum) in &sums {
            if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
                return Err(Error::Network(format!(
                    "variable {}: probabilities for context {:?} sum to {}, expected 1",
                    var.name(),
                    context,
                    sum
                )));
            }
        }
    }

    Ok(())
}

/// Incremental constructor for [`BayesianNetwork`].
///
/// Declaration order is arena order: `add_variable` assigns consecutive
/// [`VarId`]s. Parents and CPTs can be attached in any order before
/// [`finish`][NetworkBuilder::finish], which validates everything at once.
#[derive(Debug)]
pub struct NetworkBuilder {
    name: String,
    variables: Vec<Variable>,
    by_name: HashMap<String, VarId>,
}

impl NetworkBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Declares a variable with the given domain. Names must be unique.
    pub fn add_variable(&mut self, name: impl Into<String>, values: Vec<String>) -> Result<VarId> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(Error::Network(format!("variable {} declared twice", name)));
        }
        let id = VarId::new(self.variables.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.variables.push(Variable {
            name,
            values,
            parents: Vec::new(),
            cpt: Cpt::default(),
        });
        Ok(id)
    }

    /// Looks up a previously declared variable by name.
    pub fn find(&self, name: &str) -> Option<VarId> {
        self.by_name.get(name).copied()
    }

    pub fn set_parents(&mut self, id: VarId, parents: Vec<VarId>) {
        self.variables[id.index()].parents = parents;
    }

    pub fn set_cpt(&mut self, id: VarId, cpt: Cpt) {
        self.variables[id.index()].cpt = cpt;
    }

    /// Validates the assembled network and freezes it.
    pub fn finish(self) -> Result<BayesianNetwork> {
        validate_variables(&self.variables)?;
        let order = topological_sort(&self.variables)?;
        Ok(BayesianNetwork {
            name: self.name,
            variables: self.variables,
            order,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    /// X -> Y with binary domains and fixed probabilities.
    fn chain_network() -> BayesianNetwork {
        let mut builder = NetworkBuilder::new("chain");
        let x = builder.add_variable("X", labels("x", 2)).unwrap();
        let y = builder.add_variable("Y", labels("y", 2)).unwrap();
        builder.set_cpt(
            x,
            Cpt::new(vec![
                CptRow::new(vec![], 0, 0.3),
                CptRow::new(vec![], 1, 0.7),
            ]),
        );
        builder.set_parents(y, vec![x]);
        builder.set_cpt(
            y,
            Cpt::new(vec![
                CptRow::new(vec![0], 0, 0.1),
                CptRow::new(vec![0], 1, 0.9),
                CptRow::new(vec![1], 0, 0.6),
                CptRow::new(vec![1], 1, 0.4),
            ]),
        );
        builder.finish().unwrap()
    }

    #[test]
    fn test_chain_topological_order() {
        let network = chain_network();
        assert_eq!(network.num_variables(), 2);
        assert_eq!(network.topological_order(), &[VarId::new(0), VarId::new(1)]);
        assert_eq!(network.variable(VarId::new(1)).parents(), &[VarId::new(0)]);
    }

    #[test]
    fn test_topological_order_reversed_declaration() {
        // Child declared before its parent.
        let mut builder = NetworkBuilder::new("rev");
        let y = builder.add_variable("Y", labels("y", 2)).unwrap();
        let x = builder.add_variable("X", labels("x", 2)).unwrap();
        builder.set_parents(y, vec![x]);
        builder.set_cpt(
            y,
            Cpt::new(vec![
                CptRow::new(vec![0], 0, 0.5),
                CptRow::new(vec![0], 1, 0.5),
                CptRow::new(vec![1], 0, 0.5),
                CptRow::new(vec![1], 1, 0.5),
            ]),
        );
        builder.set_cpt(
            x,
            Cpt::new(vec![
                CptRow::new(vec![], 0, 0.2),
                CptRow::new(vec![], 1, 0.8),
            ]),
        );
        let network = builder.finish().unwrap();
        assert_eq!(network.topological_order(), &[x, y]);
    }

    #[test]
    fn test_cycle_rejected() {
        let mut builder = NetworkBuilder::new("cycle");
        let a = builder.add_variable("A", labels("a", 2)).unwrap();
        let b = builder.add_variable("B", labels("b", 2)).unwrap();
        builder.set_parents(a, vec![b]);
        builder.set_parents(b, vec![a]);
        let rows = vec![
            CptRow::new(vec![0], 0, 0.5),
            CptRow::new(vec![0], 1, 0.5),
            CptRow::new(vec![1], 0, 0.5),
            CptRow::new(vec![1], 1, 0.5),
        ];
        builder.set_cpt(a, Cpt::new(rows.clone()));
        builder.set_cpt(b, Cpt::new(rows));
        let err = builder.finish().unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_bad_row_sum_rejected() {
        let mut builder = NetworkBuilder::new("bad");
        let x = builder.add_variable("X", labels("x", 2)).unwrap();
        builder.set_cpt(
            x,
            Cpt::new(vec![
                CptRow::new(vec![], 0, 0.3),
                CptRow::new(vec![], 1, 0.6),
            ]),
        );
        let err = builder.finish().unwrap_err();
        assert!(err.to_string().contains("sum"));
    }

    #[test]
    fn test_missing_context_rejected() {
        let mut builder = NetworkBuilder::new("gap");
        let x = builder.add_variable("X", labels("x", 2)).unwrap();
        let y = builder.add_variable("Y", labels("y", 2)).unwrap();
        builder.set_cpt(
            x,
            Cpt::new(vec![
                CptRow::new(vec![], 0, 0.5),
                CptRow::new(vec![], 1, 0.5),
            ]),
        );
        builder.set_parents(y, vec![x]);
        // Only one of the two contexts is present.
        builder.set_cpt(
            y,
            Cpt::new(vec![
                CptRow::new(vec![0], 0, 0.5),
                CptRow::new(vec![0], 1, 0.5),
            ]),
        );
        let err = builder.finish().unwrap_err();
        assert!(err.to_string().contains("contexts"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut builder = NetworkBuilder::new("dup");
        builder.add_variable("X", labels("x", 2)).unwrap();
        let err = builder.add_variable("X", labels("x", 2)).unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_aliased_rows_pass_validation() {
        // Two entries for the same (context, value) are structurally valid as
        // long as the context group still sums to 1; rejecting them is the
        // business of the deterministic circuit families, not the model.
        let mut builder = NetworkBuilder::new("alias");
        let x = builder.add_variable("X", labels("x", 2)).unwrap();
        builder.set_cpt(
            x,
            Cpt::new(vec![
                CptRow::new(vec![], 0, 0.25),
                CptRow::new(vec![], 0, 0.25),
                CptRow::new(vec![], 1, 0.5),
            ]),
        );
        assert!(builder.finish().is_ok());
    }

    #[test]
    fn test_contexts_iterator() {
        let network = chain_network();
        let contexts: Vec<_> = network.contexts(VarId::new(1)).collect();
        assert_eq!(contexts, vec![vec![0], vec![1]]);
        let root_contexts: Vec<_> = network.contexts(VarId::new(0)).collect();
        assert_eq!(root_contexts, vec![Vec::<usize>::new()]);
    }

    #[test]
    fn test_context_label() {
        let network = chain_network();
        assert_eq!(network.context_label(VarId::new(1), &[1]), "(x2)");
    }
}
