//! Sequential allocation of propositional variables for an encoding run.
//!
//! The pool maps every indicator proposition (network variable takes a
//! value) and every parameter proposition (a nonzero CPT row is active) to a
//! unique positive identifier. Identifiers are 1-indexed so they line up
//! with DIMACS literals directly.
//!
//! Allocation order is fixed: all indicators first (network variables in
//! topological order, values in declared order), then all parameters
//! (variables in topological order, CPT rows in canonical order, rows with
//! probability zero skipped). The order makes identifier ranges predictable,
//! so external tooling can recover variable groupings from the ranges alone.
//! The pool is write-once: it is fully populated on construction and never
//! reassigns an identifier.

use std::ops::Range;

use crate::network::BayesianNetwork;
use crate::types::VarId;

#[derive(Debug)]
pub struct VarPool {
    indicator_base: Vec<u32>,
    indicator_count: Vec<u32>,
    parameter_base: Vec<u32>,
    parameter_count: Vec<u32>,
    /// Per arena variable, per CPT row: the parameter identifier, or `None`
    /// for zero-probability rows.
    parameter_ids: Vec<Vec<Option<u32>>>,
    /// Parameter blocks in allocation order, for reverse lookup.
    param_blocks: Vec<(Range<u32>, VarId)>,
    num_indicators: u32,
    num_parameters: u32,
}

impl VarPool {
    /// Allocates identifiers for every indicator and parameter of `network`.
    pub fn new(network: &BayesianNetwork) -> Self {
        let n = network.num_variables();
        let mut indicator_base = vec![0u32; n];
        let mut indicator_count = vec![0u32; n];
        let mut parameter_base = vec![0u32; n];
        let mut parameter_count = vec![0u32; n];
        let mut parameter_ids: Vec<Vec<Option<u32>>> = vec![Vec::new(); n];
        let mut param_blocks = Vec::with_capacity(n);

        let mut counter: u32 = 1;

        for &id in network.topological_order() {
            let var = network.variable(id);
            indicator_base[id.index()] = counter;
            indicator_count[id.index()] = var.domain_size() as u32;
            counter += var.domain_size() as u32;
        }
        let num_indicators = counter - 1;

        for &id in network.topological_order() {
            let var = network.variable(id);
            let base = counter;
            let ids: Vec<Option<u32>> = var
                .cpt()
                .rows()
                .iter()
                .map(|row| {
                    if row.probability != 0.0 {
                        let p = counter;
                        counter += 1;
                        Some(p)
                    } else {
                        None
                    }
                })
                .collect();
            parameter_base[id.index()] = base;
            parameter_count[id.index()] = counter - base;
            parameter_ids[id.index()] = ids;
            param_blocks.push((base..counter, id));
        }
        let num_parameters = counter - 1 - num_indicators;

        Self {
            indicator_base,
            indicator_count,
            parameter_base,
            parameter_count,
            parameter_ids,
            param_blocks,
            num_indicators,
            num_parameters,
        }
    }

    /// Identifier of the indicator "variable `var` takes value `value`".
    pub fn indicator(&self, var: VarId, value: usize) -> u32 {
        debug_assert!((value as u32) < self.indicator_count[var.index()]);
        self.indicator_base[var.index()] + value as u32
    }

    /// Identifier of the parameter for CPT row `row` of `var`, or `None` for
    /// a zero-probability row.
    pub fn parameter(&self, var: VarId, row: usize) -> Option<u32> {
        self.parameter_ids[var.index()][row]
    }

    /// Contiguous identifier range of a variable's indicators.
    pub fn indicator_range(&self, var: VarId) -> Range<u32> {
        let base = self.indicator_base[var.index()];
        base..base + self.indicator_count[var.index()]
    }

    /// Contiguous identifier range of a variable's parameters.
    pub fn parameter_range(&self, var: VarId) -> Range<u32> {
        let base = self.parameter_base[var.index()];
        base..base + self.parameter_count[var.index()]
    }

    /// Which network variable a parameter identifier belongs to, or `None`
    /// if the identifier is not a parameter.
    pub fn parameter_owner(&self, id: u32) -> Option<VarId> {
        if id <= self.num_indicators {
            return None;
        }
        self.param_blocks
            .iter()
            .find(|(range, _)| range.contains(&id))
            .map(|&(_, var)| var)
    }

    pub fn is_indicator(&self, id: u32) -> bool {
        id >= 1 && id <= self.num_indicators
    }

    pub fn num_indicators(&self) -> u32 {
        self.num_indicators
    }

    pub fn num_parameters(&self) -> u32 {
        self.num_parameters
    }

    /// Total number of allocated identifiers; the DIMACS header count.
    pub fn num_vars(&self) -> u32 {
        self.num_indicators + self.num_parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Cpt, CptRow, NetworkBuilder};

    /// X -> Y, binary domains; one zero-probability row in Y's CPT.
    fn network_with_zero_row() -> crate::network::BayesianNetwork {
        let mut builder = NetworkBuilder::new("zero");
        let x = builder
            .add_variable("X", vec!["x1".into(), "x2".into()])
            .unwrap();
        let y = builder
            .add_variable("Y", vec!["y1".into(), "y2".into()])
            .unwrap();
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
                CptRow::new(vec![0], 0, 1.0),
                CptRow::new(vec![0], 1, 0.0),
                CptRow::new(vec![1], 0, 0.5),
                CptRow::new(vec![1], 1, 0.5),
            ]),
        );
        builder.finish().unwrap()
    }

    #[test]
    fn test_allocation_order() {
        let network = network_with_zero_row();
        let pool = VarPool::new(&network);
        let x = VarId::new(0);
        let y = VarId::new(1);

        // Indicators first: X's two values, then Y's two values.
        assert_eq!(pool.indicator(x, 0), 1);
        assert_eq!(pool.indicator(x, 1), 2);
        assert_eq!(pool.indicator(y, 0), 3);
        assert_eq!(pool.indicator(y, 1), 4);
        assert_eq!(pool.num_indicators(), 4);

        // Parameters after all indicators, zero row skipped.
        assert_eq!(pool.parameter(x, 0), Some(5));
        assert_eq!(pool.parameter(x, 1), Some(6));
        assert_eq!(pool.parameter(y, 0), Some(7));
        assert_eq!(pool.parameter(y, 1), None);
        assert_eq!(pool.parameter(y, 2), Some(8));
        assert_eq!(pool.parameter(y, 3), Some(9));
        assert_eq!(pool.num_parameters(), 5);
        assert_eq!(pool.num_vars(), 9);
    }

    #[test]
    fn test_ranges() {
        let network = network_with_zero_row();
        let pool = VarPool::new(&network);
        let x = VarId::new(0);
        let y = VarId::new(1);

        assert_eq!(pool.indicator_range(x), 1..3);
        assert_eq!(pool.indicator_range(y), 3..5);
        assert_eq!(pool.parameter_range(x), 5..7);
        assert_eq!(pool.parameter_range(y), 7..10);
    }

    #[test]
    fn test_parameter_owner() {
        let network = network_with_zero_row();
        let pool = VarPool::new(&network);

        assert_eq!(pool.parameter_owner(5), Some(VarId::new(0)));
        assert_eq!(pool.parameter_owner(9), Some(VarId::new(1)));
        // Indicators are not parameters.
        assert_eq!(pool.parameter_owner(3), None);
        assert!(pool.is_indicator(3));
        assert!(!pool.is_indicator(7));
    }
}
