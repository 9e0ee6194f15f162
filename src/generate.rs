//! Random generation of layered Bayesian networks.
//!
//! The generator produces a two-tier DAG: `top` mutually independent root
//! variables and `bottom` variables whose parents are drawn from the top
//! layer according to the requested edge density. All randomness flows from a
//! single [`ChaCha8Rng`] seeded once per call, so generation is a pure
//! function of the shape and the seed: equal inputs give byte-identical
//! networks. When no seed is supplied, a fresh one is drawn and reported back
//! through [`Generated`] so the run can be replayed later.

use log::{debug, info};
use num_bigint::BigUint;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{Error, Result};
use crate::network::{BayesianNetwork, Cpt, CptRow, NetworkBuilder};

/// Upper bound on the estimated total CPT row count of a shape.
///
/// Row counts grow combinatorially with parent-set size and domain size;
/// shapes above this bound are rejected up front instead of exhausting
/// memory mid-generation.
pub const MAX_ESTIMATED_ROWS: u64 = 1 << 24;

/// Requested shape of a layered network.
#[derive(Debug, Clone, PartialEq)]
pub struct LayeredShape {
    /// Number of top-layer (root) variables. At least 2.
    pub top: usize,
    /// Number of bottom-layer variables. At least 2.
    pub bottom: usize,
    /// Domain size shared by all variables. At least 2.
    pub domain_size: usize,
    /// Edge density percentage in 1..=100. At 100 every bottom variable
    /// conditions on the full top layer and the seed does not affect the
    /// structure.
    pub density: u32,
    /// Seed for the random stream. `None` draws a fresh seed.
    pub seed: Option<u64>,
}

impl LayeredShape {
    pub fn new(top: usize, bottom: usize, domain_size: usize, density: u32) -> Self {
        Self {
            top,
            bottom,
            domain_size,
            density,
            seed: None,
        }
    }

    /// Sets the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Checks the shape parameters. Called before any sampling starts, so an
    /// invalid configuration never produces a partial network.
    pub fn validate(&self) -> Result<()> {
        if self.top < 2 {
            return Err(Error::Config(format!(
                "top layer size must be at least 2, got {}",
                self.top
            )));
        }
        if self.bottom < 2 {
            return Err(Error::Config(format!(
                "bottom layer size must be at least 2, got {}",
                self.bottom
            )));
        }
        if self.domain_size < 2 {
            return Err(Error::Config(format!(
                "domain size must be at least 2, got {}",
                self.domain_size
            )));
        }
        if self.density < 1 || self.density > 100 {
            return Err(Error::Config(format!(
                "density must be in 1..=100, got {}",
                self.density
            )));
        }

        let estimated = self.estimated_rows();
        if estimated > BigUint::from(MAX_ESTIMATED_ROWS) {
            return Err(Error::Config(format!(
                "estimated CPT row count {} exceeds the bound {}",
                estimated, MAX_ESTIMATED_ROWS
            )));
        }

        Ok(())
    }

    /// Worst-case total number of CPT rows across the network: every bottom
    /// variable conditioning on the whole top layer.
    fn estimated_rows(&self) -> BigUint {
        let ds = BigUint::from(self.domain_size);
        let bottom_rows = BigUint::from(self.bottom) * ds.pow(self.top as u32 + 1);
        let top_rows = BigUint::from(self.top) * &ds;
        bottom_rows + top_rows
    }
}

/// A generated network together with the seed that produced it.
#[derive(Debug)]
pub struct Generated {
    pub network: BayesianNetwork,
    /// The effective seed: either the requested one or the freshly drawn one.
    pub seed: u64,
}

/// Draws a probability vector uniformly from the simplex.
///
/// Normalized exponential sampling: `-ln(U)` draws are Exp(1), and an Exp(1)
/// vector divided by its sum is uniform on the probability simplex.
fn sample_simplex(rng: &mut ChaCha8Rng, n: usize) -> Vec<f64> {
    // 1 - U lies in (0, 1], keeping the logarithm finite.
    let draws: Vec<f64> = (0..n).map(|_| -(1.0 - rng.gen::<f64>()).ln()).collect();
    let sum: f64 = draws.iter().sum();
    draws.into_iter().map(|e| e / sum).collect()
}

/// Generates a layered Bayesian network satisfying `shape`.
///
/// Variables are named `T1..Tn` (top) and `B1..Bm` (bottom) with positional
/// value labels `v1..vk`. Edges and CPT rows are produced in canonical order
/// (bottom variables ascending, top candidates ascending; contexts
/// lexicographic), so two runs with the same shape and seed are identical.
pub fn generate(shape: &LayeredShape) -> Result<Generated> {
    shape.validate()?;

    let seed = shape.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    info!(
        "generating layered network: top={}, bottom={}, ds={}, density={}%, seed={}",
        shape.top, shape.bottom, shape.domain_size, shape.density, seed
    );

    let values: Vec<String> = (1..=shape.domain_size).map(|j| format!("v{}", j)).collect();

    let mut builder = NetworkBuilder::new(format!(
        "layered_{}_{}_{}_{}",
        shape.top, shape.bottom, shape.domain_size, shape.density
    ));

    let mut top_ids = Vec::with_capacity(shape.top);
    for i in 0..shape.top {
        top_ids.push(builder.add_variable(format!("T{}", i + 1), values.clone())?);
    }
    let mut bottom_ids = Vec::with_capacity(shape.bottom);
    for i in 0..shape.bottom {
        bottom_ids.push(builder.add_variable(format!("B{}", i + 1), values.clone())?);
    }

    // Structure first, CPT values second: the edge draws must not interleave
    // with the value draws, or the realized edge set would depend on domain
    // size. At density 100 the structure consumes no randomness at all.
    let mut num_edges = 0usize;
    let mut parent_sets: Vec<Vec<usize>> = Vec::with_capacity(shape.bottom);
    if shape.density == 100 {
        for _ in 0..shape.bottom {
            parent_sets.push((0..shape.top).collect());
        }
        num_edges = shape.top * shape.bottom;
    } else {
        let p = shape.density as f64 / 100.0;
        for b in 0..shape.bottom {
            let mut parents = Vec::new();
            for t in 0..shape.top {
                if rng.gen_bool(p) {
                    parents.push(t);
                }
            }
            debug!("B{}: {} parents", b + 1, parents.len());
            num_edges += parents.len();
            // A bottom variable may end up with no parents; its CPT is then
            // a marginal distribution, which is valid.
            parent_sets.push(parents);
        }
    }

    for (b, parents) in parent_sets.iter().enumerate() {
        builder.set_parents(
            bottom_ids[b],
            parents.iter().map(|&t| top_ids[t]).collect(),
        );
    }

    // CPT values, variables in arena order (top layer first), contexts in
    // canonical lexicographic order.
    for i in 0..shape.top {
        let mut rows = Vec::with_capacity(shape.domain_size);
        for (v, &p) in sample_simplex(&mut rng, shape.domain_size).iter().enumerate() {
            rows.push(CptRow::new(Vec::new(), v, p));
        }
        builder.set_cpt(top_ids[i], Cpt::new(rows));
    }
    for (b, parents) in parent_sets.iter().enumerate() {
        let num_contexts = shape.domain_size.pow(parents.len() as u32);
        let mut rows = Vec::with_capacity(num_contexts * shape.domain_size);
        let mut context = vec![0usize; parents.len()];
        loop {
            for (v, &p) in sample_simplex(&mut rng, shape.domain_size).iter().enumerate() {
                rows.push(CptRow::new(context.clone(), v, p));
            }

            // Odometer over the parent cross-product.
            let mut done = true;
            for k in (0..context.len()).rev() {
                context[k] += 1;
                if context[k] < shape.domain_size {
                    done = false;
                    break;
                }
                context[k] = 0;
            }
            if done {
                break;
            }
        }
        builder.set_cpt(bottom_ids[b], Cpt::new(rows));
    }

    let network = builder.finish()?;
    info!(
        "generated {} variables, {} edges",
        network.num_variables(),
        num_edges
    );

    Ok(Generated { network, seed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::PROBABILITY_TOLERANCE;
    use crate::types::VarId;

    #[test]
    fn test_invalid_shapes_rejected() {
        assert!(LayeredShape::new(1, 5, 2, 100).validate().is_err());
        assert!(LayeredShape::new(5, 1, 2, 100).validate().is_err());
        assert!(LayeredShape::new(5, 5, 1, 100).validate().is_err());
        assert!(LayeredShape::new(5, 5, 2, 0).validate().is_err());
        assert!(LayeredShape::new(5, 5, 2, 101).validate().is_err());
        assert!(LayeredShape::new(5, 5, 2, 100).validate().is_ok());
    }

    #[test]
    fn test_row_bound_rejected() {
        // 2 * 2^65 rows is far beyond the bound.
        let shape = LayeredShape::new(64, 2, 2, 100);
        let err = shape.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_row_sums() {
        let generated = generate(&LayeredShape::new(3, 4, 3, 100).with_seed(7)).unwrap();
        for (id, var) in generated.network.variables() {
            for context in generated.network.contexts(id) {
                let sum: f64 = var
                    .cpt()
                    .rows()
                    .iter()
                    .filter(|row| row.context == context)
                    .map(|row| row.probability)
                    .sum();
                assert!(
                    (sum - 1.0).abs() <= PROBABILITY_TOLERANCE,
                    "{}: context {:?} sums to {}",
                    var.name(),
                    context,
                    sum
                );
            }
        }
    }

    #[test]
    fn test_deterministic_per_seed() {
        let shape = LayeredShape::new(5, 5, 2, 80).with_seed(42);
        let first = generate(&shape).unwrap();
        let second = generate(&shape).unwrap();
        assert_eq!(first.seed, 42);
        assert_eq!(first.network, second.network);
    }

    #[test]
    fn test_seeds_differ() {
        let a = generate(&LayeredShape::new(5, 5, 2, 50).with_seed(1)).unwrap();
        let b = generate(&LayeredShape::new(5, 5, 2, 50).with_seed(2)).unwrap();
        let parents = |g: &Generated| -> Vec<Vec<VarId>> {
            g.network
                .variables()
                .map(|(_, v)| v.parents().to_vec())
                .collect()
        };
        assert_ne!(parents(&a), parents(&b));
    }

    #[test]
    fn test_fresh_seed_reported() {
        let shape = LayeredShape::new(2, 2, 2, 100);
        let generated = generate(&shape).unwrap();
        // Replaying the reported seed reproduces the network.
        let replay = generate(&shape.clone().with_seed(generated.seed)).unwrap();
        assert_eq!(generated.network, replay.network);
    }

    #[test]
    fn test_dense_structure_ignores_seed() {
        let a = generate(&LayeredShape::new(4, 4, 2, 100).with_seed(1)).unwrap();
        let b = generate(&LayeredShape::new(4, 4, 2, 100).with_seed(2)).unwrap();
        for g in [&a, &b] {
            for (_, var) in g.network.variables() {
                if var.name().starts_with('B') {
                    assert_eq!(var.parents().len(), 4);
                }
            }
        }
        // Same structure, different CPT values.
        let parents = |g: &Generated| -> Vec<Vec<VarId>> {
            g.network
                .variables()
                .map(|(_, v)| v.parents().to_vec())
                .collect()
        };
        assert_eq!(parents(&a), parents(&b));
        assert_ne!(a.network, b.network);
    }

    #[test]
    fn test_dense_scenario_counts() {
        // Shape (top=4, bottom=4, ds=2, density=100): 8 variables, each
        // bottom variable with 4 parents and 16 parent contexts.
        let generated = generate(&LayeredShape::new(4, 4, 2, 100).with_seed(3)).unwrap();
        let network = &generated.network;
        assert_eq!(network.num_variables(), 8);
        for (id, var) in network.variables() {
            if var.name().starts_with('B') {
                assert_eq!(var.parents().len(), 4);
                assert_eq!(network.contexts(id).count(), 16);
                assert_eq!(var.cpt().len(), 32);
            }
        }
    }
}
