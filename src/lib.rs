//! # bels: Bayesian networks as NNF circuit families
//!
//! **`bels`** compiles discrete Bayesian networks into propositional CNF
//! formulas belonging to restricted Negation Normal Form circuit families.
//! It is designed for knowledge-compilation experiments where a downstream
//! reasoner needs structural guarantees --- decomposability, determinism,
//! smoothness --- to count weighted models tractably.
//!
//! ## What does the encoding mean?
//!
//! The formula is logically equivalent to the *support* of the network's
//! joint distribution: its models are exactly the joint value assignments
//! with nonzero probability. Each model activates one indicator per
//! (variable, value) pair and one parameter per active CPT row; the
//! probabilities themselves are not part of the formula.
//!
//! ## Key Features
//!
//! - **Three circuit families**: [`nwDNNF`][crate::encode::CircuitFamily::NwDnnf],
//!   [`dDNNF`][crate::encode::CircuitFamily::DDnnf], and
//!   [`sdDNNF`][crate::encode::CircuitFamily::SdDnnf], sharing one common
//!   constraint skeleton and differing only in the extra obligations they
//!   enforce and audit.
//! - **Predictable identifiers**: the [`pool`] allocates indicators and
//!   parameters sequentially (1-indexed, DIMACS-ready), so external tooling
//!   can recover variable groupings from identifier ranges alone.
//! - **Reproducible test instances**: the [`generate`] module builds layered
//!   random networks from a single seeded stream; equal shapes and seeds
//!   give byte-identical networks.
//! - **Round-trippable formats**: BIF in and out for networks, DIMACS CNF
//!   out (and in) for formulas.
//!
//! ## Basic Usage
//!
//! ```rust
//! use bels::encode::{encode, CircuitFamily};
//! use bels::generate::{generate, LayeredShape};
//!
//! // 1. Generate a small dense two-layer network.
//! let shape = LayeredShape::new(2, 2, 2, 100).with_seed(42);
//! let generated = generate(&shape).unwrap();
//!
//! // 2. Encode its support as a deterministic DNNF.
//! let cnf = encode(&generated.network, CircuitFamily::DDnnf).unwrap();
//!
//! // 3. Serialize to DIMACS; header counts match the formula exactly.
//! let dimacs = cnf.to_dimacs_string();
//! assert!(dimacs.contains(&format!("p cnf {} {}", cnf.num_vars(), cnf.num_clauses())));
//! ```
//!
//! ## Core Components
//!
//! - **[`network`]**: the arena-based network model shared by both pipelines.
//! - **[`generate`]**: the layered random network generator.
//! - **[`pool`]**: the write-once indicator/parameter allocator.
//! - **[`encode`]**: the circuit encoder and its per-family obligations.
//! - **[`cnf`]**, **[`bif`]**, **[`dot`]**: formula and network I/O.

pub mod bif;
pub mod cnf;
pub mod dot;
pub mod encode;
pub mod error;
pub mod generate;
pub mod network;
pub mod pool;
pub mod types;
