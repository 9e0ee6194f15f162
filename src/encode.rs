//! Encoding of a Bayesian network into a restricted NNF circuit family.
//!
//! The encoder emits a CNF formula whose models are exactly the joint
//! value assignments with nonzero probability: one indicator proposition per
//! (variable, value) pair and one parameter proposition per nonzero CPT row,
//! tied together so that every model activates exactly one indicator per
//! variable and exactly one parameter per (variable, parent context) group.
//!
//! The three [`CircuitFamily`] values share this common skeleton and differ
//! only in the extra structural obligations they enforce:
//!
//! - **nwDNNF** decomposes over disjoint negative scopes; no extra clauses.
//! - **dDNNF** additionally requires every OR-group's branches to be pairwise
//!   inconsistent; aliased CPT rows make that impossible and are rejected.
//! - **sdDNNF** additionally requires every OR-group's branches to range over
//!   one identical scope; smoothing clauses widen each parameter's scope to
//!   the full indicator block of its variable.
//!
//! After emission the encoder re-derives the family obligations from the
//! recorded OR-groups and the clauses actually produced, rather than
//! trusting the construction.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use log::{debug, info};

use crate::cnf::Cnf;
use crate::error::{Error, Result};
use crate::network::{BayesianNetwork, Variable};
use crate::pool::VarPool;
use crate::types::{Lit, VarId};

/// The circuit family whose structural obligations the encoder enforces.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CircuitFamily {
    /// Negative-weak decomposable NNF: the cheapest discipline.
    NwDnnf,
    /// Deterministic DNNF: OR-branches pairwise inconsistent.
    DDnnf,
    /// Smooth deterministic DNNF: OR-branches additionally share one scope.
    SdDnnf,
}

impl CircuitFamily {
    /// All families, in increasing order of structural strength.
    pub const ALL: [CircuitFamily; 3] =
        [CircuitFamily::NwDnnf, CircuitFamily::DDnnf, CircuitFamily::SdDnnf];

    /// Whether the family requires determinism of OR-groups.
    pub fn deterministic(self) -> bool {
        matches!(self, CircuitFamily::DDnnf | CircuitFamily::SdDnnf)
    }

    /// Whether the family requires smoothness of OR-groups.
    pub fn smooth(self) -> bool {
        matches!(self, CircuitFamily::SdDnnf)
    }
}

impl fmt::Display for CircuitFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitFamily::NwDnnf => "nwDNNF",
            CircuitFamily::DDnnf => "dDNNF",
            CircuitFamily::SdDnnf => "sdDNNF",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for CircuitFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "nwdnnf" => Ok(CircuitFamily::NwDnnf),
            "ddnnf" => Ok(CircuitFamily::DDnnf),
            "sddnnf" => Ok(CircuitFamily::SdDnnf),
            _ => Err(Error::Config(format!(
                "unknown circuit family {:?}, expected one of: nwDNNF, dDNNF, sdDNNF",
                s
            ))),
        }
    }
}

/// Optional encoder behaviors.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Context-specific independence: drop a parent from a row's activation
    /// conjunction when the row's probability does not depend on it. Only
    /// accepted for the nwDNNF family, since shrunk conjunctions relax the
    /// per-row structure the stronger families audit.
    pub csi: bool,
}

/// Counters describing one encoding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeStats {
    pub num_indicators: u32,
    pub num_parameters: u32,
    pub num_clauses: usize,
    /// Zero-probability rows, excluded from the support.
    pub zero_rows: usize,
    /// Rows whose activation conjunction was shrunk by CSI.
    pub shrunk_rows: usize,
    /// Parent conjuncts dropped by CSI, summed over all rows.
    pub dropped_conjuncts: usize,
}

/// The result of an encoding run: the formula plus its statistics.
#[derive(Debug)]
pub struct Encoded {
    pub cnf: Cnf,
    pub stats: EncodeStats,
}

/// Encodes `network` for `family` with default options.
pub fn encode(network: &BayesianNetwork, family: CircuitFamily) -> Result<Cnf> {
    encode_with_options(network, family, &EncodeOptions::default()).map(|encoded| encoded.cnf)
}

/// Encodes `network` for `family`.
///
/// Runs as: validate the network, audit the family obligations that depend
/// on the CPT data (aliased rows), allocate the pool, emit the common
/// constraints and family-specific clauses, then re-validate the emitted
/// structure defensively.
pub fn encode_with_options(
    network: &BayesianNetwork,
    family: CircuitFamily,
    options: &EncodeOptions,
) -> Result<Encoded> {
    if options.csi && family != CircuitFamily::NwDnnf {
        return Err(Error::Config(format!(
            "context-specific independence is only available for nwDNNF, not {}",
            family
        )));
    }

    // The encoder never attempts to fix an invalid network.
    network.validate()?;

    if family.deterministic() {
        reject_aliased_rows(network, family)?;
    }

    let pool = VarPool::new(network);
    info!(
        "encoding {} as {}: {} indicators, {} parameters",
        network.name(),
        family,
        pool.num_indicators(),
        pool.num_parameters()
    );

    let mut encoder = Encoder {
        network,
        family,
        options,
        cnf: Cnf::new(pool.num_vars()),
        pool,
        groups: Vec::new(),
        stats: EncodeStats::default(),
    };

    encoder.emit_comments();
    encoder.emit_indicator_constraints();
    encoder.emit_row_constraints();
    encoder.validate_structure()?;

    let mut stats = encoder.stats;
    stats.num_indicators = encoder.pool.num_indicators();
    stats.num_parameters = encoder.pool.num_parameters();
    stats.num_clauses = encoder.cnf.num_clauses();
    info!(
        "encoded {} clauses over {} variables ({} zero rows, {} shrunk rows)",
        stats.num_clauses,
        encoder.cnf.num_vars(),
        stats.zero_rows,
        stats.shrunk_rows
    );

    Ok(Encoded {
        cnf: encoder.cnf,
        stats,
    })
}

/// Two distinct nonzero entries with the same (context, value) would yield
/// two parameters that are simultaneously satisfiable, so determinism of the
/// row group cannot hold. Rejected up front with the offending location.
fn reject_aliased_rows(network: &BayesianNetwork, family: CircuitFamily) -> Result<()> {
    for (id, var) in network.variables() {
        let mut seen: BTreeSet<(&[usize], usize)> = BTreeSet::new();
        for row in var.cpt().rows() {
            if row.probability == 0.0 {
                continue;
            }
            if !seen.insert((row.context.as_slice(), row.value)) {
                return Err(Error::NonEncodable(format!(
                    "variable {} has aliased rows for context {} and value {}; \
                     the {} family requires deterministic row groups",
                    var.name(),
                    network.context_label(id, &row.context),
                    var.values()[row.value],
                    family
                )));
            }
        }
    }
    Ok(())
}

/// One OR-group of the induced AND/OR structure: either a variable's
/// indicator block or the parameters of one (variable, context) pair.
struct OrGroup {
    label: String,
    branches: Vec<OrBranch>,
}

struct OrBranch {
    /// The branch's pool identifier.
    id: u32,
    /// Evidence key for the determinism audit: two branches with equal keys
    /// are not mutually exclusive.
    key: (Vec<usize>, usize),
    /// Pool identifiers the branch ranges over, for the smoothness audit.
    scope: BTreeSet<u32>,
}

struct Encoder<'a> {
    network: &'a BayesianNetwork,
    family: CircuitFamily,
    options: &'a EncodeOptions,
    pool: VarPool,
    cnf: Cnf,
    groups: Vec<OrGroup>,
    stats: EncodeStats,
}

impl Encoder<'_> {
    fn emit_comments(&mut self) {
        self.cnf.add_comment(self.network.name().to_string());
        self.cnf.add_comment(format!("circuit family: {}", self.family));
        if self.options.csi {
            self.cnf.add_comment("context-specific independence");
        }
        self.cnf.add_comment("");
        self.cnf.add_comment("indicators:");
        for &id in self.network.topological_order() {
            let var = self.network.variable(id);
            for (v, label) in var.values().iter().enumerate() {
                self.cnf.add_comment(format!(
                    "  {} = {}: {}",
                    var.name(),
                    label,
                    self.pool.indicator(id, v)
                ));
            }
        }
        if self.pool.num_parameters() > 0 {
            self.cnf.add_comment(format!(
                "parameters: {}..={}",
                self.pool.num_indicators() + 1,
                self.pool.num_vars()
            ));
        }
        self.cnf.add_comment("");
    }

    /// Exactly-one over each variable's indicators: one at-least-one clause
    /// plus pairwise at-most-one clauses, for every variable of the network.
    fn emit_indicator_constraints(&mut self) {
        for &id in self.network.topological_order() {
            let var = self.network.variable(id);
            let indicators: Vec<u32> =
                (0..var.domain_size()).map(|v| self.pool.indicator(id, v)).collect();

            self.cnf
                .add_clause(indicators.iter().map(|&i| Lit::positive(i)));
            for i in 0..indicators.len() {
                for j in (i + 1)..indicators.len() {
                    self.cnf
                        .add_clause([Lit::negative(indicators[i]), Lit::negative(indicators[j])]);
                }
            }

            // Every branch of an indicator group ranges over the variable's
            // whole indicator block, via the pairwise clauses.
            let scope: BTreeSet<u32> = indicators.iter().copied().collect();
            self.groups.push(OrGroup {
                label: format!("values of {}", var.name()),
                branches: (0..var.domain_size())
                    .map(|v| OrBranch {
                        id: indicators[v],
                        key: (Vec::new(), v),
                        scope: scope.clone(),
                    })
                    .collect(),
            });
        }
    }

    /// Row activation, zero-row blocking, per-context partitions, and (for
    /// sdDNNF) smoothing clauses.
    fn emit_row_constraints(&mut self) {
        for &id in self.network.topological_order() {
            let var = self.network.variable(id);
            let prob_map = if self.options.csi {
                probability_map(var)
            } else {
                None
            };

            // Row indices grouped by context; BTreeMap keys iterate in
            // canonical lexicographic order.
            let mut by_context: BTreeMap<Vec<usize>, Vec<usize>> = BTreeMap::new();
            for (r, row) in var.cpt().rows().iter().enumerate() {
                by_context.entry(row.context.clone()).or_default().push(r);
            }

            let mut branch_scopes: Vec<BTreeSet<u32>> = vec![BTreeSet::new(); var.cpt().len()];

            for (r, row) in var.cpt().rows().iter().enumerate() {
                let own = self.pool.indicator(id, row.value);

                let Some(p) = self.pool.parameter(id, r) else {
                    // Zero-probability row: no parameter, but the assignment
                    // itself must stay outside the support.
                    let mut lits: Vec<Lit> = row
                        .context
                        .iter()
                        .enumerate()
                        .map(|(k, &c)| Lit::negative(self.pool.indicator(var.parents()[k], c)))
                        .collect();
                    lits.push(Lit::negative(own));
                    self.cnf.add_clause(lits);
                    self.stats.zero_rows += 1;
                    continue;
                };

                // Parent conjuncts of the activation conjunction, possibly
                // shrunk by CSI.
                let kept = match &prob_map {
                    Some(map) => {
                        let dropped = independent_parents(self.network, id, row, map);
                        if !dropped.is_empty() {
                            debug!(
                                "{} row {}: dropping {} independent parents",
                                var.name(),
                                r,
                                dropped.len()
                            );
                            self.stats.shrunk_rows += 1;
                            self.stats.dropped_conjuncts += dropped.len();
                        }
                        (0..row.context.len()).filter(|k| !dropped.contains(k)).collect()
                    }
                    None => (0..row.context.len()).collect::<Vec<_>>(),
                };

                let conjuncts: Vec<u32> = kept
                    .iter()
                    .map(|&k| self.pool.indicator(var.parents()[k], row.context[k]))
                    .chain([own])
                    .collect();

                // conjunction -> p
                let mut core: Vec<Lit> = conjuncts.iter().map(|&i| Lit::negative(i)).collect();
                core.push(Lit::positive(p));
                self.cnf.add_clause(core);

                // p -> each conjunct
                for &i in &conjuncts {
                    self.cnf.add_clause([Lit::negative(p), Lit::positive(i)]);
                }

                let mut scope: BTreeSet<u32> = conjuncts.iter().copied().collect();

                // Smoothing: widen the branch to the variable's full
                // indicator block.
                if self.family.smooth() {
                    for v in 0..var.domain_size() {
                        if v != row.value {
                            let other = self.pool.indicator(id, v);
                            self.cnf.add_clause([Lit::negative(p), Lit::negative(other)]);
                            scope.insert(other);
                        }
                    }
                }

                scope.insert(p);
                branch_scopes[r] = scope;
            }

            // Exactly-one over each context's parameters.
            for (context, row_indices) in &by_context {
                let members: Vec<(usize, u32)> = row_indices
                    .iter()
                    .filter_map(|&r| self.pool.parameter(id, r).map(|p| (r, p)))
                    .collect();
                if members.is_empty() {
                    continue;
                }

                self.cnf
                    .add_clause(members.iter().map(|&(_, p)| Lit::positive(p)));
                for i in 0..members.len() {
                    for j in (i + 1)..members.len() {
                        self.cnf
                            .add_clause([Lit::negative(members[i].1), Lit::negative(members[j].1)]);
                    }
                }

                // The pairwise clauses tie every pair of branches, so each
                // branch ranges over the whole parameter group.
                let group_ids: BTreeSet<u32> = members.iter().map(|&(_, p)| p).collect();
                self.groups.push(OrGroup {
                    label: format!(
                        "rows of {} given {}",
                        var.name(),
                        self.network.context_label(id, context)
                    ),
                    branches: members
                        .iter()
                        .map(|&(r, p)| {
                            let row = &var.cpt().rows()[r];
                            let mut scope = branch_scopes[r].clone();
                            scope.extend(group_ids.iter().copied());
                            OrBranch {
                                id: p,
                                key: (row.context.clone(), row.value),
                                scope,
                            }
                        })
                        .collect(),
                });
            }
        }
    }

    /// Defensive re-validation of the family obligations over what was
    /// actually emitted (step 4 of the encoder pipeline).
    fn validate_structure(&self) -> Result<()> {
        // Negative-scope decomposability: parameters of different network
        // variables never meet in one clause.
        for clause in self.cnf.clauses() {
            let mut owner: Option<VarId> = None;
            for lit in clause.lits() {
                if let Some(var) = self.pool.parameter_owner(lit.var()) {
                    if let Some(prev) = owner {
                        if prev != var {
                            return Err(Error::NonEncodable(format!(
                                "clause {} mixes parameters of {} and {}",
                                clause,
                                self.network.variable(prev).name(),
                                self.network.variable(var).name()
                            )));
                        }
                    }
                    owner = Some(var);
                }
            }
        }

        if self.family.deterministic() {
            for group in &self.groups {
                for i in 0..group.branches.len() {
                    for j in (i + 1)..group.branches.len() {
                        if group.branches[i].key == group.branches[j].key {
                            return Err(Error::NonEncodable(format!(
                                "OR-group {:?} has two branches with identical evidence",
                                group.label
                            )));
                        }
                    }
                }
            }
        }

        if self.family.smooth() {
            for group in &self.groups {
                let first = &group.branches[0].scope;
                for branch in &group.branches[1..] {
                    if &branch.scope != first {
                        return Err(Error::NonEncodable(format!(
                            "OR-group {:?} has branches with differing scopes",
                            group.label
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Probability lookup for one variable, or `None` when the CPT contains
/// aliased entries (CSI shrinking is skipped for such variables, the lookup
/// would be ill-defined).
fn probability_map(var: &Variable) -> Option<BTreeMap<(Vec<usize>, usize), f64>> {
    let mut map = BTreeMap::new();
    for row in var.cpt().rows() {
        if map
            .insert((row.context.clone(), row.value), row.probability)
            .is_some()
        {
            return None;
        }
    }
    Some(map)
}

/// Parent positions that can be dropped from a row's activation conjunction:
/// the row's probability is unchanged under every value of the parent, and
/// jointly so for the whole dropped set.
///
/// Candidates are ordered by domain size (largest first, dropping it saves
/// the most structure), then by parent name, and accepted greedily with
/// re-verification against the already accepted set.
fn independent_parents(
    network: &BayesianNetwork,
    id: VarId,
    row: &crate::network::CptRow,
    prob_map: &BTreeMap<(Vec<usize>, usize), f64>,
) -> BTreeSet<usize> {
    let var = network.variable(id);
    let parent_sizes = network.parent_domain_sizes(id);

    let mut candidates: Vec<usize> = (0..row.context.len())
        .filter(|&k| is_parent_independent(row, prob_map, &parent_sizes, k))
        .collect();
    candidates.sort_by(|&a, &b| {
        parent_sizes[b].cmp(&parent_sizes[a]).then_with(|| {
            let name_a = network.variable(var.parents()[a]).name();
            let name_b = network.variable(var.parents()[b]).name();
            name_a.cmp(name_b)
        })
    });

    let mut accepted: Vec<usize> = Vec::new();
    for &candidate in &candidates {
        if accepted.is_empty() || jointly_independent(row, prob_map, &parent_sizes, candidate, &accepted) {
            accepted.push(candidate);
        }
    }

    accepted.into_iter().collect()
}

/// The row's probability is the same for every value of parent `k`, other
/// conjuncts fixed.
fn is_parent_independent(
    row: &crate::network::CptRow,
    prob_map: &BTreeMap<(Vec<usize>, usize), f64>,
    parent_sizes: &[usize],
    k: usize,
) -> bool {
    let mut context = row.context.clone();
    for value in 0..parent_sizes[k] {
        context[k] = value;
        match prob_map.get(&(context.clone(), row.value)) {
            Some(&p) if p == row.probability => {}
            _ => return false,
        }
    }
    true
}

/// Independence of `candidate` must hold under every joint assignment of the
/// already accepted parents, not just the row's own context.
fn jointly_independent(
    row: &crate::network::CptRow,
    prob_map: &BTreeMap<(Vec<usize>, usize), f64>,
    parent_sizes: &[usize],
    candidate: usize,
    accepted: &[usize],
) -> bool {
    let mut assignment = vec![0usize; accepted.len()];
    loop {
        let mut context = row.context.clone();
        for (pos, &k) in accepted.iter().enumerate() {
            context[k] = assignment[pos];
        }
        let probe = crate::network::CptRow::new(context, row.value, row.probability);
        if !is_parent_independent(&probe, prob_map, parent_sizes, candidate) {
            return false;
        }

        let mut done = true;
        for pos in (0..assignment.len()).rev() {
            assignment[pos] += 1;
            if assignment[pos] < parent_sizes[accepted[pos]] {
                done = false;
                break;
            }
            assignment[pos] = 0;
        }
        if done {
            return true;
        }
    }
}
