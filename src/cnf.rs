//! CNF formula representation and DIMACS I/O.
//!
//! # DIMACS CNF Format
//!
//! ```text
//! c <comment lines>
//! p cnf <num_vars> <num_clauses>
//! <lit> <lit> ... 0        # one line per clause
//! ```
//!
//! The writer guarantees that the header counts match the emitted formula
//! exactly: `num_vars` is the allocated identifier range and the clause count
//! is the number of clause lines. Writing happens only after the formula is
//! fully built in memory.

use std::fmt;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::Lit;

/// A disjunction of literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    lits: Vec<Lit>,
}

impl Clause {
    pub fn new(lits: Vec<Lit>) -> Self {
        debug_assert!(!lits.is_empty(), "clauses must not be empty");
        Self { lits }
    }

    pub fn lits(&self) -> &[Lit] {
        &self.lits
    }

    pub fn len(&self) -> usize {
        self.lits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lits.is_empty()
    }

    /// True if the clause mentions the given pool identifier (any polarity).
    pub fn mentions(&self, id: u32) -> bool {
        self.lits.iter().any(|lit| lit.var() == id)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for lit in &self.lits {
            write!(f, "{} ", lit)?;
        }
        write!(f, "0")
    }
}

/// A CNF formula over a fixed identifier range.
#[derive(Debug, Clone, PartialEq)]
pub struct Cnf {
    num_vars: u32,
    clauses: Vec<Clause>,
    comments: Vec<String>,
}

impl Cnf {
    /// Creates an empty formula over identifiers `1..=num_vars`.
    pub fn new(num_vars: u32) -> Self {
        Self {
            num_vars,
            clauses: Vec::new(),
            comments: Vec::new(),
        }
    }

    /// Appends a comment line (without the leading `c `).
    pub fn add_comment(&mut self, line: impl Into<String>) {
        self.comments.push(line.into());
    }

    pub fn add_clause(&mut self, lits: impl IntoIterator<Item = Lit>) {
        let clause = Clause::new(lits.into_iter().collect());
        debug_assert!(
            clause.lits().iter().all(|lit| lit.var() <= self.num_vars),
            "clause mentions an identifier outside the allocated range"
        );
        self.clauses.push(clause);
    }

    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Largest identifier actually mentioned by a clause.
    pub fn max_var(&self) -> u32 {
        self.clauses
            .iter()
            .flat_map(|clause| clause.lits().iter())
            .map(|lit| lit.var())
            .max()
            .unwrap_or(0)
    }

    /// Serializes the formula to DIMACS CNF.
    pub fn to_dimacs_string(&self) -> String {
        let mut output = String::new();

        for comment in &self.comments {
            if comment.is_empty() {
                writeln!(output, "c").unwrap();
            } else {
                writeln!(output, "c {}", comment).unwrap();
            }
        }

        writeln!(output, "p cnf {} {}", self.num_vars, self.clauses.len()).unwrap();
        for clause in &self.clauses {
            writeln!(output, "{}", clause).unwrap();
        }

        output
    }

    /// Writes the formula to a file in DIMACS CNF format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_dimacs_string())?;
        Ok(())
    }

    /// Parses a DIMACS CNF string.
    ///
    /// Comments are collected, the problem line is required before any
    /// clause, and every clause line must be terminated by 0. A literal
    /// outside the declared identifier range is an error; a clause-count
    /// mismatch only warns, like most DIMACS consumers.
    pub fn from_dimacs_string(content: &str) -> Result<Cnf> {
        let mut cnf: Option<Cnf> = None;
        let mut comments = Vec::new();

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix('c') {
                comments.push(rest.trim_start().to_string());
                continue;
            }

            if line.starts_with('p') {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() != 4 || parts[1] != "cnf" {
                    return Err(Error::Parse(format!(
                        "line {}: invalid problem line: {}",
                        line_num + 1,
                        line
                    )));
                }
                let num_vars: u32 = parts[2].parse().map_err(|_| {
                    Error::Parse(format!("line {}: invalid variable count", line_num + 1))
                })?;
                let _num_clauses: usize = parts[3].parse().map_err(|_| {
                    Error::Parse(format!("line {}: invalid clause count", line_num + 1))
                })?;
                let mut parsed = Cnf::new(num_vars);
                parsed.comments = std::mem::take(&mut comments);
                cnf = Some(parsed);
                continue;
            }

            let cnf = cnf.as_mut().ok_or_else(|| {
                Error::Parse(format!(
                    "line {}: clause before problem line",
                    line_num + 1
                ))
            })?;

            let values: std::result::Result<Vec<i32>, _> =
                line.split_whitespace().map(|s| s.parse::<i32>()).collect();
            let mut values = values.map_err(|_| {
                Error::Parse(format!("line {}: invalid literal in: {}", line_num + 1, line))
            })?;

            if values.pop() != Some(0) {
                return Err(Error::Parse(format!(
                    "line {}: clause not terminated by 0",
                    line_num + 1
                )));
            }
            if values.is_empty() {
                return Err(Error::Parse(format!("line {}: empty clause", line_num + 1)));
            }
            for &v in &values {
                if v.unsigned_abs() > cnf.num_vars {
                    return Err(Error::Parse(format!(
                        "line {}: literal {} outside declared range 1..={}",
                        line_num + 1,
                        v,
                        cnf.num_vars
                    )));
                }
            }
            cnf.clauses
                .push(Clause::new(values.into_iter().map(Lit::from_dimacs).collect()));
        }

        let cnf = cnf.ok_or_else(|| Error::Parse("missing problem line".to_string()))?;
        Ok(cnf)
    }

    /// Reads a DIMACS CNF file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Cnf> {
        let content = fs::read_to_string(path)?;
        Self::from_dimacs_string(&content)
    }
}
