//! BIF (Bayesian Interchange Format) reading and writing.
//!
//! Implements the textual subset the generator emits and the encoder
//! consumes:
//!
//! ```text
//! network <name> {}
//! variable <Name> {
//!   type discrete [ <n> ] { <value>, ... };
//! }
//! probability ( <Name> ) {            # no parents
//!   table <p>, ...;
//! }
//! probability ( <Name> | <Parent>, ... ) {
//!   ( <parent value>, ... ) <p>, ...;
//!   ...
//! }
//! ```
//!
//! The writer emits variables in arena order and CPT rows in canonical
//! context order, so `read(write(network))` reproduces the network exactly
//! for canonically ordered inputs (and up to canonical reordering
//! otherwise). Aliased CPT rows have no grouped textual form and are
//! rejected by the writer.

use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::network::{BayesianNetwork, Cpt, CptRow, NetworkBuilder};

impl BayesianNetwork {
    /// Serializes the network to BIF.
    pub fn to_bif_string(&self) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "network {} {{}}", self.name()).unwrap();

        for (_, var) in self.variables() {
            writeln!(output, "variable {} {{", var.name()).unwrap();
            writeln!(
                output,
                "  type discrete [ {} ] {{ {} }};",
                var.domain_size(),
                var.values().join(", ")
            )
            .unwrap();
            writeln!(output, "}}").unwrap();
        }

        for (id, var) in self.variables() {
            // One probability vector per context; aliased rows cannot be
            // grouped this way.
            let mut vectors: BTreeMap<Vec<usize>, Vec<Option<f64>>> = BTreeMap::new();
            for row in var.cpt().rows() {
                let vector = vectors
                    .entry(row.context.clone())
                    .or_insert_with(|| vec![None; var.domain_size()]);
                if vector[row.value].replace(row.probability).is_some() {
                    return Err(Error::Network(format!(
                        "variable {} has aliased rows for context {}; not serializable as BIF",
                        var.name(),
                        self.context_label(id, &row.context)
                    )));
                }
            }

            if var.parents().is_empty() {
                writeln!(output, "probability ( {} ) {{", var.name()).unwrap();
            } else {
                let parent_names: Vec<&str> = var
                    .parents()
                    .iter()
                    .map(|&p| self.variable(p).name())
                    .collect();
                writeln!(
                    output,
                    "probability ( {} | {} ) {{",
                    var.name(),
                    parent_names.join(", ")
                )
                .unwrap();
            }

            for (context, vector) in &vectors {
                // A missing (context, value) entry is an implicit zero.
                let probs: Vec<String> = vector
                    .iter()
                    .map(|p| format!("{:?}", p.unwrap_or(0.0)))
                    .collect();
                if var.parents().is_empty() {
                    writeln!(output, "  table {};", probs.join(", ")).unwrap();
                } else {
                    let labels: Vec<&str> = var
                        .parents()
                        .iter()
                        .zip(context.iter())
                        .map(|(&p, &k)| self.variable(p).values()[k].as_str())
                        .collect();
                    writeln!(output, "  ( {} ) {};", labels.join(", "), probs.join(", ")).unwrap();
                }
            }
            writeln!(output, "}}").unwrap();
        }

        Ok(output)
    }

    /// Writes the network to a BIF file.
    pub fn save_bif<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_bif_string()?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Parses a network from BIF text. The result has passed full network
    /// validation.
    pub fn from_bif_string(content: &str) -> Result<BayesianNetwork> {
        Parser::new(content).parse()
    }

    /// Reads a network from a BIF file.
    pub fn load_bif<P: AsRef<Path>>(path: P) -> Result<BayesianNetwork> {
        let content = fs::read_to_string(path)?;
        Self::from_bif_string(&content)
    }
}

const PUNCTUATION: &[char] = &['{', '}', '(', ')', '[', ']', ',', ';', '|'];

/// Recursive-descent parser over a flat token stream.
struct Parser {
    /// `(token, line)` pairs; punctuation tokens are single characters.
    tokens: Vec<(String, usize)>,
    pos: usize,
}

impl Parser {
    fn new(content: &str) -> Self {
        let mut tokens = Vec::new();
        for (line_idx, line) in content.lines().enumerate() {
            let line_num = line_idx + 1;
            let mut word = String::new();
            for c in line.chars() {
                if c.is_whitespace() || PUNCTUATION.contains(&c) {
                    if !word.is_empty() {
                        tokens.push((std::mem::take(&mut word), line_num));
                    }
                    if PUNCTUATION.contains(&c) {
                        tokens.push((c.to_string(), line_num));
                    }
                } else {
                    word.push(c);
                }
            }
            if !word.is_empty() {
                tokens.push((word, line_num));
            }
        }
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<String> {
        self.tokens.get(self.pos).map(|(t, _)| t.clone())
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos.min(self.tokens.len().saturating_sub(1)))
            .map(|&(_, line)| line)
            .unwrap_or(0)
    }

    fn next(&mut self) -> Result<String> {
        let (token, _) = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| Error::Parse("unexpected end of input".to_string()))?;
        self.pos += 1;
        Ok(token.clone())
    }

    fn expect(&mut self, expected: &str) -> Result<()> {
        let line = self.line();
        let token = self.next()?;
        if token != expected {
            return Err(Error::Parse(format!(
                "line {}: expected {:?}, found {:?}",
                line, expected, token
            )));
        }
        Ok(())
    }

    fn parse(mut self) -> Result<BayesianNetwork> {
        self.expect("network")?;
        let name = self.next()?;
        self.expect("{")?;
        // Skip network properties, if any.
        let mut depth = 1;
        while depth > 0 {
            match self.next()?.as_str() {
                "{" => depth += 1,
                "}" => depth -= 1,
                _ => {}
            }
        }

        let mut builder = NetworkBuilder::new(name);
        // Domains by declaration order, for label resolution.
        let mut domains: Vec<Vec<String>> = Vec::new();
        let mut has_cpt: Vec<bool> = Vec::new();

        while let Some(token) = self.peek() {
            match token.as_str() {
                "variable" => {
                    let values = self.parse_variable(&mut builder)?;
                    domains.push(values);
                    has_cpt.push(false);
                }
                "probability" => self.parse_probability(&mut builder, &domains, &mut has_cpt)?,
                _ => {
                    return Err(Error::Parse(format!(
                        "line {}: expected \"variable\" or \"probability\", found {:?}",
                        self.line(),
                        token
                    )));
                }
            }
        }

        builder.finish()
    }

    fn parse_variable(&mut self, builder: &mut NetworkBuilder) -> Result<Vec<String>> {
        self.expect("variable")?;
        let name = self.next()?;
        self.expect("{")?;
        self.expect("type")?;
        self.expect("discrete")?;
        self.expect("[")?;
        let line = self.line();
        let declared: usize = self.next()?.parse().map_err(|_| {
            Error::Parse(format!("line {}: invalid domain size", line))
        })?;
        self.expect("]")?;
        self.expect("{")?;

        let mut values = Vec::new();
        loop {
            values.push(self.next()?);
            match self.next()?.as_str() {
                "," => continue,
                "}" => break,
                token => {
                    return Err(Error::Parse(format!(
                        "line {}: expected \",\" or \"}}\" in domain list, found {:?}",
                        self.line(),
                        token
                    )));
                }
            }
        }
        self.expect(";")?;
        self.expect("}")?;

        if values.len() != declared {
            return Err(Error::Parse(format!(
                "variable {} declares {} values but lists {}",
                name,
                declared,
                values.len()
            )));
        }

        builder.add_variable(name, values.clone())?;
        Ok(values)
    }

    fn parse_probability(
        &mut self,
        builder: &mut NetworkBuilder,
        domains: &[Vec<String>],
        has_cpt: &mut [bool],
    ) -> Result<()> {
        self.expect("probability")?;
        self.expect("(")?;
        let child_name = self.next()?;
        let child = builder.find(&child_name).ok_or_else(|| {
            Error::Network(format!(
                "probability block references undeclared variable {}",
                child_name
            ))
        })?;

        let mut parents = Vec::new();
        if self.peek().as_deref() == Some("|") {
            self.next()?;
            loop {
                let parent_name = self.next()?;
                let parent = builder.find(&parent_name).ok_or_else(|| {
                    Error::Network(format!(
                        "variable {} references undeclared parent {}",
                        child_name, parent_name
                    ))
                })?;
                parents.push(parent);
                match self.next()?.as_str() {
                    "," => continue,
                    ")" => break,
                    token => {
                        return Err(Error::Parse(format!(
                            "line {}: expected \",\" or \")\" in parent list, found {:?}",
                            self.line(),
                            token
                        )));
                    }
                }
            }
        } else {
            self.expect(")")?;
        }

        if has_cpt[child.index()] {
            return Err(Error::Network(format!(
                "probability block for {} declared twice",
                child_name
            )));
        }
        has_cpt[child.index()] = true;

        let domain_size = domains[child.index()].len();
        self.expect("{")?;
        let mut rows = Vec::new();

        while self.peek().as_deref() != Some("}") {
            let context = match self.peek().as_deref() {
                Some("table") => {
                    self.next()?;
                    if !parents.is_empty() {
                        return Err(Error::Parse(format!(
                            "line {}: \"table\" row in a conditional block for {}",
                            self.line(),
                            child_name
                        )));
                    }
                    Vec::new()
                }
                Some("(") => {
                    self.next()?;
                    let mut context = Vec::new();
                    loop {
                        let label = self.next()?;
                        let k = context.len();
                        if k >= parents.len() {
                            return Err(Error::Parse(format!(
                                "line {}: context for {} has more entries than parents",
                                self.line(),
                                child_name
                            )));
                        }
                        let value = domains[parents[k].index()]
                            .iter()
                            .position(|v| *v == label)
                            .ok_or_else(|| {
                                Error::Network(format!(
                                    "context for {} uses unknown value {:?}",
                                    child_name, label
                                ))
                            })?;
                        context.push(value);
                        match self.next()?.as_str() {
                            "," => continue,
                            ")" => break,
                            token => {
                                return Err(Error::Parse(format!(
                                    "line {}: expected \",\" or \")\" in context, found {:?}",
                                    self.line(),
                                    token
                                )));
                            }
                        }
                    }
                    if context.len() != parents.len() {
                        return Err(Error::Parse(format!(
                            "context for {} has {} entries, expected {}",
                            child_name,
                            context.len(),
                            parents.len()
                        )));
                    }
                    context
                }
                other => {
                    return Err(Error::Parse(format!(
                        "line {}: expected \"table\", \"(\" or \"}}\", found {:?}",
                        self.line(),
                        other.unwrap_or("end of input")
                    )));
                }
            };

            let mut probs = Vec::new();
            loop {
                let line = self.line();
                let token = self.next()?;
                let p: f64 = token.parse().map_err(|_| {
                    Error::Parse(format!("line {}: invalid probability {:?}", line, token))
                })?;
                probs.push(p);
                match self.next()?.as_str() {
                    "," => continue,
                    ";" => break,
                    token => {
                        return Err(Error::Parse(format!(
                            "line {}: expected \",\" or \";\" after probability, found {:?}",
                            self.line(),
                            token
                        )));
                    }
                }
            }
            if probs.len() != domain_size {
                return Err(Error::Network(format!(
                    "variable {} lists {} probabilities for context {:?}, expected {}",
                    child_name,
                    probs.len(),
                    context,
                    domain_size
                )));
            }

            for (value, p) in probs.into_iter().enumerate() {
                rows.push(CptRow::new(context.clone(), value, p));
            }
        }
        self.expect("}")?;

        builder.set_parents(child, parents);
        builder.set_cpt(child, Cpt::new(rows));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::{generate, LayeredShape};

    fn chain() -> BayesianNetwork {
        let mut builder = NetworkBuilder::new("chain");
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
                CptRow::new(vec![0], 0, 0.1),
                CptRow::new(vec![0], 1, 0.9),
                CptRow::new(vec![1], 0, 0.6),
                CptRow::new(vec![1], 1, 0.4),
            ]),
        );
        builder.finish().unwrap()
    }

    #[test]
    fn test_writer_format() {
        let s = chain().to_bif_string().unwrap();
        assert!(s.contains("network chain {}"));
        assert!(s.contains("variable X {"));
        assert!(s.contains("  type discrete [ 2 ] { x1, x2 };"));
        assert!(s.contains("probability ( X ) {"));
        assert!(s.contains("  table 0.3, 0.7;"));
        assert!(s.contains("probability ( Y | X ) {"));
        assert!(s.contains("  ( x1 ) 0.1, 0.9;"));
        assert!(s.contains("  ( x2 ) 0.6, 0.4;"));
    }

    #[test]
    fn test_roundtrip_chain() {
        let network = chain();
        let parsed =
            BayesianNetwork::from_bif_string(&network.to_bif_string().unwrap()).unwrap();
        assert_eq!(parsed, network);
    }

    #[test]
    fn test_roundtrip_generated() {
        let generated = generate(&LayeredShape::new(3, 3, 2, 60).with_seed(11)).unwrap();
        let s = generated.network.to_bif_string().unwrap();
        let parsed = BayesianNetwork::from_bif_string(&s).unwrap();
        assert_eq!(parsed, generated.network);
        // Writing again is byte-identical.
        assert_eq!(parsed.to_bif_string().unwrap(), s);
    }

    #[test]
    fn test_undeclared_parent_rejected() {
        let content = "\
network broken {}
variable X {
  type discrete [ 2 ] { x1, x2 };
}
probability ( X | Ghost ) {
  ( g1 ) 0.5, 0.5;
}
";
        let err = BayesianNetwork::from_bif_string(content).unwrap_err();
        assert!(matches!(err, Error::Network(_)), "got {:?}", err);
        assert!(err.to_string().contains("Ghost"));
    }

    #[test]
    fn test_bad_probability_count_rejected() {
        let content = "\
network broken {}
variable X {
  type discrete [ 2 ] { x1, x2 };
}
probability ( X ) {
  table 0.5, 0.25, 0.25;
}
";
        let err = BayesianNetwork::from_bif_string(content).unwrap_err();
        assert!(err.to_string().contains("expected 2"));
    }

    #[test]
    fn test_syntax_error_has_line() {
        let content = "\
network broken {}
variable X {
  type discrete [ 2 ] { x1, x2 };
}
probability ( X ) {
  table 0.5 0.5;
}
";
        let err = BayesianNetwork::from_bif_string(content).unwrap_err();
        assert!(matches!(err, Error::Parse(_)), "got {:?}", err);
        assert!(err.to_string().contains("line 6"));
    }

    #[test]
    fn test_aliased_rows_not_serializable() {
        let mut builder = NetworkBuilder::new("alias");
        let x = builder
            .add_variable("X", vec!["x1".into(), "x2".into()])
            .unwrap();
        builder.set_cpt(
            x,
            Cpt::new(vec![
                CptRow::new(vec![], 0, 0.25),
                CptRow::new(vec![], 0, 0.25),
                CptRow::new(vec![], 1, 0.5),
            ]),
        );
        let network = builder.finish().unwrap();
        assert!(network.to_bif_string().is_err());
    }
}
