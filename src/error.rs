//! Error types for network construction, generation, and encoding.
//!
//! Every error is terminal for the current invocation: nothing is retried,
//! and nothing is silently degraded (in particular, a family obligation that
//! cannot be met surfaces as [`Error::NonEncodable`] rather than falling back
//! to a weaker family).

use std::fmt;
use std::io;

/// Error type for all fallible operations in this crate.
#[derive(Debug)]
pub enum Error {
    /// Invalid configuration (shape parameters, density, option/family
    /// combinations). Rejected before any work starts.
    Config(String),
    /// A structurally invalid Bayesian network: bad row sums, cyclic parent
    /// graph, dangling references. Rejected before encoding starts.
    Network(String),
    /// A requested circuit family's structural obligation cannot be met for
    /// this network.
    NonEncodable(String),
    /// Syntax error in a BIF or DIMACS file.
    Parse(String),
    /// File I/O error, surfaced verbatim.
    Io(io::Error),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Network(msg) => write!(f, "Malformed network: {}", msg),
            Error::NonEncodable(msg) => write!(f, "Non-encodable: {}", msg),
            Error::Parse(msg) => write!(f, "Parse error: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = Error::Config("density must be in 1..=100, got 0".to_string());
        assert_eq!(
            e.to_string(),
            "Configuration error: density must be in 1..=100, got 0"
        );

        let e = Error::NonEncodable("duplicated row".to_string());
        assert!(e.to_string().starts_with("Non-encodable"));
    }

    #[test]
    fn test_io_source() {
        use std::error::Error as _;
        let e = Error::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(e.source().is_some());
    }
}
