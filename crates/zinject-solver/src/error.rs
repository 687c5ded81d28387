use thiserror::Error;

use crate::external::ProtocolError;

#[derive(Error, Debug)]
pub enum SolverError {
    // Search outcomes
    #[error("{0}")]
    Unsatisfiable(String),

    #[error("Dependency cycle detected: {0}")]
    DependencyCycle(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("Solver run was cancelled")]
    Cancelled,

    // Caller errors
    #[error("Invalid requirements: {0}")]
    InvalidRequirements(String),

    #[error("Invalid feed URI \"{0}\"")]
    InvalidUri(String),

    #[error("Invalid version: {0}")]
    Version(#[from] zinject_version::VersionError),

    // Feed errors
    #[error("Failed to load feed {uri}: {message}")]
    Feed { uri: String, message: String },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // External solver errors
    #[error("External solver protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("External solver reported: {0}")]
    Remote(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SolverError {
    pub fn no_solution() -> Self {
        SolverError::Unsatisfiable("No solution found".to_string())
    }

    pub fn too_complex() -> Self {
        SolverError::Unsatisfiable("Dependency graph too complex".to_string())
    }

    pub fn feed(uri: impl ToString, message: impl ToString) -> Self {
        SolverError::Feed { uri: uri.to_string(), message: message.to_string() }
    }

    /// Transport-class failures: the backend could not be reached, spoke
    /// garbage or replied with `fail`
    pub fn is_network_error(&self) -> bool {
        matches!(self, SolverError::Protocol(_) | SolverError::Remote(_) | SolverError::Io(_))
    }

    /// Whether a different backend might do better than the one that raised this
    pub fn allows_fallback(&self) -> bool {
        !matches!(self, SolverError::Cancelled | SolverError::InvalidRequirements(_))
    }
}

pub type Result<T> = std::result::Result<T, SolverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(SolverError::no_solution().to_string(), "No solution found");
        assert_eq!(SolverError::too_complex().to_string(), "Dependency graph too complex");
        assert_eq!(
            SolverError::feed("http://example.com/a.xml", "not cached").to_string(),
            "Failed to load feed http://example.com/a.xml: not cached"
        );
    }

    #[test]
    fn test_error_classification() {
        let io = SolverError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe"));
        assert!(io.is_network_error());
        assert!(io.allows_fallback());
        assert!(SolverError::Remote("No solution found for app".into()).is_network_error());
        assert!(!SolverError::no_solution().is_network_error());
        assert!(!SolverError::feed("http://test/a.xml", "not cached").is_network_error());
        assert!(SolverError::no_solution().allows_fallback());
        assert!(!SolverError::Cancelled.allows_fallback());
        assert!(!SolverError::InvalidRequirements("empty".into()).allows_fallback());
    }
}
