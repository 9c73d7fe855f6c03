//! Error types for Tabaqa container operations.
//!
//! Construction-time failures ([`TabaqaError::DuplicateTag`],
//! [`TabaqaError::CircularDependency`]) abort `Container::build`.
//! Lookup failures abort a single `get`. Dispose failures are collected
//! and reported together once every hook has settled.

use std::fmt;

use tabaqa_support::rendering::{render_chain, render_list};

/// Boxed error returned by fallible factories and dispose hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all Tabaqa operations.
#[derive(Debug, thiserror::Error)]
pub enum TabaqaError {
    /// The same tag was registered more than once without
    /// `allow_duplicates`.
    #[error("{}", .0)]
    DuplicateTag(DuplicateTagError),

    /// The dependency graph contains a cycle.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// A requested tag, or one of its transitive dependencies, has no
    /// layer.
    #[error("{}", .0)]
    ServiceNotFound(ServiceNotFoundError),

    /// A factory reported an error, or produced a value of the wrong type.
    #[error("Failed to construct {tag}: {source}")]
    ConstructionFailed {
        tag: String,
        #[source]
        source: BoxError,
    },

    /// One or more dispose hooks failed.
    #[error("{}", .0)]
    DisposeFailed(DisposeError),
}

/// Tags registered more than once in a merge tree.
#[derive(Debug)]
pub struct DuplicateTagError {
    /// Every duplicated tag name, in first-registration order.
    pub names: Vec<String>,
}

impl fmt::Display for DuplicateTagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duplicate tags in layer: {}", render_list(&self.names))?;
        write!(
            f,
            "\n  Hint: merge with MergeOptions::new().allow_duplicates(true) to let the last layer win"
        )
    }
}

/// A dependency cycle found while validating the graph.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// The tag that was re-entered while still being visited.
    pub tag: String,
    /// Path from `tag` back to itself, e.g. `["A", "B", "A"]`.
    pub chain: Vec<String>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Circular dependency detected at {}:\n  ", self.tag)?;
        write!(f, "{}", render_chain(&self.chain))?;
        write!(
            f,
            "\n  Hint: break the cycle by passing one of the services in as a value layer"
        )
    }
}

/// A tag with no registered layer.
#[derive(Debug)]
pub struct ServiceNotFoundError {
    /// Name of the missing tag.
    pub requested: String,
    /// The service whose factory declared the missing dependency.
    pub required_by: Option<String>,
    /// Registered tags with similar names.
    pub suggestions: Vec<String>,
}

impl fmt::Display for ServiceNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service not found: {}", self.requested)?;

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: merge a layer providing {} into the container's root layer",
            self.requested
        )
    }
}

/// Aggregate of every dispose hook that failed.
#[derive(Debug)]
pub struct DisposeError {
    pub failures: Vec<DisposeFailure>,
}

impl fmt::Display for DisposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dispose hook(s) failed:", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  - {}: {}", failure.tag, failure.source)?;
        }
        Ok(())
    }
}

/// A single failed dispose hook.
#[derive(Debug)]
pub struct DisposeFailure {
    /// Tag of the instance whose hook failed.
    pub tag: String,
    /// The hook's error, or a description of its panic.
    pub source: BoxError,
}

/// Convenient Result type for Tabaqa operations.
pub type Result<T, E = TabaqaError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_tag_lists_every_name() {
        let err = TabaqaError::DuplicateTag(DuplicateTagError {
            names: vec!["Config".into(), "Database".into()],
        });

        let msg = format!("{err}");
        assert!(msg.contains("Config, Database"));
        assert!(msg.contains("allow_duplicates"));
    }

    #[test]
    fn circular_dependency_display() {
        let err = TabaqaError::CircularDependency(CircularDependencyError {
            tag: "A".into(),
            chain: vec!["A".into(), "B".into(), "A".into()],
        });

        let msg = format!("{err}");
        assert!(msg.contains("Circular"));
        assert!(msg.contains("A → B → A"));
    }

    #[test]
    fn service_not_found_display() {
        let err = TabaqaError::ServiceNotFound(ServiceNotFoundError {
            requested: "Config".into(),
            required_by: Some("Database".into()),
            suggestions: vec!["config".into()],
        });

        let msg = format!("{err}");
        assert!(msg.contains("Service not found: Config"));
        assert!(msg.contains("Required by: Database"));
        assert!(msg.contains("- config"));
    }

    #[test]
    fn construction_failed_keeps_source() {
        use std::error::Error as _;

        let err = TabaqaError::ConstructionFailed {
            tag: "Database".into(),
            source: "connection refused".into(),
        };

        assert!(err.to_string().contains("Database"));
        assert_eq!(err.source().map(ToString::to_string), Some("connection refused".into()));
    }

    #[test]
    fn dispose_error_counts_failures() {
        let err = TabaqaError::DisposeFailed(DisposeError {
            failures: vec![
                DisposeFailure { tag: "Database".into(), source: "flush failed".into() },
                DisposeFailure { tag: "Cache".into(), source: "already closed".into() },
            ],
        });

        let msg = format!("{err}");
        assert!(msg.starts_with("2 dispose hook(s) failed"));
        assert!(msg.contains("Database: flush failed"));
    }
}
