//! Service lifecycle scopes.
//!
//! - [`Scope::Singleton`] — built once, memoized for the container's life
//! - [`Scope::Transient`] — built fresh on every `get`

use std::fmt;

/// Defines how long a factory-built service lives within the container.
///
/// # Examples
/// ```
/// use tabaqa_container::scope::Scope;
///
/// assert_eq!(Scope::default(), Scope::Singleton);
/// assert!(!Scope::Transient.is_cached());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// One instance shared by every `get` on the container.
    ///
    /// Built on first access and kept until `dispose()`.
    ///
    /// # When to use
    /// - Connection pools
    /// - Configuration objects
    /// - Shared caches
    #[default]
    Singleton,

    /// New instance on every `get` call.
    ///
    /// Never reused, but still tracked so its dispose hook runs on
    /// teardown.
    Transient,
}

impl Scope {
    /// Returns `true` if instances of this scope are memoized.
    #[inline]
    pub fn is_cached(&self) -> bool {
        matches!(self, Scope::Singleton)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Singleton => write!(f, "Singleton"),
            Scope::Transient => write!(f, "Transient"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_singleton() {
        assert_eq!(Scope::default(), Scope::Singleton);
    }

    #[test]
    fn only_singleton_is_cached() {
        assert!(Scope::Singleton.is_cached());
        assert!(!Scope::Transient.is_cached());
    }

    #[test]
    fn scope_display() {
        assert_eq!(format!("{}", Scope::Singleton), "Singleton");
        assert_eq!(format!("{}", Scope::Transient), "Transient");
    }
}
