//! Dependency graph validation.
//!
//! Runs once, eagerly, inside `Container::build` over the whole registry,
//! including services the caller may never request:
//! - Detects circular dependencies (three-colour DFS)
//! - Produces a topological order, dependencies first
//!
//! Edges pointing at unregistered tags are skipped here. They fail
//! lazily, from `get`, only if something actually needs them.

use std::collections::HashMap;

use tracing::{debug, instrument, trace, warn};

use crate::error::{CircularDependencyError, TabaqaError};
use crate::registry::Registry;
use crate::tag::TagKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// On the current DFS path.
    Gray,
    /// Fully explored.
    Black,
}

/// Validates a [`Registry`] for cycles.
///
/// # Algorithm
/// Depth-first search from every node in registration order. Nodes
/// absent from `colors` are white. Reaching a gray node means the
/// current path loops back on itself.
pub(crate) struct GraphValidator<'a> {
    registry: &'a Registry,
    colors: HashMap<TagKey, Color>,
    /// Current DFS path (for error reporting)
    path: Vec<TagKey>,
    /// Post-order of finished nodes
    order: Vec<TagKey>,
}

impl<'a> GraphValidator<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            colors: HashMap::with_capacity(registry.len()),
            path: Vec::new(),
            order: Vec::with_capacity(registry.len()),
        }
    }

    /// Validates the entire graph.
    ///
    /// Returns every registered tag in a valid construction order:
    /// each tag appears after all of its registered dependencies.
    ///
    /// # Errors
    /// [`TabaqaError::CircularDependency`] naming the first re-entered tag.
    #[instrument(skip(self), name = "graph_validation")]
    pub fn validate(mut self) -> Result<Vec<TagKey>, TabaqaError> {
        let registry = self.registry;
        debug!(node_count = registry.len(), "Starting dependency graph validation");

        for key in registry.nodes() {
            if !self.colors.contains_key(key) {
                self.visit(key)?;
            }
        }

        debug!("Dependency graph validation passed ✓");
        Ok(self.order)
    }

    /// Explores everything reachable from `root` using an explicit stack
    /// of `(node, next edge)` frames, so long chains never recurse.
    fn visit(&mut self, root: &TagKey) -> Result<(), TabaqaError> {
        let registry = self.registry;
        self.enter(root);
        let mut frames: Vec<(TagKey, usize)> = vec![(root.clone(), 0)];

        while let Some((key, next)) = frames.last_mut() {
            let Some(dep) = registry.edges(key).get(*next) else {
                let key = key.clone();
                frames.pop();
                self.finish(key);
                continue;
            };
            *next += 1;

            match self.colors.get(dep).copied() {
                Some(Color::Black) => {}
                Some(Color::Gray) => return Err(self.cycle_error(dep)),
                None if registry.contains(dep) => {
                    self.enter(dep);
                    frames.push((dep.clone(), 0));
                }
                None => trace!(tag = %key, dependency = %dep, "Unregistered dependency, deferred to get"),
            }
        }
        Ok(())
    }

    fn enter(&mut self, key: &TagKey) {
        self.colors.insert(key.clone(), Color::Gray);
        self.path.push(key.clone());
    }

    fn finish(&mut self, key: TagKey) {
        self.path.pop();
        self.colors.insert(key.clone(), Color::Black);
        self.order.push(key);
    }

    fn cycle_error(&self, reentered: &TagKey) -> TabaqaError {
        let start = self.path.iter().position(|k| k == reentered).unwrap_or(0);

        let mut chain: Vec<String> = self.path[start..]
            .iter()
            .map(|k| k.name().to_string())
            .collect();
        chain.push(reentered.name().to_string());

        warn!(tag = %reentered, cycle = ?chain, "Circular dependency detected!");

        TabaqaError::CircularDependency(CircularDependencyError {
            tag: reentered.name().to_string(),
            chain,
        })
    }
}
