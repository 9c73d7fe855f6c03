//! # The Container — heart of Tabaqa
//!
//! Owns one validated service graph and resolves it lazily.
//!
//! # Architecture
//! ```text
//! Layer ──Container::build()──> Registry ──GraphValidator──> Container
//!                                                               │
//!                                                  get(&tag) ───┤ (lazy, memoized)
//!                                                               │
//!                                                  dispose() ───┘ (async, all hooks)
//! ```
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use tabaqa_container::prelude::*;
//!
//! struct Config { timeout: u64 }
//! struct Database { timeout: u64 }
//! struct UserService { db: Arc<Database> }
//!
//! let config = Tag::<Config>::new("Config");
//! let database = Tag::<Database>::new("Database");
//! let users = Tag::<UserService>::new("UserService");
//!
//! let container = Container::build(&Layer::merge([
//!     Layer::value(&config, Config { timeout: 5000 }),
//!     Layer::factory(&database, config.clone(), |c: Arc<Config>| Database { timeout: c.timeout }),
//!     Layer::factory(&users, database.clone(), |db: Arc<Database>| UserService { db }),
//! ]))
//! .expect("Failed to build container");
//!
//! let service = container.get(&users).expect("Failed to resolve");
//! assert_eq!(service.db.timeout, 5000);
//! assert!(Arc::ptr_eq(&service, &container.get(&users).unwrap()));
//! ```

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tabaqa_support::rendering::suggest_similar;
use tracing::{debug, info, instrument, trace, warn};

use crate::dispose::DisposeFn;
use crate::error::{
    BoxError, DisposeError, DisposeFailure, Result, ServiceNotFoundError, TabaqaError,
};
use crate::graph::GraphValidator;
use crate::layer::{FactoryLayer, Instance, Layer};
use crate::registry::{Registration, Registry};
use crate::scope::Scope;
use crate::tag::{Tag, TagKey};

const MAX_SUGGESTIONS: usize = 3;

// ═══════════════════════════════════════════
// Runtime state
// ═══════════════════════════════════════════

/// A built instance whose dispose hook is still pending.
struct ServiceRecord {
    tag: TagKey,
    scope: Scope,
    instance: Instance,
    dispose: DisposeFn,
}

/// The only mutable state of a container.
#[derive(Default)]
struct RuntimeState {
    /// One cell per singleton tag. Cells are handed out under the lock
    /// and initialised outside it, so recursive resolution never blocks
    /// on the mutex and a singleton is built at most once.
    singletons: HashMap<TagKey, Arc<OnceCell<Instance>>>,
    /// Disposable instances in creation order, both scopes.
    disposal_log: Vec<ServiceRecord>,
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

/// Dependency injection container over one immutable service graph.
///
/// Created by [`Container::build`]. `get` may be called from any thread;
/// the graph is read-only and the singleton memo and disposal log are
/// behind a mutex.
pub struct Container {
    registry: Arc<Registry>,
    /// Topological order computed during validation
    order: Vec<TagKey>,
    state: Mutex<RuntimeState>,
}

impl Container {
    /// Flattens and validates `root`, returning a ready container.
    ///
    /// Nothing is instantiated here.
    ///
    /// # Errors
    /// - [`TabaqaError::DuplicateTag`] — a tag repeats without `allow_duplicates`
    /// - [`TabaqaError::CircularDependency`] — anywhere in the graph
    #[instrument(skip_all, name = "container_build")]
    pub fn build(root: &Layer) -> Result<Container> {
        let registry = Registry::from_layer(root)?;
        info!(registered = registry.len(), "Building container");

        let order = GraphValidator::new(&registry).validate()?;

        info!("Container built successfully ✓");
        Ok(Container {
            registry: Arc::new(registry),
            order,
            state: Mutex::new(RuntimeState::default()),
        })
    }

    /// Returns the instance for `tag`, building it and its dependencies
    /// on first access.
    ///
    /// Singletons are returned by identity on every later call.
    /// Transients are built anew each time.
    ///
    /// # Errors
    /// - [`TabaqaError::ServiceNotFound`] — `tag` or a transitive
    ///   dependency has no layer
    /// - [`TabaqaError::ConstructionFailed`] — a fallible factory failed
    pub fn get<T: Send + Sync + 'static>(&self, tag: &Tag<T>) -> Result<Arc<T>> {
        trace!(tag = %tag, "Resolving");

        let instance = self.resolve_key(tag.key(), None)?;

        instance.downcast::<T>().map_err(|_| TabaqaError::ConstructionFailed {
            tag: tag.name().to_string(),
            source: format!("Type mismatch: expected {}", type_name::<T>()).into(),
        })
    }

    /// Runs every pending dispose hook and clears all runtime state.
    ///
    /// One task is spawned per hook, newest instance first; a failing or
    /// panicking hook does not stop the others. Must be awaited inside a
    /// tokio runtime.
    ///
    /// A later `get` rebuilds services from scratch.
    ///
    /// # Errors
    /// [`TabaqaError::DisposeFailed`] listing every hook that failed.
    #[instrument(skip(self), name = "container_dispose")]
    pub async fn dispose(&self) -> Result<()> {
        let records = {
            let mut state = self.state.lock();
            state.singletons.clear();
            std::mem::take(&mut state.disposal_log)
        };

        info!(hooks = records.len(), "Disposing container");

        let tasks: Vec<_> = records
            .into_iter()
            .rev()
            .map(|record| {
                trace!(tag = %record.tag, scope = %record.scope, "Scheduling dispose hook");
                let ServiceRecord {
                    tag,
                    instance,
                    dispose,
                    ..
                } = record;
                // a panic inside the hook surfaces as a JoinError
                let task = tokio::spawn(async move { dispose(instance).await });
                (tag, task)
            })
            .collect();

        let mut failures = Vec::new();
        for (tag, task) in tasks {
            let outcome: Result<(), BoxError> = match task.await {
                Ok(result) => result,
                Err(join_error) => Err(format!("dispose hook panicked: {join_error}").into()),
            };

            if let Err(source) = outcome {
                warn!(tag = %tag, error = %source, "Dispose hook failed");
                failures.push(DisposeFailure {
                    tag: tag.name().to_string(),
                    source,
                });
            }
        }

        if failures.is_empty() {
            info!("Container disposed ✓");
            Ok(())
        } else {
            Err(TabaqaError::DisposeFailed(DisposeError { failures }))
        }
    }

    /// Returns `true` if a layer provides `tag`.
    pub fn contains<T>(&self, tag: &Tag<T>) -> bool {
        self.registry.contains(tag.key())
    }

    /// Returns the number of registered tags.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Returns true if no tags are registered.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Registered tag names in a valid construction order (dependencies
    /// before dependents).
    pub fn resolution_order(&self) -> Vec<&str> {
        self.order.iter().map(TagKey::name).collect()
    }

    /// Type-erased resolution shared by `get` and factory dependencies.
    fn resolve_key(&self, key: &TagKey, required_by: Option<&TagKey>) -> Result<Instance> {
        let registration = self
            .registry
            .get(key)
            .ok_or_else(|| self.not_found(key, required_by))?;

        match registration {
            Registration::Value(value) => Ok(value.value.clone()),
            Registration::Factory(factory) if factory.scope.is_cached() => {
                let cell = self
                    .state
                    .lock()
                    .singletons
                    .entry(key.clone())
                    .or_default()
                    .clone();

                cell.get_or_try_init(|| self.instantiate(factory)).cloned()
            }
            Registration::Factory(factory) => self.instantiate(factory),
        }
    }

    fn instantiate(&self, factory: &FactoryLayer) -> Result<Instance> {
        let mut resolved = Vec::with_capacity(factory.dependencies.len());
        for dep in &factory.dependencies {
            resolved.push(self.resolve_key(dep, Some(&factory.tag))?);
        }

        debug!(tag = %factory.tag, scope = %factory.scope, "Building service");
        let instance = (factory.build)(resolved).map_err(|source| {
            TabaqaError::ConstructionFailed {
                tag: factory.tag.name().to_string(),
                source,
            }
        })?;

        if let Some(dispose) = &factory.dispose {
            self.state.lock().disposal_log.push(ServiceRecord {
                tag: factory.tag.clone(),
                scope: factory.scope,
                instance: instance.clone(),
                dispose: dispose.clone(),
            });
        }

        Ok(instance)
    }

    fn not_found(&self, key: &TagKey, required_by: Option<&TagKey>) -> TabaqaError {
        warn!(tag = %key, required_by = ?required_by.map(TagKey::name), "Service not found");

        TabaqaError::ServiceNotFound(ServiceNotFoundError {
            requested: key.name().to_string(),
            required_by: required_by.map(|k| k.name().to_string()),
            suggestions: suggest_similar(key.name(), &self.registry.names(), MAX_SUGGESTIONS),
        })
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Container")
            .field("registered", &self.registry.len())
            .field("singletons", &state.singletons.len())
            .field("pending_dispose", &state.disposal_log.len())
            .finish()
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        let pending = self.state.get_mut().disposal_log.len();
        if pending > 0 {
            warn!(pending, "Container dropped without dispose(); hooks will not run");
        }
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::Container;
    pub use crate::dispose::Dispose;
    pub use crate::error::{BoxError, Result, TabaqaError};
    pub use crate::layer::{Dependencies, FactoryOptions, Layer, MergeOptions};
    pub use crate::scope::Scope;
    pub use crate::tag::Tag;
    pub use async_trait::async_trait;
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
