//! Service registry — the flattened form of a layer tree.
//!
//! [`Registry::from_layer`] walks a (possibly deeply merged) [`Layer`]
//! and records one node per distinct tag, its outgoing edges, the layer
//! that provides it and how often it was registered.

use std::collections::HashMap;

use tracing::{debug, instrument, trace, warn};

use crate::error::{DuplicateTagError, TabaqaError};
use crate::layer::{FactoryLayer, Layer, ValueLayer};
use crate::scope::Scope;
use crate::tag::TagKey;

/// The layer that provides a tag.
#[derive(Clone)]
pub(crate) enum Registration {
    Value(ValueLayer),
    Factory(FactoryLayer),
}

impl Registration {
    pub fn scope(&self) -> Scope {
        match self {
            Registration::Value(_) => Scope::Singleton,
            Registration::Factory(factory) => factory.scope,
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Registration::Value(value) => f.debug_tuple("Value").field(&value.tag).finish(),
            Registration::Factory(factory) => f
                .debug_struct("Factory")
                .field("tag", &factory.tag)
                .field("scope", &factory.scope)
                .field("dependencies", &factory.dependencies)
                .finish(),
        }
    }
}

/// Flat dependency graph built from a layer tree.
///
/// Immutable once the container is constructed.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    /// Tags in first-registration order.
    nodes: Vec<TagKey>,
    /// Tag → dependency tags, deduplicated, declaration order kept.
    edges: HashMap<TagKey, Vec<TagKey>>,
    /// Tag → providing layer. Later registrations overwrite earlier ones.
    registrations: HashMap<TagKey, Registration>,
    /// Tag → number of times it appears in the tree.
    occurrences: HashMap<TagKey, usize>,
}

impl Registry {
    /// Flattens `root` into a registry.
    ///
    /// Uses an explicit stack, so arbitrarily deep merge trees do not
    /// grow the call stack. Children are visited left to right.
    ///
    /// # Errors
    /// Returns [`TabaqaError::DuplicateTag`] if any tag occurs more than
    /// once and no merged layer in the tree set `allow_duplicates`.
    #[instrument(skip_all, name = "registry_flatten")]
    pub fn from_layer(root: &Layer) -> Result<Self, TabaqaError> {
        let mut registry = Registry::default();
        let mut allow_duplicates = false;
        let mut stack: Vec<&Layer> = vec![root];

        while let Some(layer) = stack.pop() {
            match layer {
                Layer::Merged(merged) => {
                    allow_duplicates |= merged.options.allow_duplicates;
                    stack.extend(merged.children.iter().rev());
                }
                Layer::Value(value) => {
                    registry.insert(Registration::Value(value.clone()), Vec::new());
                }
                Layer::Factory(factory) => {
                    registry.insert(
                        Registration::Factory(factory.clone()),
                        factory.dependencies.clone(),
                    );
                }
            }
        }

        if !allow_duplicates {
            let names = registry.duplicate_names();
            if !names.is_empty() {
                warn!(duplicates = ?names, "Duplicate tags detected");
                return Err(TabaqaError::DuplicateTag(DuplicateTagError { names }));
            }
        }

        debug!(nodes = registry.len(), "Layer tree flattened");
        Ok(registry)
    }

    fn insert(&mut self, registration: Registration, mut dependencies: Vec<TagKey>) {
        let key = match &registration {
            Registration::Value(value) => value.tag.clone(),
            Registration::Factory(factory) => factory.tag.clone(),
        };

        let occurrence = {
            let count = self.occurrences.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };
        if occurrence == 1 {
            self.nodes.push(key.clone());
        }

        let mut seen = Vec::with_capacity(dependencies.len());
        dependencies.retain(|dep| {
            if seen.contains(dep) {
                false
            } else {
                seen.push(dep.clone());
                true
            }
        });

        trace!(tag = %key, scope = %registration.scope(), occurrence, "Registered layer");
        self.edges.insert(key.clone(), dependencies);
        self.registrations.insert(key, registration);
    }

    fn duplicate_names(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|key| self.occurrences.get(*key).copied().unwrap_or(0) > 1)
            .map(|key| key.name().to_string())
            .collect()
    }

    /// Looks up the layer providing `key`.
    pub fn get(&self, key: &TagKey) -> Option<&Registration> {
        self.registrations.get(key)
    }

    pub fn contains(&self, key: &TagKey) -> bool {
        self.registrations.contains_key(key)
    }

    /// Tags in first-registration order.
    pub fn nodes(&self) -> &[TagKey] {
        &self.nodes
    }

    /// Direct dependencies of `key`; empty for unknown tags.
    pub fn edges(&self, key: &TagKey) -> &[TagKey] {
        self.edges.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    #[cfg(test)]
    pub fn occurrences(&self, key: &TagKey) -> usize {
        self.occurrences.get(key).copied().unwrap_or(0)
    }

    /// Returns the number of distinct tags.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no tags are registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Display names of all registered tags, for suggestions.
    pub fn names(&self) -> Vec<&str> {
        self.nodes.iter().map(TagKey::name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{FactoryOptions, MergeOptions};
    use crate::tag::Tag;
    use std::sync::Arc;

    struct Config;
    struct Database;

    fn config_layer(tag: &Tag<Config>) -> Layer {
        Layer::value(tag, Config)
    }

    fn database_layer(tag: &Tag<Database>, config: &Tag<Config>) -> Layer {
        Layer::factory(tag, config.clone(), |_: Arc<Config>| Database)
    }

    #[test]
    fn flattens_single_value() {
        let config = Tag::<Config>::new("Config");
        let registry = Registry::from_layer(&config_layer(&config)).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.contains(config.key()));
        assert!(registry.edges(config.key()).is_empty());
    }

    #[test]
    fn records_factory_edges() {
        let config = Tag::<Config>::new("Config");
        let database = Tag::<Database>::new("Database");

        let registry = Registry::from_layer(&Layer::merge([
            config_layer(&config),
            database_layer(&database, &config),
        ]))
        .unwrap();

        assert_eq!(registry.edges(database.key()), &[config.key().clone()]);
        assert_eq!(registry.nodes(), &[config.key().clone(), database.key().clone()]);
    }

    #[test]
    fn edges_to_unregistered_tags_are_kept() {
        let config = Tag::<Config>::new("Config");
        let database = Tag::<Database>::new("Database");

        let registry = Registry::from_layer(&database_layer(&database, &config)).unwrap();

        assert!(!registry.contains(config.key()));
        assert_eq!(registry.edges(database.key()).len(), 1);
    }

    #[test]
    fn repeated_dependency_is_one_edge() {
        let config = Tag::<Config>::new("Config");
        let database = Tag::<Database>::new("Database");

        let layer = Layer::factory(
            &database,
            (config.clone(), config.clone()),
            |_: (Arc<Config>, Arc<Config>)| Database,
        );
        let registry = Registry::from_layer(&layer).unwrap();

        assert_eq!(registry.edges(database.key()).len(), 1);
    }

    #[test]
    fn nested_merges_are_flattened_in_order() {
        let a = Tag::<u32>::new("a");
        let b = Tag::<u32>::new("b");
        let c = Tag::<u32>::new("c");

        let layer = Layer::merge([
            Layer::merge([Layer::value(&a, 1), Layer::merge([Layer::value(&b, 2)])]),
            Layer::value(&c, 3),
        ]);
        let registry = Registry::from_layer(&layer).unwrap();

        let names: Vec<&str> = registry.names();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn deep_merge_tree_does_not_overflow() {
        let tag = Tag::<u32>::new("leaf");
        let mut layer = Layer::value(&tag, 0);
        for _ in 0..100_000 {
            layer = Layer::merge([layer]);
        }

        let registry = Registry::from_layer(&layer).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec!["leaf"]);

        drop(layer);
    }

    #[test]
    fn deep_merge_tree_with_shared_subtree_drops() {
        let tag = Tag::<u32>::new("leaf");
        let mut layer = Layer::value(&tag, 0);
        for _ in 0..100_000 {
            layer = Layer::merge_with([layer], MergeOptions::new());
        }

        let shared = layer.clone();
        drop(layer);

        let registry = Registry::from_layer(&shared).unwrap();
        assert_eq!(registry.len(), 1);
        drop(shared);
    }

    #[test]
    fn duplicates_fail_with_every_name() {
        let config = Tag::<Config>::new("Config");
        let database = Tag::<Database>::new("Database");

        let layer = Layer::merge([
            config_layer(&config),
            database_layer(&database, &config),
            config_layer(&config),
            database_layer(&database, &config),
        ]);

        match Registry::from_layer(&layer).unwrap_err() {
            TabaqaError::DuplicateTag(err) => {
                assert_eq!(err.names, vec!["Config".to_string(), "Database".to_string()]);
            }
            other => panic!("Expected DuplicateTag, got: {other:?}"),
        }
    }

    #[test]
    fn allowed_duplicates_last_registration_wins() {
        let config = Tag::<Config>::new("Config");
        let database = Tag::<Database>::new("Database");
        let other = Tag::<Config>::new("Other");

        let layer = Layer::merge_with(
            [
                Layer::factory(&database, config.clone(), |_: Arc<Config>| Database),
                Layer::factory_with(
                    &database,
                    other.clone(),
                    |_: Arc<Config>| Database,
                    FactoryOptions::transient(),
                ),
            ],
            MergeOptions::new().allow_duplicates(true),
        );
        let registry = Registry::from_layer(&layer).unwrap();

        assert_eq!(registry.occurrences(database.key()), 2);
        assert_eq!(registry.len(), 1);
        // edges are overwritten, not unioned
        assert_eq!(registry.edges(database.key()), &[other.key().clone()]);
        assert_eq!(registry.get(database.key()).unwrap().scope(), Scope::Transient);
    }

    #[test]
    fn allow_duplicates_anywhere_in_tree_applies_globally() {
        let config = Tag::<Config>::new("Config");

        let layer = Layer::merge([
            config_layer(&config),
            Layer::merge_with([config_layer(&config)], MergeOptions::new().allow_duplicates(true)),
        ]);

        assert!(Registry::from_layer(&layer).is_ok());
    }

    #[test]
    fn same_name_different_tags_are_not_duplicates() {
        let first = Tag::<Config>::new("Config");
        let second = Tag::<Config>::new("Config");

        let registry =
            Registry::from_layer(&config_layer(&first).and(config_layer(&second))).unwrap();
        assert_eq!(registry.len(), 2);
    }
}
