//! The layer algebra — immutable blueprints for building services.
//!
//! A [`Layer`] is pure data. Defining one runs nothing: factories are
//! invoked by the container on first `get`, dispose hooks on `dispose`.
//!
//! ```text
//! Layer::value ──┐
//! Layer::factory ├──> Layer::merge ──> Container::build
//! Layer::from_fn ┘
//! ```
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use tabaqa_container::prelude::*;
//!
//! struct Config { url: String }
//! struct Database { url: String }
//!
//! let config = Tag::<Config>::new("Config");
//! let database = Tag::<Database>::new("Database");
//!
//! let app = Layer::merge([
//!     Layer::value(&config, Config { url: "postgres://localhost".into() }),
//!     Layer::factory(&database, config.clone(), |config: Arc<Config>| Database {
//!         url: config.url.clone(),
//!     }),
//! ]);
//!
//! let container = Container::build(&app).unwrap();
//! assert_eq!(container.get(&database).unwrap().url, "postgres://localhost");
//! ```

use std::any::{Any, type_name};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::mem;
use std::sync::Arc;

use crate::dispose::{self, Dispose, DisposeFn};
use crate::error::BoxError;
use crate::scope::Scope;
use crate::tag::{Tag, TagKey};

/// A built service, type-erased.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Erased build function: resolved dependencies in, instance out.
pub(crate) type BuildFn = Arc<dyn Fn(Vec<Instance>) -> Result<Instance, BoxError> + Send + Sync>;

// ============================================================
// Dependencies
// ============================================================

/// An ordered list of tags a factory depends on.
///
/// Implemented for `()`, a single [`Tag`], tuples of tags (up to 8) and
/// `Vec<Tag<T>>`. [`Dependencies::Resolved`] is what the build closure
/// receives: one `Arc<T>` per tag, in declared order.
pub trait Dependencies: 'static {
    type Resolved;

    /// Keys in declared order.
    fn keys(&self) -> Vec<TagKey>;

    /// Converts resolved instances, in declared order, into typed form.
    fn resolve(instances: Vec<Instance>) -> Result<Self::Resolved, BoxError>;
}

fn downcast_next<T: Send + Sync + 'static>(
    instances: &mut impl Iterator<Item = Instance>,
) -> Result<Arc<T>, BoxError> {
    let instance = instances
        .next()
        .ok_or_else(|| format!("missing resolved dependency of type {}", type_name::<T>()))?;

    instance
        .downcast::<T>()
        .map_err(|_| format!("Type mismatch: expected {}", type_name::<T>()).into())
}

impl Dependencies for () {
    type Resolved = ();

    fn keys(&self) -> Vec<TagKey> {
        Vec::new()
    }

    fn resolve(_: Vec<Instance>) -> Result<Self::Resolved, BoxError> {
        Ok(())
    }
}

impl<A: Send + Sync + 'static> Dependencies for Tag<A> {
    type Resolved = Arc<A>;

    fn keys(&self) -> Vec<TagKey> {
        vec![self.key().clone()]
    }

    fn resolve(instances: Vec<Instance>) -> Result<Self::Resolved, BoxError> {
        downcast_next(&mut instances.into_iter())
    }
}

impl<A: Send + Sync + 'static> Dependencies for Vec<Tag<A>> {
    type Resolved = Vec<Arc<A>>;

    fn keys(&self) -> Vec<TagKey> {
        self.iter().map(|tag| tag.key().clone()).collect()
    }

    fn resolve(instances: Vec<Instance>) -> Result<Self::Resolved, BoxError> {
        let mut iter = instances.into_iter();
        let mut resolved = Vec::with_capacity(iter.len());
        while iter.len() > 0 {
            resolved.push(downcast_next(&mut iter)?);
        }
        Ok(resolved)
    }
}

macro_rules! impl_dependencies_for_tuple {
    ($($ty:ident => $idx:tt),+) => {
        impl<$($ty: Send + Sync + 'static),+> Dependencies for ($(Tag<$ty>,)+) {
            type Resolved = ($(Arc<$ty>,)+);

            fn keys(&self) -> Vec<TagKey> {
                vec![$(self.$idx.key().clone()),+]
            }

            fn resolve(instances: Vec<Instance>) -> Result<Self::Resolved, BoxError> {
                let mut iter = instances.into_iter();
                Ok(($(downcast_next::<$ty>(&mut iter)?,)+))
            }
        }
    };
}

impl_dependencies_for_tuple!(A => 0);
impl_dependencies_for_tuple!(A => 0, B => 1);
impl_dependencies_for_tuple!(A => 0, B => 1, C => 2);
impl_dependencies_for_tuple!(A => 0, B => 1, C => 2, D => 3);
impl_dependencies_for_tuple!(A => 0, B => 1, C => 2, D => 3, E => 4);
impl_dependencies_for_tuple!(A => 0, B => 1, C => 2, D => 3, E => 4, F => 5);
impl_dependencies_for_tuple!(A => 0, B => 1, C => 2, D => 3, E => 4, F => 5, G => 6);
impl_dependencies_for_tuple!(A => 0, B => 1, C => 2, D => 3, E => 4, F => 5, G => 6, H => 7);

// ============================================================
// Options
// ============================================================

/// Lifecycle options for a factory layer.
///
/// Defaults to [`Scope::Singleton`] with no dispose hook.
pub struct FactoryOptions<T> {
    scope: Scope,
    dispose: Option<DisposeFn>,
    _marker: PhantomData<fn(Arc<T>)>,
}

impl<T: Send + Sync + 'static> FactoryOptions<T> {
    pub fn new() -> Self {
        Self {
            scope: Scope::Singleton,
            dispose: None,
            _marker: PhantomData,
        }
    }

    /// Shorthand for `FactoryOptions::new().scope(Scope::Transient)`.
    pub fn transient() -> Self {
        Self::new().scope(Scope::Transient)
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Runs `hook` on every instance this factory built, during
    /// `Container::dispose`. Services never built never see their hook.
    pub fn on_dispose<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.dispose = Some(dispose::erase(hook));
        self
    }

    /// Uses the service's own [`Dispose`] impl as its hook.
    pub fn disposable(self) -> Self
    where
        T: Dispose,
    {
        self.on_dispose(|service: Arc<T>| async move { service.dispose().await })
    }
}

impl<T: Send + Sync + 'static> Default for FactoryOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for FactoryOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryOptions")
            .field("scope", &self.scope)
            .field("dispose", &self.dispose.is_some())
            .finish()
    }
}

/// Options for a merged layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    pub allow_duplicates: bool,
}

impl MergeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets a tag appear more than once; the last registration wins.
    ///
    /// Applies to the whole tree being built, not just this node's
    /// children.
    pub fn allow_duplicates(mut self, allow: bool) -> Self {
        self.allow_duplicates = allow;
        self
    }
}

// ============================================================
// Layer
// ============================================================

/// A pre-built instance.
#[derive(Clone)]
pub struct ValueLayer {
    pub(crate) tag: TagKey,
    pub(crate) value: Instance,
}

/// A service built on demand from its dependencies.
#[derive(Clone)]
pub struct FactoryLayer {
    pub(crate) tag: TagKey,
    pub(crate) dependencies: Vec<TagKey>,
    pub(crate) build: BuildFn,
    pub(crate) scope: Scope,
    pub(crate) dispose: Option<DisposeFn>,
}

/// A composition of layers.
#[derive(Clone)]
pub struct MergedLayer {
    pub(crate) children: Arc<[Layer]>,
    pub(crate) options: MergeOptions,
}

impl Drop for MergedLayer {
    // Unwinds uniquely owned subtrees on a heap stack so arbitrarily deep
    // merges drop in bounded stack depth.
    fn drop(&mut self) {
        let mut stack = vec![mem::replace(&mut self.children, Arc::from(Vec::new()))];
        while let Some(mut children) = stack.pop() {
            if let Some(layers) = Arc::get_mut(&mut children) {
                for layer in layers.iter_mut() {
                    if let Layer::Merged(merged) = layer {
                        stack.push(mem::replace(&mut merged.children, Arc::from(Vec::new())));
                    }
                }
            }
        }
    }
}

/// Immutable service blueprint.
#[derive(Clone)]
pub enum Layer {
    Value(ValueLayer),
    Factory(FactoryLayer),
    Merged(MergedLayer),
}

impl Layer {
    /// A layer providing an already-built value. Always a singleton.
    pub fn value<T: Send + Sync + 'static>(tag: &Tag<T>, value: T) -> Self {
        Layer::Value(ValueLayer {
            tag: tag.key().clone(),
            value: Arc::new(value),
        })
    }

    /// A singleton factory depending on `deps`.
    ///
    /// Dependencies are only checked when the service is first built,
    /// a missing one fails that `get` with `ServiceNotFound`.
    pub fn factory<T, D, F>(tag: &Tag<T>, deps: D, build: F) -> Self
    where
        T: Send + Sync + 'static,
        D: Dependencies,
        F: Fn(D::Resolved) -> T + Send + Sync + 'static,
    {
        Self::factory_with(tag, deps, build, FactoryOptions::new())
    }

    /// A factory with explicit scope and dispose options.
    pub fn factory_with<T, D, F>(tag: &Tag<T>, deps: D, build: F, options: FactoryOptions<T>) -> Self
    where
        T: Send + Sync + 'static,
        D: Dependencies,
        F: Fn(D::Resolved) -> T + Send + Sync + 'static,
    {
        Self::try_factory_with(
            tag,
            deps,
            move |resolved| Ok::<T, BoxError>(build(resolved)),
            options,
        )
    }

    /// A factory whose build may fail.
    ///
    /// An `Err` surfaces from `get` as `TabaqaError::ConstructionFailed`.
    pub fn try_factory_with<T, D, F, E>(
        tag: &Tag<T>,
        deps: D,
        build: F,
        options: FactoryOptions<T>,
    ) -> Self
    where
        T: Send + Sync + 'static,
        D: Dependencies,
        F: Fn(D::Resolved) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        let build: BuildFn = Arc::new(move |instances: Vec<Instance>| -> Result<Instance, BoxError> {
            let resolved = D::resolve(instances)?;
            let service = build(resolved).map_err(Into::<BoxError>::into)?;
            Ok(Arc::new(service) as Instance)
        });

        Layer::Factory(FactoryLayer {
            tag: tag.key().clone(),
            dependencies: deps.keys(),
            build,
            scope: options.scope,
            dispose: options.dispose,
        })
    }

    /// A singleton factory with no dependencies.
    pub fn from_fn<T, F>(tag: &Tag<T>, build: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::from_fn_with(tag, build, FactoryOptions::new())
    }

    /// A factory with no dependencies and explicit options.
    pub fn from_fn_with<T, F>(tag: &Tag<T>, build: F, options: FactoryOptions<T>) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::factory_with(tag, (), move |()| build(), options)
    }

    /// Merges `layers` into a new layer, left to right.
    pub fn merge(layers: impl IntoIterator<Item = Layer>) -> Self {
        Self::merge_with(layers, MergeOptions::default())
    }

    pub fn merge_with(layers: impl IntoIterator<Item = Layer>, options: MergeOptions) -> Self {
        Layer::Merged(MergedLayer {
            children: layers.into_iter().collect(),
            options,
        })
    }

    /// `Layer::merge([self, other])`.
    pub fn and(self, other: Layer) -> Self {
        Self::merge([self, other])
    }

    /// The tag this layer provides, `None` for merged layers.
    pub fn tag(&self) -> Option<&TagKey> {
        match self {
            Layer::Value(value) => Some(&value.tag),
            Layer::Factory(factory) => Some(&factory.tag),
            Layer::Merged(_) => None,
        }
    }
}

impl FactoryLayer {
    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn dependencies(&self) -> &[TagKey] {
        &self.dependencies
    }
}

impl MergedLayer {
    pub fn children(&self) -> &[Layer] {
        &self.children
    }

    pub fn options(&self) -> MergeOptions {
        self.options
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Value(value) => f.debug_tuple("Value").field(&value.tag).finish(),
            Layer::Factory(factory) => f
                .debug_struct("Factory")
                .field("tag", &factory.tag)
                .field("dependencies", &factory.dependencies)
                .field("scope", &factory.scope)
                .field("dispose", &factory.dispose.is_some())
                .finish(),
            Layer::Merged(merged) => f
                .debug_struct("Merged")
                .field("children", &merged.children)
                .field("allow_duplicates", &merged.options.allow_duplicates)
                .finish(),
        }
    }
}
