//! Core container implementation for Tabaqa DI.
//!
//! Describe services as [`Layer`]s, build a [`Container`] from the merged
//! layer, `get` instances lazily and `dispose` them when done.

pub mod container;
pub mod dispose;
pub mod error;
pub mod graph;
pub mod layer;
pub mod registry;
pub mod scope;
pub mod tag;

pub use container::{Container, prelude};
pub use dispose::Dispose;
pub use error::{BoxError, Result, TabaqaError};
pub use layer::{Dependencies, FactoryOptions, Instance, Layer, MergeOptions};
pub use scope::Scope;
pub use tag::{Tag, TagId, TagKey};
