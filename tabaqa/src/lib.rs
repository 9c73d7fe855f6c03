//! # Tabaqa — layer-based dependency injection for Rust
//!
//! Services are described as immutable [`Layer`]s: pre-built values,
//! factories with typed dependencies, or merges of other layers. A
//! [`Container`] built from the root layer validates the whole graph up
//! front (duplicates, cycles), builds services lazily on `get`, and runs
//! their async dispose hooks on `dispose`.
//!
//! ```rust
//! use std::sync::Arc;
//! use tabaqa::prelude::*;
//!
//! struct Greeting(String);
//!
//! let name = Tag::<String>::new("name");
//! let greeting = Tag::<Greeting>::new("Greeting");
//!
//! let container = Container::build(
//!     &Layer::value(&name, "world".to_string())
//!         .and(Layer::factory(&greeting, name.clone(), |n: Arc<String>| {
//!             Greeting(format!("hello, {n}"))
//!         })),
//! )
//! .unwrap();
//!
//! assert_eq!(container.get(&greeting).unwrap().0, "hello, world");
//! ```

pub use tabaqa_container::*;
pub use tabaqa_support::*;
