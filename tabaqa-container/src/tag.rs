//! Service identification tags.
//!
//! A [`Tag<T>`] names a service contract producing a `T`. Tags are minted
//! once and compared by identity: every call to [`Tag::new`] yields a
//! distinct key, even for equal display names.

use std::any::type_name;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tabaqa_support::rendering::shorten_type_name;

static NEXT_TAG_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(u64);

impl TagId {
    fn next() -> Self {
        Self(NEXT_TAG_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric id.
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Type-erased tag, the key of the dependency graph.
///
/// Equality and hashing look at the [`TagId`] only; the name is carried
/// for error messages.
#[derive(Clone)]
pub struct TagKey {
    id: TagId,
    name: Arc<str>,
    type_name: &'static str,
}

impl TagKey {
    #[inline]
    pub fn id(&self) -> TagId {
        self.id
    }

    /// Display name given when the tag was minted.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rust type produced by the service behind this tag.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for TagKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TagKey {}

impl Hash for TagKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({}#{}: {})", self.name, self.id.0, self.type_name)
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Typed service key.
///
/// # Examples
/// ```
/// use tabaqa_container::tag::Tag;
///
/// struct Database;
///
/// let primary = Tag::<Database>::new("Database");
/// let replica = Tag::<Database>::new("Database");
///
/// // Same name, different services.
/// assert_eq!(primary.name(), replica.name());
/// assert_ne!(primary.key(), replica.key());
/// ```
pub struct Tag<T> {
    key: TagKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Tag<T> {
    /// Mints a fresh tag with the given display name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            key: TagKey {
                id: TagId::next(),
                name: name.into(),
                type_name: type_name::<T>(),
            },
            _marker: PhantomData,
        }
    }

    /// Mints a fresh tag named after `T`.
    ///
    /// ```
    /// use tabaqa_container::tag::Tag;
    ///
    /// let tag = Tag::<Vec<String>>::typed();
    /// assert_eq!(tag.name(), "Vec<String>");
    /// ```
    pub fn typed() -> Self {
        Self::new(shorten_type_name(type_name::<T>()))
    }
}

impl<T> Tag<T> {
    #[inline]
    pub fn key(&self) -> &TagKey {
        &self.key
    }

    #[inline]
    pub fn id(&self) -> TagId {
        self.key.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.key.name()
    }
}

impl<T> Clone for Tag<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for Tag<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for Tag<T> {}

impl<T> Hash for Tag<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<T> fmt::Debug for Tag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.key, f)
    }
}

impl<T> fmt::Display for Tag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.key, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Config;

    #[test]
    fn tag_keeps_name_and_type() {
        let tag = Tag::<Config>::new("Config");
        assert_eq!(tag.name(), "Config");
        assert!(tag.key().type_name().contains("Config"));
    }

    #[test]
    fn clones_share_identity() {
        let tag = Tag::<Config>::new("Config");
        assert_eq!(tag.clone(), tag);
        assert_eq!(tag.clone().id(), tag.id());
    }

    #[test]
    fn same_name_distinct_identity() {
        let a = Tag::<Config>::new("Config");
        let b = Tag::<Config>::new("Config");
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn ids_increase() {
        let a = Tag::<Config>::new("a");
        let b = Tag::<Config>::new("b");
        assert!(b.id() > a.id());
    }

    #[test]
    fn key_in_hashmap() {
        let first = Tag::<Config>::new("Config");
        let second = Tag::<Config>::new("Config");

        let mut map = HashMap::new();
        map.insert(first.key().clone(), 1);
        map.insert(second.key().clone(), 2);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(first.key()), Some(&1));
    }

    #[test]
    fn typed_tag_uses_short_name() {
        let tag = Tag::<Config>::typed();
        assert_eq!(tag.name(), "Config");
    }

    #[test]
    fn display_is_the_name() {
        let tag = Tag::<u32>::new("port");
        assert_eq!(tag.to_string(), "port");
        assert!(format!("{tag:?}").contains("port"));
    }
}
