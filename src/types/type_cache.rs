//! Process-wide type cache
//!
//! Holds committed kernels together with their projections. Reads are
//! concurrent; writes happen on transaction commit and hold the lock only for
//! the map update.

use super::TypeModel;
use crate::projections::TypeView;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A kernel and the projection computed from it
#[derive(Debug, Clone)]
pub struct CachedType {
    kernel: Arc<TypeModel>,
    view: Arc<TypeView>,
}

impl CachedType {
    pub fn new(kernel: TypeModel) -> Self {
        let view = Arc::new(TypeView::project(&kernel));
        Self {
            kernel: Arc::new(kernel),
            view,
        }
    }

    pub fn uri(&self) -> &str {
        self.view.uri()
    }

    pub fn view(&self) -> Arc<TypeView> {
        Arc::clone(&self.view)
    }

    pub(crate) fn kernel(&self) -> &TypeModel {
        &self.kernel
    }
}

/// Cache of loaded types keyed by type URI
#[derive(Debug, Default)]
pub struct TypeCache {
    types: RwLock<HashMap<String, CachedType>>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed projection of a type
    pub fn get(&self, uri: &str) -> Option<Arc<TypeView>> {
        self.types.read().get(uri).map(CachedType::view)
    }

    pub(crate) fn get_cached(&self, uri: &str) -> Option<CachedType> {
        self.types.read().get(uri).cloned()
    }

    pub(crate) fn put(&self, cached: CachedType) {
        self.types.write().insert(cached.uri().to_string(), cached);
    }

    /// Drop a type; the next read reloads it from storage
    pub fn invalidate(&self, uri: &str) -> bool {
        self.types.write().remove(uri).is_some()
    }

    pub fn clear(&self) {
        self.types.write().clear();
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.types.read().contains_key(uri)
    }

    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }

    /// Cached type URIs, sorted
    pub fn uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.types.read().keys().cloned().collect();
        uris.sort();
        uris
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::uris;

    fn note(name: &str) -> TypeModel {
        TypeModel::topic_type("test.note", name, uris::TEXT).unwrap()
    }

    #[test]
    fn test_put_get_invalidate() {
        let cache = TypeCache::new();
        assert!(cache.get("test.note").is_none());

        cache.put(CachedType::new(note("Note")));
        assert_eq!(cache.get("test.note").unwrap().name(), "Note");
        assert_eq!(cache.uris(), vec!["test.note"]);

        assert!(cache.invalidate("test.note"));
        assert!(!cache.invalidate("test.note"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let cache = TypeCache::new();
        cache.put(CachedType::new(note("Note")));
        let before = cache.get("test.note").unwrap();

        cache.put(CachedType::new(note("Memo")));
        assert_eq!(before.name(), "Note");
        assert_eq!(cache.get("test.note").unwrap().name(), "Memo");
        assert_eq!(cache.len(), 1);
    }
}
