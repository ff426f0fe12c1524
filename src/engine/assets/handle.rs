// Reference-counted asset handles

use super::store::{AssetKey, AssetStore};
use crate::engine::renderer::shader::{Shader, ShaderProgram};
use crate::engine::renderer::texture::Texture;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Counted reference to an asset cached by an `AssetFactory`
///
/// Creating or cloning a handle increments the asset's reference count;
/// dropping one decrements it. Handles only weakly reference the factory's
/// store, so a handle that outlives its factory becomes inert instead of
/// keeping the asset alive.
pub struct AssetHandle<T> {
    key: AssetKey,
    store: Weak<RefCell<AssetStore<T>>>,
}

impl<T> AssetHandle<T> {
    /// Create a handle and take a reference on `key`
    pub(crate) fn new(key: AssetKey, store: &Rc<RefCell<AssetStore<T>>>) -> Self {
        store.borrow_mut().retain(key);
        Self {
            key,
            store: Rc::downgrade(store),
        }
    }

    /// Store key of the referenced asset
    pub fn key(&self) -> AssetKey {
        self.key
    }

    fn with_store<R>(&self, f: impl FnOnce(&AssetStore<T>) -> Option<R>) -> Option<R> {
        let store = self.store.upgrade()?;
        let store = store.try_borrow().ok()?;
        f(&store)
    }

    /// The referenced asset, or `None` once the factory is gone
    pub fn get(&self) -> Option<Rc<T>> {
        self.with_store(|store| store.get(self.key).cloned())
    }

    pub fn is_alive(&self) -> bool {
        self.with_store(|store| Some(store.contains(self.key)))
            .unwrap_or(false)
    }

    /// Current reference count of the asset, 0 once the factory is gone
    pub fn ref_count(&self) -> u32 {
        self.with_store(|store| store.ref_count(self.key))
            .unwrap_or(0)
    }
}

impl<T> Clone for AssetHandle<T> {
    fn clone(&self) -> Self {
        if let Some(store) = self.store.upgrade() {
            store.borrow_mut().retain(self.key);
        }
        Self {
            key: self.key,
            store: Weak::clone(&self.store),
        }
    }
}

impl<T> Drop for AssetHandle<T> {
    fn drop(&mut self) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        let borrowed = store.try_borrow_mut();
        match borrowed {
            Ok(mut entries) => {
                entries.release(self.key);
            }
            Err(_) => {
                log::error!(
                    "Asset store busy while releasing handle {:?}; reference leaked",
                    self.key
                );
            }
        }
    }
}

impl<T> PartialEq for AssetHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for AssetHandle<T> {}

impl<T> fmt::Debug for AssetHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetHandle")
            .field("key", &self.key)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Convenience type aliases
pub type TextureHandle = AssetHandle<Texture>;
pub type ShaderHandle = AssetHandle<Shader>;
pub type ShaderProgramHandle = AssetHandle<ShaderProgram>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::test_support::capture_logs;

    fn store_with(value: &'static str) -> (Rc<RefCell<AssetStore<&'static str>>>, AssetKey) {
        let store = Rc::new(RefCell::new(AssetStore::new()));
        let key = store.borrow_mut().insert(value);
        (store, key)
    }

    #[test]
    fn test_handle_counts_references() {
        let (store, key) = store_with("checker");

        let first = AssetHandle::new(key, &store);
        assert_eq!(first.ref_count(), 1);

        let second = first.clone();
        assert_eq!(second.ref_count(), 2);
        assert_eq!(first, second);

        drop(first);
        assert_eq!(second.ref_count(), 1);
        drop(second);
        assert_eq!(store.borrow().ref_count(key), Some(0));
    }

    #[test]
    fn test_handle_resolves_asset() {
        let (store, key) = store_with("checker");
        let handle = AssetHandle::new(key, &store);

        assert_eq!(handle.get().map(|a| *a), Some("checker"));
        assert!(handle.is_alive());
    }

    #[test]
    fn test_handle_goes_inert_after_store_drop() {
        let (store, key) = store_with("checker");
        let handle = AssetHandle::new(key, &store);
        let copy = handle.clone();
        drop(store);

        assert!(!handle.is_alive());
        assert!(handle.get().is_none());
        assert_eq!(copy.ref_count(), 0);
        // Dropping inert handles must not panic
        drop(handle);
        drop(copy);
    }

    #[test]
    fn test_drop_releases_in_either_order() {
        let (store, key) = store_with("checker");
        let first = AssetHandle::new(key, &store);
        let second = first.clone();

        drop(second);
        assert_eq!(store.borrow().ref_count(key), Some(1));
        drop(first);
        assert_eq!(store.borrow().ref_count(key), Some(0));
    }

    #[test]
    fn test_drop_while_store_borrowed_logs_and_leaks() {
        let (store, key) = store_with("checker");
        let handle = AssetHandle::new(key, &store);

        let ((), records) = capture_logs(|| {
            let _reading = store.borrow();
            drop(handle);
        });

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, log::Level::Error);
        assert_eq!(store.borrow().ref_count(key), Some(1));
    }

    #[test]
    fn test_handle_to_removed_asset() {
        let (store, key) = store_with("checker");
        let handle = AssetHandle::new(key, &store);
        store.borrow_mut().release(key);
        store.borrow_mut().remove(key);

        assert!(!handle.is_alive());
        assert!(handle.get().is_none());
    }
}
