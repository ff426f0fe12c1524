// Per-kind asset cache with eviction

use super::handle::AssetHandle;
use super::registry::ResourceRegistry;
use super::serialization::DeserializationService;
use super::store::{AssetKey, AssetStore};
use super::{Asset, AssetError};
use crate::engine::renderer::backend::SharedBackend;
use log::{debug, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Number of cached assets a factory holds before it starts sweeping
pub const DEFAULT_THRESHOLD: usize = 10;

/// Loads, caches and evicts assets of one kind
///
/// Assets are cached by resolved path, so logical names that alias the same
/// file share one instance. Once more than `threshold` assets are cached, the
/// next `load` first drops every cached asset nothing holds a handle to.
///
/// Data problems (unknown name, unreadable or malformed descriptor, failed
/// GPU upload) never fail a load: they log one warning and yield the kind's
/// default asset.
pub struct AssetFactory<T: Asset> {
    registry: Rc<ResourceRegistry>,
    backend: SharedBackend,
    service: Option<Rc<dyn DeserializationService>>,
    store: Rc<RefCell<AssetStore<T>>>,
    cache: HashMap<PathBuf, AssetKey>,
    default_key: Option<AssetKey>,
    threshold: usize,
}

impl<T: Asset> AssetFactory<T> {
    /// Create a factory without a deserialization service
    pub fn new(registry: Rc<ResourceRegistry>, backend: SharedBackend) -> Self {
        Self {
            registry,
            backend,
            service: None,
            store: Rc::new(RefCell::new(AssetStore::new())),
            cache: HashMap::new(),
            default_key: None,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_service(mut self, service: Rc<dyn DeserializationService>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn set_service(&mut self, service: Rc<dyn DeserializationService>) {
        self.service = Some(service);
    }

    pub fn service(&self) -> Option<&Rc<dyn DeserializationService>> {
        self.service.as_ref()
    }

    pub fn set_threshold(&mut self, threshold: usize) {
        self.threshold = threshold;
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn registry(&self) -> &Rc<ResourceRegistry> {
        &self.registry
    }

    /// Load the asset registered under `name`
    ///
    /// Returns the cached key when the name resolves to an already loaded
    /// path. The only error is a missing deserialization service.
    pub fn load(&mut self, name: &str) -> Result<AssetKey, AssetError> {
        let service = self
            .service
            .clone()
            .ok_or(AssetError::MissingService(T::KIND))?;

        self.check_threshold();

        let registry = Rc::clone(&self.registry);
        let resource = match registry.get(name) {
            Ok(resource) => resource,
            Err(e) => return Ok(self.fallback(name, &e)),
        };

        if resource.kind != T::KIND {
            let mismatch = AssetError::KindMismatch {
                name: name.to_string(),
                declared: resource.kind,
                expected: T::KIND,
            };
            return Ok(self.fallback(name, &mismatch));
        }

        if let Some(&key) = self.cache.get(&resource.path) {
            if self.store.borrow().contains(key) {
                debug!("Cache hit for {} {} ({})", T::KIND, name, resource.path.display());
                return Ok(key);
            }
            self.cache.remove(&resource.path);
        }

        debug!("Cache miss for {} {} ({})", T::KIND, name, resource.path.display());
        let built = service
            .deserialize(T::KIND, &resource.path)
            .and_then(|descriptor| T::from_descriptor(descriptor, &self.backend));

        match built {
            Ok(asset) => {
                let id = asset.id();
                let key = self.store.borrow_mut().insert(asset);
                debug!("Cached {} {} as {} ({:?})", T::KIND, name, id, key);
                self.cache.insert(resource.path.clone(), key);
                Ok(key)
            }
            Err(e) => Ok(self.fallback(name, &e)),
        }
    }

    /// Load `name` and take a handle to it
    pub fn acquire(&mut self, name: &str) -> Result<AssetHandle<T>, AssetError> {
        let key = self.load(name)?;
        Ok(self.handle(key))
    }

    /// Take a counted handle to a stored asset
    pub fn handle(&self, key: AssetKey) -> AssetHandle<T> {
        AssetHandle::new(key, &self.store)
    }

    pub fn get(&self, key: AssetKey) -> Option<Rc<T>> {
        self.store.borrow().get(key).cloned()
    }

    pub fn ref_count(&self, key: AssetKey) -> Option<u32> {
        self.store.borrow().ref_count(key)
    }

    pub fn is_referenced(&self, key: AssetKey) -> bool {
        self.ref_count(key).map(|refs| refs > 0).unwrap_or(false)
    }

    /// Number of path-cached assets (the default asset is not counted)
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Whether a logical name, or a path directly, has a cached asset
    pub fn is_cached(&self, name_or_path: &str) -> bool {
        let path = match self.registry.path(name_or_path) {
            Ok(path) => path,
            Err(_) => Path::new(name_or_path),
        };
        self.cache.contains_key(path)
    }

    /// Key of the default asset, creating it on first use
    pub fn default_key(&mut self) -> AssetKey {
        if let Some(key) = self.default_key {
            if self.store.borrow().contains(key) {
                return key;
            }
        }

        let asset = T::placeholder(&self.backend);
        debug!("Created default {} {} as {}", T::KIND, asset.name(), asset.id());
        let key = self.store.borrow_mut().insert_pinned(asset);
        self.default_key = Some(key);
        key
    }

    pub fn default_asset(&mut self) -> Option<Rc<T>> {
        let key = self.default_key();
        self.get(key)
    }

    fn fallback(&mut self, name: &str, error: &AssetError) -> AssetKey {
        warn!("Failed to load {} {}: {}; using the default", T::KIND, name, error);
        self.default_key()
    }

    fn check_threshold(&mut self) {
        if self.cache.len() > self.threshold {
            self.sweep();
        }
    }

    /// Drop every cached asset with no outstanding handles
    ///
    /// Returns the number of evicted assets.
    pub fn sweep(&mut self) -> usize {
        let mut evicted = Vec::new();
        {
            let mut store = self.store.borrow_mut();
            self.cache.retain(|path, key| match store.ref_count(*key) {
                Some(0) => {
                    if let Some(asset) = store.remove(*key) {
                        debug!("Evicting {} {} ({})", T::KIND, asset.id(), path.display());
                        evicted.push(asset);
                    }
                    false
                }
                Some(_) => true,
                None => false,
            });
        }

        // Assets release their GPU objects here, outside the store borrow
        let count = evicted.len();
        drop(evicted);

        if count > 0 {
            debug!(
                "Swept {} unreferenced {} assets, {} remain cached",
                count,
                T::KIND,
                self.cache.len()
            );
        }
        count
    }
}

impl<T: Asset> Drop for AssetFactory<T> {
    fn drop(&mut self) {
        let referenced = self
            .cache
            .values()
            .filter(|key| self.is_referenced(**key))
            .count();
        if referenced > 0 {
            debug!(
                "Dropping {} factory with {} referenced assets; their handles go inert",
                T::KIND,
                referenced
            );
        }
    }
}
