// Central asset management system

use super::factory::AssetFactory;
use super::handle::AssetHandle;
use super::{Asset, AssetError, AssetKind};
use std::any::{Any, TypeId};
use std::fmt;

/// Object-safe view of an `AssetFactory<T>` for any `T`
trait ErasedFactory {
    fn kind(&self) -> AssetKind;
    fn cached_count(&self) -> usize;
    fn sweep(&mut self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Asset> ErasedFactory for AssetFactory<T> {
    fn kind(&self) -> AssetKind {
        T::KIND
    }

    fn cached_count(&self) -> usize {
        AssetFactory::cached_count(self)
    }

    fn sweep(&mut self) -> usize {
        AssetFactory::sweep(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Cache occupancy per registered factory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetStats {
    pub cached: Vec<(AssetKind, usize)>,
}

impl AssetStats {
    pub fn total(&self) -> usize {
        self.cached.iter().map(|(_, count)| count).sum()
    }

    pub fn cached(&self, kind: AssetKind) -> usize {
        self.cached
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

impl fmt::Display for AssetStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cached", self.total())?;
        for (kind, count) in &self.cached {
            write!(f, ", {} {}", count, kind)?;
        }
        Ok(())
    }
}

/// Dispatch table from asset type to its factory
///
/// Built once in the composition root and passed to whoever loads assets.
/// Factories are dropped in reverse registration order.
#[derive(Default)]
pub struct ResourceManager {
    factories: Vec<(TypeId, Box<dyn ErasedFactory>)>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of the factory for `T`
    pub fn register_factory<T: Asset>(&mut self, factory: AssetFactory<T>) -> Result<(), AssetError> {
        if self.has_factory::<T>() {
            return Err(AssetError::DuplicateFactory(T::KIND));
        }
        log::info!(
            "Registered {} factory (threshold {})",
            T::KIND,
            factory.threshold()
        );
        self.factories
            .push((TypeId::of::<T>(), Box::new(factory)));
        Ok(())
    }

    pub fn has_factory<T: Asset>(&self) -> bool {
        let id = TypeId::of::<T>();
        self.factories.iter().any(|(type_id, _)| *type_id == id)
    }

    pub fn factory<T: Asset>(&self) -> Option<&AssetFactory<T>> {
        let id = TypeId::of::<T>();
        self.factories
            .iter()
            .find(|(type_id, _)| *type_id == id)
            .and_then(|(_, factory)| factory.as_any().downcast_ref())
    }

    pub fn factory_mut<T: Asset>(&mut self) -> Option<&mut AssetFactory<T>> {
        let id = TypeId::of::<T>();
        self.factories
            .iter_mut()
            .find(|(type_id, _)| *type_id == id)
            .and_then(|(_, factory)| factory.as_any_mut().downcast_mut())
    }

    /// Load the `T` registered under `name` and take a handle to it
    ///
    /// A missing factory is a wiring bug and always fails with
    /// `AssetError::NoFactoryFound`; bad data yields the default asset.
    pub fn get<T: Asset>(&mut self, name: &str) -> Result<AssetHandle<T>, AssetError> {
        self.factory_mut::<T>()
            .ok_or(AssetError::NoFactoryFound(T::KIND))?
            .acquire(name)
    }

    /// Sweep every factory regardless of threshold
    pub fn collect_garbage(&mut self) -> usize {
        let evicted: usize = self
            .factories
            .iter_mut()
            .map(|(_, factory)| factory.sweep())
            .sum();
        log::debug!("Garbage collection evicted {} assets", evicted);
        evicted
    }

    pub fn stats(&self) -> AssetStats {
        AssetStats {
            cached: self
                .factories
                .iter()
                .map(|(_, factory)| (factory.kind(), factory.cached_count()))
                .collect(),
        }
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        while let Some((_, factory)) = self.factories.pop() {
            log::debug!("Releasing {} factory", factory.kind());
            drop(factory);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::registry::{ResourceDescriptor, ResourceRegistry};
    use crate::engine::assets::serialization::RonService;
    use crate::engine::assets::test_support::{headless, Fixture};
    use crate::engine::renderer::backend::SharedBackend;
    use crate::engine::renderer::shader::{Shader, ShaderProgram};
    use crate::engine::renderer::texture::Texture;
    use std::rc::Rc;

    fn texture_factory(registry: Rc<ResourceRegistry>, backend: &SharedBackend) -> AssetFactory<Texture> {
        AssetFactory::new(registry, Rc::clone(backend)).with_service(Rc::new(RonService))
    }

    #[test]
    fn test_missing_factory_is_always_an_error() {
        let mut manager = ResourceManager::new();
        for _ in 0..3 {
            assert!(matches!(
                manager.get::<Shader>("anything"),
                Err(AssetError::NoFactoryFound(AssetKind::Shader))
            ));
        }
    }

    #[test]
    fn test_duplicate_registration() {
        let (_, backend) = headless();
        let registry = Rc::new(ResourceRegistry::default());
        let mut manager = ResourceManager::new();

        manager
            .register_factory(texture_factory(Rc::clone(&registry), &backend))
            .unwrap();
        let result = manager.register_factory(texture_factory(registry, &backend));
        assert!(matches!(result, Err(AssetError::DuplicateFactory(AssetKind::Texture))));
        assert!(manager.has_factory::<Texture>());
        assert!(!manager.has_factory::<ShaderProgram>());
    }

    #[test]
    fn test_get_delegates_to_factory() {
        let (_, backend) = headless();
        let fixture = Fixture::new();
        let registry = Rc::new(ResourceRegistry::from_descriptors([
            ResourceDescriptor::new("tex.a", fixture.texture("a"), AssetKind::Texture),
            ResourceDescriptor::new("tex.b", fixture.texture("b"), AssetKind::Texture),
        ]));

        let mut manager = ResourceManager::new();
        manager
            .register_factory(texture_factory(registry, &backend))
            .unwrap();

        let a = manager.get::<Texture>("tex.a").unwrap();
        let again = manager.get::<Texture>("tex.a").unwrap();
        assert_eq!(a, again);
        assert_eq!(a.ref_count(), 2);
        assert_eq!(a.get().unwrap().name(), "a");

        manager.get::<Texture>("tex.b").unwrap();
        let stats = manager.stats();
        assert_eq!(stats.cached(AssetKind::Texture), 2);
        assert_eq!(stats.total(), 2);

        // tex.b's handle was dropped right away
        assert_eq!(manager.collect_garbage(), 1);
        assert_eq!(manager.stats().total(), 1);
        assert!(manager.factory::<Texture>().unwrap().is_cached("tex.a"));
    }

    #[test]
    fn test_factory_mut_reaches_settings() {
        let (_, backend) = headless();
        let mut manager = ResourceManager::new();
        manager
            .register_factory(texture_factory(Rc::new(ResourceRegistry::default()), &backend))
            .unwrap();

        manager.factory_mut::<Texture>().unwrap().set_threshold(3);
        assert_eq!(manager.factory::<Texture>().unwrap().threshold(), 3);
        assert!(manager.factory::<Shader>().is_none());
    }

    #[test]
    fn test_stats_display() {
        let stats = AssetStats {
            cached: vec![(AssetKind::Texture, 2), (AssetKind::ShaderProgram, 1)],
        };
        assert_eq!(stats.to_string(), "3 cached, 2 texture, 1 shader program");
    }
}
