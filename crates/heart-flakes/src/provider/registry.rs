use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::api::{self, ReadOptions, WriteOptions};
use crate::codec::ReadReport;
use crate::error::FlakeError;
use crate::model::{ActorFlake, Flake};
use crate::object::{ObjectId, ObjectStore};
use crate::provider::{BinaryProvider, SerializationProvider};
use crate::reflect::StructValue;

/// Providers keyed by name.
///
/// Built during startup and passed by reference to whatever needs it; there
/// is no process-wide instance.
pub struct ProviderRegistry {
    providers: FxHashMap<String, Arc<dyn SerializationProvider>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

impl ProviderRegistry {
    /// Creates a registry holding the `"Binary"` provider.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(BinaryProvider));
        registry
    }

    pub fn empty() -> Self {
        Self {
            providers: FxHashMap::default(),
        }
    }

    /// Adds a provider under its own name, returning the one it replaces.
    pub fn register(&mut self, provider: Arc<dyn SerializationProvider>) -> Option<Arc<dyn SerializationProvider>> {
        let name = provider.name().to_string();
        debug!(provider = %name, "serialization provider registered");
        self.providers.insert(name, provider)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn SerializationProvider>> {
        self.providers.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&dyn SerializationProvider, FlakeError> {
        self.providers
            .get(name)
            .map(|provider| provider.as_ref())
            .ok_or_else(|| FlakeError::ProviderNotFound {
                name: name.to_string(),
            })
    }

    /// Registered provider names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// [`api::create_flake`] through the named provider.
    pub fn create_flake(
        &self,
        provider: &str,
        store: &ObjectStore,
        object: ObjectId,
        options: &ReadOptions,
    ) -> Result<Flake, FlakeError> {
        api::create_flake(self.get(provider)?, store, object, options)
    }

    /// [`api::create_struct_flake`] through the named provider.
    pub fn create_struct_flake(
        &self,
        provider: &str,
        store: &ObjectStore,
        value: &StructValue,
        options: &ReadOptions,
    ) -> Result<Flake, FlakeError> {
        api::create_struct_flake(self.get(provider)?, store, value, options)
    }

    /// [`api::create_actor_flake`] through the named provider.
    pub fn create_actor_flake(
        &self,
        provider: &str,
        store: &ObjectStore,
        actor: ObjectId,
        options: &ReadOptions,
    ) -> Result<ActorFlake, FlakeError> {
        api::create_actor_flake(self.get(provider)?, store, actor, options)
    }

    /// [`api::write_object`] through the named provider.
    pub fn write_object(
        &self,
        provider: &str,
        store: &mut ObjectStore,
        dest: ObjectId,
        flake: &Flake,
        options: &WriteOptions,
    ) -> Result<ReadReport, FlakeError> {
        api::write_object(self.get(provider)?, store, dest, flake, options)
    }

    /// [`api::write_struct`] through the named provider.
    pub fn write_struct(
        &self,
        provider: &str,
        store: &ObjectStore,
        dest: &mut StructValue,
        flake: &Flake,
        options: &WriteOptions,
    ) -> Result<ReadReport, FlakeError> {
        api::write_struct(self.get(provider)?, store, dest, flake, options)
    }

    /// [`api::create_object`] through the named provider.
    pub fn create_object(
        &self,
        provider: &str,
        store: &mut ObjectStore,
        flake: &Flake,
        outer: Option<ObjectId>,
        expected: &str,
    ) -> Result<ObjectId, FlakeError> {
        api::create_object(self.get(provider)?, store, flake, outer, expected)
    }

    /// [`api::create_struct`] through the named provider.
    pub fn create_struct(
        &self,
        provider: &str,
        store: &ObjectStore,
        flake: &Flake,
        expected: &str,
    ) -> Result<StructValue, FlakeError> {
        api::create_struct(self.get(provider)?, store, flake, expected)
    }

    /// [`api::construct_actor`] through the named provider.
    pub fn construct_actor(
        &self,
        provider: &str,
        store: &mut ObjectStore,
        flake: &ActorFlake,
        world: ObjectId,
        expected: &str,
    ) -> Result<ObjectId, FlakeError> {
        api::construct_actor(self.get(provider)?, store, flake, world, expected)
    }
}
