use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use remap_core::{TypeId, Universe, Value};

use crate::tracing_macros::debug;
use crate::{MapError, MapperConfig, MappingContext};

pub(crate) struct MapperShared {
    universe: Arc<Universe>,
    config: MapperConfig,
    contexts: RwLock<HashMap<(TypeId, TypeId), Arc<MappingContext>>>,
}

/// Entry point: owns one [`MappingContext`] per type pair.
///
/// Cloning a mapper is cheap; clones share their contexts.
#[derive(Clone)]
pub struct Mapper {
    shared: Arc<MapperShared>,
}

pub(crate) fn context_in(
    shared: &Arc<MapperShared>,
    source: TypeId,
    destination: TypeId,
) -> Arc<MappingContext> {
    let key = (source, destination);
    if let Some(cx) = shared
        .contexts
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return cx.clone();
    }
    let mut contexts = shared
        .contexts
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    contexts
        .entry(key)
        .or_insert_with(|| {
            debug!(
                "new context {} -> {}",
                shared.universe.name(source),
                shared.universe.name(destination)
            );
            Arc::new(MappingContext::new(
                Arc::downgrade(shared),
                shared.universe.clone(),
                shared.config.clone(),
                source,
                destination,
            ))
        })
        .clone()
}

impl Mapper {
    /// A mapper over the types of `universe`.
    pub fn new(universe: Arc<Universe>, config: MapperConfig) -> Self {
        Self {
            shared: Arc::new(MapperShared {
                universe,
                config,
                contexts: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// The type universe.
    pub fn universe(&self) -> &Arc<Universe> {
        &self.shared.universe
    }

    /// The configuration shared by every context.
    pub fn config(&self) -> &MapperConfig {
        &self.shared.config
    }

    /// The context for `source -> destination`, created on first request.
    pub fn context(&self, source: TypeId, destination: TypeId) -> Arc<MappingContext> {
        context_in(&self.shared, source, destination)
    }

    /// Map `source` to a new value of type `destination`, using the
    /// source's runtime type to pick the context. Null maps to null.
    pub fn map(&self, source: &Value, destination: TypeId) -> Result<Value, MapError> {
        match self.shared.universe.type_of(source) {
            None => Ok(Value::Null),
            Some(ty) => self.context(ty, destination).map(source),
        }
    }

    /// Number of contexts created so far.
    pub fn len(&self) -> usize {
        self.shared
            .contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no context was created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every context along with its registry, routes, call stack and
    /// compiled function.
    pub fn clear(&self) {
        let drained: Vec<Arc<MappingContext>> = self
            .shared
            .contexts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, cx)| cx)
            .collect();
        debug!("clearing {} contexts", drained.len());
        for cx in drained {
            cx.clear();
        }
    }
}

impl core::fmt::Debug for Mapper {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mapper")
            .field("config", &self.shared.config)
            .field("contexts", &self.len())
            .finish()
    }
}
