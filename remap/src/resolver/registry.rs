use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use remap_core::TypeId;

use super::{Conversion, ElementConversion, Enumerable, Resolver, ResolverKind};
use crate::tracing_macros::{debug, trace};
use crate::{MapError, MappingContext};

/// Per-context cache of resolvers, keyed by `(source, destination)`.
///
/// Misses run a factory chain where the first matching rule wins:
/// sequences, identity, enums, scalars. A miss with no matching rule is
/// not cached.
#[derive(Debug, Default)]
pub struct ResolverRegistry {
    cache: RwLock<HashMap<(TypeId, TypeId), Arc<Resolver>>>,
}

impl ResolverRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register `resolver` for its pair, replacing any cached one.
    pub fn register(&self, resolver: Arc<Resolver>) {
        let key = (resolver.source(), resolver.destination());
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, resolver);
    }

    /// The cached resolver for a pair, without running the factory chain.
    pub fn get(&self, source: TypeId, destination: TypeId) -> Option<Arc<Resolver>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(source, destination))
            .cloned()
    }

    /// Number of cached resolvers.
    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached resolver.
    pub fn clear(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Find or build the resolver for `source -> destination`.
    ///
    /// An `explicit` resolver wins for every pair except sequence pairs of
    /// different types, where it converts the elements instead (when its
    /// types match the element types). Returns `Ok(None)` when nothing
    /// applies.
    pub fn get_or_create(
        &self,
        cx: &MappingContext,
        source: TypeId,
        destination: TypeId,
        explicit: Option<&Arc<Resolver>>,
    ) -> Result<Option<Arc<Resolver>>, MapError> {
        let universe = cx.universe();
        let sequences = universe
            .element(source)
            .zip(universe.element(destination));

        if let Some(explicit) = explicit {
            let exact = explicit.source() == source && explicit.destination() == destination;
            match sequences {
                Some(_) if !exact => {
                    let built = self.enumerable(cx, source, destination, Some(explicit))?;
                    return Ok(built.map(Arc::new));
                }
                _ => return Ok(Some(explicit.clone())),
            }
        }

        if let Some(hit) = self.get(source, destination) {
            return Ok(Some(hit));
        }

        let created = if sequences.is_some() {
            trace!("{} -> {}: sequence rule", universe.name(source), universe.name(destination));
            self.enumerable(cx, source, destination, None)?
        } else {
            Resolver::convert(universe, source, destination)
        };
        let Some(created) = created else {
            debug!(
                "no resolver for {} -> {}",
                universe.name(source),
                universe.name(destination)
            );
            return Ok(None);
        };

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        // a racing creator may have filled the slot first; keep theirs
        let entry = cache
            .entry((source, destination))
            .or_insert_with(|| Arc::new(created));
        Ok(Some(entry.clone()))
    }

    fn enumerable(
        &self,
        cx: &MappingContext,
        source: TypeId,
        destination: TypeId,
        explicit: Option<&Arc<Resolver>>,
    ) -> Result<Option<Resolver>, MapError> {
        let universe = cx.universe();
        let (Some(se), Some(de)) = (universe.element(source), universe.element(destination)) else {
            return Ok(None);
        };

        let element = match explicit {
            Some(r) if r.source() == se && r.destination() == de => {
                ElementConversion::Resolver(r.clone())
            }
            _ if se == de => ElementConversion::Identity,
            _ if universe.is_struct(se) && universe.is_struct(de) => {
                let nested = cx.nested(se, de)?;
                if cx.config().compile_inner_maps && !nested.is_building() {
                    debug!(
                        "compiling element mapping {} -> {} eagerly",
                        universe.name(se),
                        universe.name(de)
                    );
                    nested.compile()?;
                }
                ElementConversion::Nested(Arc::downgrade(&nested))
            }
            _ => match self.get_or_create(cx, se, de, None)? {
                Some(r) => ElementConversion::Resolver(r),
                None => return Ok(None),
            },
        };

        // an identity element resolver behaves like a plain copy
        let element = match element {
            ElementConversion::Resolver(r)
                if matches!(r.kind(), ResolverKind::ChangeType(Conversion::Identity)) =>
            {
                ElementConversion::Identity
            }
            other => other,
        };

        Ok(Some(Resolver::new(
            source,
            destination,
            ResolverKind::Enumerable(Enumerable {
                destination,
                fixed: universe.is_array(destination),
                element_source: se,
                element_destination: de,
                element,
            }),
        )))
    }
}
