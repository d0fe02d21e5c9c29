use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use indexmap::IndexMap;
use remap_core::{TypeId, Universe, Value};

use crate::compile::{CompiledMapping, Compiler};
use crate::interp::CallStack;
use crate::mapper::{MapperShared, context_in};
use crate::plan::{RemapRecord, find_remap};
use crate::route::{Binding, RouteId, RouteTree, Selector};
use crate::tracing_macros::debug;
use crate::{Engine, MapError, MapperConfig, MappingPlan, Resolver, ResolverRegistry};

struct ContextState {
    source_routes: RouteTree,
    destination_routes: RouteTree,
    remaps: IndexMap<String, RemapRecord>,
    plan: Option<Arc<MappingPlan>>,
    call_stack: Option<Arc<CallStack>>,
    compiled: Option<Arc<CompiledMapping>>,
    /// Bumped by every registration; derived artifacts built from an older
    /// generation are not stored.
    generation: u64,
}

impl ContextState {
    fn invalidate(&mut self) {
        self.plan = None;
        self.call_stack = None;
        self.generation += 1;
    }
}

struct Building<'a>(&'a AtomicUsize);

impl<'a> Building<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Building<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The mapping configuration of one `(source, destination)` type pair.
///
/// Holds the explicit remaps, the resolver registry, and the lazily built
/// plan, call stack and compiled function. Registration and compilation
/// are serialized; running a built mapping takes no lock.
pub struct MappingContext {
    source: TypeId,
    destination: TypeId,
    universe: Arc<Universe>,
    config: MapperConfig,
    mapper: Weak<MapperShared>,
    pair: Arc<(String, String)>,
    registry: ResolverRegistry,
    building: AtomicUsize,
    state: Mutex<ContextState>,
}

impl MappingContext {
    pub(crate) fn new(
        mapper: Weak<MapperShared>,
        universe: Arc<Universe>,
        config: MapperConfig,
        source: TypeId,
        destination: TypeId,
    ) -> Self {
        let pair = Arc::new((
            universe.name(source).to_owned(),
            universe.name(destination).to_owned(),
        ));
        let state = ContextState {
            source_routes: RouteTree::new(source, config.separator),
            destination_routes: RouteTree::new(destination, config.separator),
            remaps: IndexMap::new(),
            plan: None,
            call_stack: None,
            compiled: None,
            generation: 0,
        };
        Self {
            source,
            destination,
            universe,
            config,
            mapper,
            pair,
            registry: ResolverRegistry::new(),
            building: AtomicUsize::new(0),
            state: Mutex::new(state),
        }
    }

    /// Source type.
    pub fn source(&self) -> TypeId {
        self.source
    }

    /// Destination type.
    pub fn destination(&self) -> TypeId {
        self.destination
    }

    /// The universe both types belong to.
    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    /// The mapper's configuration.
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// This context's resolver cache.
    pub fn registry(&self) -> &ResolverRegistry {
        &self.registry
    }

    pub(crate) fn pair(&self) -> &Arc<(String, String)> {
        &self.pair
    }

    fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn frozen(&self) -> MapError {
        MapError::ContextFrozen {
            source: self.pair.0.clone(),
            destination: self.pair.1.clone(),
        }
    }

    /// Whether the compiled function exists; registration is rejected then.
    pub fn is_compiled(&self) -> bool {
        self.lock().compiled.is_some()
    }

    /// Whether this context's plan or function is being assembled right now.
    pub fn is_building(&self) -> bool {
        self.building.load(Ordering::SeqCst) > 0
    }

    /// Fill `destination_path` from `source_path`.
    pub fn remap(&self, source_path: &str, destination_path: &str) -> Result<(), MapError> {
        self.add(Some(source_path), None, destination_path, None)
    }

    /// Fill `destination_path` from `source_path` through `resolver`.
    pub fn remap_with(
        &self,
        source_path: &str,
        destination_path: &str,
        resolver: Arc<Resolver>,
    ) -> Result<(), MapError> {
        self.add(Some(source_path), None, destination_path, Some(resolver))
    }

    /// Fill `destination_path` with what `selector` computes from the whole source.
    pub fn remap_from(&self, selector: Selector, destination_path: &str) -> Result<(), MapError> {
        self.add(None, Some(selector), destination_path, None)
    }

    /// Like [`MappingContext::remap_from`], converting the selected value
    /// through `resolver`.
    pub fn remap_from_with(
        &self,
        selector: Selector,
        destination_path: &str,
        resolver: Arc<Resolver>,
    ) -> Result<(), MapError> {
        self.add(None, Some(selector), destination_path, Some(resolver))
    }

    fn add(
        &self,
        source_path: Option<&str>,
        selector: Option<Selector>,
        destination_path: &str,
        resolver: Option<Arc<Resolver>>,
    ) -> Result<(), MapError> {
        let mut state = self.lock();
        if state.compiled.is_some() {
            return Err(self.frozen());
        }

        // parse into copies so a bad path leaves nothing behind
        let mut src = state.source_routes.clone();
        let mut dst = state.destination_routes.clone();
        let d = dst.parse(&self.universe, destination_path)?;
        if d == RouteId::ROOT {
            return Err(MapError::UnknownMember {
                ty: self.pair.1.clone(),
                member: destination_path.to_owned(),
                suggestion: None,
            });
        }
        let (binding, source_path) = match (source_path, selector) {
            (_, Some(selector)) => (Binding::Selector(selector.clone()), None),
            (Some(path), None) => {
                let s = src.parse(&self.universe, path)?;
                src.mark_explicit(s);
                (Binding::Source(s), Some(src.get(s).path().to_owned()))
            }
            (None, None) => return Err(MapError::NotImplemented("remap without a source")),
        };
        let selector = match &binding {
            Binding::Selector(selector) => Some(selector.clone()),
            Binding::Source(_) => None,
        };
        dst.bind(d, binding, resolver.clone(), false);
        let destination_path = dst.get(d).path().to_owned();

        debug!(
            "{} -> {}: remap {:?} -> {destination_path}",
            self.pair.0, self.pair.1, source_path
        );
        state.remaps.insert(
            destination_path.clone(),
            RemapRecord {
                source_path,
                destination_path,
                resolver,
                selector,
            },
        );
        state.source_routes = src;
        state.destination_routes = dst;
        state.invalidate();
        Ok(())
    }

    /// Pre-register `resolver` for its type pair in this context.
    pub fn register_resolver(&self, resolver: Arc<Resolver>) -> Result<(), MapError> {
        let mut state = self.lock();
        if state.compiled.is_some() {
            return Err(self.frozen());
        }
        self.registry.register(resolver);
        state.invalidate();
        Ok(())
    }

    /// The resolver converting `source` into `destination` for the member
    /// at `path`, built and cached on first request.
    pub fn resolver(
        &self,
        path: &str,
        source: TypeId,
        destination: TypeId,
        explicit: Option<&Arc<Resolver>>,
    ) -> Result<Arc<Resolver>, MapError> {
        self.registry
            .get_or_create(self, source, destination, explicit)?
            .ok_or_else(|| MapError::InvalidTypeBinding {
                path: path.to_owned(),
                source: self.universe.name(source).to_owned(),
                destination: self.universe.name(destination).to_owned(),
            })
    }

    /// The context for an element pair, from the same mapper.
    pub(crate) fn nested(
        &self,
        source: TypeId,
        destination: TypeId,
    ) -> Result<Arc<MappingContext>, MapError> {
        let mapper = self.mapper.upgrade().ok_or(MapError::MapperDropped)?;
        Ok(context_in(&mapper, source, destination))
    }

    /// The mapping plan, derived once per configuration.
    pub fn plan(&self) -> Result<Arc<MappingPlan>, MapError> {
        let (src, dst, remaps, generation) = {
            let state = self.lock();
            if let Some(plan) = &state.plan {
                return Ok(plan.clone());
            }
            (
                state.source_routes.clone(),
                state.destination_routes.clone(),
                state.remaps.values().cloned().collect(),
                state.generation,
            )
        };
        // planning can reach this context again through element mappings
        let building = Building::enter(&self.building);
        let plan = Arc::new(MappingPlan::build(self, src, dst, remaps)?);
        drop(building);
        let mut state = self.lock();
        if state.generation != generation {
            return Ok(plan);
        }
        Ok(state.plan.get_or_insert(plan).clone())
    }

    /// The interpreted engine for this context, built once per configuration.
    pub fn call_stack(&self) -> Result<Arc<CallStack>, MapError> {
        let (cached, generation) = {
            let state = self.lock();
            (state.call_stack.clone(), state.generation)
        };
        if let Some(call_stack) = cached {
            return Ok(call_stack);
        }
        let plan = self.plan()?;
        let call_stack = Arc::new(CallStack::build(self, &plan)?);
        let mut state = self.lock();
        if state.generation != generation {
            return Ok(call_stack);
        }
        Ok(state.call_stack.get_or_insert(call_stack).clone())
    }

    /// The compiled function. Compiling twice returns the same function;
    /// afterwards the context rejects further registration.
    pub fn compile(&self) -> Result<Arc<CompiledMapping>, MapError> {
        let (cached, generation) = {
            let state = self.lock();
            (state.compiled.clone(), state.generation)
        };
        if let Some(compiled) = cached {
            return Ok(compiled);
        }

        let _building = Building::enter(&self.building);
        debug!("compiling {} -> {}", self.pair.0, self.pair.1);
        let mut compiler = Compiler::new(self.universe.clone());
        let lambda = compiler.assemble(self)?;
        let compiled = Arc::new(CompiledMapping::new(
            self.source,
            self.destination,
            lambda,
            self.universe.clone(),
        )?);
        debug!("compiled {} -> {}", self.pair.0, self.pair.1);

        let mut state = self.lock();
        if state.generation != generation {
            return Ok(compiled);
        }
        Ok(state.compiled.get_or_insert(compiled).clone())
    }

    /// Map `source` into a new destination value with the configured engine.
    pub fn map(&self, source: &Value) -> Result<Value, MapError> {
        self.map_with(self.config.engine, source, &Value::Null)
    }

    /// Map `source` into an existing `destination` with the configured engine.
    pub fn map_into(&self, source: &Value, destination: &Value) -> Result<Value, MapError> {
        self.map_with(self.config.engine, source, destination)
    }

    /// Map with an explicitly chosen engine.
    pub fn map_with(
        &self,
        engine: Engine,
        source: &Value,
        destination: &Value,
    ) -> Result<Value, MapError> {
        match engine {
            Engine::Interpreted => self.call_stack()?.call(source, destination),
            Engine::Compiled => self.compile()?.call(source, destination),
        }
    }

    /// The remap consuming `source_path`, if any.
    pub fn source_for(&self, source_path: &str) -> Result<Option<RemapRecord>, MapError> {
        let state = self.lock();
        let path = state.source_routes.normalize(source_path);
        Ok(find_remap(state.remaps.values(), &path)?.cloned())
    }

    /// Drop the resolver cache and every derived artifact. Explicit remaps
    /// are kept and the context accepts registrations again.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.invalidate();
        state.compiled = None;
        self.registry.clear();
    }
}

impl core::fmt::Debug for MappingContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MappingContext")
            .field("source", &self.pair.0)
            .field("destination", &self.pair.1)
            .finish_non_exhaustive()
    }
}
