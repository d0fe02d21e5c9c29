//! The interpreted engine: a tree of closures mirroring the destination
//! routes, run per call with source sub-paths memoized for that call.

use std::sync::Arc;

use remap_core::{Accessor, TypeId, Universe, Value};

use crate::error::Fault;
use crate::plan::{MappingPlan, NodeSpec, ValueSource};
use crate::route::RouteId;
use crate::tracing_macros::debug;
use crate::{MapError, MapperConfig, MappingContext, Resolver};

/// How to read one source route from its parent's value.
struct Reader {
    parent: RouteId,
    accessor: Accessor,
    fault: Fault,
}

/// Per-call state: the source object and the values read so far.
struct Frame<'a> {
    readers: &'a [Option<Reader>],
    source: &'a Value,
    cells: Vec<Option<Value>>,
}

impl Frame<'_> {
    /// The value at source route `id`, read at most once per call.
    fn read(&mut self, id: RouteId) -> Result<Value, MapError> {
        if let Some(value) = &self.cells[id.index()] {
            return Ok(value.clone());
        }
        let readers = self.readers;
        let value = match &readers[id.index()] {
            None => self.source.clone(),
            Some(reader) => {
                let parent = self.read(reader.parent)?;
                reader
                    .accessor
                    .get(&parent)
                    .map_err(|e| reader.fault.wrap(e))?
            }
        };
        self.cells[id.index()] = Some(value.clone());
        Ok(value)
    }
}

enum Step {
    Descend(Value),
    Skip,
}

type Action = Box<dyn Fn(&mut Frame<'_>, &Value) -> Result<Step, MapError> + Send + Sync>;

fn action(
    f: impl Fn(&mut Frame<'_>, &Value) -> Result<Step, MapError> + Send + Sync + 'static,
) -> Action {
    Box::new(f)
}

struct CallNode {
    path: String,
    action: Action,
    children: Vec<CallNode>,
}

impl CallNode {
    fn run(&self, frame: &mut Frame<'_>, parent: &Value) -> Result<(), MapError> {
        if let Step::Descend(current) = (self.action)(frame, parent)? {
            for child in &self.children {
                child.run(frame, &current)?;
            }
        }
        Ok(())
    }

    fn render(&self, f: &mut core::fmt::Formatter<'_>, depth: usize) -> core::fmt::Result {
        writeln!(f, "{:indent$}{}", "", self.path, indent = depth * 2)?;
        for child in &self.children {
            child.render(f, depth + 1)?;
        }
        Ok(())
    }
}

/// A built interpreted mapping.
pub struct CallStack {
    source: TypeId,
    destination: TypeId,
    universe: Arc<Universe>,
    readers: Vec<Option<Reader>>,
    roots: Vec<CallNode>,
    conversion: Option<Arc<Resolver>>,
}

impl CallStack {
    pub(crate) fn build(cx: &MappingContext, plan: &MappingPlan) -> Result<Self, MapError> {
        let universe = cx.universe().clone();
        let pair = cx.pair();

        let src = plan.source_routes();
        let mut readers = Vec::with_capacity(src.len());
        for id in src.ids() {
            let route = src.get(id);
            readers.push(match route.parent() {
                None => None,
                Some(parent) => Some(Reader {
                    parent,
                    accessor: member(&universe, route.owner_type(), route.key())?,
                    fault: Fault::new(src.get(parent).path(), pair),
                }),
            });
        }

        let builder = Builder {
            cx,
            plan,
            config: cx.config().clone(),
        };
        let roots = plan
            .members()
            .map(|id| builder.node(id))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "built call stack {} -> {} with {} top-level nodes",
            universe.name(cx.source()),
            universe.name(cx.destination()),
            roots.len()
        );
        Ok(Self {
            source: cx.source(),
            destination: cx.destination(),
            universe,
            readers,
            roots,
            conversion: plan.conversion().cloned(),
        })
    }

    /// Source type.
    pub fn source(&self) -> TypeId {
        self.source
    }

    /// Destination type.
    pub fn destination(&self) -> TypeId {
        self.destination
    }

    /// Map `source` into `destination`, constructing the destination when
    /// it is null. A null source leaves the destination unchanged; a pair
    /// converted as a whole returns the converted value.
    pub fn call(&self, source: &Value, destination: &Value) -> Result<Value, MapError> {
        if source.is_null() {
            return Ok(destination.clone());
        }
        if let Some(conversion) = &self.conversion {
            return conversion.resolve(&self.universe, source);
        }
        let destination = if destination.is_null() {
            self.universe.construct(self.destination)?
        } else {
            destination.clone()
        };
        let mut frame = Frame {
            readers: &self.readers,
            source,
            cells: vec![None; self.readers.len()],
        };
        for node in &self.roots {
            node.run(&mut frame, &destination)?;
        }
        Ok(destination)
    }
}

impl core::fmt::Debug for CallStack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.conversion.is_some() {
            writeln!(f, "<root>")?;
        }
        for node in &self.roots {
            node.render(f, 0)?;
        }
        Ok(())
    }
}

pub(crate) fn member(universe: &Universe, owner: TypeId, key: &str) -> Result<Accessor, MapError> {
    universe
        .accessors(owner)
        .get(key)
        .cloned()
        .ok_or_else(|| crate::route::unknown_member(universe, owner, key))
}

struct Builder<'a> {
    cx: &'a MappingContext,
    plan: &'a MappingPlan,
    config: MapperConfig,
}

impl Builder<'_> {
    fn node(&self, id: RouteId) -> Result<CallNode, MapError> {
        let universe = self.cx.universe().clone();
        let dst = self.plan.destination_routes();
        let route = dst.get(id);
        let parent = route.parent().unwrap_or(RouteId::ROOT);
        let accessor = member(&universe, route.owner_type(), route.key())?;
        // reads and writes of this member fail on a null parent
        let fault = Fault::new(dst.get(parent).path(), self.cx.pair());
        let ty = route.ty();
        let default = universe.default_value(ty);
        let ignore_defaults = self.config.ignore_default_values;
        let initialize = self.config.initialize_null_values;
        let NodeSpec {
            compute,
            guard,
            explicit_below,
        } = self.plan.spec(id).cloned().unwrap_or(NodeSpec {
            compute: None,
            guard: None,
            explicit_below: false,
        });
        let descend = !route.is_leaf();

        let children = route
            .children()
            .map(|child| self.node(child))
            .collect::<Result<Vec<_>, _>>()?;

        let store = {
            let accessor = accessor.clone();
            let fault = fault.clone();
            move |parent: &Value, value: Value| -> Result<(), MapError> {
                if ignore_defaults && value == default {
                    return Ok(());
                }
                accessor.set(parent, value).map_err(|e| fault.wrap(e))
            }
        };
        let enter = {
            let universe = universe.clone();
            move |parent: &Value| -> Result<Step, MapError> {
                if !descend {
                    return Ok(Step::Skip);
                }
                let current = accessor.get(parent).map_err(|e| fault.wrap(e))?;
                if !current.is_null() {
                    return Ok(Step::Descend(current));
                }
                if initialize {
                    let fresh = universe.construct(ty)?;
                    accessor
                        .set(parent, fresh.clone())
                        .map_err(|e| fault.wrap(e))?;
                    Ok(Step::Descend(fresh))
                } else if explicit_below {
                    // children report the null themselves
                    Ok(Step::Descend(Value::Null))
                } else {
                    Ok(Step::Skip)
                }
            }
        };

        let action = match (compute, guard) {
            (Some((value_source, resolver)), _) => action(move |frame, parent| {
                let raw = match &value_source {
                    ValueSource::Route(s) => frame.read(*s)?,
                    ValueSource::Selector(selector) => selector.call(frame.source)?,
                };
                let value = match &resolver {
                    Some(resolver) => resolver.resolve(&universe, &raw)?,
                    None => raw,
                };
                store(parent, value)?;
                enter(parent)
            }),
            (None, Some(s)) => action(move |frame, parent| {
                if frame.read(s)?.is_null() {
                    store(parent, Value::Null)?;
                    return Ok(Step::Skip);
                }
                enter(parent)
            }),
            (None, None) => action(move |_, parent| enter(parent)),
        };

        Ok(CallNode {
            path: route.path().to_owned(),
            action,
            children,
        })
    }
}
