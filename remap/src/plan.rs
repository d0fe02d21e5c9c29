//! The mapping plan: which destination members are filled how.

use std::sync::Arc;

use indexmap::IndexSet;
use remap_core::TypeId;

use crate::route::{Binding, RouteId, RouteTree, Selector};
use crate::tracing_macros::{debug, trace};
use crate::{MapError, MappingContext, Resolver};

/// One explicit remap registration.
#[derive(Debug, Clone)]
pub struct RemapRecord {
    /// Source path, or `None` when a selector supplies the value.
    pub source_path: Option<String>,
    /// Destination path, unique across records.
    pub destination_path: String,
    /// Resolver to apply to the value.
    pub resolver: Option<Arc<Resolver>>,
    /// Selector supplying the value.
    pub selector: Option<Selector>,
}

/// Find the record consuming `source_path`.
pub(crate) fn find_remap<'a>(
    records: impl Iterator<Item = &'a RemapRecord>,
    source_path: &str,
) -> Result<Option<&'a RemapRecord>, MapError> {
    let matching: Vec<&RemapRecord> = records
        .filter(|r| r.source_path.as_deref() == Some(source_path))
        .collect();
    match matching.as_slice() {
        [] => Ok(None),
        [one] => Ok(Some(one)),
        many => Err(MapError::AmbiguousResolution {
            source_path: source_path.to_owned(),
            candidates: many.iter().map(|r| r.destination_path.clone()).collect(),
        }),
    }
}

#[derive(Debug, Clone)]
pub(crate) enum ValueSource {
    Route(RouteId),
    Selector(Selector),
}

/// What an engine does at one destination route.
#[derive(Debug, Clone)]
pub(crate) struct NodeSpec {
    /// Compute a value, convert it, store it into the member.
    pub(crate) compute: Option<(ValueSource, Option<Arc<Resolver>>)>,
    /// A struct member filled member-by-member: a null source stores null
    /// and skips the children.
    pub(crate) guard: Option<RouteId>,
    /// Whether a caller registered something at or below this route.
    pub(crate) explicit_below: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Match {
    Direct,
    Resolver,
    Loop,
    Nested,
}

/// Classification of a type pair's members, plus the explicit remaps.
///
/// The route trees held here are the registered ones completed with
/// routes discovered by name matching.
#[derive(Debug)]
pub struct MappingPlan {
    source: TypeId,
    destination: TypeId,
    direct: IndexSet<String>,
    needs_resolver: IndexSet<String>,
    loops: IndexSet<String>,
    remapped: IndexSet<String>,
    conversion: Option<Arc<Resolver>>,
    remaps: Vec<RemapRecord>,
    source_routes: RouteTree,
    destination_routes: RouteTree,
    order: Vec<RouteId>,
    specs: Vec<Option<NodeSpec>>,
}

impl MappingPlan {
    pub(crate) fn build(
        cx: &MappingContext,
        mut src: RouteTree,
        mut dst: RouteTree,
        remaps: Vec<RemapRecord>,
    ) -> Result<Self, MapError> {
        let universe = cx.universe().clone();
        let separator = cx.config().separator;
        let (source, destination) = (cx.source(), cx.destination());

        let mut direct = IndexSet::new();
        let mut needs_resolver = IndexSet::new();
        let mut loops = IndexSet::new();
        let mut remapped: IndexSet<String> = remaps
            .iter()
            .filter_map(|r| r.destination_path.split(separator).next())
            .map(str::to_owned)
            .collect();

        let structs = universe.is_struct(source) && universe.is_struct(destination);
        // any other pair is converted as a whole by one resolver
        let conversion = if structs {
            None
        } else {
            Some(cx.resolver("", source, destination, None)?)
        };

        if structs {
            let src_table = universe.accessors(source);
            for accessor in universe.accessors(destination).iter() {
                let name = accessor.name();
                if !accessor.can_write() || remapped.contains(name) {
                    continue;
                }
                let Some(from) = src_table.get(name).filter(|a| a.can_read()) else {
                    continue;
                };
                let Some(kind) = classify(cx, from.declared_type(), accessor.declared_type())? else {
                    debug!("{name}: no conversion, skipped");
                    continue;
                };
                // nested members are filled in place, which needs a getter
                if kind == Match::Nested && !accessor.can_read() {
                    debug!("{name}: write-only struct member, skipped");
                    continue;
                }
                trace!("{name}: {kind:?}");
                let s = src.child(&universe, RouteId::ROOT, name)?;
                let d = dst.child(&universe, RouteId::ROOT, name)?;
                dst.bind(d, Binding::Source(s), None, true);
                match kind {
                    Match::Direct => direct.insert(name.to_owned()),
                    Match::Resolver => needs_resolver.insert(name.to_owned()),
                    Match::Loop => loops.insert(name.to_owned()),
                    Match::Nested => {
                        let mut stack = vec![
                            (source, destination),
                            (from.declared_type(), accessor.declared_type()),
                        ];
                        expand(cx, &mut src, &mut dst, s, d, &mut stack)?;
                        remapped.insert(name.to_owned())
                    }
                };
            }
        }

        // explicit struct-to-struct remaps are completed by name as well
        let explicit: Vec<(RouteId, RouteId)> = dst
            .ids()
            .filter(|id| !dst.get(*id).auto_generated())
            .filter_map(|id| dst.get(id).source_route().map(|s| (s, id)))
            .filter(|(s, d)| {
                let (s_ty, d_ty) = (src.get(*s).ty(), dst.get(*d).ty());
                s_ty != d_ty
                    && universe.is_struct(s_ty)
                    && universe.is_struct(d_ty)
                    && dst.get(*d).resolver().is_none()
            })
            .collect();
        for (s, d) in explicit {
            let mut stack = vec![(source, destination), (src.get(s).ty(), dst.get(d).ty())];
            expand(cx, &mut src, &mut dst, s, d, &mut stack)?;
        }

        let root = dst.get(RouteId::ROOT);
        let order = direct
            .iter()
            .chain(&needs_resolver)
            .chain(&loops)
            .chain(&remapped)
            .filter_map(|name| root.child(name))
            .collect();

        let mut specs = Vec::with_capacity(dst.len());
        for id in dst.ids() {
            specs.push(if id == RouteId::ROOT {
                None
            } else {
                Some(node_spec(cx, &src, &dst, id)?)
            });
        }

        debug!(
            "plan {} -> {}: {} direct, {} resolved, {} loops, {} remapped",
            universe.name(source),
            universe.name(destination),
            direct.len(),
            needs_resolver.len(),
            loops.len(),
            remapped.len()
        );

        Ok(Self {
            source,
            destination,
            direct,
            needs_resolver,
            loops,
            remapped,
            conversion,
            remaps,
            source_routes: src,
            destination_routes: dst,
            order,
            specs,
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

    /// Members assigned as they are.
    pub fn direct(&self) -> &IndexSet<String> {
        &self.direct
    }

    /// Members converted by a single-value resolver.
    pub fn needs_resolver(&self) -> &IndexSet<String> {
        &self.needs_resolver
    }

    /// Sequence members, converted element by element.
    pub fn loops(&self) -> &IndexSet<String> {
        &self.loops
    }

    /// Members filled through nested routes: explicit remaps and
    /// struct members matched by name.
    pub fn remapped(&self) -> &IndexSet<String> {
        &self.remapped
    }

    /// The resolver converting the whole value when the pair is not
    /// struct to struct. Such a plan has no members.
    pub fn conversion(&self) -> Option<&Arc<Resolver>> {
        self.conversion.as_ref()
    }

    /// Explicit remap records, in registration order.
    pub fn remaps(&self) -> &[RemapRecord] {
        &self.remaps
    }

    /// The complete source route tree.
    pub fn source_routes(&self) -> &RouteTree {
        &self.source_routes
    }

    /// The complete destination route tree.
    pub fn destination_routes(&self) -> &RouteTree {
        &self.destination_routes
    }

    /// Top-level destination routes in execution order: direct members,
    /// resolved members, loops, then remapped members.
    pub fn members(&self) -> impl ExactSizeIterator<Item = RouteId> + '_ {
        self.order.iter().copied()
    }

    /// The remap record consuming `source_path`.
    pub fn source_for(&self, source_path: &str) -> Result<Option<&RemapRecord>, MapError> {
        let path = self.source_routes.normalize(source_path);
        find_remap(self.remaps.iter(), &path)
    }

    pub(crate) fn spec(&self, id: RouteId) -> Option<&NodeSpec> {
        self.specs.get(id.index()).and_then(Option::as_ref)
    }
}

fn classify(cx: &MappingContext, source: TypeId, destination: TypeId) -> Result<Option<Match>, MapError> {
    let universe = cx.universe();
    let feasible = || match cx.registry().get_or_create(cx, source, destination, None) {
        Ok(found) => Ok(found.is_some()),
        Err(MapError::InvalidTypeBinding { .. }) => Ok(false),
        Err(other) => Err(other),
    };
    if universe.element(source).is_some() && universe.element(destination).is_some() {
        return Ok(feasible()?.then_some(Match::Loop));
    }
    if source == destination {
        return Ok(Some(Match::Direct));
    }
    if universe.is_struct(source) && universe.is_struct(destination) {
        return Ok(Some(Match::Nested));
    }
    Ok(feasible()?.then_some(Match::Resolver))
}

/// Match the members of the struct pair at `(s, d)` by name, recursively.
/// Explicit children are left alone; struct pairs already on `stack` are
/// skipped.
fn expand(
    cx: &MappingContext,
    src: &mut RouteTree,
    dst: &mut RouteTree,
    s: RouteId,
    d: RouteId,
    stack: &mut Vec<(TypeId, TypeId)>,
) -> Result<(), MapError> {
    let universe = cx.universe().clone();
    let src_table = universe.accessors(src.get(s).ty());
    let dst_table = universe.accessors(dst.get(d).ty());
    for accessor in dst_table.iter() {
        let name = accessor.name();
        if !accessor.can_write() || dst.get(d).child(name).is_some() {
            continue;
        }
        let Some(from) = src_table.get(name).filter(|a| a.can_read()) else {
            continue;
        };
        let pair = (from.declared_type(), accessor.declared_type());
        let Some(kind) = classify(cx, pair.0, pair.1)? else {
            debug!("{}{}{name}: no conversion, skipped", dst.get(d).path(), src.separator());
            continue;
        };
        if kind == Match::Nested && !accessor.can_read() {
            debug!("{}{}{name}: write-only struct member, skipped", dst.get(d).path(), src.separator());
            continue;
        }
        if kind == Match::Nested && stack.contains(&pair) {
            debug!("{}{}{name}: recursive type pair, skipped", dst.get(d).path(), src.separator());
            continue;
        }
        let s_child = src.child(&universe, s, name)?;
        let d_child = dst.child(&universe, d, name)?;
        dst.bind(d_child, Binding::Source(s_child), None, true);
        if kind == Match::Nested {
            stack.push(pair);
            expand(cx, src, dst, s_child, d_child, stack)?;
            stack.pop();
        }
    }
    Ok(())
}

fn node_spec(
    cx: &MappingContext,
    src: &RouteTree,
    dst: &RouteTree,
    id: RouteId,
) -> Result<NodeSpec, MapError> {
    let universe = cx.universe();
    let route = dst.get(id);
    let explicit_below = dst.explicit_below(id);
    let spec = |compute, guard| NodeSpec {
        compute,
        guard,
        explicit_below,
    };
    Ok(match route.binding() {
        None => spec(None, None),
        Some(Binding::Selector(selector)) => spec(
            Some((ValueSource::Selector(selector.clone()), route.resolver().cloned())),
            None,
        ),
        Some(Binding::Source(s)) => {
            let (s_ty, d_ty) = (src.get(*s).ty(), route.ty());
            let value = ValueSource::Route(*s);
            let sequences = universe.element(s_ty).is_some() && universe.element(d_ty).is_some();
            if let Some(explicit) = route.resolver() {
                let resolver = cx.resolver(route.path(), s_ty, d_ty, Some(explicit))?;
                spec(Some((value, Some(resolver))), None)
            } else if sequences {
                let resolver = cx.resolver(route.path(), s_ty, d_ty, None)?;
                spec(Some((value, Some(resolver))), None)
            } else if s_ty == d_ty {
                spec(Some((value, None)), None)
            } else if universe.is_struct(s_ty) && universe.is_struct(d_ty) {
                spec(None, Some(*s))
            } else {
                let resolver = cx.resolver(route.path(), s_ty, d_ty, None)?;
                spec(Some((value, Some(resolver))), None)
            }
        }
    })
}
