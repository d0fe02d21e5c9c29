//! Route trees: named steps from a root type down to nested members.
//!
//! A [`RouteTree`] is rooted at one type. Each [`Route`] is one path
//! segment; parsing the same path twice returns the same node. Routes on
//! the destination side may carry a [`Binding`] to where their value
//! comes from and an explicit resolver.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use remap_core::{TypeId, Universe, Value};

use crate::{MapError, Resolver};

/// Index of a route in its [`RouteTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteId(u32);

impl RouteId {
    /// The root route: the whole value.
    pub const ROOT: RouteId = RouteId(0);

    /// Position of this route in its tree.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A user function that computes a value from the whole source object.
#[derive(Clone)]
pub struct Selector(Arc<dyn Fn(&Value) -> Result<Value, MapError> + Send + Sync>);

impl Selector {
    /// Wrap `f`.
    pub fn new(f: impl Fn(&Value) -> Result<Value, MapError> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Run the selector against `source`.
    pub fn call(&self, source: &Value) -> Result<Value, MapError> {
        (self.0)(source)
    }
}

impl core::fmt::Debug for Selector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Selector")
    }
}

/// Where a destination route takes its value from.
#[derive(Debug, Clone)]
pub enum Binding {
    /// A route in the source tree.
    Source(RouteId),
    /// A selector over the whole source object.
    Selector(Selector),
}

/// One segment of a path.
#[derive(Debug, Clone)]
pub struct Route {
    key: String,
    path: String,
    owner: TypeId,
    ty: TypeId,
    parent: Option<RouteId>,
    children: IndexMap<String, RouteId>,
    binding: Option<Binding>,
    resolver: Option<Arc<Resolver>>,
    auto_generated: bool,
}

impl Route {
    /// The segment name (empty for the root).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The full path from the root, joined with the tree's separator.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The type that declares this member (the root type for the root).
    pub fn owner_type(&self) -> TypeId {
        self.owner
    }

    /// The declared type of this member.
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    /// The enclosing route; `None` for the root.
    pub fn parent(&self) -> Option<RouteId> {
        self.parent
    }

    /// Child routes, in creation order.
    pub fn children(&self) -> impl ExactSizeIterator<Item = RouteId> + '_ {
        self.children.values().copied()
    }

    /// The child route for `key`, if it was created.
    pub fn child(&self, key: &str) -> Option<RouteId> {
        self.children.get(key).copied()
    }

    /// Whether recursive descent stops here.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Where this route's value comes from.
    pub fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    /// The linked source route, if bound to one.
    pub fn source_route(&self) -> Option<RouteId> {
        match &self.binding {
            Some(Binding::Source(id)) => Some(*id),
            _ => None,
        }
    }

    /// The explicit resolver bound to this segment.
    pub fn resolver(&self) -> Option<&Arc<Resolver>> {
        self.resolver.as_ref()
    }

    /// True if discovered by name matching, false if registered explicitly.
    pub fn auto_generated(&self) -> bool {
        self.auto_generated
    }
}

/// Routes over one root type, memoized by full path.
#[derive(Debug, Clone)]
pub struct RouteTree {
    separator: char,
    nodes: Vec<Route>,
    index: HashMap<String, RouteId>,
}

impl RouteTree {
    /// A tree holding only the root route of `root`.
    pub fn new(root: TypeId, separator: char) -> Self {
        let root = Route {
            key: String::new(),
            path: String::new(),
            owner: root,
            ty: root,
            parent: None,
            children: IndexMap::new(),
            binding: None,
            resolver: None,
            auto_generated: false,
        };
        let mut index = HashMap::new();
        index.insert(String::new(), RouteId::ROOT);
        Self {
            separator,
            nodes: vec![root],
            index,
        }
    }

    /// The type at the root.
    pub fn root_type(&self) -> TypeId {
        self.nodes[0].ty
    }

    /// The path separator.
    pub fn separator(&self) -> char {
        self.separator
    }

    /// Number of routes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root is always present.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The route at `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` comes from another tree with more routes.
    pub fn get(&self, id: RouteId) -> &Route {
        &self.nodes[id.index()]
    }

    /// Every route id, root first, parents before children.
    pub fn ids(&self) -> impl Iterator<Item = RouteId> {
        (0..self.nodes.len() as u32).map(RouteId)
    }

    fn segments<'p>(&self, path: &'p str) -> impl Iterator<Item = &'p str> {
        path.split(self.separator).filter(|s| !s.is_empty())
    }

    /// Normalize `path`: drop empty segments and rejoin with the separator.
    pub fn normalize(&self, path: &str) -> String {
        let mut out = String::new();
        for segment in self.segments(path) {
            if !out.is_empty() {
                out.push(self.separator);
            }
            out.push_str(segment);
        }
        out
    }

    /// Look up an existing route by path without creating anything.
    pub fn find(&self, path: &str) -> Option<RouteId> {
        self.index.get(&self.normalize(path)).copied()
    }

    /// Walk `path` from the root, creating missing routes.
    ///
    /// Fails with [`MapError::UnknownMember`] if a segment does not exist on
    /// the type it is applied to.
    pub fn parse(&mut self, universe: &Universe, path: &str) -> Result<RouteId, MapError> {
        if let Some(id) = self.find(path) {
            return Ok(id);
        }
        let segments: Vec<String> = self.segments(path).map(str::to_owned).collect();
        let mut current = RouteId::ROOT;
        for segment in &segments {
            current = self.child(universe, current, segment)?;
        }
        Ok(current)
    }

    /// The child `key` of `parent`, created if missing.
    pub fn child(
        &mut self,
        universe: &Universe,
        parent: RouteId,
        key: &str,
    ) -> Result<RouteId, MapError> {
        if let Some(id) = self.get(parent).child(key) {
            return Ok(id);
        }
        let owner = self.get(parent).ty;
        let table = universe.accessors(owner);
        let Some(accessor) = table.get(key) else {
            return Err(unknown_member(universe, owner, key));
        };
        let path = if parent == RouteId::ROOT {
            key.to_owned()
        } else {
            format!("{}{}{}", self.get(parent).path, self.separator, key)
        };
        let id = RouteId(self.nodes.len() as u32);
        self.nodes.push(Route {
            key: key.to_owned(),
            path: path.clone(),
            owner,
            ty: accessor.declared_type(),
            parent: Some(parent),
            children: IndexMap::new(),
            binding: None,
            resolver: None,
            auto_generated: true,
        });
        self.nodes[parent.index()].children.insert(key.to_owned(), id);
        self.index.insert(path, id);
        Ok(id)
    }

    /// Resolve the type at `id` by climbing the accessor tables from the root.
    pub fn resolve_type(&self, universe: &Universe, id: RouteId) -> Result<TypeId, MapError> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current != RouteId::ROOT {
                chain.push(current);
            }
            cursor = self.get(current).parent;
        }
        let mut ty = self.root_type();
        for step in chain.into_iter().rev() {
            let key = &self.get(step).key;
            ty = match universe.accessors(ty).get(key) {
                Some(accessor) => accessor.declared_type(),
                None => return Err(unknown_member(universe, ty, key)),
            };
        }
        Ok(ty)
    }

    /// Bind `id` to a value source. Explicit bindings overwrite earlier
    /// ones and mark the route and its ancestors as explicit.
    pub(crate) fn bind(
        &mut self,
        id: RouteId,
        binding: Binding,
        resolver: Option<Arc<Resolver>>,
        auto_generated: bool,
    ) {
        let route = &mut self.nodes[id.index()];
        route.binding = Some(binding);
        route.resolver = resolver;
        if !auto_generated {
            self.mark_explicit(id);
        }
    }

    /// Mark `id` and its ancestors as registered by the caller.
    pub(crate) fn mark_explicit(&mut self, id: RouteId) {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let route = &mut self.nodes[current.index()];
            route.auto_generated = false;
            cursor = route.parent;
        }
    }

    /// Whether `id` or anything below it was registered by the caller.
    pub fn explicit_below(&self, id: RouteId) -> bool {
        let route = self.get(id);
        !route.auto_generated || route.children().any(|child| self.explicit_below(child))
    }
}

pub(crate) fn unknown_member(universe: &Universe, ty: TypeId, member: &str) -> MapError {
    MapError::UnknownMember {
        ty: universe.name(ty).to_owned(),
        member: member.to_owned(),
        suggestion: suggest(universe, ty, member),
    }
}

#[cfg(feature = "suggestions")]
fn suggest(universe: &Universe, ty: TypeId, member: &str) -> Option<String> {
    const SIMILARITY_THRESHOLD: f64 = 0.6;

    let table = universe.accessors(ty);
    let mut best: Option<(f64, &str)> = None;
    for known in table.names() {
        let similarity = strsim::jaro_winkler(member, known);
        if similarity >= SIMILARITY_THRESHOLD && best.is_none_or(|(score, _)| similarity > score) {
            best = Some((similarity, known));
        }
    }
    best.map(|(_, name)| name.to_owned())
}

#[cfg(not(feature = "suggestions"))]
fn suggest(_universe: &Universe, _ty: TypeId, _member: &str) -> Option<String> {
    None
}
