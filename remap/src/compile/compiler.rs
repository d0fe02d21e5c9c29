use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use remap_core::{TypeId, Universe, Value};

use super::ast::{BinaryOp, Callee, Expr, Lambda, MemberRef, TypeRef, Var};
use super::inline::inline;
use crate::error::Fault;
use crate::interp::member;
use crate::plan::{MappingPlan, NodeSpec, ValueSource};
use crate::route::RouteId;
use crate::tracing_macros::trace;
use crate::{MapError, MappingContext};

/// Assembles mapping functions and hands out variable ids.
///
/// Nested element contexts are assembled into the same id space so their
/// functions can be inlined. The type pairs currently being assembled are
/// tracked; a pair met again further down is called, not inlined.
#[derive(Debug)]
pub struct Compiler {
    universe: Arc<Universe>,
    next: u32,
    stack: Vec<(TypeId, TypeId)>,
}

impl Compiler {
    /// A compiler for types of `universe`.
    pub fn new(universe: Arc<Universe>) -> Self {
        Self {
            universe,
            next: 0,
            stack: Vec::new(),
        }
    }

    /// The universe types are resolved against.
    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    /// A fresh variable.
    pub fn var(&mut self) -> Var {
        let var = Var::new(self.next);
        self.next += 1;
        var
    }

    /// Inline `lambda` applied to `args`.
    pub fn inline(&mut self, lambda: Lambda, args: Vec<Expr>) -> Result<Expr, MapError> {
        inline(lambda, args)
    }

    /// Whether the function for `source -> destination` is being assembled.
    pub fn is_assembling(&self, source: TypeId, destination: TypeId) -> bool {
        self.stack.contains(&(source, destination))
    }

    /// Assemble the `(source, destination) -> destination` function of `cx`.
    pub fn assemble(&mut self, cx: &MappingContext) -> Result<Lambda, MapError> {
        let plan = cx.plan()?;
        self.stack.push((cx.source(), cx.destination()));
        let result = FunctionBuilder::new(self, cx, &plan).build();
        self.stack.pop();
        result
    }
}

struct FunctionBuilder<'a> {
    compiler: &'a mut Compiler,
    cx: &'a MappingContext,
    plan: &'a MappingPlan,
    src: Var,
    locals: Vec<Var>,
    /// Value and "already read" flag of each source route read so far.
    reads: HashMap<RouteId, (Var, Var)>,
    /// Source routes certainly read on the current path, one set per
    /// enclosing conditional branch.
    regions: Vec<HashSet<RouteId>>,
}

impl<'a> FunctionBuilder<'a> {
    fn new(compiler: &'a mut Compiler, cx: &'a MappingContext, plan: &'a MappingPlan) -> Self {
        let src = compiler.var();
        Self {
            compiler,
            cx,
            plan,
            src,
            locals: Vec::new(),
            reads: HashMap::new(),
            regions: vec![HashSet::new()],
        }
    }

    fn local(&mut self) -> Var {
        let var = self.compiler.var();
        self.locals.push(var);
        var
    }

    fn ty(&self, id: TypeId) -> TypeRef {
        TypeRef::new(self.cx.universe(), id)
    }

    fn build(mut self) -> Result<Lambda, MapError> {
        let dst = self.compiler.var();
        if let Some(conversion) = self.plan.conversion() {
            let plan = conversion.plan(self.compiler)?;
            let value = self.compiler.inline(plan, vec![Expr::Parameter(self.src)])?;
            return Ok(Lambda {
                params: vec![self.src, dst],
                body: value,
            });
        }
        let root = self.local();
        let mut body = vec![Expr::assign(
            root,
            Expr::conditional(
                Expr::is_null(Expr::Parameter(dst)),
                Expr::New(self.ty(self.plan.destination())),
                Expr::Parameter(dst),
            ),
        )];
        let members: Vec<RouteId> = self.plan.members().collect();
        for id in members {
            self.node(id, &Expr::Local(root), &mut body)?;
        }
        body.push(Expr::Local(root));
        trace!(
            "assembled {} -> {} with {} locals",
            self.cx.universe().name(self.plan.source()),
            self.cx.universe().name(self.plan.destination()),
            self.locals.len()
        );
        Ok(Lambda {
            params: vec![self.src, dst],
            body: Expr::Block {
                locals: self.locals,
                body,
            },
        })
    }

    /// The value of source route `id`, reading it into a local the first
    /// time and reusing the local afterwards.
    fn source(&mut self, id: RouteId, out: &mut Vec<Expr>) -> Result<Expr, MapError> {
        if id == RouteId::ROOT {
            return Ok(Expr::Parameter(self.src));
        }
        if let Some((value, _)) = self.reads.get(&id)
            && self.regions.iter().any(|region| region.contains(&id))
        {
            return Ok(Expr::Local(*value));
        }

        let plan = self.plan;
        let routes = plan.source_routes();
        let route = routes.get(id);
        let parent = route.parent().unwrap_or(RouteId::ROOT);
        let target = self.source(parent, out)?;
        let accessor = member(self.cx.universe(), route.owner_type(), route.key())?;
        let fault = Fault::new(routes.get(parent).path(), self.cx.pair());
        let read = Expr::Member(Box::new(target), MemberRef::new(accessor, fault));

        let value = match self.reads.get(&id).copied() {
            None => {
                let (value, flag) = (self.local(), self.local());
                self.reads.insert(id, (value, flag));
                out.push(Expr::assign(value, read));
                if self.regions.len() > 1 {
                    out.push(Expr::assign(flag, Expr::Constant(Value::Bool(true))));
                }
                value
            }
            // read before, but only on some paths
            Some((value, flag)) => {
                out.push(Expr::when(
                    Expr::not(Expr::Local(flag)),
                    Expr::block(vec![
                        Expr::assign(value, read),
                        Expr::assign(flag, Expr::Constant(Value::Bool(true))),
                    ]),
                ));
                value
            }
        };
        if let Some(region) = self.regions.last_mut() {
            region.insert(id);
        }
        Ok(Expr::Local(value))
    }

    /// Build statements into a branch that may not run.
    fn branch(
        &mut self,
        f: impl FnOnce(&mut Self, &mut Vec<Expr>) -> Result<(), MapError>,
    ) -> Result<Expr, MapError> {
        self.regions.push(HashSet::new());
        let mut inner = Vec::new();
        let result = f(self, &mut inner);
        self.regions.pop();
        result?;
        Ok(Expr::block(inner))
    }

    fn node(&mut self, id: RouteId, parent: &Expr, out: &mut Vec<Expr>) -> Result<(), MapError> {
        let universe = self.cx.universe().clone();
        let plan = self.plan;
        let routes = plan.destination_routes();
        let route = routes.get(id);
        let above = route.parent().unwrap_or(RouteId::ROOT);
        let accessor = member(&universe, route.owner_type(), route.key())?;
        let target = MemberRef::new(accessor, Fault::new(routes.get(above).path(), self.cx.pair()));
        let default = universe.default_value(route.ty());
        let ignore_defaults = self.cx.config().ignore_default_values;
        let NodeSpec {
            compute,
            guard,
            explicit_below,
        } = plan.spec(id).cloned().unwrap_or(NodeSpec {
            compute: None,
            guard: None,
            explicit_below: false,
        });

        if let Some((value_source, resolver)) = compute {
            let raw = match value_source {
                ValueSource::Route(s) => self.source(s, out)?,
                ValueSource::Selector(selector) => {
                    Expr::Call(Callee::Selector(selector), vec![Expr::Parameter(self.src)])
                }
            };
            let value = match resolver {
                Some(resolver) => {
                    let plan = resolver.plan(self.compiler)?;
                    self.compiler.inline(plan, vec![raw])?
                }
                None => raw,
            };
            if ignore_defaults {
                let t = self.local();
                out.push(Expr::assign(t, value));
                out.push(Expr::when(
                    Expr::Binary(
                        BinaryOp::Ne,
                        Box::new(Expr::Local(t)),
                        Box::new(Expr::Constant(default)),
                    ),
                    Expr::SetMember(Box::new(parent.clone()), target.clone(), Box::new(Expr::Local(t))),
                ));
            } else {
                out.push(Expr::SetMember(
                    Box::new(parent.clone()),
                    target.clone(),
                    Box::new(value),
                ));
            }
        } else if let Some(s) = guard {
            let raw = self.source(s, out)?;
            let clear = if ignore_defaults && default.is_null() {
                Expr::null()
            } else {
                Expr::SetMember(
                    Box::new(parent.clone()),
                    target.clone(),
                    Box::new(Expr::null()),
                )
            };
            let fill = self.branch(|this, inner| this.enter(id, parent, &target, explicit_below, inner))?;
            out.push(Expr::conditional(Expr::is_null(raw), clear, fill));
            return Ok(());
        }

        self.enter(id, parent, &target, explicit_below, out)
    }

    /// Navigate into the destination member at `id` and fill its children.
    fn enter(
        &mut self,
        id: RouteId,
        parent: &Expr,
        target: &MemberRef,
        explicit_below: bool,
        out: &mut Vec<Expr>,
    ) -> Result<(), MapError> {
        let plan = self.plan;
        let routes = plan.destination_routes();
        let route = routes.get(id);
        if route.is_leaf() {
            return Ok(());
        }
        let children: Vec<RouteId> = route.children().collect();
        let ty = self.ty(route.ty());

        let current = self.local();
        out.push(Expr::assign(
            current,
            Expr::Member(Box::new(parent.clone()), target.clone()),
        ));
        let here = Expr::Local(current);

        if self.cx.config().initialize_null_values {
            out.push(Expr::when(
                Expr::is_null(here.clone()),
                Expr::block(vec![
                    Expr::assign(current, Expr::New(ty)),
                    Expr::SetMember(Box::new(parent.clone()), target.clone(), Box::new(here.clone())),
                ]),
            ));
        } else if !explicit_below {
            let fill = self.branch(|this, inner| {
                for child in children {
                    this.node(child, &here, inner)?;
                }
                Ok(())
            })?;
            out.push(Expr::when(Expr::not(Expr::is_null(Expr::Local(current))), fill));
            return Ok(());
        }
        // with explicit remaps below, a null member is left for the
        // children to report
        for child in children {
            self.node(child, &here, out)?;
        }
        Ok(())
    }
}
