use std::sync::{Arc, Weak};

use remap_core::{CoreError, TypeId, Universe, Value};

use super::Resolver;
use crate::compile::{Callee, Compiler, Expr, TypeRef, Var};
use crate::{Engine, MapError, MappingContext};

/// How each element of a sequence is converted.
#[derive(Debug, Clone)]
pub enum ElementConversion {
    /// Element types are equal: elements are copied as they are.
    Identity,
    /// A single-value resolver.
    Resolver(Arc<Resolver>),
    /// Element types are structs: a nested mapping context maps each one.
    Nested(Weak<MappingContext>),
}

/// Sequence-to-sequence conversion.
///
/// Fixed-size destinations are sized to the source and filled by index;
/// growable destinations are pre-sized to the source length and appended to.
#[derive(Debug, Clone)]
pub struct Enumerable {
    pub(crate) destination: TypeId,
    pub(crate) fixed: bool,
    pub(crate) element_source: TypeId,
    pub(crate) element_destination: TypeId,
    pub(crate) element: ElementConversion,
}

impl Enumerable {
    /// Whether the destination is a fixed-size array.
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Source and destination element types.
    pub fn elements(&self) -> (TypeId, TypeId) {
        (self.element_source, self.element_destination)
    }

    /// How elements are converted.
    pub fn element(&self) -> &ElementConversion {
        &self.element
    }

    fn convert(&self, universe: &Universe, item: &Value) -> Result<Value, MapError> {
        match &self.element {
            ElementConversion::Identity => Ok(item.clone()),
            ElementConversion::Resolver(resolver) => resolver.resolve(universe, item),
            ElementConversion::Nested(_) if item.is_null() => Ok(Value::Null),
            ElementConversion::Nested(context) => {
                let cx = context.upgrade().ok_or(MapError::MapperDropped)?;
                cx.map_with(Engine::Interpreted, item, &Value::Null)
            }
        }
    }

    pub(crate) fn resolve(&self, universe: &Universe, value: &Value) -> Result<Value, MapError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let Some(source) = value.as_list() else {
            return Err(MapError::Core(CoreError::TypeMismatch {
                expected: universe.name(self.destination).to_owned(),
                found: universe.display(value).to_string(),
            }));
        };
        let items = source.items();
        let out = if self.fixed {
            universe.new_array(self.destination, items.len())
        } else {
            universe.new_list(self.destination, items.len())
        };
        for (index, item) in items.iter().enumerate() {
            let converted = self.convert(universe, item)?;
            if self.fixed {
                out.set(index, converted)?;
            } else {
                out.push(converted)?;
            }
        }
        Ok(Value::List(out))
    }

    /// A counted loop over the source sequence, converting each element.
    pub(crate) fn plan(&self, compiler: &mut Compiler, arg: Var) -> Result<Expr, MapError> {
        let [len, out, index, item, converted] = [(); 5].map(|()| compiler.var());

        let element = match &self.element {
            ElementConversion::Identity => Expr::Local(item),
            ElementConversion::Resolver(resolver) => {
                let lambda = resolver.plan(compiler)?;
                compiler.inline(lambda, vec![Expr::Local(item)])?
            }
            ElementConversion::Nested(context) => {
                let cx = context.upgrade().ok_or(MapError::MapperDropped)?;
                let mapped = if compiler.is_assembling(cx.source(), cx.destination()) {
                    Expr::Call(Callee::Mapping(context.clone()), vec![Expr::Local(item)])
                } else {
                    let lambda = compiler.assemble(&cx)?;
                    compiler.inline(lambda, vec![Expr::Local(item), Expr::null()])?
                };
                Expr::conditional(Expr::is_null(Expr::Local(item)), Expr::null(), mapped)
            }
        };

        let ty = TypeRef::new(compiler.universe(), self.destination);
        let (create, store) = if self.fixed {
            (
                Callee::NewArray(ty),
                Expr::Call(
                    Callee::SetItem,
                    vec![Expr::Local(out), Expr::Local(index), Expr::Local(converted)],
                ),
            )
        } else {
            (
                Callee::NewList(ty),
                Expr::Call(Callee::Push, vec![Expr::Local(out), Expr::Local(converted)]),
            )
        };

        let body = Expr::Block {
            locals: vec![item, converted],
            body: vec![
                Expr::assign(
                    item,
                    Expr::Call(Callee::GetItem, vec![Expr::Parameter(arg), Expr::Local(index)]),
                ),
                Expr::assign(converted, element),
                store,
            ],
        };
        Ok(Expr::conditional(
            Expr::is_null(Expr::Parameter(arg)),
            Expr::null(),
            Expr::Block {
                locals: vec![len, out, index],
                body: vec![
                    Expr::assign(len, Expr::Call(Callee::Len, vec![Expr::Parameter(arg)])),
                    Expr::assign(out, Expr::Call(create, vec![Expr::Local(len)])),
                    Expr::Loop {
                        counter: index,
                        count: Box::new(Expr::Local(len)),
                        body: Box::new(body),
                    },
                    Expr::Local(out),
                ],
            },
        ))
    }
}
