//! Lowering: turn an expression tree into nested closures over a flat
//! slot environment, once. Running the result never looks at the tree
//! again.

use std::collections::HashMap;
use std::sync::Arc;

use remap_core::{CoreError, Universe, Value};

use super::ast::{BinaryOp, Callee, Expr, Lambda, UnaryOp, Var};
use crate::{Engine, MapError};

pub(crate) struct Env {
    slots: Vec<Value>,
}

type Code = Box<dyn Fn(&mut Env) -> Result<Value, MapError> + Send + Sync>;

fn code(f: impl Fn(&mut Env) -> Result<Value, MapError> + Send + Sync + 'static) -> Code {
    Box::new(f)
}

/// A lowered function.
pub(crate) struct Function {
    params: Vec<usize>,
    slots: usize,
    body: Code,
}

impl Function {
    pub(crate) fn call(&self, args: &[Value]) -> Result<Value, MapError> {
        let mut env = Env {
            slots: vec![Value::Null; self.slots],
        };
        for (slot, arg) in self.params.iter().zip(args) {
            env.slots[*slot] = arg.clone();
        }
        (self.body)(&mut env)
    }
}

impl core::fmt::Debug for Function {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Function")
            .field("params", &self.params)
            .field("slots", &self.slots)
            .finish_non_exhaustive()
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        _ => true,
    }
}

fn index(value: &Value) -> Result<usize, MapError> {
    let n = match value {
        Value::I64(n) => *n,
        Value::I32(n) => i64::from(*n),
        _ => {
            return Err(CoreError::TypeMismatch {
                expected: "integer".to_owned(),
                found: format!("{value:?}"),
            }
            .into());
        }
    };
    usize::try_from(n).map_err(|_| {
        MapError::Core(CoreError::TypeMismatch {
            expected: "non-negative integer".to_owned(),
            found: n.to_string(),
        })
    })
}

fn sequence(value: &Value) -> Result<&remap_core::ListRef, MapError> {
    value.as_list().ok_or_else(|| {
        MapError::Core(CoreError::TypeMismatch {
            expected: "sequence".to_owned(),
            found: format!("{value:?}"),
        })
    })
}

struct Lowerer {
    universe: Arc<Universe>,
    slots: HashMap<Var, usize>,
}

impl Lowerer {
    fn slot(&mut self, var: Var) -> usize {
        let next = self.slots.len();
        *self.slots.entry(var).or_insert(next)
    }

    fn lower(&mut self, expr: &Expr) -> Result<Code, MapError> {
        Ok(match expr {
            Expr::Constant(value) => {
                let value = value.clone();
                code(move |_| Ok(value.clone()))
            }
            Expr::Parameter(var) | Expr::Local(var) => {
                let slot = self.slot(*var);
                code(move |env| Ok(env.slots[slot].clone()))
            }
            Expr::Assign(var, value) => {
                let slot = self.slot(*var);
                let value = self.lower(value)?;
                code(move |env| {
                    let v = value(env)?;
                    env.slots[slot] = v.clone();
                    Ok(v)
                })
            }
            Expr::Member(target, member) => {
                let target = self.lower(target)?;
                let member = member.clone();
                code(move |env| {
                    let t = target(env)?;
                    member.accessor.get(&t).map_err(|e| member.fault.wrap(e))
                })
            }
            Expr::SetMember(target, member, value) => {
                let target = self.lower(target)?;
                let value = self.lower(value)?;
                let member = member.clone();
                code(move |env| {
                    let t = target(env)?;
                    let v = value(env)?;
                    member
                        .accessor
                        .set(&t, v)
                        .map_err(|e| member.fault.wrap(e))?;
                    Ok(Value::Null)
                })
            }
            Expr::Unary(op, operand) => {
                let operand = self.lower(operand)?;
                match op {
                    UnaryOp::Not => code(move |env| Ok(Value::Bool(!truthy(&operand(env)?)))),
                    UnaryOp::IsNull => code(move |env| Ok(Value::Bool(operand(env)?.is_null()))),
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.lower(lhs)?;
                let rhs = self.lower(rhs)?;
                let negate = matches!(op, BinaryOp::Ne);
                code(move |env| {
                    let l = lhs(env)?;
                    let r = rhs(env)?;
                    Ok(Value::Bool((l == r) != negate))
                })
            }
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => {
                let test = self.lower(test)?;
                let then = self.lower(then)?;
                let otherwise = self.lower(otherwise)?;
                code(move |env| {
                    if truthy(&test(env)?) {
                        then(env)
                    } else {
                        otherwise(env)
                    }
                })
            }
            Expr::Call(callee, args) => self.call(callee, args)?,
            Expr::New(ty) => {
                let universe = self.universe.clone();
                let ty = ty.id;
                code(move |_| Ok(universe.construct(ty)?))
            }
            Expr::Block { locals, body } => {
                let locals: Vec<usize> = locals.iter().map(|v| self.slot(*v)).collect();
                let body = body
                    .iter()
                    .map(|e| self.lower(e))
                    .collect::<Result<Vec<_>, _>>()?;
                code(move |env| {
                    for slot in &locals {
                        env.slots[*slot] = Value::Null;
                    }
                    let mut last = Value::Null;
                    for statement in &body {
                        last = statement(env)?;
                    }
                    Ok(last)
                })
            }
            Expr::ListInit(ty, items) => {
                let universe = self.universe.clone();
                let ty = ty.id;
                let items = items
                    .iter()
                    .map(|e| self.lower(e))
                    .collect::<Result<Vec<_>, _>>()?;
                code(move |env| {
                    let values = items
                        .iter()
                        .map(|item| item(env))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(universe.list(ty, values))
                })
            }
            Expr::Loop {
                counter,
                count,
                body,
            } => {
                let counter = self.slot(*counter);
                let count = self.lower(count)?;
                let body = self.lower(body)?;
                code(move |env| {
                    let n = index(&count(env)?)?;
                    for i in 0..n {
                        env.slots[counter] = Value::I64(i as i64);
                        body(env)?;
                    }
                    Ok(Value::Null)
                })
            }
            Expr::Lambda(_) => {
                return Err(MapError::NotImplemented("lowering a function literal"));
            }
            Expr::Invoke(..) => {
                return Err(MapError::NotImplemented("lowering an invocation"));
            }
        })
    }

    fn call(&mut self, callee: &Callee, args: &[Expr]) -> Result<Code, MapError> {
        let args = args
            .iter()
            .map(|e| self.lower(e))
            .collect::<Result<Vec<_>, _>>()?;
        let arity = match callee {
            Callee::NewArray(_) | Callee::NewList(_) | Callee::Len => 1,
            Callee::Resolver(_) | Callee::Selector(_) | Callee::Mapping(_) | Callee::Convert(_) => 1,
            Callee::GetItem | Callee::Push => 2,
            Callee::SetItem => 3,
        };
        if args.len() != arity {
            return Err(MapError::NotImplemented("call with the wrong number of arguments"));
        }
        let eval = move |env: &mut Env| -> Result<Vec<Value>, MapError> {
            args.iter().map(|arg| arg(env)).collect()
        };
        let universe = self.universe.clone();

        Ok(match callee.clone() {
            Callee::Resolver(resolver) => code(move |env| {
                let a = eval(env)?;
                resolver.resolve(&universe, &a[0])
            }),
            Callee::Selector(selector) => code(move |env| {
                let a = eval(env)?;
                selector.call(&a[0])
            }),
            Callee::Mapping(context) => code(move |env| {
                let a = eval(env)?;
                let cx = context.upgrade().ok_or(MapError::MapperDropped)?;
                cx.map_with(Engine::Compiled, &a[0], &Value::Null)
            }),
            Callee::Convert(conversion) => code(move |env| {
                let a = eval(env)?;
                conversion.apply(&universe, &a[0])
            }),
            Callee::Len => code(move |env| {
                let a = eval(env)?;
                Ok(Value::I64(sequence(&a[0])?.len() as i64))
            }),
            Callee::GetItem => code(move |env| {
                let a = eval(env)?;
                Ok(sequence(&a[0])?.get(index(&a[1])?)?)
            }),
            Callee::SetItem => code(move |env| {
                let mut a = eval(env)?;
                let value = a.pop().unwrap_or_default();
                sequence(&a[0])?.set(index(&a[1])?, value)?;
                Ok(Value::Null)
            }),
            Callee::Push => code(move |env| {
                let mut a = eval(env)?;
                let value = a.pop().unwrap_or_default();
                sequence(&a[0])?.push(value)?;
                Ok(Value::Null)
            }),
            Callee::NewArray(ty) => code(move |env| {
                let a = eval(env)?;
                Ok(Value::List(universe.new_array(ty.id, index(&a[0])?)))
            }),
            Callee::NewList(ty) => code(move |env| {
                let a = eval(env)?;
                Ok(Value::List(universe.new_list(ty.id, index(&a[0])?)))
            }),
        })
    }
}

/// Lower `lambda` into a callable function.
pub(crate) fn lower(lambda: &Lambda, universe: Arc<Universe>) -> Result<Function, MapError> {
    let mut lowerer = Lowerer {
        universe,
        slots: HashMap::new(),
    };
    let params = lambda.params.iter().map(|v| lowerer.slot(*v)).collect();
    let body = lowerer.lower(&lambda.body)?;
    Ok(Function {
        params,
        slots: lowerer.slots.len(),
        body,
    })
}
