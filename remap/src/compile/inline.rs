use std::collections::HashMap;

use super::ast::{Expr, Lambda, Var};
use crate::MapError;

/// Substitutes a function literal's parameters with argument expressions,
/// producing a body that can be spliced in place of the invocation.
///
/// Arguments that are constants, parameters or locals are substituted
/// directly. Anything else is evaluated once into a block local so that
/// side effects are not duplicated. Invocations of literals nested in the
/// body are flattened recursively.
///
/// An inliner performs a single rewrite; binding or rewriting again
/// afterwards fails with [`MapError::InlinerSealed`].
#[derive(Debug)]
pub struct Inliner {
    lambda: Lambda,
    args: HashMap<Var, Expr>,
    sealed: bool,
}

impl Inliner {
    /// Prepare to inline `lambda`.
    pub fn new(lambda: Lambda) -> Self {
        Self {
            lambda,
            args: HashMap::new(),
            sealed: false,
        }
    }

    /// Bind the formal parameter `param` to `arg`.
    pub fn bind(&mut self, param: Var, arg: Expr) -> Result<&mut Self, MapError> {
        if self.sealed {
            return Err(MapError::InlinerSealed);
        }
        if !self.lambda.params.contains(&param) {
            return Err(MapError::NotImplemented("binding a variable that is not a parameter"));
        }
        self.args.insert(param, arg);
        Ok(self)
    }

    /// Bind every parameter, in order.
    pub fn bind_all(&mut self, args: Vec<Expr>) -> Result<&mut Self, MapError> {
        if args.len() != self.lambda.params.len() {
            return Err(MapError::NotImplemented("invocation with the wrong number of arguments"));
        }
        let params = self.lambda.params.clone();
        for (param, arg) in params.into_iter().zip(args) {
            self.bind(param, arg)?;
        }
        Ok(self)
    }

    /// Produce the rewritten body.
    pub fn rewrite(&mut self) -> Result<Expr, MapError> {
        if self.sealed {
            return Err(MapError::InlinerSealed);
        }
        self.sealed = true;

        let mut direct = HashMap::new();
        let mut locals = Vec::new();
        let mut prelude = Vec::new();
        for param in &self.lambda.params {
            let Some(arg) = self.args.remove(param) else {
                return Err(MapError::NotImplemented("invocation with an unbound parameter"));
            };
            if arg.is_trivial() {
                direct.insert(*param, arg);
            } else {
                direct.insert(*param, Expr::Local(*param));
                locals.push(*param);
                prelude.push(Expr::assign(*param, arg));
            }
        }

        let body = substitute(&self.lambda.body, &direct)?;
        if locals.is_empty() {
            return Ok(body);
        }
        prelude.push(body);
        Ok(Expr::Block {
            locals,
            body: prelude,
        })
    }
}

/// Inline `lambda` applied to `args` in one step.
pub fn inline(lambda: Lambda, args: Vec<Expr>) -> Result<Expr, MapError> {
    Inliner::new(lambda).bind_all(args)?.rewrite()
}

fn substitute(expr: &Expr, args: &HashMap<Var, Expr>) -> Result<Expr, MapError> {
    let each = |exprs: &[Expr]| -> Result<Vec<Expr>, MapError> {
        exprs.iter().map(|e| substitute(e, args)).collect()
    };
    let boxed = |e: &Expr| substitute(e, args).map(Box::new);

    Ok(match expr {
        Expr::Parameter(var) => match args.get(var) {
            Some(arg) => arg.clone(),
            None => Expr::Parameter(*var),
        },
        Expr::Constant(_) | Expr::Local(_) | Expr::New(_) => expr.clone(),
        Expr::Assign(var, value) => Expr::Assign(*var, boxed(value)?),
        Expr::Member(target, member) => Expr::Member(boxed(target)?, member.clone()),
        Expr::SetMember(target, member, value) => {
            Expr::SetMember(boxed(target)?, member.clone(), boxed(value)?)
        }
        Expr::Unary(op, operand) => Expr::Unary(*op, boxed(operand)?),
        Expr::Binary(op, lhs, rhs) => Expr::Binary(*op, boxed(lhs)?, boxed(rhs)?),
        Expr::Conditional {
            test,
            then,
            otherwise,
        } => Expr::Conditional {
            test: boxed(test)?,
            then: boxed(then)?,
            otherwise: boxed(otherwise)?,
        },
        Expr::Call(callee, call_args) => Expr::Call(callee.clone(), each(call_args)?),
        Expr::Block { locals, body } => Expr::Block {
            locals: locals.clone(),
            body: each(body)?,
        },
        Expr::ListInit(ty, items) => Expr::ListInit(ty.clone(), each(items)?),
        Expr::Loop {
            counter,
            count,
            body,
        } => {
            if body.contains_function() {
                return Err(MapError::NotImplemented("function literal inside a loop body"));
            }
            Expr::Loop {
                counter: *counter,
                count: boxed(count)?,
                body: boxed(body)?,
            }
        }
        Expr::Invoke(function, call_args) => {
            let Expr::Lambda(lambda) = &**function else {
                return Err(MapError::NotImplemented("invoking something other than a function literal"));
            };
            let lambda = Lambda {
                params: lambda.params.clone(),
                body: substitute(&lambda.body, args)?,
            };
            inline(lambda, each(call_args)?)?
        }
        Expr::Lambda(_) => {
            return Err(MapError::NotImplemented("function literal outside an invocation"));
        }
    })
}
