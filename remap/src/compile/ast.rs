//! The expression tree the compiled engine assembles.
//!
//! The node set is closed: everything a mapping needs is a member read or
//! write, a conditional, a block with locals, a counted loop, a typed call
//! or a constant. [`Expr::Lambda`] and [`Expr::Invoke`] only exist until
//! the [`Inliner`](super::Inliner) flattens them away.

use std::sync::{Arc, Weak};

use remap_core::{Accessor, TypeId, Universe, Value};

use crate::error::Fault;
use crate::{Conversion, MappingContext, Resolver, Selector};

/// A parameter or local variable. Ids are unique per [`Compiler`](super::Compiler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(u32);

impl Var {
    /// A variable with the given id.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// The variable id.
    pub const fn id(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for Var {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A type handle together with its name, for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    /// The type.
    pub id: TypeId,
    /// Its name in the universe it came from.
    pub name: Arc<str>,
}

impl TypeRef {
    /// Look up the name of `id`.
    pub fn new(universe: &Universe, id: TypeId) -> Self {
        Self {
            id,
            name: Arc::from(universe.name(id)),
        }
    }
}

/// A member of a struct, read or written through its accessor.
#[derive(Debug, Clone)]
pub struct MemberRef {
    pub(crate) accessor: Accessor,
    pub(crate) fault: Fault,
}

impl MemberRef {
    pub(crate) fn new(accessor: Accessor, fault: Fault) -> Self {
        Self { accessor, fault }
    }

    /// The accessor used at run time.
    pub fn accessor(&self) -> &Accessor {
        &self.accessor
    }
}

/// Operators with one operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Boolean negation (`null` counts as false).
    Not,
    /// Whether the operand is null.
    IsNull,
}

/// Operators with two operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Deep equality.
    Eq,
    /// Deep inequality.
    Ne,
}

/// The target of a typed call.
#[derive(Clone)]
pub enum Callee {
    /// Run a resolver's runtime conversion.
    Resolver(Arc<Resolver>),
    /// Run a source selector.
    Selector(Selector),
    /// Map through another context's compiled function. Used when the
    /// element pair is already being assembled further up.
    Mapping(Weak<MappingContext>),
    /// A scalar or enum conversion.
    Convert(Conversion),
    /// Length of a sequence, as `i64`.
    Len,
    /// `(sequence, index)`: read an element.
    GetItem,
    /// `(sequence, index, value)`: overwrite an element.
    SetItem,
    /// `(list, value)`: append to a growable list.
    Push,
    /// `(len)`: a fixed-size array of that length.
    NewArray(TypeRef),
    /// `(capacity)`: an empty growable list.
    NewList(TypeRef),
}

impl core::fmt::Debug for Callee {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(self, f)
    }
}

impl core::fmt::Display for Callee {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Callee::Resolver(_) => f.write_str("resolve"),
            Callee::Selector(_) => f.write_str("select"),
            Callee::Mapping(_) => f.write_str("map"),
            Callee::Convert(Conversion::Identity) => f.write_str("identity"),
            Callee::Convert(c) if c.involves_enum() => f.write_str("convert_enum"),
            Callee::Convert(_) => f.write_str("convert"),
            Callee::Len => f.write_str("len"),
            Callee::GetItem => f.write_str("get_item"),
            Callee::SetItem => f.write_str("set_item"),
            Callee::Push => f.write_str("push"),
            Callee::NewArray(ty) => write!(f, "new_array<{}>", ty.name),
            Callee::NewList(ty) => write!(f, "new_list<{}>", ty.name),
        }
    }
}

/// A function literal.
#[derive(Debug, Clone)]
pub struct Lambda {
    /// Formal parameters.
    pub params: Vec<Var>,
    /// The body; its value is the result.
    pub body: Expr,
}

/// An expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal value.
    Constant(Value),
    /// A formal parameter of the enclosing function.
    Parameter(Var),
    /// A local declared by an enclosing block or loop.
    Local(Var),
    /// Store into a local; evaluates to the stored value.
    Assign(Var, Box<Expr>),
    /// Read a member.
    Member(Box<Expr>, MemberRef),
    /// `(target, member, value)`: write a member; evaluates to null.
    SetMember(Box<Expr>, MemberRef, Box<Expr>),
    /// A unary operation.
    Unary(UnaryOp, Box<Expr>),
    /// A binary operation.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `if test { then } else { otherwise }`
    Conditional {
        /// Condition; `null` and `false` are false.
        test: Box<Expr>,
        /// Taken when the test holds.
        then: Box<Expr>,
        /// Taken otherwise.
        otherwise: Box<Expr>,
    },
    /// A typed call.
    Call(Callee, Vec<Expr>),
    /// Default-construct a value of the type.
    New(TypeRef),
    /// A sequence of expressions with its own locals, reset to null on
    /// entry. Evaluates to its last expression.
    Block {
        /// Locals scoped to this block.
        locals: Vec<Var>,
        /// Statements, in order.
        body: Vec<Expr>,
    },
    /// A list or array of the type holding the items.
    ListInit(TypeRef, Vec<Expr>),
    /// Run `body` with `counter` from 0 up to `count` (exclusive).
    Loop {
        /// The loop counter, an `i64`.
        counter: Var,
        /// Number of iterations.
        count: Box<Expr>,
        /// Loop body.
        body: Box<Expr>,
    },
    /// A function literal.
    Lambda(Box<Lambda>),
    /// Call a function literal with arguments.
    Invoke(Box<Expr>, Vec<Expr>),
}

impl Expr {
    /// The null constant.
    pub const fn null() -> Self {
        Expr::Constant(Value::Null)
    }

    /// `if test { then }` with a null else branch.
    pub fn when(test: Expr, then: Expr) -> Self {
        Expr::Conditional {
            test: Box::new(test),
            then: Box::new(then),
            otherwise: Box::new(Expr::null()),
        }
    }

    /// `if test { then } else { otherwise }`
    pub fn conditional(test: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::Conditional {
            test: Box::new(test),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// Whether the operand is null.
    pub fn is_null(operand: Expr) -> Self {
        Expr::Unary(UnaryOp::IsNull, Box::new(operand))
    }

    /// Boolean negation.
    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: Expr) -> Self {
        Expr::Unary(UnaryOp::Not, Box::new(operand))
    }

    /// Store into a local.
    pub fn assign(var: Var, value: Expr) -> Self {
        Expr::Assign(var, Box::new(value))
    }

    /// A block without locals of its own.
    pub fn block(body: Vec<Expr>) -> Self {
        Expr::Block {
            locals: Vec::new(),
            body,
        }
    }

    /// Whether substituting this expression for a parameter duplicates no work.
    pub fn is_trivial(&self) -> bool {
        matches!(
            self,
            Expr::Constant(_) | Expr::Parameter(_) | Expr::Local(_)
        )
    }

    /// Whether a function literal or an invocation occurs anywhere in this tree.
    pub fn contains_function(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| {
            if matches!(e, Expr::Lambda(_) | Expr::Invoke(..)) {
                found = true;
            }
        });
        found
    }

    /// Call `f` on this expression and every sub-expression, parents first.
    pub fn visit(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Constant(_) | Expr::Parameter(_) | Expr::Local(_) | Expr::New(_) => {}
            Expr::Assign(_, value) => value.visit(f),
            Expr::Member(target, _) => target.visit(f),
            Expr::SetMember(target, _, value) => {
                target.visit(f);
                value.visit(f);
            }
            Expr::Unary(_, operand) => operand.visit(f),
            Expr::Binary(_, lhs, rhs) => {
                lhs.visit(f);
                rhs.visit(f);
            }
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => {
                test.visit(f);
                then.visit(f);
                otherwise.visit(f);
            }
            Expr::Call(_, args) | Expr::Block { body: args, .. } | Expr::ListInit(_, args) => {
                for arg in args {
                    arg.visit(f);
                }
            }
            Expr::Loop { count, body, .. } => {
                count.visit(f);
                body.visit(f);
            }
            Expr::Lambda(lambda) => lambda.body.visit(f),
            Expr::Invoke(function, args) => {
                function.visit(f);
                for arg in args {
                    arg.visit(f);
                }
            }
        }
    }
}

fn constant(f: &mut core::fmt::Formatter<'_>, value: &Value) -> core::fmt::Result {
    match value {
        Value::Null => f.write_str("null"),
        Value::Bool(v) => write!(f, "{v}"),
        Value::I32(v) => write!(f, "{v}"),
        Value::I64(v) => write!(f, "{v}i64"),
        Value::F64(v) => write!(f, "{v:?}"),
        Value::String(v) => write!(f, "{v:?}"),
        Value::Enum(e) => write!(f, "enum#{}({})", e.ty.index(), e.discriminant),
        Value::Object(_) => f.write_str("<object>"),
        Value::List(_) => f.write_str("<list>"),
    }
}

fn list(f: &mut core::fmt::Formatter<'_>, items: &[Expr], sep: &str) -> core::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl core::fmt::Display for Expr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Expr::Constant(value) => constant(f, value),
            Expr::Parameter(var) | Expr::Local(var) => write!(f, "{var}"),
            Expr::Assign(var, value) => write!(f, "{var} = {value}"),
            Expr::Member(target, member) => write!(f, "{target}.{}", member.accessor.name()),
            Expr::SetMember(target, member, value) => {
                write!(f, "{target}.{} = {value}", member.accessor.name())
            }
            Expr::Unary(UnaryOp::Not, operand) => write!(f, "!({operand})"),
            Expr::Unary(UnaryOp::IsNull, operand) => write!(f, "({operand} is null)"),
            Expr::Binary(op, lhs, rhs) => {
                let op = match op {
                    BinaryOp::Eq => "==",
                    BinaryOp::Ne => "!=",
                };
                write!(f, "({lhs} {op} {rhs})")
            }
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => {
                write!(f, "if {test} {{ {then} }}")?;
                if !matches!(**otherwise, Expr::Constant(Value::Null)) {
                    write!(f, " else {{ {otherwise} }}")?;
                }
                Ok(())
            }
            Expr::Call(callee, args) => {
                write!(f, "{callee}(")?;
                list(f, args, ", ")?;
                f.write_str(")")
            }
            Expr::New(ty) => write!(f, "new {}", ty.name),
            Expr::Block { locals, body } => {
                f.write_str("{")?;
                if !locals.is_empty() {
                    f.write_str(" let ")?;
                    for (i, var) in locals.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{var}")?;
                    }
                    f.write_str(";")?;
                }
                if !body.is_empty() {
                    f.write_str(" ")?;
                    list(f, body, "; ")?;
                }
                f.write_str(" }")
            }
            Expr::ListInit(ty, items) => {
                write!(f, "{}[", ty.name)?;
                list(f, items, ", ")?;
                f.write_str("]")
            }
            Expr::Loop {
                counter,
                count,
                body,
            } => write!(f, "for {counter} in 0..{count} {body}"),
            Expr::Lambda(lambda) => write!(f, "{lambda}"),
            Expr::Invoke(function, args) => {
                write!(f, "({function})(")?;
                list(f, args, ", ")?;
                f.write_str(")")
            }
        }
    }
}

impl core::fmt::Display for Lambda {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("|")?;
        for (i, var) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{var}")?;
        }
        write!(f, "| {}", self.body)
    }
}
