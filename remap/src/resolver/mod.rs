//! Resolvers: units that convert a value of one type into another.
//!
//! Every resolver has a runtime conversion ([`Resolver::resolve`]) used by
//! the interpreted engine and a plan ([`Resolver::plan`]), a function
//! literal the compiled engine inlines in its place.

use std::sync::Arc;

use remap_core::{TypeId, Universe, Value};

use crate::compile::{Callee, Compiler, Expr, Lambda, TypeRef};
use crate::MapError;

mod enumerable;
pub use enumerable::{ElementConversion, Enumerable};

mod registry;
pub use registry::ResolverRegistry;

mod scalar;
pub use scalar::Conversion;

/// A user conversion function.
#[derive(Clone)]
pub struct SimpleFn(Arc<dyn Fn(&Value) -> Result<Value, MapError> + Send + Sync>);

impl SimpleFn {
    /// Wrap `f`.
    pub fn new(f: impl Fn(&Value) -> Result<Value, MapError> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Run the function.
    pub fn call(&self, value: &Value) -> Result<Value, MapError> {
        (self.0)(value)
    }
}

impl core::fmt::Debug for SimpleFn {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SimpleFn")
    }
}

/// The built-in resolver variants.
#[derive(Debug, Clone)]
pub enum ResolverKind {
    /// Ignore the source, default-construct the destination.
    Activation,
    /// Scalar coercion, or identity for equal types.
    ChangeType(Conversion),
    /// Enum to or from its underlying value.
    Enum(Conversion),
    /// Sequence to sequence, element by element.
    Enumerable(Enumerable),
    /// A user function.
    Simple(SimpleFn),
}

/// Converts values of `source` type into values of `destination` type.
#[derive(Debug, Clone)]
pub struct Resolver {
    source: TypeId,
    destination: TypeId,
    kind: ResolverKind,
}

impl Resolver {
    pub(crate) fn new(source: TypeId, destination: TypeId, kind: ResolverKind) -> Self {
        Self {
            source,
            destination,
            kind,
        }
    }

    /// A resolver that ignores its input and default-constructs `destination`.
    pub fn activation(source: TypeId, destination: TypeId) -> Self {
        Self::new(source, destination, ResolverKind::Activation)
    }

    /// A resolver running a user function.
    pub fn simple(
        source: TypeId,
        destination: TypeId,
        f: impl Fn(&Value) -> Result<Value, MapError> + Send + Sync + 'static,
    ) -> Self {
        Self::new(source, destination, ResolverKind::Simple(SimpleFn::new(f)))
    }

    /// The scalar or enum conversion between two types, if there is one.
    pub fn convert(universe: &Universe, source: TypeId, destination: TypeId) -> Option<Self> {
        let conversion = Conversion::between(universe, source, destination)?;
        let kind = if conversion.involves_enum() {
            ResolverKind::Enum(conversion)
        } else {
            ResolverKind::ChangeType(conversion)
        };
        Some(Self::new(source, destination, kind))
    }

    /// Source type.
    pub fn source(&self) -> TypeId {
        self.source
    }

    /// Destination type.
    pub fn destination(&self) -> TypeId {
        self.destination
    }

    /// Which variant this is.
    pub fn kind(&self) -> &ResolverKind {
        &self.kind
    }

    /// Whether this resolver converts single values. Sequence resolvers don't.
    pub fn can_convert(&self) -> bool {
        !matches!(self.kind, ResolverKind::Enumerable(_))
    }

    /// Convert `value`.
    pub fn resolve(&self, universe: &Universe, value: &Value) -> Result<Value, MapError> {
        match &self.kind {
            ResolverKind::Activation => Ok(universe.construct(self.destination)?),
            ResolverKind::ChangeType(conversion) | ResolverKind::Enum(conversion) => {
                conversion.apply(universe, value)
            }
            ResolverKind::Enumerable(enumerable) => enumerable.resolve(universe, value),
            ResolverKind::Simple(f) => f.call(value),
        }
    }

    /// A one-parameter function literal equivalent to [`Resolver::resolve`].
    pub fn plan(self: &Arc<Self>, compiler: &mut Compiler) -> Result<Lambda, MapError> {
        let param = compiler.var();
        let arg = Expr::Parameter(param);
        let body = match &self.kind {
            ResolverKind::Activation => {
                Expr::New(TypeRef::new(compiler.universe(), self.destination))
            }
            ResolverKind::ChangeType(Conversion::Identity) => arg,
            ResolverKind::ChangeType(conversion) | ResolverKind::Enum(conversion) => {
                Expr::Call(Callee::Convert(*conversion), vec![arg])
            }
            ResolverKind::Enumerable(enumerable) => enumerable.plan(compiler, param)?,
            ResolverKind::Simple(_) => Expr::Call(Callee::Resolver(self.clone()), vec![arg]),
        };
        Ok(Lambda {
            params: vec![param],
            body,
        })
    }
}
