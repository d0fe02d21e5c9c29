//! The compiled engine.
//!
//! A mapping is assembled once into a single [`Lambda`], with resolver
//! plans and nested element mappings inlined into it, then lowered into
//! one function. Shared source sub-paths are read into locals once.

use std::sync::Arc;

use remap_core::{TypeId, Universe, Value};

use crate::MapError;

mod ast;
pub use ast::{BinaryOp, Callee, Expr, Lambda, MemberRef, TypeRef, UnaryOp, Var};

mod compiler;
pub use compiler::Compiler;

mod inline;
pub use inline::{Inliner, inline};

mod lower;
use lower::{Function, lower};

/// A mapping lowered into a single callable function.
pub struct CompiledMapping {
    source: TypeId,
    destination: TypeId,
    lambda: Lambda,
    function: Function,
}

impl CompiledMapping {
    pub(crate) fn new(
        source: TypeId,
        destination: TypeId,
        lambda: Lambda,
        universe: Arc<Universe>,
    ) -> Result<Self, MapError> {
        let function = lower(&lambda, universe)?;
        Ok(Self {
            source,
            destination,
            lambda,
            function,
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

    /// The assembled expression tree, for inspection.
    pub fn ast(&self) -> &Lambda {
        &self.lambda
    }

    /// Map `source` into `destination`, constructing the destination when
    /// it is null. A null source leaves the destination unchanged.
    pub fn call(&self, source: &Value, destination: &Value) -> Result<Value, MapError> {
        if source.is_null() {
            return Ok(destination.clone());
        }
        self.function.call(&[source.clone(), destination.clone()])
    }
}

impl core::fmt::Debug for CompiledMapping {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompiledMapping")
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("function", &self.function)
            .finish()
    }
}
