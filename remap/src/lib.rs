#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]
#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod tracing_macros;

mod error;
pub use error::MapError;

mod config;
pub use config::{Engine, MapperConfig};

mod route;
pub use route::{Binding, Route, RouteId, RouteTree, Selector};

mod resolver;
pub use resolver::{
    Conversion, ElementConversion, Enumerable, Resolver, ResolverKind, ResolverRegistry, SimpleFn,
};

mod plan;
pub use plan::{MappingPlan, RemapRecord};

mod interp;
pub use interp::CallStack;

pub mod compile;
pub use compile::CompiledMapping;

mod context;
pub use context::MappingContext;

mod mapper;
pub use mapper::Mapper;
