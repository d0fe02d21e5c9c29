#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]
#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod accessor;
pub use accessor::{Accessor, AccessorTable};

mod error;
pub use error::CoreError;

mod types;
pub use types::{Access, EnumDef, FieldDef, Getter, ScalarKind, StructDef, TypeId, TypeInfo, TypeKind, Variant};

mod universe;
pub use universe::{DisplayValue, Universe, UniverseBuilder};

mod value;
pub use value::{EnumValue, ListRef, ObjectRef, Value};
