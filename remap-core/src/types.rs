use std::sync::Arc;

use crate::Value;

/// Handle to a type described in a [`Universe`](crate::Universe).
///
/// Handles are only meaningful for the universe that issued them. The
/// built-in scalar types have the same handle in every universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    /// `bool`
    pub const BOOL: TypeId = TypeId(0);
    /// 32-bit signed integer
    pub const I32: TypeId = TypeId(1);
    /// 64-bit signed integer
    pub const I64: TypeId = TypeId(2);
    /// 64-bit float
    pub const F64: TypeId = TypeId(3);
    /// Nullable string
    pub const STRING: TypeId = TypeId(4);

    pub(crate) const BUILTINS: [(TypeId, ScalarKind, &'static str); 5] = [
        (TypeId::BOOL, ScalarKind::Bool, "bool"),
        (TypeId::I32, ScalarKind::I32, "i32"),
        (TypeId::I64, ScalarKind::I64, "i64"),
        (TypeId::F64, ScalarKind::F64, "f64"),
        (TypeId::STRING, ScalarKind::String, "string"),
    ];

    /// Position of this type in its universe.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// The built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// `bool`
    Bool,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `f64`
    F64,
    /// `string` (nullable)
    String,
}

impl ScalarKind {
    /// Whether this is one of the integer kinds.
    pub const fn is_integer(self) -> bool {
        matches!(self, ScalarKind::I32 | ScalarKind::I64)
    }

    /// Whether this is a numeric kind.
    pub const fn is_numeric(self) -> bool {
        matches!(self, ScalarKind::I32 | ScalarKind::I64 | ScalarKind::F64)
    }
}

/// A described type.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// Display name, unique within a universe.
    pub name: String,
    /// What kind of type this is.
    pub kind: TypeKind,
}

/// The shape of a described type.
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// A built-in scalar.
    Scalar(ScalarKind),
    /// An enum with integer discriminants.
    Enum(EnumDef),
    /// A struct with named members.
    Struct(StructDef),
    /// A growable sequence of the element type.
    List(TypeId),
    /// A fixed-size sequence of the element type. The length is chosen at
    /// construction.
    Array(TypeId),
}

/// One enum variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Variant name.
    pub name: String,
    /// Underlying integer value.
    pub discriminant: i64,
}

/// Definition of an enum type.
#[derive(Debug, Clone, Default)]
pub struct EnumDef {
    variants: Vec<Variant>,
}

impl EnumDef {
    /// An enum with no variants yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variant.
    pub fn variant(mut self, name: impl Into<String>, discriminant: i64) -> Self {
        self.variants.push(Variant {
            name: name.into(),
            discriminant,
        });
        self
    }

    /// All variants, in declaration order.
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Look a variant up by name.
    pub fn by_name(&self, name: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.name == name)
    }

    /// Look a variant up by discriminant.
    pub fn by_discriminant(&self, discriminant: i64) -> Option<&Variant> {
        self.variants.iter().find(|v| v.discriminant == discriminant)
    }
}

/// Read hook for a member: receives the stored value, returns the value
/// exposed to readers.
pub type Getter = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Which directions a member supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Readable and writable.
    ReadWrite,
    /// Readable only.
    ReadOnly,
    /// Writable only.
    WriteOnly,
}

/// One member of a struct.
#[derive(Clone)]
pub struct FieldDef {
    /// Member name.
    pub name: String,
    /// Declared type.
    pub ty: TypeId,
    /// Supported directions.
    pub access: Access,
    /// Optional read hook.
    pub getter: Option<Getter>,
}

impl core::fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("access", &self.access)
            .field("getter", &self.getter.is_some())
            .finish()
    }
}

/// Definition of a struct type.
#[derive(Debug, Clone)]
pub struct StructDef {
    fields: Vec<FieldDef>,
    default_constructible: bool,
}

impl Default for StructDef {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            default_constructible: true,
        }
    }
}

impl StructDef {
    /// A default-constructible struct with no members yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a readable, writable member.
    pub fn field(self, name: impl Into<String>, ty: TypeId) -> Self {
        self.push(name.into(), ty, Access::ReadWrite, None)
    }

    /// Add a member that can only be read.
    pub fn read_only(self, name: impl Into<String>, ty: TypeId) -> Self {
        self.push(name.into(), ty, Access::ReadOnly, None)
    }

    /// Add a member that can only be written.
    pub fn write_only(self, name: impl Into<String>, ty: TypeId) -> Self {
        self.push(name.into(), ty, Access::WriteOnly, None)
    }

    /// Add a readable, writable member whose reads go through `getter`.
    pub fn field_with_getter(
        self,
        name: impl Into<String>,
        ty: TypeId,
        getter: impl Fn(&Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.push(name.into(), ty, Access::ReadWrite, Some(Arc::new(getter)))
    }

    /// Forbid default construction of this type.
    pub fn no_default(mut self) -> Self {
        self.default_constructible = false;
        self
    }

    fn push(mut self, name: String, ty: TypeId, access: Access, getter: Option<Getter>) -> Self {
        self.fields.retain(|f| f.name != name);
        self.fields.push(FieldDef {
            name,
            ty,
            access,
            getter,
        });
        self
    }

    /// Members in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Whether the type can be default-constructed.
    pub fn default_constructible(&self) -> bool {
        self.default_constructible
    }
}
