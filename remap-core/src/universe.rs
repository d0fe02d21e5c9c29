use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::{
    AccessorTable, CoreError, EnumDef, EnumValue, ListRef, ObjectRef, ScalarKind, StructDef,
    TypeId, TypeInfo, TypeKind, Value,
};

/// A closed set of described types.
///
/// Built once through [`UniverseBuilder`] and shared behind an [`Arc`].
/// Accessor tables are built lazily, once per type.
pub struct Universe {
    types: Vec<TypeInfo>,
    by_name: HashMap<String, TypeId>,
    names: Arc<[Arc<str>]>,
    accessors: Vec<OnceLock<Arc<AccessorTable>>>,
}

impl core::fmt::Debug for Universe {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.types.iter().map(|t| &t.name))
            .finish()
    }
}

impl Universe {
    /// Start describing a new set of types.
    pub fn builder() -> UniverseBuilder {
        UniverseBuilder::new()
    }

    /// Description of `ty`.
    ///
    /// # Panics
    ///
    /// Panics if `ty` was issued by another universe with more types.
    pub fn info(&self, ty: TypeId) -> &TypeInfo {
        &self.types[ty.index()]
    }

    /// Name of `ty`.
    pub fn name(&self, ty: TypeId) -> &str {
        &self.info(ty).name
    }

    /// Shape of `ty`.
    pub fn kind(&self, ty: TypeId) -> &TypeKind {
        &self.info(ty).kind
    }

    /// Find a type by name.
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// Number of described types, built-ins included.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Always false: the built-in scalars are always present.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The scalar kind of `ty`, if it is a scalar.
    pub fn scalar(&self, ty: TypeId) -> Option<ScalarKind> {
        match self.kind(ty) {
            TypeKind::Scalar(kind) => Some(*kind),
            _ => None,
        }
    }

    /// The enum definition of `ty`, if it is an enum.
    pub fn enum_def(&self, ty: TypeId) -> Option<&EnumDef> {
        match self.kind(ty) {
            TypeKind::Enum(def) => Some(def),
            _ => None,
        }
    }

    /// Whether `ty` is a struct.
    pub fn is_struct(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::Struct(_))
    }

    /// The element type of `ty`, if it is a list or an array.
    pub fn element(&self, ty: TypeId) -> Option<TypeId> {
        match self.kind(ty) {
            TypeKind::List(elem) | TypeKind::Array(elem) => Some(*elem),
            _ => None,
        }
    }

    /// Whether `ty` is a fixed-size array.
    pub fn is_array(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::Array(_))
    }

    /// Every type name, indexed by [`TypeId::index`].
    pub(crate) fn type_names(&self) -> &Arc<[Arc<str>]> {
        &self.names
    }

    /// The accessor table of `ty`, built on first request.
    pub fn accessors(&self, ty: TypeId) -> Arc<AccessorTable> {
        self.accessors[ty.index()]
            .get_or_init(|| Arc::new(AccessorTable::build(self, ty)))
            .clone()
    }

    /// The default value of `ty`: what an unset member of that type holds.
    pub fn default_value(&self, ty: TypeId) -> Value {
        match self.kind(ty) {
            TypeKind::Scalar(ScalarKind::Bool) => Value::Bool(false),
            TypeKind::Scalar(ScalarKind::I32) => Value::I32(0),
            TypeKind::Scalar(ScalarKind::I64) => Value::I64(0),
            TypeKind::Scalar(ScalarKind::F64) => Value::F64(0.0),
            TypeKind::Enum(_) => Value::Enum(EnumValue { ty, discriminant: 0 }),
            TypeKind::Scalar(ScalarKind::String)
            | TypeKind::Struct(_)
            | TypeKind::List(_)
            | TypeKind::Array(_) => Value::Null,
        }
    }

    /// Default-construct an instance of `ty`.
    ///
    /// Structs get every member set to its default value, lists and arrays
    /// start empty, scalars and enums produce their default value.
    pub fn construct(&self, ty: TypeId) -> Result<Value, CoreError> {
        match self.kind(ty) {
            TypeKind::Struct(def) => {
                if !def.default_constructible() {
                    return Err(CoreError::NotConstructible {
                        ty: self.name(ty).to_owned(),
                    });
                }
                let fields = def
                    .fields()
                    .iter()
                    .map(|f| self.default_value(f.ty))
                    .collect();
                Ok(Value::Object(ObjectRef::new(ty, fields)))
            }
            TypeKind::List(_) => Ok(Value::List(ListRef::growable(ty, 0))),
            TypeKind::Array(_) => Ok(Value::List(ListRef::fixed(ty, 0))),
            TypeKind::Scalar(_) | TypeKind::Enum(_) => Ok(self.default_value(ty)),
        }
    }

    /// A growable list of type `ty` with room for `capacity` elements.
    pub fn new_list(&self, ty: TypeId, capacity: usize) -> ListRef {
        ListRef::growable(ty, capacity)
    }

    /// A fixed-size array of type `ty` holding `len` nulls.
    pub fn new_array(&self, ty: TypeId, len: usize) -> ListRef {
        ListRef::fixed(ty, len)
    }

    /// Build an object of struct type `ty` from `(member, value)` pairs;
    /// members not mentioned keep their default value.
    pub fn object<'a>(
        &self,
        ty: TypeId,
        values: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> Result<Value, CoreError> {
        let target = self.construct(ty)?;
        let table = self.accessors(ty);
        for (name, value) in values {
            let accessor = table.get(name).ok_or_else(|| CoreError::NotAStruct {
                ty: self.name(ty).to_owned(),
                member: name.to_owned(),
            })?;
            if let Value::Object(o) = &target {
                o.set_field(accessor.index(), value)?;
            }
        }
        Ok(target)
    }

    /// Build a list (or array) of type `ty` holding `items`.
    pub fn list(&self, ty: TypeId, items: impl IntoIterator<Item = Value>) -> Value {
        let items: Vec<Value> = items.into_iter().collect();
        let list = if self.is_array(ty) {
            ListRef::fixed(ty, items.len())
        } else {
            ListRef::growable(ty, items.len())
        };
        for (index, item) in items.into_iter().enumerate() {
            // lengths match by construction
            let _ = if list.is_fixed() {
                list.set(index, item)
            } else {
                list.push(item)
            };
        }
        Value::List(list)
    }

    /// An enum value of type `ty` for the named variant.
    pub fn variant(&self, ty: TypeId, name: &str) -> Option<Value> {
        let variant = self.enum_def(ty)?.by_name(name)?;
        Some(Value::Enum(EnumValue {
            ty,
            discriminant: variant.discriminant,
        }))
    }

    /// The runtime type of `value`, when it carries one.
    ///
    /// `Null` has no type.
    pub fn type_of(&self, value: &Value) -> Option<TypeId> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(TypeId::BOOL),
            Value::I32(_) => Some(TypeId::I32),
            Value::I64(_) => Some(TypeId::I64),
            Value::F64(_) => Some(TypeId::F64),
            Value::String(_) => Some(TypeId::STRING),
            Value::Enum(e) => Some(e.ty),
            Value::Object(o) => Some(o.ty()),
            Value::List(l) => Some(l.ty()),
        }
    }

    /// Render `value` with type and member names.
    pub fn display<'a>(&'a self, value: &'a Value) -> DisplayValue<'a> {
        DisplayValue {
            universe: self,
            value,
        }
    }
}

/// Renders a [`Value`] graph, e.g. `Customer { FirstName: "Ann", Sub: Sub { Name: "X" } }`.
pub struct DisplayValue<'a> {
    universe: &'a Universe,
    value: &'a Value,
}

impl core::fmt::Display for DisplayValue<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let u = self.universe;
        match self.value {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v:?}"),
            Value::String(v) => write!(f, "{v:?}"),
            Value::Enum(e) => {
                let name = u.name(e.ty);
                match u.enum_def(e.ty).and_then(|d| d.by_discriminant(e.discriminant)) {
                    Some(variant) => write!(f, "{name}::{}", variant.name),
                    None => write!(f, "{name}({})", e.discriminant),
                }
            }
            Value::Object(o) => {
                let ty = o.ty();
                let table = u.accessors(ty);
                write!(f, "{} {{", u.name(ty))?;
                for (i, (accessor, value)) in table.iter().zip(o.fields()).enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{}: {}", accessor.name(), u.display(&value))?;
                }
                if table.is_empty() {
                    f.write_str("}")
                } else {
                    f.write_str(" }")
                }
            }
            Value::List(l) => {
                f.write_str("[")?;
                for (i, item) in l.items().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", u.display(item))?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Describes types for a [`Universe`].
#[derive(Debug)]
pub struct UniverseBuilder {
    types: Vec<(String, Option<TypeKind>)>,
    by_name: HashMap<String, TypeId>,
    lists: HashMap<TypeId, TypeId>,
    arrays: HashMap<TypeId, TypeId>,
    error: Option<CoreError>,
}

impl Default for UniverseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl UniverseBuilder {
    /// A builder holding only the built-in scalars.
    pub fn new() -> Self {
        let mut builder = Self {
            types: Vec::new(),
            by_name: HashMap::new(),
            lists: HashMap::new(),
            arrays: HashMap::new(),
            error: None,
        };
        for (id, kind, name) in TypeId::BUILTINS {
            debug_assert_eq!(id.index(), builder.types.len());
            builder.insert(name.to_owned(), Some(TypeKind::Scalar(kind)));
        }
        builder
    }

    fn insert(&mut self, name: String, kind: Option<TypeKind>) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.types.push((name, kind));
        id
    }

    fn record(&mut self, error: CoreError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Declare a type by name without defining it yet. Declaring a name
    /// twice returns the same handle.
    pub fn declare(&mut self, name: impl Into<String>) -> TypeId {
        let name = name.into();
        match self.by_name.get(&name) {
            Some(id) => *id,
            None => self.insert(name, None),
        }
    }

    fn set_kind(&mut self, id: TypeId, kind: TypeKind) {
        let (name, slot) = &mut self.types[id.index()];
        if slot.is_some() {
            let name = name.clone();
            self.record(CoreError::DuplicateType { name });
            return;
        }
        *slot = Some(kind);
    }

    /// Give a declared type its struct definition.
    pub fn define(&mut self, id: TypeId, def: StructDef) -> &mut Self {
        self.set_kind(id, TypeKind::Struct(def));
        self
    }

    /// Declare and define a struct type.
    pub fn structure(&mut self, name: impl Into<String>, def: StructDef) -> TypeId {
        let id = self.declare(name);
        self.define(id, def);
        id
    }

    /// Declare and define an enum type.
    pub fn enumeration(&mut self, name: impl Into<String>, def: EnumDef) -> TypeId {
        let id = self.declare(name);
        self.set_kind(id, TypeKind::Enum(def));
        id
    }

    /// The growable list type with elements of type `elem`.
    pub fn list(&mut self, elem: TypeId) -> TypeId {
        if let Some(id) = self.lists.get(&elem) {
            return *id;
        }
        let name = format!("List<{}>", self.types[elem.index()].0);
        let id = self.insert(name, Some(TypeKind::List(elem)));
        self.lists.insert(elem, id);
        id
    }

    /// The fixed-size array type with elements of type `elem`.
    pub fn array(&mut self, elem: TypeId) -> TypeId {
        if let Some(id) = self.arrays.get(&elem) {
            return *id;
        }
        let name = format!("{}[]", self.types[elem.index()].0);
        let id = self.insert(name, Some(TypeKind::Array(elem)));
        self.arrays.insert(elem, id);
        id
    }

    /// Finish describing types.
    pub fn build(self) -> Result<Arc<Universe>, CoreError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let mut types = Vec::with_capacity(self.types.len());
        for (name, kind) in self.types {
            match kind {
                Some(kind) => types.push(TypeInfo { name, kind }),
                None => return Err(CoreError::UndefinedType { name }),
            }
        }
        let accessors = types.iter().map(|_| OnceLock::new()).collect();
        let names = types.iter().map(|t| Arc::from(t.name.as_str())).collect();
        Ok(Arc::new(Universe {
            types,
            by_name: self.by_name,
            names,
            accessors,
        }))
    }
}
