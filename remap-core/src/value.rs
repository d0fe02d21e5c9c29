use std::sync::{Arc, PoisonError, RwLock};

use crate::{CoreError, TypeId};

/// A dynamically typed value.
///
/// Objects and lists are shared handles: cloning a [`Value::Object`] clones
/// the handle, not the object. Equality is deep and structural.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The null reference (also the default of strings, objects and sequences).
    #[default]
    Null,
    /// A `bool`.
    Bool(bool),
    /// An `i32`.
    I32(i32),
    /// An `i64`.
    I64(i64),
    /// An `f64`.
    F64(f64),
    /// A string.
    String(String),
    /// An enum value.
    Enum(EnumValue),
    /// A struct instance.
    Object(ObjectRef),
    /// A list or array instance.
    List(ListRef),
}

impl Value {
    /// Whether this is [`Value::Null`].
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The object handle, if this is an object.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// The list handle, if this is a list or array.
    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// The string contents, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<EnumValue> for Value {
    fn from(v: EnumValue) -> Self {
        Value::Enum(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

impl From<ListRef> for Value {
    fn from(v: ListRef) -> Self {
        Value::List(v)
    }
}

/// An enum value: its type and underlying discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumValue {
    /// The enum type.
    pub ty: TypeId,
    /// Underlying integer value.
    pub discriminant: i64,
}

#[derive(Debug)]
struct ObjectData {
    ty: TypeId,
    fields: Vec<Value>,
}

/// Shared handle to a struct instance.
#[derive(Clone)]
pub struct ObjectRef(Arc<RwLock<ObjectData>>);

impl ObjectRef {
    pub(crate) fn new(ty: TypeId, fields: Vec<Value>) -> Self {
        Self(Arc::new(RwLock::new(ObjectData { ty, fields })))
    }

    /// The struct type of this instance.
    pub fn ty(&self) -> TypeId {
        self.0.read().unwrap_or_else(PoisonError::into_inner).ty
    }

    /// The stored value of the member at `index`, bypassing accessors.
    ///
    /// Out-of-range indices read as [`Value::Null`].
    pub fn field(&self, index: usize) -> Value {
        let data = self.0.read().unwrap_or_else(PoisonError::into_inner);
        data.fields.get(index).cloned().unwrap_or_default()
    }

    /// Overwrite the member at `index`, bypassing accessors.
    pub fn set_field(&self, index: usize, value: Value) -> Result<(), CoreError> {
        let mut data = self.0.write().unwrap_or_else(PoisonError::into_inner);
        let len = data.fields.len();
        match data.fields.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(CoreError::IndexOutOfBounds { index, len }),
        }
    }

    /// A copy of all stored member values.
    pub fn fields(&self) -> Vec<Value> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .fields
            .clone()
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        // snapshot both sides so no lock is held while recursing
        self.ty() == other.ty() && self.fields() == other.fields()
    }
}

impl core::fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Object")
            .field("ty", &self.ty())
            .field("fields", &self.fields())
            .finish()
    }
}

#[derive(Debug)]
struct ListData {
    ty: TypeId,
    fixed: bool,
    items: Vec<Value>,
}

/// Shared handle to a list or array instance.
#[derive(Clone)]
pub struct ListRef(Arc<RwLock<ListData>>);

impl ListRef {
    pub(crate) fn growable(ty: TypeId, capacity: usize) -> Self {
        Self(Arc::new(RwLock::new(ListData {
            ty,
            fixed: false,
            items: Vec::with_capacity(capacity),
        })))
    }

    pub(crate) fn fixed(ty: TypeId, len: usize) -> Self {
        Self(Arc::new(RwLock::new(ListData {
            ty,
            fixed: true,
            items: vec![Value::Null; len],
        })))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ListData> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, ListData> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The list or array type of this instance.
    pub fn ty(&self) -> TypeId {
        self.read().ty
    }

    /// Whether this is a fixed-size array.
    pub fn is_fixed(&self) -> bool {
        self.read().fixed
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    /// Whether there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reserved capacity of the backing storage.
    pub fn capacity(&self) -> usize {
        self.read().items.capacity()
    }

    /// The element at `index`.
    pub fn get(&self, index: usize) -> Result<Value, CoreError> {
        let data = self.read();
        data.items
            .get(index)
            .cloned()
            .ok_or(CoreError::IndexOutOfBounds {
                index,
                len: data.items.len(),
            })
    }

    /// Overwrite the element at `index`.
    pub fn set(&self, index: usize, value: Value) -> Result<(), CoreError> {
        let mut data = self.write();
        let len = data.items.len();
        match data.items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(CoreError::IndexOutOfBounds { index, len }),
        }
    }

    /// Append an element. Fails on fixed-size arrays.
    pub fn push(&self, value: Value) -> Result<(), CoreError> {
        let mut data = self.write();
        if data.fixed {
            return Err(CoreError::FixedSize {
                len: data.items.len(),
            });
        }
        data.items.push(value);
        Ok(())
    }

    /// A copy of all elements.
    pub fn items(&self) -> Vec<Value> {
        self.read().items.clone()
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(&self, other: &ListRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ListRef {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.ty() == other.ty() && self.items() == other.items()
    }
}

impl core::fmt::Debug for ListRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("List")
            .field("ty", &self.ty())
            .field("items", &self.items())
            .finish()
    }
}
