use std::sync::Arc;

use indexmap::IndexMap;

use crate::{Access, CoreError, Getter, TypeId, TypeKind, Universe, Value};

/// Get/set functions for one member of a struct type.
#[derive(Clone)]
pub struct Accessor {
    name: String,
    owner: TypeId,
    owner_name: Arc<str>,
    type_names: Arc<[Arc<str>]>,
    index: usize,
    declared_type: TypeId,
    can_read: bool,
    can_write: bool,
    getter: Option<Getter>,
}

impl Accessor {
    /// Member name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The struct type that declares this member.
    pub fn owner(&self) -> TypeId {
        self.owner
    }

    /// Position of the member in its struct.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The member's declared type.
    pub fn declared_type(&self) -> TypeId {
        self.declared_type
    }

    /// Whether the member has a getter.
    pub fn can_read(&self) -> bool {
        self.can_read
    }

    /// Whether the member has a setter.
    pub fn can_write(&self) -> bool {
        self.can_write
    }

    fn object<'a>(&self, target: &'a Value) -> Result<&'a crate::ObjectRef, CoreError> {
        match target {
            Value::Object(o) => {
                let found = o.ty();
                if found != self.owner {
                    return Err(CoreError::TypeMismatch {
                        expected: self.owner_name.to_string(),
                        found: match self.type_names.get(found.index()) {
                            Some(name) => name.to_string(),
                            None => format!("#{}", found.index()),
                        },
                    });
                }
                Ok(o)
            }
            Value::Null => Err(CoreError::NullTarget {
                ty: self.owner_name.to_string(),
                member: self.name.clone(),
            }),
            _ => Err(CoreError::NotAStruct {
                ty: self.owner_name.to_string(),
                member: self.name.clone(),
            }),
        }
    }

    /// Read the member from `target`.
    pub fn get(&self, target: &Value) -> Result<Value, CoreError> {
        if !self.can_read {
            return Err(CoreError::NotReadable {
                ty: self.owner_name.to_string(),
                member: self.name.clone(),
            });
        }
        let stored = self.object(target)?.field(self.index);
        Ok(match &self.getter {
            Some(getter) => getter(&stored),
            None => stored,
        })
    }

    /// Write `value` into the member of `target`.
    pub fn set(&self, target: &Value, value: Value) -> Result<(), CoreError> {
        if !self.can_write {
            return Err(CoreError::NotWritable {
                ty: self.owner_name.to_string(),
                member: self.name.clone(),
            });
        }
        self.object(target)?.set_field(self.index, value)
    }
}

impl core::fmt::Debug for Accessor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Accessor")
            .field("name", &self.name)
            .field("owner", &self.owner_name)
            .field("index", &self.index)
            .field("declared_type", &self.declared_type)
            .field("can_read", &self.can_read)
            .field("can_write", &self.can_write)
            .finish()
    }
}

/// The named accessors of one type.
///
/// Non-struct types have an empty table.
#[derive(Debug)]
pub struct AccessorTable {
    ty: TypeId,
    members: IndexMap<String, Accessor>,
    default_constructible: bool,
}

impl AccessorTable {
    pub(crate) fn build(universe: &Universe, ty: TypeId) -> Self {
        let owner_name: Arc<str> = Arc::from(universe.name(ty));
        let type_names = universe.type_names().clone();
        match universe.kind(ty) {
            TypeKind::Struct(def) => {
                let members = def
                    .fields()
                    .iter()
                    .enumerate()
                    .map(|(index, field)| {
                        let accessor = Accessor {
                            name: field.name.clone(),
                            owner: ty,
                            owner_name: owner_name.clone(),
                            type_names: type_names.clone(),
                            index,
                            declared_type: field.ty,
                            can_read: field.access != Access::WriteOnly,
                            can_write: field.access != Access::ReadOnly,
                            getter: field.getter.clone(),
                        };
                        (field.name.clone(), accessor)
                    })
                    .collect();
                Self {
                    ty,
                    members,
                    default_constructible: def.default_constructible(),
                }
            }
            TypeKind::Scalar(_) | TypeKind::Enum(_) => Self {
                ty,
                members: IndexMap::new(),
                default_constructible: true,
            },
            TypeKind::List(_) | TypeKind::Array(_) => Self {
                ty,
                members: IndexMap::new(),
                default_constructible: true,
            },
        }
    }

    /// The type this table describes.
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    /// The accessor for `name`.
    pub fn get(&self, name: &str) -> Option<&Accessor> {
        self.members.get(name)
    }

    /// All accessors, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Accessor> {
        self.members.values()
    }

    /// All member names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the type has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether the type can be default-constructed.
    pub fn can_default_construct(&self) -> bool {
        self.default_constructible
    }
}
