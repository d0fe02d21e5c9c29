//! Single-value conversions between scalars and enums.

use remap_core::{EnumValue, ScalarKind, TypeId, Universe, Value};

use crate::MapError;

/// How one scalar or enum value becomes another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Same type: the value is passed through.
    Identity,
    /// Numeric, boolean and string coercion between built-in scalars.
    Scalar {
        /// Source kind.
        from: ScalarKind,
        /// Destination kind.
        to: ScalarKind,
    },
    /// Enum to its underlying value (or its variant name, for strings).
    EnumToScalar {
        /// The enum type.
        from: TypeId,
        /// Destination kind.
        to: ScalarKind,
    },
    /// Underlying value (or variant name) to an enum.
    ScalarToEnum {
        /// Source kind.
        from: ScalarKind,
        /// The enum type.
        to: TypeId,
    },
    /// Enum to enum, matching variants by name, then by value.
    EnumToEnum {
        /// Source enum.
        from: TypeId,
        /// Destination enum.
        to: TypeId,
    },
}

pub(crate) const fn scalar_type(kind: ScalarKind) -> TypeId {
    match kind {
        ScalarKind::Bool => TypeId::BOOL,
        ScalarKind::I32 => TypeId::I32,
        ScalarKind::I64 => TypeId::I64,
        ScalarKind::F64 => TypeId::F64,
        ScalarKind::String => TypeId::STRING,
    }
}

impl Conversion {
    /// The conversion from `source` to `destination`, if both are scalars
    /// or enums.
    pub fn between(universe: &Universe, source: TypeId, destination: TypeId) -> Option<Self> {
        if source == destination {
            return Some(Conversion::Identity);
        }
        let src_enum = universe.enum_def(source).is_some();
        let dst_enum = universe.enum_def(destination).is_some();
        match (universe.scalar(source), universe.scalar(destination)) {
            (Some(from), Some(to)) => Some(Conversion::Scalar { from, to }),
            (None, Some(to)) if src_enum => Some(Conversion::EnumToScalar { from: source, to }),
            (Some(from), None) if dst_enum => Some(Conversion::ScalarToEnum {
                from,
                to: destination,
            }),
            (None, None) if src_enum && dst_enum => Some(Conversion::EnumToEnum {
                from: source,
                to: destination,
            }),
            _ => None,
        }
    }

    /// Whether either side is an enum.
    pub fn involves_enum(&self) -> bool {
        matches!(
            self,
            Conversion::EnumToScalar { .. }
                | Conversion::ScalarToEnum { .. }
                | Conversion::EnumToEnum { .. }
        )
    }

    /// The destination type, when it is fixed by the conversion.
    fn destination(&self) -> Option<TypeId> {
        match *self {
            Conversion::Identity => None,
            Conversion::Scalar { to, .. } | Conversion::EnumToScalar { to, .. } => {
                Some(scalar_type(to))
            }
            Conversion::ScalarToEnum { to, .. } | Conversion::EnumToEnum { to, .. } => Some(to),
        }
    }

    /// Convert `value`. A null input yields the destination's default value.
    pub fn apply(&self, universe: &Universe, value: &Value) -> Result<Value, MapError> {
        if let Conversion::Identity = self {
            return Ok(value.clone());
        }
        if value.is_null() {
            return Ok(self
                .destination()
                .map(|ty| universe.default_value(ty))
                .unwrap_or_default());
        }
        match *self {
            Conversion::Identity => Ok(value.clone()),
            Conversion::Scalar { to, .. } => coerce(universe, value, to),
            Conversion::EnumToScalar { to, .. } => match value {
                Value::Enum(e) if to == ScalarKind::String => {
                    let name = universe
                        .enum_def(e.ty)
                        .and_then(|def| def.by_discriminant(e.discriminant))
                        .map(|v| v.name.clone())
                        .unwrap_or_else(|| e.discriminant.to_string());
                    Ok(Value::String(name))
                }
                Value::Enum(e) => coerce(universe, &Value::I64(e.discriminant), to),
                other => coerce(universe, other, to),
            },
            Conversion::ScalarToEnum { to, .. } => {
                let discriminant = match value {
                    Value::String(s) => {
                        let s = s.trim();
                        match universe.enum_def(to).and_then(|def| def.by_name(s)) {
                            Some(variant) => variant.discriminant,
                            None => s.parse::<i64>().map_err(|_| failure(universe, value, to))?,
                        }
                    }
                    Value::Enum(e) => e.discriminant,
                    other => match coerce(universe, other, ScalarKind::I64)? {
                        Value::I64(n) => n,
                        _ => return Err(failure(universe, value, to)),
                    },
                };
                Ok(Value::Enum(EnumValue {
                    ty: to,
                    discriminant,
                }))
            }
            Conversion::EnumToEnum { to, .. } => {
                let Value::Enum(e) = value else {
                    return Err(failure(universe, value, to));
                };
                let by_name = universe
                    .enum_def(e.ty)
                    .and_then(|def| def.by_discriminant(e.discriminant))
                    .and_then(|variant| universe.enum_def(to)?.by_name(&variant.name));
                Ok(Value::Enum(EnumValue {
                    ty: to,
                    discriminant: by_name.map_or(e.discriminant, |v| v.discriminant),
                }))
            }
        }
    }
}

fn failure(universe: &Universe, value: &Value, to: TypeId) -> MapError {
    MapError::Conversion {
        value: universe.display(value).to_string(),
        from: universe
            .type_of(value)
            .map_or("null", |ty| universe.name(ty))
            .to_owned(),
        to: universe.name(to).to_owned(),
    }
}

fn float_to_int(x: f64, min: f64, max: f64) -> Option<i64> {
    let rounded = x.round_ties_even();
    (rounded.is_finite() && rounded >= min && rounded <= max).then_some(rounded as i64)
}

fn coerce(universe: &Universe, value: &Value, to: ScalarKind) -> Result<Value, MapError> {
    let fail = || failure(universe, value, scalar_type(to));
    let out = match (value, to) {
        (Value::Bool(b), ScalarKind::Bool) => Value::Bool(*b),
        (Value::Bool(b), ScalarKind::I32) => Value::I32(i32::from(*b)),
        (Value::Bool(b), ScalarKind::I64) => Value::I64(i64::from(*b)),
        (Value::Bool(b), ScalarKind::F64) => Value::F64(if *b { 1.0 } else { 0.0 }),

        (Value::I32(n), ScalarKind::Bool) => Value::Bool(*n != 0),
        (Value::I32(n), ScalarKind::I32) => Value::I32(*n),
        (Value::I32(n), ScalarKind::I64) => Value::I64(i64::from(*n)),
        (Value::I32(n), ScalarKind::F64) => Value::F64(f64::from(*n)),

        (Value::I64(n), ScalarKind::Bool) => Value::Bool(*n != 0),
        (Value::I64(n), ScalarKind::I32) => Value::I32(i32::try_from(*n).map_err(|_| fail())?),
        (Value::I64(n), ScalarKind::I64) => Value::I64(*n),
        (Value::I64(n), ScalarKind::F64) => Value::F64(*n as f64),

        (Value::F64(x), ScalarKind::Bool) => Value::Bool(*x != 0.0),
        (Value::F64(x), ScalarKind::I32) => {
            let n = float_to_int(*x, f64::from(i32::MIN), f64::from(i32::MAX)).ok_or_else(fail)?;
            Value::I32(n as i32)
        }
        (Value::F64(x), ScalarKind::I64) => {
            Value::I64(float_to_int(*x, i64::MIN as f64, i64::MAX as f64).ok_or_else(fail)?)
        }
        (Value::F64(x), ScalarKind::F64) => Value::F64(*x),

        (Value::String(s), ScalarKind::Bool) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if s.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                return Err(fail());
            }
        }
        (Value::String(s), ScalarKind::I32) => Value::I32(s.trim().parse().map_err(|_| fail())?),
        (Value::String(s), ScalarKind::I64) => Value::I64(s.trim().parse().map_err(|_| fail())?),
        (Value::String(s), ScalarKind::F64) => Value::F64(s.trim().parse().map_err(|_| fail())?),
        (Value::String(s), ScalarKind::String) => Value::String(s.clone()),

        (Value::Bool(b), ScalarKind::String) => Value::String(b.to_string()),
        (Value::I32(n), ScalarKind::String) => Value::String(n.to_string()),
        (Value::I64(n), ScalarKind::String) => Value::String(n.to_string()),
        (Value::F64(x), ScalarKind::String) => Value::String(x.to_string()),

        (Value::Enum(e), _) => return coerce(universe, &Value::I64(e.discriminant), to),
        (Value::Null, _) => universe.default_value(scalar_type(to)),
        (Value::Object(_) | Value::List(_), _) => return Err(fail()),
    };
    Ok(out)
}
