//! Value types that monitored members can hold.
//!
//! A [`Value`] is an owned snapshot of a member's current value. Handles
//! keep the last snapshot for dirty-checking, processors format it and
//! validators test it. [`ValueType`] is the declared shape of a member,
//! known at scan time before any value exists.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Possible values a monitored member can hold.
///
/// # Examples
///
/// ```
/// use livemon::Value;
///
/// let health = Value::Int(100);
/// let speed = Value::Float(3.5);
///
/// assert_eq!(health.as_i64(), Some(100));
/// assert!(speed.is_numeric());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    Vector4([f32; 4]),
    Quaternion([f32; 4]),
    Color(Color),
    Enum {
        type_name: String,
        variant: String,
    },
    Collection(Vec<Value>),
    Object(String),
}

impl Value {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::UInt(_) | Self::Float(_))
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[Value]> {
        match self {
            Self::Collection(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Vector2(_) => "vector2",
            Self::Vector3(_) => "vector3",
            Self::Vector4(_) => "vector4",
            Self::Quaternion(_) => "quaternion",
            Self::Color(_) => "color",
            Self::Enum { .. } => "enum",
            Self::Collection(_) => "collection",
            Self::Object(_) => "object",
        }
    }

    /// Dirty-check equality.
    ///
    /// Structural over the whole snapshot. Floats compare by bit pattern so a
    /// NaN that stays NaN is not reported as a change on every tick.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Vector2(a), Self::Vector2(b)) => bits_eq(a, b),
            (Self::Vector3(a), Self::Vector3(b)) => bits_eq(a, b),
            (Self::Vector4(a), Self::Vector4(b)) | (Self::Quaternion(a), Self::Quaternion(b)) => {
                bits_eq(a, b)
            }
            (Self::Collection(a), Self::Collection(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
            }
            _ => self == other,
        }
    }

    /// Equality used by validators: numbers compare numerically across
    /// int/uint/float, everything else structurally.
    #[must_use]
    pub fn loosely_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            _ if self.is_numeric() && other.is_numeric() => {
                self.compare(other) == Some(Ordering::Equal)
            }
            _ => self == other,
        }
    }

    /// Ordering between two values of compatible shapes.
    ///
    /// Returns `None` when the shapes have no ordering (vectors, collections,
    /// mismatched kinds) or a float comparison involves NaN.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::UInt(a), Self::UInt(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::UInt(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
            (Self::UInt(a), Self::Int(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            _ if self.is_numeric() && other.is_numeric() => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            _ => None,
        }
    }

    /// Sign of a numeric value: `Some(Ordering::Less)` for negative numbers.
    #[must_use]
    pub fn sign(&self) -> Option<Ordering> {
        match self {
            Self::Int(v) => Some(v.cmp(&0)),
            Self::UInt(v) => Some(v.cmp(&0)),
            Self::Float(v) => v.partial_cmp(&0.0),
            _ => None,
        }
    }

    /// Returns true if this value can be stored in a member of `value_type`.
    #[must_use]
    pub fn fits(&self, value_type: &ValueType) -> bool {
        match (value_type, self) {
            (ValueType::Nullable(_), Self::Null) => true,
            (ValueType::Nullable(inner), v) => v.fits(inner),
            (ValueType::Str | ValueType::Object(_) | ValueType::Collection(_), Self::Null) => true,
            (ValueType::Bool, Self::Bool(_)) => true,
            (t, Self::Int(_) | Self::UInt(_)) if t.is_integer() => self.fits_integer(t),
            (t, Self::Float(_) | Self::Int(_) | Self::UInt(_)) if t.is_float() => true,
            (ValueType::Str, Self::Str(_)) => true,
            (ValueType::Vector2, Self::Vector2(_))
            | (ValueType::Vector3, Self::Vector3(_))
            | (ValueType::Vector4, Self::Vector4(_))
            | (ValueType::Quaternion, Self::Quaternion(_))
            | (ValueType::Color, Self::Color(_)) => true,
            (ValueType::Enum(name), Self::Enum { type_name, .. }) => name == type_name,
            (ValueType::Collection(inner), Self::Collection(items)) => {
                items.iter().all(|item| item.fits(inner))
            }
            (ValueType::Object(_), Self::Object(_)) => true,
            _ => false,
        }
    }
}

impl Value {
    /// Range check of an integer value against the width of `value_type`.
    fn fits_integer(&self, value_type: &ValueType) -> bool {
        fn within<T: TryFrom<i64> + TryFrom<u64>>(value: &Value) -> bool {
            match value {
                Value::Int(v) => T::try_from(*v).is_ok(),
                Value::UInt(v) => T::try_from(*v).is_ok(),
                _ => false,
            }
        }
        match value_type {
            ValueType::I8 => within::<i8>(self),
            ValueType::I16 => within::<i16>(self),
            ValueType::I32 => within::<i32>(self),
            ValueType::I64 => within::<i64>(self),
            ValueType::U8 => within::<u8>(self),
            ValueType::U16 => within::<u16>(self),
            ValueType::U32 => within::<u32>(self),
            ValueType::U64 => within::<u64>(self),
            _ => false,
        }
    }
}

fn bits_eq<const N: usize>(a: &[f32; N], b: &[f32; N]) -> bool {
    a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
            Self::Vector2([x, y]) => write!(f, "({x}, {y})"),
            Self::Vector3([x, y, z]) => write!(f, "({x}, {y}, {z})"),
            Self::Vector4([x, y, z, w]) | Self::Quaternion([x, y, z, w]) => {
                write!(f, "({x}, {y}, {z}, {w})")
            }
            Self::Color(c) => write!(f, "{c}"),
            Self::Enum { variant, .. } => write!(f, "{variant}"),
            Self::Collection(items) => write!(f, "[{}]", items.len()),
            Self::Object(v) => write!(f, "{v}"),
        }
    }
}

/// Declared type of a monitored member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// No value, e.g. a method without return value.
    Unit,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Str,
    Vector2,
    Vector3,
    Vector4,
    Quaternion,
    Color,
    Enum(String),
    Nullable(Box<ValueType>),
    Collection(Box<ValueType>),
    /// Opaque type shown through its display conversion.
    Object(String),
    /// Invoke signature of an event.
    Delegate(Vec<ValueType>),
    /// Raw pointer shape. Never monitorable.
    Pointer,
    /// Stack-only shape that cannot be boxed. Only usable as a method out-parameter.
    ByRefLike(String),
}

impl ValueType {
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::U8 | Self::U16 | Self::U32 | Self::U64
        )
    }

    #[must_use]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Returns true for types with a total or partial order usable by
    /// relational show-if comparisons.
    #[must_use]
    pub fn is_orderable(&self) -> bool {
        match self {
            Self::Nullable(inner) => inner.is_orderable(),
            t => t.is_numeric() || matches!(t, Self::Bool | Self::Str),
        }
    }

    /// Returns true for types whose values can be null.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        matches!(
            self,
            Self::Nullable(_) | Self::Str | Self::Object(_) | Self::Collection(_)
        )
    }

    /// Strips one `Nullable` layer.
    #[must_use]
    pub fn underlying(&self) -> &Self {
        match self {
            Self::Nullable(inner) => inner,
            t => t,
        }
    }

    /// Returns true if values of this type can be boxed into a [`Value`].
    #[must_use]
    pub fn is_supported(&self) -> bool {
        match self {
            Self::Pointer | Self::ByRefLike(_) => false,
            Self::Nullable(inner) | Self::Collection(inner) => inner.is_supported(),
            Self::Delegate(args) => args.iter().all(Self::is_supported),
            _ => true,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "()"),
            Self::Bool => write!(f, "bool"),
            Self::I8 => write!(f, "i8"),
            Self::I16 => write!(f, "i16"),
            Self::I32 => write!(f, "i32"),
            Self::I64 => write!(f, "i64"),
            Self::U8 => write!(f, "u8"),
            Self::U16 => write!(f, "u16"),
            Self::U32 => write!(f, "u32"),
            Self::U64 => write!(f, "u64"),
            Self::F32 => write!(f, "f32"),
            Self::F64 => write!(f, "f64"),
            Self::Str => write!(f, "string"),
            Self::Vector2 => write!(f, "vec2"),
            Self::Vector3 => write!(f, "vec3"),
            Self::Vector4 => write!(f, "vec4"),
            Self::Quaternion => write!(f, "quat"),
            Self::Color => write!(f, "color"),
            Self::Enum(name) | Self::Object(name) => write!(f, "{name}"),
            Self::Nullable(inner) => write!(f, "Option<{inner}>"),
            Self::Collection(inner) => write!(f, "Vec<{inner}>"),
            Self::Delegate(args) => {
                write!(f, "fn(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Self::Pointer => write!(f, "*const _"),
            Self::ByRefLike(name) => write!(f, "ref {name}"),
        }
    }
}

/// RGBA color used by the palette, format data and color values.
///
/// Serialized as `#RRGGBB` or `#RRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const GREEN: Self = Self::rgb(0x4c, 0xd1, 0x37);
    pub const RED: Self = Self::rgb(0xe0, 0x3c, 0x31);
    pub const GRAY: Self = Self::rgb(0x90, 0x90, 0x90);

    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parses `#RRGGBB`, `#RRGGBBAA` or the same without the leading `#`.
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02X}", self.a)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value).ok_or_else(|| format!("invalid color '{value}'"))
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_string()
    }
}

/// Conversion between Rust types and monitored [`Value`]s.
///
/// Implemented for primitives, `String`, `Option<T>`, `Vec<T>`, the `glam`
/// vector and quaternion types and [`Color`]. Use [`monitor_enum!`](crate::monitor_enum)
/// for fieldless enums.
pub trait MonitorValue: Sized + 'static {
    /// Declared type of this Rust type.
    fn value_type() -> ValueType;

    /// Takes a snapshot.
    fn to_value(&self) -> Value;

    /// Converts back from a snapshot, `None` on shape mismatch.
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_signed {
    ($($ty:ty => $vt:ident),+ $(,)?) => {
        $(
            impl MonitorValue for $ty {
                fn value_type() -> ValueType {
                    ValueType::$vt
                }

                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }

                fn from_value(value: &Value) -> Option<Self> {
                    value.as_i64().and_then(|v| <$ty>::try_from(v).ok())
                }
            }
        )+
    };
}

macro_rules! impl_unsigned {
    ($($ty:ty => $vt:ident),+ $(,)?) => {
        $(
            impl MonitorValue for $ty {
                fn value_type() -> ValueType {
                    ValueType::$vt
                }

                fn to_value(&self) -> Value {
                    Value::UInt(u64::from(*self))
                }

                fn from_value(value: &Value) -> Option<Self> {
                    value.as_u64().and_then(|v| <$ty>::try_from(v).ok())
                }
            }
        )+
    };
}

impl_signed!(i8 => I8, i16 => I16, i32 => I32, i64 => I64);
impl_unsigned!(u8 => U8, u16 => U16, u32 => U32, u64 => U64);

impl MonitorValue for bool {
    fn value_type() -> ValueType {
        ValueType::Bool
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl MonitorValue for f32 {
    fn value_type() -> ValueType {
        ValueType::F32
    }

    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64().map(|v| v as f32)
    }
}

impl MonitorValue for f64 {
    fn value_type() -> ValueType {
        ValueType::F64
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl MonitorValue for String {
    fn value_type() -> ValueType {
        ValueType::Str
    }

    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl MonitorValue for Color {
    fn value_type() -> ValueType {
        ValueType::Color
    }

    fn to_value(&self) -> Value {
        Value::Color(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Color(c) => Some(*c),
            _ => None,
        }
    }
}

impl MonitorValue for glam::Vec2 {
    fn value_type() -> ValueType {
        ValueType::Vector2
    }

    fn to_value(&self) -> Value {
        Value::Vector2(self.to_array())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Vector2(v) => Some(Self::from_array(*v)),
            _ => None,
        }
    }
}

impl MonitorValue for glam::Vec3 {
    fn value_type() -> ValueType {
        ValueType::Vector3
    }

    fn to_value(&self) -> Value {
        Value::Vector3(self.to_array())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Vector3(v) => Some(Self::from_array(*v)),
            _ => None,
        }
    }
}

impl MonitorValue for glam::Vec4 {
    fn value_type() -> ValueType {
        ValueType::Vector4
    }

    fn to_value(&self) -> Value {
        Value::Vector4(self.to_array())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Vector4(v) => Some(Self::from_array(*v)),
            _ => None,
        }
    }
}

impl MonitorValue for glam::Quat {
    fn value_type() -> ValueType {
        ValueType::Quaternion
    }

    fn to_value(&self) -> Value {
        Value::Quaternion(self.to_array())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Quaternion(v) => Some(Self::from_array(*v)),
            _ => None,
        }
    }
}

impl<T: MonitorValue> MonitorValue for Option<T> {
    fn value_type() -> ValueType {
        ValueType::Nullable(Box::new(T::value_type()))
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, MonitorValue::to_value)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            v => T::from_value(v).map(Some),
        }
    }
}

impl<T: MonitorValue> MonitorValue for Vec<T> {
    fn value_type() -> ValueType {
        ValueType::Collection(Box::new(T::value_type()))
    }

    fn to_value(&self) -> Value {
        Value::Collection(self.iter().map(MonitorValue::to_value).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_collection()?.iter().map(T::from_value).collect()
    }
}

/// Implements [`MonitorValue`] for a fieldless enum.
///
/// ```
/// use livemon::{monitor_enum, MonitorValue, Value};
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Stance { Idle, Running }
///
/// monitor_enum!(Stance { Idle, Running });
///
/// assert_eq!(Stance::from_value(&Stance::Running.to_value()), Some(Stance::Running));
/// ```
#[macro_export]
macro_rules! monitor_enum {
    ($ty:ident { $($variant:ident),+ $(,)? }) => {
        impl $crate::MonitorValue for $ty {
            fn value_type() -> $crate::ValueType {
                $crate::ValueType::Enum(stringify!($ty).to_string())
            }

            fn to_value(&self) -> $crate::Value {
                let variant = match self {
                    $(Self::$variant => stringify!($variant),)+
                };
                $crate::Value::Enum {
                    type_name: stringify!($ty).to_string(),
                    variant: variant.to_string(),
                }
            }

            fn from_value(value: &$crate::Value) -> Option<Self> {
                match value {
                    $crate::Value::Enum { variant, .. } => match variant.as_str() {
                        $(stringify!($variant) => Some(Self::$variant),)+
                        _ => None,
                    },
                    _ => None,
                }
            }
        }
    };
}
