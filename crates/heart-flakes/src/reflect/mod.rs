//! Reflection layer: type paths, field kinds and descriptor tables.
//!
//! The codec never introspects Rust types. Every serializable class or
//! struct is described by a descriptor table registered in a
//! [`TypeRegistry`]; the ordered field list of that table is the positional
//! contract between writer and reader.

pub mod registry;
pub mod value;

use std::borrow::Borrow;
use std::fmt;

pub use registry::{
    ACTOR_CLASS, ClassBuilder, ClassDesc, FieldDesc, OBJECT_CLASS, ObjectHook, StructBuilder,
    StructDesc, StructHook, TypeRegistry,
};
pub use value::{Quat, SoftObjectPath, StructValue, Transform, Value, Vec2, Vec3};

/// Stable identifier of a class or struct, e.g. `/Script/Heart.HeartGraphNode`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TypePath(String);

impl TypePath {
    /// Creates a type path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the part after the last `.` (the bare type name).
    pub fn short_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Returns true for the empty path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TypePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypePath {
    fn from(path: &str) -> Self {
        Self(path.to_string())
    }
}

impl From<String> for TypePath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

/// Declared kind of a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Bool,
    U8,
    I32,
    I64,
    U32,
    U64,
    F32,
    F64,
    Str,
    Bytes,
    Guid,
    Vec2,
    Vec3,
    Quat,
    Transform,
    /// Inline struct of the given type.
    Struct(TypePath),
    /// Homogeneous list.
    Array(Box<FieldKind>),
    /// Hard object reference; the referenced class must derive from the path.
    Object(TypePath),
    /// Path to an object that is never loaded by the codec.
    SoftObject,
    /// Non-owning reference resolved by lookup.
    WeakObject,
}

impl FieldKind {
    /// Shorthand for `FieldKind::Array(Box::new(element))`.
    pub fn array(element: FieldKind) -> Self {
        FieldKind::Array(Box::new(element))
    }

    /// Shorthand for an object reference constrained to `base`.
    pub fn object(base: impl Into<TypePath>) -> Self {
        FieldKind::Object(base.into())
    }

    /// Shorthand for an inline struct.
    pub fn structure(path: impl Into<TypePath>) -> Self {
        FieldKind::Struct(path.into())
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Bool => f.write_str("bool"),
            FieldKind::U8 => f.write_str("u8"),
            FieldKind::I32 => f.write_str("i32"),
            FieldKind::I64 => f.write_str("i64"),
            FieldKind::U32 => f.write_str("u32"),
            FieldKind::U64 => f.write_str("u64"),
            FieldKind::F32 => f.write_str("f32"),
            FieldKind::F64 => f.write_str("f64"),
            FieldKind::Str => f.write_str("string"),
            FieldKind::Bytes => f.write_str("bytes"),
            FieldKind::Guid => f.write_str("guid"),
            FieldKind::Vec2 => f.write_str("vec2"),
            FieldKind::Vec3 => f.write_str("vec3"),
            FieldKind::Quat => f.write_str("quat"),
            FieldKind::Transform => f.write_str("transform"),
            FieldKind::Struct(path) => write!(f, "struct {path}"),
            FieldKind::Array(element) => write!(f, "array<{element}>"),
            FieldKind::Object(base) => write!(f, "object<{base}>"),
            FieldKind::SoftObject => f.write_str("soft object"),
            FieldKind::WeakObject => f.write_str("weak object"),
        }
    }
}
