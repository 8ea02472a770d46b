//! Dynamic field values.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::ReflectError;
use crate::object::ObjectId;
use crate::reflect::{FieldKind, StructDesc, TypePath};

/// 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// 3D vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ONE: Vec3 = Vec3::new(1.0, 1.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Rotation quaternion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quat {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quat {
    pub const IDENTITY: Quat = Quat::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Placement of an actor: translation, rotation, scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::new(0.0, 0.0, 0.0),
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Identity rotation and unit scale at `translation`.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Path to an object that may or may not be loaded. Empty means null.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SoftObjectPath(String);

impl SoftObjectPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn null() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A field value. Mirrors [`FieldKind`] one to one.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Guid(Uuid),
    Vec2(Vec2),
    Vec3(Vec3),
    Quat(Quat),
    Transform(Transform),
    Struct(StructValue),
    Array(Vec<Value>),
    Object(Option<ObjectId>),
    SoftObject(SoftObjectPath),
    WeakObject(Option<ObjectId>),
}

impl Value {
    /// Returns true when the value has the shape `kind` describes.
    ///
    /// Object references are only checked for shape here; class constraints
    /// need an object store and are checked by [`crate::object::ObjectStore`].
    pub fn matches(&self, kind: &FieldKind) -> bool {
        match (self, kind) {
            (Value::Bool(_), FieldKind::Bool)
            | (Value::U8(_), FieldKind::U8)
            | (Value::I32(_), FieldKind::I32)
            | (Value::I64(_), FieldKind::I64)
            | (Value::U32(_), FieldKind::U32)
            | (Value::U64(_), FieldKind::U64)
            | (Value::F32(_), FieldKind::F32)
            | (Value::F64(_), FieldKind::F64)
            | (Value::Str(_), FieldKind::Str)
            | (Value::Bytes(_), FieldKind::Bytes)
            | (Value::Guid(_), FieldKind::Guid)
            | (Value::Vec2(_), FieldKind::Vec2)
            | (Value::Vec3(_), FieldKind::Vec3)
            | (Value::Quat(_), FieldKind::Quat)
            | (Value::Transform(_), FieldKind::Transform)
            | (Value::Object(_), FieldKind::Object(_))
            | (Value::SoftObject(_), FieldKind::SoftObject)
            | (Value::WeakObject(_), FieldKind::WeakObject) => true,
            (Value::Struct(value), FieldKind::Struct(path)) => value.type_path() == path,
            (Value::Array(items), FieldKind::Array(element)) => {
                items.iter().all(|item| item.matches(element))
            }
            _ => false,
        }
    }

    /// Short human-readable name of the value's shape, for error messages.
    pub fn kind_name(&self) -> String {
        match self {
            Value::Bool(_) => "bool".into(),
            Value::U8(_) => "u8".into(),
            Value::I32(_) => "i32".into(),
            Value::I64(_) => "i64".into(),
            Value::U32(_) => "u32".into(),
            Value::U64(_) => "u64".into(),
            Value::F32(_) => "f32".into(),
            Value::F64(_) => "f64".into(),
            Value::Str(_) => "string".into(),
            Value::Bytes(_) => "bytes".into(),
            Value::Guid(_) => "guid".into(),
            Value::Vec2(_) => "vec2".into(),
            Value::Vec3(_) => "vec3".into(),
            Value::Quat(_) => "quat".into(),
            Value::Transform(_) => "transform".into(),
            Value::Struct(value) => format!("struct {}", value.type_path()),
            Value::Array(_) => "array".into(),
            Value::Object(_) => "object".into(),
            Value::SoftObject(_) => "soft object".into(),
            Value::WeakObject(_) => "weak object".into(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I32(v) => Some(v as i64),
            Value::I64(v) => Some(v),
            Value::U8(v) => Some(v as i64),
            Value::U32(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match *self {
            Value::Object(id) | Value::WeakObject(id) => id,
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(value) => Some(value),
            _ => None,
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
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec2> for Value {
    fn from(v: Vec2) -> Self {
        Value::Vec2(v)
    }
}

impl From<Vec3> for Value {
    fn from(v: Vec3) -> Self {
        Value::Vec3(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Guid(v)
    }
}

impl From<StructValue> for Value {
    fn from(v: StructValue) -> Self {
        Value::Struct(v)
    }
}

/// An instance of a registered struct: positional field values plus the
/// descriptor that names them.
#[derive(Debug, Clone)]
pub struct StructValue {
    desc: Arc<StructDesc>,
    fields: Vec<Value>,
}

impl StructValue {
    /// Creates a struct holding the descriptor's default field values.
    pub fn new(desc: Arc<StructDesc>) -> Self {
        let fields = desc.fields().iter().map(|f| f.default().clone()).collect();
        Self { desc, fields }
    }

    pub fn desc(&self) -> &Arc<StructDesc> {
        &self.desc
    }

    pub fn type_path(&self) -> &TypePath {
        self.desc.path()
    }

    /// Positional field values, in descriptor order.
    pub fn values(&self) -> &[Value] {
        &self.fields
    }

    /// Returns a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.desc.field_index(name).map(|i| &self.fields[i])
    }

    /// Sets a field value by name, checking its kind.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ReflectError> {
        let index = self
            .desc
            .field_index(name)
            .ok_or_else(|| ReflectError::UnknownField {
                path: self.desc.path().clone(),
                field: name.to_string(),
            })?;
        let value = value.into();
        let field = &self.desc.fields()[index];
        if !value.matches(field.kind()) {
            return Err(ReflectError::KindMismatch {
                field: name.to_string(),
                expected: field.kind().to_string(),
                found: value.kind_name(),
            });
        }
        self.fields[index] = value;
        Ok(())
    }

    /// Builder-style [`StructValue::set`].
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self, ReflectError> {
        self.set(name, value)?;
        Ok(self)
    }

    pub(crate) fn replace_values(&mut self, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.fields.len());
        self.fields = values;
    }
}

impl PartialEq for StructValue {
    fn eq(&self, other: &Self) -> bool {
        self.desc.path() == other.desc.path() && self.fields == other.fields
    }
}
