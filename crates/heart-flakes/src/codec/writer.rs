//! Recursive payload writer.
//!
//! The writer walks an object's fields in descriptor order. A referenced
//! object is inlined only when its outer is the object currently on top of
//! the owner stack; every other reference is written as a path. Non-owned
//! links are never followed, so reference cycles cannot recurse.

use crate::codec::primitives::Writer;
use crate::codec::{CodecOptions, ObjectMarker};
use crate::error::EncodeError;
use crate::limits::{MAX_ARRAY_LEN, MAX_BYTES_LEN, MAX_DEPTH, MAX_STRING_LEN};
use crate::object::{Object, ObjectId, ObjectStore};
use crate::reflect::{FieldDesc, FieldKind, SoftObjectPath, StructValue, Value};

/// Encodes the fields of `object`, inlining the sub-objects it owns.
pub fn encode_object(
    store: &ObjectStore,
    object: ObjectId,
    options: CodecOptions,
) -> Result<Vec<u8>, EncodeError> {
    let Some(source) = store.get(object) else {
        return Ok(Vec::new());
    };
    let mut writer = ObjectWriter::new(store, Some(object), options);
    writer.write_fields(source.class().fields(), source.values())?;
    Ok(writer.out.into_bytes())
}

/// Encodes a struct value. Nothing owns anything inside a bare struct, so
/// every object reference it holds is written as a path.
pub fn encode_struct(
    store: &ObjectStore,
    value: &StructValue,
    options: CodecOptions,
) -> Result<Vec<u8>, EncodeError> {
    let mut writer = ObjectWriter::new(store, None, options);
    writer.write_fields(value.desc().fields(), value.values())?;
    Ok(writer.out.into_bytes())
}

struct ObjectWriter<'s> {
    store: &'s ObjectStore,
    out: Writer,
    /// Objects currently being written; the top owns what gets inlined.
    owners: Vec<ObjectId>,
    options: CodecOptions,
    struct_depth: usize,
}

impl<'s> ObjectWriter<'s> {
    fn new(store: &'s ObjectStore, owner: Option<ObjectId>, options: CodecOptions) -> Self {
        Self {
            store,
            out: Writer::with_capacity(256),
            owners: owner.into_iter().collect(),
            options,
            struct_depth: 0,
        }
    }

    fn write_fields(&mut self, fields: &[FieldDesc], values: &[Value]) -> Result<(), EncodeError> {
        for (field, value) in fields.iter().zip(values) {
            self.write_value(field.name(), field.kind(), value)?;
        }
        Ok(())
    }

    fn write_value(&mut self, field: &str, kind: &FieldKind, value: &Value) -> Result<(), EncodeError> {
        match (kind, value) {
            (FieldKind::Bool, Value::Bool(v)) => self.out.write_bool(*v),
            (FieldKind::U8, Value::U8(v)) => self.out.write_byte(*v),
            (FieldKind::I32, Value::I32(v)) => self.out.write_signed_varint(*v as i64),
            (FieldKind::I64, Value::I64(v)) => self.out.write_signed_varint(*v),
            (FieldKind::U32, Value::U32(v)) => self.out.write_varint(*v as u64),
            (FieldKind::U64, Value::U64(v)) => self.out.write_varint(*v),
            (FieldKind::F32, Value::F32(v)) => self.out.write_f32(*v),
            (FieldKind::F64, Value::F64(v)) => self.out.write_f64(*v),
            (FieldKind::Str, Value::Str(v)) => self.write_string(field, v)?,
            (FieldKind::Bytes, Value::Bytes(v)) => {
                check_len(field, v.len(), MAX_BYTES_LEN)?;
                self.out.write_bytes_prefixed(v);
            }
            (FieldKind::Guid, Value::Guid(v)) => self.out.write_guid(v),
            (FieldKind::Vec2, Value::Vec2(v)) => {
                self.out.write_f64(v.x);
                self.out.write_f64(v.y);
            }
            (FieldKind::Vec3, Value::Vec3(v)) => self.write_vec3(v.x, v.y, v.z),
            (FieldKind::Quat, Value::Quat(q)) => {
                self.write_vec3(q.x, q.y, q.z);
                self.out.write_f64(q.w);
            }
            (FieldKind::Transform, Value::Transform(t)) => {
                self.write_vec3(t.translation.x, t.translation.y, t.translation.z);
                let q = t.rotation;
                self.write_vec3(q.x, q.y, q.z);
                self.out.write_f64(q.w);
                self.write_vec3(t.scale.x, t.scale.y, t.scale.z);
            }
            (FieldKind::Struct(path), Value::Struct(inner)) if inner.type_path() == path => {
                self.struct_depth += 1;
                if self.struct_depth > MAX_DEPTH {
                    return Err(EncodeError::DepthExceeded { max: MAX_DEPTH });
                }
                self.write_fields(inner.desc().fields(), inner.values())?;
                self.struct_depth -= 1;
            }
            (FieldKind::Array(element), Value::Array(items)) => {
                check_len(field, items.len(), MAX_ARRAY_LEN)?;
                self.out.write_varint(items.len() as u64);
                for item in items {
                    self.write_value(field, element, item)?;
                }
            }
            (FieldKind::Object(_), Value::Object(target)) => self.write_object_ref(field, *target)?,
            (FieldKind::WeakObject, Value::WeakObject(target)) => {
                match target.and_then(|id| self.store.path_of(id)) {
                    Some(path) => {
                        self.out.write_byte(ObjectMarker::Reference as u8);
                        self.write_string(field, path)?;
                    }
                    None => self.out.write_byte(ObjectMarker::Null as u8),
                }
            }
            (FieldKind::SoftObject, Value::SoftObject(path)) => self.write_soft_path(field, path)?,
            _ => {
                return Err(EncodeError::KindMismatch {
                    field: field.to_string(),
                    expected: kind.to_string(),
                });
            }
        }
        Ok(())
    }

    fn write_object_ref(&mut self, field: &str, target: Option<ObjectId>) -> Result<(), EncodeError> {
        // Dangling ids are written as null.
        let Some(object) = target.and_then(|id| self.store.get(id)) else {
            self.out.write_byte(ObjectMarker::Null as u8);
            return Ok(());
        };

        if !is_owned_by_top(&self.owners, object) {
            self.out.write_byte(ObjectMarker::Reference as u8);
            return self.write_string(field, object.path());
        }

        if self.owners.len() > MAX_DEPTH {
            return Err(EncodeError::DepthExceeded { max: MAX_DEPTH });
        }

        self.out.write_byte(ObjectMarker::Owned as u8);
        self.write_string(field, object.class().path().as_str())?;

        self.owners.push(object.id());
        if self.options.skippable_objects {
            let outer = std::mem::take(&mut self.out);
            let written = self.write_fields(object.class().fields(), object.values());
            let block = std::mem::replace(&mut self.out, outer);
            written?;
            self.out.write_bytes_prefixed(block.as_bytes());
        } else {
            self.write_fields(object.class().fields(), object.values())?;
        }
        self.owners.pop();
        Ok(())
    }

    fn write_soft_path(&mut self, field: &str, path: &SoftObjectPath) -> Result<(), EncodeError> {
        if path.is_null() {
            self.out.write_byte(ObjectMarker::Null as u8);
            return Ok(());
        }
        self.out.write_byte(ObjectMarker::Reference as u8);
        self.write_string(field, path.as_str())
    }

    fn write_string(&mut self, field: &str, s: &str) -> Result<(), EncodeError> {
        check_len(field, s.len(), MAX_STRING_LEN)?;
        self.out.write_string(s);
        Ok(())
    }

    fn write_vec3(&mut self, x: f64, y: f64, z: f64) {
        self.out.write_f64(x);
        self.out.write_f64(y);
        self.out.write_f64(z);
    }
}

/// True when `object` is to be inlined: its outer is the object on top of
/// the owner stack and it is not already being written.
pub(crate) fn is_owned_by_top(owners: &[ObjectId], object: &Object) -> bool {
    match (owners.last(), object.outer()) {
        (Some(top), Some(outer)) => *top == outer && !owners.contains(&object.id()),
        _ => false,
    }
}

pub(crate) fn check_len(field: &str, len: usize, max: usize) -> Result<(), EncodeError> {
    if len > max {
        return Err(EncodeError::LengthExceedsLimit {
            field: field.to_string(),
            len,
            max,
        });
    }
    Ok(())
}
