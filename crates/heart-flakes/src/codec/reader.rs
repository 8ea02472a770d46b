//! Recursive payload reader.
//!
//! Mirrors [`super::writer`]. Owned blocks are reconstructed as new objects
//! attached to the object on top of the owner stack; references are looked
//! up in the store and never reconstructed.
//!
//! Field-level failures (a class or path that no longer resolves, or a class
//! that no longer fits the field) leave the field at its current value and
//! are reported as [`Diagnostic`]s. Structural failures abort the read: the
//! objects created so far are destroyed and nothing is committed.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::codec::primitives::Reader;
use crate::codec::{CodecOptions, ObjectMarker};
use crate::error::{DecodeError, FlakeError};
use crate::limits::{MAX_ARRAY_LEN, MAX_BYTES_LEN, MAX_DEPTH, MAX_PAYLOAD_SIZE, MAX_STRING_LEN};
use crate::object::{ObjectId, ObjectStore};
use crate::reflect::{
    ClassDesc, FieldDesc, FieldKind, Quat, SoftObjectPath, StructValue, Transform, TypePath,
    TypeRegistry, Value, Vec2, Vec3,
};

/// A field that could not be restored and kept its current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The class of an owned sub-object is not registered.
    TypeNotFound { field: String, path: String },
    /// A reference path names no live object.
    UnresolvedReference { field: String, path: String },
    /// The stored class does not derive from the field's declared base.
    IncompatibleClass {
        field: String,
        expected: String,
        found: String,
    },
}

impl Diagnostic {
    /// Dotted path of the field the diagnostic is about.
    pub fn field(&self) -> &str {
        match self {
            Diagnostic::TypeNotFound { field, .. }
            | Diagnostic::UnresolvedReference { field, .. }
            | Diagnostic::IncompatibleClass { field, .. } => field,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::TypeNotFound { field, path } => {
                write!(f, "{field}: owned class {path} is not registered")
            }
            Diagnostic::UnresolvedReference { field, path } => {
                write!(f, "{field}: reference {path} does not resolve")
            }
            Diagnostic::IncompatibleClass {
                field,
                expected,
                found,
            } => write!(f, "{field}: {found} is not a {expected}"),
        }
    }
}

/// Outcome of a successful read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadReport {
    /// Recovered field-level failures, in payload order.
    pub diagnostics: Vec<Diagnostic>,
    /// Sub-objects instantiated by the read, in creation order.
    pub created: Vec<ObjectId>,
}

impl ReadReport {
    /// True when every field was restored.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Reads a payload produced by [`super::encode_object`] into `dest`.
///
/// `class` is the class the payload was written with; `dest` must be of that
/// class or derive from it. Only the fields of `class` are replaced, so a
/// derived destination keeps its own extra fields.
pub fn decode_object(
    store: &mut ObjectStore,
    dest: ObjectId,
    class: &ClassDesc,
    data: &[u8],
    options: CodecOptions,
) -> Result<ReadReport, FlakeError> {
    let types = Arc::clone(store.types());
    stage_object_read(store, dest, class, |store, current| {
        let mut reader = ObjectReader::new(Env::Exclusive(store), types, data, Some(dest), options);
        let staged = reader.read_all(class.fields(), current);
        (staged, reader.report)
    })
}

/// Runs `read` over the current values of `class`'s fields in `dest` and
/// commits what it returns only on success. On failure every object the
/// read created is destroyed and `dest` is left as it was.
pub(crate) fn stage_object_read<F>(
    store: &mut ObjectStore,
    dest: ObjectId,
    class: &ClassDesc,
    read: F,
) -> Result<ReadReport, FlakeError>
where
    F: FnOnce(&mut ObjectStore, &[Value]) -> (Result<Vec<Value>, FlakeError>, ReadReport),
{
    let current: Vec<Value> = match store.get(dest) {
        Some(object) if object.values().len() >= class.fields().len() => object.values().to_vec(),
        Some(object) => {
            return Err(FlakeError::type_mismatch(class.path(), object.class().path()));
        }
        None => {
            return Err(FlakeError::InvalidSource {
                reason: format!("destination object {dest} does not exist"),
            });
        }
    };

    let (staged, report) = read(&mut *store, &current[..class.fields().len()]);
    let staged = match staged {
        Ok(staged) => staged,
        Err(err) => {
            for id in report.created.iter().rev() {
                store.destroy(*id);
            }
            return Err(err);
        }
    };

    let mut committed = current;
    for (slot, value) in committed.iter_mut().zip(staged) {
        *slot = value;
    }
    store.replace_values(dest, committed)?;
    Ok(report)
}

/// Reads a payload produced by [`super::encode_struct`] into `dest`.
///
/// Structs own nothing, so the store is only consulted to resolve
/// references.
pub fn decode_struct(
    store: &ObjectStore,
    dest: &mut StructValue,
    data: &[u8],
    options: CodecOptions,
) -> Result<ReadReport, FlakeError> {
    let types = Arc::clone(store.types());
    let desc = Arc::clone(dest.desc());
    let mut reader = ObjectReader::new(Env::Shared(store), types, data, None, options);
    let staged = reader.read_all(desc.fields(), dest.values())?;
    dest.replace_values(staged);
    Ok(reader.report)
}

/// The store a read resolves against. Only an exclusive store can receive
/// newly created sub-objects.
pub(crate) enum Env<'s> {
    Shared(&'s ObjectStore),
    Exclusive(&'s mut ObjectStore),
}

impl Env<'_> {
    pub(crate) fn store(&self) -> &ObjectStore {
        match self {
            Env::Shared(store) => store,
            Env::Exclusive(store) => store,
        }
    }

    pub(crate) fn store_mut(&mut self) -> Option<&mut ObjectStore> {
        match self {
            Env::Shared(_) => None,
            Env::Exclusive(store) => Some(store),
        }
    }
}

struct ObjectReader<'a, 's> {
    input: Reader<'a>,
    env: Env<'s>,
    types: Arc<TypeRegistry>,
    owners: Vec<ObjectId>,
    field_path: Vec<String>,
    options: CodecOptions,
    struct_depth: usize,
    report: ReadReport,
}

impl<'a, 's> ObjectReader<'a, 's> {
    fn new(
        env: Env<'s>,
        types: Arc<TypeRegistry>,
        data: &'a [u8],
        owner: Option<ObjectId>,
        options: CodecOptions,
    ) -> Self {
        Self {
            input: Reader::new(data),
            env,
            types,
            owners: owner.into_iter().collect(),
            field_path: Vec::new(),
            options,
            struct_depth: 0,
            report: ReadReport::default(),
        }
    }

    fn read_all(&mut self, fields: &[FieldDesc], current: &[Value]) -> Result<Vec<Value>, FlakeError> {
        let values = self.read_fields(fields, current)?;
        if !self.input.is_empty() {
            return Err(DecodeError::TrailingBytes {
                remaining: self.input.remaining_len(),
            }
            .into());
        }
        Ok(values)
    }

    fn read_fields(&mut self, fields: &[FieldDesc], current: &[Value]) -> Result<Vec<Value>, FlakeError> {
        let mut values = Vec::with_capacity(fields.len());
        for (field, current) in fields.iter().zip(current) {
            self.field_path.push(field.name().to_string());
            let value = self.read_value(field.kind(), current)?;
            self.field_path.pop();
            values.push(value);
        }
        Ok(values)
    }

    fn read_value(&mut self, kind: &FieldKind, current: &Value) -> Result<Value, FlakeError> {
        let value = match kind {
            FieldKind::Bool => Value::Bool(self.input.read_bool("bool")?),
            FieldKind::U8 => Value::U8(self.input.read_byte("u8")?),
            FieldKind::I32 => {
                let v = self.input.read_signed_varint("i32")?;
                Value::I32(i32::try_from(v).map_err(|_| DecodeError::VarintOverflow)?)
            }
            FieldKind::I64 => Value::I64(self.input.read_signed_varint("i64")?),
            FieldKind::U32 => {
                let v = self.input.read_varint("u32")?;
                Value::U32(u32::try_from(v).map_err(|_| DecodeError::VarintOverflow)?)
            }
            FieldKind::U64 => Value::U64(self.input.read_varint("u64")?),
            FieldKind::F32 => Value::F32(self.input.read_f32("f32")?),
            FieldKind::F64 => Value::F64(self.input.read_f64("f64")?),
            FieldKind::Str => Value::Str(self.input.read_string(MAX_STRING_LEN, "string")?),
            FieldKind::Bytes => Value::Bytes(self.input.read_bytes_prefixed(MAX_BYTES_LEN, "bytes")?),
            FieldKind::Guid => Value::Guid(self.input.read_guid("guid")?),
            FieldKind::Vec2 => Value::Vec2(Vec2::new(self.input.read_f64("vec2")?, self.input.read_f64("vec2")?)),
            FieldKind::Vec3 => Value::Vec3(self.read_vec3()?),
            FieldKind::Quat => Value::Quat(self.read_quat()?),
            FieldKind::Transform => Value::Transform(Transform {
                translation: self.read_vec3()?,
                rotation: self.read_quat()?,
                scale: self.read_vec3()?,
            }),
            FieldKind::Struct(path) => self.read_struct(path, current)?,
            FieldKind::Array(element) => {
                let len = self.input.read_len(MAX_ARRAY_LEN, "array length")?;
                let existing = match current {
                    Value::Array(items) => items.as_slice(),
                    _ => &[],
                };
                let mut items = Vec::with_capacity(len.min(self.input.remaining_len()));
                for i in 0..len {
                    let item = match existing.get(i) {
                        Some(item) => self.read_value(element, item)?,
                        None => {
                            let default = self.types.default_value(element)?;
                            self.read_value(element, &default)?
                        }
                    };
                    items.push(item);
                }
                Value::Array(items)
            }
            FieldKind::Object(base) => self.read_object(base, current)?,
            FieldKind::WeakObject => match self.read_marker()? {
                ObjectMarker::Null => Value::WeakObject(None),
                ObjectMarker::Reference => {
                    let path = self.input.read_string(MAX_STRING_LEN, "object path")?;
                    match self.env.store().resolve_path(&path) {
                        Some(id) => Value::WeakObject(Some(id)),
                        None => self.unresolved(path, current),
                    }
                }
                ObjectMarker::Owned => return Err(self.invalid_marker(ObjectMarker::Owned)),
            },
            FieldKind::SoftObject => match self.read_marker()? {
                ObjectMarker::Null => Value::SoftObject(SoftObjectPath::null()),
                ObjectMarker::Reference => {
                    Value::SoftObject(SoftObjectPath::new(self.input.read_string(MAX_STRING_LEN, "soft path")?))
                }
                ObjectMarker::Owned => return Err(self.invalid_marker(ObjectMarker::Owned)),
            },
        };
        Ok(value)
    }

    fn read_vec3(&mut self) -> Result<Vec3, DecodeError> {
        Ok(Vec3::new(
            self.input.read_f64("vec3")?,
            self.input.read_f64("vec3")?,
            self.input.read_f64("vec3")?,
        ))
    }

    fn read_quat(&mut self) -> Result<Quat, DecodeError> {
        Ok(Quat::new(
            self.input.read_f64("quat")?,
            self.input.read_f64("quat")?,
            self.input.read_f64("quat")?,
            self.input.read_f64("quat")?,
        ))
    }

    fn read_struct(&mut self, path: &TypePath, current: &Value) -> Result<Value, FlakeError> {
        let desc = self
            .types
            .struct_desc(path.as_str())
            .cloned()
            .ok_or_else(|| DecodeError::UnknownStruct {
                path: path.to_string(),
            })?;

        self.struct_depth += 1;
        if self.struct_depth > MAX_DEPTH {
            return Err(DecodeError::DepthExceeded { max: MAX_DEPTH }.into());
        }
        let mut value = match current {
            Value::Struct(existing) if existing.type_path() == path => existing.clone(),
            _ => StructValue::new(Arc::clone(&desc)),
        };
        let values = self.read_fields(desc.fields(), value.values())?;
        value.replace_values(values);
        self.struct_depth -= 1;
        Ok(Value::Struct(value))
    }

    fn read_object(&mut self, base: &TypePath, current: &Value) -> Result<Value, FlakeError> {
        match self.read_marker()? {
            ObjectMarker::Null => Ok(Value::Object(None)),
            ObjectMarker::Reference => {
                let path = self.input.read_string(MAX_STRING_LEN, "object path")?;
                let store = self.env.store();
                let Some(id) = store.resolve_path(&path) else {
                    return Ok(self.unresolved(path, current));
                };
                let class = match store.get(id) {
                    Some(object) if object.class().is_child_of(base.as_str()) => return Ok(Value::Object(Some(id))),
                    Some(object) => object.class().path().to_string(),
                    None => return Ok(self.unresolved(path, current)),
                };
                self.record(Diagnostic::IncompatibleClass {
                    field: self.field_name(),
                    expected: base.to_string(),
                    found: class,
                });
                Ok(current.clone())
            }
            ObjectMarker::Owned => self.read_owned(base, current),
        }
    }

    fn read_owned(&mut self, base: &TypePath, current: &Value) -> Result<Value, FlakeError> {
        let class_path = self.input.read_string(MAX_STRING_LEN, "class path")?;
        let block_len = if self.options.skippable_objects {
            Some(self.input.read_len(MAX_PAYLOAD_SIZE, "object block")?)
        } else {
            None
        };

        let class = match self.types.class(&class_path) {
            Some(class) if class.is_child_of(base.as_str()) => Arc::clone(class),
            found => {
                let field = self.field_name();
                let Some(len) = block_len else {
                    return Err(DecodeError::UnresolvedOwnedClass {
                        field,
                        path: class_path,
                    }
                    .into());
                };
                self.input.skip(len, "object block")?;
                let diagnostic = match found {
                    None => Diagnostic::TypeNotFound {
                        field,
                        path: class_path,
                    },
                    Some(_) => Diagnostic::IncompatibleClass {
                        field,
                        expected: base.to_string(),
                        found: class_path,
                    },
                };
                self.record(diagnostic);
                return Ok(current.clone());
            }
        };

        if self.owners.len() > MAX_DEPTH {
            return Err(DecodeError::DepthExceeded { max: MAX_DEPTH }.into());
        }
        let block = match block_len {
            Some(len) => Some(self.input.read_bytes(len, "object block")?),
            None => None,
        };
        let Some(owner) = self.owners.last().copied() else {
            return Err(self.missing_owner());
        };
        let id = match self.env.store_mut() {
            Some(store) => store.instantiate(&class, Some(owner))?,
            None => return Err(self.missing_owner()),
        };
        self.report.created.push(id);

        let defaults: Vec<Value> = class.fields().iter().map(|f| f.default().clone()).collect();
        self.owners.push(id);
        let values = match block {
            Some(block) => {
                let outer = std::mem::replace(&mut self.input, Reader::new(block));
                let values = self.read_fields(class.fields(), &defaults);
                let inner = std::mem::replace(&mut self.input, outer);
                let values = values?;
                if !inner.is_empty() {
                    return Err(DecodeError::BlockLengthMismatch {
                        field: self.field_name(),
                        declared: block.len(),
                        consumed: inner.position(),
                    }
                    .into());
                }
                values
            }
            None => self.read_fields(class.fields(), &defaults)?,
        };
        self.owners.pop();

        if let Some(store) = self.env.store_mut() {
            store.replace_values(id, values)?;
        }
        Ok(Value::Object(Some(id)))
    }

    fn read_marker(&mut self) -> Result<ObjectMarker, FlakeError> {
        let marker = self.input.read_byte("object marker")?;
        ObjectMarker::from_u8(marker).ok_or_else(|| {
            DecodeError::InvalidMarker {
                field: self.field_name(),
                marker,
            }
            .into()
        })
    }

    fn missing_owner(&self) -> FlakeError {
        DecodeError::MissingOwner {
            field: self.field_name(),
        }
        .into()
    }

    fn invalid_marker(&self, marker: ObjectMarker) -> FlakeError {
        DecodeError::InvalidMarker {
            field: self.field_name(),
            marker: marker as u8,
        }
        .into()
    }

    fn unresolved(&mut self, path: String, current: &Value) -> Value {
        self.record(Diagnostic::UnresolvedReference {
            field: self.field_name(),
            path,
        });
        current.clone()
    }

    fn record(&mut self, diagnostic: Diagnostic) {
        warn!(%diagnostic, "field kept its current value");
        self.report.diagnostics.push(diagnostic);
    }

    fn field_name(&self) -> String {
        self.field_path.join(".")
    }
}
