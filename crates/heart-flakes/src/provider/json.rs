//! Human-readable provider.
//!
//! A payload is one JSON object keyed by field name. Owned sub-objects are
//! nested objects tagged with their class under [`CLASS_NAME_KEY`]; every
//! other object reference is its path string, and null stays null. Fields
//! missing from the document keep their current value and unknown keys are
//! ignored, so payloads survive fields being added or removed.
//!
//! ```text
//! {"Child": {"_ClassName": "/Script/Heart.NodeChild", "Value": 42},
//!  "ExternalRef": "/Game/Shared.Asset", "Name": "Node1",
//!  "Position": {"X": 3.0, "Y": 4.0}}
//! ```

use std::sync::Arc;

use serde_json::{Map, Number, Value as JsonValue};
use tracing::warn;
use uuid::Uuid;

use crate::codec::reader::{Env, stage_object_read};
use crate::codec::writer::{check_len, is_owned_by_top};
use crate::codec::{Diagnostic, ReadReport};
use crate::error::{DecodeError, EncodeError, FlakeError};
use crate::limits::{MAX_ARRAY_LEN, MAX_BYTES_LEN, MAX_JSON_NESTING, MAX_STRING_LEN};
use crate::object::{ObjectId, ObjectStore};
use crate::provider::SerializationProvider;
use crate::reflect::{
    ClassDesc, FieldDesc, FieldKind, Quat, SoftObjectPath, StructValue, Transform, TypePath, TypeRegistry, Value,
    Vec2, Vec3,
};

/// Key holding the class path of an owned sub-object.
pub const CLASS_NAME_KEY: &str = "_ClassName";

/// JSON payloads, for inspection and hand editing.
///
/// Owned sub-objects whose class no longer resolves are reported and
/// skipped, as with [`super::BinaryProvider`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonProvider;

impl JsonProvider {
    pub const NAME: &'static str = "JSON";

    /// Re-indents a raw payload produced by this provider.
    pub fn to_pretty_string(data: &[u8]) -> Result<String, DecodeError> {
        let document = JsonValue::Object(parse(data)?);
        serde_json::to_string_pretty(&document).map_err(|err| DecodeError::InvalidJson(err.to_string()))
    }
}

impl SerializationProvider for JsonProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn serialize_struct(&self, store: &ObjectStore, value: &StructValue) -> Result<Vec<u8>, EncodeError> {
        let mut writer = JsonWriter::new(store, None);
        let document = writer.write_fields(value.desc().fields(), value.values())?;
        to_bytes(document)
    }

    fn serialize_object(&self, store: &ObjectStore, object: ObjectId) -> Result<Vec<u8>, EncodeError> {
        let Some(source) = store.get(object) else {
            return Ok(Vec::new());
        };
        let mut writer = JsonWriter::new(store, Some(object));
        let document = writer.write_fields(source.class().fields(), source.values())?;
        to_bytes(document)
    }

    fn deserialize_struct(
        &self,
        store: &ObjectStore,
        dest: &mut StructValue,
        data: &[u8],
    ) -> Result<ReadReport, FlakeError> {
        let document = parse(data)?;
        let desc = Arc::clone(dest.desc());
        let mut reader = JsonReader::new(Env::Shared(store), Arc::clone(store.types()), None);
        let staged = reader.read_fields(desc.fields(), dest.values(), &document)?;
        dest.replace_values(staged);
        Ok(reader.report)
    }

    fn deserialize_object(
        &self,
        store: &mut ObjectStore,
        dest: ObjectId,
        class: &ClassDesc,
        data: &[u8],
    ) -> Result<ReadReport, FlakeError> {
        let document = parse(data)?;
        let types = Arc::clone(store.types());
        stage_object_read(store, dest, class, |store, current| {
            let mut reader = JsonReader::new(Env::Exclusive(store), types, Some(dest));
            let staged = reader.read_fields(class.fields(), current, &document);
            (staged, reader.report)
        })
    }
}

fn to_bytes(document: Map<String, JsonValue>) -> Result<Vec<u8>, EncodeError> {
    serde_json::to_vec(&JsonValue::Object(document)).map_err(|err| EncodeError::Json(err.to_string()))
}

fn parse(data: &[u8]) -> Result<Map<String, JsonValue>, DecodeError> {
    // An object with no fields has an empty payload.
    if data.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_slice(data) {
        Ok(JsonValue::Object(document)) => Ok(document),
        Ok(_) => Err(DecodeError::UnexpectedJson {
            field: "payload".to_string(),
            expected: "object",
        }),
        Err(err) => Err(DecodeError::InvalidJson(err.to_string())),
    }
}

struct JsonWriter<'s> {
    store: &'s ObjectStore,
    owners: Vec<ObjectId>,
    nesting: usize,
}

impl<'s> JsonWriter<'s> {
    fn new(store: &'s ObjectStore, owner: Option<ObjectId>) -> Self {
        Self {
            store,
            owners: owner.into_iter().collect(),
            nesting: 0,
        }
    }

    fn enter(&mut self) -> Result<(), EncodeError> {
        self.nesting += 1;
        if self.nesting > MAX_JSON_NESTING {
            return Err(EncodeError::DepthExceeded { max: MAX_JSON_NESTING });
        }
        Ok(())
    }

    fn write_fields(&mut self, fields: &[FieldDesc], values: &[Value]) -> Result<Map<String, JsonValue>, EncodeError> {
        self.enter()?;
        let mut document = Map::new();
        for (field, value) in fields.iter().zip(values) {
            let json = self.write_value(field.name(), field.kind(), value)?;
            document.insert(field.name().to_string(), json);
        }
        self.nesting -= 1;
        Ok(document)
    }

    fn write_value(&mut self, field: &str, kind: &FieldKind, value: &Value) -> Result<JsonValue, EncodeError> {
        let json = match (kind, value) {
            (FieldKind::Bool, Value::Bool(v)) => JsonValue::Bool(*v),
            (FieldKind::U8, Value::U8(v)) => JsonValue::from(*v),
            (FieldKind::I32, Value::I32(v)) => JsonValue::from(*v),
            (FieldKind::I64, Value::I64(v)) => JsonValue::from(*v),
            (FieldKind::U32, Value::U32(v)) => JsonValue::from(*v),
            (FieldKind::U64, Value::U64(v)) => JsonValue::from(*v),
            (FieldKind::F32, Value::F32(v)) => number(field, f64::from(*v))?,
            (FieldKind::F64, Value::F64(v)) => number(field, *v)?,
            (FieldKind::Str, Value::Str(v)) => {
                check_len(field, v.len(), MAX_STRING_LEN)?;
                JsonValue::String(v.clone())
            }
            (FieldKind::Bytes, Value::Bytes(v)) => {
                check_len(field, v.len(), MAX_BYTES_LEN)?;
                self.enter()?;
                let bytes = v.iter().copied().map(JsonValue::from).collect();
                self.nesting -= 1;
                JsonValue::Array(bytes)
            }
            (FieldKind::Guid, Value::Guid(v)) => JsonValue::String(v.to_string()),
            (FieldKind::Vec2, Value::Vec2(v)) => self.components(field, &[("X", v.x), ("Y", v.y)])?,
            (FieldKind::Vec3, Value::Vec3(v)) => self.vec3(field, v)?,
            (FieldKind::Quat, Value::Quat(q)) => self.quat(field, q)?,
            (FieldKind::Transform, Value::Transform(t)) => {
                self.enter()?;
                let mut document = Map::new();
                document.insert("Translation".to_string(), self.vec3(field, &t.translation)?);
                document.insert("Rotation".to_string(), self.quat(field, &t.rotation)?);
                document.insert("Scale".to_string(), self.vec3(field, &t.scale)?);
                self.nesting -= 1;
                JsonValue::Object(document)
            }
            (FieldKind::Struct(path), Value::Struct(inner)) if inner.type_path() == path => {
                JsonValue::Object(self.write_fields(inner.desc().fields(), inner.values())?)
            }
            (FieldKind::Array(element), Value::Array(items)) => {
                check_len(field, items.len(), MAX_ARRAY_LEN)?;
                self.enter()?;
                let mut array = Vec::with_capacity(items.len());
                for item in items {
                    array.push(self.write_value(field, element, item)?);
                }
                self.nesting -= 1;
                JsonValue::Array(array)
            }
            (FieldKind::Object(_), Value::Object(target)) => self.write_object_ref(field, *target)?,
            (FieldKind::WeakObject, Value::WeakObject(target)) => {
                match target.and_then(|id| self.store.path_of(id)) {
                    Some(path) => JsonValue::String(path.to_string()),
                    None => JsonValue::Null,
                }
            }
            (FieldKind::SoftObject, Value::SoftObject(path)) if path.is_null() => JsonValue::Null,
            (FieldKind::SoftObject, Value::SoftObject(path)) => JsonValue::String(path.as_str().to_string()),
            _ => {
                return Err(EncodeError::KindMismatch {
                    field: field.to_string(),
                    expected: kind.to_string(),
                });
            }
        };
        Ok(json)
    }

    fn write_object_ref(&mut self, field: &str, target: Option<ObjectId>) -> Result<JsonValue, EncodeError> {
        let Some(object) = target.and_then(|id| self.store.get(id)) else {
            return Ok(JsonValue::Null);
        };
        if !is_owned_by_top(&self.owners, object) {
            return Ok(JsonValue::String(object.path().to_string()));
        }

        self.owners.push(object.id());
        let mut document = self.write_fields(object.class().fields(), object.values())?;
        self.owners.pop();
        let class_path = object.class().path().as_str();
        check_len(field, class_path.len(), MAX_STRING_LEN)?;
        document.insert(CLASS_NAME_KEY.to_string(), JsonValue::String(class_path.to_string()));
        Ok(JsonValue::Object(document))
    }

    fn vec3(&mut self, field: &str, v: &Vec3) -> Result<JsonValue, EncodeError> {
        self.components(field, &[("X", v.x), ("Y", v.y), ("Z", v.z)])
    }

    fn quat(&mut self, field: &str, q: &Quat) -> Result<JsonValue, EncodeError> {
        self.components(field, &[("X", q.x), ("Y", q.y), ("Z", q.z), ("W", q.w)])
    }

    fn components(&mut self, field: &str, components: &[(&str, f64)]) -> Result<JsonValue, EncodeError> {
        self.enter()?;
        let mut document = Map::new();
        for (key, v) in components {
            document.insert((*key).to_string(), number(field, *v)?);
        }
        self.nesting -= 1;
        Ok(JsonValue::Object(document))
    }
}

fn number(field: &str, v: f64) -> Result<JsonValue, EncodeError> {
    Number::from_f64(v)
        .map(JsonValue::Number)
        .ok_or_else(|| EncodeError::NonFiniteFloat {
            field: field.to_string(),
        })
}

struct JsonReader<'s> {
    env: Env<'s>,
    types: Arc<TypeRegistry>,
    owners: Vec<ObjectId>,
    field_path: Vec<String>,
    report: ReadReport,
}

impl<'s> JsonReader<'s> {
    fn new(env: Env<'s>, types: Arc<TypeRegistry>, owner: Option<ObjectId>) -> Self {
        Self {
            env,
            types,
            owners: owner.into_iter().collect(),
            field_path: Vec::new(),
            report: ReadReport::default(),
        }
    }

    fn read_fields(
        &mut self,
        fields: &[FieldDesc],
        current: &[Value],
        document: &Map<String, JsonValue>,
    ) -> Result<Vec<Value>, FlakeError> {
        let mut values = Vec::with_capacity(fields.len());
        for (field, current) in fields.iter().zip(current) {
            let value = match document.get(field.name()) {
                Some(json) => {
                    self.field_path.push(field.name().to_string());
                    let value = self.read_value(field.kind(), current, json)?;
                    self.field_path.pop();
                    value
                }
                None => current.clone(),
            };
            values.push(value);
        }
        Ok(values)
    }

    fn read_value(&mut self, kind: &FieldKind, current: &Value, json: &JsonValue) -> Result<Value, FlakeError> {
        let value = match kind {
            FieldKind::Bool => Value::Bool(json.as_bool().ok_or_else(|| self.unexpected("bool"))?),
            FieldKind::U8 => Value::U8(self.unsigned(json, "u8")?),
            FieldKind::I32 => Value::I32(self.signed(json, "i32")?),
            FieldKind::I64 => Value::I64(self.signed(json, "i64")?),
            FieldKind::U32 => Value::U32(self.unsigned(json, "u32")?),
            FieldKind::U64 => Value::U64(self.unsigned(json, "u64")?),
            FieldKind::F32 => Value::F32(self.float(json, "f32")? as f32),
            FieldKind::F64 => Value::F64(self.float(json, "f64")?),
            FieldKind::Str => {
                let s = json.as_str().ok_or_else(|| self.unexpected("string"))?;
                check_decoded_len("string", s.len(), MAX_STRING_LEN)?;
                Value::Str(s.to_string())
            }
            FieldKind::Bytes => {
                let items = json.as_array().ok_or_else(|| self.unexpected("byte array"))?;
                check_decoded_len("bytes", items.len(), MAX_BYTES_LEN)?;
                let bytes = items
                    .iter()
                    .map(|item| self.unsigned(item, "byte"))
                    .collect::<Result<Vec<u8>, _>>()?;
                Value::Bytes(bytes)
            }
            FieldKind::Guid => {
                let s = json.as_str().ok_or_else(|| self.unexpected("guid"))?;
                Value::Guid(Uuid::parse_str(s).map_err(|_| self.unexpected("guid"))?)
            }
            FieldKind::Vec2 => {
                let document = self.document(json, "vec2")?;
                Value::Vec2(Vec2::new(
                    self.component(document, "X", "vec2")?,
                    self.component(document, "Y", "vec2")?,
                ))
            }
            FieldKind::Vec3 => Value::Vec3(self.read_vec3(json)?),
            FieldKind::Quat => Value::Quat(self.read_quat(json)?),
            FieldKind::Transform => {
                let document = self.document(json, "transform")?;
                Value::Transform(Transform {
                    translation: self.read_vec3(self.member(document, "Translation", "transform")?)?,
                    rotation: self.read_quat(self.member(document, "Rotation", "transform")?)?,
                    scale: self.read_vec3(self.member(document, "Scale", "transform")?)?,
                })
            }
            FieldKind::Struct(path) => self.read_struct(path, current, json)?,
            FieldKind::Array(element) => {
                let items = json.as_array().ok_or_else(|| self.unexpected("array"))?;
                check_decoded_len("array length", items.len(), MAX_ARRAY_LEN)?;
                let existing = match current {
                    Value::Array(items) => items.as_slice(),
                    _ => &[],
                };
                let mut values = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let value = match existing.get(i) {
                        Some(current) => self.read_value(element, current, item)?,
                        None => {
                            let default = self.types.default_value(element)?;
                            self.read_value(element, &default, item)?
                        }
                    };
                    values.push(value);
                }
                Value::Array(values)
            }
            FieldKind::Object(base) => match json {
                JsonValue::Null => Value::Object(None),
                JsonValue::String(path) => self.resolve_object(base, path, current),
                JsonValue::Object(document) => self.read_owned(base, document, current)?,
                _ => return Err(self.unexpected("object, path or null").into()),
            },
            FieldKind::WeakObject => match json {
                JsonValue::Null => Value::WeakObject(None),
                JsonValue::String(path) => match self.env.store().resolve_path(path) {
                    Some(id) => Value::WeakObject(Some(id)),
                    None => self.unresolved(path, current),
                },
                _ => return Err(self.unexpected("path or null").into()),
            },
            FieldKind::SoftObject => match json {
                JsonValue::Null => Value::SoftObject(SoftObjectPath::null()),
                JsonValue::String(path) => Value::SoftObject(SoftObjectPath::new(path.as_str())),
                _ => return Err(self.unexpected("path or null").into()),
            },
        };
        Ok(value)
    }

    fn read_struct(&mut self, path: &TypePath, current: &Value, json: &JsonValue) -> Result<Value, FlakeError> {
        let desc = self
            .types
            .struct_desc(path.as_str())
            .cloned()
            .ok_or_else(|| DecodeError::UnknownStruct {
                path: path.to_string(),
            })?;
        let document = self.document(json, "struct")?;

        let mut value = match current {
            Value::Struct(existing) if existing.type_path() == path => existing.clone(),
            _ => StructValue::new(Arc::clone(&desc)),
        };
        let values = self.read_fields(desc.fields(), value.values(), document)?;
        value.replace_values(values);
        Ok(Value::Struct(value))
    }

    fn resolve_object(&mut self, base: &TypePath, path: &str, current: &Value) -> Value {
        let store = self.env.store();
        let Some(id) = store.resolve_path(path) else {
            return self.unresolved(path, current);
        };
        let found = match store.get(id) {
            Some(object) if object.class().is_child_of(base.as_str()) => return Value::Object(Some(id)),
            Some(object) => object.class().path().to_string(),
            None => return self.unresolved(path, current),
        };
        self.record(Diagnostic::IncompatibleClass {
            field: self.field_name(),
            expected: base.to_string(),
            found,
        });
        current.clone()
    }

    fn read_owned(
        &mut self,
        base: &TypePath,
        document: &Map<String, JsonValue>,
        current: &Value,
    ) -> Result<Value, FlakeError> {
        let class_path = document
            .get(CLASS_NAME_KEY)
            .and_then(JsonValue::as_str)
            .ok_or_else(|| self.unexpected("_ClassName"))?;

        let types = Arc::clone(&self.types);
        let class = match types.class(class_path) {
            Some(class) if class.is_child_of(base.as_str()) => Arc::clone(class),
            found => {
                let field = self.field_name();
                let diagnostic = match found {
                    None => Diagnostic::TypeNotFound {
                        field,
                        path: class_path.to_string(),
                    },
                    Some(_) => Diagnostic::IncompatibleClass {
                        field,
                        expected: base.to_string(),
                        found: class_path.to_string(),
                    },
                };
                self.record(diagnostic);
                return Ok(current.clone());
            }
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
        let values = self.read_fields(class.fields(), &defaults, document)?;
        self.owners.pop();

        if let Some(store) = self.env.store_mut() {
            store.replace_values(id, values)?;
        }
        Ok(Value::Object(Some(id)))
    }

    fn read_vec3(&self, json: &JsonValue) -> Result<Vec3, DecodeError> {
        let document = self.document(json, "vec3")?;
        Ok(Vec3::new(
            self.component(document, "X", "vec3")?,
            self.component(document, "Y", "vec3")?,
            self.component(document, "Z", "vec3")?,
        ))
    }

    fn read_quat(&self, json: &JsonValue) -> Result<Quat, DecodeError> {
        let document = self.document(json, "quat")?;
        Ok(Quat::new(
            self.component(document, "X", "quat")?,
            self.component(document, "Y", "quat")?,
            self.component(document, "Z", "quat")?,
            self.component(document, "W", "quat")?,
        ))
    }

    fn document<'j>(&self, json: &'j JsonValue, expected: &'static str) -> Result<&'j Map<String, JsonValue>, DecodeError> {
        json.as_object().ok_or_else(|| self.unexpected(expected))
    }

    fn member<'j>(
        &self,
        document: &'j Map<String, JsonValue>,
        key: &str,
        expected: &'static str,
    ) -> Result<&'j JsonValue, DecodeError> {
        document.get(key).ok_or_else(|| self.unexpected(expected))
    }

    fn component(&self, document: &Map<String, JsonValue>, key: &str, expected: &'static str) -> Result<f64, DecodeError> {
        self.float(self.member(document, key, expected)?, expected)
    }

    fn float(&self, json: &JsonValue, expected: &'static str) -> Result<f64, DecodeError> {
        json.as_f64().ok_or_else(|| self.unexpected(expected))
    }

    fn signed<T: TryFrom<i64>>(&self, json: &JsonValue, expected: &'static str) -> Result<T, DecodeError> {
        json.as_i64()
            .and_then(|v| T::try_from(v).ok())
            .ok_or_else(|| self.unexpected(expected))
    }

    fn unsigned<T: TryFrom<u64>>(&self, json: &JsonValue, expected: &'static str) -> Result<T, DecodeError> {
        json.as_u64()
            .and_then(|v| T::try_from(v).ok())
            .ok_or_else(|| self.unexpected(expected))
    }

    fn unexpected(&self, expected: &'static str) -> DecodeError {
        DecodeError::UnexpectedJson {
            field: self.field_name(),
            expected,
        }
    }

    fn missing_owner(&self) -> FlakeError {
        DecodeError::MissingOwner {
            field: self.field_name(),
        }
        .into()
    }

    fn unresolved(&mut self, path: &str, current: &Value) -> Value {
        self.record(Diagnostic::UnresolvedReference {
            field: self.field_name(),
            path: path.to_string(),
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

fn check_decoded_len(field: &'static str, len: usize, max: usize) -> Result<(), DecodeError> {
    if len > max {
        return Err(DecodeError::LengthExceedsLimit { field, len, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::reflect::{ClassBuilder, OBJECT_CLASS, StructBuilder};

    const NODE: &str = "/Script/Test.Node";
    const LEAF: &str = "/Script/Test.Leaf";
    const POSE: &str = "/Script/Test.Pose";

    fn types() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        types
            .register_struct(
                StructBuilder::new(POSE)
                    .field("Place", FieldKind::Transform)
                    .field("Id", FieldKind::Guid)
                    .field("Raw", FieldKind::Bytes),
            )
            .unwrap();
        types
            .register_class(
                ClassBuilder::new(LEAF)
                    .field("Value", FieldKind::I64)
                    .field("Next", FieldKind::object(LEAF)),
            )
            .unwrap();
        types
            .register_class(
                ClassBuilder::new(NODE)
                    .field("Name", FieldKind::Str)
                    .field("Scale", FieldKind::F32)
                    .field("Pose", FieldKind::structure(POSE))
                    .field("Child", FieldKind::object(LEAF))
                    .field("Peers", FieldKind::array(FieldKind::object(OBJECT_CLASS)))
                    .field("Soft", FieldKind::SoftObject),
            )
            .unwrap();
        types
    }

    fn class(store: &ObjectStore, path: &str) -> Arc<ClassDesc> {
        store.types().class(path).cloned().unwrap()
    }

    fn graph(store: &mut ObjectStore) -> (ObjectId, ObjectId, ObjectId) {
        let shared = store.new_object(LEAF, None, Some("/Game/Shared")).unwrap();
        let root = store.new_object(NODE, None, Some("/Game/Root")).unwrap();
        let child = store.new_object(LEAF, Some(root), Some("Child")).unwrap();
        store.set_field(child, "Value", 42i64).unwrap();
        store.set_field(child, "Next", Value::Object(Some(shared))).unwrap();
        store.set_field(root, "Name", "Node1").unwrap();
        store.set_field(root, "Scale", Value::F32(1.5)).unwrap();
        store.set_field(root, "Child", Value::Object(Some(child))).unwrap();
        store
            .set_field(root, "Peers", Value::Array(vec![Value::Object(Some(shared)), Value::Object(None)]))
            .unwrap();
        let pose = store
            .types()
            .new_struct(POSE)
            .unwrap()
            .with("Place", Value::Transform(Transform::from_translation(Vec3::new(1.0, -2.0, 0.5))))
            .unwrap()
            .with("Id", Uuid::new_v4())
            .unwrap()
            .with("Raw", Value::Bytes(vec![0, 7, 255]))
            .unwrap();
        store.set_field(root, "Pose", pose).unwrap();
        store
            .set_field(root, "Soft", Value::SoftObject(SoftObjectPath::new("/Game/Missing.Asset")))
            .unwrap();
        (root, child, shared)
    }

    #[test]
    fn test_owned_objects_are_nested_and_references_are_paths() {
        let mut store = ObjectStore::new(Arc::new(types()));
        let (root, _, _) = graph(&mut store);
        let bytes = JsonProvider.serialize_object(&store, root).unwrap();
        let document: JsonValue = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(document["Name"], "Node1");
        assert_eq!(document["Child"][CLASS_NAME_KEY], LEAF);
        assert_eq!(document["Child"]["Value"], 42);
        assert_eq!(document["Child"]["Next"], "/Game/Shared");
        assert_eq!(document["Peers"], serde_json::json!(["/Game/Shared", null]));
        assert_eq!(document["Pose"]["Place"]["Translation"]["Y"], -2.0);
        assert_eq!(document["Soft"], "/Game/Missing.Asset");
    }

    #[test]
    fn test_object_roundtrip() {
        let mut store = ObjectStore::new(Arc::new(types()));
        let (root, child, shared) = graph(&mut store);
        let bytes = JsonProvider.serialize_object(&store, root).unwrap();

        let node = class(&store, NODE);
        let copy = store.instantiate(&node, None).unwrap();
        let report = JsonProvider.deserialize_object(&mut store, copy, &node, &bytes).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.created.len(), 1);

        for field in ["Name", "Scale", "Pose", "Peers", "Soft"] {
            assert_eq!(store.get_field(copy, field).unwrap(), store.get_field(root, field).unwrap(), "{field}");
        }
        let new_child = store.get_field(copy, "Child").unwrap().as_object().unwrap();
        assert_ne!(new_child, child);
        assert_eq!(store.outer(new_child), Some(copy));
        assert_eq!(store.get_field(new_child, "Value").unwrap(), &Value::I64(42));
        assert_eq!(store.get_field(new_child, "Next").unwrap(), &Value::Object(Some(shared)));
    }

    #[test]
    fn test_missing_fields_keep_current_values() {
        let mut store = ObjectStore::new(Arc::new(types()));
        let node = class(&store, NODE);
        let dest = store.instantiate(&node, None).unwrap();
        store.set_field(dest, "Name", "before").unwrap();

        let payload = br#"{"Scale": 2, "Unknown": true}"#;
        let report = JsonProvider.deserialize_object(&mut store, dest, &node, payload).unwrap();
        assert!(report.is_clean());
        assert_eq!(store.get_field(dest, "Name").unwrap().as_str(), Some("before"));
        assert_eq!(store.get_field(dest, "Scale").unwrap(), &Value::F32(2.0));
    }

    #[test]
    fn test_unknown_owned_class_is_reported() {
        let mut store = ObjectStore::new(Arc::new(types()));
        let node = class(&store, NODE);
        let dest = store.instantiate(&node, None).unwrap();

        let payload = br#"{"Name": "kept", "Child": {"_ClassName": "/Script/Test.Gone", "Value": 1}}"#;
        let report = JsonProvider.deserialize_object(&mut store, dest, &node, payload).unwrap();
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::TypeNotFound {
                field: "Child".to_string(),
                path: "/Script/Test.Gone".to_string(),
            }]
        );
        assert_eq!(store.get_field(dest, "Child").unwrap(), &Value::Object(None));
        assert_eq!(store.get_field(dest, "Name").unwrap().as_str(), Some("kept"));
    }

    #[test]
    fn test_malformed_payload_commits_nothing() {
        let mut store = ObjectStore::new(Arc::new(types()));
        let node = class(&store, NODE);
        let dest = store.instantiate(&node, None).unwrap();
        let before = store.len();

        // Child is created before Soft fails.
        let payload = br#"{"Child": {"_ClassName": "/Script/Test.Leaf", "Value": 1}, "Soft": 5}"#;
        let err = JsonProvider.deserialize_object(&mut store, dest, &node, payload).unwrap_err();
        assert!(matches!(
            err,
            FlakeError::CorruptPayload(DecodeError::UnexpectedJson { ref field, expected: "path or null" })
                if field == "Soft"
        ));
        assert_eq!(store.len(), before);
        assert_eq!(store.get_field(dest, "Child").unwrap(), &Value::Object(None));

        let err = JsonProvider.deserialize_object(&mut store, dest, &node, b"{\"Name\":").unwrap_err();
        assert_eq!(err.code(), ErrorCode::CorruptPayload);
        let err = JsonProvider.deserialize_object(&mut store, dest, &node, b"[1, 2]").unwrap_err();
        assert_eq!(err.code(), ErrorCode::CorruptPayload);
    }

    #[test]
    fn test_non_finite_float_rejected() {
        let mut store = ObjectStore::new(Arc::new(types()));
        let root = store.new_object(NODE, None, Some("/Game/Root")).unwrap();
        store.set_field(root, "Scale", Value::F32(f32::NAN)).unwrap();
        assert!(matches!(
            JsonProvider.serialize_object(&store, root),
            Err(EncodeError::NonFiniteFloat { ref field }) if field == "Scale"
        ));
    }

    #[test]
    fn test_nesting_stays_parseable() {
        fn chain(store: &mut ObjectStore, name: &str, depth: usize) -> ObjectId {
            let root = store.new_object(LEAF, None, Some(name)).unwrap();
            let mut outer = root;
            for _ in 0..depth {
                let next = store.new_object(LEAF, Some(outer), None).unwrap();
                store.set_field(outer, "Next", Value::Object(Some(next))).unwrap();
                outer = next;
            }
            root
        }

        // The root document is one level, each owned link one more.
        let mut store = ObjectStore::new(Arc::new(types()));
        let root = chain(&mut store, "/Game/Shallow", MAX_JSON_NESTING - 1);
        let bytes = JsonProvider.serialize_object(&store, root).unwrap();
        let leaf = class(&store, LEAF);
        let copy = store.instantiate(&leaf, None).unwrap();
        let report = JsonProvider.deserialize_object(&mut store, copy, &leaf, &bytes).unwrap();
        assert_eq!(report.created.len(), MAX_JSON_NESTING - 1);

        let deep = chain(&mut store, "/Game/Deep", MAX_JSON_NESTING);
        assert_eq!(
            JsonProvider.serialize_object(&store, deep),
            Err(EncodeError::DepthExceeded { max: MAX_JSON_NESTING })
        );
    }

    #[test]
    fn test_struct_roundtrip_and_pretty_print() {
        let store = ObjectStore::new(Arc::new(types()));
        let pose = store
            .types()
            .new_struct(POSE)
            .unwrap()
            .with("Place", Value::Transform(Transform::from_translation(Vec3::new(4.0, 5.0, 6.0))))
            .unwrap();
        let bytes = JsonProvider.serialize_struct(&store, &pose).unwrap();

        let mut out = store.types().new_struct(POSE).unwrap();
        let report = JsonProvider.deserialize_struct(&store, &mut out, &bytes).unwrap();
        assert!(report.is_clean());
        assert_eq!(out, pose);

        let pretty = JsonProvider::to_pretty_string(&bytes).unwrap();
        assert!(pretty.contains("\n  \"Place\": {"));
    }
}
