//! Descriptor tables and the registry that resolves type paths to them.
//!
//! # Example
//!
//! ```rust
//! use heart_flakes::reflect::{ClassBuilder, FieldKind, TypeRegistry};
//!
//! let mut types = TypeRegistry::new();
//! let node = types
//!     .register_class(
//!         ClassBuilder::new("/Script/Heart.Node")
//!             .field("Name", FieldKind::Str)
//!             .field("Position", FieldKind::Vec2),
//!     )
//!     .unwrap();
//!
//! assert_eq!(node.fields().len(), 2);
//! assert!(node.is_child_of(heart_flakes::reflect::OBJECT_CLASS));
//! ```

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{FlakeError, ReflectError};
use crate::object::{ObjectId, ObjectStore};
use crate::reflect::{FieldKind, SoftObjectPath, StructValue, Transform, TypePath, Value};

/// Root of every class hierarchy.
pub const OBJECT_CLASS: &str = "/Script/Core.Object";

/// Root of placeable classes. Descendants are reconstructed through the
/// actor-specific operations only.
pub const ACTOR_CLASS: &str = "/Script/Core.Actor";

/// Post-construction hook run on an object after all of its fields are
/// restored.
pub type ObjectHook = fn(&mut ObjectStore, ObjectId);

/// Post-construction hook run on a struct after all of its fields are
/// restored.
pub type StructHook = fn(&mut StructValue);

/// One field of a class or struct.
#[derive(Debug, Clone)]
pub struct FieldDesc {
    name: String,
    kind: FieldKind,
    default: Value,
}

impl FieldDesc {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Value a freshly instantiated owner holds for this field.
    pub fn default(&self) -> &Value {
        &self.default
    }
}

/// Descriptor of an object class.
#[derive(Debug)]
pub struct ClassDesc {
    path: TypePath,
    parent: Option<TypePath>,
    /// Parent, grandparent, ... up to the root.
    ancestors: Vec<TypePath>,
    fields: Vec<FieldDesc>,
    index: FxHashMap<String, usize>,
    is_actor: bool,
    post_load: Option<ObjectHook>,
}

impl ClassDesc {
    pub fn path(&self) -> &TypePath {
        &self.path
    }

    pub fn parent(&self) -> Option<&TypePath> {
        self.parent.as_ref()
    }

    /// Inherited fields first, then the class's own, in declaration order.
    pub fn fields(&self) -> &[FieldDesc] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDesc> {
        self.field_index(name).map(|i| &self.fields[i])
    }

    /// True if this class is `base` or derives from it.
    pub fn is_child_of(&self, base: &str) -> bool {
        self.path.as_str() == base || self.ancestors.iter().any(|a| a.as_str() == base)
    }

    pub fn is_actor(&self) -> bool {
        self.is_actor
    }

    pub fn post_load(&self) -> Option<ObjectHook> {
        self.post_load
    }
}

/// Descriptor of a struct (a value type without identity).
#[derive(Debug)]
pub struct StructDesc {
    path: TypePath,
    parent: Option<TypePath>,
    ancestors: Vec<TypePath>,
    fields: Vec<FieldDesc>,
    index: FxHashMap<String, usize>,
    post_construct: Option<StructHook>,
}

impl StructDesc {
    pub fn path(&self) -> &TypePath {
        &self.path
    }

    pub fn parent(&self) -> Option<&TypePath> {
        self.parent.as_ref()
    }

    pub fn fields(&self) -> &[FieldDesc] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn is_child_of(&self, base: &str) -> bool {
        self.path.as_str() == base || self.ancestors.iter().any(|a| a.as_str() == base)
    }

    pub fn post_construct(&self) -> Option<StructHook> {
        self.post_construct
    }
}

/// Builder for a [`ClassDesc`]. Classes derive from [`OBJECT_CLASS`] unless
/// told otherwise.
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    path: TypePath,
    parent: Option<TypePath>,
    actor: bool,
    fields: Vec<(String, FieldKind, Option<Value>)>,
    post_load: Option<ObjectHook>,
}

impl ClassBuilder {
    pub fn new(path: impl Into<TypePath>) -> Self {
        Self {
            path: path.into(),
            parent: Some(TypePath::from(OBJECT_CLASS)),
            actor: false,
            fields: Vec::new(),
            post_load: None,
        }
    }

    /// Sets the parent class.
    pub fn parent(mut self, parent: impl Into<TypePath>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Adds a field holding the kind's zero value by default.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push((name.into(), kind, None));
        self
    }

    /// Adds a field with an explicit default.
    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        kind: FieldKind,
        default: impl Into<Value>,
    ) -> Self {
        self.fields.push((name.into(), kind, Some(default.into())));
        self
    }

    /// Sets the post-construction hook. Subclasses inherit it unless they
    /// set their own.
    pub fn post_load(mut self, hook: ObjectHook) -> Self {
        self.post_load = Some(hook);
        self
    }

    fn root(path: &str, parent: Option<&str>, actor: bool) -> Self {
        Self {
            path: TypePath::from(path),
            parent: parent.map(TypePath::from),
            actor,
            fields: Vec::new(),
            post_load: None,
        }
    }
}

/// Builder for a [`StructDesc`].
#[derive(Debug, Clone)]
pub struct StructBuilder {
    path: TypePath,
    parent: Option<TypePath>,
    fields: Vec<(String, FieldKind, Option<Value>)>,
    post_construct: Option<StructHook>,
}

impl StructBuilder {
    pub fn new(path: impl Into<TypePath>) -> Self {
        Self {
            path: path.into(),
            parent: None,
            fields: Vec::new(),
            post_construct: None,
        }
    }

    pub fn parent(mut self, parent: impl Into<TypePath>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push((name.into(), kind, None));
        self
    }

    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        kind: FieldKind,
        default: impl Into<Value>,
    ) -> Self {
        self.fields.push((name.into(), kind, Some(default.into())));
        self
    }

    pub fn post_construct(mut self, hook: StructHook) -> Self {
        self.post_construct = Some(hook);
        self
    }
}

/// Resolves type paths to descriptors.
///
/// Built once during initialization and shared read-only afterwards
/// (usually behind an `Arc`, see [`ObjectStore::new`]).
#[derive(Debug)]
pub struct TypeRegistry {
    classes: FxHashMap<TypePath, Arc<ClassDesc>>,
    structs: FxHashMap<TypePath, Arc<StructDesc>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Creates a registry holding the two root classes.
    pub fn new() -> Self {
        let mut registry = Self {
            classes: FxHashMap::default(),
            structs: FxHashMap::default(),
        };
        // Neither root declares fields, so registration cannot fail.
        for root in [
            ClassBuilder::root(OBJECT_CLASS, None, false),
            ClassBuilder::root(ACTOR_CLASS, Some(OBJECT_CLASS), true),
        ] {
            let _ = registry.register_class(root);
        }
        registry
    }

    /// Registers a class. The parent must already be registered.
    pub fn register_class(&mut self, builder: ClassBuilder) -> Result<Arc<ClassDesc>, ReflectError> {
        if self.classes.contains_key(&builder.path) {
            return Err(ReflectError::DuplicateType { path: builder.path });
        }

        let parent = match &builder.parent {
            Some(parent) => Some(self.classes.get(parent).cloned().ok_or_else(|| {
                ReflectError::UnknownParent {
                    path: builder.path.clone(),
                    parent: parent.clone(),
                }
            })?),
            None => None,
        };

        let inherited = parent.as_ref().map(|p| p.fields.clone()).unwrap_or_default();
        let (fields, index) = self.build_fields(&builder.path, inherited, builder.fields)?;

        let mut ancestors = Vec::new();
        if let Some(parent) = &parent {
            ancestors.push(parent.path.clone());
            ancestors.extend(parent.ancestors.iter().cloned());
        }

        let desc = Arc::new(ClassDesc {
            is_actor: builder.actor || parent.as_ref().is_some_and(|p| p.is_actor),
            post_load: builder.post_load.or(parent.as_ref().and_then(|p| p.post_load)),
            path: builder.path.clone(),
            parent: builder.parent,
            ancestors,
            fields,
            index,
        });
        self.classes.insert(builder.path, Arc::clone(&desc));
        Ok(desc)
    }

    /// Registers a struct. A parent struct, if any, must already be registered.
    pub fn register_struct(&mut self, builder: StructBuilder) -> Result<Arc<StructDesc>, ReflectError> {
        if self.structs.contains_key(&builder.path) {
            return Err(ReflectError::DuplicateType { path: builder.path });
        }

        let parent = match &builder.parent {
            Some(parent) => Some(self.structs.get(parent).cloned().ok_or_else(|| {
                ReflectError::UnknownParent {
                    path: builder.path.clone(),
                    parent: parent.clone(),
                }
            })?),
            None => None,
        };

        let inherited = parent.as_ref().map(|p| p.fields.clone()).unwrap_or_default();
        let (fields, index) = self.build_fields(&builder.path, inherited, builder.fields)?;

        let mut ancestors = Vec::new();
        if let Some(parent) = &parent {
            ancestors.push(parent.path.clone());
            ancestors.extend(parent.ancestors.iter().cloned());
        }

        let desc = Arc::new(StructDesc {
            post_construct: builder
                .post_construct
                .or(parent.as_ref().and_then(|p| p.post_construct)),
            path: builder.path.clone(),
            parent: builder.parent,
            ancestors,
            fields,
            index,
        });
        self.structs.insert(builder.path, Arc::clone(&desc));
        Ok(desc)
    }

    fn build_fields(
        &self,
        path: &TypePath,
        mut fields: Vec<FieldDesc>,
        declared: Vec<(String, FieldKind, Option<Value>)>,
    ) -> Result<(Vec<FieldDesc>, FxHashMap<String, usize>), ReflectError> {
        let mut index: FxHashMap<String, usize> = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();

        for (name, kind, default) in declared {
            if index.contains_key(&name) {
                return Err(ReflectError::DuplicateField {
                    path: path.clone(),
                    field: name,
                });
            }
            self.check_kind(&kind)?;
            let default = match default {
                Some(value) if value.matches(&kind) => value,
                Some(_) => return Err(ReflectError::InvalidDefault { field: name }),
                None => self.default_value(&kind)?,
            };
            index.insert(name.clone(), fields.len());
            fields.push(FieldDesc { name, kind, default });
        }

        Ok((fields, index))
    }

    /// Inline structs must be registered before anything embeds them.
    fn check_kind(&self, kind: &FieldKind) -> Result<(), ReflectError> {
        match kind {
            FieldKind::Struct(path) if !self.structs.contains_key(path) => {
                Err(ReflectError::UnknownType { path: path.clone() })
            }
            FieldKind::Array(element) => self.check_kind(element),
            _ => Ok(()),
        }
    }

    /// Zero value of a kind. Structs take their descriptor's defaults.
    pub fn default_value(&self, kind: &FieldKind) -> Result<Value, ReflectError> {
        Ok(match kind {
            FieldKind::Bool => Value::Bool(false),
            FieldKind::U8 => Value::U8(0),
            FieldKind::I32 => Value::I32(0),
            FieldKind::I64 => Value::I64(0),
            FieldKind::U32 => Value::U32(0),
            FieldKind::U64 => Value::U64(0),
            FieldKind::F32 => Value::F32(0.0),
            FieldKind::F64 => Value::F64(0.0),
            FieldKind::Str => Value::Str(String::new()),
            FieldKind::Bytes => Value::Bytes(Vec::new()),
            FieldKind::Guid => Value::Guid(uuid::Uuid::nil()),
            FieldKind::Vec2 => Value::Vec2(Default::default()),
            FieldKind::Vec3 => Value::Vec3(Default::default()),
            FieldKind::Quat => Value::Quat(Default::default()),
            FieldKind::Transform => Value::Transform(Transform::IDENTITY),
            FieldKind::Struct(path) => Value::Struct(self.new_struct(path.as_str())?),
            FieldKind::Array(_) => Value::Array(Vec::new()),
            FieldKind::Object(_) => Value::Object(None),
            FieldKind::SoftObject => Value::SoftObject(SoftObjectPath::null()),
            FieldKind::WeakObject => Value::WeakObject(None),
        })
    }

    pub fn class(&self, path: &str) -> Option<&Arc<ClassDesc>> {
        self.classes.get(path)
    }

    pub fn struct_desc(&self, path: &str) -> Option<&Arc<StructDesc>> {
        self.structs.get(path)
    }

    /// Resolves a class, failing with `TypeNotFound`.
    pub fn resolve_class(&self, path: &TypePath) -> Result<Arc<ClassDesc>, FlakeError> {
        self.classes
            .get(path)
            .cloned()
            .ok_or_else(|| FlakeError::TypeNotFound { path: path.clone() })
    }

    /// Resolves a struct, failing with `TypeNotFound`.
    pub fn resolve_struct(&self, path: &TypePath) -> Result<Arc<StructDesc>, FlakeError> {
        self.structs
            .get(path)
            .cloned()
            .ok_or_else(|| FlakeError::TypeNotFound { path: path.clone() })
    }

    /// Creates a struct value holding its defaults.
    pub fn new_struct(&self, path: &str) -> Result<StructValue, ReflectError> {
        self.structs
            .get(path)
            .map(|desc| StructValue::new(Arc::clone(desc)))
            .ok_or_else(|| ReflectError::UnknownType { path: path.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inherited_fields_come_first() {
        let mut types = TypeRegistry::new();
        types
            .register_class(ClassBuilder::new("/Script/Heart.Node").field("Guid", FieldKind::Guid))
            .unwrap();
        let derived = types
            .register_class(
                ClassBuilder::new("/Script/Heart.Node3D")
                    .parent("/Script/Heart.Node")
                    .field("Location", FieldKind::Vec3),
            )
            .unwrap();

        let names: Vec<_> = derived.fields().iter().map(FieldDesc::name).collect();
        assert_eq!(names, ["Guid", "Location"]);
        assert!(derived.is_child_of("/Script/Heart.Node"));
        assert!(derived.is_child_of(OBJECT_CLASS));
        assert!(!derived.is_actor());
    }

    #[test]
    fn test_actor_flag_is_inherited() {
        let mut types = TypeRegistry::new();
        let actor = types
            .register_class(ClassBuilder::new("/Game/NodeActor").parent(ACTOR_CLASS))
            .unwrap();
        assert!(actor.is_actor());
    }

    #[test]
    fn test_rejects_duplicates_and_unknown_parents() {
        let mut types = TypeRegistry::new();
        let err = types
            .register_class(ClassBuilder::new("/Game/A").parent("/Game/Missing"))
            .unwrap_err();
        assert!(matches!(err, ReflectError::UnknownParent { .. }));

        let err = types
            .register_class(
                ClassBuilder::new("/Game/A")
                    .field("X", FieldKind::I32)
                    .field("X", FieldKind::I64),
            )
            .unwrap_err();
        assert!(matches!(err, ReflectError::DuplicateField { .. }));

        types.register_class(ClassBuilder::new("/Game/A")).unwrap();
        assert!(matches!(
            types.register_class(ClassBuilder::new("/Game/A")),
            Err(ReflectError::DuplicateType { .. })
        ));
    }

    #[test]
    fn test_struct_fields_must_be_registered_first() {
        let mut types = TypeRegistry::new();
        let err = types
            .register_class(
                ClassBuilder::new("/Game/A").field("Pins", FieldKind::array(FieldKind::structure("/Game/Pin"))),
            )
            .unwrap_err();
        assert!(matches!(err, ReflectError::UnknownType { .. }));
    }

    #[test]
    fn test_explicit_default_must_match_kind() {
        let mut types = TypeRegistry::new();
        let err = types
            .register_class(ClassBuilder::new("/Game/A").field_with_default("Count", FieldKind::I32, "three"))
            .unwrap_err();
        assert!(matches!(err, ReflectError::InvalidDefault { .. }));

        let class = types
            .register_class(ClassBuilder::new("/Game/B").field_with_default("Count", FieldKind::I32, 3))
            .unwrap();
        assert_eq!(class.field("Count").unwrap().default(), &Value::I32(3));
    }
}
