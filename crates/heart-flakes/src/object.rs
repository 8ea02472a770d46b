//! Object environment: identities, ownership, paths and field access.
//!
//! Objects live in an [`ObjectStore`] arena and refer to each other by
//! [`ObjectId`]. Every object has at most one outer (its owner); the outer
//! chain is a tree because an outer is fixed at instantiation and must
//! already exist.
//!
//! Paths follow the usual package convention: a root object's name is its
//! path (`/Game/Shared`), a child of a root is joined with `.`
//! (`/Game/Shared.Asset`) and anything deeper with `:`
//! (`/Game/Shared.Asset:Child`).

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::ReflectError;
use crate::reflect::{ClassDesc, FieldKind, Transform, TypeRegistry, Value};

/// Identity of an object inside one [`ObjectStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An object instance.
#[derive(Debug, Clone)]
pub struct Object {
    id: ObjectId,
    class: Arc<ClassDesc>,
    outer: Option<ObjectId>,
    name: String,
    path: String,
    fields: Vec<Value>,
    children: Vec<ObjectId>,
    transform: Option<Transform>,
}

impl Object {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn class(&self) -> &Arc<ClassDesc> {
        &self.class
    }

    /// The owning object, if any.
    pub fn outer(&self) -> Option<ObjectId> {
        self.outer
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Field values in class field order.
    pub fn values(&self) -> &[Value] {
        &self.fields
    }

    /// Objects whose outer is this object, in creation order.
    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    /// Placement, present on actors only.
    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    /// Returns a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.class.field_index(name).map(|i| &self.fields[i])
    }
}

/// Arena of live objects plus the type registry they are described by.
#[derive(Debug)]
pub struct ObjectStore {
    types: Arc<TypeRegistry>,
    objects: FxHashMap<ObjectId, Object>,
    paths: FxHashMap<String, ObjectId>,
    next_id: u64,
    next_name: u64,
}

impl ObjectStore {
    /// Creates an empty store over a registry.
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        Self {
            types,
            objects: FxHashMap::default(),
            paths: FxHashMap::default(),
            next_id: 1,
            next_name: 0,
        }
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    fn object(&self, id: ObjectId) -> Result<&Object, ReflectError> {
        self.objects.get(&id).ok_or(ReflectError::DanglingObject { id })
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut Object, ReflectError> {
        self.objects
            .get_mut(&id)
            .ok_or(ReflectError::DanglingObject { id })
    }

    /// Instantiates `class` under `outer` with a generated unique name.
    pub fn instantiate(
        &mut self,
        class: &Arc<ClassDesc>,
        outer: Option<ObjectId>,
    ) -> Result<ObjectId, ReflectError> {
        loop {
            let name = format!("{}_{}", class.path().short_name(), self.next_name);
            self.next_name += 1;
            let path = self.child_path(outer, &name)?;
            if !self.paths.contains_key(&path) {
                return self.insert(class, outer, name, path);
            }
        }
    }

    /// Instantiates `class` under `outer` with an explicit name.
    pub fn instantiate_named(
        &mut self,
        class: &Arc<ClassDesc>,
        outer: Option<ObjectId>,
        name: &str,
    ) -> Result<ObjectId, ReflectError> {
        let path = self.child_path(outer, name)?;
        if self.paths.contains_key(&path) {
            return Err(ReflectError::DuplicatePath { path });
        }
        self.insert(class, outer, name.to_string(), path)
    }

    /// Resolves `class_path` and instantiates it.
    pub fn new_object(
        &mut self,
        class_path: &str,
        outer: Option<ObjectId>,
        name: Option<&str>,
    ) -> Result<ObjectId, ReflectError> {
        let class = self
            .types
            .class(class_path)
            .cloned()
            .ok_or_else(|| ReflectError::UnknownType {
                path: class_path.into(),
            })?;
        match name {
            Some(name) => self.instantiate_named(&class, outer, name),
            None => self.instantiate(&class, outer),
        }
    }

    /// Instantiates an actor class under `world` at `transform`.
    pub fn spawn_actor(
        &mut self,
        class: &Arc<ClassDesc>,
        world: ObjectId,
        transform: Transform,
    ) -> Result<ObjectId, ReflectError> {
        if !class.is_actor() {
            return Err(ReflectError::KindMismatch {
                field: "class".to_string(),
                expected: "actor class".to_string(),
                found: class.path().to_string(),
            });
        }
        let id = self.instantiate(class, Some(world))?;
        self.set_transform(id, transform)?;
        Ok(id)
    }

    fn child_path(&self, outer: Option<ObjectId>, name: &str) -> Result<String, ReflectError> {
        let Some(outer) = outer else {
            return Ok(name.to_string());
        };
        let parent = self.object(outer)?;
        let separator = if parent.outer.is_none() { '.' } else { ':' };
        Ok(format!("{}{}{}", parent.path, separator, name))
    }

    fn insert(
        &mut self,
        class: &Arc<ClassDesc>,
        outer: Option<ObjectId>,
        name: String,
        path: String,
    ) -> Result<ObjectId, ReflectError> {
        let id = ObjectId(self.next_id);
        self.next_id += 1;

        if let Some(outer) = outer {
            self.object_mut(outer)?.children.push(id);
        }

        let fields = class.fields().iter().map(|f| f.default().clone()).collect();
        self.paths.insert(path.clone(), id);
        self.objects.insert(
            id,
            Object {
                id,
                class: Arc::clone(class),
                outer,
                name,
                path,
                fields,
                children: Vec::new(),
                transform: None,
            },
        );
        Ok(id)
    }

    /// Removes an object and everything it owns. Returns the number of
    /// objects removed.
    pub fn destroy(&mut self, id: ObjectId) -> usize {
        let Some(outer) = self.objects.get(&id).map(|o| o.outer) else {
            return 0;
        };
        if let Some(parent) = outer.and_then(|outer| self.objects.get_mut(&outer)) {
            parent.children.retain(|child| *child != id);
        }

        let mut removed = 0;
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(object) = self.objects.remove(&next) {
                self.paths.remove(&object.path);
                pending.extend(object.children);
                removed += 1;
            }
        }
        removed
    }

    pub fn path_of(&self, id: ObjectId) -> Option<&str> {
        self.objects.get(&id).map(|o| o.path.as_str())
    }

    /// Looks an object up by its full path.
    pub fn resolve_path(&self, path: &str) -> Option<ObjectId> {
        self.paths.get(path).copied()
    }

    pub fn outer(&self, id: ObjectId) -> Option<ObjectId> {
        self.objects.get(&id).and_then(|o| o.outer)
    }

    /// Everything `id` owns, directly or transitively, depth first.
    pub fn descendants(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut pending: Vec<ObjectId> = match self.objects.get(&id) {
            Some(object) => object.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(next) = pending.pop() {
            if let Some(object) = self.objects.get(&next) {
                out.push(next);
                pending.extend(object.children.iter().rev().copied());
            }
        }
        out
    }

    /// Returns a field value by name.
    pub fn get_field(&self, id: ObjectId, name: &str) -> Result<&Value, ReflectError> {
        let object = self.object(id)?;
        object.get(name).ok_or_else(|| ReflectError::UnknownField {
            path: object.class.path().clone(),
            field: name.to_string(),
        })
    }

    /// Sets a field value by name.
    ///
    /// Object references must point at live objects whose class derives
    /// from the field's declared base.
    pub fn set_field(
        &mut self,
        id: ObjectId,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), ReflectError> {
        let value = value.into();
        let object = self.object(id)?;
        let index = object
            .class
            .field_index(name)
            .ok_or_else(|| ReflectError::UnknownField {
                path: object.class.path().clone(),
                field: name.to_string(),
            })?;
        let kind = object.class.fields()[index].kind();
        if !value.matches(kind) {
            return Err(ReflectError::KindMismatch {
                field: name.to_string(),
                expected: kind.to_string(),
                found: value.kind_name(),
            });
        }
        self.check_references(name, kind, &value)?;
        self.object_mut(id)?.fields[index] = value;
        Ok(())
    }

    fn check_references(&self, field: &str, kind: &FieldKind, value: &Value) -> Result<(), ReflectError> {
        match (kind, value) {
            (FieldKind::Object(base), Value::Object(Some(target))) => {
                let target = self.object(*target)?;
                if !target.class.is_child_of(base.as_str()) {
                    return Err(ReflectError::KindMismatch {
                        field: field.to_string(),
                        expected: kind.to_string(),
                        found: target.class.path().to_string(),
                    });
                }
                Ok(())
            }
            (FieldKind::WeakObject, Value::WeakObject(Some(target))) => self.object(*target).map(|_| ()),
            (FieldKind::Array(element), Value::Array(items)) => items
                .iter()
                .try_for_each(|item| self.check_references(field, element, item)),
            (FieldKind::Struct(_), Value::Struct(inner)) => inner
                .desc()
                .fields()
                .iter()
                .zip(inner.values())
                .try_for_each(|(f, v)| self.check_references(f.name(), f.kind(), v)),
            _ => Ok(()),
        }
    }

    /// Replaces all field values at once. Values are already validated by
    /// the codec.
    pub(crate) fn replace_values(&mut self, id: ObjectId, values: Vec<Value>) -> Result<(), ReflectError> {
        let object = self.object_mut(id)?;
        debug_assert_eq!(values.len(), object.fields.len());
        object.fields = values;
        Ok(())
    }

    /// Places an object. Only actors are expected to carry a transform.
    pub fn set_transform(&mut self, id: ObjectId, transform: Transform) -> Result<(), ReflectError> {
        self.object_mut(id)?.transform = Some(transform);
        Ok(())
    }

    /// Runs post-load hooks on `id` and then on everything it owns.
    pub fn run_post_load(&mut self, id: ObjectId) {
        let targets = std::iter::once(id).chain(self.descendants(id));
        let hooks: Vec<_> = targets
            .filter_map(|target| {
                let hook = self.objects.get(&target)?.class.post_load()?;
                Some((target, hook))
            })
            .collect();
        for (target, hook) in hooks {
            if self.contains(target) {
                hook(self, target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{ACTOR_CLASS, ClassBuilder, OBJECT_CLASS, Vec3};

    fn store() -> ObjectStore {
        let mut types = TypeRegistry::new();
        types
            .register_class(
                ClassBuilder::new("/Script/Heart.Graph")
                    .field("Title", FieldKind::Str)
                    .field("Root", FieldKind::object("/Script/Heart.Graph")),
            )
            .unwrap();
        types
            .register_class(ClassBuilder::new("/Script/Heart.Marker").parent(ACTOR_CLASS))
            .unwrap();
        ObjectStore::new(Arc::new(types))
    }

    #[test]
    fn test_paths_follow_package_convention() {
        let mut store = store();
        let package = store.new_object(OBJECT_CLASS, None, Some("/Game/Shared")).unwrap();
        let asset = store
            .new_object("/Script/Heart.Graph", Some(package), Some("Asset"))
            .unwrap();
        let inner = store
            .new_object("/Script/Heart.Graph", Some(asset), Some("Inner"))
            .unwrap();

        assert_eq!(store.path_of(asset), Some("/Game/Shared.Asset"));
        assert_eq!(store.path_of(inner), Some("/Game/Shared.Asset:Inner"));
        assert_eq!(store.resolve_path("/Game/Shared.Asset:Inner"), Some(inner));
        assert_eq!(store.outer(inner), Some(asset));
    }

    #[test]
    fn test_generated_names_are_unique() {
        let mut store = store();
        let package = store.new_object(OBJECT_CLASS, None, Some("/Game/Pkg")).unwrap();
        let a = store.new_object("/Script/Heart.Graph", Some(package), None).unwrap();
        let b = store.new_object("/Script/Heart.Graph", Some(package), None).unwrap();
        assert_ne!(store.path_of(a), store.path_of(b));
        assert!(store.get(a).unwrap().name().starts_with("Graph_"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut store = store();
        store.new_object(OBJECT_CLASS, None, Some("/Game/Pkg")).unwrap();
        assert!(matches!(
            store.new_object(OBJECT_CLASS, None, Some("/Game/Pkg")),
            Err(ReflectError::DuplicatePath { .. })
        ));
    }

    #[test]
    fn test_destroy_removes_subtree() {
        let mut store = store();
        let package = store.new_object(OBJECT_CLASS, None, Some("/Game/Pkg")).unwrap();
        let graph = store.new_object("/Script/Heart.Graph", Some(package), None).unwrap();
        let inner = store.new_object("/Script/Heart.Graph", Some(graph), None).unwrap();

        assert_eq!(store.destroy(graph), 2);
        assert!(!store.contains(inner));
        assert!(store.get(package).unwrap().children().is_empty());
        assert_eq!(store.destroy(graph), 0);
    }

    #[test]
    fn test_set_field_checks_reference_class() {
        let mut store = store();
        let package = store.new_object(OBJECT_CLASS, None, Some("/Game/Pkg")).unwrap();
        let graph = store.new_object("/Script/Heart.Graph", Some(package), None).unwrap();

        store.set_field(graph, "Root", Value::Object(Some(graph))).unwrap();
        let err = store
            .set_field(graph, "Root", Value::Object(Some(package)))
            .unwrap_err();
        assert!(matches!(err, ReflectError::KindMismatch { .. }));
        assert!(matches!(
            store.set_field(graph, "Title", 7),
            Err(ReflectError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_spawn_actor_requires_actor_class() {
        let mut store = store();
        let world = store.new_object(OBJECT_CLASS, None, Some("/Game/World")).unwrap();
        let marker = store.types().class("/Script/Heart.Marker").cloned().unwrap();
        let graph = store.types().class("/Script/Heart.Graph").cloned().unwrap();

        let transform = Transform::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let actor = store.spawn_actor(&marker, world, transform).unwrap();
        assert_eq!(store.get(actor).unwrap().transform(), Some(&transform));
        assert!(store.spawn_actor(&graph, world, transform).is_err());

        let moved = Transform::from_translation(Vec3::new(-4.0, 0.0, 9.0));
        store.set_transform(actor, moved).unwrap();
        assert_eq!(store.get(actor).unwrap().transform(), Some(&moved));

        store.destroy(actor);
        assert!(matches!(
            store.set_transform(actor, transform),
            Err(ReflectError::DanglingObject { .. })
        ));
    }

    #[test]
    fn test_descendants_are_depth_first() {
        let mut store = store();
        let root = store.new_object("/Script/Heart.Graph", None, Some("/Game/Root")).unwrap();
        let a = store.new_object("/Script/Heart.Graph", Some(root), Some("A")).unwrap();
        let a1 = store.new_object("/Script/Heart.Graph", Some(a), Some("A1")).unwrap();
        let b = store.new_object("/Script/Heart.Graph", Some(root), Some("B")).unwrap();

        assert_eq!(store.descendants(root), vec![a, a1, b]);
    }
}
