//! Registration-time type metadata.
use crate::class::ClassObject;
use crate::instance::Instance;
use std::any::Any;
use std::sync::Arc;

/// Opaque payload threaded through to a type's `class_init`/interface
/// `interface_init` hooks.
///
/// Modeled as a type-erased, reference-counted value rather than a raw
/// pointer: hooks that need their own concrete type back can
/// `Any::downcast_ref` it.
pub type ClassData = Arc<dyn Any + Send + Sync>;

/// Hook invoked on a class object, top-down, once per ancestor.
pub type BaseInitFn = fn(&mut ClassObject);

/// Hook invoked on a class object immediately before the class object is
/// dropped.
///
/// Never invoked by this crate: class objects live for the process and
/// are never rebuilt or destroyed. Kept in
/// [`TypeInfo`] for parity with the data model and because it is a
/// legitimate extension point a caller may wire up on its own.
pub type BaseFinalizeFn = fn(&mut ClassObject);

/// Hook invoked once, last, while building a type's class object.
pub type ClassInitFn = fn(&mut ClassObject, Option<&ClassData>);

/// See [`BaseFinalizeFn`]: declared for data-model parity, never invoked.
pub type ClassFinalizeFn = fn(&mut ClassObject, Option<&ClassData>);

/// Hook invoked on a freshly zeroed instance, top-down, once per ancestor.
pub type InstanceInitFn = fn(&mut Instance);

/// Hook invoked on an instance, bottom-up, once per ancestor, during
/// teardown.
pub type InstanceFinalizeFn = fn(&mut Instance);

/// One `(interface type, interface init hook)` declaration on a
/// [`TypeInfo`].
#[derive(Debug, Clone)]
pub struct InterfaceEntry {
    /// Name of the previously-registered abstract interface type.
    pub interface_type_name: String,
    /// Hook run as the synthesized implementation type's `class_init`.
    pub interface_init: Option<ClassInitFn>,
}

impl InterfaceEntry {
    /// Declares an interface with no extra `class_init` work.
    pub fn new(interface_type_name: impl Into<String>) -> Self {
        Self {
            interface_type_name: interface_type_name.into(),
            interface_init: None,
        }
    }

    /// Declares an interface whose synthesized class is customized by
    /// `interface_init`.
    pub fn with_init(interface_type_name: impl Into<String>, interface_init: ClassInitFn) -> Self {
        Self {
            interface_type_name: interface_type_name.into(),
            interface_init: Some(interface_init),
        }
    }
}

/// Caller-supplied metadata for [`crate::registry::register_static`].
///
/// Construct with [`TypeInfo::new`] and the `with_*` builders; every
/// field defaults to "absent"/zero.
#[derive(Clone)]
pub struct TypeInfo {
    /// Unique, non-empty type name. Required for `register_static`; left
    /// empty for `register_anonymous`, which assigns a generated name.
    pub name: String,
    /// Name of the parent type, if any. Absent marks a root type.
    pub parent_name: Option<String>,
    /// Size, in bytes, of instances of this type. Zero is only valid for
    /// abstract types that are never directly instantiated.
    pub instance_size: usize,
    /// Size, in bytes, of this type's class object. Zero means "inherit
    /// from parent" (or the universal header size, at the root).
    pub class_size: usize,
    /// Whether this type may be instantiated directly.
    pub is_abstract: bool,
    /// See [`BaseInitFn`].
    pub base_init: Option<BaseInitFn>,
    /// See [`BaseFinalizeFn`].
    pub base_finalize: Option<BaseFinalizeFn>,
    /// See [`ClassInitFn`].
    pub class_init: Option<ClassInitFn>,
    /// See [`ClassFinalizeFn`].
    pub class_finalize: Option<ClassFinalizeFn>,
    /// See [`ClassData`].
    pub class_data: Option<ClassData>,
    /// See [`InstanceInitFn`].
    pub instance_init: Option<InstanceInitFn>,
    /// See [`InstanceFinalizeFn`].
    pub instance_finalize: Option<InstanceFinalizeFn>,
    /// Declared interfaces, in registration order.
    pub interfaces: Vec<InterfaceEntry>,
}

impl std::fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("parent_name", &self.parent_name)
            .field("instance_size", &self.instance_size)
            .field("class_size", &self.class_size)
            .field("is_abstract", &self.is_abstract)
            .field("interfaces", &self.interfaces)
            .field("class_data", &self.class_data.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for TypeInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            parent_name: None,
            instance_size: 0,
            class_size: 0,
            is_abstract: false,
            base_init: None,
            base_finalize: None,
            class_init: None,
            class_finalize: None,
            class_data: None,
            instance_init: None,
            instance_finalize: None,
            interfaces: Vec::new(),
        }
    }
}

impl TypeInfo {
    /// Starts building the metadata for a named, concrete type.
    pub fn new(name: impl Into<String>, instance_size: usize) -> Self {
        Self {
            name: name.into(),
            instance_size,
            ..Default::default()
        }
    }

    /// Sets the parent type name.
    pub fn with_parent(mut self, parent_name: impl Into<String>) -> Self {
        self.parent_name = Some(parent_name.into());
        self
    }

    /// Marks the type abstract.
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Sets the class object size.
    pub fn with_class_size(mut self, class_size: usize) -> Self {
        self.class_size = class_size;
        self
    }

    /// Sets the `base_init` hook.
    pub fn with_base_init(mut self, hook: BaseInitFn) -> Self {
        self.base_init = Some(hook);
        self
    }

    /// Sets the `class_init` hook and its opaque payload.
    pub fn with_class_init(mut self, hook: ClassInitFn, class_data: Option<ClassData>) -> Self {
        self.class_init = Some(hook);
        self.class_data = class_data;
        self
    }

    /// Sets the `instance_init` hook.
    pub fn with_instance_init(mut self, hook: InstanceInitFn) -> Self {
        self.instance_init = Some(hook);
        self
    }

    /// Sets the `instance_finalize` hook.
    pub fn with_instance_finalize(mut self, hook: InstanceFinalizeFn) -> Self {
        self.instance_finalize = Some(hook);
        self
    }

    /// Appends a declared interface.
    pub fn with_interface(mut self, entry: InterfaceEntry) -> Self {
        self.interfaces.push(entry);
        self
    }

    /// Appends several declared interfaces.
    pub fn with_interfaces(mut self, entries: impl IntoIterator<Item = InterfaceEntry>) -> Self {
        self.interfaces.extend(entries);
        self
    }
}
