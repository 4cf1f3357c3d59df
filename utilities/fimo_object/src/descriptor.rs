//! The immutable-after-registration type descriptor.
use crate::class::ClassObject;
use crate::type_info::{
    BaseFinalizeFn, BaseInitFn, ClassData, ClassFinalizeFn, ClassInitFn, InstanceFinalizeFn,
    InstanceInitFn, InterfaceEntry, TypeInfo,
};
use std::sync::OnceLock;

/// One registered interface declaration, resolved to its synthesized
/// implementation type once the owning type's class has been built.
#[derive(Debug)]
pub struct ResolvedInterface {
    /// Declaration as given at registration time.
    pub entry: InterfaceEntry,
    /// Name of the anonymous type synthesized by [`crate::interface`] for
    /// this declaration. Set exactly once, during [`crate::class::ensure_class`].
    pub synthesized_type_name: OnceLock<String>,
}

impl ResolvedInterface {
    fn new(entry: InterfaceEntry) -> Self {
        Self {
            entry,
            synthesized_type_name: OnceLock::new(),
        }
    }
}

/// A registered type. Everything but `class` and each interface's
/// `synthesized_type_name` is immutable for the lifetime of the process.
pub struct TypeDescriptor {
    /// Unique registry key.
    pub name: String,
    /// Parent type name, if any.
    pub parent_name: Option<String>,
    /// Declared instance size. May be zero only for types that are never
    /// instantiated.
    pub instance_size: usize,
    /// Declared class size (0 means "inherit").
    pub declared_class_size: usize,
    /// Whether the type may be instantiated directly.
    pub is_abstract: bool,
    pub(crate) base_init: Option<BaseInitFn>,
    #[allow(dead_code)]
    pub(crate) base_finalize: Option<BaseFinalizeFn>,
    pub(crate) class_init: Option<ClassInitFn>,
    #[allow(dead_code)]
    pub(crate) class_finalize: Option<ClassFinalizeFn>,
    pub(crate) class_data: Option<ClassData>,
    pub(crate) instance_init: Option<InstanceInitFn>,
    pub(crate) instance_finalize: Option<InstanceFinalizeFn>,
    /// Declared interfaces, in declaration order.
    pub interfaces: Vec<ResolvedInterface>,
    /// Lazily built class object. Built at most once (see
    /// [`crate::class::ensure_class`]).
    pub(crate) class: OnceLock<&'static ClassObject>,
}

impl TypeDescriptor {
    pub(crate) fn from_info(info: TypeInfo) -> Self {
        Self {
            name: info.name,
            parent_name: info.parent_name,
            instance_size: info.instance_size,
            declared_class_size: info.class_size,
            is_abstract: info.is_abstract,
            base_init: info.base_init,
            base_finalize: info.base_finalize,
            class_init: info.class_init,
            class_finalize: info.class_finalize,
            class_data: info.class_data,
            instance_init: info.instance_init,
            instance_finalize: info.instance_finalize,
            interfaces: info
                .interfaces
                .into_iter()
                .map(ResolvedInterface::new)
                .collect(),
            class: OnceLock::new(),
        }
    }

    /// Returns the already-built class object, if any.
    pub fn class(&self) -> Option<&'static ClassObject> {
        self.class.get().copied()
    }
}

impl std::fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("parent_name", &self.parent_name)
            .field("instance_size", &self.instance_size)
            .field("is_abstract", &self.is_abstract)
            .field("interfaces", &self.interfaces.len())
            .field("class_built", &self.class.get().is_some())
            .finish()
    }
}
