//! The global type registry and dynamic-cast operations.
use crate::class::ClassRef;
use crate::descriptor::TypeDescriptor;
use crate::error::{RegistrationError, MAX_INTERFACES};
use crate::instance::{self, Instance};
use crate::interface::INTERFACE_TYPE_NAME;
use crate::type_info::TypeInfo;
use lazy_static::lazy_static;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

struct RegistryInner {
    types: HashMap<String, Arc<TypeDescriptor>>,
    next_anonymous_id: u64,
}

impl RegistryInner {
    fn bootstrap() -> Self {
        let mut inner = Self {
            types: HashMap::new(),
            next_anonymous_id: 0,
        };
        inner
            .insert(TypeDescriptor::from_info(
                TypeInfo::new(INTERFACE_TYPE_NAME, std::mem::size_of::<*mut ()>()).abstract_type(),
            ))
            .expect("bootstrap registration of the root interface type cannot fail");
        inner
    }

    fn insert(&mut self, descriptor: TypeDescriptor) -> Result<Arc<TypeDescriptor>, RegistrationError> {
        if self.types.contains_key(&descriptor.name) {
            return Err(RegistrationError::DuplicateName(descriptor.name));
        }
        let arc = Arc::new(descriptor);
        self.types.insert(arc.name.clone(), arc.clone());
        Ok(arc)
    }
}

lazy_static! {
    static ref REGISTRY: RwLock<RegistryInner> = RwLock::new(RegistryInner::bootstrap());
}

/// Registers a named type. Fails if the name is empty, already taken, or
/// declares more than [`MAX_INTERFACES`] interfaces.
pub fn register_static(info: TypeInfo) -> Result<Arc<TypeDescriptor>, RegistrationError> {
    if info.name.is_empty() {
        return Err(RegistrationError::MissingName);
    }
    if info.interfaces.len() > MAX_INTERFACES {
        return Err(RegistrationError::TooManyInterfaces {
            name: info.name,
            declared: info.interfaces.len(),
        });
    }
    REGISTRY.write().insert(TypeDescriptor::from_info(info))
}

/// Registers an anonymous type (used for synthesized interface
/// implementations) under a generated unique name and returns its
/// descriptor. Never fails: the generated name cannot already be taken.
pub fn register_anonymous(mut info: TypeInfo) -> Arc<TypeDescriptor> {
    let mut registry = REGISTRY.write();
    let id = registry.next_anonymous_id;
    registry.next_anonymous_id += 1;
    info.name = format!("<anonymous#{id}>");
    registry
        .insert(TypeDescriptor::from_info(info))
        .expect("generated anonymous type name cannot collide")
}

/// Looks up a registered type by name.
pub fn lookup(name: &str) -> Option<Arc<TypeDescriptor>> {
    REGISTRY.read().types.get(name).cloned()
}

/// Names of every registered type, in no particular order.
pub fn registered_type_names() -> Vec<String> {
    REGISTRY.read().types.keys().cloned().collect()
}

/// The ancestor chain of `name`, from the root type down to and including
/// `name` itself. Panics if `name` is not registered.
pub fn ancestors_of(name: &str) -> Vec<String> {
    let descriptor = lookup(name).unwrap_or_else(|| panic!("unknown type `{name}`"));
    crate::class::ancestor_chain_root_first(&descriptor)
        .into_iter()
        .map(|d| d.name.clone())
        .collect()
}

/// Allocates and fully initializes a new instance of `type_name`.
pub fn new(type_name: &str) -> Box<Instance> {
    Instance::new(type_name)
}

/// Initializes a caller-supplied buffer as an instance of `type_name`.
pub fn initialize(type_name: &str, payload: Box<[u8]>) -> Box<Instance> {
    Instance::initialize(type_name, payload)
}

/// Runs every finalizer on `instance` without freeing it.
pub fn finalize(instance: &mut Instance) {
    instance::finalize(instance)
}

/// Finalizes and frees `instance`.
pub fn delete(instance: Box<Instance>) {
    instance::delete(instance)
}

/// The concrete (most-derived) type name of `instance`.
pub fn get_type(instance: &Instance) -> &str {
    instance.type_name()
}

/// The class object of `instance`.
pub fn get_class(instance: &Instance) -> ClassRef {
    instance.class()
}

/// The type name a class object was built for.
pub fn class_get_name(class: ClassRef) -> &'static str {
    class.type_name()
}

/// True if `instance`'s own ancestor chain contains `type_name` (does not
/// look at installed interfaces).
fn matches_ancestry(instance: &Instance, type_name: &str) -> bool {
    ancestors_of(instance.type_name())
        .iter()
        .any(|name| name == type_name)
}

/// True if `instance`'s concrete type is (or descends from) `type_name`,
/// or one of its installed interface trampolines is.
pub fn is_type(instance: &Instance, type_name: &str) -> bool {
    matches_ancestry(instance, type_name)
        || instance
            .interfaces()
            .iter()
            .any(|ifc| is_type(ifc.as_instance(), type_name))
}

/// Finds the sub-object of `instance` whose type is (or descends from)
/// `type_name`: `instance` itself, one of its directly installed interface
/// trampolines, or, if `instance` is itself a trampoline, the owner it was
/// installed on.
///
/// Each step matches only against ancestry, not the full recursive
/// [`is_type`]: this keeps the steps distinguishable so that a name
/// matching only through an interface yields that interface's trampoline
/// rather than `instance` itself (see the second concrete scenario this
/// crate tests for: a direct instance/interface name collision prefers the
/// instance, but a name that exclusively matches an interface resolves to
/// that interface's trampoline).
pub fn dynamic_cast<'a>(instance: &'a Instance, type_name: &str) -> Option<&'a Instance> {
    if matches_ancestry(instance, type_name) {
        return Some(instance);
    }
    for trampoline in instance.interfaces() {
        if matches_ancestry(trampoline.as_instance(), type_name) {
            return Some(trampoline.as_instance());
        }
    }
    if matches_ancestry(instance, INTERFACE_TYPE_NAME) {
        let owner_ptr = instance.owner_back_pointer();
        if !owner_ptr.is_null() {
            // SAFETY: a non-null back-pointer is only ever set by
            // `Instance::initialize_with` to the address of the `Instance`
            // that installed this trampoline, which lives in a `Box` that
            // outlives the trampoline itself (the owner drops its
            // `interfaces` before its own fields). `instance`'s borrow
            // `'a` was necessarily derived from a borrow of that same
            // owner, so the owner is live for at least `'a`.
            let owner: &'a Instance = unsafe { &*owner_ptr };
            if matches_ancestry(owner, type_name) {
                return Some(owner);
            }
        }
    }
    None
}

/// Like [`dynamic_cast`], but panics with the instance's address and
/// concrete type name if the cast fails.
pub fn dynamic_cast_assert<'a>(instance: &'a Instance, type_name: &str) -> &'a Instance {
    match dynamic_cast(instance, type_name) {
        Some(found) => found,
        None => panic!(
            "instance {:p} of type `{}` cannot be cast to `{type_name}`",
            instance,
            instance.type_name()
        ),
    }
}

/// Asserts that `class` is, or descends from, `type_name` and returns the
/// class object for `type_name` in that ancestry (not necessarily `class`
/// itself: each ancestor type has its own class object).
pub fn class_dynamic_cast_assert(class: ClassRef, type_name: &str) -> ClassRef {
    let descriptor = lookup(class.type_name())
        .unwrap_or_else(|| panic!("class object for unregistered type `{}`", class.type_name()));
    if descriptor.name == type_name {
        return class;
    }
    let chain = crate::class::ancestor_chain_root_first(&descriptor);
    match chain.iter().find(|ancestor| ancestor.name == type_name) {
        Some(ancestor) => crate::class::ensure_class(ancestor),
        None => panic!(
            "class {:p} of type `{}` cannot be cast to `{type_name}`",
            class,
            class.type_name()
        ),
    }
}
