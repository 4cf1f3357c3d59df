//! Instance lifecycle: `initialize`, `new`, `finalize`, `delete`.
use crate::class::{self, ClassRef};
use crate::descriptor::TypeDescriptor;
use crate::interface::InterfaceTrampoline;
use std::sync::Arc;

/// A live instance of a registered type.
///
/// The universal header described here (`{ class, interfaces }`)
/// is tracked natively by this struct rather than byte-packed into the
/// allocation, since `interfaces` is an unbounded ordered collection and
/// Rust has no sound way to inline a growable `Vec` into a raw buffer
/// alongside unrelated bytes; this is a deliberate
/// rendition ("modelled cleanly as a pair held in an ordered collection").
/// `payload` is exactly `instance_size` bytes of type-private state, which
/// is what `TypeInfo::instance_size` is measured against in this crate.
pub struct Instance {
    class: ClassRef,
    interfaces: Vec<InterfaceTrampoline>,
    payload: Box<[u8]>,
}

static_assertions::assert_impl_all!(Instance: Send);

impl Instance {
    /// Size, in bytes, of an interface trampoline's private payload (a
    /// single back-pointer).
    pub(crate) fn trampoline_size() -> usize {
        std::mem::size_of::<*mut ()>()
    }

    /// Allocates and fully initializes a new instance of `type_name`.
    ///
    /// Returned as a `Box` so the instance lives at a stable heap address
    /// for its whole life: interface trampolines keep a raw pointer back to
    /// their owner, and that pointer must stay valid no matter how the
    /// `Box<Instance>` handle itself is subsequently moved around.
    pub fn new(type_name: &str) -> Box<Self> {
        let descriptor = crate::registry::lookup(type_name)
            .unwrap_or_else(|| panic!("cannot instantiate unknown type `{type_name}`"));
        let payload = vec![0u8; descriptor.instance_size].into_boxed_slice();
        Self::initialize_with(descriptor, payload)
    }

    /// Initializes `payload` in place as an instance of `type_name`.
    ///
    /// `payload` must already be exactly `instance_size` bytes (callers
    /// that don't know the size up front should use [`Instance::new`]).
    pub fn initialize(type_name: &str, payload: Box<[u8]>) -> Box<Self> {
        let descriptor = crate::registry::lookup(type_name)
            .unwrap_or_else(|| panic!("cannot instantiate unknown type `{type_name}`"));
        assert_eq!(
            payload.len(),
            descriptor.instance_size,
            "buffer size does not match instance_size of `{type_name}`"
        );
        Self::initialize_with(descriptor, payload)
    }

    fn initialize_with(descriptor: Arc<TypeDescriptor>, mut payload: Box<[u8]>) -> Box<Self> {
        assert!(
            !descriptor.is_abstract,
            "cannot instantiate abstract type `{}`",
            descriptor.name
        );
        // Zero the buffer even when it was handed in by `initialize`: only
        // `instance_init` hooks may give it meaning from here on.
        payload.fill(0);
        let class = class::ensure_class(&descriptor);

        let mut instance = Box::new(Self {
            class,
            interfaces: Vec::new(),
            payload,
        });
        // Stable for the lifetime of `instance`: moving the `Box` handle
        // never moves its heap allocation.
        let owner_ptr: *const Instance = instance.as_ref();

        for ancestor in class::ancestor_chain_root_first(&descriptor) {
            for iface in &ancestor.interfaces {
                let synthesized_name = iface
                    .synthesized_type_name
                    .get()
                    .expect("interface synthesized during class construction")
                    .clone();
                let mut trampoline = Instance::new(&synthesized_name);
                trampoline.set_owner_back_pointer(owner_ptr);
                // Prepend, matching the original's `QLIST_INSERT_HEAD`: the
                // most-derived (latest-processed) ancestor's interfaces end
                // up first in the list.
                instance
                    .interfaces
                    .insert(0, InterfaceTrampoline { instance: trampoline });
            }
            if let Some(instance_init) = ancestor.instance_init {
                instance_init(&mut instance);
            }
        }

        instance
    }

    /// Name of this instance's concrete (most-derived) type.
    pub fn type_name(&self) -> &str {
        self.class.type_name()
    }

    /// This instance's class object.
    pub fn class(&self) -> ClassRef {
        self.class
    }

    /// Interface trampolines installed on this instance, in installation
    /// order (most-derived/leaf-declared interfaces first, each ancestor's
    /// declarations prepended ahead of its parent's).
    pub fn interfaces(&self) -> &[InterfaceTrampoline] {
        &self.interfaces
    }

    /// Mutable access to the installed interface trampolines.
    pub fn interfaces_mut(&mut self) -> &mut [InterfaceTrampoline] {
        &mut self.interfaces
    }

    /// Type-private payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Mutable type-private payload bytes.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }

    /// Reads a `T` out of the payload at `offset`.
    ///
    /// # Safety
    ///
    /// The caller must ensure a valid `T` lives at this offset and that
    /// `offset + size_of::<T>()` does not exceed `payload().len()`.
    pub unsafe fn read_payload<T: Copy>(&self, offset: usize) -> T {
        let ptr = self.payload.as_ptr().add(offset) as *const T;
        // SAFETY: caller guarantees a valid `T` lives at this offset.
        unsafe { ptr.read_unaligned() }
    }

    /// Writes a `T` into the payload at `offset`.
    ///
    /// # Safety
    ///
    /// The caller must ensure `offset + size_of::<T>()` does not exceed
    /// `payload().len()`.
    pub unsafe fn write_payload<T: Copy>(&mut self, offset: usize, value: T) {
        let ptr = self.payload.as_mut_ptr().add(offset) as *mut T;
        // SAFETY: caller guarantees the offset stays within the payload.
        unsafe { ptr.write_unaligned(value) }
    }

    fn set_owner_back_pointer(&mut self, owner: *const Instance) {
        assert!(self.payload.len() >= Self::trampoline_size());
        // SAFETY: asserted above that the payload has room for one pointer.
        unsafe { self.write_payload::<*const Instance>(0, owner) };
    }

    /// The back-pointer carried by a trampoline instance: the address of
    /// the owning `Instance`, stable for as long as the owner's `Box` is
    /// alive. Only meaningful when `self` is an interface trampoline (its
    /// type's ancestry includes [`crate::interface::INTERFACE_TYPE_NAME`]);
    /// null otherwise.
    pub fn owner_back_pointer(&self) -> *const Instance {
        if self.payload.len() < Self::trampoline_size() {
            return std::ptr::null();
        }
        // SAFETY: length checked above.
        unsafe { self.read_payload::<*const Instance>(0) }
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name())
            .field("interfaces", &self.interfaces.len())
            .finish()
    }
}

/// Runs `instance_finalize` bottom-up (most-derived first) and tears down
/// every interface trampoline at the level that declared it, symmetric
/// with per-level installation in [`Instance::initialize_with`].
pub fn finalize(instance: &mut Instance) {
    let descriptor = crate::registry::lookup(instance.type_name())
        .expect("instance's type must still be registered");
    let chain = class::ancestor_chain_root_first(&descriptor);

    for ancestor in chain.iter().rev() {
        if let Some(instance_finalize) = ancestor.instance_finalize {
            instance_finalize(instance);
        }
        for _ in &ancestor.interfaces {
            // Interfaces were prepended in `initialize_with`, so this
            // ancestor's own declarations sit at the front of the list.
            if !instance.interfaces.is_empty() {
                let mut trampoline = instance.interfaces.remove(0);
                finalize(&mut trampoline.instance);
            }
        }
    }
}

/// Finalizes and drops `instance`.
pub fn delete(mut instance: Box<Instance>) {
    finalize(&mut instance);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;
    use crate::type_info::{InterfaceEntry, TypeInfo};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn unique(base: &str) -> String {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        format!("{base}-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[test]
    fn initialize_zeroes_caller_supplied_buffer() {
        let name = unique("instance-zero-payload");
        registry::register_static(TypeInfo::new(&name, 8)).unwrap();

        let dirty = vec![0xFFu8; 8].into_boxed_slice();
        let instance = Instance::initialize(&name, dirty);
        assert_eq!(instance.payload(), &[0u8; 8]);
    }

    #[test]
    fn leaf_declared_interfaces_are_installed_first() {
        let iface_root = unique("instance-order-iface-root");
        let iface_leaf = unique("instance-order-iface-leaf");
        let root = unique("instance-order-root");
        let leaf = unique("instance-order-leaf");

        registry::register_static(TypeInfo::new(&iface_root, Instance::trampoline_size())).unwrap();
        registry::register_static(TypeInfo::new(&iface_leaf, Instance::trampoline_size())).unwrap();
        registry::register_static(
            TypeInfo::new(&root, 0).with_interface(InterfaceEntry::new(&iface_root)),
        )
        .unwrap();
        registry::register_static(
            TypeInfo::new(&leaf, 0)
                .with_parent(&root)
                .with_interface(InterfaceEntry::new(&iface_leaf)),
        )
        .unwrap();

        let instance = Instance::new(&leaf);
        assert_eq!(instance.interfaces().len(), 2);
        assert!(registry::is_type(instance.interfaces()[0].as_instance(), &iface_leaf));
        assert!(registry::is_type(instance.interfaces()[1].as_instance(), &iface_root));
    }

    #[test]
    fn interface_trampoline_casts_back_to_owner() {
        let iface = unique("instance-iface");
        let owner = unique("instance-owner");
        registry::register_static(TypeInfo::new(&iface, Instance::trampoline_size())).unwrap();
        registry::register_static(TypeInfo::new(&owner, 0).with_interface(InterfaceEntry::new(&iface)))
            .unwrap();

        let instance = Instance::new(&owner);
        assert_eq!(instance.interfaces().len(), 1);

        let trampoline = &instance.interfaces()[0];
        assert!(registry::is_type(trampoline.as_instance(), &iface));
        assert_eq!(trampoline.owner(), instance.as_ref() as *const Instance);
        assert!(registry::dynamic_cast(&instance, &iface).is_some());

        // Cast symmetry: casting the owner to the interface and then
        // casting the resulting trampoline back to the owner's concrete
        // type must yield the same instance.
        let as_iface = registry::dynamic_cast(&instance, &iface).unwrap();
        let back = registry::dynamic_cast(as_iface, &owner).unwrap();
        assert!(std::ptr::eq(back, instance.as_ref()));
    }

    #[test]
    fn three_level_lifecycle_runs_parent_chain_in_order() {
        static LOG: Mutex<Vec<&str>> = Mutex::new(Vec::new());

        fn root_init(_i: &mut Instance) {
            LOG.lock().unwrap().push("R");
        }
        fn mid_init(_i: &mut Instance) {
            LOG.lock().unwrap().push("M");
        }
        fn leaf_init(_i: &mut Instance) {
            LOG.lock().unwrap().push("L");
        }
        fn root_finalize(_i: &mut Instance) {
            LOG.lock().unwrap().push("R");
        }
        fn mid_finalize(_i: &mut Instance) {
            LOG.lock().unwrap().push("M");
        }
        fn leaf_finalize(_i: &mut Instance) {
            LOG.lock().unwrap().push("L");
        }

        let root = unique("lifecycle-root");
        let mid = unique("lifecycle-mid");
        let leaf = unique("lifecycle-leaf");

        registry::register_static(
            TypeInfo::new(&root, 0)
                .with_instance_init(root_init)
                .with_instance_finalize(root_finalize),
        )
        .unwrap();
        registry::register_static(
            TypeInfo::new(&mid, 0)
                .with_parent(&root)
                .with_instance_init(mid_init)
                .with_instance_finalize(mid_finalize),
        )
        .unwrap();
        registry::register_static(
            TypeInfo::new(&leaf, 0)
                .with_parent(&mid)
                .with_instance_init(leaf_init)
                .with_instance_finalize(leaf_finalize),
        )
        .unwrap();

        LOG.lock().unwrap().clear();
        let mut instance = Instance::new(&leaf);
        assert_eq!(*LOG.lock().unwrap(), vec!["R", "M", "L"]);

        LOG.lock().unwrap().clear();
        finalize(&mut instance);
        assert_eq!(*LOG.lock().unwrap(), vec!["L", "M", "R"]);
    }

    #[test]
    fn class_dynamic_cast_assert_succeeds_and_panics() {
        let root = unique("instance-cast-root");
        let child = unique("instance-cast-child");
        registry::register_static(TypeInfo::new(&root, 0)).unwrap();
        registry::register_static(TypeInfo::new(&child, 0).with_parent(&root)).unwrap();

        let instance = Instance::new(&child);
        let root_class = registry::class_dynamic_cast_assert(instance.class(), &root);
        assert_eq!(root_class.type_name(), root);

        let result = std::panic::catch_unwind(|| {
            registry::class_dynamic_cast_assert(instance.class(), "definitely-not-registered")
        });
        assert!(result.is_err());
    }
}
