//! Lazy per-type class-object construction.
use crate::descriptor::TypeDescriptor;
use crate::interface;
use crate::registry;
use crate::vtable::HEADER_SIZE;
use std::sync::Arc;

/// A class object: per-type metadata built once and shared by every
/// instance of that type.
///
/// The first [`HEADER_SIZE`] bytes are a reserved header; everything
/// after that is the type's "vtable tail", inherited byte-for-byte from
/// the parent and then customized by `base_init`/`class_init` (see
/// [`ensure_class`]).
pub struct ClassObject {
    type_name: String,
    buffer: Vec<u8>,
}

/// A `'static` reference to a [`ClassObject`].
///
/// Class objects are built once and never destroyed, so a
/// leaked, process-lifetime reference is a faithful (and safe) rendition
/// of "the class object is immortal".
pub type ClassRef = &'static ClassObject;

impl ClassObject {
    /// Name of the type this class object was built for.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Total size of the class object, including the reserved header.
    pub fn class_size(&self) -> usize {
        self.buffer.len()
    }

    /// The vtable tail: everything after the reserved header.
    pub fn slot_bytes(&self) -> &[u8] {
        &self.buffer[HEADER_SIZE..]
    }

    /// Mutable access to the vtable tail.
    pub fn slot_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buffer[HEADER_SIZE..]
    }

    /// Reads a `T` out of the vtable tail at `offset` (relative to the
    /// end of the header).
    ///
    /// # Safety
    ///
    /// The caller must ensure that a valid `T` was previously written at
    /// this offset (typically by this same type's or an ancestor's
    /// `base_init`/`class_init`), and that `offset + size_of::<T>()`
    /// does not exceed [`ClassObject::class_size`] minus the header.
    pub unsafe fn read_slot<T: Copy>(&self, offset: usize) -> T {
        let ptr = self.slot_bytes().as_ptr().add(offset) as *const T;
        // SAFETY: caller guarantees a valid `T` lives at this offset.
        unsafe { ptr.read_unaligned() }
    }

    /// Writes a `T` into the vtable tail at `offset` (relative to the end
    /// of the header).
    ///
    /// # Safety
    ///
    /// The caller must ensure `offset + size_of::<T>()` does not exceed
    /// [`ClassObject::class_size`] minus the header.
    pub unsafe fn write_slot<T: Copy>(&mut self, offset: usize, value: T) {
        let ptr = self.slot_bytes_mut().as_mut_ptr().add(offset) as *mut T;
        // SAFETY: caller guarantees the offset stays within the vtable tail.
        unsafe { ptr.write_unaligned(value) }
    }
}

impl std::fmt::Debug for ClassObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassObject")
            .field("type_name", &self.type_name)
            .field("class_size", &self.buffer.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(ClassObject: Send, Sync);

/// Resolves the effective class size for `descriptor`: its own
/// `declared_class_size` if non-zero, otherwise the nearest ancestor's,
/// otherwise [`HEADER_SIZE`].
fn resolve_class_size(descriptor: &TypeDescriptor) -> usize {
    if descriptor.declared_class_size != 0 {
        return descriptor.declared_class_size;
    }
    let mut seen = std::collections::HashSet::new();
    seen.insert(descriptor.name.clone());
    let mut next = descriptor.parent_name.clone();
    while let Some(name) = next {
        if !seen.insert(name.clone()) {
            panic!("parent chain of type `{}` cycles back to `{name}`", descriptor.name);
        }
        let parent = registry::lookup(&name)
            .unwrap_or_else(|| panic!("type `{}` has unresolved parent `{name}`", descriptor.name));
        if parent.declared_class_size != 0 {
            return parent.declared_class_size;
        }
        next = parent.parent_name.clone();
    }
    HEADER_SIZE
}

/// Builds (or returns the already-built) class object for `descriptor`.
///
/// Resolves size, allocates, inherits the
/// parent's vtable tail byte-for-byte, run every ancestor's `base_init`
/// top-down, synthesize and build each declared interface's anonymous
/// type, then run this type's own `class_init` last.
pub fn ensure_class(descriptor: &Arc<TypeDescriptor>) -> ClassRef {
    if let Some(existing) = descriptor.class.get() {
        return *existing;
    }

    let class_size = resolve_class_size(descriptor);
    let mut class = ClassObject {
        type_name: descriptor.name.clone(),
        buffer: vec![0u8; class_size],
    };

    if let Some(parent_name) = &descriptor.parent_name {
        let parent = registry::lookup(parent_name)
            .unwrap_or_else(|| panic!("type `{}` has unresolved parent `{parent_name}`", descriptor.name));
        let parent_class = ensure_class(&parent);
        assert!(
            parent_class.class_size() <= class.class_size(),
            "type `{}` has class_size {} smaller than parent `{}`'s class_size {}",
            descriptor.name,
            class.class_size(),
            parent_name,
            parent_class.class_size(),
        );
        let tail_len = parent_class.class_size() - HEADER_SIZE;
        class.buffer[HEADER_SIZE..HEADER_SIZE + tail_len]
            .copy_from_slice(parent_class.slot_bytes());
    }

    for ancestor in ancestor_chain_root_first(descriptor) {
        if let Some(base_init) = ancestor.base_init {
            base_init(&mut class);
        }
    }

    for iface in &descriptor.interfaces {
        let synthesized = interface::synthesize(descriptor.name.as_str(), &iface.entry);
        let _ = iface.synthesized_type_name.set(synthesized.name.clone());
        // Building the anonymous type's class runs `interface_init` as its
        // `class_init` (step 7 of this same algorithm, re-entered).
        ensure_class(&synthesized);
    }

    if let Some(class_init) = descriptor.class_init {
        class_init(&mut class, descriptor.class_data.as_ref());
    }

    let leaked: ClassRef = Box::leak(Box::new(class));
    match descriptor.class.set(leaked) {
        Ok(()) => leaked,
        // Lost a race with a concurrent builder; both are valid, keep the
        // winner so that every caller observes one identity.
        Err(_) => descriptor.class.get().copied().expect("just lost the race"),
    }
}

/// Returns `descriptor`'s ancestors from the root down to (and including)
/// `descriptor` itself.
pub(crate) fn ancestor_chain_root_first(descriptor: &Arc<TypeDescriptor>) -> Vec<Arc<TypeDescriptor>> {
    let mut chain = vec![descriptor.clone()];
    let mut seen = std::collections::HashSet::new();
    seen.insert(descriptor.name.clone());
    let mut next = descriptor.parent_name.clone();
    while let Some(name) = next {
        if !seen.insert(name.clone()) {
            panic!("parent chain of type `{}` cycles back to `{name}`", descriptor.name);
        }
        let parent = registry::lookup(&name)
            .unwrap_or_else(|| panic!("type `{}` has unresolved parent `{name}`", descriptor.name));
        next = parent.parent_name.clone();
        chain.push(parent);
    }
    chain.reverse();
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;
    use crate::type_info::TypeInfo;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn unique(base: &str) -> String {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        format!("{base}-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[test]
    fn parent_cycle_aborts_instead_of_looping() {
        let a = unique("class-cycle-a");
        let b = unique("class-cycle-b");
        registry::register_static(TypeInfo::new(&a, 0).with_parent(&b)).unwrap();
        registry::register_static(TypeInfo::new(&b, 0).with_parent(&a)).unwrap();

        let descriptor = registry::lookup(&a).unwrap();
        let result = std::panic::catch_unwind(|| ensure_class(&descriptor));
        assert!(result.is_err());
    }

    #[test]
    fn class_build_is_idempotent() {
        let name = unique("class-idempotent-root");
        registry::register_static(TypeInfo::new(&name, HEADER_SIZE)).unwrap();
        let descriptor = registry::lookup(&name).unwrap();
        let first = ensure_class(&descriptor);
        let second = ensure_class(&descriptor);
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn inherited_tail_is_copied_before_overrides() {
        let root = unique("class-vtable-root");
        let child = unique("class-vtable-child");

        fn root_base_init(class: &mut ClassObject) {
            // SAFETY: slot 0 holds a u32 reserved by this test's class_size.
            unsafe { class.write_slot::<u32>(0, 0xAAAA) };
        }
        fn child_class_init(class: &mut ClassObject, _data: Option<&crate::type_info::ClassData>) {
            // SAFETY: slot 0 holds a u32 reserved by this test's class_size.
            let inherited: u32 = unsafe { class.read_slot(0) };
            assert_eq!(inherited, 0xAAAA);
            // SAFETY: slot 0 holds a u32 reserved by this test's class_size.
            unsafe { class.write_slot::<u32>(0, 0xBBBB) };
        }

        registry::register_static(
            TypeInfo::new(&root, HEADER_SIZE)
                .with_class_size(HEADER_SIZE + 4)
                .with_base_init(root_base_init),
        )
        .unwrap();
        registry::register_static(
            TypeInfo::new(&child, HEADER_SIZE)
                .with_parent(&root)
                .with_class_size(HEADER_SIZE + 4)
                .with_class_init(child_class_init, None),
        )
        .unwrap();

        let descriptor = registry::lookup(&child).unwrap();
        let class = ensure_class(&descriptor);
        // SAFETY: slot 0 holds a u32 reserved by this test's class_size.
        let slot: u32 = unsafe { class.read_slot(0) };
        assert_eq!(slot, 0xBBBB);
    }

    #[test]
    fn three_level_base_init_runs_top_down() {
        use std::sync::Mutex;
        static LOG: Mutex<Vec<&str>> = Mutex::new(Vec::new());

        fn root_base_init(_class: &mut ClassObject) {
            LOG.lock().unwrap().push("R");
        }
        fn mid_base_init(_class: &mut ClassObject) {
            LOG.lock().unwrap().push("M");
        }
        fn leaf_base_init(_class: &mut ClassObject) {
            LOG.lock().unwrap().push("L");
        }

        let root = unique("class-order-root");
        let mid = unique("class-order-mid");
        let leaf = unique("class-order-leaf");

        registry::register_static(TypeInfo::new(&root, 0).with_base_init(root_base_init)).unwrap();
        registry::register_static(
            TypeInfo::new(&mid, 0)
                .with_parent(&root)
                .with_base_init(mid_base_init),
        )
        .unwrap();
        registry::register_static(
            TypeInfo::new(&leaf, 0)
                .with_parent(&mid)
                .with_base_init(leaf_base_init),
        )
        .unwrap();

        LOG.lock().unwrap().clear();
        let descriptor = registry::lookup(&leaf).unwrap();
        ensure_class(&descriptor);
        assert_eq!(*LOG.lock().unwrap(), vec!["R", "M", "L"]);
    }
}
