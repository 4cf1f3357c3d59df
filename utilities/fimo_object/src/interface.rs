//! Interface synthesis and interface trampolines.
use crate::descriptor::TypeDescriptor;
use crate::instance::Instance;
use crate::registry;
use crate::type_info::{InterfaceEntry, TypeInfo};
use std::sync::Arc;

/// Name of the distinguished root interface type, pre-registered at
/// startup.
pub const INTERFACE_TYPE_NAME: &str = "interface";

/// Back-pointer carried by every interface trampoline instance.
///
/// A trampoline is an ordinary [`Instance`] of an anonymous type whose
/// only private payload is this back-pointer to the instance that owns
/// it.
pub struct InterfaceTrampoline {
    pub(crate) instance: Box<Instance>,
}

impl InterfaceTrampoline {
    /// Pointer to the instance this trampoline was installed on.
    pub fn owner(&self) -> *const Instance {
        self.instance.owner_back_pointer()
    }

    /// The trampoline's own instance, usable with [`crate::registry::is_type`]
    /// and [`crate::registry::dynamic_cast`].
    pub fn as_instance(&self) -> &Instance {
        &self.instance
    }

    /// Mutable access to the trampoline's own instance.
    pub fn as_instance_mut(&mut self) -> &mut Instance {
        &mut self.instance
    }
}

impl std::fmt::Debug for InterfaceTrampoline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceTrampoline")
            .field("type_name", &self.instance.type_name())
            .field("owner", &self.instance.owner_back_pointer())
            .finish()
    }
}

/// For a declared interface entry on `owner_type_name`, registers (if not
/// already registered) the anonymous implementation type and returns its
/// descriptor.
///
/// The synthesized type's `class_init` is the declaration's
/// `interface_init` hook, so it runs as the last step of
/// [`crate::class::ensure_class`] when the anonymous type's own class is
/// built.
pub(crate) fn synthesize(owner_type_name: &str, entry: &InterfaceEntry) -> Arc<TypeDescriptor> {
    // The declared interface type itself (`entry.interface_type_name`) is
    // expected to be abstract; this anonymous subtype is what's actually
    // instantiated as a trampoline, so it must not be.
    let info = TypeInfo {
        parent_name: Some(entry.interface_type_name.clone()),
        instance_size: Instance::trampoline_size(),
        class_size: 0,
        is_abstract: false,
        class_init: entry.interface_init,
        ..TypeInfo::default()
    };
    let _ = owner_type_name;
    registry::register_anonymous(info)
}
