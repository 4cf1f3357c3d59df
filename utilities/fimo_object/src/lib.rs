//! Runtime object/type system.
//!
//! Implements a small meta-object protocol: types are registered by name
//! with a parent, a set of interfaces and a handful of construction hooks;
//! instances are allocated and walked through their parent chain to build
//! and tear down state; and any instance can be asked, at runtime, whether
//! it is (or can be cast to) some named type or interface.
//!
//! The registry is process-wide and is expected to be populated once, at
//! startup, before any instance is created (see [`registry`]).
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    rustdoc::broken_intra_doc_links
)]

pub mod class;
pub mod descriptor;
pub mod error;
pub mod instance;
pub mod interface;
pub mod registry;
pub mod type_info;
pub mod vtable;

pub use class::{ClassObject, ClassRef};
pub use descriptor::TypeDescriptor;
pub use error::RegistrationError;
pub use instance::Instance;
pub use interface::InterfaceTrampoline;
pub use registry::{
    ancestors_of, class_dynamic_cast_assert, class_get_name, delete, dynamic_cast,
    dynamic_cast_assert, finalize, get_class, get_type, initialize, is_type, lookup, new,
    register_anonymous, register_static, registered_type_names,
};
pub use type_info::{InterfaceEntry, TypeInfo};
