//! Universal header layout shared by classes and instances.
//!
//! Every class object begins with a reserved header region of
//! [`HEADER_SIZE`] bytes; every instance begins with a class reference
//! plus its interface trampolines (see [`crate::instance::Instance`]).
//! The header region of a class object is never itself read back by this
//! crate — type identity is tracked on [`crate::descriptor::TypeDescriptor`]
//! directly — but it is reserved and left zeroed so that offsets reported
//! by [`crate::class::ClassObject::slot_bytes`] line up with the "vtable
//! tail starts after the header" model described by the type system.

/// Size, in bytes, of the header reserved at the front of every class
/// object.
pub const HEADER_SIZE: usize = std::mem::size_of::<usize>();
