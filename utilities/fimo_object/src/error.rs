//! Errors raised by type registration.
//!
//! Every other failure mode described by the type system (missing parent,
//! abstract instantiation, bad casts, layout invariants) is a programmer
//! error and is reported by panicking instead of via a `Result` — see the
//! individual functions in [`crate::registry`] for the exact wording.
use std::fmt;

/// The maximum number of interfaces a single type may declare.
pub const MAX_INTERFACES: usize = 32;

/// Errors that can occur while registering a type.
#[derive(Debug)]
pub enum RegistrationError {
    /// A [`TypeInfo`](crate::type_info::TypeInfo) was registered without a name.
    MissingName,
    /// A type with this name has already been registered.
    DuplicateName(String),
    /// More than [`MAX_INTERFACES`] interfaces were declared on one type.
    TooManyInterfaces {
        /// Name of the offending type.
        name: String,
        /// Number of interfaces that were declared.
        declared: usize,
    },
}

impl std::error::Error for RegistrationError {}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::MissingName => {
                write!(f, "type registered without a name")
            }
            RegistrationError::DuplicateName(name) => {
                write!(f, "a type named `{name}` is already registered")
            }
            RegistrationError::TooManyInterfaces { name, declared } => {
                write!(
                    f,
                    "type `{name}` declares {declared} interfaces, which exceeds the limit of {MAX_INTERFACES}"
                )
            }
        }
    }
}
