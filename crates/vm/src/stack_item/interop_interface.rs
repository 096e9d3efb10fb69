//! Opaque host objects carried on the stack.

use std::any::{type_name, Any};
use std::fmt;
use std::rc::Rc;

/// Wraps an arbitrary host object. Scripts can move it around and compare it
/// by identity but never look inside.
#[derive(Clone)]
pub struct InteropInterface {
    object: Rc<dyn Any>,
    type_name: &'static str,
}

impl InteropInterface {
    pub fn new<T: Any>(object: T) -> Self {
        Self {
            object: Rc::new(object),
            type_name: type_name::<T>(),
        }
    }

    /// Returns the wrapped object if it is a `T`.
    pub fn get_interface<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }

    /// The Rust type name of the wrapped object.
    pub fn interface_type(&self) -> &'static str {
        self.type_name
    }

    pub fn ptr_eq(&self, other: &InteropInterface) -> bool {
        Rc::ptr_eq(&self.object, &other.object)
    }
}

impl fmt::Debug for InteropInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InteropInterface<{}>", self.type_name)
    }
}
