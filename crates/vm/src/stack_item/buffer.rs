//! Mutable byte buffer.

use crate::stack_item::next_tracking_id;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

struct BufferInner {
    id: usize,
    data: RefCell<Vec<u8>>,
}

/// A mutable, reference-typed byte array.
#[derive(Clone)]
pub struct Buffer {
    inner: Rc<BufferInner>,
}

impl Buffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            inner: Rc::new(BufferInner {
                id: next_tracking_id(),
                data: RefCell::new(data),
            }),
        }
    }

    /// Creates a zero-filled buffer of `len` bytes.
    pub fn with_len(len: usize) -> Self {
        Self::new(vec![0u8; len])
    }

    pub fn id(&self) -> usize {
        self.inner.id
    }

    pub fn len(&self) -> usize {
        self.inner.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.data.borrow().is_empty()
    }

    pub fn data(&self) -> Ref<'_, Vec<u8>> {
        self.inner.data.borrow()
    }

    pub fn data_mut(&self) -> RefMut<'_, Vec<u8>> {
        self.inner.data.borrow_mut()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.inner.data.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &Buffer) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn handle_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buffer({:02x?})", self.inner.data.borrow())
    }
}
