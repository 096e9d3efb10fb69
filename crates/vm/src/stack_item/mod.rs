//! Stack item module for the Neo Virtual Machine.
//!
//! This module provides the stack item types used in the Neo VM.

pub mod array;
pub mod buffer;
pub mod integer;
pub mod interop_interface;
pub mod map;
pub mod pointer;
pub mod primitive_type;
pub mod stack_item; // allow module inception for clarity of type name
pub mod stack_item_type;
pub mod struct_item;

pub use array::Array;
pub use buffer::Buffer;
pub use interop_interface::InteropInterface;
pub use map::Map;
pub use pointer::Pointer;
pub use primitive_type::PrimitiveType;
pub use stack_item::StackItem;
pub use stack_item_type::StackItemType;
pub use struct_item::Struct;

use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_TRACKING_ID: AtomicUsize = AtomicUsize::new(1);

/// Allocates the identity of a new buffer or compound item.
pub(crate) fn next_tracking_id() -> usize {
    NEXT_TRACKING_ID.fetch_add(1, Ordering::Relaxed)
}
