//! Opaque, shareable buffer handles.
//!
//! The registry never looks inside a buffer. It needs exactly three things
//! from one: a byte length, reference-counted shared ownership, and a stable
//! identity. [`SharedBuffer`] is that contract; [`BufferHandle`] is the
//! shared-ownership form the registry traffics in; [`HandleId`] is the
//! identity key (two handles are the same buffer iff they point at the same
//! allocation — content is never compared).

use crate::error::{Error, Result};
use std::fmt;
use std::sync::Arc;

/// Trait for buffer objects that can be pinned into a registry.
///
/// Implementors are typically produced by a buffer-sharing mechanism
/// (a DMA-BUF-like allocator, a device heap, an export from another
/// subsystem). The registry holds one [`BufferHandle`] clone per mapping
/// record for as long as the record exists — that clone is the registry's
/// single reference to the external object, regardless of how many pins
/// are stacked on top of it.
pub trait SharedBuffer: Send + Sync {
    /// Byte length of the buffer.
    fn len(&self) -> usize;

    /// Returns true if the buffer has zero length.
    ///
    /// Zero-length buffers cannot be mapped.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Optional debug label, surfaced in tracing events.
    fn name(&self) -> Option<&str> {
        None
    }
}

/// A shareable, reference-counted buffer handle.
///
/// Cloning a handle is cheap (an `Arc` increment) and never duplicates the
/// underlying buffer. Handle equality for registry purposes is allocation
/// identity, captured by [`HandleId::of`].
pub type BufferHandle = Arc<dyn SharedBuffer>;

/// Identity key of a [`BufferHandle`]: the address of its allocation.
///
/// Stable for the life of the allocation, and totally ordered so it can key
/// the registry's ordered index.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(usize);

impl HandleId {
    /// Compute the identity of a handle.
    ///
    /// Two handles yield the same id iff they share one allocation; a clone
    /// always maps to the same id as its source.
    pub fn of(handle: &BufferHandle) -> Self {
        // Thin data pointer only; the vtable half of the fat pointer is
        // irrelevant to identity.
        HandleId(Arc::as_ptr(handle) as *const u8 as usize)
    }
}

impl fmt::Debug for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandleId({:#x})", self.0)
    }
}

/// A buffer backed by a plain heap allocation.
///
/// The simplest [`SharedBuffer`] backend, suitable for tests, benches, and
/// embedders that have no real buffer-sharing mechanism to integrate.
///
/// # Example
///
/// ```rust
/// use pinax::handle::{HeapBuffer, SharedBuffer};
///
/// let buffer = HeapBuffer::new(4096).unwrap();
/// assert_eq!(buffer.len(), 4096);
/// ```
pub struct HeapBuffer {
    /// The underlying allocation.
    /// A boxed slice keeps the memory contiguous and un-reallocatable.
    data: Box<[u8]>,
    name: Option<String>,
}

impl HeapBuffer {
    /// Create a new heap buffer with the given size.
    ///
    /// The memory is zero-initialized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailed`] if `size` is 0.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::AllocationFailed(
                "size must be greater than 0".into(),
            ));
        }

        Ok(Self {
            data: vec![0u8; size].into_boxed_slice(),
            name: None,
        })
    }

    /// Create a named heap buffer; the name shows up in tracing events.
    pub fn with_name(name: &str, size: usize) -> Result<Self> {
        let mut buffer = Self::new(size)?;
        buffer.name = Some(name.to_string());
        Ok(buffer)
    }

    /// Get the buffer contents as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get the buffer contents as a mutable byte slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl SharedBuffer for HeapBuffer {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}
