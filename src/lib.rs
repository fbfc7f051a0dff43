//! # Pinax
//!
//! A reference-counted DMA-mapping registry for accelerator buffer pinning.
//!
//! Pinax keeps at most one device mapping alive per shared buffer while any
//! consumer holds a pin on it, under two independent pin lifetimes:
//!
//! - **User pins** (`pin`/`unpin`) — held on behalf of a user-facing control
//!   surface. The first user pin creates the mapping.
//! - **Submit pins** (`submit_pin` + guard release) — held for in-flight
//!   units of hardware work. Submissions never create mappings, they only
//!   extend ones the user path already established.
//!
//! The mapping is torn down lazily when the last pin of either class drops.
//! Each mapping is classified once, at creation, as DRAM or accelerator-local
//! on-chip SRAM; SRAM mappings are addressed physically, DRAM through the
//! IOMMU when one produced an IOVA.
//!
//! ## Features
//!
//! - **Batch all-or-nothing**: a failed `pin`/`submit_pin` rolls back its own
//!   partial progress; the registry never exposes a half-applied batch
//! - **Forgiving release**: unpinning an unknown or already-released buffer
//!   is a logged no-op, so cleanup paths never need error handling
//! - **Deferred teardown**: every in-flight submission holds a shared
//!   reference to the registry, so context teardown can't free it early
//! - **Pluggable backends**: DMA attach/map is a trait seam; a software
//!   loopback backend ships in-tree for tests and bring-up
//!
//! ## Quick Start
//!
//! ```rust
//! use pinax::prelude::*;
//! use std::sync::Arc;
//!
//! let registry = BufferRegistry::with_mapper(LoopbackMapper::new());
//!
//! // Pin two buffers on behalf of user space.
//! let a: BufferHandle = Arc::new(HeapBuffer::new(4096)?);
//! let b: BufferHandle = Arc::new(HeapBuffer::new(16384)?);
//! registry.pin(&[a.clone(), b.clone()])?;
//!
//! // Dispatch work referencing buffer `a`.
//! let submission = Arc::clone(&registry).submit_pin(&[a.clone()])?;
//! for slice in submission.slices() {
//!     // program slice.device_addr / slice.size into the command descriptor
//! }
//!
//! // Completion: drop the guard, then release the user pins.
//! drop(submission);
//! registry.unpin(&[a, b]);
//! assert!(registry.is_empty());
//! # Ok::<(), pinax::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod dma;
pub mod error;
pub mod handle;
pub mod heap;
pub mod loopback;
pub mod observability;
pub mod registry;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::RegistryConfig;
    pub use crate::dma::{DeviceAddress, DmaDirection, DmaMapper, DmaMapping};
    pub use crate::error::{Error, Result};
    pub use crate::handle::{BufferHandle, HeapBuffer, SharedBuffer};
    pub use crate::heap::{MemoryHeap, SramWindow};
    pub use crate::loopback::LoopbackMapper;
    pub use crate::registry::{BufferRegistry, DmaSlice, SubmitGuard};
}

pub use error::{Error, Result};
