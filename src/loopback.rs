//! Software loopback DMA backend.
//!
//! The simplest [`DmaMapper`]: no hardware, no IOMMU, just deterministic
//! fabricated addresses. Suitable for unit tests, benches, and bring-up on
//! hosts without a real device. Physical placement is a page-granular bump
//! allocator from a configurable base, which lets tests park buffers inside
//! (or outside) an SRAM window on purpose.
//!
//! # Example
//!
//! ```rust
//! use pinax::loopback::LoopbackMapper;
//! use pinax::registry::BufferRegistry;
//!
//! let mapper = LoopbackMapper::new();
//! let registry = BufferRegistry::with_mapper(mapper.clone());
//! assert!(registry.is_empty());
//! assert_eq!(mapper.live_attachments(), 0);
//! ```

use crate::dma::{DmaAttachment, DmaDirection, DmaMapper, DmaMapping};
use crate::error::Result;
use crate::handle::BufferHandle;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Placement granularity for fabricated physical addresses.
const PAGE_SIZE: u64 = 4096;

/// Default base of the fabricated IOVA space.
const DEFAULT_IOVA_BASE: u64 = 0x1000_0000;

/// Default base of the fabricated physical space.
const DEFAULT_PHYS_BASE: u64 = 0x8000_0000;

/// An in-process DMA backend that fabricates addresses.
///
/// Each attached buffer gets the next page-aligned range after the previous
/// one, in both the physical and (optional) IOVA spaces. Ranges are never
/// reused; the loopback mapper models placement, not reclamation.
///
/// The mapper counts live attachments, so tests can assert that every
/// released mapping was actually detached.
pub struct LoopbackMapper {
    /// Base of the fabricated IOVA space; `None` models a platform whose
    /// device sees physical addresses directly.
    iova_base: Option<u64>,
    /// Base of the fabricated physical space.
    phys_base: u64,
    /// Next free page-aligned offset.
    next_offset: AtomicU64,
    /// Attachments currently alive (attached, not yet dropped).
    /// Shared with the attachments themselves, which decrement on drop.
    live: Arc<AtomicUsize>,
}

impl LoopbackMapper {
    /// Create a mapper with the default IOVA and physical bases.
    pub fn new() -> Arc<Self> {
        Self::with_bases(Some(DEFAULT_IOVA_BASE), DEFAULT_PHYS_BASE)
    }

    /// Create a mapper with explicit address-space bases.
    ///
    /// Pass `iova_base: None` to model a device without an IOMMU in front
    /// of it: every mapping then reports no IOVA and consumers fall back to
    /// the physical address.
    pub fn with_bases(iova_base: Option<u64>, phys_base: u64) -> Arc<Self> {
        Arc::new(Self {
            iova_base,
            phys_base,
            next_offset: AtomicU64::new(0),
            live: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Number of attachments currently alive.
    pub fn live_attachments(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Round `len` up to placement granularity.
    fn page_span(len: usize) -> u64 {
        let len = len as u64;
        len.div_ceil(PAGE_SIZE) * PAGE_SIZE
    }
}

impl DmaMapper for LoopbackMapper {
    fn attach(&self, buffer: &BufferHandle) -> Result<Box<dyn DmaAttachment>> {
        let span = Self::page_span(buffer.len().max(1));
        let offset = self.next_offset.fetch_add(span, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(LoopbackAttachment {
            mapping: DmaMapping {
                iova: self.iova_base.map(|base| base + offset),
                phys: self.phys_base + offset,
            },
            mapped: false,
            live: Arc::clone(&self.live),
        }))
    }
}

/// One fabricated attachment.
struct LoopbackAttachment {
    mapping: DmaMapping,
    mapped: bool,
    live: Arc<AtomicUsize>,
}

impl DmaAttachment for LoopbackAttachment {
    fn map(&mut self, _direction: DmaDirection) -> Result<DmaMapping> {
        // Mapping twice hands back the same addresses.
        if !self.mapped {
            self.mapped = true;
        }
        Ok(self.mapping)
    }

    fn unmap(&mut self) {
        self.mapped = false;
    }
}

impl Drop for LoopbackAttachment {
    fn drop(&mut self) {
        // Drop is detach.
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::HeapBuffer;

    fn buffer(size: usize) -> BufferHandle {
        Arc::new(HeapBuffer::new(size).unwrap())
    }

    #[test]
    fn test_addresses_are_page_aligned_and_disjoint() {
        let mapper = LoopbackMapper::new();

        let mut first = mapper.attach(&buffer(100)).unwrap();
        let mut second = mapper.attach(&buffer(5000)).unwrap();

        let a = first.map(DmaDirection::Bidirectional).unwrap();
        let b = second.map(DmaDirection::Bidirectional).unwrap();

        assert_eq!(a.phys % PAGE_SIZE, 0);
        assert_eq!(b.phys % PAGE_SIZE, 0);
        // 100 bytes still occupy one full page.
        assert_eq!(b.phys, a.phys + PAGE_SIZE);
        assert_eq!(a.iova, Some(DEFAULT_IOVA_BASE));
    }

    #[test]
    fn test_no_iommu_mode_reports_no_iova() {
        let mapper = LoopbackMapper::with_bases(None, 0x9000_0000);
        let mut attachment = mapper.attach(&buffer(4096)).unwrap();
        let mapping = attachment.map(DmaDirection::Bidirectional).unwrap();

        assert_eq!(mapping.iova, None);
        assert_eq!(mapping.phys, 0x9000_0000);
    }

    #[test]
    fn test_live_attachment_accounting() {
        let mapper = LoopbackMapper::new();
        assert_eq!(mapper.live_attachments(), 0);

        let first = mapper.attach(&buffer(64)).unwrap();
        let second = mapper.attach(&buffer(64)).unwrap();
        assert_eq!(mapper.live_attachments(), 2);

        drop(first);
        assert_eq!(mapper.live_attachments(), 1);
        drop(second);
        assert_eq!(mapper.live_attachments(), 0);
    }
}
