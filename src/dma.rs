//! The DMA mapping backend seam.
//!
//! The registry drives device mappings through two narrow traits:
//! [`DmaMapper`] attaches a buffer to a device, and the resulting
//! [`DmaAttachment`] establishes and tears down the actual mapping.
//! Detach is the attachment's `Drop` — once the box goes away, the device
//! no longer holds the buffer.
//!
//! Real backends wrap an IOMMU domain, a DMA-BUF attachment, or whatever
//! the platform provides; [`LoopbackMapper`](crate::loopback::LoopbackMapper)
//! is an in-process software backend for tests and bring-up.

use crate::error::Result;
use crate::handle::BufferHandle;

/// Device-visible address of a mapped buffer.
///
/// Either an IOVA (when an IOMMU translates for the device) or a raw
/// physical address (no IOMMU, or on-chip SRAM).
pub type DeviceAddress = u64;

/// Direction of device access requested for a mapping.
///
/// The registry always maps bidirectionally; the other variants exist so
/// backends can expose the full contract to other users of the seam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DmaDirection {
    /// Device may both read and write the buffer.
    #[default]
    Bidirectional,
    /// Device only reads the buffer.
    ToDevice,
    /// Device only writes the buffer.
    FromDevice,
}

/// Address pair produced by a successful map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaMapping {
    /// IOMMU-translated device address, when the platform produced one.
    ///
    /// `None` means the device addresses the buffer physically (no IOMMU
    /// in the path).
    pub iova: Option<DeviceAddress>,
    /// Physical address of the mapped range.
    pub phys: u64,
}

/// Trait for DMA-capable device backends.
///
/// A mapper represents the device side of the mapping operation: one
/// instance per device (or per IOMMU domain), shared across all registries
/// that map buffers for it.
pub trait DmaMapper: Send + Sync {
    /// Attach a buffer to the device.
    ///
    /// Attachment reserves backend resources but does not yet establish the
    /// device mapping; call [`DmaAttachment::map`] on the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MappingFailed`](crate::error::Error::MappingFailed)
    /// (attach stage) if the backend rejects the buffer.
    fn attach(&self, buffer: &BufferHandle) -> Result<Box<dyn DmaAttachment>>;
}

/// A live attachment of one buffer to one device.
///
/// The attachment owns the backend state for the buffer's mapping.
/// Dropping it detaches the buffer from the device; callers must `unmap`
/// first if a mapping is still established.
pub trait DmaAttachment: Send {
    /// Establish the device mapping and return its addresses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MappingFailed`](crate::error::Error::MappingFailed)
    /// (map stage) if the backend cannot produce a mapping.
    fn map(&mut self, direction: DmaDirection) -> Result<DmaMapping>;

    /// Tear down the device mapping.
    ///
    /// Idempotent: unmapping an attachment with no live mapping is a no-op.
    fn unmap(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_defaults_bidirectional() {
        assert_eq!(DmaDirection::default(), DmaDirection::Bidirectional);
    }
}
