//! The buffer registry: at most one DMA mapping per buffer identity, pinned
//! under two independent lifetimes.
//!
//! # Design
//!
//! - One mapping record per distinct buffer identity. The first user pin
//!   creates the record (attach + map + heap classification); the last
//!   release of either pin class tears it down (unmap + detach + drop of
//!   the registry's handle reference).
//! - Two pin classes: **user pins** ([`BufferRegistry::pin`]) held on behalf
//!   of a user-facing control surface, and **submit pins**
//!   ([`BufferRegistry::submit_pin`]) held for in-flight units of hardware
//!   work. Submissions never create mappings; they only extend ones the
//!   user path already established.
//! - One mutex serializes every mutation and is held for the whole batch
//!   scan. Coarse, but no interleaved partial mutation of the index is ever
//!   observable, and a failed batch can roll back its processed prefix
//!   atomically.
//! - Refcount decrements saturate at zero. Over-unpinning is logged and
//!   counted, never an error, so cleanup paths can always run.
//!
//! # Example
//!
//! ```rust
//! use pinax::handle::{BufferHandle, HeapBuffer};
//! use pinax::loopback::LoopbackMapper;
//! use pinax::registry::BufferRegistry;
//! use std::sync::Arc;
//!
//! let registry = BufferRegistry::with_mapper(LoopbackMapper::new());
//!
//! let buffer: BufferHandle = Arc::new(HeapBuffer::new(4096).unwrap());
//! registry.pin(&[buffer.clone()]).unwrap();
//!
//! // Dispatch a unit of work referencing the buffer.
//! let submission = Arc::clone(&registry).submit_pin(&[buffer.clone()]).unwrap();
//! let slice = submission.slices()[0];
//! assert_eq!(slice.size, 4096);
//!
//! // Hardware signalled completion: dropping the guard releases the
//! // submit pin.
//! drop(submission);
//! registry.unpin(&[buffer]);
//! assert!(registry.is_empty());
//! ```

use crate::config::RegistryConfig;
use crate::dma::{DeviceAddress, DmaAttachment, DmaMapper};
use crate::error::{Error, Result};
use crate::handle::{BufferHandle, HandleId};
use crate::heap::MemoryHeap;
use crate::observability::RegistryMetrics;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};

/// Device placement of one pinned buffer, as handed to submissions.
///
/// Everything a caller needs to reference the buffer in a hardware command
/// descriptor. All fields are fixed at mapping-creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaSlice {
    /// Address the device uses to reach the buffer (IOVA, or physical for
    /// on-chip SRAM and IOMMU-less platforms).
    pub device_addr: DeviceAddress,
    /// Byte length of the mapping.
    pub size: usize,
    /// Heap the mapping resolved into.
    pub heap: MemoryHeap,
}

/// One registered buffer: its live mapping plus the two pin counts.
struct MappingRecord {
    /// The registry's single owned reference to the external buffer.
    /// Held exactly as long as the record exists, no matter how many pins
    /// are stacked on the record.
    buffer: BufferHandle,
    /// Live device attachment; dropped (= detached) on release.
    attachment: Box<dyn DmaAttachment>,
    device_addr: DeviceAddress,
    size: usize,
    heap: MemoryHeap,
    /// User-path pins. Saturates at zero on decrement.
    user_refs: u32,
    /// Submission-path pins. Saturates at zero on decrement.
    submit_refs: u32,
}

impl MappingRecord {
    fn slice(&self) -> DmaSlice {
        DmaSlice {
            device_addr: self.device_addr,
            size: self.size,
            heap: self.heap,
        }
    }
}

/// Mutable registry state, behind the lock.
#[derive(Default)]
struct RegistryInner {
    /// Ordered index by buffer identity.
    records: BTreeMap<HandleId, MappingRecord>,
    /// Insertion-ordered traversal sequence; `release_all` sweeps it so
    /// teardown observes buffers in the order they first appeared.
    order: Vec<HandleId>,
    /// Cumulative mappings established.
    created: u64,
    /// Cumulative mappings torn down.
    released: u64,
    /// Cumulative underflowing decrements clamped to zero.
    clamps: u64,
}

/// Counter snapshot from [`BufferRegistry::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Live mapping records.
    pub records: usize,
    /// Sum of user pins across live records.
    pub user_refs: u64,
    /// Sum of submit pins across live records.
    pub submit_refs: u64,
    /// Cumulative mappings established.
    pub mappings_created: u64,
    /// Cumulative mappings torn down.
    pub mappings_released: u64,
    /// Cumulative underflowing decrements clamped to zero.
    pub refcount_clamps: u64,
}

/// A reference-counted registry of DMA-mapped buffers.
///
/// Created once per consumer context (an accelerator channel, a device
/// file handle) and shared as an `Arc`. See the [module docs](self) for the
/// lifetime model.
pub struct BufferRegistry {
    mapper: Arc<dyn DmaMapper>,
    config: RegistryConfig,
    metrics: RegistryMetrics,
    inner: Mutex<RegistryInner>,
}

impl BufferRegistry {
    /// Create a registry driving mappings through `mapper`.
    pub fn new(mapper: Arc<dyn DmaMapper>, config: RegistryConfig) -> Arc<Self> {
        let metrics = RegistryMetrics::new(&config.name);
        Arc::new(Self {
            mapper,
            config,
            metrics,
            inner: Mutex::new(RegistryInner::default()),
        })
    }

    /// Create a registry with the default configuration.
    pub fn with_mapper(mapper: Arc<dyn DmaMapper>) -> Arc<Self> {
        Self::new(mapper, RegistryConfig::default())
    }

    /// The registry's configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Pin a batch of buffers on the user path.
    ///
    /// Already-registered buffers get their user count incremented; new ones
    /// get a record created: one handle reference acquired, the buffer
    /// attached and mapped, the heap classified against the configured SRAM
    /// window, and the device address chosen (IOVA preferred; physical when
    /// the platform produced none or the heap is on-chip SRAM).
    ///
    /// All-or-nothing: if any buffer fails, every buffer processed earlier
    /// in this call is unpinned again before the error returns, so the
    /// registry is left in its pre-call state.
    ///
    /// # Errors
    ///
    /// [`Error::AllocationFailed`] for unmappable (zero-length) buffers,
    /// [`Error::MappingFailed`] when the DMA backend rejects one.
    pub fn pin(&self, handles: &[BufferHandle]) -> Result<()> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        for (idx, handle) in handles.iter().enumerate() {
            if let Err(err) = self.pin_one(inner, handle) {
                // Reverse exactly the processed prefix, in order.
                for processed in &handles[..idx] {
                    self.unpin_one(inner, processed);
                }
                self.metrics.record_batch_rollback();
                return Err(err);
            }
        }
        Ok(())
    }

    /// Release user pins on a batch of buffers.
    ///
    /// Decrements each buffer's user count (saturating at zero) and tears
    /// the mapping down once both pin classes are released. Buffers with no
    /// record are skipped — unpinning an unknown or already-released buffer
    /// is a no-op, so this is safe to call from any cleanup path.
    pub fn unpin(&self, handles: &[BufferHandle]) {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        for handle in handles {
            self.unpin_one(inner, handle);
        }
    }

    /// Pin a batch of buffers for a unit of hardware work.
    ///
    /// Every buffer must already be user-pinned; submissions never create
    /// mappings. On success the returned [`SubmitGuard`] carries one
    /// [`DmaSlice`] per buffer, in input order, for the caller to program
    /// into its command descriptor.
    ///
    /// The `Arc` receiver is deliberate: the clone moved into the guard is
    /// the registry-wide reference that keeps the registry alive until the
    /// submission completes, even if the owning context tears down in
    /// between. Call as `Arc::clone(&registry).submit_pin(..)`.
    ///
    /// All-or-nothing: on failure the processed prefix is reversed and the
    /// registry reference dropped before the error returns.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownHandle`] if any buffer has no live record.
    pub fn submit_pin(self: Arc<Self>, handles: &[BufferHandle]) -> Result<SubmitGuard> {
        let mut slices = SmallVec::new();
        {
            let mut guard = self.inner.lock().unwrap();
            let inner = &mut *guard;

            for (idx, handle) in handles.iter().enumerate() {
                match self.submit_pin_one(inner, handle) {
                    Ok(slice) => slices.push(slice),
                    Err(err) => {
                        for processed in &handles[..idx] {
                            self.submit_unpin_one(inner, processed);
                        }
                        self.metrics.record_batch_rollback();
                        return Err(err);
                    }
                }
            }
        }
        self.metrics.record_submit_pins(handles.len());

        Ok(SubmitGuard {
            handles: handles.iter().map(Arc::clone).collect(),
            slices,
            released: false,
            registry: self,
        })
    }

    /// Release submit pins on a batch of buffers.
    ///
    /// The manual counterpart of dropping a [`SubmitGuard`], for embedders
    /// that track submission lifetimes themselves. Same forgiveness as
    /// [`unpin`](Self::unpin): saturating decrements, unknown buffers
    /// skipped, never an error.
    pub fn submit_unpin(&self, handles: &[BufferHandle]) {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        for handle in handles {
            self.submit_unpin_one(inner, handle);
        }
        drop(guard);
        self.metrics.record_submit_unpins(handles.len());
    }

    /// Look up the device address of a registered buffer.
    ///
    /// Read-only: no reference counts change. Returns `None` for buffers
    /// with no live record.
    pub fn device_address(&self, handle: &BufferHandle) -> Option<DeviceAddress> {
        let guard = self.inner.lock().unwrap();
        guard
            .records
            .get(&HandleId::of(handle))
            .map(|record| record.device_addr)
    }

    /// Does the registry currently hold a mapping for this buffer?
    pub fn contains(&self, handle: &BufferHandle) -> bool {
        let guard = self.inner.lock().unwrap();
        guard.records.contains_key(&HandleId::of(handle))
    }

    /// Number of live mapping records.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    /// Returns true if no buffers are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the registry's counters.
    pub fn stats(&self) -> RegistryStats {
        let guard = self.inner.lock().unwrap();
        let (user_refs, submit_refs) = guard
            .records
            .values()
            .fold((0u64, 0u64), |(users, submits), record| {
                (
                    users + u64::from(record.user_refs),
                    submits + u64::from(record.submit_refs),
                )
            });

        RegistryStats {
            records: guard.records.len(),
            user_refs,
            submit_refs,
            mappings_created: guard.created,
            mappings_released: guard.released,
            refcount_clamps: guard.clamps,
        }
    }

    /// Tear down every remaining mapping at context teardown.
    ///
    /// Sweeps records in insertion order, forcing the user count to zero and
    /// releasing regardless of outstanding submit pins. The caller contract
    /// is that no submissions are in flight; if one still is, its mapping is
    /// torn down anyway (with a warning) and the eventual guard drop is
    /// absorbed by the saturating decrement.
    ///
    /// The registry struct itself is freed when the last `Arc` — including
    /// any held by in-flight [`SubmitGuard`]s — goes away.
    pub fn release_all(&self) {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        let ids: Vec<HandleId> = inner.order.clone();
        for id in ids {
            let Some(record) = inner.records.get_mut(&id) else {
                continue;
            };
            if record.submit_refs > 0 {
                warn!(
                    registry = %self.config.name,
                    handle = ?id,
                    submit_refs = record.submit_refs,
                    "forcing release of submit-referenced mapping"
                );
                record.submit_refs = 0;
            }
            record.user_refs = 0;
            self.try_release(inner, id);
        }
    }

    /// Pin one buffer on the user path: increment, or create the record.
    fn pin_one(&self, inner: &mut RegistryInner, handle: &BufferHandle) -> Result<()> {
        let id = HandleId::of(handle);

        if let Some(record) = inner.records.get_mut(&id) {
            record.user_refs += 1;
            trace!(
                registry = %self.config.name,
                handle = ?id,
                user_refs = record.user_refs,
                "user pin"
            );
            self.metrics.record_user_pin();
            return Ok(());
        }

        let record = self.create_record(handle)?;
        debug!(
            registry = %self.config.name,
            handle = ?id,
            buffer = handle.name().unwrap_or("<unnamed>"),
            device_addr = record.device_addr,
            size = record.size,
            heap = ?record.heap,
            "mapping created"
        );
        inner.records.insert(id, record);
        inner.order.push(id);
        inner.created += 1;
        self.metrics.record_user_pin();
        self.metrics.record_mapping_created(inner.records.len());
        Ok(())
    }

    /// Attach, map, and classify one new buffer.
    fn create_record(&self, handle: &BufferHandle) -> Result<MappingRecord> {
        let size = handle.len();
        if size == 0 {
            return Err(Error::AllocationFailed(
                "cannot map a zero-length buffer".into(),
            ));
        }

        let mut attachment = self.mapper.attach(handle)?;
        let mapping = match attachment.map(self.config.direction) {
            Ok(mapping) => mapping,
            Err(err) => {
                // Attach succeeded but map did not; dropping the attachment
                // detaches before the error propagates.
                drop(attachment);
                return Err(err);
            }
        };

        let heap = self.config.sram.classify(mapping.phys);
        let device_addr = match mapping.iova {
            Some(iova) if !heap.prefers_physical_address() => iova,
            _ => mapping.phys,
        };

        Ok(MappingRecord {
            buffer: Arc::clone(handle),
            attachment,
            device_addr,
            size,
            heap,
            user_refs: 1,
            submit_refs: 0,
        })
    }

    /// Release one user pin, tearing the mapping down at zero/zero.
    fn unpin_one(&self, inner: &mut RegistryInner, handle: &BufferHandle) {
        let id = HandleId::of(handle);
        let Some(record) = inner.records.get_mut(&id) else {
            trace!(
                registry = %self.config.name,
                handle = ?id,
                "unpin of unregistered buffer skipped"
            );
            return;
        };

        if record.user_refs == 0 {
            warn!(
                registry = %self.config.name,
                handle = ?id,
                "user refcount underflow clamped"
            );
            inner.clamps += 1;
            self.metrics.record_refcount_clamp();
        } else {
            record.user_refs -= 1;
            trace!(
                registry = %self.config.name,
                handle = ?id,
                user_refs = record.user_refs,
                "user unpin"
            );
        }
        self.metrics.record_user_unpin();
        self.try_release(inner, id);
    }

    /// Take one submit pin on an existing record.
    fn submit_pin_one(&self, inner: &mut RegistryInner, handle: &BufferHandle) -> Result<DmaSlice> {
        let id = HandleId::of(handle);
        let Some(record) = inner.records.get_mut(&id) else {
            warn!(
                registry = %self.config.name,
                handle = ?id,
                "submission references a buffer with no user pin"
            );
            return Err(Error::UnknownHandle);
        };

        record.submit_refs += 1;
        trace!(
            registry = %self.config.name,
            handle = ?id,
            submit_refs = record.submit_refs,
            "submit pin"
        );
        Ok(record.slice())
    }

    /// Release one submit pin, tearing the mapping down at zero/zero.
    fn submit_unpin_one(&self, inner: &mut RegistryInner, handle: &BufferHandle) {
        let id = HandleId::of(handle);
        let Some(record) = inner.records.get_mut(&id) else {
            trace!(
                registry = %self.config.name,
                handle = ?id,
                "submit unpin of unregistered buffer skipped"
            );
            return;
        };

        if record.submit_refs == 0 {
            warn!(
                registry = %self.config.name,
                handle = ?id,
                "submit refcount underflow clamped"
            );
            inner.clamps += 1;
            self.metrics.record_refcount_clamp();
        } else {
            record.submit_refs -= 1;
            trace!(
                registry = %self.config.name,
                handle = ?id,
                submit_refs = record.submit_refs,
                "submit unpin"
            );
        }
        self.try_release(inner, id);
    }

    /// Tear the mapping down if both pin classes have fully released it.
    fn try_release(&self, inner: &mut RegistryInner, id: HandleId) {
        match inner.records.get(&id) {
            Some(record) if record.user_refs == 0 && record.submit_refs == 0 => {}
            _ => return,
        }

        if let Some(mut record) = inner.records.remove(&id) {
            inner.order.retain(|entry| *entry != id);
            record.attachment.unmap();
            debug!(
                registry = %self.config.name,
                handle = ?id,
                buffer = record.buffer.name().unwrap_or("<unnamed>"),
                device_addr = record.device_addr,
                heap = ?record.heap,
                "mapping released"
            );
            // Dropping the record detaches the attachment and releases the
            // registry's reference to the buffer handle.
            drop(record);
            inner.released += 1;
            self.metrics.record_mapping_released(inner.records.len());
        }
    }
}

impl fmt::Debug for BufferRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("BufferRegistry")
            .field("name", &self.config.name)
            .field("records", &stats.records)
            .field("user_refs", &stats.user_refs)
            .field("submit_refs", &stats.submit_refs)
            .finish()
    }
}

/// RAII guard over one submission's pinned buffers.
///
/// Returned by [`BufferRegistry::submit_pin`]. Holds the submission's
/// [`DmaSlice`]s and one shared-ownership reference to the registry, so the
/// registry outlives every in-flight submission even if its owning context
/// is torn down in between.
///
/// Dropping the guard (or calling [`release`](Self::release)) releases the
/// submit pins and then the registry reference.
pub struct SubmitGuard {
    handles: SmallVec<[BufferHandle; 4]>,
    slices: SmallVec<[DmaSlice; 4]>,
    released: bool,
    // Declared last: the registry-wide reference is released only after the
    // pins have been processed.
    registry: Arc<BufferRegistry>,
}

impl SubmitGuard {
    /// Per-buffer device placement, in the order the buffers were submitted.
    pub fn slices(&self) -> &[DmaSlice] {
        &self.slices
    }

    /// Number of buffers in the submission.
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// Returns true if the submission referenced no buffers.
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Release the submission's pins now.
    ///
    /// Equivalent to dropping the guard; exists so call sites can make the
    /// completion point explicit.
    pub fn release(self) {
        // Drop does the work.
    }

    fn release_pins(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.submit_unpin(&self.handles);
        }
    }
}

impl Drop for SubmitGuard {
    fn drop(&mut self) {
        self.release_pins();
    }
}

impl fmt::Debug for SubmitGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitGuard")
            .field("buffers", &self.slices.len())
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dma::{DmaDirection, DmaMapping};
    use crate::handle::HeapBuffer;
    use crate::heap::SramWindow;
    use crate::loopback::LoopbackMapper;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn buffer(size: usize) -> BufferHandle {
        Arc::new(HeapBuffer::new(size).unwrap())
    }

    /// Mapper that succeeds for the first `ok` new mappings, then fails the
    /// map step of every later one.
    struct FailingMapper {
        inner: Arc<LoopbackMapper>,
        ok: usize,
        attaches: AtomicUsize,
    }

    impl FailingMapper {
        fn after(ok: usize) -> Arc<Self> {
            Arc::new(Self {
                inner: LoopbackMapper::new(),
                ok,
                attaches: AtomicUsize::new(0),
            })
        }
    }

    impl DmaMapper for FailingMapper {
        fn attach(&self, buffer: &BufferHandle) -> Result<Box<dyn DmaAttachment>> {
            if self.attaches.fetch_add(1, Ordering::SeqCst) >= self.ok {
                return Ok(Box::new(BrokenAttachment));
            }
            self.inner.attach(buffer)
        }
    }

    /// Attachment whose map step always fails.
    struct BrokenAttachment;

    impl DmaAttachment for BrokenAttachment {
        fn map(&mut self, _direction: DmaDirection) -> Result<DmaMapping> {
            Err(Error::map_failed("injected map failure"))
        }

        fn unmap(&mut self) {}
    }

    #[test]
    fn test_pin_creates_then_increments() {
        let registry = BufferRegistry::with_mapper(LoopbackMapper::new());
        let a = buffer(4096);

        registry.pin(&[a.clone()]).unwrap();
        registry.pin(&[a.clone()]).unwrap();

        let stats = registry.stats();
        assert_eq!(stats.records, 1);
        assert_eq!(stats.user_refs, 2);
        assert_eq!(stats.mappings_created, 1);
    }

    #[test]
    fn test_zero_length_buffer_is_rejected() {
        struct Empty;
        impl crate::handle::SharedBuffer for Empty {
            fn len(&self) -> usize {
                0
            }
        }

        let registry = BufferRegistry::with_mapper(LoopbackMapper::new());
        let empty: BufferHandle = Arc::new(Empty);

        let err = registry.pin(&[empty]).unwrap_err();
        assert!(matches!(err, Error::AllocationFailed(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_map_failure_rolls_back_prefix() {
        let mapper = FailingMapper::after(1);
        let registry = BufferRegistry::with_mapper(mapper.clone());
        let a = buffer(4096);
        let b = buffer(4096);

        let err = registry.pin(&[a, b]).unwrap_err();
        assert!(matches!(err, Error::MappingFailed { .. }));

        // The first buffer was mapped, then unwound by the rollback.
        assert!(registry.is_empty());
        assert_eq!(mapper.inner.live_attachments(), 0);
    }

    #[test]
    fn test_device_address_prefers_iova_for_dram() {
        let registry = BufferRegistry::with_mapper(LoopbackMapper::new());
        let a = buffer(4096);

        registry.pin(&[a.clone()]).unwrap();

        // Default loopback bases: first IOVA 0x1000_0000, first phys 0x8000_0000.
        assert_eq!(registry.device_address(&a), Some(0x1000_0000));
    }

    #[test]
    fn test_device_address_falls_back_to_phys_without_iommu() {
        let registry = BufferRegistry::with_mapper(LoopbackMapper::with_bases(None, 0x9000_0000));
        let a = buffer(4096);

        registry.pin(&[a.clone()]).unwrap();
        assert_eq!(registry.device_address(&a), Some(0x9000_0000));
    }

    #[test]
    fn test_sram_mapping_uses_physical_address() {
        let sram = SramWindow::new(0x4000_0000, 0x10_0000);
        let mapper = LoopbackMapper::with_bases(Some(0x1000_0000), 0x4000_0000);
        let registry = BufferRegistry::new(
            mapper,
            RegistryConfig::named("sram-test").with_sram(sram),
        );
        let a = buffer(4096);

        registry.pin(&[a.clone()]).unwrap();

        // Physical lands in the window, so the IOVA is ignored.
        assert_eq!(registry.device_address(&a), Some(0x4000_0000));
        let guard = Arc::clone(&registry).submit_pin(&[a]).unwrap();
        assert_eq!(guard.slices()[0].heap, MemoryHeap::OnChipSram);
    }

    #[test]
    fn test_submit_guard_drop_releases_pins() {
        let registry = BufferRegistry::with_mapper(LoopbackMapper::new());
        let a = buffer(4096);

        registry.pin(&[a.clone()]).unwrap();
        let guard = Arc::clone(&registry).submit_pin(&[a.clone()]).unwrap();
        assert_eq!(registry.stats().submit_refs, 1);

        drop(guard);
        assert_eq!(registry.stats().submit_refs, 0);
        assert!(registry.contains(&a)); // user pin still holds it
    }

    #[test]
    fn test_release_all_forces_teardown() {
        let mapper = LoopbackMapper::new();
        let registry = BufferRegistry::with_mapper(mapper.clone());
        let a = buffer(4096);
        let b = buffer(8192);

        registry.pin(&[a.clone(), b]).unwrap();
        registry.pin(&[a.clone()]).unwrap();
        let guard = Arc::clone(&registry).submit_pin(&[a]).unwrap();

        registry.release_all();
        assert!(registry.is_empty());
        assert_eq!(mapper.live_attachments(), 0);

        // The stale guard's release is absorbed by the clamp.
        drop(guard);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unpin_underflow_is_clamped_and_counted() {
        let registry = BufferRegistry::with_mapper(LoopbackMapper::new());
        let a = buffer(4096);

        registry.pin(&[a.clone()]).unwrap();
        let guard = Arc::clone(&registry).submit_pin(&[a.clone()]).unwrap();

        registry.unpin(&[a.clone()]);
        registry.unpin(&[a.clone()]); // user count already zero
        assert_eq!(registry.stats().refcount_clamps, 1);
        assert!(registry.contains(&a)); // submit pin still holds the record

        drop(guard);
        assert!(registry.is_empty());
    }
}
