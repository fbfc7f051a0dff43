//! End-to-end pin lifecycle over the loopback mapper.
//!
//! Walks the full path a real embedder takes: user pins establish the
//! mappings, a submission borrows device addresses for a unit of work, and
//! releases tear everything back down. Run with:
//!
//!   cargo run --example pin_cycle

use pinax::config::RegistryConfig;
use pinax::handle::{BufferHandle, HeapBuffer};
use pinax::heap::SramWindow;
use pinax::loopback::LoopbackMapper;
use pinax::observability::init_metrics;
use pinax::registry::BufferRegistry;
use std::sync::Arc;

fn main() -> pinax::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();
    init_metrics();

    // Park the fabricated physical range inside a small SRAM window so one
    // of the classifications below comes out as on-chip.
    let sram = SramWindow::new(0x8000_0000, 0x2000);
    let registry = BufferRegistry::new(
        LoopbackMapper::new(),
        RegistryConfig::named("demo").with_sram(sram),
    );

    let weights: BufferHandle = Arc::new(HeapBuffer::with_name("weights", 8192)?);
    let activations: BufferHandle = Arc::new(HeapBuffer::with_name("activations", 4096)?);

    println!("== pinning buffers");
    registry.pin(&[weights.clone(), activations.clone()])?;
    println!("registry: {:?}", registry);

    println!("== dispatching a submission");
    let submission = Arc::clone(&registry).submit_pin(&[weights.clone(), activations.clone()])?;
    for (index, slice) in submission.slices().iter().enumerate() {
        println!(
            "  descriptor[{index}]: addr={:#x} size={} heap={:?}",
            slice.device_addr, slice.size, slice.heap
        );
    }

    // User space drops its hold mid-flight; the submission keeps the
    // mappings alive.
    println!("== unpinning while the submission is in flight");
    registry.unpin(&[weights.clone(), activations.clone()]);
    println!("registry: {:?}", registry);

    println!("== completing the submission");
    submission.release();
    println!("registry: {:?}", registry);

    let stats = registry.stats();
    println!(
        "== done: {} mappings created, {} released, {} clamps",
        stats.mappings_created, stats.mappings_released, stats.refcount_clamps
    );
    Ok(())
}
