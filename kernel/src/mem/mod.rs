// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! The demand-paged virtual memory subsystem: physical frame allocation, clock page
//! replacement, and swap-space management.

pub mod address_space;
pub mod allocator;
pub mod block_device;
pub mod fault;
pub mod frame;
pub mod metadata;
pub mod page_table;
pub mod pte;
pub mod stats;
pub mod swap_bitmap;
pub mod swap_engine;

use std::sync::Arc;

use crate::config::NFRAMES;
use block_device::BlockDevice;
use frame::FramePool;
use metadata::LruEngine;
use stats::Stats;
use swap_bitmap::SwapBitmap;
use swap_engine::SwapEngine;

/// Ties the Frame Pool, Swap Bitmap, LRU engine, and Swap Engine together behind one
/// handle, the way the donor kernel's `MemoryManager` singleton ties its own pieces
/// together. Address spaces borrow this to perform map/unmap/fork/exit and fault
/// handling.
pub struct MemorySubsystem {
    swap_engine: SwapEngine,
}

impl MemorySubsystem {
    /// Builds a subsystem over the given swap device, with `kernel_end_frame` frames
    /// already carved out for the kernel image.
    pub fn new(kernel_end_frame: u32, disk: Arc<dyn BlockDevice>) -> MemorySubsystem {
        let frames = Arc::new(FramePool::new_from(kernel_end_frame));
        let bitmap = Arc::new(SwapBitmap::new());
        let lru = Arc::new(LruEngine::new(NFRAMES));
        let stats = Arc::new(Stats::new());
        MemorySubsystem { swap_engine: SwapEngine::new(frames, bitmap, lru, disk, stats) }
    }

    pub fn swap_engine(&self) -> &SwapEngine {
        &self.swap_engine
    }

    pub fn stats(&self) -> &Stats {
        self.swap_engine.stats()
    }
}
