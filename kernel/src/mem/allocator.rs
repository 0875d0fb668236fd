// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! Allocator Front: the public alloc/free surface other kernel subsystems call,
//! wrapping the Frame Pool and transparently reclaiming via the Swap Engine on
//! exhaustion.
//!
//! Grounded on the donor kernel's `MemoryManager::alloc_page_oomable`, which has the
//! same "try the free-list, then reclaim" shape.

use crate::error::Result;
use crate::mem::frame::FrameNumber;
use crate::mem::swap_engine::SwapEngine;

/// Allocates one physical frame, swapping out a victim page if the free-list is
/// empty. The returned frame is not yet tracked by the LRU; callers that are about
/// to hand it to a user mapping must call `AddressSpace::on_map` once the PTE is
/// written.
pub fn alloc_frame(engine: &SwapEngine) -> Result<FrameNumber> {
    engine.alloc_frame()
}

/// Returns a frame to the Frame Pool. The caller must have already unlinked it from
/// the LRU (via `AddressSpace::on_unmap_range` or an explicit `lru().unlink`) if it
/// was ever inserted; this function does not check.
pub fn free_frame(engine: &SwapEngine, frame: FrameNumber) {
    engine.frames().give_back(frame);
}
