// SPDX-FileCopyrightText: 2024 bunnie <bunnie@kosagi.com>
// SPDX-License-Identifier: Apache-2.0

//! Swap Engine: orchestrates victim selection, disk I/O, and page-table rewriting for
//! both directions of paging.
//!
//! The donor kernel's own `swap.rs` hands this work off to a userspace swapper
//! process over IPC; this crate folds it back into the kernel as direct calls to a
//! `BlockDevice`, per this subsystem's in-kernel-blocking-I/O design (see DESIGN.md).
//! What is kept from the donor is the shape of the protocol: no spinlock is ever held
//! across a disk transfer, which the donor's own comments around its swap path call
//! out as load-bearing.

use std::sync::Arc;

use crate::config::SLOT_BLOCKS;
use crate::error::{Error, Result};
use crate::klog;
use crate::mem::block_device::BlockDevice;
use crate::mem::frame::{FrameNumber, FramePool};
use crate::mem::metadata::LruEngine;
use crate::mem::page_table::PageTableHandle;
use crate::mem::pte::{Pte, PteFlags};
use crate::mem::stats::Stats;
use crate::mem::swap_bitmap::{SlotNumber, SwapBitmap};

pub struct SwapEngine {
    frames: Arc<FramePool>,
    bitmap: Arc<SwapBitmap>,
    lru: Arc<LruEngine>,
    disk: Arc<dyn BlockDevice>,
    stats: Arc<Stats>,
}

impl SwapEngine {
    pub fn new(
        frames: Arc<FramePool>,
        bitmap: Arc<SwapBitmap>,
        lru: Arc<LruEngine>,
        disk: Arc<dyn BlockDevice>,
        stats: Arc<Stats>,
    ) -> SwapEngine {
        SwapEngine { frames, bitmap, lru, disk, stats }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn lru(&self) -> &LruEngine {
        &self.lru
    }

    pub fn bitmap(&self) -> &SwapBitmap {
        &self.bitmap
    }

    pub fn frames(&self) -> &FramePool {
        &self.frames
    }

    /// Evicts one resident frame to swap, returning it to the Frame Pool's free-list.
    /// Returns `Err(Error::OutOfMemory)` if there is nothing left to evict or the swap
    /// device is full.
    pub fn reclaim_one(&self) -> Result<FrameNumber> {
        // Steps 1-4: acquire the LRU lock, run the clock scan, reserve the victim's
        // swap slot, and only then excise it from the list — all under the same
        // lock, via the `reserve` callback `pick_and_excise_victim` invokes once it
        // has a candidate. If the bitmap is full, the callback returns `None` and the
        // candidate is left exactly where the scan found it: nothing has been
        // mutated, so there is nothing to revert.
        let (frame, page_table, vaddr, slot) = match self.lru.pick_and_excise_victim(|| self.bitmap.reserve_slot()) {
            Some(v) => v,
            None => return Err(Error::OutOfMemory),
        };

        klog!("swap: evicting frame {} (vaddr {:#x}) to slot {}", frame, vaddr, slot);

        // Steps 5-6: LRU lock is already released; write the page out. No lock is
        // held across this call.
        if let Err(e) = self.write_frame_to_slot(&page_table, vaddr, slot) {
            // Safer reversion policy: release the slot, leave the PTE untouched, and
            // give the victim back its place in the LRU rather than losing it.
            self.bitmap.release_slot(slot);
            self.lru.insert(frame, page_table, vaddr);
            return Err(e);
        }
        self.stats.record_write();

        // Step 7: rewrite the PTE to point at the swap slot, preserving permission
        // bits, then flush the TLB for this address.
        let old = Pte::decode(page_table.read_pte(vaddr));
        let flags = (old.flags() | PteFlags::SWAPPED) & !PteFlags::VALID & !PteFlags::ACCESS;
        let new_pte = Pte::Swapped { slot, flags };
        page_table.write_pte(vaddr, new_pte.encode());
        page_table.flush_tlb(vaddr);

        // Step 8: the frame is now free.
        self.frames.give_back(frame);
        Ok(frame)
    }

    /// Resolves a fault on a PTE already known to be `Swapped`, installing a fresh
    /// resident mapping. Callers (the fault handler hook) are responsible for
    /// verifying the PTE is in fact swapped before calling this.
    pub fn swap_in(&self, page_table: &PageTableHandle, vaddr: u32) -> Result<()> {
        let pte = Pte::decode(page_table.read_pte(vaddr));
        let (slot, flags) = match pte {
            Pte::Swapped { slot, flags } => (slot, flags),
            _ => panic!("swap_in called on a PTE that is not Swapped"),
        };

        let frame = self.alloc_frame()?;

        klog!("swap: faulting in vaddr {:#x} from slot {} into frame {}", vaddr, slot, frame);

        if let Err(e) = self.read_slot_into(slot, page_table, vaddr) {
            self.frames.give_back(frame);
            return Err(e);
        }
        self.stats.record_read();

        self.bitmap.release_slot(slot);

        let new_flags = (flags | PteFlags::VALID | PteFlags::ACCESS) & !PteFlags::SWAPPED;
        let new_pte = Pte::Resident { frame, flags: new_flags };
        page_table.write_pte(vaddr, new_pte.encode());
        page_table.flush_tlb(vaddr);

        self.lru.insert(frame, page_table.clone(), vaddr);
        Ok(())
    }

    /// Allocates a frame, recursing into `reclaim_one` if the pool is empty. This is
    /// the front this crate's allocator and `swap_in` both call through.
    pub fn alloc_frame(&self) -> Result<FrameNumber> {
        if let Some(frame) = self.frames.take() {
            return Ok(frame);
        }
        self.reclaim_one()
    }

    /// Copies one swap slot's contents directly to another, without materializing a
    /// frame in between. Used by fork of a swapped page, which gives the child its
    /// own independent slot rather than paging the content into RAM.
    pub fn copy_slot(&self, src: SlotNumber, dst: SlotNumber) -> Result<()> {
        let base_src = Self::slot_to_block(src);
        let base_dst = Self::slot_to_block(dst);
        for i in 0..SLOT_BLOCKS as u32 {
            let mut buf = [0u8; crate::config::BLOCKSIZE];
            self.disk.read_block(base_src + i, &mut buf)?;
            self.disk.write_block(base_dst + i, &buf)?;
        }
        Ok(())
    }

    fn slot_to_block(slot: SlotNumber) -> u32 {
        slot * SLOT_BLOCKS as u32
    }

    fn write_frame_to_slot(&self, page_table: &PageTableHandle, vaddr: u32, slot: SlotNumber) -> Result<()> {
        let page = page_table.read_page(vaddr);
        let base = Self::slot_to_block(slot);
        for (i, block) in page.chunks(crate::config::BLOCKSIZE).enumerate() {
            let mut buf = [0u8; crate::config::BLOCKSIZE];
            buf.copy_from_slice(block);
            self.disk.write_block(base + i as u32, &buf)?;
        }
        Ok(())
    }

    /// Reads one swap slot's contents into the page backing `vaddr` in `page_table`,
    /// without touching the PTE. Used by `swap_in` to fill a just-allocated frame,
    /// and by fork of a swapped parent page to materialize its content directly into
    /// a child frame.
    pub fn read_slot_into(&self, slot: SlotNumber, page_table: &PageTableHandle, vaddr: u32) -> Result<()> {
        let base = Self::slot_to_block(slot);
        let mut page = vec![0u8; crate::config::PAGE_SIZE];
        for (i, chunk) in page.chunks_mut(crate::config::BLOCKSIZE).enumerate() {
            let mut buf = [0u8; crate::config::BLOCKSIZE];
            self.disk.read_block(base + i as u32, &mut buf)?;
            chunk.copy_from_slice(&buf);
        }
        page_table.write_page(vaddr, &page);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NFRAMES;
    use crate::mem::block_device::RamDisk;
    use crate::mem::page_table::TestPageTable;

    fn new_engine(disk: Arc<dyn BlockDevice>) -> SwapEngine {
        SwapEngine::new(
            Arc::new(FramePool::new_from(NFRAMES as u32 - 4)),
            Arc::new(SwapBitmap::new()),
            Arc::new(LruEngine::new(NFRAMES)),
            disk,
            Arc::new(Stats::new()),
        )
    }

    #[test]
    fn swap_out_then_swap_in_preserves_content() {
        let disk = Arc::new(RamDisk::new(64));
        let engine = new_engine(disk);
        let pt = TestPageTable::new();

        let frame = engine.alloc_frame().unwrap();
        pt.write_page(0x4000, &vec![0x42u8; crate::config::PAGE_SIZE]);
        let pte = Pte::Resident { frame, flags: PteFlags::VALID | PteFlags::READ | PteFlags::WRITE };
        pt.write_pte(0x4000, pte.encode());
        engine.lru().insert(frame, pt.clone(), 0x4000);

        let evicted = engine.reclaim_one().unwrap();
        assert_eq!(evicted, frame);
        assert!(Pte::decode(pt.read_pte(0x4000)).is_swapped());
        assert_eq!(engine.stats().swap_writes(), 1);

        let handle: PageTableHandle = pt.clone();
        engine.swap_in(&handle, 0x4000).unwrap();
        assert!(Pte::decode(pt.read_pte(0x4000)).is_resident());
        assert_eq!(engine.stats().swap_reads(), 1);
        assert_eq!(pt.read_page(0x4000), vec![0x42u8; crate::config::PAGE_SIZE]);
    }

    #[test]
    fn failed_write_reverts_victim_to_lru() {
        let disk = Arc::new(RamDisk::new_flaky(64, 1));
        let engine = new_engine(disk);
        let pt = TestPageTable::new();

        let frame = engine.alloc_frame().unwrap();
        let pte = Pte::Resident { frame, flags: PteFlags::VALID };
        pt.write_pte(0x5000, pte.encode());
        engine.lru().insert(frame, pt.clone(), 0x5000);

        let result = engine.reclaim_one();
        assert!(result.is_err());
        assert!(Pte::decode(pt.read_pte(0x5000)).is_resident(), "PTE must be untouched on failure");
        assert!(engine.lru().is_linked(frame), "victim must be reinserted on failure");
        assert_eq!(engine.bitmap().used_count(), 0, "reserved slot must be released on failure");
    }

    #[test]
    fn reclaim_on_empty_lru_is_oom() {
        let disk = Arc::new(RamDisk::new(4));
        let engine = new_engine(disk);
        assert_eq!(engine.reclaim_one().unwrap_err(), Error::OutOfMemory);
    }
}
