// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! Address-space lifecycle hooks: map, unmap, fork, and exit.
//!
//! Grounded on the donor kernel's `mem.rs` family of per-process memory operations
//! (`release_all_memory_for_process`, `move_page`, `lend_page`), reworked here to
//! handle the swapped-PTE case the donor's own simpler resident-only release path
//! does not need to consider.

use crate::error::Result;
use crate::mem::allocator;
use crate::mem::pte::Pte;
use crate::mem::swap_engine::SwapEngine;
use crate::mem::page_table::PageTableHandle;

/// One process's view onto the memory subsystem: just its page table. All shared
/// state (frames, LRU, bitmap, disk) lives in the `SwapEngine` passed to every call.
pub struct AddressSpace {
    page_table: PageTableHandle,
}

impl AddressSpace {
    pub fn new(page_table: PageTableHandle) -> AddressSpace {
        AddressSpace { page_table }
    }

    pub fn page_table(&self) -> &PageTableHandle {
        &self.page_table
    }

    /// Registers a newly established resident mapping with the LRU so it becomes
    /// evictable. Callers are expected to have already written the PTE themselves
    /// (mirroring the donor's division between establishing a mapping and tracking
    /// it for reclamation).
    pub fn on_map(&self, engine: &SwapEngine, vaddr: u32, frame: crate::mem::frame::FrameNumber) {
        engine.lru().insert(frame, self.page_table.clone(), vaddr);
    }

    /// Unmaps every virtual address in `vaddrs`, releasing whatever resource (frame
    /// or swap slot) backs each one and clearing its PTE.
    pub fn on_unmap_range(&self, engine: &SwapEngine, vaddrs: &[u32]) {
        for &vaddr in vaddrs {
            let pte = Pte::decode(self.page_table.read_pte(vaddr));
            match pte {
                Pte::Resident { frame, .. } => {
                    engine.lru().unlink(frame);
                    allocator::free_frame(engine, frame);
                }
                Pte::Swapped { slot, .. } => {
                    engine.bitmap().release_slot(slot);
                }
                Pte::Unmapped => continue,
            }
            self.page_table.write_pte(vaddr, Pte::Unmapped.encode());
            self.page_table.flush_tlb(vaddr);
        }
    }

    /// Unmaps every currently mapped virtual address in this address space.
    pub fn on_unmap_all(&self, engine: &SwapEngine) {
        let vaddrs = self.page_table.mapped_vaddrs();
        self.on_unmap_range(engine, &vaddrs);
    }

    /// Copies every mapped page from `self` (the parent) into `child`.
    ///
    /// - A resident page gets the child a freshly allocated frame with the content
    ///   copied in, inserted into the LRU as its own evictable mapping.
    /// - A swapped page gets the child a freshly allocated frame with the parent's
    ///   slot contents read directly into it, installed as a resident PTE and
    ///   inserted into the LRU; the parent's own slot is left reserved and untouched.
    ///   A child page born from a swapped parent page is therefore always resident
    ///   immediately after fork, rather than staying swapped until something faults
    ///   it in — the simpler of the two designs, at the cost of materializing pages
    ///   into RAM that fork alone would not otherwise have touched.
    ///
    /// If any step fails partway through, everything copied into the child so far is
    /// torn down via `on_unmap_range` before the error is returned.
    pub fn on_fork_copy(&self, engine: &SwapEngine, child: &AddressSpace) -> Result<()> {
        let vaddrs = self.page_table.mapped_vaddrs();
        let mut copied = Vec::with_capacity(vaddrs.len());

        for vaddr in vaddrs {
            let pte = Pte::decode(self.page_table.read_pte(vaddr));
            let result = match pte {
                Pte::Resident { flags, .. } => self.fork_resident(engine, child, vaddr, flags),
                Pte::Swapped { slot, flags } => self.fork_swapped(engine, child, vaddr, slot, flags),
                Pte::Unmapped => Ok(()),
            };
            match result {
                Ok(()) => copied.push(vaddr),
                Err(e) => {
                    child.on_unmap_range(engine, &copied);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn fork_resident(
        &self,
        engine: &SwapEngine,
        child: &AddressSpace,
        vaddr: u32,
        flags: crate::mem::pte::PteFlags,
    ) -> Result<()> {
        let child_frame = allocator::alloc_frame(engine)?;
        let data = self.page_table.read_page(vaddr);
        child.page_table.write_page(vaddr, &data);
        child.page_table.write_pte(vaddr, Pte::Resident { frame: child_frame, flags }.encode());
        engine.lru().insert(child_frame, child.page_table.clone(), vaddr);
        Ok(())
    }

    /// Materializes a swapped parent page directly into a resident child frame: the
    /// parent's slot is read in full rather than copied slot-to-slot, so the child
    /// never carries a swap slot of its own for this page. No other resident mapping
    /// in this crate is born with a pre-reserved slot either; one is only reserved if
    /// and when the page is actually evicted.
    fn fork_swapped(
        &self,
        engine: &SwapEngine,
        child: &AddressSpace,
        vaddr: u32,
        parent_slot: u32,
        flags: crate::mem::pte::PteFlags,
    ) -> Result<()> {
        let child_frame = allocator::alloc_frame(engine)?;
        if let Err(e) = engine.read_slot_into(parent_slot, &child.page_table, vaddr) {
            allocator::free_frame(engine, child_frame);
            return Err(e);
        }
        child.page_table.write_pte(vaddr, Pte::Resident { frame: child_frame, flags }.encode());
        engine.lru().insert(child_frame, child.page_table.clone(), vaddr);
        Ok(())
    }

    /// Tears down the entire address space on process exit: every frame is returned
    /// to the Frame Pool and every swap slot released, so nothing the process held
    /// outlives it.
    pub fn on_exit(&self, engine: &SwapEngine) {
        self.on_unmap_all(engine);
    }
}
