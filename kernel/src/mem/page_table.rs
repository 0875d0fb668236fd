// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! The MMU / page-table-walker collaborator.
//!
//! Grounded on the donor kernel's `arch/riscv/mem.rs` PTE-walking functions
//! (`pagetable_entry`, `virt_to_phys`), abstracted behind a trait here since the real
//! MMU walker is an out-of-scope collaborator this crate does not reimplement.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::PAGE_SIZE;

/// A single user address space's page table.
///
/// Implementations are responsible for locating the PTE word for a given virtual
/// address; this crate only ever reads, decodes, mutates, and writes back that word.
/// `read_page`/`write_page` give the Swap Engine access to the page's contents for
/// its disk transfers; on real hardware these would simply dereference the frame's
/// physical address, which this crate does not otherwise need to compute.
pub trait PageTable: Send + Sync {
    /// Reads the raw PTE word mapping `vaddr`. Implementations may choose any
    /// encoding for "no page table entry allocated at all" (distinct from an
    /// `Unmapped` PTE); this crate always writes a PTE for every virtual page it
    /// manages before reading it back, so that distinction never matters here.
    fn read_pte(&self, vaddr: u32) -> u32;

    /// Writes a raw PTE word for `vaddr`.
    fn write_pte(&self, vaddr: u32, word: u32);

    /// Invalidates any cached translation for `vaddr` in this address space.
    fn flush_tlb(&self, vaddr: u32);

    /// Reads the `PAGE_SIZE` bytes currently backing `vaddr`.
    fn read_page(&self, vaddr: u32) -> Vec<u8>;

    /// Overwrites the `PAGE_SIZE` bytes backing `vaddr`.
    fn write_page(&self, vaddr: u32, data: &[u8]);

    /// Lists every virtual address this table currently holds a non-`Unmapped` entry
    /// for. Used by the unmap/fork/exit hooks, which otherwise have no way to
    /// enumerate an address space's mappings through this trait alone.
    fn mapped_vaddrs(&self) -> Vec<u32>;
}

pub type PageTableHandle = Arc<dyn PageTable>;

/// A fixed-size, RAM-backed page table used by the test suite in place of a real
/// MMU walker.
pub struct TestPageTable {
    entries: spin::Mutex<HashMap<u32, u32>>,
    pages: spin::Mutex<HashMap<u32, Vec<u8>>>,
    flushes: spin::Mutex<Vec<u32>>,
}

impl TestPageTable {
    pub fn new() -> Arc<TestPageTable> {
        Arc::new(TestPageTable {
            entries: spin::Mutex::new(HashMap::new()),
            pages: spin::Mutex::new(HashMap::new()),
            flushes: spin::Mutex::new(Vec::new()),
        })
    }

    pub fn flush_log(&self) -> Vec<u32> {
        self.flushes.lock().clone()
    }
}

impl PageTable for TestPageTable {
    fn read_pte(&self, vaddr: u32) -> u32 {
        *self.entries.lock().get(&vaddr).unwrap_or(&0)
    }

    fn write_pte(&self, vaddr: u32, word: u32) {
        self.entries.lock().insert(vaddr, word);
    }

    fn flush_tlb(&self, vaddr: u32) {
        self.flushes.lock().push(vaddr);
    }

    fn read_page(&self, vaddr: u32) -> Vec<u8> {
        self.pages.lock().get(&vaddr).cloned().unwrap_or_else(|| vec![0u8; PAGE_SIZE])
    }

    fn write_page(&self, vaddr: u32, data: &[u8]) {
        self.pages.lock().insert(vaddr, data.to_vec());
    }

    fn mapped_vaddrs(&self) -> Vec<u32> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, &word)| word != 0)
            .map(|(&vaddr, _)| vaddr)
            .collect()
    }
}
