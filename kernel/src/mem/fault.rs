// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! Page fault dispatch.
//!
//! Grounded on the donor kernel's `arch/riscv/mem.rs::ensure_page_exists_inner`,
//! which inspects the faulting PTE before deciding how to resolve the fault. This
//! crate only owns the swapped-PTE branch of that decision; everything else is
//! represented as `NotOurs` so the embedding kernel's own fault chain (copy-on-write,
//! lazy allocation, segfault) can continue.

use crate::error::Result;
use crate::mem::page_table::PageTableHandle;
use crate::mem::pte::Pte;
use crate::mem::swap_engine::SwapEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOutcome {
    /// The fault was on a swapped page and has been resolved; resume the faulting
    /// instruction.
    Resolved,
    /// The fault was not on a swapped page; some other handler in the embedding
    /// kernel's fault chain owns it.
    NotOurs,
}

/// Inspects the PTE backing `vaddr` in `page_table` and, if it is swapped, resolves
/// the fault via the Swap Engine.
pub fn handle_fault(engine: &SwapEngine, page_table: &PageTableHandle, vaddr: u32) -> Result<FaultOutcome> {
    let pte = Pte::decode(page_table.read_pte(vaddr));
    if !pte.is_swapped() {
        return Ok(FaultOutcome::NotOurs);
    }
    engine.swap_in(page_table, vaddr)?;
    Ok(FaultOutcome::Resolved)
}
