// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! Demand-paged virtual memory subsystem: physical frame allocator, clock page
//! replacement, swap-space manager, and the address-space/fault-handler hooks that
//! keep a page's resident/swapped/unmapped state consistent across fork and exit.
//!
//! This crate owns none of its collaborators: the scheduler, process table, trap
//! dispatcher, disk block driver, and file system are all external to it, consumed
//! only through the [`mem::page_table::PageTable`] and [`mem::block_device::BlockDevice`]
//! seams. An embedding kernel wires a real MMU walker and disk driver in at these
//! two traits; the test suite wires in [`mem::page_table::TestPageTable`] and
//! [`mem::block_device::RamDisk`] instead.

pub mod config;
#[macro_use]
pub mod debug;
pub mod error;
pub mod mem;
pub mod syscall;

use std::sync::{Arc, OnceLock};

use mem::block_device::BlockDevice;
use mem::MemorySubsystem;

static MEMORY_SUBSYSTEM: OnceLock<MemorySubsystem> = OnceLock::new();

/// Builds the process-global memory subsystem over `disk`, with the frames below
/// `kernel_end_frame` already reserved for the kernel image. Must be called at most
/// once, before any hart dispatches a page fault or allocation request; matches the
/// donor kernel's own `init_from_memory` one-shot initialization discipline.
///
/// Panics if called more than once, since a second call would silently discard the
/// frames and swap slots already handed out by the first.
pub fn init(kernel_end_frame: u32, disk: Arc<dyn BlockDevice>) {
    MEMORY_SUBSYSTEM
        .set(MemorySubsystem::new(kernel_end_frame, disk))
        .ok()
        .expect("memory subsystem already initialized");
}

/// Calls `f` with the process-global memory subsystem.
///
/// # Panics
/// Panics if called before [`init`]. Mirrors the donor kernel's own `with`/`with_mut`
/// singleton accessors, which assume the manager has already been constructed by the
/// time any subsystem reaches for it.
pub fn with<F, R>(f: F) -> R
where
    F: FnOnce(&MemorySubsystem) -> R,
{
    f(MEMORY_SUBSYSTEM.get().expect("memory subsystem not initialized"))
}
