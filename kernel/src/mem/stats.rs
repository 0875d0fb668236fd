// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! Statistics Surface: monotonic counters backing the `swapstat` system call.
//!
//! The donor kernel keeps its swap statistics inside a userspace service reachable
//! only by IPC; this crate exposes the same two counters directly, incremented by the
//! Swap Engine after each completed disk transfer.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Stats {
    swap_reads: AtomicU64,
    swap_writes: AtomicU64,
}

impl Stats {
    pub fn new() -> Stats {
        Stats::default()
    }

    pub(crate) fn record_read(&self) {
        self.swap_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.swap_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn swap_reads(&self) -> u64 {
        self.swap_reads.load(Ordering::Relaxed)
    }

    pub fn swap_writes(&self) -> u64 {
        self.swap_writes.load(Ordering::Relaxed)
    }
}
