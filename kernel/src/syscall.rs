// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! System call surface.
//!
//! Grounded on the donor kernel's `src/syscall.rs` dispatch shape: a function per
//! call, taking already-decoded arguments and returning a `Result`. Trimmed to the
//! one call this subsystem owns (`swapstat`); every other syscall in the donor's
//! `SysCall` enum belongs to the scheduler, IPC, or process-table collaborators this
//! crate does not reimplement.

use crate::error::{Error, Result};
use crate::mem::stats::Stats;

/// A user-address writer. The real kernel's validation that a `(ptr, len)` range
/// falls entirely within the calling process's mapped, writable memory lives in the
/// embedding kernel's page-table walker; this crate receives that check already done
/// and performed as the closure's `Err(Error::BadAddress)` path, matching how the
/// donor's own `syscall.rs` receives pre-validated `MemoryRange`s from its callers.
pub trait UserWriter {
    /// Writes `value` as 8 little-endian bytes starting at `offset` bytes into the
    /// destination the implementor owns. Returns `Err(Error::BadAddress)` if the
    /// write falls outside memory the calling process may write.
    fn write_u64_le(&mut self, offset: usize, value: u64) -> Result<()>;
}

/// `swapstat(out_reads, out_writes) -> 0`: copies the two monotonic swap counters to
/// user memory. Neither counter is touched by a failed copy-out; the counters
/// themselves are unaffected by callers reading them, per the spec's error-handling
/// policy that a user-address fault here must not perturb kernel state.
pub fn swapstat<W: UserWriter>(stats: &Stats, out_reads: &mut W, out_writes: &mut W) -> Result<()> {
    out_reads.write_u64_le(0, stats.swap_reads())?;
    out_writes.write_u64_le(0, stats.swap_writes())?;
    Ok(())
}
