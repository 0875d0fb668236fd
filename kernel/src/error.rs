// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! Crate-wide error type, matching the donor kernel's practice of reporting every
//! recoverable failure through one syscall-facing `Error` enum rather than a
//! per-subsystem type.

/// Recoverable failures surfaced to callers of this crate.
///
/// Conditions that indicate a violated internal invariant (double-free, a PTE observed
/// with both `V` and `S` set, a clock scan that fails to terminate) are not represented
/// here: they panic, per the propagation policy this crate follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No physical frame could be produced, even after attempting to reclaim one.
    OutOfMemory,
    /// A virtual or physical address was outside the bounds this crate manages.
    BadAddress,
    /// An address was not aligned to `PAGE_SIZE` where alignment is required.
    BadAlignment,
    /// The requested virtual page is already mapped.
    MemoryInUse,
    /// An operation on a swapped page cannot proceed because a sharing rule was broken.
    ShareViolation,
    /// The caller lacks permission for the requested operation.
    AccessDenied,
    /// The swap device is full; no slot is available.
    SwapFull,
    /// A block device read or write failed.
    IoFailure,
}

pub type Result<T> = core::result::Result<T, Error>;
