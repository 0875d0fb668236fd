// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! Compile-time sizing constants. Kept as plain `const`s rather than runtime-detected
//! values: this is a teaching kernel with a fixed, known memory map, matching the
//! donor kernel's own preference for `const` geometry over a discovered one.

/// Size of one physical frame / swap slot, in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Size of one swap-device block, in bytes.
pub const BLOCKSIZE: usize = 512;

/// Physical memory ceiling: frames are numbered `0..NFRAMES` over `[0, PHYSTOP)`.
///
/// A real board would read this from its boot args; fixed here since this crate does
/// not own the boot sequence.
pub const PHYSTOP: usize = 64 * 1024 * 1024;

/// Total size of the swap device, in bytes.
pub const SWAPMAX: usize = 32 * 1024 * 1024;

/// Number of physical frames tracked by the Page Metadata Table.
pub const NFRAMES: usize = PHYSTOP / PAGE_SIZE;

/// Number of 512-byte blocks that make up one swap slot.
pub const SLOT_BLOCKS: usize = PAGE_SIZE / BLOCKSIZE;

/// Number of swap slots on the swap device.
///
/// Derived as `SWAPMAX / PAGE_SIZE` (one slot holds exactly one page). The source
/// material this crate was distilled from used two different and mutually
/// inconsistent formulas for this quantity (`SWAPMAX/4` and `SWAPMAX/8`); both were
/// rejected as erroneous in favor of deriving it from first principles.
pub const SWAP_SLOTS: usize = SWAPMAX / PAGE_SIZE;
