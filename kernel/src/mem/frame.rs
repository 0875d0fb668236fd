// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! Frame Pool: a free-list of physical frames carved from `[0, PHYSTOP)`.
//!
//! Grounded on the donor kernel's `MemoryManager::alloc_page`/`release_page`, which
//! keeps a similar free-list of frame numbers, plus its fill-on-transition habit
//! around those same calls.
//!
//! This crate treats a frame as an opaque index (`FrameNumber`); the bytes a frame
//! holds are otherwise addressed through the `PageTable` collaborator, which has no
//! notion of a bare frame number, only a virtual address. `storage` is this pool's
//! own view of physical memory, indexed by frame number, that exists solely so
//! `take`/`give_back` can give the zero-fill/poison-fill guarantee a real physical
//! allocator would.

use std::collections::HashMap;

use spin::Mutex;

use crate::config::{NFRAMES, PAGE_SIZE};

/// A physical frame number, `0..NFRAMES`.
pub type FrameNumber = u32;

/// Byte pattern a freed frame is filled with before it re-enters the free-list, so a
/// stale read through a dangling reference shows garbage rather than a previous
/// tenant's data.
const POISON_BYTE: u8 = 0xa5;

struct FreeList {
    /// Frames not currently handed out, used as a stack (LIFO reuse, same as the
    /// donor's own free-list).
    free: Vec<FrameNumber>,
}

pub struct FramePool {
    list: Mutex<FreeList>,
    storage: Mutex<HashMap<FrameNumber, Vec<u8>>>,
}

impl FramePool {
    /// Builds a pool owning every frame in `[0, NFRAMES)`.
    pub fn new() -> FramePool {
        FramePool::new_from(0)
    }

    /// Builds a pool that starts from `kernel_end_frame`, i.e. only frames in
    /// `[kernel_end_frame, NFRAMES)` are free. Frames below `kernel_end_frame` are
    /// assumed already claimed by the kernel image and never enter this pool.
    pub fn new_from(kernel_end_frame: FrameNumber) -> FramePool {
        let free: Vec<FrameNumber> = (kernel_end_frame..NFRAMES as u32).rev().collect();
        FramePool { list: Mutex::new(FreeList { free }), storage: Mutex::new(HashMap::new()) }
    }

    /// Detaches a frame from the free-list, if any remain, and zero-fills it. Does
    /// not touch the LRU; the caller inserts into the LRU once the frame is attached
    /// to a user mapping.
    pub fn take(&self) -> Option<FrameNumber> {
        let frame = {
            let mut list = self.list.lock();
            list.free.pop()
        }?;
        self.storage.lock().insert(frame, vec![0u8; PAGE_SIZE]);
        Some(frame)
    }

    /// Poison-fills the frame, then returns it to the free-list. The frame must
    /// already be unlinked from the LRU; this function does not check that, matching
    /// the donor's own division of responsibility between `release_page` and its LRU
    /// bookkeeping caller.
    ///
    /// The fill happens before the free-list lock is taken, so the free-list spinlock
    /// is never held across it.
    pub fn give_back(&self, frame: FrameNumber) {
        self.storage.lock().insert(frame, vec![POISON_BYTE; PAGE_SIZE]);
        self.list.lock().free.push(frame);
    }

    pub fn free_count(&self) -> usize {
        self.list.lock().free.len()
    }

    #[cfg(test)]
    pub fn frame_bytes(&self, frame: FrameNumber) -> Vec<u8> {
        self.storage.lock().get(&frame).cloned().expect("frame has no recorded contents")
    }
}

impl Default for FramePool {
    fn default() -> Self {
        FramePool::new()
    }
}
