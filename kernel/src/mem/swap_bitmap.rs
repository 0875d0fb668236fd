// SPDX-FileCopyrightText: 2024 bunnie <bunnie@kosagi.com>
// SPDX-License-Identifier: Apache-2.0

//! Swap Bitmap: a RAM-resident allocator of fixed-size slots on the swap device.
//!
//! The donor kernel tracks swap slot ownership inside `SwapAlloc` records passed
//! across an IPC boundary to a userspace swapper process; this crate folds that
//! bookkeeping back into the kernel as a plain bitmap, per this subsystem's
//! in-kernel-blocking-I/O design.

use spin::Mutex;

use crate::config::SWAP_SLOTS;

const BITS_PER_WORD: usize = 64;
const WORDS: usize = (SWAP_SLOTS + BITS_PER_WORD - 1) / BITS_PER_WORD;

pub type SlotNumber = u32;

struct Bitmap {
    words: Vec<u64>,
}

pub struct SwapBitmap {
    inner: Mutex<Bitmap>,
}

impl SwapBitmap {
    pub fn new() -> SwapBitmap {
        SwapBitmap { inner: Mutex::new(Bitmap { words: vec![0u64; WORDS] }) }
    }

    /// Reserves the first free slot, returning `None` if the device is full.
    pub fn reserve_slot(&self) -> Option<SlotNumber> {
        let mut bitmap = self.inner.lock();
        for (word_idx, word) in bitmap.words.iter_mut().enumerate() {
            if *word != u64::MAX {
                let bit = word.trailing_ones() as usize;
                let slot = word_idx * BITS_PER_WORD + bit;
                if slot >= SWAP_SLOTS {
                    return None;
                }
                *word |= 1u64 << bit;
                return Some(slot as u32);
            }
        }
        None
    }

    /// Releases a previously reserved slot. Releasing a slot that is not currently
    /// reserved is a programmer error (double-release) and panics, matching this
    /// crate's policy of panicking on internal invariant violations rather than
    /// returning an `Error`.
    pub fn release_slot(&self, slot: SlotNumber) {
        let mut bitmap = self.inner.lock();
        let (word_idx, bit) = (slot as usize / BITS_PER_WORD, slot as usize % BITS_PER_WORD);
        let word = &mut bitmap.words[word_idx];
        assert!(*word & (1u64 << bit) != 0, "double-release of swap slot {}", slot);
        *word &= !(1u64 << bit);
    }

    pub fn used_count(&self) -> usize {
        self.inner.lock().words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

impl Default for SwapBitmap {
    fn default() -> Self {
        SwapBitmap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserves_and_releases() {
        let bm = SwapBitmap::new();
        let a = bm.reserve_slot().unwrap();
        let b = bm.reserve_slot().unwrap();
        assert_ne!(a, b);
        assert_eq!(bm.used_count(), 2);
        bm.release_slot(a);
        assert_eq!(bm.used_count(), 1);
        let c = bm.reserve_slot().unwrap();
        assert_eq!(c, a, "first-fit should reuse the lowest freed slot");
    }

    #[test]
    fn exhausts() {
        let bm = SwapBitmap::new();
        let mut reserved = Vec::new();
        while let Some(s) = bm.reserve_slot() {
            reserved.push(s);
        }
        assert_eq!(reserved.len(), SWAP_SLOTS);
        assert!(bm.reserve_slot().is_none());
    }

    #[test]
    #[should_panic(expected = "double-release")]
    fn double_release_panics() {
        let bm = SwapBitmap::new();
        let a = bm.reserve_slot().unwrap();
        bm.release_slot(a);
        bm.release_slot(a);
    }
}
