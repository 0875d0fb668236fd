// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! Page-table entry encoding.
//!
//! Mirrors the donor kernel's RISC-V `MMUFlags` packing: the low 10 bits of the word
//! are permission/state flags, the remaining upper bits hold either a physical frame
//! number (`Resident`) or a swap slot index (`Swapped`), reusing the same field the
//! way the donor's own `arch/riscv/mem.rs` reuses the PPN bits for its `P` (swapped)
//! state.

use bitflags::bitflags;

bitflags! {
    /// Low-order flag bits of a page-table entry.
    pub struct PteFlags: u32 {
        const VALID  = 0b0000_0001;
        const READ   = 0b0000_0010;
        const WRITE  = 0b0000_0100;
        const EXEC   = 0b0000_1000;
        const USER   = 0b0001_0000;
        const GLOBAL = 0b0010_0000;
        const ACCESS = 0b0100_0000;
        const DIRTY  = 0b1000_0000;
        /// Set when the PPN field has been repurposed to hold a swap slot index.
        const SWAPPED = 0b1_0000_0000;
    }
}

const FLAGS_BITS: u32 = 10;
const FLAGS_MASK: u32 = (1 << FLAGS_BITS) - 1;

/// The three mutually exclusive states a user virtual page may be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pte {
    /// Translated to a physical frame; `VALID` is set, `SWAPPED` is clear.
    Resident { frame: u32, flags: PteFlags },
    /// Evicted to the swap device; `VALID` is clear, `SWAPPED` is set.
    Swapped { slot: u32, flags: PteFlags },
    /// No memory reservation; neither `VALID` nor `SWAPPED` is set.
    Unmapped,
}

impl Pte {
    /// Decodes a raw PTE word. Panics if both `VALID` and `SWAPPED` are set, which is
    /// an illegal encoding (see spec's data model for the PTE tri-state).
    pub fn decode(word: u32) -> Pte {
        let flags = PteFlags::from_bits_truncate(word & FLAGS_MASK);
        let upper = word >> FLAGS_BITS;
        let valid = flags.contains(PteFlags::VALID);
        let swapped = flags.contains(PteFlags::SWAPPED);
        assert!(!(valid && swapped), "illegal PTE: VALID and SWAPPED both set");
        if valid {
            Pte::Resident { frame: upper, flags: flags & !PteFlags::SWAPPED }
        } else if swapped {
            Pte::Swapped { slot: upper, flags: flags & !PteFlags::VALID }
        } else {
            Pte::Unmapped
        }
    }

    /// Encodes this entry back into a raw PTE word.
    pub fn encode(self) -> u32 {
        match self {
            Pte::Resident { frame, flags } => {
                let flags = (flags | PteFlags::VALID) & !PteFlags::SWAPPED;
                (frame << FLAGS_BITS) | flags.bits()
            }
            Pte::Swapped { slot, flags } => {
                let flags = (flags | PteFlags::SWAPPED) & !PteFlags::VALID;
                (slot << FLAGS_BITS) | flags.bits()
            }
            Pte::Unmapped => 0,
        }
    }

    /// Permission/state flags, preserved across transitions between Resident and
    /// Swapped (the low 10 bits survive a swap-out/swap-in round trip).
    pub fn flags(&self) -> PteFlags {
        match self {
            Pte::Resident { flags, .. } | Pte::Swapped { flags, .. } => *flags,
            Pte::Unmapped => PteFlags::empty(),
        }
    }

    pub fn is_resident(&self) -> bool {
        matches!(self, Pte::Resident { .. })
    }

    pub fn is_swapped(&self) -> bool {
        matches!(self, Pte::Swapped { .. })
    }

    pub fn is_unmapped(&self) -> bool {
        matches!(self, Pte::Unmapped)
    }

    /// Clears the hardware access bit, returning the updated entry. Used by the clock
    /// algorithm to give a resident page its second chance.
    pub fn with_access_cleared(self) -> Pte {
        match self {
            Pte::Resident { frame, flags } => {
                Pte::Resident { frame, flags: flags & !PteFlags::ACCESS }
            }
            other => other,
        }
    }

    pub fn access_bit(&self) -> bool {
        self.flags().contains(PteFlags::ACCESS)
    }
}
