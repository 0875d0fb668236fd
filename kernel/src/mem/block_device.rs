// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! The swap device collaborator.
//!
//! The real disk driver is out of scope for this crate (it is supplied by the
//! embedding kernel); this trait is the seam, in the same spirit as the donor
//! kernel's `loader/src/swap.rs` describing a swap source as a sequence of fixed-size
//! blocks rather than owning the controller itself.

use crate::config::BLOCKSIZE;
use crate::error::{Error, Result};

/// A synchronous, blocking block device. Implementations may sleep; callers in this
/// crate never hold a spinlock across a call to either method (see the Swap Engine's
/// lock-then-I/O protocol).
pub trait BlockDevice: Send + Sync {
    /// Reads exactly one `BLOCKSIZE`-byte block into `buf`.
    fn read_block(&self, block: u32, buf: &mut [u8; BLOCKSIZE]) -> Result<()>;
    /// Writes exactly one `BLOCKSIZE`-byte block from `buf`.
    fn write_block(&self, block: u32, buf: &[u8; BLOCKSIZE]) -> Result<()>;
}

/// An in-memory stand-in for the swap device, used by the test suite.
pub struct RamDisk {
    blocks: spin::Mutex<Vec<[u8; BLOCKSIZE]>>,
    /// When set, every Nth write fails, to exercise the Swap Engine's failure path.
    fail_every_write: Option<u32>,
    write_count: core::sync::atomic::AtomicU32,
}

impl RamDisk {
    pub fn new(num_blocks: usize) -> RamDisk {
        RamDisk {
            blocks: spin::Mutex::new(vec![[0u8; BLOCKSIZE]; num_blocks]),
            fail_every_write: None,
            write_count: core::sync::atomic::AtomicU32::new(0),
        }
    }

    /// A `RamDisk` whose `write_block` fails once every `n` calls, for testing the
    /// Swap Engine's disk-write-failure reversion policy.
    pub fn new_flaky(num_blocks: usize, fail_every_n_writes: u32) -> RamDisk {
        RamDisk {
            blocks: spin::Mutex::new(vec![[0u8; BLOCKSIZE]; num_blocks]),
            fail_every_write: Some(fail_every_n_writes),
            write_count: core::sync::atomic::AtomicU32::new(0),
        }
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, block: u32, buf: &mut [u8; BLOCKSIZE]) -> Result<()> {
        let blocks = self.blocks.lock();
        let src = blocks.get(block as usize).ok_or(Error::BadAddress)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write_block(&self, block: u32, buf: &[u8; BLOCKSIZE]) -> Result<()> {
        use core::sync::atomic::Ordering;
        if let Some(n) = self.fail_every_write {
            let count = self.write_count.fetch_add(1, Ordering::Relaxed) + 1;
            if n != 0 && count % n == 0 {
                return Err(Error::IoFailure);
            }
        }
        let mut blocks = self.blocks.lock();
        let dst = blocks.get_mut(block as usize).ok_or(Error::BadAddress)?;
        dst.copy_from_slice(buf);
        Ok(())
    }
}
