// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! Page Metadata Table and the LRU/Clock engine.
//!
//! The table is a fixed arena, one record per physical frame, sized at construction
//! time exactly like the donor's own per-frame metadata array in `mem.rs`. Linkage
//! into the LRU list (rather than allocation) is what marks a frame "user-resident",
//! matching this crate's invariant that a record is linked in LRU iff its frame holds
//! a live user mapping.

use spin::Mutex;

use crate::mem::frame::FrameNumber;
use crate::mem::page_table::PageTableHandle;
use crate::mem::pte::Pte;

struct Record {
    page_table: Option<PageTableHandle>,
    vaddr: u32,
    prev: Option<FrameNumber>,
    next: Option<FrameNumber>,
    linked: bool,
}

impl Record {
    fn empty() -> Record {
        Record { page_table: None, vaddr: 0, prev: None, next: None, linked: false }
    }
}

struct Inner {
    records: Vec<Record>,
    /// The clock hand: the next candidate to examine. `None` iff the list is empty.
    head: Option<FrameNumber>,
}

pub struct LruEngine {
    inner: Mutex<Inner>,
}

impl LruEngine {
    pub fn new(nframes: usize) -> LruEngine {
        let mut records = Vec::with_capacity(nframes);
        records.resize_with(nframes, Record::empty);
        LruEngine { inner: Mutex::new(Inner { records, head: None }) }
    }

    /// Splices `frame` into the LRU, just behind the clock hand, recording the
    /// back-reference used by `pick_victim` to locate its PTE. Must not be called for
    /// an already-linked record.
    pub fn insert(&self, frame: FrameNumber, page_table: PageTableHandle, vaddr: u32) {
        let mut inner = self.inner.lock();
        assert!(!inner.records[frame as usize].linked, "lru_insert on already-linked frame {}", frame);

        let head = inner.head;
        match head {
            None => {
                inner.records[frame as usize] = Record {
                    page_table: Some(page_table),
                    vaddr,
                    prev: Some(frame),
                    next: Some(frame),
                    linked: true,
                };
                inner.head = Some(frame);
            }
            Some(head) => {
                let tail = inner.records[head as usize].prev.unwrap();
                inner.records[frame as usize] = Record {
                    page_table: Some(page_table),
                    vaddr,
                    prev: Some(tail),
                    next: Some(head),
                    linked: true,
                };
                inner.records[tail as usize].next = Some(frame);
                inner.records[head as usize].prev = Some(frame);
            }
        }
    }

    /// Excises `frame` from the LRU. Idempotent: unlinking an already-unlinked record
    /// is tolerated, since an unmap path may race with victim selection over the same
    /// frame.
    pub fn unlink(&self, frame: FrameNumber) {
        let mut inner = self.inner.lock();
        Self::unlink_locked(&mut inner, frame);
    }

    fn unlink_locked(inner: &mut Inner, frame: FrameNumber) {
        if !inner.records[frame as usize].linked {
            return;
        }
        let (prev, next) = {
            let rec = &inner.records[frame as usize];
            (rec.prev.unwrap(), rec.next.unwrap())
        };
        if prev == frame {
            // sole entry
            inner.head = None;
        } else {
            inner.records[prev as usize].next = Some(next);
            inner.records[next as usize].prev = Some(prev);
            if inner.head == Some(frame) {
                inner.head = Some(next);
            }
        }
        let rec = &mut inner.records[frame as usize];
        rec.linked = false;
        rec.prev = None;
        rec.next = None;
        rec.page_table = None;
    }

    /// Runs the clock algorithm and, once a victim is chosen, calls `reserve` to
    /// claim its backing swap slot before excising it from the list — all under the
    /// same lock, so no other caller can select the same frame, and a failed
    /// reservation leaves the list exactly as it was (the victim is never spliced
    /// out, so there is nothing to splice back in). Returns the victim's frame
    /// number, owning page table, virtual address, and whatever `reserve` produced,
    /// or `None` if the LRU is empty or `reserve` refused the only victim found.
    ///
    /// Bounded at two full revolutions of the list; exceeding that is a fatal
    /// invariant violation (no evictable page exists even though every access bit
    /// was given a second chance).
    pub fn pick_and_excise_victim<T>(
        &self,
        reserve: impl FnOnce() -> Option<T>,
    ) -> Option<(FrameNumber, PageTableHandle, u32, T)> {
        let mut inner = self.inner.lock();
        let start = inner.head?;
        let len = Self::len_locked(&inner);
        let max_steps = len.saturating_mul(2) + 1;

        let mut current = start;
        for _ in 0..max_steps {
            let (page_table, vaddr, next) = {
                let rec = &inner.records[current as usize];
                (rec.page_table.clone().expect("linked record missing page_table"), rec.vaddr, rec.next.unwrap())
            };
            let pte = Pte::decode(page_table.read_pte(vaddr));
            if !pte.is_resident() {
                // Stale metadata: the PTE no longer matches what this record claims.
                // Defensive guard; skip it rather than evict garbage.
                current = next;
                continue;
            }
            if pte.access_bit() {
                let cleared = pte.with_access_cleared();
                page_table.write_pte(vaddr, cleared.encode());
                current = next;
                continue;
            }
            let token = reserve()?;
            Self::unlink_locked(&mut inner, current);
            // The clock hand must resume from just past the victim on the next call,
            // not restart at the old head: otherwise entries given a second chance
            // (access cleared, then skipped) would be re-examined immediately by
            // every subsequent call instead of getting their full second revolution,
            // and fairness across repeated reclaim_one calls would collapse to
            // innermost-first rather than true round-robin.
            if inner.head.is_some() {
                inner.head = Some(next);
            }
            return Some((current, page_table, vaddr, token));
        }
        panic!("clock algorithm exceeded two revolutions without finding a victim");
    }

    fn len_locked(inner: &Inner) -> usize {
        let mut count = 0usize;
        if let Some(head) = inner.head {
            let mut current = head;
            loop {
                count += 1;
                current = inner.records[current as usize].next.unwrap();
                if current == head {
                    break;
                }
            }
        }
        count
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        Self::len_locked(&self.inner.lock())
    }

    #[cfg(test)]
    pub fn is_linked(&self, frame: FrameNumber) -> bool {
        self.inner.lock().records[frame as usize].linked
    }
}
