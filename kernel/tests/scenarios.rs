//! End-to-end scenarios for the demand-paged memory subsystem, run against the
//! `TestPageTable`/`RamDisk` test doubles in place of a real MMU walker and disk
//! driver. These are the integration-level counterparts to the per-module unit
//! tests; each one follows a scenario from the subsystem's test plan rather than
//! exercising one function in isolation.

use std::sync::Arc;

use xous_kernel::config::{NFRAMES, PAGE_SIZE, SWAP_SLOTS};
use xous_kernel::error::Error;
use xous_kernel::mem::address_space::AddressSpace;
use xous_kernel::mem::allocator;
use xous_kernel::mem::block_device::{BlockDevice, RamDisk};
use xous_kernel::mem::fault::{handle_fault, FaultOutcome};
use xous_kernel::mem::frame::FramePool;
use xous_kernel::mem::metadata::LruEngine;
use xous_kernel::mem::page_table::{PageTableHandle, TestPageTable};
use xous_kernel::mem::pte::{Pte, PteFlags};
use xous_kernel::mem::swap_bitmap::SwapBitmap;
use xous_kernel::mem::swap_engine::SwapEngine;
use xous_kernel::mem::stats::Stats;

fn full_disk() -> Arc<dyn BlockDevice> {
    Arc::new(RamDisk::new(SWAP_SLOTS * PAGE_SIZE / 512))
}

fn engine_with_frames(free_frames: u32) -> SwapEngine {
    SwapEngine::new(
        Arc::new(FramePool::new_from(NFRAMES as u32 - free_frames)),
        Arc::new(SwapBitmap::new()),
        Arc::new(LruEngine::new(NFRAMES)),
        full_disk(),
        Arc::new(Stats::new()),
    )
}

/// Writes `pattern` to every byte of the page, establishes a fresh resident mapping,
/// and registers it with the LRU. Allocation may itself trigger a swap-out of some
/// other page.
fn map_page(engine: &SwapEngine, space: &AddressSpace, vaddr: u32, pattern: u8) -> Result<(), Error> {
    let frame = allocator::alloc_frame(engine)?;
    space.page_table().write_page(vaddr, &vec![pattern; PAGE_SIZE]);
    space.page_table().write_pte(vaddr, Pte::Resident { frame, flags: PteFlags::VALID | PteFlags::READ | PteFlags::WRITE }.encode());
    space.on_map(engine, vaddr, frame);
    Ok(())
}

/// Reads `page[vaddr][0]`, resolving a swap-in fault transparently if the page is
/// currently swapped, exactly as a user-mode load instruction would from the
/// faulting process's point of view.
fn read_byte0(engine: &SwapEngine, page_table: &PageTableHandle, vaddr: u32) -> u8 {
    if let FaultOutcome::Resolved = handle_fault(engine, page_table, vaddr).expect("swap-in must not fail in this scenario") {
        // fault resolved, PTE is now resident
    }
    page_table.read_page(vaddr)[0]
}

#[test]
fn scenario_basic_swap_out_under_memory_pressure() {
    // 8000 pages over a pool with only 2000 free frames forces the allocator to
    // reclaim via the swap engine repeatedly.
    let engine = engine_with_frames(2000);
    let pt = TestPageTable::new();
    let space = AddressSpace::new(pt.clone());

    const N: u32 = 8000;
    for i in 0..N {
        let pattern = (i % 255) as u8;
        map_page(&engine, &space, i * PAGE_SIZE as u32, pattern).expect("allocation must not OOM with swap available");
    }

    assert!(engine.stats().swap_writes() > 0, "memory pressure must have triggered at least one swap-out");
}

#[test]
fn scenario_swap_in_integrity_after_pressure() {
    let engine = engine_with_frames(2000);
    let pt = TestPageTable::new();
    let space = AddressSpace::new(pt.clone());

    const N: u32 = 8000;
    for i in 0..N {
        let pattern = ((i % 200) + 1) as u8;
        map_page(&engine, &space, i * PAGE_SIZE as u32, pattern).unwrap();
    }

    let reads_before = engine.stats().swap_reads();
    let handle: PageTableHandle = pt.clone();
    for i in 0..N / 2 {
        let vaddr = i * PAGE_SIZE as u32;
        let expected = ((i % 200) + 1) as u8;
        assert_eq!(read_byte0(&engine, &handle, vaddr), expected, "page {} must read back its original pattern", i);
    }
    assert!(engine.stats().swap_reads() > reads_before, "reading swapped-out pages must perform swap-ins");
}

#[test]
fn scenario_fork_of_swapped_pages_is_faithful() {
    // Few enough free frames that most of the 3000 pages end up swapped by the time
    // the parent forks. Fork materializes every child page resident, so at most 300
    // (the frame pool's entire capacity) of the combined 6000 parent+child mappings
    // are ever resident at once; the remaining ~5700 swapped entries sit comfortably
    // under the 8192-slot swap device.
    let engine = engine_with_frames(300);
    let parent_pt = TestPageTable::new();
    let child_pt = TestPageTable::new();
    let parent = AddressSpace::new(parent_pt.clone());
    let child = AddressSpace::new(child_pt.clone());

    const N: u32 = 3000;
    for i in 0..N {
        map_page(&engine, &parent, i * PAGE_SIZE as u32, 0xAA).unwrap();
    }

    parent.on_fork_copy(&engine, &child).expect("fork must not fail when swap has headroom");

    let child_handle: PageTableHandle = child_pt.clone();
    for i in 0..N {
        let vaddr = i * PAGE_SIZE as u32;
        assert_eq!(read_byte0(&engine, &child_handle, vaddr), 0xAA, "child page {} must match parent's value at fork time", i);
    }
}

#[test]
fn scenario_exit_reclaims_swap_slots_for_reuse() {
    let engine = engine_with_frames(256);
    let child_pt = TestPageTable::new();
    let child = AddressSpace::new(child_pt.clone());

    // Allocate until swap is saturated, tracking how many pages the child held at its
    // peak.
    let mut peak = 0u32;
    loop {
        let vaddr = peak * PAGE_SIZE as u32;
        match map_page(&engine, &child, vaddr, (peak % 255) as u8) {
            Ok(()) => peak += 1,
            Err(Error::OutOfMemory) => break,
            Err(e) => panic!("unexpected error: {:?}", e),
        }
        if peak > 20_000 {
            panic!("allocation never hit OOM; test fixture is misconfigured");
        }
    }
    assert!(peak > 0, "must have allocated at least one page before exhausting swap");

    child.on_exit(&engine);
    assert_eq!(engine.bitmap().used_count(), 0, "exit must release every swap slot the process held");

    // The parent should now be able to re-allocate at least 80% of the child's peak.
    let parent_pt = TestPageTable::new();
    let parent = AddressSpace::new(parent_pt.clone());
    let mut reallocated = 0u32;
    for i in 0..peak {
        match map_page(&engine, &parent, i * PAGE_SIZE as u32, 0) {
            Ok(()) => reallocated += 1,
            Err(Error::OutOfMemory) => break,
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
    assert!(
        reallocated as f64 >= peak as f64 * 0.8,
        "expected to reclaim at least 80% of the child's peak ({}), got {}",
        peak,
        reallocated
    );
}

#[test]
fn scenario_oom_is_graceful_and_prior_allocations_survive() {
    // A pool small enough, combined with the fixed swap bitmap capacity, that 10000
    // allocations (free frames + swap slots < 10000) cannot all succeed.
    let engine = engine_with_frames(64);
    let pt = TestPageTable::new();
    let space = AddressSpace::new(pt.clone());

    let mut oom_seen = false;
    let mut succeeded = Vec::new();
    for i in 0..10_000u32 {
        match map_page(&engine, &space, i * PAGE_SIZE as u32, (i % 255) as u8) {
            Ok(()) => succeeded.push(i),
            Err(Error::OutOfMemory) => {
                oom_seen = true;
                break;
            }
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
    assert!(oom_seen, "10000 allocations against a small pool must eventually report OOM");

    // At the moment OOM is reported, the swap device is saturated and no frame is
    // free, so bringing a *swapped* page back in would itself need a free slot that
    // does not exist (a real kernel would only recover that page once something is
    // explicitly freed). What must hold, without any further I/O, is that every page
    // still resident at this instant reads back its original pattern untouched by
    // the OOM condition: the failed allocation must not have corrupted state.
    for i in &succeeded {
        let pte = Pte::decode(pt.read_pte(i * PAGE_SIZE as u32));
        if let Pte::Resident { .. } = pte {
            let expected = (*i % 255) as u8;
            assert_eq!(pt.read_page(i * PAGE_SIZE as u32)[0], expected, "resident page {} must remain readable after OOM", i);
        }
    }
}

#[test]
fn scenario_clock_evicts_from_untouched_half_first() {
    let n: u32 = 200;
    let engine = engine_with_frames(n);
    let pt = TestPageTable::new();
    let space = AddressSpace::new(pt.clone());

    for i in 0..n {
        map_page(&engine, &space, i * PAGE_SIZE as u32, 0).unwrap();
    }

    // Touch the first half to set their access bits.
    for i in 0..n / 2 {
        let vaddr = i * PAGE_SIZE as u32;
        let pte = Pte::decode(pt.read_pte(vaddr));
        let touched = match pte {
            Pte::Resident { frame, flags } => Pte::Resident { frame, flags: flags | PteFlags::ACCESS },
            other => other,
        };
        pt.write_pte(vaddr, touched.encode());
    }

    // Force eviction of n/2 frames by reclaiming directly.
    let mut evicted_vaddrs = Vec::new();
    for _ in 0..n / 2 {
        engine.reclaim_one().expect("swap has ample headroom for this scenario");
    }
    for i in 0..n {
        let vaddr = i * PAGE_SIZE as u32;
        if Pte::decode(pt.read_pte(vaddr)).is_swapped() {
            evicted_vaddrs.push(i);
        }
    }

    assert_eq!(evicted_vaddrs.len() as u32, n / 2);
    for i in evicted_vaddrs {
        assert!(i >= n / 2, "page {} was touched and must not be evicted on the first revolution", i);
    }
}

#[test]
fn law_round_trip_survives_random_interleaving_of_evictions_and_faults() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let engine = engine_with_frames(64);
    let pt = TestPageTable::new();
    let space = AddressSpace::new(pt.clone());
    let handle: PageTableHandle = pt.clone();

    const N: u32 = 500;
    let mut pattern = vec![0u8; N as usize];
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    for i in 0..N {
        let p = rng.gen::<u8>();
        pattern[i as usize] = p;
        map_page(&engine, &space, i * PAGE_SIZE as u32, p).unwrap();
    }

    // Randomly force additional eviction rounds, then read pages back in any order.
    for _ in 0..200 {
        let _ = engine.reclaim_one();
    }

    let mut order: Vec<u32> = (0..N).collect();
    for i in (1..order.len()).rev() {
        let j = rng.gen_range(0..=i);
        order.swap(i, j);
    }
    for i in order {
        let vaddr = i * PAGE_SIZE as u32;
        assert_eq!(read_byte0(&engine, &handle, vaddr), pattern[i as usize], "page {} must read back its original byte after random eviction pressure", i);
    }
}
