// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

// NOTE: Adapted from cortex-m/build.rs
use std::env;

fn main() {
    let target = env::var("TARGET").unwrap();
    let target_os = target.split('-').nth(2).unwrap_or("none");

    println!("cargo:rustc-check-cfg=cfg(baremetal)");

    // If we're not running on a desktop-class operating system, emit the "baremetal"
    // config setting. This lets the memory subsystem pick its real, statically
    // allocated backing stores instead of the host-test doubles.
    if target_os == "none" {
        println!("Target {} is bare metal", target);
        println!("cargo:rustc-cfg=baremetal");
    } else {
        println!("Target {} is NOT bare metal", target);
    }

    println!("cargo:rerun-if-changed=build.rs");
}
