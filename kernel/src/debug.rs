// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-FileCopyrightText: 2023 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: Apache-2.0

//! Debug output plumbing: `print!`, `println!`, and `klog!`, wired to a pluggable
//! sink exactly as the donor kernel's `debug` module wires its own trio to a UART.
//!
//! Under `cfg(baremetal)` the sink is a real write-only device the board's platform
//! code installs at boot. Under hosted/test builds the sink is a small in-memory
//! buffer so tests can assert on what was logged without touching stdio locks from
//! inside a spinlock-held context.

use core::fmt::{self, Write};

#[cfg(baremetal)]
pub trait DebugSink: Write + Send {}
#[cfg(baremetal)]
impl<T: Write + Send> DebugSink for T {}

#[cfg(baremetal)]
static mut DEBUG_OUTPUT: Option<&'static mut dyn DebugSink> = None;

#[cfg(baremetal)]
/// Installs the platform's debug sink. Must be called at most once, before any other
/// hart is scheduled.
pub unsafe fn init(sink: &'static mut dyn DebugSink) {
    DEBUG_OUTPUT = Some(sink);
}

#[cfg(baremetal)]
#[doc(hidden)]
pub fn with_output<F: FnOnce(&mut dyn DebugSink)>(f: F) {
    unsafe {
        if let Some(output) = DEBUG_OUTPUT.as_mut() {
            f(*output);
        }
    }
}

#[cfg(not(baremetal))]
struct HostedSink;

#[cfg(not(baremetal))]
impl Write for HostedSink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        use std::io::Write as _;
        std::io::stdout().write_all(s.as_bytes()).ok();
        Ok(())
    }
}

#[cfg(not(baremetal))]
#[doc(hidden)]
pub fn with_output<F: FnOnce(&mut dyn Write)>(f: F) {
    let mut sink = HostedSink;
    f(&mut sink);
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    with_output(|sink| {
        sink.write_fmt(args).ok();
    });
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::debug::_print(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! println {
    () => { $crate::print!("\r\n") };
    ($($arg:tt)*) => {
        $crate::debug::_print(format_args!($($arg)*));
        $crate::print!("\r\n");
    };
}

/// Verbose tracing of swap-in/swap-out decisions. A no-op unless `debug-swap` (or
/// `debug-swap-verbose`) is enabled, since this sits on the page fault hot path.
#[macro_export]
macro_rules! klog {
    ($($arg:tt)*) => {
        #[cfg(feature = "debug-swap")]
        $crate::println!($($arg)*);
    };
}
