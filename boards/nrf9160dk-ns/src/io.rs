// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

use core::panic::PanicInfo;

use partition::debug;

/// Lets the log task pull pending `debug!` output into `buffer`. Returns the
/// number of bytes written.
#[no_mangle]
pub unsafe extern "C" fn partition_debug_drain(buffer: *mut u8, len: usize) -> usize {
    if buffer.is_null() || len == 0 {
        return 0;
    }
    debug::drain(core::slice::from_raw_parts_mut(buffer, len))
}

#[cfg(not(test))]
#[no_mangle]
#[panic_handler]
/// Panic handler
pub unsafe fn panic_fmt(pi: &PanicInfo) -> ! {
    // A fault report must get out even if the fault preempted a writer.
    debug::debug_print_forced(format_args!("\r\n{}\r\n", pi));
    cortexm::support::halt()
}
