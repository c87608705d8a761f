// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Helper functions for the Cortex-M architecture.

/// NOP instruction
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn nop() {
    use core::arch::asm;
    unsafe {
        asm!("nop", options(nomem, nostack, preserves_flags));
    }
}

/// Current process stack pointer.
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn read_psp() -> u32 {
    use core::arch::asm;
    let psp: u32;
    unsafe {
        asm!("mrs {}, psp", out(reg) psp, options(nomem, nostack, preserves_flags));
    }
    psp
}

/// Number of the active exception, IPSR[8:0]. Zero in thread mode.
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn active_exception() -> u32 {
    use core::arch::asm;
    let ipsr: u32;
    unsafe {
        asm!("mrs {}, ipsr", out(reg) ipsr, options(nomem, nostack, preserves_flags));
    }
    ipsr & 0x1ff
}

/// Data and instruction synchronization barriers, required after changing
/// the vector table or fault enables before relying on them.
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn barrier() {
    use core::arch::asm;
    unsafe {
        asm!("dsb", "isb", options(nomem, nostack, preserves_flags));
    }
}

// Mock implementations for tests on the host.

/// NOP instruction (mock)
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub fn nop() {
    unimplemented!()
}

#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub fn read_psp() -> u32 {
    unimplemented!()
}

#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub fn active_exception() -> u32 {
    unimplemented!()
}

#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub fn barrier() {
    unimplemented!()
}

/// Stops making progress. Used once a fault or panic has been reported.
pub fn halt() -> ! {
    loop {
        // This is required to avoid the empty loop clippy
        // warning #[warn(clippy::empty_loop)]
        nop();
    }
}
