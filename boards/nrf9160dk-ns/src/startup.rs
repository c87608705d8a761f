// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Vector table and reset handler.

use core::ptr::{addr_of, addr_of_mut};

use cortexm::memory_management_handler;
use partition_rt0::DataSection;

extern "C" {
    // Symbols defined in the linker file
    static mut _erelocate: u8;
    static _sidata: u8;
    static mut _srelocate: u8;
    static mut _ezero: u32;
    static mut _szero: u32;

    // _estack is not really a function, but it makes the types work
    // You should never actually invoke it!!
    fn _estack();
}

// Exception handlers of the scheduler's ARMv8-M port.
#[allow(non_snake_case)]
extern "C" {
    fn SVC_Handler();
    fn PendSV_Handler();
    fn SysTick_Handler();
}

/// Number of peripheral interrupt lines on the nRF9160.
const IRQ_COUNT: usize = 65;

unsafe extern "C" fn unhandled_interrupt() {
    // IPSR[8:0] holds the currently active interrupt
    let interrupt_number = cortexm::support::active_exception();
    panic!("Unhandled Interrupt. ISR {} is active.", interrupt_number);
}

#[cfg_attr(
    all(target_arch = "arm", target_os = "none"),
    link_section = ".vectors"
)]
// used Ensures that the symbol is kept until the final binary
#[cfg_attr(all(target_arch = "arm", target_os = "none"), used)]
/// ARMv8-M exception vectors
pub static BASE_VECTORS: [unsafe extern "C" fn(); 16] = [
    // Stack Pointer
    _estack,
    // Reset Handler
    reset_handler,
    // NMI
    unhandled_interrupt,
    // Hard Fault
    unhandled_interrupt,
    // Memory Management Fault
    memory_management_handler,
    // Bus Fault
    unhandled_interrupt,
    // Usage Fault
    unhandled_interrupt,
    // Secure Fault
    unhandled_interrupt,
    // Reserved
    unhandled_interrupt,
    // Reserved
    unhandled_interrupt,
    // Reserved
    unhandled_interrupt,
    // SVCall
    SVC_Handler,
    // Debug Monitor
    unhandled_interrupt,
    // Reserved
    unhandled_interrupt,
    // PendSV
    PendSV_Handler,
    // SysTick
    SysTick_Handler,
];

#[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".irqs")]
#[cfg_attr(all(target_arch = "arm", target_os = "none"), used)]
pub static IRQS: [unsafe extern "C" fn(); IRQ_COUNT] =
    [unhandled_interrupt as unsafe extern "C" fn(); IRQ_COUNT];

/// Entry point after reset.
///
/// Clears BSS and copies `.data` so Rust statics hold their initial values,
/// points VTOR at [`BASE_VECTORS`] and enters `main`.
#[no_mangle]
pub unsafe extern "C" fn reset_handler() {
    partition_rt0::zero_bss(addr_of_mut!(_szero), addr_of_mut!(_ezero));
    partition_rt0::materialize(&DataSection::new(
        addr_of!(_sidata),
        addr_of_mut!(_srelocate),
        addr_of_mut!(_erelocate),
    ));

    cortexm::scb::set_vector_table_offset(BASE_VECTORS.as_ptr() as *const ());
    cortexm::scb::enable_memory_management_fault();
    cortexm::support::barrier();

    crate::main();
}
