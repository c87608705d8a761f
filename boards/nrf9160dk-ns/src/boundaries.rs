// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Region boundaries published to the scheduler's MPU port.
//!
//! The port programs one MPU region per entry from these pointer variables.
//! The linker provides exclusive end markers; the port wants the last valid
//! address, so every `_end__` value is its marker minus one byte.

#![allow(non_upper_case_globals)]

use core::ptr::addr_of;

use partition::regions::{BoundaryAddress, BoundaryTable, RegionBoundary};

extern "C" {
    static __PRIVILEGED_FLASH_NS_segment_start__: u32;
    static __PRIVILEGED_FLASH_NS_segment_end__: u32;
    static __SYSCALLS_FLASH_NS_segment_start__: u32;
    static __SYSCALLS_FLASH_NS_segment_end__: u32;
    static __UNPRIVILEGED_FLASH_NS_segment_start__: u32;
    static __UNPRIVILEGED_FLASH_NS_segment_end__: u32;
    static __PRIVILEGED_RAM_NS_segment_start__: u32;
    static __PRIVILEGED_RAM_NS_segment_end__: u32;
}

#[no_mangle]
pub static __privileged_functions_start__: BoundaryAddress =
    BoundaryAddress::start(unsafe { addr_of!(__PRIVILEGED_FLASH_NS_segment_start__) });
#[no_mangle]
pub static __privileged_functions_end__: BoundaryAddress =
    BoundaryAddress::inclusive_end(unsafe { addr_of!(__PRIVILEGED_FLASH_NS_segment_end__) });
#[no_mangle]
pub static __syscalls_flash_start__: BoundaryAddress =
    BoundaryAddress::start(unsafe { addr_of!(__SYSCALLS_FLASH_NS_segment_start__) });
#[no_mangle]
pub static __syscalls_flash_end__: BoundaryAddress =
    BoundaryAddress::inclusive_end(unsafe { addr_of!(__SYSCALLS_FLASH_NS_segment_end__) });
#[no_mangle]
pub static __unprivileged_flash_start__: BoundaryAddress =
    BoundaryAddress::start(unsafe { addr_of!(__UNPRIVILEGED_FLASH_NS_segment_start__) });
#[no_mangle]
pub static __unprivileged_flash_end__: BoundaryAddress =
    BoundaryAddress::inclusive_end(unsafe { addr_of!(__UNPRIVILEGED_FLASH_NS_segment_end__) });
#[no_mangle]
pub static __privileged_sram_start__: BoundaryAddress =
    BoundaryAddress::start(unsafe { addr_of!(__PRIVILEGED_RAM_NS_segment_start__) });
#[no_mangle]
pub static __privileged_sram_end__: BoundaryAddress =
    BoundaryAddress::inclusive_end(unsafe { addr_of!(__PRIVILEGED_RAM_NS_segment_end__) });

fn region(start: &BoundaryAddress, end: &BoundaryAddress) -> RegionBoundary {
    RegionBoundary::new_inclusive(start.address(), end.address())
}

/// The boundaries as linked, in the form the fault policy and the boot log
/// use.
pub fn boundary_table() -> BoundaryTable {
    BoundaryTable::new(
        region(&__privileged_functions_start__, &__privileged_functions_end__),
        region(&__syscalls_flash_start__, &__syscalls_flash_end__),
        region(&__unprivileged_flash_start__, &__unprivileged_flash_end__),
        region(&__privileged_sram_start__, &__privileged_sram_end__),
    )
}
