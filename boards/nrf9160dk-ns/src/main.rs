// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Non-secure image for the nRF9160 DK.
//!
//! Brings up the privilege boundary (boundary symbols, privileged data,
//! static task memory, MemManage fault entry) and hands over to the
//! scheduler and the demo tasks, which are linked in from C.

#![no_std]
// Disable this attribute when documenting, as a workaround for
// https://github.com/rust-lang/rust/issues/62184.
#![cfg_attr(not(doc), no_main)]

use core::ptr::{addr_of, addr_of_mut};

use partition::{debug, CONFIG};
use partition_rt0::DataSection;

pub mod boundaries;
pub mod fault;
pub mod io;
pub mod memory_map;
pub mod scheduler_hooks;
pub mod startup;

extern "C" {
    static __privileged_data_load_start__: u8;
    static mut __privileged_data_start__: u8;
    static mut __privileged_data_end__: u8;
}

#[allow(non_snake_case)]
extern "C" {
    fn vBoardInit();
    fn vStartLogTask();
    fn vStartCLITask();
    fn vStartTZDemo();
    fn vStartMPUDemo();
    fn vStartBlinkyDemo();
    fn vTaskStartScheduler();
}

/// Copies the privileged data image from flash into privileged RAM.
///
/// Runs before the scheduler enables the MPU, while everything is still
/// accessible.
unsafe fn initialize_privileged_data() {
    let section = DataSection::new(
        addr_of!(__privileged_data_load_start__),
        addr_of_mut!(__privileged_data_start__),
        addr_of_mut!(__privileged_data_end__),
    );
    partition_rt0::materialize(&section);

    if CONFIG.debug_boundaries {
        debug!(
            "privileged data: {} bytes from {:p} to {:p}",
            section.len(),
            section.load_start(),
            section.exec_start()
        );
    }
}

/// Main function called after RAM initialized.
pub unsafe fn main() {
    initialize_privileged_data();

    let boundaries = boundaries::boundary_table();
    if boundaries != memory_map::MEMORY_MAP {
        panic!("linked boundaries differ from the memory map:\r\n{}", boundaries);
    }
    if CONFIG.debug_boundaries {
        debug!("privilege boundaries:\r\n{}", boundaries);
    }

    vBoardInit();

    vStartLogTask();
    vStartCLITask();

    vStartTZDemo();
    vStartMPUDemo();
    vStartBlinkyDemo();

    vTaskStartScheduler();

    // Only reached if the scheduler could not create the idle or timer task.
    panic!("scheduler returned: not enough heap for the idle or timer task");
}
