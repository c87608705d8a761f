// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Non-secure memory map of the nRF9160.
//!
//! The secure image owns flash below 0x40000 and RAM below 0x20010000. This
//! file is also compiled by `build.rs`, which validates the map and turns it
//! into the `MEMORY` block of the linker script.

use partition::regions::{BoundaryTable, RegionBoundary};

/// MPU region granule of the ARMv8-M MPU.
pub const MPU_REGION_ALIGNMENT: usize = 32;

pub const PRIVILEGED_FLASH: RegionBoundary =
    RegionBoundary::from_linker_range(0x0004_0000, 0x0004_8000);
pub const SYSCALLS_FLASH: RegionBoundary =
    RegionBoundary::from_linker_range(0x0004_8000, 0x0004_9000);
pub const UNPRIVILEGED_FLASH: RegionBoundary =
    RegionBoundary::from_linker_range(0x0004_9000, 0x0010_0000);
pub const PRIVILEGED_RAM: RegionBoundary =
    RegionBoundary::from_linker_range(0x2001_0000, 0x2001_2000);

/// The rest of non-secure RAM, readable and writable by every task.
pub const UNPRIVILEGED_RAM: RegionBoundary =
    RegionBoundary::from_linker_range(0x2001_2000, 0x2004_0000);

/// Main stack size, placed in privileged RAM.
pub const MAIN_STACK_BYTES: usize = 0x1000;

pub const MEMORY_MAP: BoundaryTable = BoundaryTable::new(
    PRIVILEGED_FLASH,
    SYSCALLS_FLASH,
    UNPRIVILEGED_FLASH,
    PRIVILEGED_RAM,
);
