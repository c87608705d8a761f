// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Data structure for storing compile-time configuration options.
//!
//! Configuration is a typed `const` object rather than scattered `#[cfg]`
//! blocks. Every code path is type-checked whatever the configuration, and
//! the compiler folds the constants so disabled paths cost nothing in the
//! final image.
//!
//! The values are set from the cargo features of this crate. A board selects
//! them through its dependency on `partition`, and feature unification makes
//! the choice global.

/// Data structure holding compile-time configuration options.
pub struct Config {
    /// Whether the memory fault diagnostic may resume a faulting task past
    /// the offending instruction.
    ///
    /// Only faults classified as skippable data accesses are ever resumed.
    /// With this disabled, every memory fault halts the system.
    pub fault_recovery: bool,

    /// Whether the memory fault diagnostic prints the full fault report
    /// (classification, stacked PC, fault status bits) to the debug output
    /// before resuming or halting.
    pub debug_memory_faults: bool,

    /// Whether the board prints the region boundary table at boot.
    ///
    /// Useful to check that the linker placed the privileged and
    /// unprivileged sections where the MPU configuration expects them.
    pub debug_boundaries: bool,
}

/// The unique instance of `Config`. This is the only place where `#[cfg(x)]`
/// style configuration based on cargo features is permitted.
pub const CONFIG: Config = Config {
    fault_recovery: cfg!(feature = "fault_recovery"),
    debug_memory_faults: !cfg!(feature = "no_debug_faults"),
    debug_boundaries: cfg!(feature = "debug_boundaries"),
};
