// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Privilege boundary core.
//!
//! This crate holds the hardware independent half of bringing up a system
//! whose flash and RAM are split into privileged and unprivileged regions:
//!
//! - [`regions`]: the region boundary table the MPU configuration and the
//!   privileged loader read, with its layout validation.
//! - [`static_memory`]: statically owned control block and stack storage for
//!   the scheduler's idle and timer service units.
//! - [`debug`]: the `debug!` macro and its RAM output buffer.
//! - [`config`]: compile-time configuration.
//!
//! Architecture specific pieces (exception entry, instruction decoding, fault
//! status registers) live in the `cortexm` crate; the runtime init helpers
//! in `partition-rt0`.

#![no_std]

#[macro_use]
pub mod debug;

pub mod config;
pub mod regions;
pub mod static_memory;
pub mod utilities;

pub use crate::config::CONFIG;
