// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Cortex-M support for the privilege boundary: exception frames, Thumb
//! instruction decoding, fault status registers and the MemManage entry.
//!
//! Covers ARMv7-M and ARMv8-M mainline. Everything that needs the real core
//! is only compiled for `target_arch = "arm", target_os = "none"`; host
//! builds get mocks so the decoding and classification logic can be unit
//! tested.

#![no_std]

pub mod exception_frame;
pub mod memory_fault;
pub mod scb;
pub mod support;
pub mod thumb;

pub use crate::exception_frame::ExceptionFrame;
pub use crate::memory_fault::memory_management_handler;
