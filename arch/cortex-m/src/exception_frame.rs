// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! The register frame the core pushes on exception entry.

use core::fmt;

/// Registers stacked by hardware on exception entry, lowest address first.
///
/// A fault handler that returns normally makes the core pop this frame, so
/// writing `pc` changes where the interrupted code resumes.
#[repr(C)]
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct ExceptionFrame {
    pub r0: u32,
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
    pub r12: u32,
    pub lr: u32,
    /// Address of the instruction that was executing, word 6 of the frame.
    pub pc: u32,
    pub xpsr: u32,
}

impl ExceptionFrame {
    /// Index of the stacked program counter in the frame, in words.
    pub const PC_WORD: usize = 6;

    /// Reinterprets a stacked frame in place.
    ///
    /// # Safety
    ///
    /// `stack` must be the stack pointer value at exception entry, pointing
    /// at a hardware-stacked frame that stays valid for `'a`.
    pub unsafe fn from_stack<'a>(stack: *mut u32) -> &'a mut ExceptionFrame {
        &mut *stack.cast::<ExceptionFrame>()
    }

    /// Exception number of the interrupted context. Zero for thread mode.
    pub fn interrupted_exception(&self) -> u32 {
        // IPSR[8:0] is stacked as part of the xPSR
        self.xpsr & 0x1ff
    }

    /// IT[7:0] of the interrupted context: IT[1:0] is stacked in xPSR[26:25]
    /// and IT[7:2] in xPSR[15:10]. Non-zero inside an IT block.
    pub fn it_state(&self) -> u8 {
        let low = (self.xpsr >> 25) & 0b11;
        let high = (self.xpsr >> 10) & 0b11_1111;
        ((high << 2) | low) as u8
    }

    pub fn context(&self) -> FaultContext {
        FaultContext {
            saved_stack_pointer: self as *const ExceptionFrame as usize as u32,
            program_counter: self.pc,
        }
    }
}

/// Where a fault happened: the address of the stacked frame the entry
/// sequence passed in and the stacked PC of the faulting instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaultContext {
    pub saved_stack_pointer: u32,
    pub program_counter: u32,
}

impl fmt::Debug for ExceptionFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        struct Hex(u32);
        impl fmt::Debug for Hex {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{:#010x}", self.0)
            }
        }
        f.debug_struct("ExceptionFrame")
            .field("r0", &Hex(self.r0))
            .field("r1", &Hex(self.r1))
            .field("r2", &Hex(self.r2))
            .field("r3", &Hex(self.r3))
            .field("r12", &Hex(self.r12))
            .field("lr", &Hex(self.lr))
            .field("pc", &Hex(self.pc))
            .field("xpsr", &Hex(self.xpsr))
            .finish()
    }
}
