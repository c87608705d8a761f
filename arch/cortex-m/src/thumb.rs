// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Thumb instruction length decoding.
//!
//! A Thumb instruction is either one halfword or two. The first halfword
//! alone says which: if its top five bits are `0b11101`, `0b11110` or
//! `0b11111` it is the first half of a 32-bit instruction, anything else is
//! a complete 16-bit instruction (ARMv7-M ARM, A5.1).

use crate::exception_frame::{ExceptionFrame, FaultContext};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstructionWidth {
    /// 16-bit instruction.
    Narrow,
    /// 32-bit instruction.
    Wide,
}

impl InstructionWidth {
    pub const fn bytes(self) -> u32 {
        match self {
            InstructionWidth::Narrow => 2,
            InstructionWidth::Wide => 4,
        }
    }
}

/// Width of the instruction starting with `halfword`.
pub const fn instruction_width(halfword: u16) -> InstructionWidth {
    match halfword >> 11 {
        0b11101 | 0b11110 | 0b11111 => InstructionWidth::Wide,
        _ => InstructionWidth::Narrow,
    }
}

/// Address of the instruction following the one at `pc`, whose first
/// halfword is `halfword`.
pub const fn resume_address(pc: u32, halfword: u16) -> u32 {
    pc.wrapping_add(instruction_width(halfword).bytes())
}

/// Read access to instruction memory.
pub trait InstructionFetch {
    /// The halfword stored at `address`, little endian.
    fn halfword(&self, address: u32) -> u16;
}

/// Instruction fetch from the executing core's own memory.
pub struct CodeMemory {
    _private: (),
}

impl CodeMemory {
    /// # Safety
    ///
    /// Every address passed to [`InstructionFetch::halfword`] must be
    /// halfword aligned and readable at the current privilege level.
    pub const unsafe fn new() -> CodeMemory {
        CodeMemory { _private: () }
    }
}

impl InstructionFetch for CodeMemory {
    fn halfword(&self, address: u32) -> u16 {
        // SAFETY: readability is a precondition of constructing `CodeMemory`.
        unsafe { (address as usize as *const u16).read_volatile() }
    }
}

/// Points the stacked PC of `frame` past the faulting instruction at
/// `context.program_counter` and returns the new PC.
///
/// `context` must have been taken from `frame`. Only the first halfword is
/// read, so this is safe to use for any PC the fetch can read even when the
/// instruction is the last one in a region.
pub fn skip_faulting_instruction<F: InstructionFetch + ?Sized>(
    frame: &mut ExceptionFrame,
    context: &FaultContext,
    code: &F,
) -> u32 {
    let pc = context.program_counter;
    frame.pc = resume_address(pc, code.halfword(pc));
    frame.pc
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Little endian code image mapped at `base`.
    struct Flash<'a> {
        base: u32,
        image: &'a [u8],
    }

    impl InstructionFetch for Flash<'_> {
        fn halfword(&self, address: u32) -> u16 {
            let offset = (address - self.base) as usize;
            u16::from_le_bytes([self.image[offset], self.image[offset + 1]])
        }
    }

    #[test]
    fn every_halfword_matches_prefix_rule() {
        for halfword in 0..=u16::MAX {
            let top = halfword >> 11;
            let wide = top == 0b11101 || top == 0b11110 || top == 0b11111;
            let expected = if wide { 4 } else { 2 };
            assert_eq!(
                instruction_width(halfword).bytes(),
                expected,
                "halfword {:#06x}",
                halfword
            );
        }
    }

    #[test]
    fn boundary_encodings() {
        // 0b11100 is the 16-bit unconditional branch
        assert_eq!(instruction_width(0xE7FE), InstructionWidth::Narrow);
        assert_eq!(instruction_width(0xE800), InstructionWidth::Wide);
        assert_eq!(instruction_width(0xF000), InstructionWidth::Wide);
        assert_eq!(instruction_width(0xFFFF), InstructionWidth::Wide);
        assert_eq!(instruction_width(0x0000), InstructionWidth::Narrow);
    }

    #[test]
    fn resume_address_wraps() {
        assert_eq!(resume_address(0x4_9000, 0x6800), 0x4_9002);
        assert_eq!(resume_address(0x4_9000, 0xF8D0), 0x4_9004);
        assert_eq!(resume_address(0xFFFF_FFFE, 0xF8D0), 0x2);
    }

    #[test]
    fn wide_load_is_skipped_entirely() {
        // ldr.w r1, [r0, #4] ; movs r0, #0
        let image = [0xD0, 0xF8, 0x04, 0x10, 0x00, 0x20];
        let flash = Flash {
            base: 0x4_9100,
            image: &image,
        };
        let mut frame = ExceptionFrame {
            pc: 0x4_9100,
            ..Default::default()
        };

        let context = frame.context();
        assert_eq!(skip_faulting_instruction(&mut frame, &context, &flash), 0x4_9104);
        assert_eq!(frame.pc, 0x4_9104);
        // The next instruction is a narrow one.
        assert_eq!(instruction_width(flash.halfword(frame.pc)).bytes(), 2);
    }

    #[test]
    fn narrow_store_advances_by_two() {
        // str r1, [r0] ; str r1, [r0]
        let image = [0x01, 0x60, 0x01, 0x60];
        let flash = Flash {
            base: 0x4_9200,
            image: &image,
        };
        let mut stack = [0u32; 8];
        stack[ExceptionFrame::PC_WORD] = 0x4_9200;
        let frame = unsafe { ExceptionFrame::from_stack(stack.as_mut_ptr()) };

        let context = frame.context();
        assert_eq!(context.program_counter, 0x4_9200);
        assert_eq!(skip_faulting_instruction(frame, &context, &flash), 0x4_9202);
        assert_eq!(stack[ExceptionFrame::PC_WORD], 0x4_9202);
        // Only the PC word is written back.
        assert!(stack
            .iter()
            .enumerate()
            .all(|(i, word)| i == ExceptionFrame::PC_WORD || *word == 0));
    }
}
