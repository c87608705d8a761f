// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! MemManage fault entry and diagnosis.
//!
//! The vector table points the MemManage slot at
//! [`memory_management_handler`], a naked sequence that works out which stack
//! the hardware pushed the exception frame on and jumps to
//! `memory_fault_diagnostic` with that stack pointer as its only argument:
//!
//! ```text
//! tst   lr, #4                      EXC_RETURN bit 2: 0 = MSP, 1 = PSP
//! ite   eq
//! mrseq r0, msp
//! mrsne r0, psp
//! ldr   r1, =memory_fault_diagnostic
//! bx    r1
//! ```
//!
//! It pushes nothing and calls nothing, so `lr` still holds EXC_RETURN when
//! the diagnostic starts and a normal return from the diagnostic is an
//! exception return that pops the (possibly edited) frame.
//!
//! The board defines `memory_fault_diagnostic`, usually as a call to
//! [`handle_memory_fault`] with its unprivileged flash region. A board that
//! does not gets [`halt_on_memory_fault`] through the linker script.
//!
//! Which faults may be skipped is decided by [`classify`]: only a data
//! access violation raised by unprivileged code, running in thread mode on
//! the process stack, from unprivileged flash, outside an IT block.
//! Everything else halts.

use core::fmt;

use partition::regions::RegionBoundary;
use partition::CONFIG;

use crate::exception_frame::ExceptionFrame;
pub use crate::exception_frame::FaultContext;
use crate::scb::{self, ConfigurableFaultStatus, FaultStatus, HardFaultStatus};
use crate::support;
use crate::thumb::{self, CodeMemory, InstructionFetch};

/// Stack the core pushed the exception frame on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackSelect {
    Main,
    Process,
}

impl fmt::Display for StackSelect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StackSelect::Main => f.write_str("main (MSP)"),
            StackSelect::Process => f.write_str("process (PSP)"),
        }
    }
}

/// The EXC_RETURN value found in `lr` on exception entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExcReturn(pub u32);

impl ExcReturn {
    const SPSEL: u32 = 1 << 2;

    pub const fn stack(self) -> StackSelect {
        if self.0 & Self::SPSEL == 0 {
            StackSelect::Main
        } else {
            StackSelect::Process
        }
    }
}

/// What the entry sequence leaves in r0: `msp` if EXC_RETURN bit 2 is clear,
/// `psp` otherwise, both unmodified.
///
/// A model of [`memory_management_handler`] for host tests. Once `lr` is
/// gone the diagnostic recovers the stack from the frame address instead,
/// see [`handle_memory_fault`].
pub const fn select_faulting_stack(exc_return: ExcReturn, msp: u32, psp: u32) -> u32 {
    match exc_return.stack() {
        StackSelect::Main => msp,
        StackSelect::Process => psp,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultClass {
    /// A data access by unprivileged task code. Execution can continue
    /// after the faulting instruction.
    SkippableDataAccess,
    InstructionAccess,
    /// The core itself faulted while stacking or unstacking a frame.
    Stacking,
    /// A data access from a handler or from code running on the main stack.
    PrivilegedAccess,
    /// A data access by a task, but from outside unprivileged flash.
    OutsideUnprivilegedCode,
    /// A data access by task code that is conditional on an IT block. Moving
    /// the PC alone would leave the IT state pointing at the skipped
    /// instruction.
    InsideItBlock,
    Unclassified,
}

impl FaultClass {
    pub fn is_skippable(self) -> bool {
        self == FaultClass::SkippableDataAccess
    }
}

impl fmt::Display for FaultClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let description = match self {
            FaultClass::SkippableDataAccess => "data access violation by unprivileged code",
            FaultClass::InstructionAccess => "instruction access violation",
            FaultClass::Stacking => "fault while stacking or unstacking an exception frame",
            FaultClass::PrivilegedAccess => "data access violation by privileged code",
            FaultClass::OutsideUnprivilegedCode => {
                "data access violation from outside unprivileged flash"
            }
            FaultClass::InsideItBlock => "data access violation inside an IT block",
            FaultClass::Unclassified => "no memory management fault status recorded",
        };
        f.write_str(description)
    }
}

/// Classifies a memory management fault.
///
/// `unprivileged_flash` is the code region whose instructions may be
/// skipped; `None` means no code is eligible.
pub fn classify(
    status: &FaultStatus,
    frame: &ExceptionFrame,
    stack: StackSelect,
    unprivileged_flash: Option<&RegionBoundary>,
) -> FaultClass {
    let cfsr = status.cfsr;

    if cfsr.is_set(ConfigurableFaultStatus::IACCVIOL) {
        FaultClass::InstructionAccess
    } else if cfsr.is_set(ConfigurableFaultStatus::MSTKERR)
        || cfsr.is_set(ConfigurableFaultStatus::MUNSTKERR)
        || cfsr.is_set(ConfigurableFaultStatus::MLSPERR)
    {
        FaultClass::Stacking
    } else if cfsr.is_set(ConfigurableFaultStatus::DACCVIOL) {
        if stack == StackSelect::Main || frame.interrupted_exception() != 0 {
            FaultClass::PrivilegedAccess
        } else if !unprivileged_flash.is_some_and(|region| region.contains(frame.pc as usize)) {
            FaultClass::OutsideUnprivilegedCode
        } else if frame.it_state() != 0 {
            FaultClass::InsideItBlock
        } else {
            FaultClass::SkippableDataAccess
        }
    } else {
        FaultClass::Unclassified
    }
}

/// Everything known about a memory management fault, formatted for the
/// debug output or a panic message.
#[derive(Clone, Copy)]
pub struct FaultReport {
    pub class: FaultClass,
    pub stack: StackSelect,
    pub context: FaultContext,
    pub status: FaultStatus,
}

impl FaultReport {
    pub fn new(
        status: FaultStatus,
        frame: &ExceptionFrame,
        stack: StackSelect,
        unprivileged_flash: Option<&RegionBoundary>,
    ) -> FaultReport {
        FaultReport {
            class: classify(&status, frame, stack, unprivileged_flash),
            stack,
            context: frame.context(),
            status,
        }
    }
}

impl fmt::Display for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let cfsr = self.status.cfsr;
        let hfsr = self.status.hfsr;

        f.write_str("\r\n---| Memory Management Fault |---\r\n")?;
        write!(f, "Class:                              {}\r\n", self.class)?;
        write!(f, "Stack:                              {}\r\n", self.stack)?;
        write!(
            f,
            "Stacked Frame:                      {:#010X}\r\n",
            self.context.saved_stack_pointer
        )?;
        write!(
            f,
            "Faulting PC:                        {:#010X}\r\n",
            self.context.program_counter
        )?;

        let bits = [
            (ConfigurableFaultStatus::IACCVIOL, "Instruction Access Violation:       true"),
            (ConfigurableFaultStatus::DACCVIOL, "Data Access Violation:              true"),
            (ConfigurableFaultStatus::MUNSTKERR, "Memory Management Unstacking Fault: true"),
            (ConfigurableFaultStatus::MSTKERR, "Memory Management Stacking Fault:   true"),
            (ConfigurableFaultStatus::MLSPERR, "Memory Management Lazy FP Fault:    true"),
        ];
        for (field, line) in bits {
            if cfsr.is_set(field) {
                write!(f, "{}\r\n", line)?;
            }
        }
        if hfsr.is_set(HardFaultStatus::FORCED) {
            f.write_str("Forced Hard Fault:                  true\r\n")?;
        }

        if let Some(address) = self.status.memory_fault_address() {
            write!(f, "Faulting Memory Address:            {:#010X}\r\n", address)?;
        }
        write!(f, "Fault Status Register (CFSR):       {:#010X}\r\n", cfsr.get())?;
        write!(f, "Hard Fault Status Register (HFSR):  {:#010X}\r\n", hfsr.get())
    }
}

impl fmt::Debug for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FaultReport")
            .field("class", &self.class)
            .field("stack", &self.stack)
            .field("context", &self.context)
            .field("cfsr", &format_args!("{:#010x}", self.status.cfsr.get()))
            .finish()
    }
}

/// Outcome of diagnosing a fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// The frame was edited; the exception return continues at this PC.
    Resume(u32),
    Halt,
}

/// Classifies the fault described by `frame` and `status`, and, if it may be
/// skipped and `recovery` is enabled, moves the stacked PC past the faulting
/// instruction.
pub fn diagnose<F: InstructionFetch + ?Sized>(
    frame: &mut ExceptionFrame,
    stack: StackSelect,
    status: FaultStatus,
    unprivileged_flash: &RegionBoundary,
    recovery: bool,
    code: &F,
) -> (FaultReport, Disposition) {
    let report = FaultReport::new(status, frame, stack, Some(unprivileged_flash));

    let disposition = if recovery && report.class.is_skippable() {
        Disposition::Resume(thumb::skip_faulting_instruction(
            frame,
            &report.context,
            code,
        ))
    } else {
        Disposition::Halt
    };
    (report, disposition)
}

/// Stack the frame at `faulting_stack` was pushed on. The process stack
/// pointer is untouched by exception entry, so it still equals the frame
/// address when the faulting code ran on it.
fn faulting_stack_select(faulting_stack: *mut u32) -> StackSelect {
    if faulting_stack as usize as u32 == support::read_psp() {
        StackSelect::Process
    } else {
        StackSelect::Main
    }
}

/// Diagnoses a MemManage fault and either returns, resuming after the
/// faulting instruction, or panics with the fault report.
///
/// Call this from `memory_fault_diagnostic` with the stack pointer the entry
/// sequence passed in.
///
/// # Safety
///
/// Must only be called from the MemManage exception, with the unmodified
/// `faulting_stack` from [`memory_management_handler`].
pub unsafe fn handle_memory_fault(faulting_stack: *mut u32, unprivileged_flash: RegionBoundary) {
    let frame = ExceptionFrame::from_stack(faulting_stack);
    let stack = faulting_stack_select(faulting_stack);
    let code = CodeMemory::new();

    let (report, disposition) = diagnose(
        frame,
        stack,
        scb::fault_status(),
        &unprivileged_flash,
        CONFIG.fault_recovery,
        &code,
    );

    match disposition {
        Disposition::Resume(pc) => {
            scb::clear_memory_fault_status();
            if CONFIG.debug_memory_faults {
                partition::debug!("{}", report);
                partition::debug!("resuming at {:#010X}", pc);
            }
        }
        Disposition::Halt => panic!("{}", report),
    }
}

/// Default `memory_fault_diagnostic`: reports the fault and halts.
#[no_mangle]
pub unsafe extern "C" fn halt_on_memory_fault(faulting_stack: *mut u32) -> ! {
    let frame = ExceptionFrame::from_stack(faulting_stack);
    let report = FaultReport::new(
        scb::fault_status(),
        frame,
        faulting_stack_select(faulting_stack),
        None,
    );
    panic!("{}", report)
}

#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
extern "C" {
    /// MemManage exception entry.
    ///
    /// Passes the stack pointer of the interrupted context in r0 to
    /// `memory_fault_diagnostic` without touching any stack.
    pub fn memory_management_handler();
}

#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
core::arch::global_asm!(
    "
    .section .memory_management_handler, \"ax\"
    .global memory_management_handler
    .thumb_func
  memory_management_handler:
    tst    lr, #4                       // EXC_RETURN bit 2: which stack was in use
    ite    eq
    mrseq  r0, msp                      // r0 = main stack pointer
    mrsne  r0, psp                      // r0 = process stack pointer
    ldr    r1, =memory_fault_diagnostic // Indirect, so the target can be far away
    bx     r1                           // lr still holds EXC_RETURN
    "
);

// Mock implementation for tests on the host.
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub unsafe extern "C" fn memory_management_handler() {
    unimplemented!()
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::string::ToString;

    const UNPRIVILEGED_FLASH: RegionBoundary = RegionBoundary::from_linker_range(0x4_9000, 0x10_0000);
    const PRIVILEGED_CODE: u32 = 0x4_0200;
    const TASK_CODE: u32 = 0x4_9100;

    const DACCVIOL: u32 = 1 << 1;
    const MMARVALID: u32 = 1 << 7;

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

    fn task_frame(pc: u32) -> ExceptionFrame {
        ExceptionFrame {
            pc,
            // Thumb bit set, thread mode
            xpsr: 0x0100_0000,
            ..Default::default()
        }
    }

    fn data_violation() -> FaultStatus {
        FaultStatus::new(DACCVIOL | MMARVALID, 0, 0x2001_0040, 0)
    }

    fn class_of(cfsr: u32, frame: &ExceptionFrame, stack: StackSelect) -> FaultClass {
        let status = FaultStatus::new(cfsr, 0, 0, 0);
        classify(&status, frame, stack, Some(&UNPRIVILEGED_FLASH))
    }

    #[test]
    fn entry_selects_msp_when_bit_two_clear() {
        let msp = 0x2001_1F80;
        let psp = 0x2003_0400;
        for exc_return in [0xFFFF_FFF1, 0xFFFF_FFF9, 0xFFFF_FFE9, 0xFFFF_FFB8] {
            assert_eq!(select_faulting_stack(ExcReturn(exc_return), msp, psp), msp);
            assert_eq!(ExcReturn(exc_return).stack(), StackSelect::Main);
        }
    }

    #[test]
    fn entry_selects_psp_when_bit_two_set() {
        let msp = 0x2001_1F80;
        let psp = 0x2003_0400;
        for exc_return in [0xFFFF_FFFD, 0xFFFF_FFED, 0xFFFF_FFBC] {
            assert_eq!(select_faulting_stack(ExcReturn(exc_return), msp, psp), psp);
            assert_eq!(ExcReturn(exc_return).stack(), StackSelect::Process);
        }
    }

    #[test]
    fn task_data_access_is_skippable() {
        let frame = task_frame(TASK_CODE);
        assert_eq!(
            class_of(DACCVIOL | MMARVALID, &frame, StackSelect::Process),
            FaultClass::SkippableDataAccess
        );
    }

    #[test]
    fn instruction_access_halts_even_with_data_violation() {
        let frame = task_frame(TASK_CODE);
        assert_eq!(
            class_of(DACCVIOL | 1, &frame, StackSelect::Process),
            FaultClass::InstructionAccess
        );
    }

    #[test]
    fn stacking_faults_are_not_skippable() {
        let frame = task_frame(TASK_CODE);
        for bit in [3, 4, 5] {
            assert_eq!(
                class_of(DACCVIOL | (1 << bit), &frame, StackSelect::Process),
                FaultClass::Stacking
            );
        }
    }

    #[test]
    fn privileged_contexts_are_not_skippable() {
        let frame = task_frame(TASK_CODE);
        assert_eq!(
            class_of(DACCVIOL, &frame, StackSelect::Main),
            FaultClass::PrivilegedAccess
        );

        // Handler mode (SysTick) on the process stack
        let handler = ExceptionFrame {
            xpsr: 0x0100_000F,
            ..frame
        };
        assert_eq!(
            class_of(DACCVIOL, &handler, StackSelect::Process),
            FaultClass::PrivilegedAccess
        );
    }

    #[test]
    fn pc_outside_unprivileged_flash_is_not_skippable() {
        assert_eq!(
            class_of(DACCVIOL, &task_frame(PRIVILEGED_CODE), StackSelect::Process),
            FaultClass::OutsideUnprivilegedCode
        );
        // First address past the region
        assert_eq!(
            class_of(DACCVIOL, &task_frame(0x10_0000), StackSelect::Process),
            FaultClass::OutsideUnprivilegedCode
        );
        // Last halfword of the region is still inside
        assert_eq!(
            class_of(DACCVIOL, &task_frame(0xF_FFFE), StackSelect::Process),
            FaultClass::SkippableDataAccess
        );

        let status = data_violation();
        let frame = task_frame(TASK_CODE);
        assert_eq!(
            classify(&status, &frame, StackSelect::Process, None),
            FaultClass::OutsideUnprivilegedCode
        );
    }

    #[test]
    fn fault_inside_it_block_is_not_skippable() {
        // ITT EQ; str r1, [r0]; adds r2, #1 with the store faulting
        let frame = ExceptionFrame {
            xpsr: 0x0100_0C00,
            ..task_frame(TASK_CODE)
        };
        assert_eq!(frame.it_state(), 0x0C);
        assert_eq!(
            class_of(DACCVIOL, &frame, StackSelect::Process),
            FaultClass::InsideItBlock
        );

        // Only the IT[1:0] half set
        let frame = ExceptionFrame {
            xpsr: 0x0300_0000,
            ..task_frame(TASK_CODE)
        };
        assert_eq!(
            class_of(DACCVIOL, &frame, StackSelect::Process),
            FaultClass::InsideItBlock
        );
    }

    #[test]
    fn recovery_leaves_frame_inside_it_block() {
        let image = [0x01, 0x60];
        let flash = Flash {
            base: TASK_CODE,
            image: &image,
        };
        let mut frame = ExceptionFrame {
            xpsr: 0x0100_0C00,
            ..task_frame(TASK_CODE)
        };

        let (report, disposition) = diagnose(
            &mut frame,
            StackSelect::Process,
            data_violation(),
            &UNPRIVILEGED_FLASH,
            true,
            &flash,
        );
        assert_eq!(report.class, FaultClass::InsideItBlock);
        assert_eq!(disposition, Disposition::Halt);
        assert_eq!(frame.pc, TASK_CODE);
        assert_eq!(frame.xpsr, 0x0100_0C00);
        assert!(report.to_string().contains("inside an IT block"));
    }

    #[test]
    fn empty_status_is_unclassified() {
        let frame = task_frame(TASK_CODE);
        assert_eq!(class_of(0, &frame, StackSelect::Process), FaultClass::Unclassified);
        // A bus fault alone is not a memory management fault
        assert_eq!(
            class_of(1 << 9, &frame, StackSelect::Process),
            FaultClass::Unclassified
        );
    }

    #[test]
    fn recovery_resumes_after_wide_instruction() {
        // str.w r1, [r0, #8]
        let image = [0xC0, 0xF8, 0x08, 0x10];
        let flash = Flash {
            base: TASK_CODE,
            image: &image,
        };
        let mut frame = task_frame(TASK_CODE);

        let (report, disposition) = diagnose(
            &mut frame,
            StackSelect::Process,
            data_violation(),
            &UNPRIVILEGED_FLASH,
            true,
            &flash,
        );
        assert_eq!(report.class, FaultClass::SkippableDataAccess);
        assert_eq!(report.context.program_counter, TASK_CODE);
        assert_eq!(
            report.context.saved_stack_pointer,
            &frame as *const ExceptionFrame as usize as u32
        );
        assert_eq!(disposition, Disposition::Resume(TASK_CODE + 4));
        assert_eq!(frame.pc, TASK_CODE + 4);
    }

    #[test]
    fn recovery_resumes_after_narrow_instruction() {
        // str r1, [r0]
        let image = [0x01, 0x60];
        let flash = Flash {
            base: TASK_CODE,
            image: &image,
        };
        let mut frame = task_frame(TASK_CODE);

        let (_, disposition) = diagnose(
            &mut frame,
            StackSelect::Process,
            data_violation(),
            &UNPRIVILEGED_FLASH,
            true,
            &flash,
        );
        assert_eq!(disposition, Disposition::Resume(TASK_CODE + 2));
    }

    #[test]
    fn recovery_disabled_halts_and_leaves_frame() {
        let image = [0x01, 0x60];
        let flash = Flash {
            base: TASK_CODE,
            image: &image,
        };
        let mut frame = task_frame(TASK_CODE);

        let (report, disposition) = diagnose(
            &mut frame,
            StackSelect::Process,
            data_violation(),
            &UNPRIVILEGED_FLASH,
            false,
            &flash,
        );
        assert_eq!(report.class, FaultClass::SkippableDataAccess);
        assert_eq!(disposition, Disposition::Halt);
        assert_eq!(frame.pc, TASK_CODE);
    }

    #[test]
    fn unskippable_fault_halts_without_reading_code() {
        // Any fetch would index out of this empty image and panic.
        let flash = Flash {
            base: PRIVILEGED_CODE,
            image: &[],
        };
        let mut frame = task_frame(PRIVILEGED_CODE);

        let (report, disposition) = diagnose(
            &mut frame,
            StackSelect::Main,
            data_violation(),
            &UNPRIVILEGED_FLASH,
            true,
            &flash,
        );
        assert_eq!(report.class, FaultClass::PrivilegedAccess);
        assert_eq!(disposition, Disposition::Halt);
        assert_eq!(frame.pc, PRIVILEGED_CODE);
    }

    #[test]
    fn report_lists_status() {
        let report = FaultReport::new(
            data_violation(),
            &task_frame(TASK_CODE),
            StackSelect::Process,
            Some(&UNPRIVILEGED_FLASH),
        );
        let text = report.to_string();
        assert!(text.contains("data access violation by unprivileged code"));
        assert!(text.contains("process (PSP)"));
        assert!(text.contains("Faulting PC:                        0x00049100"));
        assert!(text.contains("Data Access Violation:              true"));
        assert!(text.contains("Faulting Memory Address:            0x20010040"));
        assert!(text.contains("Fault Status Register (CFSR):       0x00000082"));
        assert!(!text.contains("Instruction Access Violation"));
    }
}
