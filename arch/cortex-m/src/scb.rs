// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! ARM System Control Block, fault status and vector table registers.
//!
//! <https://developer.arm.com/documentation/100235/0004/the-cortex-m33-peripherals/system-control-block>

use partition::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use partition::utilities::registers::{
    register_bitfields, register_structs, LocalRegisterCopy, ReadWrite,
};
use partition::utilities::StaticRef;

register_structs! {
    /// The subset of the System Control Block used to configure and
    /// diagnose memory management faults.
    ScbRegisters {
        (0x00 => _reserved0),

        /// Vector Table Offset Register
        (0x08 => vtor: ReadWrite<u32, VectorTableOffset::Register>),

        (0x0c => _reserved1),

        /// System Handler Control and State Register
        (0x24 => shcsr: ReadWrite<u32, SystemHandlerControlAndState::Register>),

        /// Configurable Fault Status Register
        (0x28 => cfsr: ReadWrite<u32, ConfigurableFaultStatus::Register>),

        /// HardFault Status Register
        (0x2c => hfsr: ReadWrite<u32, HardFaultStatus::Register>),

        (0x30 => _reserved2),

        /// MemManage Fault Address Register
        (0x34 => mmfar: ReadWrite<u32, FaultAddress::Register>),

        /// BusFault Address Register
        (0x38 => bfar: ReadWrite<u32, FaultAddress::Register>),

        (0x3c => @END),
    }
}

register_bitfields![u32,
    VectorTableOffset [
        /// Bits [31:7] of the vector table address
        TBLOFF          OFFSET(7)   NUMBITS(25)
    ],

    SystemHandlerControlAndState [
        SECUREFAULTENA  OFFSET(19)  NUMBITS(1),
        USGFAULTENA     OFFSET(18)  NUMBITS(1),
        BUSFAULTENA     OFFSET(17)  NUMBITS(1),
        MEMFAULTENA     OFFSET(16)  NUMBITS(1),
        MEMFAULTACT     OFFSET(0)   NUMBITS(1)
    ],

    /// CFSR with the MemManage status byte broken out bit by bit. The
    /// BusFault and UsageFault bytes are kept whole; the diagnostic only
    /// reports them.
    pub ConfigurableFaultStatus [
        UsageFault      OFFSET(16)  NUMBITS(16),
        BusFault        OFFSET(8)   NUMBITS(8),
        MemManage       OFFSET(0)   NUMBITS(8),

        MMARVALID       OFFSET(7)   NUMBITS(1),
        MLSPERR         OFFSET(5)   NUMBITS(1),
        MSTKERR         OFFSET(4)   NUMBITS(1),
        MUNSTKERR       OFFSET(3)   NUMBITS(1),
        DACCVIOL        OFFSET(1)   NUMBITS(1),
        IACCVIOL        OFFSET(0)   NUMBITS(1)
    ],

    pub HardFaultStatus [
        DEBUGEVT        OFFSET(31)  NUMBITS(1),
        FORCED          OFFSET(30)  NUMBITS(1),
        VECTTBL         OFFSET(1)   NUMBITS(1)
    ],

    FaultAddress [
        ADDRESS         OFFSET(0)   NUMBITS(32)
    ]
];

const SCB: StaticRef<ScbRegisters> = unsafe { StaticRef::new(0xE000ED00 as *const ScbRegisters) };

/// A copy of the fault status registers taken at fault entry.
#[derive(Copy, Clone)]
pub struct FaultStatus {
    pub cfsr: LocalRegisterCopy<u32, ConfigurableFaultStatus::Register>,
    pub hfsr: LocalRegisterCopy<u32, HardFaultStatus::Register>,
    pub mmfar: u32,
    pub bfar: u32,
}

impl FaultStatus {
    pub fn new(cfsr: u32, hfsr: u32, mmfar: u32, bfar: u32) -> FaultStatus {
        FaultStatus {
            cfsr: LocalRegisterCopy::new(cfsr),
            hfsr: LocalRegisterCopy::new(hfsr),
            mmfar,
            bfar,
        }
    }

    /// The address whose access faulted, if the core recorded one.
    pub fn memory_fault_address(&self) -> Option<u32> {
        if self.cfsr.is_set(ConfigurableFaultStatus::MMARVALID) {
            Some(self.mmfar)
        } else {
            None
        }
    }
}

/// Reads the fault status registers.
pub unsafe fn fault_status() -> FaultStatus {
    FaultStatus {
        cfsr: LocalRegisterCopy::new(SCB.cfsr.get()),
        hfsr: LocalRegisterCopy::new(SCB.hfsr.get()),
        mmfar: SCB.mmfar.get(),
        bfar: SCB.bfar.get(),
    }
}

/// Clears the MemManage status byte of the CFSR.
///
/// The bits are write-one-to-clear, so the BusFault and UsageFault bytes are
/// left as they are.
pub unsafe fn clear_memory_fault_status() {
    SCB.cfsr.write(ConfigurableFaultStatus::MemManage.val(0xFF));
}

/// Routes MPU violations to the MemManage handler instead of escalating them
/// to HardFault.
pub unsafe fn enable_memory_management_fault() {
    SCB.shcsr
        .modify(SystemHandlerControlAndState::MEMFAULTENA::SET);
}

/// relocate interrupt vector table
pub unsafe fn set_vector_table_offset(offset: *const ()) {
    SCB.vtor.set(offset as u32);
}
