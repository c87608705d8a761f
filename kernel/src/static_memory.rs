// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Statically allocated memory for scheduler-managed execution units.
//!
//! The scheduler is built without dynamic allocation, so the idle unit and
//! the timer service unit get their control block and stack from the
//! application. That memory has to outlive the unit, i.e. the whole process,
//! so it is declared as `static` storage and handed out at most once:
//!
//! ```ignore
//! static IDLE_TASK_MEMORY: StaticTaskMemory<TCB_BYTES, 256> = StaticTaskMemory::new();
//!
//! let grant = provide_static_memory(&IDLE_TASK_MEMORY, "idle task");
//! ```

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

/// One word of task stack, as the scheduler's port defines it.
pub type StackType = u32;

/// Alignment of every task stack handed out by this module.
///
/// The MPU protects a task's stack with its own region, and regions must
/// start on a 32-byte granule.
pub const STACK_ALIGNMENT: usize = 32;

#[repr(C, align(32))]
struct TaskStack<const WORDS: usize>([StackType; WORDS]);

// The scheduler's control block is opaque here; it only needs the right size
// and an alignment at least as strict as any field it contains.
#[repr(C, align(8))]
struct ControlBlockStorage<const BYTES: usize>([u8; BYTES]);

/// Control block and stack storage for one execution unit.
///
/// `TCB_BYTES` is the size of the scheduler's static control block and
/// `STACK_WORDS` the stack depth in [`StackType`] words.
pub struct StaticTaskMemory<const TCB_BYTES: usize, const STACK_WORDS: usize> {
    taken: AtomicBool,
    control_block: UnsafeCell<ControlBlockStorage<TCB_BYTES>>,
    stack: UnsafeCell<TaskStack<STACK_WORDS>>,
}

// Shared access is limited to the `taken` flag. The cells are only reachable
// through the single grant handed out by `take()`.
unsafe impl<const TCB_BYTES: usize, const STACK_WORDS: usize> Sync
    for StaticTaskMemory<TCB_BYTES, STACK_WORDS>
{
}

impl<const TCB_BYTES: usize, const STACK_WORDS: usize> StaticTaskMemory<TCB_BYTES, STACK_WORDS> {
    pub const fn new() -> Self {
        Self {
            taken: AtomicBool::new(false),
            control_block: UnsafeCell::new(ControlBlockStorage([0; TCB_BYTES])),
            stack: UnsafeCell::new(TaskStack([0; STACK_WORDS])),
        }
    }

    /// Hands out the storage. Returns `None` on every call after the first.
    pub fn take(&'static self) -> Option<StaticBufferGrant<'static>> {
        if self.taken.swap(true, Ordering::AcqRel) {
            return None;
        }

        // SAFETY: the `taken` flag was false, so no other reference to the
        // cells was ever created, and it is now true, so none will be.
        let (control_block, stack) =
            unsafe { (&mut *self.control_block.get(), &mut *self.stack.get()) };

        Some(StaticBufferGrant {
            control_block: &mut control_block.0,
            stack: &mut stack.0,
            stack_words: STACK_WORDS as u32,
        })
    }

    /// Whether the storage has been handed out.
    pub fn is_taken(&self) -> bool {
        self.taken.load(Ordering::Acquire)
    }
}

/// Memory handed to the scheduler for one execution unit.
///
/// The grant owns its buffers for the rest of the process; the scheduler
/// keeps the raw pointers after the grant itself goes away.
pub struct StaticBufferGrant<'a> {
    pub control_block: &'a mut [u8],
    pub stack: &'a mut [StackType],
    /// Stack depth in words, not bytes.
    pub stack_words: u32,
}

impl StaticBufferGrant<'_> {
    pub fn control_block_ptr(&mut self) -> *mut u8 {
        self.control_block.as_mut_ptr()
    }

    pub fn stack_ptr(&mut self) -> *mut StackType {
        self.stack.as_mut_ptr()
    }
}

/// Hands out `memory` for the execution unit called `unit`.
///
/// The scheduler asks for each unit's memory exactly once while it starts.
/// A second request means two units would share a stack, which cannot be
/// recovered from, so it halts.
pub fn provide_static_memory<const TCB_BYTES: usize, const STACK_WORDS: usize>(
    memory: &'static StaticTaskMemory<TCB_BYTES, STACK_WORDS>,
    unit: &str,
) -> StaticBufferGrant<'static> {
    match memory.take() {
        Some(grant) => grant,
        None => panic!("{} memory requested twice", unit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_is_aligned_and_sized() {
        static MEMORY: StaticTaskMemory<92, 130> = StaticTaskMemory::new();

        let mut grant = provide_static_memory(&MEMORY, "idle task");
        assert!(!grant.control_block_ptr().is_null());
        assert!(!grant.stack_ptr().is_null());
        assert_eq!(grant.stack_ptr() as usize % STACK_ALIGNMENT, 0);
        assert_eq!(grant.control_block_ptr() as usize % 8, 0);
        assert_eq!(grant.stack_words, 130);
        assert_eq!(grant.stack.len(), 130);
        assert_eq!(grant.control_block.len(), 92);
    }

    #[test]
    fn storage_is_static_not_per_call() {
        static MEMORY: StaticTaskMemory<16, 64> = StaticTaskMemory::new();

        let mut grant = MEMORY.take().unwrap();
        let stack_address = grant.stack_ptr() as usize;
        let memory_start = &MEMORY as *const _ as usize;
        let memory_end = memory_start + core::mem::size_of_val(&MEMORY);
        assert!(stack_address >= memory_start && stack_address < memory_end);
    }

    #[test]
    fn take_succeeds_once() {
        static MEMORY: StaticTaskMemory<16, 32> = StaticTaskMemory::new();

        assert!(!MEMORY.is_taken());
        assert!(MEMORY.take().is_some());
        assert!(MEMORY.is_taken());
        assert!(MEMORY.take().is_none());
        assert!(MEMORY.take().is_none());
    }

    #[test]
    fn grants_are_independent() {
        static IDLE: StaticTaskMemory<16, 32> = StaticTaskMemory::new();
        static TIMER: StaticTaskMemory<16, 64> = StaticTaskMemory::new();

        let mut idle = provide_static_memory(&IDLE, "idle task");
        let mut timer = provide_static_memory(&TIMER, "timer task");
        idle.stack[0] = 0xDEAD_BEEF;
        timer.stack[0] = 0x1234_5678;
        assert_eq!(idle.stack[0], 0xDEAD_BEEF);
        assert_eq!(timer.stack_words, 64);
    }

    #[test]
    #[should_panic(expected = "timer task memory requested twice")]
    fn second_request_halts() {
        static MEMORY: StaticTaskMemory<16, 32> = StaticTaskMemory::new();

        let _first = provide_static_memory(&MEMORY, "timer task");
        let _second = provide_static_memory(&MEMORY, "timer task");
    }
}
