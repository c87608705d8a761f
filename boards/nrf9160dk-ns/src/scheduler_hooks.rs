// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Callbacks the scheduler makes into the application while it starts.
//!
//! The scheduler is built with static allocation only, so the idle task and
//! the timer service task get their memory from here.

use core::ffi::{c_char, c_void, CStr};

use partition::static_memory::{
    provide_static_memory, StackType, StaticBufferGrant, StaticTaskMemory,
};

/// Idle task stack depth in words (`configMINIMAL_STACK_SIZE`).
pub const IDLE_TASK_STACK_WORDS: usize = 256;

/// Timer service task stack depth in words (`configTIMER_TASK_STACK_DEPTH`).
pub const TIMER_TASK_STACK_WORDS: usize = 512;

/// Room for one `StaticTask_t`, including the MPU settings and saved context
/// the ARMv8-M MPU port keeps in it.
pub const TASK_CONTROL_BLOCK_BYTES: usize = 512;

static IDLE_TASK_MEMORY: StaticTaskMemory<TASK_CONTROL_BLOCK_BYTES, IDLE_TASK_STACK_WORDS> =
    StaticTaskMemory::new();

static TIMER_TASK_MEMORY: StaticTaskMemory<TASK_CONTROL_BLOCK_BYTES, TIMER_TASK_STACK_WORDS> =
    StaticTaskMemory::new();

pub fn provide_idle_memory() -> StaticBufferGrant<'static> {
    provide_static_memory(&IDLE_TASK_MEMORY, "idle task")
}

pub fn provide_timer_memory() -> StaticBufferGrant<'static> {
    provide_static_memory(&TIMER_TASK_MEMORY, "timer task")
}

unsafe fn hand_over(
    mut grant: StaticBufferGrant<'static>,
    control_block: *mut *mut c_void,
    stack: *mut *mut StackType,
    stack_words: *mut u32,
) {
    control_block.write(grant.control_block_ptr().cast());
    stack.write(grant.stack_ptr());
    stack_words.write(grant.stack_words);
}

#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn vApplicationGetIdleTaskMemory(
    idle_task_tcb_buffer: *mut *mut c_void,
    idle_task_stack_buffer: *mut *mut StackType,
    idle_task_stack_size: *mut u32,
) {
    hand_over(
        provide_idle_memory(),
        idle_task_tcb_buffer,
        idle_task_stack_buffer,
        idle_task_stack_size,
    );
}

#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn vApplicationGetTimerTaskMemory(
    timer_task_tcb_buffer: *mut *mut c_void,
    timer_task_stack_buffer: *mut *mut StackType,
    timer_task_stack_size: *mut u32,
) {
    hand_over(
        provide_timer_memory(),
        timer_task_tcb_buffer,
        timer_task_stack_buffer,
        timer_task_stack_size,
    );
}

/// Called by the scheduler when it finds a task's stack overflowed. Other
/// memory is already corrupted, so this never returns.
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn vApplicationStackOverflowHook(_task: *mut c_void, task_name: *const c_char) {
    let name = if task_name.is_null() {
        "<unnamed>"
    } else {
        CStr::from_ptr(task_name).to_str().unwrap_or("<invalid name>")
    };
    panic!("stack overflow in task {}", name);
}
