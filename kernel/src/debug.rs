// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Support for in-kernel debugging.
//!
//! `debug!` formats a message, prefixed with its source location, into a
//! fixed ring buffer in RAM. Nothing here touches a peripheral: whoever owns
//! an output channel (a logging task, a debugger reading the buffer, the
//! panic handler) pulls the bytes out with [`drain`].
//!
//! ```ignore
//! debug!("privileged data materialized: {} bytes", len);
//! ```
//!
//! The buffer keeps the most recent output: when it is full the oldest bytes
//! are overwritten. A message started while another one is still being
//! written (for example by a fault preempting thread-mode code) is dropped
//! rather than interleaved. The panic handler is the exception: it writes
//! with [`debug_print_forced`], which never yields to the interrupted
//! writer.

use core::cell::UnsafeCell;
use core::fmt::{write, Arguments, Result, Write};
use core::sync::atomic::{AtomicBool, Ordering};

/// Size of the debug output buffer in bytes.
pub const DEBUG_BUFFER_LEN: usize = 1024;

/// Byte ring buffer that overwrites its oldest content when full.
pub struct DebugQueue<const N: usize> {
    ring: [u8; N],
    head: usize,
    tail: usize,
}

impl<const N: usize> DebugQueue<N> {
    pub const fn new() -> Self {
        DebugQueue {
            ring: [0; N],
            head: 0,
            tail: 0,
        }
    }

    /// Number of buffered bytes. The capacity is `N - 1`, because
    /// `head == tail` for the empty queue.
    pub fn len(&self) -> usize {
        if self.tail >= self.head {
            self.tail - self.head
        } else {
            (N - self.head) + self.tail
        }
    }

    pub fn is_full(&self) -> bool {
        self.head == (self.tail + 1) % N
    }

    /// Appends a byte, dropping the oldest one if the queue is full.
    pub fn push(&mut self, byte: u8) {
        if self.is_full() {
            self.head = (self.head + 1) % N;
        }
        self.ring[self.tail] = byte;
        self.tail = (self.tail + 1) % N;
    }

    pub fn dequeue(&mut self) -> Option<u8> {
        if self.head == self.tail {
            None
        } else {
            let byte = self.ring[self.head];
            self.head = (self.head + 1) % N;
            Some(byte)
        }
    }

    /// Moves buffered bytes into `buf`, oldest first. Returns how many bytes
    /// were written.
    pub fn drain(&mut self, buf: &mut [u8]) -> usize {
        let mut count = 0;
        while count < buf.len() {
            match self.dequeue() {
                Some(byte) => buf[count] = byte,
                None => break,
            }
            count += 1;
        }
        count
    }
}

impl<const N: usize> Write for DebugQueue<N> {
    fn write_str(&mut self, s: &str) -> Result {
        for byte in s.bytes() {
            self.push(byte);
        }
        Ok(())
    }
}

struct DebugWriter {
    busy: AtomicBool,
    queue: UnsafeCell<DebugQueue<DEBUG_BUFFER_LEN>>,
}

// Access to `queue` is serialized by `busy`.
unsafe impl Sync for DebugWriter {}

static DEBUG_WRITER: DebugWriter = DebugWriter {
    busy: AtomicBool::new(false),
    queue: UnsafeCell::new(DebugQueue::new()),
};

impl DebugWriter {
    fn with_queue<F: FnOnce(&mut DebugQueue<DEBUG_BUFFER_LEN>) -> R, R>(&self, f: F) -> Option<R> {
        if self.busy.swap(true, Ordering::Acquire) {
            return None;
        }
        // SAFETY: `busy` was clear, so this is the only live reference.
        let result = f(unsafe { &mut *self.queue.get() });
        self.busy.store(false, Ordering::Release);
        Some(result)
    }

    /// Like `with_queue`, but takes the queue even while it is `busy`, and
    /// keeps it claimed afterwards.
    ///
    /// # Safety
    ///
    /// A writer this preempted must never run again.
    unsafe fn with_queue_forced<F: FnOnce(&mut DebugQueue<DEBUG_BUFFER_LEN>) -> R, R>(
        &self,
        f: F,
    ) -> R {
        let _ = self.busy.swap(true, Ordering::Acquire);
        f(&mut *self.queue.get())
    }
}

/// Writes one formatted debug line. Used by the `debug!` macro.
pub fn begin_debug_fmt(args: Arguments, file_line: &(&'static str, u32)) {
    let (file, line) = *file_line;
    DEBUG_WRITER.with_queue(|queue| {
        let _ = queue.write_fmt(format_args!("{}:{}: ", file, line));
        let _ = write(queue, args);
        let _ = queue.write_str("\r\n");
    });
}

/// Writes formatted output without location prefix or line ending.
pub fn debug_print(args: Arguments) {
    DEBUG_WRITER.with_queue(|queue| {
        let _ = write(queue, args);
    });
}

/// Writes formatted output even if a preempted `debug!` or [`drain`] holds
/// the buffer, so a panic message is never lost. The buffer stays claimed
/// afterwards; only a debugger reads it from then on.
///
/// # Safety
///
/// Only for code that never returns to what it interrupted, such as the
/// panic handler.
pub unsafe fn debug_print_forced(args: Arguments) {
    DEBUG_WRITER.with_queue_forced(|queue| {
        let _ = write(queue, args);
    });
}

/// Moves pending debug output into `buf`. Returns the number of bytes
/// written, zero if there is nothing pending or the buffer is being written.
pub fn drain(buf: &mut [u8]) -> usize {
    DEBUG_WRITER
        .with_queue(|queue| queue.drain(buf))
        .unwrap_or(0)
}

/// Number of bytes waiting to be drained.
pub fn pending() -> usize {
    DEBUG_WRITER.with_queue(|queue| queue.len()).unwrap_or(0)
}

/// In-kernel debug output.
///
/// Formats like `format!` and records the caller's file and line.
#[macro_export]
macro_rules! debug {
    () => ({
        // Allow an empty debug!() to print the location when hit
        $crate::debug!("")
    });
    ($msg:expr $(,)?) => ({
        $crate::debug::begin_debug_fmt(format_args!($msg), {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
    ($fmt:expr, $($arg:tt)+) => ({
        $crate::debug::begin_debug_fmt(format_args!($fmt, $($arg)+), {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
}
