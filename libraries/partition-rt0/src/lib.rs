// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Initial runtime (`rt0`) helpers for the privilege boundary.
//!
//! These run during single-threaded bring-up, before the MPU enforces
//! anything and before any reader of the affected sections exists.

#![no_std]

/// An initialized data section: where its image is stored (load address)
/// and where it lives while the system runs (execution range).
pub struct DataSection {
    load_start: *const u8,
    exec_start: *mut u8,
    exec_end: *mut u8,
}

impl DataSection {
    /// Describes a data section from its linker markers.
    ///
    /// # Safety
    ///
    /// `load_start` must be readable for `exec_end - exec_start` bytes,
    /// `exec_start..exec_end` must be writable, and the two ranges must not
    /// overlap.
    pub const unsafe fn new(
        load_start: *const u8,
        exec_start: *mut u8,
        exec_end: *mut u8,
    ) -> DataSection {
        DataSection {
            load_start,
            exec_start,
            exec_end,
        }
    }

    /// Number of bytes to copy. An inverted range counts as empty.
    pub fn len(&self) -> usize {
        (self.exec_end as usize).saturating_sub(self.exec_start as usize)
    }

    pub fn load_start(&self) -> *const u8 {
        self.load_start
    }

    pub fn exec_start(&self) -> *mut u8 {
        self.exec_start
    }
}

/// Copies a data section from its load location to its execution location.
///
/// The copy is byte exact for any length, including zero. When source and
/// destination share the same word alignment the bulk is moved a word at a
/// time.
///
/// # Safety
///
/// Must run once, before anything reads the section, and before the MPU
/// denies the current privilege level access to either range.
pub unsafe fn materialize(section: &DataSection) {
    let mut src = section.load_start;
    let mut dst = section.exec_start;
    let mut remaining = section.len();

    if (src as usize) % 4 == (dst as usize) % 4 {
        while remaining > 0 && (dst as usize) % 4 != 0 {
            dst.write(src.read());
            src = src.add(1);
            dst = dst.add(1);
            remaining -= 1;
        }
        while remaining >= 4 {
            dst.cast::<u32>().write(src.cast::<u32>().read());
            src = src.add(4);
            dst = dst.add(4);
            remaining -= 4;
        }
    }

    while remaining > 0 {
        dst.write(src.read());
        src = src.add(1);
        dst = dst.add(1);
        remaining -= 1;
    }
}

/// Sets non-initialized data in RAM to 0.
/// This is used to clear the BSS section on initial bootup.
///
/// # Safety
///
/// `bss..bss_end` must be a word-aligned, writable range nothing has read
/// yet.
pub unsafe fn zero_bss(mut bss: *mut u32, bss_end: *mut u32) {
    while bss < bss_end {
        // `volatile` to make sure it doesn't get optimized out
        bss.write_volatile(0);
        bss = bss.offset(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C, align(4))]
    struct Words([u8; 96]);

    fn image() -> Words {
        let mut words = Words([0; 96]);
        for (i, byte) in words.0.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(37).wrapping_add(11);
        }
        words
    }

    fn copy(len: usize, src_offset: usize, dst_offset: usize) {
        let load = image();
        let mut exec = Words([0xAA; 96]);
        let exec_start = unsafe { exec.0.as_mut_ptr().add(dst_offset) };

        unsafe {
            let section = DataSection::new(
                load.0.as_ptr().add(src_offset),
                exec_start,
                exec_start.add(len),
            );
            assert_eq!(section.len(), len);
            materialize(&section);
        }

        assert_eq!(
            &exec.0[dst_offset..dst_offset + len],
            &load.0[src_offset..src_offset + len],
            "len {} src +{} dst +{}",
            len,
            src_offset,
            dst_offset
        );
        // Nothing outside the execution range is touched.
        assert!(exec.0[..dst_offset].iter().all(|b| *b == 0xAA));
        assert!(exec.0[dst_offset + len..].iter().all(|b| *b == 0xAA));
    }

    #[test]
    fn empty_section_is_noop() {
        copy(0, 0, 0);
        copy(0, 3, 1);
    }

    #[test]
    fn copies_aligned_sections() {
        for len in [1, 3, 4, 5, 8, 31, 32, 64, 77] {
            copy(len, 0, 0);
        }
    }

    #[test]
    fn copies_equally_misaligned_sections() {
        for offset in 1..4 {
            for len in [1, 2, 3, 4, 9, 40, 61] {
                copy(len, offset, offset);
            }
        }
    }

    #[test]
    fn copies_differently_aligned_sections() {
        for (src, dst) in [(0, 1), (1, 0), (2, 3), (3, 2)] {
            for len in [1, 4, 17, 64] {
                copy(len, src, dst);
            }
        }
    }

    #[test]
    fn inverted_range_is_empty() {
        let load = image();
        let mut exec = Words([0; 96]);
        let start = unsafe { exec.0.as_mut_ptr().add(8) };
        let section = unsafe { DataSection::new(load.0.as_ptr(), start, exec.0.as_mut_ptr()) };
        assert_eq!(section.len(), 0);
        unsafe { materialize(&section) };
        assert!(exec.0.iter().all(|b| *b == 0));
    }

    #[test]
    fn zero_bss_clears_words() {
        let mut bss = [0xFFFF_FFFFu32; 8];
        let range = bss.as_mut_ptr_range();
        unsafe { zero_bss(range.start, range.end) };
        assert_eq!(bss, [0; 8]);
    }
}
